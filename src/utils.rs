use chrono::{Days, Local, NaiveDate, NaiveDateTime, NaiveTime};
use directories::{ProjectDirs, BaseDirs};
use std::path::PathBuf;

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

impl Profile {
    fn app_name(self) -> &'static str {
        match self {
            Profile::Dev => "taskdeck-dev",
            Profile::Prod => "taskdeck",
        }
    }
}

/// Get the configuration directory path for taskdeck
/// If profile is Dev, uses "taskdeck-dev" instead of "taskdeck"
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    // Use "com" as qualifier for better cross-platform compatibility
    ProjectDirs::from("com", "taskdeck", profile.app_name())
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory path for taskdeck
/// If profile is Dev, uses "taskdeck-dev" instead of "taskdeck"
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "taskdeck", profile.app_name())
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf())
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// Parse a date string in ISO 8601 format (YYYY-MM-DD)
pub fn parse_date(date_str: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
}

/// Parse a 24-hour time string (HH:MM)
pub fn parse_time(time_str: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(time_str.trim(), "%H:%M")
}

/// Today's date in local time
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Human-readable due moment for alerts and listings
pub fn format_due(moment: NaiveDateTime) -> String {
    moment.format("%a %b %-d %Y, %H:%M").to_string()
}

/// Resolve a due date argument. Accepts `today`, `tomorrow` or an ISO date,
/// which is passed through untouched for validation further in.
pub fn resolve_due_date(input: &str, today: NaiveDate) -> String {
    match input.trim().to_ascii_lowercase().as_str() {
        "today" => format_date(today),
        "tomorrow" => today
            .checked_add_days(Days::new(1))
            .map(format_date)
            .unwrap_or_else(|| input.to_string()),
        _ => input.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_path_leaves_plain_paths_alone() {
        assert_eq!(expand_path("/tmp/tasks.db"), PathBuf::from("/tmp/tasks.db"));
        assert_eq!(expand_path("relative/tasks.db"), PathBuf::from("relative/tasks.db"));
    }

    #[test]
    fn parses_dates_and_times() {
        assert_eq!(parse_date("2024-01-15").unwrap(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert!(parse_date("15/01/2024").is_err());
        assert_eq!(parse_time("09:05").unwrap(), NaiveTime::from_hms_opt(9, 5, 0).unwrap());
        assert!(parse_time("9am").is_err());
    }

    #[test]
    fn resolves_relative_due_dates() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        assert_eq!(resolve_due_date("today", today), "2024-02-28");
        assert_eq!(resolve_due_date("Tomorrow", today), "2024-02-29");
        assert_eq!(resolve_due_date(" 2024-03-01 ", today), "2024-03-01");
    }

    #[test]
    fn formats_due_moment() {
        let moment = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(14, 0, 0).unwrap();
        assert_eq!(format_due(moment), "Mon Jan 15 2024, 14:00");
    }
}
