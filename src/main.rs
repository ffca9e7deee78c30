use clap::Parser;
use color_eyre::Result;
use std::sync::Arc;
use taskdeck::{
    Config, Database, NotificationScheduler, Profile, TaskStore, TerminalNotifier, ToastQueue, Tracker,
    cli::{self, Cli, Commands},
    models::Filter,
    utils::expand_path,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    // Logs go to stderr so listings on stdout stay clean.
    // RUST_LOG overrides the default level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskdeck=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev {
        Profile::Dev
    } else {
        Profile::Prod
    };

    let config = match &cli.config {
        Some(path) => Config::load_from_path(&expand_path(path))?,
        None => Config::load_with_profile(profile)?,
    };

    // Open the task slot
    let storage_path = config.get_storage_path(profile);
    let db = Database::new(
        storage_path.to_str()
            .ok_or_else(|| color_eyre::eyre::eyre!("Storage path contains invalid UTF-8"))?
    )?;

    let toasts = ToastQueue::with_default_duration(config.toast_duration());
    let store = TaskStore::load(Box::new(db), toasts);
    let scheduler = NotificationScheduler::new(
        Arc::new(TerminalNotifier::new(config.notifications_enabled)),
        config.default_due_time(),
    );
    let mut tracker = Tracker::new(store, scheduler);

    // Dispatch to appropriate command handler
    let command = cli.command.unwrap_or(Commands::List { filter: Filter::All });
    let result = cli::dispatch(command, &mut tracker, &config).await;
    cli::flush_toasts(tracker.toasts());
    tracker.shutdown();

    match result {
        // The error toast above already explained it
        Err(e) if e.is_reported() => std::process::exit(1),
        result => Ok(result?),
    }
}
