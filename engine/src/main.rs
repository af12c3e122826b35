// Captain orchestration hub
// Main entry point for the captain binary

use clap::Parser;
use captain_engine::bootstrap::Runtime;
use captain_engine::cli::{Cli, Command, ConfigAction};
use captain_engine::config::Config;
use captain_engine::handlers::{
    handle_chat, handle_config_path, handle_config_show, handle_diag, handle_run, OutputFormat,
};
use captain_engine::service::StartRequest;
use captain_engine::telemetry::init_telemetry_with_level;
use sdk::errors::{HubError, HubErrorExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        if let Some(hub_err) = e.downcast_ref::<HubError>() {
            eprintln!("Hint: {}", hub_err.user_hint());
            if hub_err.is_recoverable() {
                eprintln!("This error may be transient; try again.");
            }
        }
        return Err(e);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let mut config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };
    config.apply_env_overrides()?;

    // --log wins over the config file; RUST_LOG wins over both
    init_telemetry_with_level(cli.log.as_deref().unwrap_or(&config.core.log_level));

    tracing::info!("Captain v{} ({} - {})", version, commit, timestamp);

    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Show => handle_config_show(&config, format),
            ConfigAction::Path => handle_config_path(format),
        };
    }

    let runtime = Runtime::build(config, tokio::runtime::Handle::current())?;
    let service = runtime.service.as_ref();

    // Handle commands
    match cli.command {
        Command::Run {
            goal,
            deliverables,
            constraints,
            nested,
        } => {
            tracing::info!("Submitting run...");
            let request = StartRequest {
                goal,
                deliverables,
                constraints,
                nested,
            };
            handle_run(service, request, format).await
        }

        Command::Chat { text } => handle_chat(service, text, format).await,

        Command::Diag => {
            tracing::info!("Collecting diagnostics...");
            handle_diag(service, format).await
        }

        Command::Config { .. } => Ok(()),
    }
}
