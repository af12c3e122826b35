//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - run: Submit a goal, wait for the run and print its record
//! - chat: One-shot chat through the fallback chain
//! - diag: Runtime wiring diagnostics
//! - config show / path: Effective configuration

use anyhow::{Context, Result};
use serde_json::json;

use crate::config::Config;
use crate::service::{ChatRequest, OrchestrationService, StartRequest};

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Run a goal through the pipeline and wait for the outcome
pub async fn handle_run(
    service: &OrchestrationService,
    request: StartRequest,
    format: OutputFormat,
) -> Result<()> {
    let goal = request.goal.clone();
    let run_id = service.start(request).await?;

    if let OutputFormat::Text = format {
        println!("Started {} for: {}", run_id, goal);
    }

    let record = service
        .wait(&run_id)
        .await
        .with_context(|| format!("run {} left no record", run_id))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        OutputFormat::Text => match (&record.artifacts, &record.error) {
            (Some(result), _) => {
                println!();
                println!("Plan:\n{}\n", result.plan);
                println!("Implementation:\n{}\n", result.implementation);
                println!("Review: {}", result.review);
            }
            (None, Some(error)) => {
                println!();
                println!("Run failed: {}", error);
            }
            (None, None) => println!("Run finished without artifacts"),
        },
    }
    Ok(())
}

/// Send one chat message
pub async fn handle_chat(
    service: &OrchestrationService,
    text: String,
    format: OutputFormat,
) -> Result<()> {
    let response = service.chat(ChatRequest::text(text)).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        OutputFormat::Text => {
            for (role, content) in &response.steps {
                if role != "assistant" {
                    println!("[{}]\n{}\n", role, content);
                }
            }
            println!("{}", response.reply);
        }
    }
    Ok(())
}

/// Print runtime diagnostics
pub async fn handle_diag(service: &OrchestrationService, format: OutputFormat) -> Result<()> {
    let diag = service.diagnostics().await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&diag)?),
        OutputFormat::Text => {
            println!("Captain diagnostics:");
            println!("  Hub:          {}", if diag.has_hub { "ready" } else { "missing" });
            println!("  Nested:       {}", diag.nested);
            println!("  User:         {}", diag.user_id);
            println!(
                "  Thread mode:  {}",
                diag.thread_mode
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "n/a".to_string())
            );
            for (kind, target) in &diag.persist {
                println!("  Persist {:<9} {}", format!("{}:", kind), target);
            }
            println!("  Live spaces:  {}", diag.live_spaces);
            println!("  Runs:         {} recorded, {} pending", diag.runs, diag.pending);
            if diag.spokes.is_empty() {
                println!("  Spokes:       none (degenerate pipeline)");
            } else {
                for (role, count) in &diag.spokes {
                    println!("  Spokes {:<10} {}", format!("{}:", role), count);
                }
            }
        }
    }
    Ok(())
}

/// Print the effective configuration
pub fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => {
            let toml_string =
                toml::to_string_pretty(config).context("Failed to serialize config")?;
            println!("{}", toml_string);
        }
    }
    Ok(())
}

/// Print the default configuration file path
pub fn handle_config_path(format: OutputFormat) -> Result<()> {
    let path = Config::default_config_path()?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "path": path })),
        OutputFormat::Text => println!("{}", path.display()),
    }
    Ok(())
}
