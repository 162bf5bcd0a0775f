//! logup CLI - Main entry point

use clap::Parser;
use logup_cli::error::{EXIT_SUCCESS, EXIT_USAGE};
use logup_cli::{Cli, Commands};
use logup_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::path::PathBuf;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    let Some(command) = cli.command else {
        eprintln!("Error: A subcommand is required");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        process::exit(EXIT_USAGE);
    };

    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Verbose mode logs debug to the console; otherwise only warnings and errors
    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("logup")
        .filter_directives("hyper_util=warn,reqwest=warn")
        .build();

    // LOGUP_LOG_* variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI works without logging
    let guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: logging disabled: {e:#}");
            None
        }
    };

    let code = match execute_command(command, cli.config).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };

    // process::exit skips destructors; flush file logs first
    drop(guard);
    process::exit(code);
}

/// Execute the CLI command and return the exit code
async fn execute_command(command: Commands, config: Option<PathBuf>) -> logup_cli::Result<i32> {
    match command {
        Commands::Upload(args) => {
            logup_cli::commands::upload::run(args.into_options(config)).await
        }

        Commands::Sample { dir } => {
            logup_cli::commands::sample::run(dir).await?;
            Ok(EXIT_SUCCESS)
        }

        Commands::Config => {
            logup_cli::commands::config::show(config.as_deref()).await?;
            Ok(EXIT_SUCCESS)
        }
    }
}
