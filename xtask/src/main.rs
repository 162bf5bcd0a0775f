//! Build automation tasks for logup
//!
//! - Generating the CLI reference from the clap definitions
//! - Checking that the committed reference is up to date

use anyhow::{bail, Context};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for logup", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: PathBuf,

        /// Fail instead of writing when the committed reference is stale
        #[arg(long)]
        check: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir, check } => generate_cli_docs(&output_dir, check)?,
    }

    Ok(())
}

fn render_reference() -> String {
    let markdown = clap_markdown::help_markdown::<logup_cli::Cli>();

    format!(
        r#"# logup CLI Reference

Generated from the CLI source. To update, run `cargo xtask generate-cli-docs`.

## Quick Start

```bash
# Write a few log files to try it out
logup sample

# Upload them in 1 MiB chunks, retrying each chunk up to 3 times
logup upload sample_logs --endpoint http://localhost:8080/upload

# Smaller chunks, more workers, JSON summary
logup upload app.log -e http://localhost:8080/upload --chunk-size 256KiB -j 8 --format json
```

## Exit Codes

- `0` every file uploaded completely
- `1` at least one file was not uploaded completely, or a command failed
- `2` invalid configuration or usage

## Environment Variables

- `LOGUP_ENDPOINT`, `LOGUP_CHUNK_SIZE`, `LOGUP_MAX_ATTEMPTS`, `LOGUP_BASE_DELAY_SECS`,
  `LOGUP_MAX_DELAY_SECS`, `LOGUP_CONCURRENCY`, `LOGUP_TIMEOUT_SECS` - upload settings
- `LOGUP_LOG_LEVEL`, `LOGUP_LOG_OUTPUT`, `LOGUP_LOG_FORMAT`, `LOGUP_LOG_DIR`, `LOGUP_LOG_FILTER` - logging

## Commands

{markdown}"#
    )
}

fn generate_cli_docs(output_dir: &Path, check: bool) -> anyhow::Result<()> {
    let content = render_reference();
    let file_path = output_dir.join("cli.md");

    if check {
        let current = fs::read_to_string(&file_path)
            .with_context(|| format!("Failed to read {}", file_path.display()))?;
        if current != content {
            bail!(
                "{} is out of date; run `cargo xtask generate-cli-docs`",
                file_path.display()
            );
        }
        println!("✅ {} is up to date", file_path.display());
        return Ok(());
    }

    fs::create_dir_all(output_dir)?;
    fs::write(&file_path, content)?;

    println!(
        "✅ Generated CLI documentation at: {} ({})",
        file_path.display(),
        chrono::Utc::now().format("%Y-%m-%d")
    );

    Ok(())
}
