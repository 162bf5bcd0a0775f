//! `logup sample` command implementation
//!
//! Writes a small set of log files to try uploads against.

use crate::error::Result;
use colored::Colorize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default directory for generated logs
pub const DEFAULT_SAMPLE_DIR: &str = "sample_logs";

const APP_LOG: &str = "\
2024-01-15 10:30:15 INFO Application started
2024-01-15 10:31:20 ERROR Database connection failed
2024-01-15 10:32:10 INFO Retrying connection
";

/// Generate sample logs into `dir`
pub async fn run(dir: PathBuf) -> Result<()> {
    let written = write_samples(&dir)?;

    println!(
        "{} Sample log files created in {}",
        "✓".green(),
        dir.display().to_string().cyan()
    );
    for path in &written {
        println!("  {}", path.display());
    }
    println!();
    println!("Upload them with:");
    println!("  logup upload {} --endpoint <URL>", dir.display());

    Ok(())
}

/// Write `app.log` and `access.log`, returning their paths
pub fn write_samples(dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let app = dir.join("app.log");
    fs::write(&app, APP_LOG)?;

    let access = dir.join("access.log");
    fs::write(&access, access_log(100))?;

    info!(dir = %dir.display(), "Wrote sample logs");
    Ok(vec![app, access])
}

fn access_log(lines: usize) -> String {
    let mut log = String::new();
    for i in 0..lines {
        let _ = writeln!(
            log,
            "2024-01-15 10:{}:{:02} GET /api/users/{} 200 {}ms",
            30 + i / 10,
            i % 60,
            i,
            50 + i
        );
    }
    log
}
