//! Progress bar utilities for uploads
//!
//! Bars draw to stderr so summaries on stdout stay machine-readable.

use indicatif::{ProgressBar, ProgressStyle};

const UPLOAD_TEMPLATE: &str =
    "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})";

/// Create a byte progress bar for one file upload
pub fn create_upload_progress(size: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(size);
    let style = ProgressStyle::default_bar()
        .template(UPLOAD_TEMPLATE)
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}
