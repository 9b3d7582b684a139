pub mod build;
pub mod doctor;
pub mod search;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar for `len` items, hidden when `len` is zero.
fn progress_bar(len: usize) -> ProgressBar {
    if len == 0 {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} ({eta})")
            .expect("valid template")
            .progress_chars("##-"),
    );
    pb
}

/// Shorten `text` to at most `max_chars` characters, appending "..." when cut.
fn truncate_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_preview() {
        assert_eq!(truncate_preview("short", 10), "short");
        assert_eq!(truncate_preview("héllo wörld", 5), "héllo...");
    }
}
