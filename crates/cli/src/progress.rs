//! Terminal progress bars for transfers

use anonshare_core::{ProgressCallback, TransferProgress};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

const TEMPLATE: &str =
    "{spinner:.green} {msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

/// Bar drawn on stderr, sized once the transfer reports a total
pub fn transfer_bar(label: &str) -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar.set_message(label.to_string());
    bar
}

/// Forward transfer progress to `bar`
pub fn report_to(bar: &ProgressBar) -> ProgressCallback {
    let bar = bar.clone();
    Arc::new(move |progress: TransferProgress| {
        if let Some(total) = progress.total {
            bar.set_length(total);
        }
        bar.set_position(progress.transferred);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_to_updates_bar() {
        let bar = ProgressBar::hidden();
        let callback = report_to(&bar);

        callback(TransferProgress { transferred: 5, total: Some(10) });
        assert_eq!(bar.length(), Some(10));
        assert_eq!(bar.position(), 5);

        callback(TransferProgress { transferred: 7, total: None });
        assert_eq!(bar.length(), Some(10));
        assert_eq!(bar.position(), 7);
    }
}
