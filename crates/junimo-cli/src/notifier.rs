//! Terminal notifier: one progress bar per in-flight download, plain
//! styled lines for everything else.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use junimo_setup::{DownloadSummary, Notifier};

pub struct ConsoleNotifier {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn download_bar(&self, component: &str, total: Option<u64>) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = bars.get(component) {
            return bar.clone();
        }

        let bar = self.multi.add(ProgressBar::new(total.unwrap_or(0)));
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        bar.set_message(component.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        bars.insert(component.to_string(), bar.clone());
        bar
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str) {
        // Routing through the progress set keeps active bars intact.
        let _ = self.multi.println(message);
    }

    fn download_progress(&self, component: &str, received: u64, total: Option<u64>) {
        let bar = self.download_bar(component, total);
        if let Some(total) = total {
            bar.set_length(total);
        }
        bar.set_position(received);
    }

    fn downloads_complete(&self, summary: &DownloadSummary) {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        for (_, bar) in bars.drain() {
            bar.finish_and_clear();
        }
        drop(bars);

        if summary.canceled {
            let _ = self
                .multi
                .println(format!("{} downloads canceled", style("Stopped:").yellow()));
        } else if summary.failed.is_empty() {
            let ready = summary.downloaded.len() + summary.already_present.len();
            let _ = self
                .multi
                .println(format!("{} {ready} components ready", style("Done:").green()));
        }
    }
}
