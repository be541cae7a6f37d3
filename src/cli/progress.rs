//! Progress bar driven by run events

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::app::RunEvent;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";

/// Counters kept while events arrive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressTally {
    pub total: usize,
    pub finished: usize,
    pub downloaded: usize,
    pub failed: usize,
}

impl ProgressTally {
    pub fn apply(&mut self, event: &RunEvent) {
        match event {
            RunEvent::Planned { total } => self.total = *total,
            RunEvent::Transferred(record) => {
                self.finished += 1;
                if record.outcome.was_downloaded() {
                    self.downloaded += 1;
                } else if !record.outcome.ok() {
                    self.failed += 1;
                }
            }
        }
    }

    fn message(&self) -> String {
        format!("{} downloaded, {} failed", self.downloaded, self.failed)
    }
}

/// Terminal progress display; hidden when disabled
pub struct ProgressDisplay {
    bar: ProgressBar,
}

impl ProgressDisplay {
    pub fn new(enabled: bool) -> Self {
        let bar = if enabled {
            let bar = ProgressBar::new(0);
            match ProgressStyle::default_bar().template(BAR_TEMPLATE) {
                Ok(style) => bar.set_style(style.progress_chars("##-")),
                Err(e) => debug!("Progress bar template error: {}", e),
            }
            bar
        } else {
            ProgressBar::hidden()
        };
        Self { bar }
    }

    /// Consume events until the sender side is dropped
    pub fn spawn(self, mut events_rx: mpsc::Receiver<RunEvent>) -> JoinHandle<ProgressTally> {
        tokio::spawn(async move {
            let mut tally = ProgressTally::default();
            while let Some(event) = events_rx.recv().await {
                tally.apply(&event);
                match event {
                    RunEvent::Planned { total } => self.bar.set_length(total as u64),
                    RunEvent::Transferred(_) => {
                        self.bar.inc(1);
                        self.bar.set_message(tally.message());
                    }
                }
            }
            self.bar.finish_and_clear();
            tally
        })
    }
}
