//! Progress reporting utilities

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown while tables are loaded and compared
#[derive(Debug)]
pub struct ProgressReporter {
    spinner: Option<ProgressBar>,
}

impl ProgressReporter {
    pub fn new(message: &str) -> Self {
        Self {
            spinner: Some(create_spinner(message)),
        }
    }

    /// Reporter that draws nothing (JSON output)
    pub fn hidden() -> Self {
        Self { spinner: None }
    }

    /// Callback suitable for `Reconciler::with_progress`
    pub fn table_callback(&self) -> impl Fn(usize, usize, &str) + Send + Sync + 'static {
        let spinner = self.spinner.clone();
        move |done: usize, total: usize, table: &str| {
            if let Some(pb) = &spinner {
                pb.set_message(format!("Compared {table} ({done}/{total})"));
            }
        }
    }

    pub fn finish(&mut self, message: &str) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_with_message(message.to_string());
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

/// Create a spinner progress bar
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} {msg}")
            .expect("Invalid progress template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
