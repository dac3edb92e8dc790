//! File input/output and status reporting.

pub mod utils;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// How much non-critical status information to print.
#[derive(Clone, Debug)]
pub enum Verbosity {
    Quiet,
    Messages,
    Progress(ProgressStyle),
}

impl Verbosity {
    /// Whether status messages should be printed.
    pub fn print_messages(&self) -> bool {
        matches!(self, Self::Messages)
    }

    /// Creates a progress bar for the given number of items, hidden unless
    /// progress reporting is enabled.
    pub fn create_progress_bar(&self, n_values: usize) -> ProgressBar {
        match self {
            Self::Progress(style) => {
                let bar =
                    ProgressBar::with_draw_target(n_values as u64, ProgressDrawTarget::stderr());
                bar.set_style(style.clone());
                bar
            }
            _ => ProgressBar::hidden(),
        }
    }
}
