pub mod copy;
pub mod migrate;

use std::thread;

use colored::Colorize;

use crate::config::RunConfig;

/// Give the operator a window to cancel before anything is written.
fn pause_before_writing(config: &RunConfig) {
    if config.dry_run || config.grace.is_zero() {
        return;
    }
    eprintln!(
        "{}",
        format!(
            "about to modify {}; press Ctrl-C within {}s to abort",
            config.destination,
            config.grace.as_secs()
        )
        .red()
        .bold()
    );
    thread::sleep(config.grace);
}
