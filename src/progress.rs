//! Per-object upload progress.

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;

const BAR_TEMPLATE: &str =
    "{msg:<32!} [{bar:30.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} eta {eta}";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum ProgressMode {
    /// Bars when stderr is a terminal, nothing otherwise.
    #[default]
    Auto,
    Rich,
    Quiet,
}

impl ProgressMode {
    fn draws_bars(self) -> bool {
        match self {
            ProgressMode::Auto => std::io::stderr().is_terminal(),
            ProgressMode::Rich => true,
            ProgressMode::Quiet => false,
        }
    }

    /// Bar tracking `total` bytes of `key`; hidden when bars are disabled.
    pub fn upload_bar(self, key: &str, total: u64) -> ProgressBar {
        if !self.draws_bars() {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(key.to_string());
        bar
    }
}
