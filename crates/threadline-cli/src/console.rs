//! CLI console utilities

use colored::*;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;

const SPINNER_TEMPLATE: &str = "{spinner:.blue} {msg}";
const UPLOAD_TEMPLATE: &str = "  {bar:24.cyan/blue} {pos:>3}% {msg}";

/// Formatted terminal output plus the activity spinner
pub struct CliConsole {
    verbose: bool,
    spinner: Option<ProgressBar>,
}

impl CliConsole {
    pub const fn new(verbose: bool) -> Self {
        Self {
            verbose,
            spinner: None,
        }
    }

    /// Print an info message (verbose mode only)
    pub fn info(&self, message: &str) {
        if self.verbose {
            self.emit(|| println!("{} {}", "ℹ".blue().bold(), message));
        }
    }

    pub fn success(&self, message: &str) {
        self.emit(|| println!("{} {}", "✓".green().bold(), message.green()));
    }

    pub fn warn(&self, message: &str) {
        self.emit(|| println!("{} {}", "⚠".yellow().bold(), message.yellow()));
    }

    pub fn error(&self, message: &str) {
        self.emit(|| eprintln!("{} {}", "✗".red().bold(), message.red()));
    }

    pub fn print_header(&self, title: &str) {
        println!();
        println!("{}", title.bold().underline());
        println!("{}", "=".repeat(console::measure_text_width(title)).dimmed());
    }

    /// Print a line without decoration, above the spinner if one is shown
    pub fn line(&self, text: &str) {
        self.emit(|| println!("{}", text));
    }

    /// Write raw text without a newline
    pub fn write(&self, text: &str) {
        self.emit(|| {
            print!("{}", text);
            let _ = io::stdout().flush();
        });
    }

    /// Show, relabel or hide the activity spinner
    pub fn set_activity(&mut self, label: Option<&str>) {
        match (label, &self.spinner) {
            (Some(label), Some(spinner)) => spinner.set_message(label.to_string()),
            (Some(label), None) => {
                let spinner = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::default_spinner().template(SPINNER_TEMPLATE) {
                    spinner.set_style(style);
                }
                spinner.set_message(label.to_string());
                spinner.enable_steady_tick(Duration::from_millis(100));
                self.spinner = Some(spinner);
            }
            (None, _) => {
                if let Some(spinner) = self.spinner.take() {
                    spinner.finish_and_clear();
                }
            }
        }
    }

    /// Progress bars for a batch of uploads
    pub fn upload_bars(&self, names: &[String]) -> UploadBars {
        let multi = MultiProgress::new();
        let bars = names
            .iter()
            .map(|name| {
                let bar = multi.add(ProgressBar::new(100));
                if let Ok(style) = ProgressStyle::default_bar().template(UPLOAD_TEMPLATE) {
                    bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏ "));
                }
                bar.set_message(name.clone());
                bar
            })
            .collect();
        UploadBars { bars }
    }

    /// Prompt shown before each input line
    pub fn prompt(&self, label: &str) {
        self.write(&format!("{} ", label.cyan().bold()));
    }

    fn emit(&self, print: impl FnOnce()) {
        match &self.spinner {
            Some(spinner) => spinner.suspend(print),
            None => print(),
        }
    }
}

/// One bar per uploading file
pub struct UploadBars {
    bars: Vec<ProgressBar>,
}

impl UploadBars {
    pub fn set(&self, index: usize, progress: u8) {
        if let Some(bar) = self.bars.get(index) {
            bar.set_position(u64::from(progress));
        }
    }

    pub fn finish(&self, index: usize, message: &str) {
        if let Some(bar) = self.bars.get(index) {
            bar.finish_with_message(message.to_string());
        }
    }
}
