//! CLI presenter for output formatting

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Width of the level meter in blocks
const METER_WIDTH: usize = 20;

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
}

impl Presenter {
    /// Create a new presenter
    pub fn new() -> Self {
        Self { spinner: None }
    }

    /// Start a spinner with a message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    /// Update the spinner message
    pub fn update_spinner(&self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Show the live input level on the spinner
    pub fn update_level(&self, level: f32) {
        self.update_spinner(&format!("Recording {}", Self::level_bar(level)));
    }

    /// Stop the spinner without a status mark
    pub fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Output text to stdout (the actual annotation output)
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }

    /// Render a normalized level as a fixed-width bar
    fn level_bar(level: f32) -> String {
        let clamped = level.clamp(0.0, 1.0);
        let filled = (clamped * METER_WIDTH as f32).round() as usize;
        let filled = filled.min(METER_WIDTH);
        format!(
            "[{}{}]",
            "█".repeat(filled).cyan(),
            "░".repeat(METER_WIDTH - filled)
        )
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_bar_empty() {
        let bar = Presenter::level_bar(0.0);
        assert!(bar.contains(&"░".repeat(METER_WIDTH)));
    }

    #[test]
    fn level_bar_full() {
        let bar = Presenter::level_bar(1.0);
        assert!(bar.contains(&"█".repeat(METER_WIDTH)));
    }

    #[test]
    fn level_bar_clamps_out_of_range() {
        assert_eq!(Presenter::level_bar(2.0), Presenter::level_bar(1.0));
        assert_eq!(Presenter::level_bar(-1.0), Presenter::level_bar(0.0));
    }
}
