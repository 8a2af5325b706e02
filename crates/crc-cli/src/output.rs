//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow().bold(), message);
}

/// Format an hourly price
pub fn format_price(price: f64) -> String {
    format!("${price:.4}/h")
}

/// Format an attribute amount without trailing zeros
pub fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(0.1234), "$0.1234/h");
        assert_eq!(format_price(0.0), "$0.0000/h");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(16.0), "16");
        assert_eq!(format_amount(7.5), "7.5");
    }
}
