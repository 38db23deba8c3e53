//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use guincoin_core::{MatchTier, PendingStatus};
use rust_decimal::Decimal;

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Coin amounts always show two decimals
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

/// Confidence as a whole percentage
pub fn format_confidence(confidence: f64) -> String {
    format!("{}%", (confidence * 100.0).round() as i64)
}

/// Tier label colored green, yellow or red
pub fn tier_cell(tier: MatchTier) -> Cell {
    let color = match tier {
        MatchTier::Auto => Color::Green,
        MatchTier::Review => Color::Yellow,
        MatchTier::Manual => Color::Red,
    };
    Cell::new(tier.label()).fg(color)
}

pub fn status_cell(status: PendingStatus) -> Cell {
    let color = match status {
        PendingStatus::Pending => Color::Yellow,
        PendingStatus::Claimed => Color::Green,
        PendingStatus::Expired => Color::DarkGrey,
    };
    Cell::new(status.as_str()).fg(color)
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::new(100, 0)), "100.00");
        assert_eq!(format_amount(Decimal::new(2550, 2)), "25.50");
    }

    #[test]
    fn test_format_confidence() {
        assert_eq!(format_confidence(0.765), "77%");
        assert_eq!(format_confidence(1.0), "100%");
        assert_eq!(format_confidence(0.0), "0%");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}
