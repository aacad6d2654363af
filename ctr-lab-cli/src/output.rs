//! Output formatting for CLI

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use ctr_lab_metrics::Histogram;
use serde::{Deserialize, Serialize};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Compact format (single line per item)
    Compact,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
            Self::Compact => write!(f, "compact"),
        }
    }
}

/// Output writer that handles different formats
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat, no_color: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write a single item
    pub fn write<T: Serialize + TableDisplay>(&self, item: &T) -> Result<()> {
        match self.format {
            OutputFormat::Table => {
                item.display_single();
            }
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(item)?;
                println!("{}", json);
            }
            OutputFormat::Yaml => {
                let yaml = serde_yaml::to_string(item)?;
                print!("{}", yaml);
            }
            OutputFormat::Compact => {
                item.display_compact();
            }
        }
        Ok(())
    }

    /// Write a plain line; structured formats get it verbatim.
    pub fn line(&self, message: &str) {
        println!("{}", message);
    }

    /// Write a warning message
    pub fn warning(&self, message: &str) {
        if self.format == OutputFormat::Table {
            eprintln!("{} {}", "⚠".yellow(), message);
        } else {
            eprintln!("Warning: {}", message);
        }
    }

    /// Start a spinner for long operations. Only shown for table output so
    /// structured output stays machine readable.
    pub fn spinner(&self, message: &str) -> Option<indicatif::ProgressBar> {
        if self.format != OutputFormat::Table {
            return None;
        }

        let pb = indicatif::ProgressBar::new_spinner();
        if let Ok(style) = indicatif::ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(pb)
    }
}

/// Trait for displaying items in a table
pub trait TableDisplay {
    /// Display a single item in detail
    fn display_single(&self);

    /// Display in compact format
    fn display_compact(&self);
}

/// Rounded UTF-8 table with cyan headers.
pub fn table(headers: &[&str], rows: Vec<Vec<Cell>>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }
    table
}

/// Print a key-value pair in detail format
pub fn print_field(key: &str, value: &str) {
    println!("  {}: {}", key.cyan(), value);
}

/// Print a section header
pub fn print_section(title: &str) {
    println!("\n{}", title.bold().underline());
}

pub fn format_percent(share: f64) -> String {
    format!("{:.1}%", share * 100.0)
}

/// One block character per histogram bin, scaled to the fullest bin.
pub fn sparkline(histogram: &Histogram) -> String {
    const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

    let max = histogram.bins.iter().map(|b| b.count).max().unwrap_or(0);
    if max == 0 {
        return String::new();
    }

    histogram
        .bins
        .iter()
        .map(|b| {
            let level = b.count * (BLOCKS.len() - 1) / max;
            BLOCKS[level]
        })
        .collect()
}

/// Colour a power figure against the target power.
pub fn power_badge(power: f64, target: f64) -> Cell {
    let text = format_percent(power);
    if power >= target {
        Cell::new(text).fg(Color::Green)
    } else if power >= target / 2.0 {
        Cell::new(text).fg(Color::Yellow)
    } else {
        Cell::new(text).fg(Color::Red)
    }
}

/// Colour a false positive rate against the nominal alpha.
pub fn fpr_badge(rate: f64, alpha: f64) -> Cell {
    let text = format_percent(rate);
    if rate <= alpha * 1.5 {
        Cell::new(text).fg(Color::Green)
    } else {
        Cell::new(text).fg(Color::Red)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctr_lab_metrics::MetricAggregator;

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Table.to_string(), "table");
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(OutputFormat::Yaml.to_string(), "yaml");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.05), "5.0%");
        assert_eq!(format_percent(0.8123), "81.2%");
        assert_eq!(format_percent(1.0), "100.0%");
    }

    #[test]
    fn test_sparkline() {
        let histogram = MetricAggregator::histogram_range(&[0.1, 0.1, 0.6, 0.9, 0.95], 4, 0.0, 1.0);
        assert_eq!(sparkline(&histogram), "█▁▄█");

        let empty = MetricAggregator::histogram_range(&[], 4, 0.0, 1.0);
        assert_eq!(sparkline(&empty), "");
    }
}
