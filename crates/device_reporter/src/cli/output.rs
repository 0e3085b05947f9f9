//! Output formatting for CLI commands

use chrono::{DateTime, Local, Utc};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use device_reporter_db::FileStatus;

/// Print a table with headers and rows
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    println!("{}", table);
}

/// Print a table with custom column colors
pub fn print_table_colored(headers: &[&str], rows: Vec<Vec<(String, Option<Color>)>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        let cells: Vec<Cell> = row
            .into_iter()
            .map(|(text, color)| {
                let cell = Cell::new(text);
                if let Some(c) = color {
                    cell.fg(c)
                } else {
                    cell
                }
            })
            .collect();
        table.add_row(cells);
    }

    println!("{}", table);
}

pub fn status_color(status: FileStatus) -> Color {
    match status {
        FileStatus::Pending => Color::Grey,
        FileStatus::Processing => Color::Yellow,
        FileStatus::Done => Color::Green,
        FileStatus::Error => Color::Red,
    }
}

/// Local wall-clock time, or `-` when unset
pub fn format_timestamp(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => {
            let local: DateTime<Local> = at.into();
            local.format("%Y-%m-%d %H:%M:%S").to_string()
        }
        None => "-".to_string(),
    }
}

/// Shorten `text` to at most `max` characters, marking the cut with `...`
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}
