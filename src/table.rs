//! Aligned plain-text tables for terminal output.

use std::{borrow::Cow, fmt::Write as _};

/// Cells longer than this are cut and end with `…`.
pub const MAX_CELL_WIDTH: usize = 48;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let headers = headers.iter().map(|h| clip(h)).collect::<Vec<_>>();
    let rows = rows
        .iter()
        .map(|row| row.iter().take(column_count).map(|c| clip(c)).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(&headers, &widths));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths));
    for row in &rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

/// Two-column `label  value` listing under a title line.
pub fn render_pairs(title: &str, pairs: &[(String, String)]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{title}");
    if pairs.is_empty() {
        let _ = writeln!(output, "  (none)");
        return output;
    }
    let labels = pairs.iter().map(|(l, _)| clip(l)).collect::<Vec<_>>();
    let width = labels.iter().map(|l| display_width(l)).max().unwrap_or(0);
    for (label, (_, value)) in labels.iter().zip(pairs) {
        let padding = width.saturating_sub(display_width(label));
        let _ = writeln!(output, "  {label}{}  {}", " ".repeat(padding), sanitize_cell(value));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row<S: AsRef<str>>(values: &[S], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let value = value.as_ref();
            let padding = width.saturating_sub(display_width(value));
            format!("{value}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    let trimmed = line.trim_end().len();
    line.truncate(trimmed);
    line
}

fn clip(value: &str) -> String {
    let sanitized = sanitize_cell(value);
    if display_width(&sanitized) <= MAX_CELL_WIDTH {
        return sanitized.into_owned();
    }
    let mut clipped = sanitized
        .chars()
        .take(MAX_CELL_WIDTH - 1)
        .collect::<String>();
    clipped.push('…');
    clipped
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
