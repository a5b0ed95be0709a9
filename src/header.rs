//! Header row location in raw sheet grids.

use crate::dataset::Row;

pub const DEFAULT_ANCHORS: &[&str] = &["застройщик", "компания", "developer", "company"];

/// Index of the first row where any cell contains an anchor (case-insensitive).
///
/// With no anchors configured the first non-empty row is taken.
pub fn locate_header<S: AsRef<str>>(grid: &[Row], anchors: &[S]) -> Option<usize> {
    let anchors = anchors
        .iter()
        .map(|a| a.as_ref().trim().to_lowercase())
        .filter(|a| !a.is_empty())
        .collect::<Vec<_>>();
    grid.iter().position(|row| {
        if anchors.is_empty() {
            return row.iter().any(|cell| cell.is_some());
        }
        row.iter().flatten().any(|cell| {
            let text = cell.as_display().to_lowercase();
            anchors.iter().any(|anchor| text.contains(anchor.as_str()))
        })
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderSplit {
    pub header_row: usize,
    pub labels: Vec<String>,
    pub rows: Vec<Row>,
}

/// Splits a grid into header labels and the data rows below it.
///
/// Rows above the header are discarded, as are fully empty data rows.
pub fn split_at_header<S: AsRef<str>>(grid: &[Row], anchors: &[S]) -> Option<HeaderSplit> {
    let header_row = locate_header(grid, anchors)?;
    let labels = grid[header_row]
        .iter()
        .map(|cell| cell.as_ref().map(|v| v.as_display()).unwrap_or_default())
        .collect::<Vec<_>>();
    let rows = grid[header_row + 1..]
        .iter()
        .filter(|row| row.iter().any(|cell| cell.is_some()))
        .cloned()
        .collect();
    Some(HeaderSplit {
        header_row,
        labels,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn row(cells: &[&str]) -> Row {
        cells
            .iter()
            .map(|c| {
                if c.is_empty() {
                    None
                } else {
                    Some(Value::String(c.to_string()))
                }
            })
            .collect()
    }

    #[test]
    fn locate_header_skips_title_rows() {
        let grid = vec![
            row(&["Реестр объектов на 01.01.2025", ""]),
            row(&["", ""]),
            row(&["№", "Наименование застройщика"]),
            row(&["1", "ТОО Альфа"]),
            row(&["2", "Застройщик Бета"]),
        ];
        assert_eq!(locate_header(&grid, DEFAULT_ANCHORS), Some(2));
    }

    #[test]
    fn locate_header_rejects_sheet_without_anchor() {
        let grid = vec![row(&["Итого", "15"]), row(&["Примечание", ""])];
        assert_eq!(locate_header(&grid, DEFAULT_ANCHORS), None);
    }

    #[test]
    fn locate_header_without_anchors_takes_first_non_empty_row() {
        let grid = vec![row(&["", ""]), row(&["a", "b"])];
        let anchors: &[&str] = &[];
        assert_eq!(locate_header(&grid, anchors), Some(1));
    }

    #[test]
    fn split_at_header_drops_blank_rows() {
        let grid = vec![
            row(&["title"]),
            row(&["Company", "Amount"]),
            row(&["", ""]),
            row(&["Acme", "100"]),
        ];
        let split = split_at_header(&grid, DEFAULT_ANCHORS).unwrap();
        assert_eq!(split.header_row, 1);
        assert_eq!(split.labels, vec!["Company", "Amount"]);
        assert_eq!(split.rows, vec![row(&["Acme", "100"])]);
    }
}
