//! Formatted output helpers for CLI commands.

/// Columns are separated by at least this many spaces.
const COLUMN_GAP: usize = 3;

/// Renders `rows` under `headers` as left-aligned columns.
///
/// Each column is as wide as its widest cell. The last column is not
/// padded. Missing cells render empty.
#[must_use]
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = headers.iter().map(ToString::to_string).collect();
    for line in std::iter::once(&header).chain(rows) {
        let last = widths.len().saturating_sub(1);
        for (i, width) in widths.iter().enumerate() {
            let cell = line.get(i).map_or("", String::as_str);
            if i == last {
                out.push_str(cell);
            } else {
                out.push_str(cell);
                let pad = width - cell.chars().count() + COLUMN_GAP;
                out.extend(std::iter::repeat_n(' ', pad));
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_only_table() {
        assert_eq!(render_table(&["NAME", "DRIVER"], &[]), "NAME   DRIVER\n");
    }

    #[test]
    fn columns_align_to_widest_cell() {
        let rows = vec![
            vec!["testbr".to_string(), "bridge".to_string()],
            vec!["a".to_string(), "bridge".to_string()],
        ];
        let table = render_table(&["NAME", "DRIVER"], &rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "NAME     DRIVER");
        assert_eq!(lines[1], "testbr   bridge");
        assert_eq!(lines[2], "a        bridge");
    }

    #[test]
    fn short_rows_render_empty_cells() {
        let rows = vec![vec!["x".to_string()]];
        let table = render_table(&["A", "B", "C"], &rows);
        let line = table.lines().nth(1).unwrap();
        assert_eq!(line.trim_end(), "x");
        assert_eq!(line.len(), "A   B   ".len());
    }
}
