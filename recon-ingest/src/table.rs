/// A row-major table of string cells, as produced by the file reader before any
/// normalization has run. Column lookups are case-insensitive throughout the
/// normalizer (spec.md §4.3).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    #[must_use]
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Drops columns `[0, count)` from every row and the header, in place
    /// (spec.md §4.3 step 2 / SPEC_FULL.md C.4).
    pub fn drop_leading_columns(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        let count = count.min(self.headers.len());
        self.headers.drain(0..count);
        for row in &mut self.rows {
            let drain_len = count.min(row.len());
            row.drain(0..drain_len);
        }
    }

    /// Truncates the table to rows strictly before the first row containing `marker`
    /// in any column (case-insensitive substring match). A no-op if `marker` never
    /// occurs (spec.md §4.3 step 3 / SPEC_FULL.md C.3).
    pub fn truncate_before_marker(&mut self, marker: &str) {
        let marker = marker.to_ascii_lowercase();
        if let Some(index) = self.rows.iter().position(|row| {
            row.iter()
                .any(|cell| cell.to_ascii_lowercase().contains(&marker))
        }) {
            self.rows.truncate(index);
        }
    }

    #[must_use]
    pub fn cell(&self, row: &[String], name: &str) -> Option<String> {
        self.column_index(name)
            .and_then(|index| row.get(index))
            .cloned()
    }
}
