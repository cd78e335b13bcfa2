pub mod json;
pub mod text;

/// String cells under named columns.
pub struct Table<'h> {
    headers: &'h [&'h str],
    rows: Vec<Vec<String>>,
}

impl<'h> Table<'h> {
    pub fn new(headers: &'h [&'h str], rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Indices of the columns not named in `omit_fields`.
    fn visible_columns(&self, omit_fields: &[&str]) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .filter(|(_, header)| !omit_fields.contains(header))
            .map(|(i, _)| i)
            .collect()
    }

    fn cell(&self, row: usize, column: usize) -> &str {
        self.rows[row].get(column).map_or("", String::as_str)
    }
}

pub trait TabularFormatter {
    type Error: std::error::Error + 'static;
    fn format(&self, table: &Table) -> Result<String, Self::Error>;
}
