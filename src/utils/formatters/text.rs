use super::{TabularFormatter, Table};
use std::convert::Infallible;

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

pub struct TextFormatter<'a> {
    omit_fields: Vec<&'a str>,
    no_headers: bool,
    separator: &'a str,
}

impl<'a> TextFormatter<'a> {
    pub fn new(omit_fields: Vec<&'a str>, no_headers: bool, separator: &'a str) -> Self {
        Self {
            omit_fields,
            no_headers,
            separator,
        }
    }

    fn push_line(&self, output: &mut String, cells: &[&str], widths: &[usize], bold: bool) {
        for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
            if bold {
                output.push_str(BOLD);
                output.push_str(cell);
                output.push_str(RESET);
            } else {
                output.push_str(cell);
            }
            if i != cells.len() - 1 {
                output.push_str(&" ".repeat(width - cell.chars().count()));
                output.push_str(self.separator);
            }
        }
    }
}

impl TabularFormatter for TextFormatter<'_> {
    type Error = Infallible;

    /// Aligned columns with a bold header and a dashed rule beneath it.
    fn format(&self, table: &Table) -> Result<String, Self::Error> {
        let columns = table.visible_columns(&self.omit_fields);
        let widths: Vec<usize> = columns
            .iter()
            .map(|&column| {
                (0..table.rows.len())
                    .map(|row| table.cell(row, column).chars().count())
                    .chain([table.headers[column].chars().count()])
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut lines = Vec::new();
        if !self.no_headers && !columns.is_empty() {
            let headers: Vec<&str> = columns.iter().map(|&c| table.headers[c]).collect();
            let mut header = String::new();
            self.push_line(&mut header, &headers, &widths, true);
            lines.push(header);
            let rule = widths.iter().sum::<usize>() + (widths.len() - 1) * self.separator.len();
            lines.push("-".repeat(rule));
        }
        for row in 0..table.rows.len() {
            let cells: Vec<&str> = columns.iter().map(|&c| table.cell(row, c)).collect();
            let mut line = String::new();
            self.push_line(&mut line, &cells, &widths, false);
            lines.push(line);
        }
        Ok(lines.join("\n"))
    }
}
