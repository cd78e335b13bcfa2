use super::{TabularFormatter, Table};
use serde_json::{Map, Value};

pub struct JsonFormatter<'a> {
    omit_fields: Vec<&'a str>,
    no_headers: bool,
}

impl<'a> JsonFormatter<'a> {
    pub fn new(omit_fields: Vec<&'a str>, no_headers: bool) -> Self {
        Self {
            omit_fields,
            no_headers,
        }
    }
}

impl TabularFormatter for JsonFormatter<'_> {
    type Error = serde_json::Error;

    /// Objects keyed by header, or bare arrays when headers are disabled.
    fn format(&self, table: &Table) -> Result<String, Self::Error> {
        let columns = table.visible_columns(&self.omit_fields);
        let rows: Vec<Value> = (0..table.rows.len())
            .map(|row| {
                let cells = columns
                    .iter()
                    .map(|&column| (table.headers[column], table.cell(row, column)));
                if self.no_headers {
                    Value::Array(cells.map(|(_, cell)| Value::from(cell)).collect())
                } else {
                    Value::Object(
                        cells
                            .map(|(header, cell)| (header.to_string(), Value::from(cell)))
                            .collect::<Map<_, _>>(),
                    )
                }
            })
            .collect();
        serde_json::to_string(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> Table<'static> {
        Table::new(
            &["profile", "credentials"],
            vec![
                vec!["dev".into(), "****************MPLE".into()],
                vec!["prod".into(), "-".into()],
            ],
        )
    }

    #[test]
    fn test_json_formatter() {
        let output = JsonFormatter::new(vec!["credentials"], false)
            .format(&table())
            .unwrap();
        assert_eq!(output, json!([{"profile": "dev"}, {"profile": "prod"}]).to_string());

        let output = JsonFormatter::new(vec![], true).format(&table()).unwrap();
        assert_eq!(
            output,
            json!([["dev", "****************MPLE"], ["prod", "-"]]).to_string()
        );
    }
}
