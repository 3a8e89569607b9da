//! Text and JSON rendering of query results.

use crate::db::{QueryResult, Value};
use serde_json::{Map, Value as JsonValue};

/// Minimum width for any column.
const MIN_COLUMN_WIDTH: usize = 4;

/// How result sets are written out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Bordered text table.
    #[default]
    Table,
    /// JSON array of objects, one per row.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "text" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid output format: {s}. Expected: table or json"
            )),
        }
    }
}

/// Renders `result` in the requested format.
pub fn render(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => ResultTable::new(result).render(),
        OutputFormat::Json => render_json(result),
    }
}

/// Plain-text table with box-drawing borders.
pub struct ResultTable<'a> {
    result: &'a QueryResult,
}

impl<'a> ResultTable<'a> {
    /// Creates a new result table.
    pub fn new(result: &'a QueryResult) -> Self {
        Self { result }
    }

    /// Width of each column: the widest of its header and cells, in chars.
    fn calculate_column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self
            .result
            .columns
            .iter()
            .map(|col| display_width(&col.name).max(MIN_COLUMN_WIDTH))
            .collect();

        for row in &self.result.rows {
            for (i, value) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(display_width(&value.to_display_string()));
                }
            }
        }

        widths
    }

    /// Renders the whole table, footer included, as newline-separated lines.
    pub fn render(&self) -> String {
        self.render_to_lines().join("\n")
    }

    /// Renders the table to one string per output line.
    pub fn render_to_lines(&self) -> Vec<String> {
        if self.result.columns.is_empty() {
            return vec!["(sin columnas)".to_string()];
        }

        let widths = self.calculate_column_widths();
        let mut lines = Vec::with_capacity(self.result.rows.len() + 5);

        lines.push(render_border(&widths, '┌', '┬', '┐'));
        lines.push(self.render_header_row(&widths));
        lines.push(render_border(&widths, '├', '┼', '┤'));
        for row in &self.result.rows {
            lines.push(render_data_row(row, &widths));
        }
        lines.push(render_border(&widths, '└', '┴', '┘'));

        let count = self.result.row_count();
        lines.push(format!(
            "{} fila{} ({} ms)",
            count,
            if count == 1 { "" } else { "s" },
            self.result.execution_time.as_millis()
        ));

        lines
    }

    fn render_header_row(&self, widths: &[usize]) -> String {
        let mut line = String::from("│");
        for (col, &width) in self.result.columns.iter().zip(widths) {
            line.push(' ');
            line.push_str(&pad_right(&col.name, width));
            line.push_str(" │");
        }
        line
    }
}

fn render_border(widths: &[usize], left: char, mid: char, right: char) -> String {
    let mut border = String::new();
    border.push(left);
    for (i, &width) in widths.iter().enumerate() {
        border.push_str(&"─".repeat(width + 2));
        if i < widths.len() - 1 {
            border.push(mid);
        }
    }
    border.push(right);
    border
}

fn render_data_row(row: &[Value], widths: &[usize]) -> String {
    let mut line = String::from("│");
    for (i, &width) in widths.iter().enumerate() {
        let value = row.get(i).unwrap_or(&Value::Null);
        let text = value.to_display_string();
        line.push(' ');
        if value.is_numeric() {
            line.push_str(&pad_left(&text, width));
        } else {
            line.push_str(&pad_right(&text, width));
        }
        line.push_str(" │");
    }
    line
}

fn display_width(s: &str) -> usize {
    s.chars().count()
}

fn pad_right(s: &str, width: usize) -> String {
    let fill = width.saturating_sub(display_width(s));
    format!("{s}{}", " ".repeat(fill))
}

fn pad_left(s: &str, width: usize) -> String {
    let fill = width.saturating_sub(display_width(s));
    format!("{}{s}", " ".repeat(fill))
}

/// Renders rows as a pretty-printed JSON array of objects.
pub fn render_json(result: &QueryResult) -> String {
    let rows: Vec<JsonValue> = result
        .rows
        .iter()
        .map(|row| {
            let object: Map<String, JsonValue> = result
                .columns
                .iter()
                .zip(row)
                .map(|(col, value)| (col.name.clone(), value.to_json()))
                .collect();
            JsonValue::Object(object)
        })
        .collect();

    serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
}
