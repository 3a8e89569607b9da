//! Query templates with `&name` placeholders.
//!
//! A template is plain SQL in which every `&name` token stands for a value
//! supplied by the operator at run time. Binding never splices values into
//! the SQL text: each occurrence becomes its own PostgreSQL positional marker
//! (`$1`, `$2`, ...) and the values travel separately as parameters.

use crate::error::{Result, RunnerError};
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use std::sync::LazyLock;

/// Marker that introduces a placeholder.
pub const PLACEHOLDER_MARKER: char = '&';

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&\w+").expect("placeholder pattern is valid")
});

/// A single placeholder occurrence inside a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Name without the leading `&`.
    pub name: String,
    /// Byte range of the whole token (marker included) in the template.
    pub span: Range<usize>,
}

/// A parsed query template.
#[derive(Debug, Clone)]
pub struct QueryTemplate {
    sql: String,
    placeholders: Vec<Placeholder>,
}

/// SQL ready for execution plus its positional parameters.
///
/// `params[i]` binds to marker `$i+1` in `sql`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundStatement {
    pub sql: String,
    pub params: Vec<String>,
    /// Byte range of each marker in `sql` and the zero-based parameter it refers to.
    markers: Vec<(Range<usize>, usize)>,
}

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$([0-9]+)").expect("marker pattern is valid")
});

impl BoundStatement {
    /// Creates a statement without parameters.
    pub fn plain(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Self::default()
        }
    }

    /// Creates a statement from SQL that already uses `$n` markers.
    pub fn new(sql: impl Into<String>, params: Vec<String>) -> Self {
        let sql = sql.into();
        let markers = MARKER_RE
            .captures_iter(&sql)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let position: usize = caps[1].parse().ok()?;
                (1..=params.len())
                    .contains(&position)
                    .then(|| (whole.range(), position - 1))
            })
            .collect();

        Self {
            sql,
            params,
            markers,
        }
    }

    /// Returns the SQL with every marker replaced by `render(index)`, where
    /// `index` is the zero-based parameter position.
    pub fn render_markers(&self, render: impl Fn(usize) -> String) -> String {
        let mut sql = String::with_capacity(self.sql.len());
        let mut cursor = 0;
        for (span, index) in &self.markers {
            sql.push_str(&self.sql[cursor..span.start]);
            sql.push_str(&render(*index));
            cursor = span.end;
        }
        sql.push_str(&self.sql[cursor..]);
        sql
    }
}

impl QueryTemplate {
    /// Scans `sql` for placeholder tokens.
    pub fn parse(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let placeholders = PLACEHOLDER_RE
            .find_iter(&sql)
            .map(|m| Placeholder {
                name: m.as_str()[PLACEHOLDER_MARKER.len_utf8()..].to_string(),
                span: m.range(),
            })
            .collect();

        Self { sql, placeholders }
    }

    /// Returns the original template text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns every placeholder occurrence in template order, duplicates included.
    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    /// Returns true if the template has no placeholders.
    pub fn is_static(&self) -> bool {
        self.placeholders.is_empty()
    }

    /// Returns the distinct placeholder names, sorted alphabetically.
    pub fn unique_names(&self) -> Vec<&str> {
        self.placeholders
            .iter()
            .map(|p| p.name.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Replaces every placeholder with a positional marker and lines up the
    /// values, one per occurrence.
    ///
    /// Every name must have an entry in `values`; the same value is reused for
    /// all occurrences of a name.
    pub fn bind(&self, values: &HashMap<String, String>) -> Result<BoundStatement> {
        let mut sql = String::with_capacity(self.sql.len());
        let mut params = Vec::with_capacity(self.placeholders.len());
        let mut markers = Vec::with_capacity(self.placeholders.len());
        let mut cursor = 0;

        for (index, placeholder) in self.placeholders.iter().enumerate() {
            let value = values.get(&placeholder.name).ok_or_else(|| {
                RunnerError::unexpected(format!(
                    "No value supplied for parameter '{}'",
                    placeholder.name
                ))
            })?;

            sql.push_str(&self.sql[cursor..placeholder.span.start]);
            let start = sql.len();
            sql.push('$');
            sql.push_str(&(index + 1).to_string());
            markers.push((start..sql.len(), index));
            params.push(value.clone());
            cursor = placeholder.span.end;
        }
        sql.push_str(&self.sql[cursor..]);

        Ok(BoundStatement {
            sql,
            params,
            markers,
        })
    }
}
