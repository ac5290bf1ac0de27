//! Row and cell value types
//!
//! A [`Row`] is an ordered list of named [`Cell`]s. Cell values are JSON
//! values so readers can emit strings, numbers or nested data alike.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single named value within a row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Column name
    pub name: String,
    /// Cell value
    pub value: serde_json::Value,
}

impl Cell {
    /// Create a new cell
    pub fn new(name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An ordered collection of cells
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    /// Create a row from cells
    pub fn of(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Build a row by zipping column names with values
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<serde_json::Value>,
    {
        Self {
            cells: pairs.into_iter().map(|(n, v)| Cell::new(n, v)).collect(),
        }
    }

    /// Cells in column order
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Look up a cell value by column name
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.cells.iter().find(|c| c.name == name).map(|c| &c.value)
    }

    /// Render as a JSON object keyed by column name
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .cells
            .iter()
            .map(|c| (c.name.clone(), c.value.clone()))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup() {
        let row = Row::from_pairs([("id", "1"), ("name", "alice")]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("name"), Some(&serde_json::json!("alice")));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_row_to_json() {
        let row = Row::of(vec![Cell::new("id", 7), Cell::new("ok", true)]);
        assert_eq!(row.to_json(), serde_json::json!({"id": 7, "ok": true}));
    }
}
