//! Nested record flattening.
//!
//! One depth-first walk serves two purposes: enumerating column declarations
//! from a template object, and producing the name/value pairs for a single
//! row. Both sides share the same skip rule so schema and rows can never
//! disagree about which fields exist:
//!
//! - nested objects are descended into directly, without prefixing the
//!   parent name (two branches sharing a leaf name therefore collide; the
//!   shipped templates are laid out so they never do)
//! - null branches are dropped wholly: no column, no value, no descent
//! - values with no scalar representation (arrays included) are dropped the
//!   same way
//!
//! Traversal follows serde_json's object ordering (lexicographic by key),
//! which is stable for a given document, so a template always yields the
//! same column list.

use crate::sql_value::SqlScalar;
use serde_json::{Map, Value};

/// One column declaration derived from a template leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Unquoted column name, exactly the leaf field name.
    pub name: String,
    /// Inferred SQL type (INTEGER, REAL, TEXT, NUMERIC).
    pub sql_type: &'static str,
}

/// Parallel column-name / value sequences for one row.
///
/// Both vectors are filled by the same traversal with one push per kept
/// leaf, so `names.len() == values.len()` holds by construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatRow {
    pub names: Vec<String>,
    pub values: Vec<SqlScalar>,
}

impl FlatRow {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Enumerate column declarations for a template object.
pub fn schema_columns(template: &Value) -> Vec<ColumnDef> {
    let mut columns = Vec::new();
    if let Value::Object(map) = template {
        collect_columns(map, &mut columns);
    }
    columns
}

fn collect_columns(map: &Map<String, Value>, out: &mut Vec<ColumnDef>) {
    for (name, value) in map {
        match value {
            Value::Object(nested) => collect_columns(nested, out),
            leaf => {
                if let Some(scalar) = SqlScalar::from_json(leaf) {
                    out.push(ColumnDef {
                        name: name.clone(),
                        sql_type: scalar.sql_type(),
                    });
                }
            }
        }
    }
}

/// Flatten one record into parallel name/value sequences.
pub fn flatten_record(record: &Value) -> FlatRow {
    let mut row = FlatRow::default();
    if let Value::Object(map) = record {
        collect_values(map, &mut row);
    }
    row
}

fn collect_values(map: &Map<String, Value>, row: &mut FlatRow) {
    for (name, value) in map {
        match value {
            Value::Object(nested) => collect_values(nested, row),
            leaf => {
                if let Some(scalar) = SqlScalar::from_json(leaf) {
                    row.names.push(name.clone());
                    row.values.push(scalar);
                }
            }
        }
    }
}

/// Quote an identifier so reserved words (`OR`, `OS`) work as column names.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_template() -> Value {
        json!({
            "userId": "user-1",
            "duration": 60000,
            "mediaLost": false,
            "qosItems": {
                "PR": 100,
                "PLL": 1,
                "skippedBranch": null
            },
            "unexported": null
        })
    }

    #[test]
    fn test_schema_columns_counts_kept_leaves() {
        let columns = schema_columns(&create_test_template());
        // 5 non-null leaves survive; the two nulls are skipped.
        assert_eq!(columns.len(), 5);
    }

    #[test]
    fn test_schema_columns_order_is_stable() {
        let names: Vec<String> = schema_columns(&create_test_template())
            .into_iter()
            .map(|c| c.name)
            .collect();
        // Lexicographic at each level, nested leaves inline at their
        // parent's position.
        assert_eq!(
            names,
            vec!["duration", "mediaLost", "PLL", "PR", "userId"]
        );
    }

    #[test]
    fn test_schema_columns_infers_types() {
        let columns = schema_columns(&json!({
            "count": 3,
            "ratio": 0.5,
            "label": "x",
            "flag": true
        }));
        let types: Vec<&str> = columns.iter().map(|c| c.sql_type).collect();
        assert_eq!(types, vec!["INTEGER", "NUMERIC", "TEXT", "REAL"]);
    }

    #[test]
    fn test_flatten_record_parallel_invariant() {
        let row = flatten_record(&create_test_template());
        assert_eq!(row.names.len(), row.values.len());
        assert_eq!(row.len(), 5);
    }

    #[test]
    fn test_flatten_record_skips_null_branch_entirely() {
        let row = flatten_record(&json!({
            "kept": 1,
            "dropped": null
        }));
        assert_eq!(row.names, vec!["kept"]);
        assert_eq!(row.values, vec![SqlScalar::Integer(1)]);
    }

    #[test]
    fn test_flatten_record_skips_arrays() {
        let row = flatten_record(&json!({
            "series": [1, 2, 3],
            "total": 6
        }));
        assert_eq!(row.names, vec!["total"]);
    }

    #[test]
    fn test_nested_names_are_not_prefixed() {
        let row = flatten_record(&json!({
            "outer": { "inner": "v" }
        }));
        assert_eq!(row.names, vec!["inner"]);
    }

    #[test]
    fn test_colliding_leaf_names_are_both_emitted() {
        // The no-prefix walk keeps collisions visible instead of merging
        // them; the database rejects the duplicate downstream.
        let row = flatten_record(&json!({
            "a": { "id": 1 },
            "b": { "id": 2 }
        }));
        assert_eq!(row.names, vec!["id", "id"]);
    }

    #[test]
    fn test_quote_ident_handles_reserved_words() {
        assert_eq!(quote_ident("OR"), "\"OR\"");
        assert_eq!(quote_ident("with\"quote"), "\"with\"\"quote\"");
    }

    #[test]
    fn test_non_object_inputs_yield_nothing() {
        assert!(schema_columns(&json!(42)).is_empty());
        assert!(flatten_record(&json!("text")).is_empty());
    }
}
