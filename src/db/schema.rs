use serde::{Deserialize, Serialize};

/// Whether an introspected relation is a base table or a view
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TableKind {
    #[serde(rename = "BASE TABLE")]
    Table,
    #[serde(rename = "VIEW")]
    View,
}

impl TableKind {
    /// Map an `INFORMATION_SCHEMA.TABLES.TABLE_TYPE` value.
    pub fn from_table_type(table_type: &str) -> Option<Self> {
        match table_type {
            "BASE TABLE" => Some(TableKind::Table),
            "VIEW" | "SYSTEM VIEW" => Some(TableKind::View),
            _ => None,
        }
    }
}

/// Key role of a column, inferred from the RDBMS key classification.
///
/// Serialized as the marker it was inferred from so snapshots stay readable
/// by anything that already understands `COLUMN_KEY`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum KeyRole {
    #[serde(rename = "PRI")]
    Primary,
    #[serde(rename = "UNI")]
    Unique,
    #[serde(rename = "MUL")]
    Indexed,
    #[default]
    #[serde(rename = "")]
    None,
}

impl KeyRole {
    pub fn from_column_key(column_key: &str) -> Self {
        match column_key.trim().to_ascii_uppercase().as_str() {
            "PRI" => KeyRole::Primary,
            "UNI" => KeyRole::Unique,
            "MUL" => KeyRole::Indexed,
            _ => KeyRole::None,
        }
    }
}

/// Represents a column in a table or view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnMetadata {
    pub name: String,
    /// Declared type exactly as reported, e.g. `varchar(255)`
    #[serde(rename = "type")]
    pub column_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    #[serde(rename = "key")]
    pub key_role: KeyRole,
}

/// Represents a single table or view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TableKind,
    pub columns: Vec<ColumnMetadata>,
}

/// The introspected schema of a target database, as stored in a snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableMetadata>,
    pub views: Vec<TableMetadata>,
}

/// A persisted schema snapshot for a registered database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetadataSnapshot {
    pub database_id: i64,
    pub tables: Vec<TableMetadata>,
    pub views: Vec<TableMetadata>,
    pub updated_at: String,
}

impl MetadataSnapshot {
    pub fn schema(&self) -> SchemaSnapshot {
        SchemaSnapshot {
            tables: self.tables.clone(),
            views: self.views.clone(),
        }
    }
}

/// Represents a result row as an insertion-ordered map of column names to JSON values
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Normalized result of a single query execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    /// Wall-clock execution time in milliseconds
    #[serde(rename = "executionTime")]
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Build a result from driver rows; column order comes from the first row.
    pub fn from_rows(rows: Vec<Row>, execution_time_ms: u64) -> Self {
        let columns = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Self {
            columns,
            row_count: rows.len(),
            rows,
            execution_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_role_from_column_key() {
        assert_eq!(KeyRole::from_column_key("PRI"), KeyRole::Primary);
        assert_eq!(KeyRole::from_column_key("UNI"), KeyRole::Unique);
        assert_eq!(KeyRole::from_column_key("MUL"), KeyRole::Indexed);
        assert_eq!(KeyRole::from_column_key(""), KeyRole::None);
        assert_eq!(KeyRole::from_column_key("pri"), KeyRole::Primary);
    }

    #[test]
    fn test_column_wire_format() {
        let col = ColumnMetadata {
            name: "id".into(),
            column_type: "int unsigned".into(),
            nullable: false,
            default: None,
            key_role: KeyRole::Primary,
        };
        let value = serde_json::to_value(&col).unwrap();
        assert_eq!(
            value,
            json!({"name": "id", "type": "int unsigned", "nullable": false, "default": null, "key": "PRI"})
        );
        let back: ColumnMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(back, col);
    }

    #[test]
    fn test_table_kind_wire_format() {
        assert_eq!(serde_json::to_value(TableKind::Table).unwrap(), json!("BASE TABLE"));
        assert_eq!(serde_json::to_value(TableKind::View).unwrap(), json!("VIEW"));
        assert_eq!(TableKind::from_table_type("BASE TABLE"), Some(TableKind::Table));
        assert_eq!(TableKind::from_table_type("VIEW"), Some(TableKind::View));
        assert_eq!(TableKind::from_table_type("SEQUENCE"), None);
    }

    #[test]
    fn test_query_result_columns_follow_first_row() {
        let mut first = Row::new();
        first.insert("name".into(), json!("ada"));
        first.insert("id".into(), json!(1));
        let mut second = Row::new();
        second.insert("name".into(), json!("grace"));
        second.insert("id".into(), json!(2));

        let result = QueryResult::from_rows(vec![first, second], 7);
        assert_eq!(result.columns, vec!["name", "id"]);
        assert_eq!(result.row_count, 2);
        assert_eq!(result.execution_time_ms, 7);
    }

    #[test]
    fn test_query_result_empty() {
        let result = QueryResult::from_rows(Vec::new(), 3);
        assert!(result.columns.is_empty());
        assert_eq!(result.row_count, 0);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({"columns": [], "rows": [], "rowCount": 0, "executionTime": 3})
        );
    }
}
