use super::{DatabaseConnector, RawColumn, RelationInfo};
use crate::db::connection_string::ConnectionDescriptor;
use crate::db::schema::Row;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, Value};
use serde_json::json;
use tokio::sync::Mutex;

/// Schemas that belong to the server itself and are never introspected.
pub const SYSTEM_SCHEMAS: [&str; 4] = ["mysql", "information_schema", "performance_schema", "sys"];

const RELATIONS_IN_DEFAULT_DB: &str = "SELECT TABLE_SCHEMA, TABLE_NAME, TABLE_TYPE \
     FROM INFORMATION_SCHEMA.TABLES \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE IN ('BASE TABLE', 'VIEW') \
     ORDER BY TABLE_NAME";

/// Relations across every schema except [`SYSTEM_SCHEMAS`], which are bound
/// as parameters in order.
fn relations_in_user_schemas() -> String {
    let placeholders = vec!["?"; SYSTEM_SCHEMAS.len()].join(", ");
    format!(
        "SELECT TABLE_SCHEMA, TABLE_NAME, TABLE_TYPE \
         FROM INFORMATION_SCHEMA.TABLES \
         WHERE TABLE_SCHEMA NOT IN ({placeholders}) \
         AND TABLE_TYPE IN ('BASE TABLE', 'VIEW') \
         ORDER BY TABLE_SCHEMA, TABLE_NAME"
    )
}

const COLUMNS_OF_RELATION: &str = "SELECT COLUMN_NAME, DATA_TYPE, COLUMN_TYPE, IS_NULLABLE, \
     COLUMN_DEFAULT, COLUMN_KEY \
     FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

/// MySQL connector using mysql_async
pub struct MySqlConnector {
    descriptor: ConnectionDescriptor,
    conn: Mutex<Option<Conn>>,
}

impl MySqlConnector {
    pub fn new(descriptor: ConnectionDescriptor) -> Self {
        Self {
            descriptor,
            conn: Mutex::new(None),
        }
    }

    /// Build mysql_async options from the descriptor.
    ///
    /// `localhost` is forced to IPv4 so the driver uses TCP rather than a socket
    /// that may not exist on this host.
    fn build_opts(&self) -> OptsBuilder {
        let host = match self.descriptor.host.as_str() {
            "localhost" => "127.0.0.1".to_string(),
            other => other.to_string(),
        };

        OptsBuilder::default()
            .ip_or_hostname(host)
            .tcp_port(self.descriptor.port)
            .user(self.descriptor.user.clone())
            .pass(self.descriptor.password.clone())
            .db_name(self.descriptor.database.clone())
            .prefer_socket(false)
    }

    /// Convert a mysql_async Row into our Row type, keeping column order
    fn row_to_map(row: &mysql_async::Row) -> Row {
        let mut map = Row::new();
        for (idx, col) in row.columns_ref().iter().enumerate() {
            let value = row
                .as_ref(idx)
                .map(|v| value_to_json(v, col.column_type()))
                .unwrap_or(serde_json::Value::Null);
            map.insert(col.name_str().into_owned(), value);
        }
        map
    }
}

#[async_trait]
impl DatabaseConnector for MySqlConnector {
    async fn connect(&mut self) -> anyhow::Result<()> {
        let conn = Conn::new(self.build_opts())
            .await
            .with_context(|| format!("Failed to connect to MySQL at {}", self.descriptor.address()))?;

        *self.conn.lock().await = Some(conn);
        Ok(())
    }

    async fn disconnect(&mut self) -> anyhow::Result<()> {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.disconnect().await.context("Failed to close MySQL connection")?;
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    async fn ping(&self) -> anyhow::Result<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| anyhow!("Not connected"))?;
        conn.ping().await.context("MySQL ping failed")?;
        Ok(())
    }

    async fn list_relations(&self) -> anyhow::Result<Vec<RelationInfo>> {
        let (query, params): (String, Vec<&str>) = if self.descriptor.database.is_some() {
            (RELATIONS_IN_DEFAULT_DB.to_string(), Vec::new())
        } else {
            (relations_in_user_schemas(), SYSTEM_SCHEMAS.to_vec())
        };

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| anyhow!("Not connected"))?;
        let rows: Vec<(String, String, String)> = conn
            .exec(query.as_str(), params)
            .await
            .context("Failed to list tables and views")?;

        Ok(rows
            .into_iter()
            .map(|(schema, name, table_type)| RelationInfo {
                schema,
                name,
                table_type,
            })
            .collect())
    }

    async fn list_columns(&self, schema: &str, relation: &str) -> anyhow::Result<Vec<RawColumn>> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| anyhow!("Not connected"))?;

        #[allow(clippy::type_complexity)]
        let rows: Vec<(
            String,
            Option<String>,
            Option<String>,
            String,
            Option<String>,
            Option<String>,
        )> = conn
            .exec(COLUMNS_OF_RELATION, (schema, relation))
            .await
            .with_context(|| format!("Failed to list columns of {}.{}", schema, relation))?;

        Ok(rows
            .into_iter()
            .map(
                |(name, data_type, column_type, is_nullable, default, column_key)| RawColumn {
                    name,
                    data_type,
                    column_type,
                    is_nullable,
                    default,
                    column_key,
                },
            )
            .collect())
    }

    async fn execute_query(&self, query: &str) -> anyhow::Result<Vec<Row>> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| anyhow!("Not connected"))?;

        // Prepared (binary protocol) so numeric and temporal values arrive typed.
        let rows: Vec<mysql_async::Row> = conn.exec(query, ()).await?;
        Ok(rows.iter().map(Self::row_to_map).collect())
    }
}

/// Convert a single MySQL value to serde_json::Value.
///
/// Works for both wire protocols: the text protocol delivers every value as
/// bytes, so numeric columns are parsed back using the column type.
pub fn value_to_json(value: &Value, column_type: ColumnType) -> serde_json::Value {
    match value {
        Value::NULL => serde_json::Value::Null,
        Value::Int(v) => json!(v),
        Value::UInt(v) => json!(v),
        Value::Float(v) => json!(v),
        Value::Double(v) => json!(v),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            if matches!(
                column_type,
                ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE
            ) {
                json!(format!("{:04}-{:02}-{:02}", year, month, day))
            } else {
                let mut text = format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, minute, second
                );
                if *micros > 0 {
                    text.push_str(&format!(".{:06}", micros));
                }
                json!(text)
            }
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let total_hours = u64::from(*days) * 24 + u64::from(*hours);
            let mut text = format!(
                "{}{:02}:{:02}:{:02}",
                if *negative { "-" } else { "" },
                total_hours,
                minutes,
                seconds
            );
            if *micros > 0 {
                text.push_str(&format!(".{:06}", micros));
            }
            json!(text)
        }
        Value::Bytes(bytes) => bytes_to_json(bytes, column_type),
    }
}

fn bytes_to_json(bytes: &[u8], column_type: ColumnType) -> serde_json::Value {
    use ColumnType::*;

    let text = String::from_utf8_lossy(bytes);
    match column_type {
        MYSQL_TYPE_JSON => serde_json::from_slice(bytes)
            .unwrap_or_else(|_| serde_json::Value::String(text.into_owned())),
        MYSQL_TYPE_TINY | MYSQL_TYPE_SHORT | MYSQL_TYPE_LONG | MYSQL_TYPE_INT24
        | MYSQL_TYPE_LONGLONG | MYSQL_TYPE_YEAR => {
            if let Ok(v) = text.parse::<i64>() {
                json!(v)
            } else if let Ok(v) = text.parse::<u64>() {
                json!(v)
            } else {
                serde_json::Value::String(text.into_owned())
            }
        }
        MYSQL_TYPE_FLOAT | MYSQL_TYPE_DOUBLE => match text.parse::<f64>() {
            Ok(v) if v.is_finite() => json!(v),
            _ => serde_json::Value::String(text.into_owned()),
        },
        MYSQL_TYPE_BIT if bytes.len() <= 8 => {
            json!(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
        }
        // DECIMAL stays a string so no precision is lost.
        _ => serde_json::Value::String(text.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_values() {
        assert_eq!(value_to_json(&Value::Int(-3), ColumnType::MYSQL_TYPE_LONG), json!(-3));
        assert_eq!(
            value_to_json(&Value::UInt(u64::MAX), ColumnType::MYSQL_TYPE_LONGLONG),
            json!(u64::MAX)
        );
        assert_eq!(value_to_json(&Value::Double(1.5), ColumnType::MYSQL_TYPE_DOUBLE), json!(1.5));
        assert_eq!(value_to_json(&Value::NULL, ColumnType::MYSQL_TYPE_LONG), json!(null));
    }

    #[test]
    fn test_text_protocol_numbers_are_parsed() {
        assert_eq!(
            value_to_json(&Value::Bytes(b"42".to_vec()), ColumnType::MYSQL_TYPE_LONG),
            json!(42)
        );
        assert_eq!(
            value_to_json(&Value::Bytes(b"2.25".to_vec()), ColumnType::MYSQL_TYPE_DOUBLE),
            json!(2.25)
        );
    }

    #[test]
    fn test_decimal_stays_string() {
        assert_eq!(
            value_to_json(&Value::Bytes(b"19.990".to_vec()), ColumnType::MYSQL_TYPE_NEWDECIMAL),
            json!("19.990")
        );
    }

    #[test]
    fn test_json_column_is_parsed() {
        assert_eq!(
            value_to_json(&Value::Bytes(br#"{"a":[1,2]}"#.to_vec()), ColumnType::MYSQL_TYPE_JSON),
            json!({"a": [1, 2]})
        );
        assert_eq!(
            value_to_json(&Value::Bytes(b"not json".to_vec()), ColumnType::MYSQL_TYPE_JSON),
            json!("not json")
        );
    }

    #[test]
    fn test_temporal_values() {
        assert_eq!(
            value_to_json(&Value::Date(2024, 2, 29, 0, 0, 0, 0), ColumnType::MYSQL_TYPE_DATE),
            json!("2024-02-29")
        );
        assert_eq!(
            value_to_json(
                &Value::Date(2024, 2, 29, 13, 5, 9, 0),
                ColumnType::MYSQL_TYPE_DATETIME
            ),
            json!("2024-02-29 13:05:09")
        );
        assert_eq!(
            value_to_json(
                &Value::Date(2024, 2, 29, 13, 5, 9, 120),
                ColumnType::MYSQL_TYPE_TIMESTAMP
            ),
            json!("2024-02-29 13:05:09.000120")
        );
        assert_eq!(
            value_to_json(&Value::Time(true, 1, 2, 3, 4, 0), ColumnType::MYSQL_TYPE_TIME),
            json!("-26:03:04")
        );
    }

    #[test]
    fn test_strings_and_bits() {
        assert_eq!(
            value_to_json(&Value::Bytes("café".as_bytes().to_vec()), ColumnType::MYSQL_TYPE_VAR_STRING),
            json!("café")
        );
        assert_eq!(
            value_to_json(&Value::Bytes(vec![0x01, 0x01]), ColumnType::MYSQL_TYPE_BIT),
            json!(257)
        );
    }

    #[test]
    fn test_user_schema_query_binds_every_system_schema() {
        let query = relations_in_user_schemas();
        assert_eq!(query.matches('?').count(), SYSTEM_SCHEMAS.len());
        assert!(query.contains("NOT IN (?, ?, ?, ?)"));
    }

    #[test]
    fn test_localhost_forced_to_ipv4() {
        let connector = MySqlConnector::new(ConnectionDescriptor {
            host: "localhost".into(),
            port: 3307,
            user: Some("root".into()),
            password: None,
            database: Some("app".into()),
        });
        let opts = mysql_async::Opts::from(connector.build_opts());
        assert_eq!(opts.ip_or_hostname(), "127.0.0.1");
        assert_eq!(opts.tcp_port(), 3307);
        assert_eq!(opts.db_name(), Some("app"));
    }
}
