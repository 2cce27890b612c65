use crate::domain::error::{AppError, Result};
use crate::domain::table_schema::{ColumnInfo, ForeignKeyInfo, TableDescription};
use bigdecimal::BigDecimal;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Column, Row, TypeInfo};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info};

/// Result of executing a statement, with values in column order.
#[derive(Debug, Clone, Default)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryRows {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A pooled connection to one configured database.
#[derive(Debug)]
pub struct DbEngine {
    db_type: String,
    dialect: String,
    pool: PgPool,
    query_timeout: Duration,
}

impl DbEngine {
    pub fn new(db_type: &str, dialect: &str, pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            db_type: db_type.to_string(),
            dialect: dialect.to_string(),
            pool,
            query_timeout,
        }
    }

    /// SQL dialect name used in prompts.
    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn with_timeout<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| {
                AppError::DatabaseError(format!(
                    "{} timed out after {} seconds",
                    what,
                    self.query_timeout.as_secs()
                ))
            })?
            .map_err(|e| AppError::DatabaseError(format!("{} failed: {}", what, e)))
    }

    pub async fn health_check(&self) -> Result<()> {
        self.with_timeout(
            "Health check",
            sqlx::query("SELECT 1 AS health_check").fetch_one(&self.pool),
        )
        .await?;
        Ok(())
    }

    /// Executes `sql` and decodes every row into JSON values.
    pub async fn execute(&self, sql: &str) -> Result<QueryRows> {
        let rows = self
            .with_timeout("Query execution", sqlx::query(sql).fetch_all(&self.pool))
            .await
            .map_err(|e| {
                error!(db_type = %self.db_type, "SQL execution error: {}", e);
                e
            })?;

        let mut result = QueryRows::default();
        for row in &rows {
            if result.columns.is_empty() {
                result.columns = row
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect();
            }
            let values = (0..row.columns().len())
                .map(|i| extract_column_value(row, i))
                .collect();
            result.rows.push(values);
        }

        info!(
            db_type = %self.db_type,
            row_count = result.row_count(),
            "Executed SQL query successfully."
        );
        Ok(result)
    }

    /// Reads column and foreign key metadata for `table` in the current schema.
    pub async fn describe_table(&self, table: &str) -> Result<TableDescription> {
        let column_query = r#"
            SELECT
                c.column_name::text AS column_name,
                c.data_type::text AS data_type,
                c.is_nullable = 'YES' AS is_nullable,
                EXISTS (
                    SELECT 1 FROM information_schema.table_constraints tc
                    JOIN information_schema.key_column_usage kcu
                        ON tc.constraint_name = kcu.constraint_name
                        AND tc.table_schema = kcu.table_schema
                    WHERE tc.table_schema = c.table_schema
                        AND tc.table_name = c.table_name
                        AND kcu.column_name = c.column_name
                        AND tc.constraint_type = 'PRIMARY KEY'
                ) AS is_primary_key,
                c.ordinal_position::int4 AS position
            FROM information_schema.columns c
            WHERE c.table_schema = current_schema() AND c.table_name = $1
            ORDER BY c.ordinal_position
        "#;

        let rows = self
            .with_timeout(
                "Column listing",
                sqlx::query(column_query).bind(table).fetch_all(&self.pool),
            )
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(ColumnInfo {
                column_name: get_field(&row, "column_name")?,
                data_type: get_field(&row, "data_type")?,
                is_nullable: get_field(&row, "is_nullable")?,
                is_primary_key: get_field(&row, "is_primary_key")?,
                position: get_field(&row, "position")?,
            });
        }

        if columns.is_empty() {
            return Err(AppError::NotFound(format!(
                "Table '{}' not found in the current schema",
                table
            )));
        }

        let fk_query = r#"
            SELECT
                kcu.column_name::text AS column_name,
                ccu.table_name::text AS foreign_table,
                ccu.column_name::text AS foreign_column
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
                ON ccu.constraint_name = tc.constraint_name
                AND ccu.table_schema = tc.table_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
                AND tc.table_schema = current_schema()
                AND tc.table_name = $1
            ORDER BY kcu.ordinal_position
        "#;

        let rows = self
            .with_timeout(
                "Foreign key listing",
                sqlx::query(fk_query).bind(table).fetch_all(&self.pool),
            )
            .await?;

        let mut foreign_keys = Vec::with_capacity(rows.len());
        for row in rows {
            foreign_keys.push(ForeignKeyInfo {
                column_name: get_field(&row, "column_name")?,
                foreign_table: get_field(&row, "foreign_table")?,
                foreign_column: get_field(&row, "foreign_column")?,
            });
        }

        info!(
            db_type = %self.db_type,
            "Described table '{}' ({} columns, {} foreign keys)",
            table,
            columns.len(),
            foreign_keys.len()
        );

        Ok(TableDescription {
            table_name: table.to_string(),
            columns,
            foreign_keys,
        })
    }
}

fn get_field<'r, T>(row: &'r PgRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| AppError::DatabaseError(format!("Failed to parse {}: {}", name, e)))
}

fn opt_to_value<T, F>(value: std::result::Result<Option<T>, sqlx::Error>, f: F) -> Value
where
    F: FnOnce(T) -> Value,
{
    match value {
        Ok(Some(v)) => f(v),
        _ => Value::Null,
    }
}

/// Decodes one column by its Postgres type name.
fn extract_column_value(row: &PgRow, index: usize) -> Value {
    let type_name = row.columns()[index].type_info().name().to_uppercase();

    match type_name.as_str() {
        "BOOL" => opt_to_value(row.try_get::<Option<bool>, _>(index), Value::Bool),
        "INT2" => opt_to_value(row.try_get::<Option<i16>, _>(index), |n| n.into()),
        "INT4" => opt_to_value(row.try_get::<Option<i32>, _>(index), |n| n.into()),
        "INT8" => opt_to_value(row.try_get::<Option<i64>, _>(index), |n| n.into()),
        "FLOAT4" => opt_to_value(row.try_get::<Option<f32>, _>(index), |n| {
            float_value(f64::from(n))
        }),
        "FLOAT8" => opt_to_value(row.try_get::<Option<f64>, _>(index), float_value),
        "NUMERIC" => opt_to_value(row.try_get::<Option<BigDecimal>, _>(index), |d| {
            let text = d.to_string();
            text.parse::<serde_json::Number>()
                .map(Value::Number)
                .unwrap_or(Value::String(text))
        }),
        "TIMESTAMPTZ" => opt_to_value(
            row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index),
            |dt| Value::String(dt.to_rfc3339()),
        ),
        "TIMESTAMP" => opt_to_value(
            row.try_get::<Option<chrono::NaiveDateTime>, _>(index),
            |dt| Value::String(dt.to_string()),
        ),
        "DATE" => opt_to_value(row.try_get::<Option<chrono::NaiveDate>, _>(index), |d| {
            Value::String(d.to_string())
        }),
        "TIME" => opt_to_value(row.try_get::<Option<chrono::NaiveTime>, _>(index), |t| {
            Value::String(t.to_string())
        }),
        "JSON" | "JSONB" => opt_to_value(row.try_get::<Option<Value>, _>(index), |v| v),
        "UUID" => opt_to_value(row.try_get::<Option<uuid::Uuid>, _>(index), |u| {
            Value::String(u.to_string())
        }),
        _ => opt_to_value(row.try_get::<Option<String>, _>(index), Value::String),
    }
}

fn float_value(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Renders a row as a tuple literal, e.g. `('Alice', 3, None)`.
pub fn format_row(values: &[Value]) -> String {
    let parts: Vec<String> = values.iter().map(format_value).collect();
    if parts.len() == 1 {
        format!("({},)", parts[0])
    } else {
        format!("({})", parts.join(", "))
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_text(s),
        other => other.to_string(),
    }
}

/// Quotes a string literal: double quotes when the text holds a single quote
/// and no double quote, single quotes otherwise.
pub fn quote_text(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\");
    if s.contains('\'') && !s.contains('"') {
        format!("\"{}\"", escaped)
    } else {
        format!("'{}'", escaped.replace('\'', "\\'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_row_mixed_values() {
        let row = vec![json!("Alice"), json!(3), Value::Null, json!(true)];
        assert_eq!(format_row(&row), "('Alice', 3, None, True)");
    }

    #[test]
    fn test_format_row_single_value_has_trailing_comma() {
        assert_eq!(format_row(&[json!(42)]), "(42,)");
    }

    #[test]
    fn test_format_row_picks_quote_style() {
        assert_eq!(format_row(&[json!("O'Brien"), json!(1.5)]), "(\"O'Brien\", 1.5)");
        assert_eq!(
            format_row(&[json!("say \"it's\""), json!("a\\b")]),
            "('say \"it\\'s\"', 'a\\\\b')"
        );
    }

    #[test]
    fn test_float_value_rejects_nan() {
        assert_eq!(float_value(f64::NAN), Value::Null);
        assert_eq!(float_value(2.5), json!(2.5));
    }
}
