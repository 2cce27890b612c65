use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A table exposed to the query model, as listed in `table_config.yaml`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TableSchema {
    pub table_name: String,
    #[serde(default)]
    pub context: String,
}

impl TableSchema {
    /// Text embedded for retrieval.
    pub fn retrieval_text(&self) -> String {
        if self.context.trim().is_empty() {
            self.table_name.clone()
        } else {
            format!("{}: {}", self.table_name, self.context.trim())
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DbTables {
    #[serde(default)]
    pub tables: Vec<TableSchema>,
}

/// Whole `table_config.yaml`, keyed by db_type.
pub type TableConfigFile = HashMap<String, DbTables>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    pub position: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ForeignKeyInfo {
    pub column_name: String,
    pub foreign_table: String,
    pub foreign_column: String,
}

/// Live schema of one table, read from `information_schema`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TableDescription {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

impl TableDescription {
    /// Renders the schema block handed to the query model.
    pub fn render(&self, context: &str) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("{} ({})", c.column_name, c.data_type.to_uppercase()))
            .collect::<Vec<_>>()
            .join(", ");

        let foreign_keys = self
            .foreign_keys
            .iter()
            .map(|fk| {
                format!(
                    "['{}'] -> {}.['{}']",
                    fk.column_name, fk.foreign_table, fk.foreign_column
                )
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut out = format!(
            "Table '{}' has columns: {}, and foreign keys: [{}].",
            self.table_name, columns, foreign_keys
        );
        if !context.trim().is_empty() {
            out.push_str(" The table description is: ");
            out.push_str(context.trim());
        }
        out
    }
}
