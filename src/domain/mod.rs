pub mod error;
pub mod llm_config;
pub mod query;
pub mod table_schema;
