pub mod chunking;
pub mod database_query;
pub mod log_analysis;
pub mod sql_generator;
pub mod sql_guard;
pub mod summarizer;
pub mod table_retriever;

#[cfg(test)]
pub(crate) mod test_support;
