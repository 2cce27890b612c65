use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::domain::table_schema::TableSchema;
use crate::infrastructure::llm_clients::LLMClient;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Picks the configured tables most relevant to a question by embedding
/// similarity between the question and each table's description.
pub struct TableRetriever {
    llm: Arc<dyn LLMClient + Send + Sync>,
    embed_config: LLMConfig,
    tables: Vec<TableSchema>,
    table_embeddings: Mutex<Option<Vec<Vec<f32>>>>,
}

impl TableRetriever {
    pub fn new(
        llm: Arc<dyn LLMClient + Send + Sync>,
        embed_config: LLMConfig,
        tables: Vec<TableSchema>,
    ) -> Self {
        Self {
            llm,
            embed_config,
            tables,
            table_embeddings: Mutex::new(None),
        }
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<TableSchema>> {
        if self.tables.is_empty() {
            return Err(AppError::NotFound(
                "No tables are configured for this database".to_string(),
            ));
        }
        let top_k = top_k.max(1);
        if self.tables.len() <= top_k {
            return Ok(self.tables.clone());
        }

        let question_embedding = self.llm.embed(&self.embed_config, question).await?;

        let mut guard = self.table_embeddings.lock().await;
        if guard.is_none() {
            let mut vectors = Vec::with_capacity(self.tables.len());
            for table in &self.tables {
                vectors.push(
                    self.llm
                        .embed(&self.embed_config, &table.retrieval_text())
                        .await?,
                );
            }
            debug!("Embedded {} table descriptions", vectors.len());
            *guard = Some(vectors);
        }
        let table_embeddings = guard.as_ref().map(|v| v.as_slice()).unwrap_or(&[]);

        let mut scored: Vec<(usize, f32)> = table_embeddings
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(&question_embedding, v)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let selected: Vec<TableSchema> = scored
            .into_iter()
            .take(top_k)
            .map(|(i, _)| self.tables[i].clone())
            .collect();

        info!(
            "Retrieved table(s) {:?} for question",
            selected.iter().map(|t| t.table_name.as_str()).collect::<Vec<_>>()
        );
        Ok(selected)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::test_support::ScriptedLlm;

    fn table(name: &str, context: &str) -> TableSchema {
        TableSchema {
            table_name: name.to_string(),
            context: context.to_string(),
        }
    }

    fn scripted() -> Arc<ScriptedLlm> {
        Arc::new(
            ScriptedLlm::new()
                .embedding("orders", vec![1.0, 0.0, 0.0])
                .embedding("customers", vec![0.0, 1.0, 0.0])
                .embedding("How many orders", vec![0.9, 0.1, 0.0])
                .embedding("Which customer", vec![0.1, 0.9, 0.0]),
        )
    }

    #[tokio::test]
    async fn test_retrieves_most_similar_table() {
        let llm = scripted();
        let retriever = TableRetriever::new(
            llm.clone(),
            LLMConfig::default(),
            vec![
                table("customers", "people who buy things"),
                table("orders", "purchases"),
            ],
        );

        let picked = retriever.retrieve("How many orders shipped?", 1).await.unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].table_name, "orders");

        let picked = retriever.retrieve("Which customer spent most?", 1).await.unwrap();
        assert_eq!(picked[0].table_name, "customers");

        // 2 table embeddings computed once, plus one per question.
        assert_eq!(llm.embed_calls(), 4);
    }

    #[tokio::test]
    async fn test_single_table_skips_embedding() {
        let llm = scripted();
        let retriever =
            TableRetriever::new(llm.clone(), LLMConfig::default(), vec![table("orders", "")]);

        let picked = retriever.retrieve("anything", 1).await.unwrap();
        assert_eq!(picked[0].table_name, "orders");
        assert_eq!(llm.embed_calls(), 0);
    }

    #[tokio::test]
    async fn test_no_tables_is_not_found() {
        let retriever = TableRetriever::new(scripted(), LLMConfig::default(), vec![]);
        let err = retriever.retrieve("q", 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
