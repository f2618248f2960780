
use std::sync::Arc;
use tracing::{debug, info};

use super::models::{Catalog, CatalogError, CatalogRow, CatalogVariable};
use crate::llm::embeddings::{EmbedKind, EmbeddingError, EmbeddingGateway};


pub struct CatalogBuilder {
    gateway: Arc<dyn EmbeddingGateway>,
    batch_size: usize,
}

impl CatalogBuilder {

    pub fn new(gateway: Arc<dyn EmbeddingGateway>, batch_size: usize) -> Self {
        Self {
            gateway,
            batch_size: batch_size.max(1),
        }
    }

    /// Embeds every row as a document, `batch_size` rows per gateway call.
    pub async fn build(&self, rows: Vec<CatalogRow>) -> Result<Catalog, CatalogError> {
        info!(
            "Building catalog from {} rows (batch_size={}, model={})",
            rows.len(),
            self.batch_size,
            self.gateway.model_name()
        );

        let mut variables = Vec::with_capacity(rows.len());

        for (batch_idx, chunk) in rows.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = chunk.iter().map(CatalogRow::document_text).collect();
            let batch = self.gateway.embed(&texts, EmbedKind::Document).await?;

            if batch.len() != chunk.len() || batch.normalized.len() != chunk.len() {
                return Err(EmbeddingError::BatchMismatch {
                    sent: chunk.len(),
                    received: if batch.len() != chunk.len() {
                        batch.len()
                    } else {
                        batch.normalized.len()
                    },
                }
                .into());
            }

            for ((row, embedding), normalized_text) in chunk.iter().zip(batch.vectors).zip(batch.normalized) {
                variables.push(CatalogVariable {
                    id: row.variable_id(),
                    dataset_id: row.dataset_id.clone(),
                    table_id: row.table_id.clone(),
                    description: row.description.clone(),
                    field_name: row.field_name.clone(),
                    tags: row.tags.clone(),
                    entity_type: row
                        .entity_type
                        .as_ref()
                        .map(|e| e.trim().to_string())
                        .filter(|e| !e.is_empty()),
                    geometry_type: row
                        .geometry_type
                        .as_ref()
                        .map(|g| g.trim().to_string())
                        .filter(|g| !g.is_empty()),
                    embedding,
                    normalized_text,
                });
            }

            debug!("Catalog batch {} embedded ({} rows)", batch_idx, chunk.len());
        }

        let catalog = Catalog::new(variables)?;
        info!(
            "Catalog ready: {} variables, dims={}",
            catalog.len(),
            catalog.dimension()
        );
        Ok(catalog)
    }
}
