
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use thiserror::Error;


#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Duplicate variable id: {0}")]
    DuplicateId(String),

    #[error("Embedding dimension mismatch for {id}: expected {expected}, got {actual}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Variable {0} has an empty embedding")]
    EmptyEmbedding(String),

    #[error("Embedding failed while building catalog: {0}")]
    Embedding(#[from] crate::llm::embeddings::EmbeddingError),

    #[error("Failed to read catalog source: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog source: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One row of variable metadata as it arrives from the catalog source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRow {
    #[serde(default)]
    pub id: Option<String>,
    pub dataset_id: String,
    #[serde(alias = "table_name")]
    pub table_id: String,
    #[serde(alias = "attr_desc")]
    pub description: String,
    #[serde(alias = "attr_label", alias = "original_field_name")]
    pub field_name: String,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub geometry_type: Option<String>,
}

impl CatalogRow {

    pub fn variable_id(&self) -> String {
        match &self.id {
            Some(id) if !id.trim().is_empty() => id.clone(),
            _ => format!("{}:{}:{}", self.dataset_id, self.table_id, self.field_name),
        }
    }

    /// Text handed to the embedding gateway for this row.
    pub fn document_text(&self) -> String {
        let mut parts = vec![self.description.clone(), self.field_name.replace('_', " ")];
        parts.extend(self.tags.iter().cloned());
        parts.retain(|p| !p.trim().is_empty());
        parts.join(" ")
    }
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TagsField {
        List(Vec<String>),
        Text(String),
        Missing(()),
    }

    let tags = match TagsField::deserialize(deserializer)? {
        TagsField::List(list) => list,
        TagsField::Text(text) => text
            .split([',', '|', ';'])
            .map(|t| t.trim_matches(|c: char| c.is_whitespace() || "[]'\"".contains(c)).to_string())
            .collect(),
        TagsField::Missing(()) => Vec::new(),
    };
    Ok(tags.into_iter().filter(|t| !t.is_empty()).collect())
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogVariable {
    pub id: String,
    pub dataset_id: String,
    pub table_id: String,
    pub description: String,
    pub field_name: String,
    pub tags: Vec<String>,
    pub entity_type: Option<String>,
    #[serde(default)]
    pub geometry_type: Option<String>,
    #[serde(skip_serializing, default)]
    pub embedding: Vec<f32>,
    pub normalized_text: String,
}


#[derive(Debug, Clone, Default)]
pub struct Catalog {
    variables: Vec<CatalogVariable>,
    dimension: usize,
}

impl Catalog {
    /// Rejects duplicate ids, empty vectors and mixed dimensions.
    pub fn new(variables: Vec<CatalogVariable>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(variables.len());
        let dimension = variables.first().map_or(0, |v| v.embedding.len());

        for var in &variables {
            if !seen.insert(var.id.as_str()) {
                return Err(CatalogError::DuplicateId(var.id.clone()));
            }
            if var.embedding.is_empty() {
                return Err(CatalogError::EmptyEmbedding(var.id.clone()));
            }
            if var.embedding.len() != dimension {
                return Err(CatalogError::DimensionMismatch {
                    id: var.id.clone(),
                    expected: dimension,
                    actual: var.embedding.len(),
                });
            }
        }

        Ok(Self { variables, dimension })
    }


    pub fn empty() -> Self {
        Self::default()
    }


    pub fn variables(&self) -> &[CatalogVariable] {
        &self.variables
    }


    pub fn dimension(&self) -> usize {
        self.dimension
    }


    pub fn len(&self) -> usize {
        self.variables.len()
    }


    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }


    pub fn get(&self, id: &str) -> Option<&CatalogVariable> {
        self.variables.iter().find(|v| v.id == id)
    }
}
