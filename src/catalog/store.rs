
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

use super::models::Catalog;

/// Holds the live catalog. Readers take an `Arc` snapshot; a rebuild swaps
/// the whole set, so in-flight searches keep scoring the catalog they started with.
#[derive(Debug, Default)]
pub struct CatalogStore {
    current: RwLock<Arc<Catalog>>,
}

impl CatalogStore {

    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }


    pub fn snapshot(&self) -> Arc<Catalog> {
        Arc::clone(&self.current.read())
    }


    pub fn replace(&self, catalog: Catalog) -> Arc<Catalog> {
        let next = Arc::new(catalog);
        let previous = std::mem::replace(&mut *self.current.write(), Arc::clone(&next));
        info!(
            "Catalog replaced: {} -> {} variables",
            previous.len(),
            next.len()
        );
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::models::CatalogVariable;

    fn catalog_of(ids: &[&str]) -> Catalog {
        Catalog::new(
            ids.iter()
                .map(|id| CatalogVariable {
                    id: (*id).to_string(),
                    dataset_id: "d".to_string(),
                    table_id: "t".to_string(),
                    description: String::new(),
                    field_name: (*id).to_string(),
                    tags: Vec::new(),
                    entity_type: None,
                    geometry_type: None,
                    embedding: vec![1.0, 0.0],
                    normalized_text: String::new(),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let store = CatalogStore::new(catalog_of(&["a", "b"]));
        let before = store.snapshot();

        let previous = store.replace(catalog_of(&["c"]));

        assert_eq!(before.len(), 2);
        assert_eq!(previous.len(), 2);
        assert_eq!(store.snapshot().len(), 1);
        assert!(store.snapshot().get("c").is_some());
    }
}
