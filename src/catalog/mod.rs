
pub mod builder;
pub mod models;
pub mod source;
pub mod store;

pub use builder::CatalogBuilder;
pub use models::{Catalog, CatalogError, CatalogRow, CatalogVariable};
pub use source::load_rows;
pub use store::CatalogStore;
