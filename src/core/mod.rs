
pub mod config;
pub mod error;

pub use config::GeoarkConfig;
pub use error::{GeoarkError, Result};
