pub mod server;

pub use server::{GeoarkMcpServer, run_server};
