pub mod models;
pub mod store;
pub mod memory;
pub mod postgres;
pub mod connection;
pub mod migrations;

pub use models::*;
pub use store::*;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use connection::*;
pub use migrations::*;
