pub mod types;
pub mod error;
pub mod config;
pub mod lifecycle;

pub use types::*;
pub use error::*;
pub use config::*;
pub use lifecycle::*;
