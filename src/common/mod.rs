pub mod config;
pub mod error;
pub mod types;

pub use config::{TreeConfig, DEFAULT_MAX_COUNT};
pub use error::{Result, TreeError};
pub use types::{NodeId, RowId};
