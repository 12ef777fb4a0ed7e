pub mod attachment;
pub mod auth;
pub mod board;
pub mod column;
pub mod comment;
pub mod config;
pub mod error;
pub mod io;
pub mod paths;
pub mod placement;
pub mod search;
pub mod store;
pub mod task;
pub mod types;

pub use error::{KanbanError, Result};
pub use store::Store;
