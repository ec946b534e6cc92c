pub mod database;
pub mod error;
pub mod fetch;
pub mod store;

pub use error::{AppError, Result};
