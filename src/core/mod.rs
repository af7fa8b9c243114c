//! Core domain layer: types, errors, and collaborator ports

pub mod error;
pub mod traits;
pub mod types;

pub use error::{PayoutError, PayoutResult, SourceError};
pub use traits::ChainDataSource;
pub use types::*;
