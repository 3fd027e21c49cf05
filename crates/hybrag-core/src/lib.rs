//! hybrag-core
//!
//! Domain types, error taxonomy, configuration and the collaborator traits
//! shared by the ranker adapters, the fusion engine and the evaluation crate.
//! Also hosts the Chunker and the JSON corpus store.

pub mod chunker;
pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
