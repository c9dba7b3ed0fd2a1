//! Helper utilities for the CLAMS platform.
//!
//! The main piece is the gold retriever: it downloads reference annotation
//! bundles from the shared annotation repository into a local cache and
//! reuses them on later calls.

pub mod config;
pub mod domain;
pub mod error;
pub mod output;
pub mod remote;
pub mod retriever;
pub mod store;

pub use config::RetrieverConfig;
pub use error::{ErrorKind, GoldError};
pub use retriever::{GoldRetriever, retrieve};
