//! Adapter implementations
//!
//! - reqwest client for the Clipo REST API
//! - file and in-memory token storage
//! - mock backend used by tests

pub mod http;
pub mod mock_api;
pub mod token_store;

pub use http::{ApiClient, ApiRequest};
pub use token_store::{FileTokenStorage, MemoryTokenStorage};
