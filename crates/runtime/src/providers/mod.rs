//! Model provider adapters.
//!
//! Each provider implements the backend trait for its specific API.

mod azure;

pub use azure::AzureOpenAiBackend;
