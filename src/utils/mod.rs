//! Utility modules.

pub mod document;
pub mod logging;
pub mod retry;

pub use document::{document_id_for, load_document};
pub use logging::{LogFormat, init_tracing};
pub use retry::{RetryPolicy, Retryable, with_retry};
