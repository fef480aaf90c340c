//! Pipeline error taxonomy.
//!
//! Three kinds matter to callers: a payload that cannot be decoded, a store
//! that is temporarily unavailable, and a generative-adapter failure. The
//! queue path maps the first two to a negative acknowledgement; the HTTP path
//! maps them to 400/500. Adapter failures are absorbed by the insight
//! orchestrator and never reach a caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Message body is not a decodable structured object.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The document store rejected or timed out an operation. Transient:
    /// the queue path retries via broker redelivery.
    #[error("document store unavailable: {0}")]
    StoreUnavailable(String),

    /// The generative insight call failed (transport, status, or parse).
    #[error("generative adapter: {0}")]
    GenerativeAdapter(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
