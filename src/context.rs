//! Per-call correlation context threaded explicitly through the core.

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub correlation_id: String,
    /// Client-reported retry attempt (`X-Retry-Count`), informational only.
    pub retry_count: u32,
}

impl RequestContext {
    pub fn new(correlation_id: impl Into<String>, retry_count: u32) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            retry_count,
        }
    }

    /// Fresh context for work that does not originate from a client request.
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string(), 0)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::generate()
    }
}
