pub mod request_context;

pub use request_context::{request_context_middleware, CORRELATION_ID_HEADER, RETRY_COUNT_HEADER};
