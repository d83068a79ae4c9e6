//! HTTP security controls applied to every response

mod headers;

pub use headers::security_headers_middleware;
