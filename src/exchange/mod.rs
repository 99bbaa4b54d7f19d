//!
//! The request and response views handed to filters and handlers.
//!
//! Both are plain in-memory values: the transport collects the request body
//! before dispatch and writes the buffered response once the chain returns.

mod request;
mod response;

pub(crate) use request::SessionBinding;
pub use {request::Request, response::Response};
