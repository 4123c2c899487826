//! Request and response model shared by the interceptor, the transport and the
//! cache storage.
//!
//! A [`Response`] body can be read exactly once: every accessor that yields the
//! body takes the response by value, and the type is deliberately not `Clone`.
//! Code that needs to hand a response to the caller *and* persist it must call
//! [`Response::duplicate`] before either side consumes it.

mod request;
mod response;

pub use request::Request;
pub use response::{Response, ResponseKind, StoredResponse, OFFLINE_BODY};

pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
pub use reqwest::Method;
