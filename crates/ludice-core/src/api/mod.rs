//! Backend API client.
//!
//! `LudiceApi` signs request bodies and hands them to a `Transport`:
//! `ReqwestTransport` in production, `MockTransport` in tests.

mod client;
mod http;
mod mock;
mod traits;

pub use client::{unix_timestamp, LudiceApi};
pub use http::ReqwestTransport;
pub use mock::MockTransport;
pub use traits::{ApiError, ApiResponse, HttpRequest, Method, ResponseBody, Transport};
