//! # Host Bridge Traits
//!
//! Abstraction traits for the capabilities the catalog mirror borrows from its
//! host environment.
//!
//! ## Overview
//!
//! The sync engine talks to two remote collaborators (the edition-metadata
//! service and the text-embedding service). Both are reached through the
//! [`HttpClient`](http::HttpClient) trait so that:
//!
//! - production code runs on the reqwest adapter in `bridge-desktop`
//! - tests substitute scripted fakes without touching the network
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should keep timeouts and connection failures in their dedicated variants;
//! callers rely on [`BridgeError::is_transient`] to decide whether an attempt
//! is worth repeating.
//!
//! ## Thread Safety
//!
//! Bridge traits require `Send + Sync` so a single client handle can be shared
//! across every in-flight request of a bounded batch.

pub mod error;
pub mod http;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
