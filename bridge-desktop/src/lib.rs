//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop and server hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use bridge_traits::HttpClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let http_client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new()?);
//!     // Hand the client to the enrichment and embedding adapters
//!     Ok(())
//! }
//! ```

mod http;

pub use http::ReqwestHttpClient;
