//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the catalog mirror:
//! - Logging and tracing infrastructure
//! - Configuration management (run directory layout, remote endpoints, fetch tuning)
//! - Event bus system for pass progress
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the sync engine and the index
//! builder depend on. It establishes the logging conventions and the event
//! broadcasting used throughout the workspace.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
