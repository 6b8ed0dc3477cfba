//! Core types and trait definitions for two-factor record persistence.
//!
//! This crate is free of database dependencies. It holds the mutable record
//! entity, the write-back buffer that collects dirty records between flushes,
//! and the [`UserDataSource`](source::UserDataSource) contract that storage
//! backends implement and host code depends on.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod buffer;
pub mod context;
pub mod error;
pub mod identity;
pub mod record;
pub mod source;

pub use error::{Error, Result};
