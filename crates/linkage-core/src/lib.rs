//! Core types, storage traits and the identity resolver for Linkage.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; storage backends implement
//! [`store::ContactStore`] and everything above them talks to a
//! [`Resolver`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod contact;
pub mod error;
pub mod memory;
pub mod resolver;
pub mod store;
pub mod view;

pub use error::{Error, Result};
pub use resolver::Resolver;
