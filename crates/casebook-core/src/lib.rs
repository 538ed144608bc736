//! Core types and lifecycle rules for the Casebook case store.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the case state machine, the guardrails derived from it, the score-ceiling
//! validator, the revision-chain resolver and the release transaction. Storage
//! backends plug in through the traits in [`store`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod assessment;
pub mod assignment;
pub mod case;
pub mod ceiling;
pub mod chain;
pub mod engine;
pub mod error;
pub mod guardrail;
pub mod lifecycle;
pub mod release;
pub mod store;

pub use engine::{CaseEngine, ReleasePolicy};
pub use error::{Error, ErrorKind, IntegrityIssue, ItemIssue, Result};
