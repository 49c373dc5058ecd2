//! # tandem-contracts
//!
//! Shared types, schemas, and contracts for the Tandem runtime.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod advisory;
pub mod approval;
pub mod error;
pub mod orchestration;
pub mod role;
