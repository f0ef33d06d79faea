//! Domain model and pure logic for the room restyling pipeline.
//!
//! Nothing in this crate performs I/O. Stages, stores and clients live in
//! the sibling crates and depend on the types defined here.

pub mod catalog;
pub mod error;
pub mod hashing;
pub mod json_repair;
pub mod pricing;
pub mod project;
pub mod types;
