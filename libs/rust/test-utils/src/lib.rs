//! Shared test utilities for the identity-platform client crates.
//!
//! This crate provides:
//! - Proptest generators for request and claim shapes
//! - A scripted transport and a recording middleware
//! - RSA key material, key-set documents and token signing helpers

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::missing_panics_doc, clippy::expect_used)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
