//! # Quantum-Bus Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Cross-crate request/response flows
//!     ├── fixtures.rs   # Request types, handlers, bus setup
//!     ├── flows.rs      # End-to-end outcomes over the shared bus
//!     └── races.rs      # Concurrency and completion races
//!
//! tests/benches/
//! └── correlation_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p qb-tests
//!
//! # By category
//! cargo test -p qb-tests integration::flows::
//! cargo test -p qb-tests integration::races::
//!
//! # Benchmarks
//! cargo bench -p qb-tests
//! ```

#![allow(dead_code)]

pub mod integration;
