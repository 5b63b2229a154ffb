//! # evbus Test Suite
//!
//! Unified test crate exercising the broker through its public API only.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs     # Recording / failing ingress plugins
//!     ├── ordering.rs     # Queue ordering, sentinel, sync→async upgrade
//!     ├── propagation.rs  # Fan-out, matching, failure isolation
//!     └── scenarios.rs    # End-to-end flows through the runtime crate
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p evbus-tests
//!
//! # By category
//! cargo test -p evbus-tests integration::ordering::
//! cargo test -p evbus-tests integration::propagation::
//!
//! # Benchmarks
//! cargo bench -p evbus-tests
//! ```

#![allow(dead_code)]

pub mod integration;
