//! # FinTrack Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── pipeline_benchmarks.rs   # Criterion: aggregation, store query, cache-aside
//! └── src/integration/
//!     ├── harness.rs               # In-memory pipeline fixture
//!     ├── pipeline.rs              # Gateway → Queue → Consumer → Store
//!     ├── reporting.rs             # Store → Report Engine ↔ Cache
//!     └── node.rs                  # Full node over HTTP
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p ft-tests
//!
//! # By category
//! cargo test -p ft-tests integration::pipeline::
//! cargo test -p ft-tests integration::reporting::
//!
//! # Benchmarks
//! cargo bench -p ft-tests
//! ```

#![allow(dead_code)]

pub mod integration;
