//! # Cross-Crate Integration Scenarios
//!
//! Every scenario runs against the in-memory transport, store and cache so
//! it is deterministic and needs no external services.

#[cfg(test)]
pub mod harness;
#[cfg(test)]
mod node;
#[cfg(test)]
mod pipeline;
#[cfg(test)]
mod reporting;
