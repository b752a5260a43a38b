//! # Adapters Layer

pub mod json_statement;

pub use json_statement::JsonStatementParser;
