//! # JSON Statement Parser
//!
//! Reads a statement encoded as a JSON array of transactions. Entries that
//! do not name a `source` are taken to come from the bank.

use crate::ports::StatementParser;
use serde_json::Value;
use shared_types::{Transaction, TransactionSource};

/// Default statement format.
#[derive(Debug, Clone, Copy)]
pub struct JsonStatementParser {
    default_source: TransactionSource,
}

impl JsonStatementParser {
    pub fn new(default_source: TransactionSource) -> Self {
        Self { default_source }
    }
}

impl Default for JsonStatementParser {
    fn default() -> Self {
        Self::new(TransactionSource::Bank)
    }
}

impl StatementParser for JsonStatementParser {
    fn parse(&self, statement: &[u8]) -> Result<Vec<Transaction>, String> {
        let value: Value =
            serde_json::from_slice(statement).map_err(|e| format!("malformed statement: {e}"))?;
        let Value::Array(entries) = value else {
            return Err("statement must be a JSON array".to_string());
        };

        let default_source = Value::String(self.default_source.to_string());
        entries
            .into_iter()
            .enumerate()
            .map(|(index, mut entry)| {
                if let Value::Object(fields) = &mut entry {
                    fields
                        .entry("source")
                        .or_insert_with(|| default_source.clone());
                }
                serde_json::from_value(entry).map_err(|e| format!("entry {index}: {e}"))
            })
            .collect()
    }
}
