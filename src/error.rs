// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;
use thiserror::Error;

/// Caller-correctable validation failures and referential integrity
/// violations raised by the ledger engine. None of them leave partial state.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("Payment amount must be positive, got {0}")]
    NonPositivePayment(Decimal),

    #[error("Allocation to fee line '{0}' must be positive")]
    NonPositiveAllocation(String),

    #[error("Fee line '{0}' appears more than once in the allocation list")]
    DuplicateAllocation(String),

    #[error("Fee line '{fee_line_id}' does not belong to student '{student_id}'")]
    UnknownFeeLine {
        student_id: String,
        fee_line_id: String,
    },

    #[error(
        "Allocation of {requested} to fee line '{fee_line_id}' exceeds its remaining balance {remaining}"
    )]
    ExceedsBalance {
        fee_line_id: String,
        requested: Decimal,
        remaining: Decimal,
    },

    #[error("Allocations total {allocated} but the payment is only {amount}")]
    ExceedsPayment { allocated: Decimal, amount: Decimal },

    #[error(
        "Removing fee '{title}' would orphan {allocations} payment allocation(s); pass --force to remove anyway"
    )]
    WouldOrphanPayments { title: String, allocations: usize },

    #[error("Student '{0}' not found")]
    StudentNotFound(String),

    #[error("Fee template '{0}' not found")]
    TemplateNotFound(String),

    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Fee amount must not be negative, got {0}")]
    NegativeAmount(Decimal),

    #[error("Due day must be between 1 and 31, got {0}")]
    InvalidDueDay(u32),
}

/// Failures at the persistence boundary. A read that fails is always an
/// error, never an empty collection.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend failure: {0}")]
    Backend(#[from] rusqlite::Error),

    #[error("Stored document '{key}' is corrupted: {source}")]
    Corrupted {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not serialize '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Write conflict on '{key}': expected revision {expected}, found {found}")]
    Conflict {
        key: String,
        expected: u64,
        found: u64,
    },

    #[error("Gave up after {0} conflicting attempts")]
    RetriesExhausted(usize),

    #[error("Invalid backup: {0}")]
    InvalidBackup(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}
