// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Fee-ledger reconciliation engine.
//!
//! Everything here is a pure function over explicit inputs: students carry
//! their fee lines, payments are passed in, and "today"/"now" come from the
//! caller. Persistence is the caller's business (see `store::Tx`).

pub mod allocation;
pub mod assignment;
pub mod balance;
pub mod integrity;
pub mod payment;
pub mod status;

pub use allocation::{AutoAllocation, allocation_order, auto_allocate};
pub use assignment::{
    BulkAssignReport, BulkUnassignReport, TargetSelection, bulk_assign, bulk_unassign,
    custom_fee_line, due_date_for, instantiate_fee_line, remove_fee_line, select_targets,
    validate_template,
};
pub use balance::{
    StudentBalance, compute_outstanding, remaining_balance, student_balance, total_applied,
    total_fees, total_paid, unapplied_credit,
};
pub use integrity::{IntegrityIssue, audit, dangling_allocations};
pub use payment::{PaymentRequest, apply_payment, validate_allocations};
pub use status::{derive_status, is_line_overdue, refresh_all_statuses, refresh_statuses};
