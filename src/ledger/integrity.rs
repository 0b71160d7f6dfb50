// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use super::balance::{total_applied, unapplied_credit};
use super::status::derive_status;
use crate::models::{FeeLineStatus, Payment, Student};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    UnknownStudent {
        payment_id: String,
        student_id: String,
    },
    DanglingAllocation {
        payment_id: String,
        student_id: String,
        fee_line_id: String,
    },
    StaleStatus {
        student_id: String,
        fee_line_id: String,
        stored: FeeLineStatus,
        derived: FeeLineStatus,
    },
    OverAppliedLine {
        student_id: String,
        fee_line_id: String,
        applied: Decimal,
        amount: Decimal,
    },
    OverAllocatedPayment {
        payment_id: String,
        allocated: Decimal,
        amount: Decimal,
    },
    UnappliedCredit {
        student_id: String,
        amount: Decimal,
    },
}

impl IntegrityIssue {
    pub fn kind(&self) -> &'static str {
        match self {
            IntegrityIssue::UnknownStudent { .. } => "unknown_student",
            IntegrityIssue::DanglingAllocation { .. } => "dangling_allocation",
            IntegrityIssue::StaleStatus { .. } => "stale_status",
            IntegrityIssue::OverAppliedLine { .. } => "over_applied_line",
            IntegrityIssue::OverAllocatedPayment { .. } => "over_allocated_payment",
            IntegrityIssue::UnappliedCredit { .. } => "unapplied_credit",
        }
    }

    pub fn detail(&self) -> String {
        match self {
            IntegrityIssue::UnknownStudent {
                payment_id,
                student_id,
            } => format!("payment {} -> student {}", payment_id, student_id),
            IntegrityIssue::DanglingAllocation {
                payment_id,
                student_id,
                fee_line_id,
            } => format!(
                "payment {} -> fee line {} (student {})",
                payment_id, fee_line_id, student_id
            ),
            IntegrityIssue::StaleStatus {
                student_id,
                fee_line_id,
                stored,
                derived,
            } => format!(
                "{} / {}: stored {}, derived {}",
                student_id, fee_line_id, stored, derived
            ),
            IntegrityIssue::OverAppliedLine {
                student_id,
                fee_line_id,
                applied,
                amount,
            } => format!(
                "{} / {}: applied {} > amount {}",
                student_id, fee_line_id, applied, amount
            ),
            IntegrityIssue::OverAllocatedPayment {
                payment_id,
                allocated,
                amount,
            } => format!(
                "payment {}: allocated {} > amount {}",
                payment_id, allocated, amount
            ),
            IntegrityIssue::UnappliedCredit { student_id, amount } => {
                format!("{}: {} recorded but not allocated", student_id, amount)
            }
        }
    }
}

/// Payment allocations whose student or fee line no longer exists. Readers
/// show these as "Unknown Student" / "Unknown Fee".
pub fn dangling_allocations(students: &[Student], payments: &[Payment]) -> Vec<IntegrityIssue> {
    let by_id: HashMap<&str, &Student> = students.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut issues = Vec::new();
    for p in payments {
        let Some(student) = by_id.get(p.student_id.as_str()) else {
            issues.push(IntegrityIssue::UnknownStudent {
                payment_id: p.id.clone(),
                student_id: p.student_id.clone(),
            });
            continue;
        };
        for alloc in &p.applied_to {
            if student.fee_line(&alloc.fee_line_id).is_none() {
                issues.push(IntegrityIssue::DanglingAllocation {
                    payment_id: p.id.clone(),
                    student_id: student.student_id.clone(),
                    fee_line_id: alloc.fee_line_id.clone(),
                });
            }
        }
    }
    issues
}

/// Full consistency sweep over persisted state.
pub fn audit(students: &[Student], payments: &[Payment], today: NaiveDate) -> Vec<IntegrityIssue> {
    let mut issues = dangling_allocations(students, payments);

    for p in payments {
        let allocated = p.allocated();
        if allocated > p.amount {
            issues.push(IntegrityIssue::OverAllocatedPayment {
                payment_id: p.id.clone(),
                allocated,
                amount: p.amount,
            });
        }
    }

    for s in students {
        for line in &s.assigned_fees {
            let applied = total_applied(line);
            if applied > line.amount {
                issues.push(IntegrityIssue::OverAppliedLine {
                    student_id: s.student_id.clone(),
                    fee_line_id: line.id.clone(),
                    applied,
                    amount: line.amount,
                });
            }
            let derived = derive_status(line, today);
            if derived != line.status {
                issues.push(IntegrityIssue::StaleStatus {
                    student_id: s.student_id.clone(),
                    fee_line_id: line.id.clone(),
                    stored: line.status,
                    derived,
                });
            }
        }
        let credit = unapplied_credit(s, payments);
        if credit > Decimal::ZERO {
            issues.push(IntegrityIssue::UnappliedCredit {
                student_id: s.student_id.clone(),
                amount: credit,
            });
        }
    }
    issues
}
