// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;

use super::balance::remaining_balance;
use super::status::is_line_overdue;
use crate::models::{Allocation, FeeLine, Student};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoAllocation {
    pub allocations: Vec<Allocation>,
    /// Left over after every line is covered; stays as unapplied credit.
    pub unapplied: Decimal,
}

impl AutoAllocation {
    pub fn allocated(&self) -> Decimal {
        self.allocations.iter().map(|a| a.amount).sum()
    }
}

/// Overdue lines first, then soonest due date; undated lines last. The sort
/// is stable so ties keep assignment order.
pub fn allocation_order(student: &Student, now: DateTime<Utc>) -> Vec<&FeeLine> {
    let mut lines: Vec<&FeeLine> = student.assigned_fees.iter().collect();
    lines.sort_by(|a, b| {
        let a_overdue = is_line_overdue(a, now);
        let b_overdue = is_line_overdue(b, now);
        b_overdue
            .cmp(&a_overdue)
            .then_with(|| match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    });
    lines
}

/// Greedy allocation of `amount` across the student's open balances.
pub fn auto_allocate(student: &Student, amount: Decimal, now: DateTime<Utc>) -> AutoAllocation {
    let mut remaining_to_apply = amount.max(Decimal::ZERO);
    let mut allocations = Vec::new();

    for line in allocation_order(student, now) {
        if remaining_to_apply <= Decimal::ZERO {
            break;
        }
        let balance = remaining_balance(line);
        if balance > Decimal::ZERO {
            let take = remaining_to_apply.min(balance);
            allocations.push(Allocation {
                fee_line_id: line.id.clone(),
                amount: take,
            });
            remaining_to_apply -= take;
        }
    }

    if remaining_to_apply > Decimal::ZERO {
        log::debug!(
            "auto-apply for {} leaves {} unallocated",
            student.student_id,
            remaining_to_apply
        );
    }
    AutoAllocation {
        allocations,
        unapplied: remaining_to_apply,
    }
}
