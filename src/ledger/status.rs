// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use super::balance::{remaining_balance, total_applied};
use crate::models::{FeeLine, FeeLineStatus, Student};
use crate::utils::is_overdue;

/// Paid beats partial beats overdue beats open. Overdue only ever applies to
/// lines with nothing applied.
pub fn derive_status(line: &FeeLine, today: NaiveDate) -> FeeLineStatus {
    let applied = total_applied(line);
    if applied >= line.amount {
        FeeLineStatus::Paid
    } else if applied > Decimal::ZERO {
        FeeLineStatus::Partial
    } else if line.due_date.is_some_and(|due| is_overdue(&due, today)) {
        FeeLineStatus::Overdue
    } else {
        FeeLineStatus::Open
    }
}

/// Rewrites cached statuses; returns how many lines changed.
pub fn refresh_statuses(student: &mut Student, today: NaiveDate) -> usize {
    let mut changed = 0;
    for line in student.assigned_fees.iter_mut() {
        let derived = derive_status(line, today);
        if line.status != derived {
            line.status = derived;
            changed += 1;
        }
    }
    changed
}

pub fn refresh_all_statuses(students: &mut [Student], today: NaiveDate) -> usize {
    students
        .iter_mut()
        .map(|s| refresh_statuses(s, today))
        .sum()
}

/// Past its due instant with money still owed.
pub fn is_line_overdue(line: &FeeLine, now: DateTime<Utc>) -> bool {
    line.due_date.is_some_and(|due| due < now) && remaining_balance(line) > Decimal::ZERO
}
