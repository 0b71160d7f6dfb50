// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{FeeLine, Payment, Student};

pub fn total_fees(student: &Student) -> Decimal {
    student.assigned_fees.iter().map(|f| f.amount).sum()
}

/// Sum of every payment recorded against the student, allocated or not.
pub fn total_paid(student: &Student, payments: &[Payment]) -> Decimal {
    payments
        .iter()
        .filter(|p| p.student_id == student.id)
        .map(|p| p.amount)
        .sum()
}

/// Outstanding balance: assigned fees minus recorded payments, floored at
/// zero. Unallocated payment amounts still reduce the balance.
pub fn compute_outstanding(student: &Student, payments: &[Payment]) -> Decimal {
    (total_fees(student) - total_paid(student, payments)).max(Decimal::ZERO)
}

pub fn total_applied(line: &FeeLine) -> Decimal {
    line.payments_applied.iter().map(|p| p.amount).sum()
}

pub fn remaining_balance(line: &FeeLine) -> Decimal {
    (line.amount - total_applied(line)).max(Decimal::ZERO)
}

/// Recorded payment amount never allocated to a fee line.
pub fn unapplied_credit(student: &Student, payments: &[Payment]) -> Decimal {
    let (recorded, allocated) = payments
        .iter()
        .filter(|p| p.student_id == student.id)
        .fold((Decimal::ZERO, Decimal::ZERO), |(r, a), p| {
            (r + p.amount, a + p.allocated())
        });
    (recorded - allocated).max(Decimal::ZERO)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StudentBalance {
    pub total_fees: Decimal,
    pub total_paid: Decimal,
    pub outstanding: Decimal,
    pub unapplied_credit: Decimal,
}

pub fn student_balance(student: &Student, payments: &[Payment]) -> StudentBalance {
    StudentBalance {
        total_fees: total_fees(student),
        total_paid: total_paid(student, payments),
        outstanding: compute_outstanding(student, payments),
        unapplied_credit: unapplied_credit(student, payments),
    }
}
