// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;

use super::balance::remaining_balance;
use super::status::derive_status;
use crate::error::LedgerError;
use crate::models::{Allocation, AppliedPayment, Payment, Student, new_id};

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub method: String,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
    pub allocations: Vec<Allocation>,
}

/// Checks a payment and its allocations against the student's current fee
/// lines without touching anything.
pub fn validate_allocations(
    student: &Student,
    amount: Decimal,
    allocations: &[Allocation],
) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositivePayment(amount));
    }
    let mut seen = HashSet::new();
    let mut allocated = Decimal::ZERO;
    for alloc in allocations {
        if alloc.amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAllocation(alloc.fee_line_id.clone()));
        }
        if !seen.insert(alloc.fee_line_id.as_str()) {
            return Err(LedgerError::DuplicateAllocation(alloc.fee_line_id.clone()));
        }
        let line = student
            .fee_line(&alloc.fee_line_id)
            .ok_or_else(|| LedgerError::UnknownFeeLine {
                student_id: student.student_id.clone(),
                fee_line_id: alloc.fee_line_id.clone(),
            })?;
        let remaining = remaining_balance(line);
        if alloc.amount > remaining {
            return Err(LedgerError::ExceedsBalance {
                fee_line_id: alloc.fee_line_id.clone(),
                requested: alloc.amount,
                remaining,
            });
        }
        allocated += alloc.amount;
    }
    if allocated > amount {
        return Err(LedgerError::ExceedsPayment { allocated, amount });
    }
    Ok(())
}

/// Records a payment against `student`. Returns the new payment and the
/// student with one `paymentsApplied` entry appended per allocation and
/// statuses re-derived. Any validation failure leaves both untouched.
pub fn apply_payment(
    student: &Student,
    request: PaymentRequest,
    today: NaiveDate,
) -> Result<(Payment, Student), LedgerError> {
    validate_allocations(student, request.amount, &request.allocations)?;

    let payment = Payment {
        id: new_id(),
        student_id: student.id.clone(),
        date: request.date,
        amount: request.amount,
        method: request.method,
        notes: request.notes,
        applied_to: request.allocations,
    };

    let mut updated = student.clone();
    for line in updated.assigned_fees.iter_mut() {
        if let Some(alloc) = payment.applied_to.iter().find(|a| a.fee_line_id == line.id) {
            line.payments_applied.push(AppliedPayment {
                payment_id: payment.id.clone(),
                amount: alloc.amount,
            });
            line.status = derive_status(line, today);
        }
    }
    log::debug!(
        "payment {} of {} for {} spread over {} line(s)",
        payment.id,
        payment.amount,
        student.student_id,
        payment.applied_to.len()
    );
    Ok((payment, updated))
}
