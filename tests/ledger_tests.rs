// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use feeledger::error::LedgerError;
use feeledger::ledger::{
    IntegrityIssue, PaymentRequest, apply_payment, audit, compute_outstanding, derive_status,
    refresh_statuses, remaining_balance, remove_fee_line, student_balance, total_applied,
    unapplied_credit,
};
use feeledger::models::{
    Allocation, AppliedPayment, FeeLine, FeeLineStatus, Payment, Student, StudentStatus,
};
use rust_decimal::Decimal;

fn dec(v: i64) -> Decimal {
    Decimal::from(v)
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn line(id: &str, amount: i64, due: Option<DateTime<Utc>>) -> FeeLine {
    FeeLine {
        id: id.to_string(),
        template_id: None,
        title: format!("Fee {}", id),
        amount: dec(amount),
        due_date: due,
        created_at: at(2025, 1, 1),
        status: FeeLineStatus::Open,
        payments_applied: Vec::new(),
    }
}

fn student(fees: Vec<FeeLine>) -> Student {
    Student {
        id: "s-1".into(),
        student_id: "STU001".into(),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        grade: "5th".into(),
        contact_phone: None,
        contact_email: None,
        guardian_name: None,
        enrollment_date: at(2025, 1, 1),
        status: StudentStatus::Active,
        notes: None,
        invoice_number: None,
        assigned_fees: fees,
    }
}

fn payment(student_id: &str, amount: i64, applied_to: Vec<Allocation>) -> Payment {
    Payment {
        id: format!("p-{}", amount),
        student_id: student_id.into(),
        date: at(2025, 2, 1),
        amount: dec(amount),
        method: "Cash".into(),
        notes: None,
        applied_to,
    }
}

fn alloc(fee_line_id: &str, amount: i64) -> Allocation {
    Allocation {
        fee_line_id: fee_line_id.into(),
        amount: dec(amount),
    }
}

fn request(amount: i64, allocations: Vec<Allocation>) -> PaymentRequest {
    PaymentRequest {
        amount: dec(amount),
        method: "Cash".into(),
        date: at(2025, 2, 1),
        notes: None,
        allocations,
    }
}

#[test]
fn outstanding_is_fees_minus_payments() {
    let s = student(vec![line("a", 100, None), line("b", 50, None)]);
    let payments = vec![payment("s-1", 30, vec![]), payment("other", 500, vec![])];
    assert_eq!(compute_outstanding(&s, &payments), dec(120));
}

#[test]
fn outstanding_never_goes_negative() {
    let s = student(vec![line("a", 100, None)]);
    let payments = vec![payment("s-1", 80, vec![]), payment("s-1", 70, vec![])];
    assert_eq!(compute_outstanding(&s, &payments), Decimal::ZERO);
    let balance = student_balance(&s, &payments);
    assert_eq!(balance.total_paid, dec(150));
    assert_eq!(balance.outstanding, Decimal::ZERO);
}

#[test]
fn status_moves_forward_as_money_is_applied() {
    let today = day(2025, 3, 1);
    let mut l = line("a", 100, Some(at(2025, 2, 1)));
    assert_eq!(derive_status(&l, today), FeeLineStatus::Overdue);

    let mut seen = Vec::new();
    for step in [10, 40, 49, 1] {
        l.payments_applied.push(AppliedPayment {
            payment_id: format!("p{}", step),
            amount: dec(step),
        });
        seen.push(derive_status(&l, today));
    }
    assert_eq!(
        seen,
        vec![
            FeeLineStatus::Partial,
            FeeLineStatus::Partial,
            FeeLineStatus::Partial,
            FeeLineStatus::Paid
        ]
    );
}

#[test]
fn fully_paid_past_due_line_is_paid_not_overdue() {
    let mut l = line("a", 100, Some(at(2024, 12, 1)));
    l.payments_applied.push(AppliedPayment {
        payment_id: "p".into(),
        amount: dec(100),
    });
    assert_eq!(derive_status(&l, day(2025, 3, 1)), FeeLineStatus::Paid);
}

#[test]
fn due_today_is_not_overdue_yet() {
    let l = line("a", 100, Some(at(2025, 3, 1)));
    assert_eq!(derive_status(&l, day(2025, 3, 1)), FeeLineStatus::Open);
    assert_eq!(derive_status(&l, day(2025, 3, 2)), FeeLineStatus::Overdue);
}

#[test]
fn apply_payment_adds_one_entry_per_allocation() {
    let s = student(vec![line("a", 100, None), line("b", 50, None)]);
    let (p, updated) = apply_payment(
        &s,
        request(120, vec![alloc("a", 100), alloc("b", 20)]),
        day(2025, 2, 1),
    )
    .unwrap();

    assert_eq!(p.student_id, "s-1");
    assert_eq!(p.applied_to.len(), 2);
    for a in &p.applied_to {
        let l = updated.fee_line(&a.fee_line_id).unwrap();
        assert_eq!(l.payments_applied.len(), 1);
        assert_eq!(l.payments_applied[0].payment_id, p.id);
        assert_eq!(l.payments_applied[0].amount, a.amount);
        assert!(total_applied(l) <= l.amount);
    }
    assert_eq!(updated.fee_line("a").unwrap().status, FeeLineStatus::Paid);
    assert_eq!(updated.fee_line("b").unwrap().status, FeeLineStatus::Partial);
    assert!(s.fee_line("a").unwrap().payments_applied.is_empty());
}

#[test]
fn over_application_is_rejected() {
    let mut l = line("a", 100, None);
    l.payments_applied.push(AppliedPayment {
        payment_id: "earlier".into(),
        amount: dec(80),
    });
    let s = student(vec![l]);
    assert_eq!(remaining_balance(s.fee_line("a").unwrap()), dec(20));

    let err = apply_payment(&s, request(30, vec![alloc("a", 30)]), day(2025, 2, 1)).unwrap_err();
    assert_eq!(
        err,
        LedgerError::ExceedsBalance {
            fee_line_id: "a".into(),
            requested: dec(30),
            remaining: dec(20),
        }
    );
}

#[test]
fn invalid_payments_are_rejected() {
    let s = student(vec![line("a", 100, None), line("b", 100, None)]);
    let today = day(2025, 2, 1);

    assert!(matches!(
        apply_payment(&s, request(0, vec![]), today),
        Err(LedgerError::NonPositivePayment(_))
    ));
    assert!(matches!(
        apply_payment(&s, request(50, vec![alloc("a", 0)]), today),
        Err(LedgerError::NonPositiveAllocation(_))
    ));
    assert!(matches!(
        apply_payment(&s, request(50, vec![alloc("a", 10), alloc("a", 10)]), today),
        Err(LedgerError::DuplicateAllocation(_))
    ));
    assert!(matches!(
        apply_payment(&s, request(50, vec![alloc("zzz", 10)]), today),
        Err(LedgerError::UnknownFeeLine { .. })
    ));
    assert!(matches!(
        apply_payment(&s, request(50, vec![alloc("a", 40), alloc("b", 40)]), today),
        Err(LedgerError::ExceedsPayment { .. })
    ));
}

#[test]
fn payment_without_allocations_is_unapplied_credit() {
    let s = student(vec![line("a", 100, None)]);
    let (p, updated) = apply_payment(&s, request(40, vec![]), day(2025, 2, 1)).unwrap();
    assert!(updated.fee_line("a").unwrap().payments_applied.is_empty());
    let payments = vec![p];
    assert_eq!(unapplied_credit(&updated, &payments), dec(40));
    assert_eq!(compute_outstanding(&updated, &payments), dec(60));
}

#[test]
fn fractional_amounts_stay_exact() {
    let mut l = line("a", 0, None);
    l.amount = Decimal::new(3, 1);
    let s = student(vec![l]);
    let (_, updated) = apply_payment(
        &s,
        PaymentRequest {
            amount: Decimal::new(3, 1),
            allocations: vec![Allocation {
                fee_line_id: "a".into(),
                amount: Decimal::new(1, 1),
            }],
            ..request(1, vec![])
        },
        day(2025, 2, 1),
    )
    .unwrap();
    let (_, updated) = apply_payment(
        &updated,
        PaymentRequest {
            amount: Decimal::new(2, 1),
            allocations: vec![Allocation {
                fee_line_id: "a".into(),
                amount: Decimal::new(2, 1),
            }],
            ..request(1, vec![])
        },
        day(2025, 2, 1),
    )
    .unwrap();
    assert_eq!(updated.fee_line("a").unwrap().status, FeeLineStatus::Paid);
}

#[test]
fn refresh_statuses_counts_changes() {
    let mut s = student(vec![line("a", 100, Some(at(2025, 1, 10))), line("b", 10, None)]);
    assert_eq!(refresh_statuses(&mut s, day(2025, 2, 1)), 1);
    assert_eq!(s.fee_line("a").unwrap().status, FeeLineStatus::Overdue);
    assert_eq!(refresh_statuses(&mut s, day(2025, 2, 1)), 0);
}

#[test]
fn removing_a_paid_line_needs_force_and_shows_up_in_audit() {
    let s = student(vec![line("a", 100, None)]);
    let (p, mut updated) =
        apply_payment(&s, request(100, vec![alloc("a", 100)]), day(2025, 2, 1)).unwrap();

    let err = remove_fee_line(&mut updated, "a", false).unwrap_err();
    assert!(matches!(err, LedgerError::WouldOrphanPayments { allocations: 1, .. }));
    assert_eq!(updated.assigned_fees.len(), 1);

    remove_fee_line(&mut updated, "a", true).unwrap();
    let issues = audit(&[updated], &[p], day(2025, 2, 1));
    assert!(issues.iter().any(|i| matches!(
        i,
        IntegrityIssue::DanglingAllocation { fee_line_id, .. } if fee_line_id == "a"
    )));
}

#[test]
fn audit_flags_stale_status_and_unknown_student() {
    let mut l = line("a", 100, Some(at(2025, 1, 1)));
    l.status = FeeLineStatus::Open;
    let s = student(vec![l]);
    let orphan = payment("ghost", 10, vec![]);
    let issues = audit(&[s], &[orphan], day(2025, 2, 1));
    let kinds: Vec<&str> = issues.iter().map(|i| i.kind()).collect();
    assert!(kinds.contains(&"stale_status"));
    assert!(kinds.contains(&"unknown_student"));
}
