// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, TimeZone, Utc};
use feeledger::error::LedgerError;
use feeledger::ledger::{
    TargetSelection, bulk_assign, bulk_unassign, custom_fee_line, due_date_for,
    instantiate_fee_line, validate_template,
};
use feeledger::models::{
    AppliedPayment, FeeLineStatus, FeeTemplate, Frequency, Student, StudentStatus,
};
use rust_decimal::Decimal;
use std::collections::HashSet;

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn template(due_day: Option<u32>) -> FeeTemplate {
    FeeTemplate {
        id: "tpl-tuition".into(),
        title: "Tuition".into(),
        category: "Tuition".into(),
        amount: Decimal::from(250),
        frequency: Frequency::Monthly,
        due_day,
        notes: None,
    }
}

fn student(id: &str, grade: &str, status: StudentStatus) -> Student {
    Student {
        id: format!("id-{}", id),
        student_id: id.to_string(),
        first_name: "Test".into(),
        last_name: id.to_string(),
        grade: grade.to_string(),
        contact_phone: None,
        contact_email: None,
        guardian_name: None,
        enrollment_date: at(2025, 1, 1),
        status,
        notes: None,
        invoice_number: None,
        assigned_fees: Vec::new(),
    }
}

fn roster() -> Vec<Student> {
    vec![
        student("S1", "5th", StudentStatus::Active),
        student("S2", "5th", StudentStatus::Active),
        student("S3", "5th", StudentStatus::Inactive),
        student("S4", "6th", StudentStatus::Active),
    ]
}

#[test]
fn due_day_already_passed_rolls_to_next_month() {
    assert_eq!(due_date_for(15, at(2025, 1, 20)), Some(at(2025, 2, 15)));
}

#[test]
fn due_day_still_ahead_stays_in_month() {
    assert_eq!(due_date_for(15, at(2025, 1, 10)), Some(at(2025, 1, 15)));
    assert_eq!(due_date_for(15, at(2025, 1, 15)), Some(at(2025, 1, 15)));
}

#[test]
fn due_day_is_clamped_to_month_end() {
    assert_eq!(due_date_for(31, at(2025, 2, 10)), Some(at(2025, 2, 28)));
    assert_eq!(due_date_for(31, at(2024, 2, 10)), Some(at(2024, 2, 29)));
    assert_eq!(due_date_for(30, at(2025, 12, 31)), Some(at(2026, 1, 30)));
}

#[test]
fn instantiated_line_snapshots_template() {
    let reference = Utc.with_ymd_and_hms(2025, 1, 20, 14, 0, 0).unwrap();
    let line = instantiate_fee_line(&template(Some(15)), reference);
    assert_eq!(line.template_id.as_deref(), Some("tpl-tuition"));
    assert_eq!(line.title, "Tuition");
    assert_eq!(line.amount, Decimal::from(250));
    assert_eq!(line.due_date, Some(at(2025, 2, 15)));
    assert_eq!(line.created_at, reference);
    assert!(line.payments_applied.is_empty());

    assert_eq!(instantiate_fee_line(&template(None), reference).due_date, None);
}

#[test]
fn custom_line_has_no_template() {
    let now = at(2025, 3, 2);
    let line =
        custom_fee_line("  Field trip ", Decimal::from(35), Some(at(2025, 3, 20)), now).unwrap();
    assert_eq!(line.template_id, None);
    assert_eq!(line.title, "Field trip");
    assert_eq!(line.amount, Decimal::from(35));
    assert_eq!(line.due_date, Some(at(2025, 3, 20)));
    assert_eq!(line.status, FeeLineStatus::Open);
    assert_eq!(line.created_at, now);

    assert_eq!(
        custom_fee_line("   ", Decimal::from(35), None, now).unwrap_err(),
        LedgerError::MissingField("title")
    );
    assert_eq!(
        custom_fee_line("Lab", Decimal::from(-1), None, now).unwrap_err(),
        LedgerError::NegativeAmount(Decimal::from(-1))
    );
}

#[test]
fn grade_assignment_skips_inactive_students() {
    let mut students = roster();
    let report = bulk_assign(
        &template(None),
        &mut students,
        &TargetSelection::Grade("5th".into()),
        at(2025, 1, 5),
    );
    assert_eq!(report.newly_assigned, vec!["S1", "S2"]);
    assert_eq!(students[2].assigned_fees.len(), 0);
    assert_eq!(students[3].assigned_fees.len(), 0);
}

#[test]
fn explicit_assignment_reports_unknown_keys() {
    let mut students = roster();
    let report = bulk_assign(
        &template(None),
        &mut students,
        &TargetSelection::Students(vec!["S3".into(), "id-S4".into(), "NOPE".into()]),
        at(2025, 1, 5),
    );
    assert_eq!(report.newly_assigned, vec!["S3", "S4"]);
    assert_eq!(report.not_found, vec!["NOPE"]);
}

#[test]
fn reassigning_is_idempotent() {
    let mut students = roster();
    let selection = TargetSelection::Grade("5th".into());
    bulk_assign(&template(None), &mut students, &selection, at(2025, 1, 5));
    let counts: Vec<usize> = students.iter().map(|s| s.assigned_fees.len()).collect();

    let again = bulk_assign(&template(None), &mut students, &selection, at(2025, 1, 6));
    let after: Vec<usize> = students.iter().map(|s| s.assigned_fees.len()).collect();
    assert_eq!(counts, after);
    assert!(again.newly_assigned.is_empty());
    assert_eq!(again.already_assigned, vec!["S1", "S2"]);
}

#[test]
fn each_student_gets_a_distinct_line_id() {
    let mut students = roster();
    bulk_assign(
        &template(None),
        &mut students,
        &TargetSelection::Grade("5th".into()),
        at(2025, 1, 5),
    );
    let ids: HashSet<&str> = students
        .iter()
        .flat_map(|s| s.assigned_fees.iter().map(|f| f.id.as_str()))
        .collect();
    assert_eq!(ids.len(), 2);
}

#[test]
fn unassign_refuses_to_orphan_payments_without_force() {
    let mut students = roster();
    let tpl = template(None);
    bulk_assign(&tpl, &mut students, &TargetSelection::Grade("5th".into()), at(2025, 1, 5));
    students[0].assigned_fees[0].payments_applied.push(AppliedPayment {
        payment_id: "p1".into(),
        amount: Decimal::from(100),
    });

    let err = bulk_unassign(&tpl, &mut students, false).unwrap_err();
    assert_eq!(
        err,
        LedgerError::WouldOrphanPayments {
            title: "Tuition".into(),
            allocations: 1
        }
    );
    assert_eq!(students[0].assigned_fees.len(), 1);

    let report = bulk_unassign(&tpl, &mut students, true).unwrap();
    assert_eq!(report.removed_lines, 2);
    assert_eq!(report.dangling_allocations, 1);
    assert_eq!(report.affected_students, vec!["S1", "S2"]);
    assert!(students.iter().all(|s| !s.has_template(&tpl.id)));
}

#[test]
fn unassign_without_payments_needs_no_force() {
    let mut students = roster();
    let tpl = template(None);
    bulk_assign(&tpl, &mut students, &TargetSelection::Grade("5th".into()), at(2025, 1, 5));
    let report = bulk_unassign(&tpl, &mut students, false).unwrap();
    assert_eq!(report.removed_lines, 2);
    assert_eq!(report.dangling_allocations, 0);
}

#[test]
fn template_validation() {
    assert!(validate_template(&template(Some(31))).is_ok());
    assert_eq!(
        validate_template(&template(Some(0))),
        Err(LedgerError::InvalidDueDay(0))
    );
    let mut negative = template(None);
    negative.amount = Decimal::from(-1);
    assert!(matches!(
        validate_template(&negative),
        Err(LedgerError::NegativeAmount(_))
    ));
    let mut blank = template(None);
    blank.title = "  ".into();
    assert_eq!(
        validate_template(&blank),
        Err(LedgerError::MissingField("title"))
    );
}
