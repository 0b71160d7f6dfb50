// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::LedgerError;
use crate::models::{FeeLine, FeeLineStatus, FeeTemplate, Student, StudentStatus, new_id};
use crate::utils::{month_end, start_of_day};

pub fn validate_template(template: &FeeTemplate) -> Result<(), LedgerError> {
    if template.title.trim().is_empty() {
        return Err(LedgerError::MissingField("title"));
    }
    if template.amount < Decimal::ZERO {
        return Err(LedgerError::NegativeAmount(template.amount));
    }
    if let Some(day) = template.due_day {
        if !(1..=31).contains(&day) {
            return Err(LedgerError::InvalidDueDay(day));
        }
    }
    Ok(())
}

// Day numbers past the end of a short month land on its last day.
fn clamped(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = month_end(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.min(last.day()))
}

/// Due date for a day-of-month template relative to `reference`: this
/// month's `due_day`, or next month's when that day has already passed.
pub fn due_date_for(due_day: u32, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let today = reference.date_naive();
    let this_month = clamped(today.year(), today.month(), due_day)?;
    let due = if this_month < today {
        let (y, m) = if today.month() == 12 {
            (today.year() + 1, 1)
        } else {
            (today.year(), today.month() + 1)
        };
        clamped(y, m, due_day)?
    } else {
        this_month
    };
    Some(start_of_day(due))
}

/// Snapshots the template into a fresh, independent fee line.
pub fn instantiate_fee_line(template: &FeeTemplate, reference: DateTime<Utc>) -> FeeLine {
    FeeLine {
        id: new_id(),
        template_id: Some(template.id.clone()),
        title: template.title.clone(),
        amount: template.amount,
        due_date: template.due_day.and_then(|d| due_date_for(d, reference)),
        created_at: reference,
        status: FeeLineStatus::Open,
        payments_applied: Vec::new(),
    }
}

/// Ad-hoc fee line with no template behind it.
pub fn custom_fee_line(
    title: &str,
    amount: Decimal,
    due_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<FeeLine, LedgerError> {
    if title.trim().is_empty() {
        return Err(LedgerError::MissingField("title"));
    }
    if amount < Decimal::ZERO {
        return Err(LedgerError::NegativeAmount(amount));
    }
    Ok(FeeLine {
        id: new_id(),
        template_id: None,
        title: title.trim().to_string(),
        amount,
        due_date,
        created_at: now,
        status: FeeLineStatus::Open,
        payments_applied: Vec::new(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelection {
    /// Every active student in the grade.
    Grade(String),
    /// Explicit picks by internal id or student code, any status.
    Students(Vec<String>),
}

/// Indexes into `students` chosen by `selection`, plus explicit keys that
/// matched nobody.
pub fn select_targets(students: &[Student], selection: &TargetSelection) -> (Vec<usize>, Vec<String>) {
    match selection {
        TargetSelection::Grade(grade) => {
            let picked = students
                .iter()
                .enumerate()
                .filter(|(_, s)| s.grade == *grade && s.status == StudentStatus::Active)
                .map(|(i, _)| i)
                .collect();
            (picked, Vec::new())
        }
        TargetSelection::Students(keys) => {
            let mut picked: Vec<usize> = Vec::new();
            let mut missing = Vec::new();
            for key in keys {
                match students.iter().position(|s| s.matches_key(key)) {
                    Some(i) if !picked.contains(&i) => picked.push(i),
                    Some(_) => {}
                    None => missing.push(key.clone()),
                }
            }
            (picked, missing)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkAssignReport {
    pub newly_assigned: Vec<String>,
    pub already_assigned: Vec<String>,
    pub not_found: Vec<String>,
}

/// Appends one new line from `template` to every selected student that
/// does not already carry it. Re-running with the same selection is a no-op.
pub fn bulk_assign(
    template: &FeeTemplate,
    students: &mut [Student],
    selection: &TargetSelection,
    reference: DateTime<Utc>,
) -> BulkAssignReport {
    let (targets, not_found) = select_targets(students, selection);
    let mut report = BulkAssignReport {
        not_found,
        ..Default::default()
    };
    for i in targets {
        let student = &mut students[i];
        if student.has_template(&template.id) {
            log::debug!("{} already carries '{}'", student.student_id, template.title);
            report.already_assigned.push(student.student_id.clone());
            continue;
        }
        student
            .assigned_fees
            .push(instantiate_fee_line(template, reference));
        report.newly_assigned.push(student.student_id.clone());
    }
    report
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkUnassignReport {
    pub affected_students: Vec<String>,
    pub removed_lines: usize,
    /// Payment allocations now pointing at a removed line.
    pub dangling_allocations: usize,
}

/// Strips every line instantiated from `template`. Lines with payment
/// history are only removed when `force` is set, since their payments'
/// `appliedTo` entries would be left pointing at nothing.
pub fn bulk_unassign(
    template: &FeeTemplate,
    students: &mut [Student],
    force: bool,
) -> Result<BulkUnassignReport, LedgerError> {
    let from_template = |f: &FeeLine| f.template_id.as_deref() == Some(template.id.as_str());
    let allocations: usize = students
        .iter()
        .flat_map(|s| s.assigned_fees.iter())
        .filter(|f| from_template(f))
        .map(|f| f.payments_applied.len())
        .sum();
    if allocations > 0 && !force {
        return Err(LedgerError::WouldOrphanPayments {
            title: template.title.clone(),
            allocations,
        });
    }

    let mut report = BulkUnassignReport {
        dangling_allocations: allocations,
        ..Default::default()
    };
    for student in students.iter_mut() {
        let before = student.assigned_fees.len();
        student.assigned_fees.retain(|f| !from_template(f));
        let removed = before - student.assigned_fees.len();
        if removed > 0 {
            report.removed_lines += removed;
            report.affected_students.push(student.student_id.clone());
        }
    }
    if allocations > 0 {
        log::warn!(
            "removing '{}' left {} payment allocation(s) dangling",
            template.title,
            allocations
        );
    }
    Ok(report)
}

/// Removes one line from a student under the same orphan rule as
/// [`bulk_unassign`].
pub fn remove_fee_line(
    student: &mut Student,
    fee_line_id: &str,
    force: bool,
) -> Result<FeeLine, LedgerError> {
    let idx = student
        .assigned_fees
        .iter()
        .position(|f| f.id == fee_line_id)
        .ok_or_else(|| LedgerError::UnknownFeeLine {
            student_id: student.student_id.clone(),
            fee_line_id: fee_line_id.to_string(),
        })?;
    let line = &student.assigned_fees[idx];
    if !line.payments_applied.is_empty() && !force {
        return Err(LedgerError::WouldOrphanPayments {
            title: line.title.clone(),
            allocations: line.payments_applied.len(),
        });
    }
    Ok(student.assigned_fees.remove(idx))
}
