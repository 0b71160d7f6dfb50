// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::ledger::{compute_outstanding, is_line_overdue, total_fees, total_paid};
use crate::models::{FeeTemplate, Payment, Settings, Student};
use crate::store::{DocumentStore, EntityStore};
use crate::utils::{
    arg_str, fmt_amount, format_currency, format_date, opt_str, parse_date, start_of_day, today,
};

pub fn handle<D: DocumentStore>(store: &EntityStore<D>, m: &clap::ArgMatches) -> Result<()> {
    let Some((what, sub)) = m.subcommand() else {
        return Ok(());
    };
    let out = arg_str(sub, "out")?;
    let body = match what {
        "backup" => store.export_data()?,
        "students" => students_csv(&store.students()?, &store.payments()?, &store.settings()?)?,
        "payments" => {
            let from = opt_str(sub, "from").map(|d| parse_date(&d)).transpose()?;
            let to = opt_str(sub, "to").map(|d| parse_date(&d)).transpose()?;
            payments_csv(
                &store.students()?,
                &store.payments()?,
                &store.settings()?,
                from,
                to,
            )?
        }
        "outstanding" => outstanding_csv(&store.students()?, &store.payments()?, today())?,
        "fees" => fee_templates_csv(&store.fee_templates()?, &store.students()?)?,
        _ => return Ok(()),
    };
    std::fs::write(&out, body).with_context(|| format!("Write {}", out))?;
    println!("Exported {} to {}", what, out);
    Ok(())
}

fn write_csv(rows: Vec<Vec<String>>) -> Result<String> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for row in rows {
        wtr.write_record(&row)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

fn header(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|c| c.to_string()).collect()
}

pub fn students_csv(students: &[Student], payments: &[Payment], settings: &Settings) -> Result<String> {
    let mut rows = vec![header(&[
        "Student ID",
        "First Name",
        "Last Name",
        "Grade",
        "Status",
        "Contact Phone",
        "Contact Email",
        "Guardian Name",
        "Enrollment Date",
        "Total Fees",
        "Total Paid",
        "Outstanding Balance",
        "Notes",
    ])];
    for s in students {
        rows.push(vec![
            s.student_id.clone(),
            s.first_name.clone(),
            s.last_name.clone(),
            s.grade.clone(),
            s.status.as_str().to_string(),
            s.contact_phone.clone().unwrap_or_default(),
            s.contact_email.clone().unwrap_or_default(),
            s.guardian_name.clone().unwrap_or_default(),
            format_date(&s.enrollment_date, settings.date_format),
            fmt_amount(total_fees(s)),
            fmt_amount(total_paid(s, payments)),
            fmt_amount(compute_outstanding(s, payments)),
            s.notes.clone().unwrap_or_default(),
        ]);
    }
    write_csv(rows)
}

/// `Tuition: $50.00; Books: $20.00`. Allocations whose line is gone read
/// "Unknown Fee"; a payment with no allocations reads "Not applied".
pub fn describe_allocations(payment: &Payment, student: Option<&Student>, currency: &str) -> String {
    let parts: Vec<String> = payment
        .applied_to
        .iter()
        .map(|a| match student.and_then(|s| s.fee_line(&a.fee_line_id)) {
            Some(line) => format!("{}: {}", line.title, format_currency(a.amount, currency)),
            None => "Unknown Fee".to_string(),
        })
        .collect();
    if parts.is_empty() {
        "Not applied".to_string()
    } else {
        parts.join("; ")
    }
}

/// Payments dated within `[from, to]` (calendar days, both ends inclusive).
pub fn payments_in_range(
    payments: &[Payment],
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Vec<&Payment> {
    let mut picked: Vec<&Payment> = payments
        .iter()
        .filter(|p| {
            let d = p.date.date_naive();
            from.is_none_or(|f| d >= f) && to.is_none_or(|t| d <= t)
        })
        .collect();
    picked.sort_by(|a, b| b.date.cmp(&a.date));
    picked
}

pub fn payments_csv(
    students: &[Student],
    payments: &[Payment],
    settings: &Settings,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<String> {
    let by_id: HashMap<&str, &Student> = students.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut rows = vec![header(&[
        "Payment Date",
        "Student ID",
        "Student Name",
        "Grade",
        "Amount",
        "Method",
        "Applied To",
        "Notes",
    ])];
    for p in payments_in_range(payments, from, to) {
        let student = by_id.get(p.student_id.as_str()).copied();
        rows.push(vec![
            format_date(&p.date, settings.date_format),
            student.map_or_else(|| "Unknown".to_string(), |s| s.student_id.clone()),
            student.map_or_else(|| "Unknown Student".to_string(), |s| s.full_name()),
            student.map(|s| s.grade.clone()).unwrap_or_default(),
            fmt_amount(p.amount),
            p.method.clone(),
            describe_allocations(p, student, &settings.currency),
            p.notes.clone().unwrap_or_default(),
        ]);
    }
    write_csv(rows)
}

pub fn outstanding_csv(students: &[Student], payments: &[Payment], today: NaiveDate) -> Result<String> {
    let mut owing: Vec<(&Student, Decimal)> = students
        .iter()
        .map(|s| (s, compute_outstanding(s, payments)))
        .filter(|(_, o)| *o > Decimal::ZERO)
        .collect();
    owing.sort_by(|a, b| b.1.cmp(&a.1));

    let mut rows = vec![header(&[
        "Student ID",
        "Student Name",
        "Grade",
        "Contact Email",
        "Guardian Name",
        "Outstanding Balance",
        "Overdue Fees",
    ])];
    for (s, outstanding) in owing {
        let overdue: Vec<&str> = s
            .assigned_fees
            .iter()
            .filter(|f| is_line_overdue(f, start_of_day(today)))
            .map(|f| f.title.as_str())
            .collect();
        rows.push(vec![
            s.student_id.clone(),
            s.full_name(),
            s.grade.clone(),
            s.contact_email.clone().unwrap_or_default(),
            s.guardian_name.clone().unwrap_or_default(),
            fmt_amount(outstanding),
            if overdue.is_empty() {
                "None".to_string()
            } else {
                overdue.join("; ")
            },
        ]);
    }
    write_csv(rows)
}

pub fn fee_templates_csv(templates: &[FeeTemplate], students: &[Student]) -> Result<String> {
    let mut rows = vec![header(&[
        "Fee Name",
        "Category",
        "Amount",
        "Frequency",
        "Due Day",
        "Assigned Students",
        "Notes",
    ])];
    for t in templates {
        let assigned = students.iter().filter(|s| s.has_template(&t.id)).count();
        rows.push(vec![
            t.title.clone(),
            t.category.clone(),
            fmt_amount(t.amount),
            t.frequency.as_str().to_string(),
            t.due_day.map(|d| d.to_string()).unwrap_or_default(),
            assigned.to_string(),
            t.notes.clone().unwrap_or_default(),
        ]);
    }
    write_csv(rows)
}
