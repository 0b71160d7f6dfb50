// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::Serialize;

use super::{student_index, template_index};
use crate::ledger::{
    compute_outstanding, custom_fee_line, derive_status, instantiate_fee_line, remaining_balance,
    remove_fee_line, total_applied, total_fees, total_paid,
};
use crate::models::{FeeLine, Student, StudentStatus, new_id};
use crate::store::{DocumentStore, EntityStore};
use crate::utils::{
    arg_str, flag, fmt_amount, format_date, maybe_print_json, opt_str, parse_date,
    parse_amount, pretty_table, start_of_day, today,
};

pub fn handle<D: DocumentStore>(store: &EntityStore<D>, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(store, sub)?,
        Some(("list", sub)) => list(store, sub)?,
        Some(("show", sub)) => show(store, sub)?,
        Some(("update", sub)) => update(store, sub)?,
        Some(("rm", sub)) => remove(store, sub)?,
        Some(("add-fee", sub)) => add_fee(store, sub)?,
        Some(("remove-fee", sub)) => remove_fee(store, sub)?,
        _ => {}
    }
    Ok(())
}

fn warn_unknown_grade<D: DocumentStore>(store: &EntityStore<D>, grade: &str) -> Result<()> {
    let settings = store.settings()?;
    if !settings.grade_options.iter().any(|g| g == grade) {
        log::warn!("grade '{}' is not one of the configured grade options", grade);
    }
    Ok(())
}

fn add<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let student_code = arg_str(sub, "student-id")?;
    let first_name = arg_str(sub, "first-name")?;
    let last_name = arg_str(sub, "last-name")?;
    let grade = arg_str(sub, "grade")?;
    for (name, value) in [
        ("studentId", &student_code),
        ("firstName", &first_name),
        ("lastName", &last_name),
        ("grade", &grade),
    ] {
        if value.is_empty() {
            bail!("{} must not be blank", name);
        }
    }
    let status = match opt_str(sub, "status") {
        Some(s) => s.parse::<StudentStatus>()?,
        None => StudentStatus::Active,
    };
    let enrolled = match opt_str(sub, "enrolled") {
        Some(d) => parse_date(&d)?,
        None => today(),
    };
    warn_unknown_grade(store, &grade)?;
    let fee_keys: Vec<String> = sub
        .get_many::<String>("fee")
        .map(|v| v.map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    let now = Utc::now();
    let student = store.transact(|tx| -> Result<Student> {
        let mut students = tx.students()?;
        if students.iter().any(|s| s.student_id == student_code) {
            bail!("Student ID '{}' is already in use", student_code);
        }
        let templates = tx.fee_templates()?;
        let mut assigned_fees = Vec::with_capacity(fee_keys.len());
        for key in &fee_keys {
            let template = &templates[template_index(&templates, key)?];
            if assigned_fees
                .iter()
                .any(|f: &FeeLine| f.template_id.as_deref() == Some(template.id.as_str()))
            {
                continue;
            }
            assigned_fees.push(instantiate_fee_line(template, now));
        }
        let student = Student {
            id: new_id(),
            student_id: student_code.clone(),
            first_name: first_name.clone(),
            last_name: last_name.clone(),
            grade: grade.clone(),
            contact_phone: opt_str(sub, "phone"),
            contact_email: opt_str(sub, "email"),
            guardian_name: opt_str(sub, "guardian"),
            enrollment_date: start_of_day(enrolled),
            status,
            notes: opt_str(sub, "notes"),
            invoice_number: None,
            assigned_fees,
        };
        students.push(student.clone());
        tx.set_students(&students)?;
        Ok(student)
    })?;
    println!(
        "Added student {} ({}) with {} fee line(s)",
        student.full_name(),
        student.student_id,
        student.assigned_fees.len()
    );
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StudentRow {
    student_id: String,
    name: String,
    grade: String,
    status: &'static str,
    total_fees: String,
    total_paid: String,
    outstanding: String,
}

fn list<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let grade = opt_str(sub, "grade");
    let status = opt_str(sub, "status")
        .map(|s| s.parse::<StudentStatus>())
        .transpose()?;
    let students = store.students()?;
    let payments = store.payments()?;

    let mut rows: Vec<StudentRow> = students
        .iter()
        .filter(|s| grade.as_ref().is_none_or(|g| &s.grade == g))
        .filter(|s| status.is_none_or(|st| s.status == st))
        .map(|s| StudentRow {
            student_id: s.student_id.clone(),
            name: s.full_name(),
            grade: s.grade.clone(),
            status: s.status.as_str(),
            total_fees: fmt_amount(total_fees(s)),
            total_paid: fmt_amount(total_paid(s, &payments)),
            outstanding: fmt_amount(compute_outstanding(s, &payments)),
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));

    if !maybe_print_json(flag(sub, "json"), flag(sub, "jsonl"), &rows)? {
        let data = rows
            .into_iter()
            .map(|r| {
                vec![
                    r.student_id,
                    r.name,
                    r.grade,
                    r.status.to_string(),
                    r.total_fees,
                    r.total_paid,
                    r.outstanding,
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Student ID", "Name", "Grade", "Status", "Fees", "Paid", "Outstanding"],
                data
            )
        );
    }
    Ok(())
}

fn show<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let key = arg_str(sub, "student")?;
    let students = store.students()?;
    let student = &students[student_index(&students, &key)?];
    if maybe_print_json(flag(sub, "json"), flag(sub, "jsonl"), student)? {
        return Ok(());
    }
    let settings = store.settings()?;
    let payments = store.payments()?;
    let today = today();

    println!(
        "{} ({}) grade {}, {}",
        student.full_name(),
        student.student_id,
        student.grade,
        student.status.as_str()
    );
    if let Some(number) = &student.invoice_number {
        println!("Invoice: {}", number);
    }
    let data = student
        .assigned_fees
        .iter()
        .map(|f| {
            vec![
                f.id.clone(),
                f.title.clone(),
                f.due_date
                    .map(|d| format_date(&d, settings.date_format))
                    .unwrap_or_else(|| "-".into()),
                fmt_amount(f.amount),
                fmt_amount(total_applied(f)),
                fmt_amount(remaining_balance(f)),
                derive_status(f, today).to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Fee Line", "Title", "Due", "Amount", "Applied", "Remaining", "Status"],
            data
        )
    );
    println!(
        "Outstanding: {}",
        fmt_amount(compute_outstanding(student, &payments))
    );
    Ok(())
}

fn update<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let key = arg_str(sub, "student")?;
    let status = opt_str(sub, "status")
        .map(|s| s.parse::<StudentStatus>())
        .transpose()?;
    if let Some(grade) = opt_str(sub, "grade") {
        warn_unknown_grade(store, &grade)?;
    }
    let updated = store.transact(|tx| -> Result<Student> {
        let mut students = tx.students()?;
        let idx = student_index(&students, &key)?;
        if let Some(code) = opt_str(sub, "student-id") {
            if students
                .iter()
                .enumerate()
                .any(|(i, s)| i != idx && s.student_id == code)
            {
                bail!("Student ID '{}' is already in use", code);
            }
            students[idx].student_id = code;
        }
        let s = &mut students[idx];
        if let Some(v) = opt_str(sub, "first-name") {
            s.first_name = v;
        }
        if let Some(v) = opt_str(sub, "last-name") {
            s.last_name = v;
        }
        if let Some(v) = opt_str(sub, "grade") {
            s.grade = v;
        }
        if let Some(v) = opt_str(sub, "phone") {
            s.contact_phone = Some(v);
        }
        if let Some(v) = opt_str(sub, "email") {
            s.contact_email = Some(v);
        }
        if let Some(v) = opt_str(sub, "guardian") {
            s.guardian_name = Some(v);
        }
        if let Some(v) = opt_str(sub, "notes") {
            s.notes = Some(v);
        }
        if let Some(st) = status {
            s.status = st;
        }
        let out = s.clone();
        tx.set_students(&students)?;
        Ok(out)
    })?;
    println!("Updated student {} ({})", updated.full_name(), updated.student_id);
    Ok(())
}

fn remove<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let key = arg_str(sub, "student")?;
    let force = flag(sub, "force");
    let removed = store.transact(|tx| -> Result<Student> {
        let mut students = tx.students()?;
        let idx = student_index(&students, &key)?;
        let referencing = tx
            .payments()?
            .iter()
            .filter(|p| p.student_id == students[idx].id)
            .count();
        if referencing > 0 && !force {
            bail!(
                "{} payment(s) reference student '{}'; pass --force to delete anyway",
                referencing,
                key
            );
        }
        let removed = students.remove(idx);
        tx.set_students(&students)?;
        Ok(removed)
    })?;
    println!("Removed student {} ({})", removed.full_name(), removed.student_id);
    Ok(())
}

fn add_fee<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let key = arg_str(sub, "student")?;
    let title = arg_str(sub, "title")?;
    let amount = parse_amount(&arg_str(sub, "amount")?)?;
    let due = opt_str(sub, "due")
        .map(|d| parse_date(&d).map(start_of_day))
        .transpose()?;
    let line = custom_fee_line(&title, amount, due, Utc::now())?;
    let line_id = line.id.clone();
    store.transact(|tx| -> Result<()> {
        let mut students = tx.students()?;
        let idx = student_index(&students, &key)?;
        students[idx].assigned_fees.push(line.clone());
        tx.set_students(&students)?;
        Ok(())
    })?;
    println!("Added fee line {} '{}' to {}", line_id, title, key);
    Ok(())
}

fn remove_fee<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let key = arg_str(sub, "student")?;
    let line_id = arg_str(sub, "fee-line")?;
    let force = flag(sub, "force");
    let removed = store.transact(|tx| -> Result<_> {
        let mut students = tx.students()?;
        let idx = student_index(&students, &key)?;
        let removed = remove_fee_line(&mut students[idx], &line_id, force)
            .with_context(|| format!("Cannot remove fee line from '{}'", key))?;
        tx.set_students(&students)?;
        Ok(removed)
    })?;
    if !removed.payments_applied.is_empty() {
        log::warn!(
            "{} payment allocation(s) now reference a removed fee line",
            removed.payments_applied.len()
        );
    }
    println!("Removed fee line '{}' from {}", removed.title, key);
    Ok(())
}
