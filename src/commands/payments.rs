// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;

use super::exporter::{describe_allocations, payments_in_range};
use super::student_index;
use crate::ledger::{AutoAllocation, PaymentRequest, apply_payment, auto_allocate};
use crate::models::{Allocation, Payment, Student};
use crate::store::{DocumentStore, EntityStore};
use crate::utils::{
    arg_str, flag, fmt_amount, format_date, maybe_print_json, opt_str, parse_date,
    parse_amount, parse_instant, pretty_table, start_of_day, today,
};

pub fn handle<D: DocumentStore>(store: &EntityStore<D>, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("record", sub)) => record(store, sub)?,
        Some(("list", sub)) => list(store, sub)?,
        Some(("preview", sub)) => preview(store, sub)?,
        _ => {}
    }
    Ok(())
}

/// Records a payment and its fee-line applications as one commit. With
/// `auto` set, the request's allocations are replaced by an overdue-first
/// spread computed against the student as stored at commit time.
pub fn record_payment<D: DocumentStore>(
    store: &EntityStore<D>,
    student_key: &str,
    request: PaymentRequest,
    auto: bool,
    today: NaiveDate,
) -> Result<(Payment, Student)> {
    let (payment, student) = store.transact(|tx| -> Result<(Payment, Student)> {
        let mut students = tx.students()?;
        let idx = student_index(&students, student_key)?;
        let mut request = request.clone();
        if auto {
            request.allocations =
                auto_allocate(&students[idx], request.amount, start_of_day(today)).allocations;
        }
        let (payment, updated) = apply_payment(&students[idx], request, today)
            .with_context(|| format!("Payment for '{}' rejected", student_key))?;
        students[idx] = updated.clone();
        let mut payments = tx.payments()?;
        payments.push(payment.clone());
        tx.set_students(&students)?;
        tx.set_payments(&payments)?;
        Ok((payment, updated))
    })?;
    log::info!(
        "recorded payment {} of {} for {}",
        payment.id,
        payment.amount,
        student.student_id
    );
    Ok((payment, student))
}

/// `FEE_LINE_ID=AMOUNT`.
fn parse_allocation(raw: &str) -> Result<Allocation> {
    let (id, amount) = raw
        .split_once('=')
        .with_context(|| format!("Invalid allocation '{}', expected FEE_LINE_ID=AMOUNT", raw))?;
    let id = id.trim();
    if id.is_empty() {
        bail!("Invalid allocation '{}': missing fee line id", raw);
    }
    Ok(Allocation {
        fee_line_id: id.to_string(),
        amount: parse_amount(amount)?,
    })
}

fn record<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let key = arg_str(sub, "student")?;
    let method = arg_str(sub, "method")?;
    let settings = store.settings()?;
    if !settings.payment_methods.iter().any(|m| m == &method) {
        log::warn!("payment method '{}' is not one of the configured methods", method);
    }
    let allocations = sub
        .get_many::<String>("alloc")
        .map(|v| v.map(|s| parse_allocation(s)).collect::<Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();
    let request = PaymentRequest {
        amount: parse_amount(&arg_str(sub, "amount")?)?,
        method,
        date: match opt_str(sub, "date") {
            Some(d) => parse_instant(&d)?,
            None => Utc::now(),
        },
        notes: opt_str(sub, "notes"),
        allocations,
    };
    let (payment, student) = record_payment(store, &key, request, flag(sub, "auto"), today())?;
    let unapplied = payment.amount - payment.allocated();
    println!(
        "Recorded {} for {} ({}): {}",
        fmt_amount(payment.amount),
        student.full_name(),
        student.student_id,
        describe_allocations(&payment, Some(&student), &settings.currency)
    );
    if unapplied > rust_decimal::Decimal::ZERO {
        println!("{} left as unapplied credit", fmt_amount(unapplied));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentRow<'a> {
    id: &'a str,
    date: String,
    student_id: String,
    student_name: String,
    amount: String,
    method: &'a str,
    applied_to: String,
    notes: &'a str,
}

fn list<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let students = store.students()?;
    let payments = store.payments()?;
    let settings = store.settings()?;
    let from = opt_str(sub, "from").map(|d| parse_date(&d)).transpose()?;
    let to = opt_str(sub, "to").map(|d| parse_date(&d)).transpose()?;
    let only = opt_str(sub, "student")
        .map(|k| student_index(&students, &k).map(|i| students[i].id.clone()))
        .transpose()?;

    let by_id: HashMap<&str, &Student> = students.iter().map(|s| (s.id.as_str(), s)).collect();
    let rows: Vec<PaymentRow> = payments_in_range(&payments, from, to)
        .into_iter()
        .filter(|p| only.as_ref().is_none_or(|id| &p.student_id == id))
        .map(|p| {
            let student = by_id.get(p.student_id.as_str()).copied();
            PaymentRow {
                id: &p.id,
                date: format_date(&p.date, settings.date_format),
                student_id: student.map_or_else(|| "Unknown".into(), |s| s.student_id.clone()),
                student_name: student
                    .map_or_else(|| "Unknown Student".into(), |s| s.full_name()),
                amount: fmt_amount(p.amount),
                method: &p.method,
                applied_to: describe_allocations(p, student, &settings.currency),
                notes: p.notes.as_deref().unwrap_or_default(),
            }
        })
        .collect();

    if !maybe_print_json(flag(sub, "json"), flag(sub, "jsonl"), &rows)? {
        let data = rows
            .iter()
            .map(|r| {
                vec![
                    r.date.clone(),
                    r.student_id.clone(),
                    r.student_name.clone(),
                    r.amount.clone(),
                    r.method.to_string(),
                    r.applied_to.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Date", "Student ID", "Student", "Amount", "Method", "Applied To"],
                data
            )
        );
    }
    Ok(())
}

fn preview<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let key = arg_str(sub, "student")?;
    let amount = parse_amount(&arg_str(sub, "amount")?)?;
    let students = store.students()?;
    let student = &students[student_index(&students, &key)?];
    let plan: AutoAllocation = auto_allocate(student, amount, start_of_day(today()));
    if maybe_print_json(flag(sub, "json"), flag(sub, "jsonl"), &plan)? {
        return Ok(());
    }
    let data = plan
        .allocations
        .iter()
        .map(|a| {
            let title = student
                .fee_line(&a.fee_line_id)
                .map(|f| f.title.clone())
                .unwrap_or_default();
            vec![a.fee_line_id.clone(), title, fmt_amount(a.amount)]
        })
        .collect();
    println!("{}", pretty_table(&["Fee Line", "Title", "Amount"], data));
    println!("Unapplied: {}", fmt_amount(plan.unapplied));
    Ok(())
}
