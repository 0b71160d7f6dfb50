// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::ledger::{compute_outstanding, is_line_overdue, total_fees, total_paid};
use crate::models::{Payment, Student, StudentStatus};
use crate::store::{DocumentStore, EntityStore};
use crate::utils::{
    flag, fmt_amount, format_currency, format_currency_compact, maybe_print_json, pretty_table,
    start_of_day, today,
};

pub fn handle<D: DocumentStore>(store: &EntityStore<D>, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("dashboard", sub)) => dashboard(store, sub)?,
        Some(("outstanding", sub)) => outstanding(store, sub)?,
        Some(("by-grade", sub)) => by_grade(store, sub)?,
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_students: usize,
    pub active_students: usize,
    pub total_fees: Decimal,
    pub total_collected: Decimal,
    pub total_outstanding: Decimal,
    /// Students with at least one past-due line still owing.
    pub overdue_students: usize,
    /// Collected over fees, in percent (one decimal place).
    pub collection_rate: Decimal,
    pub this_month_collected: Decimal,
    pub last_month_collected: Decimal,
    pub monthly_growth: Decimal,
    pub average_fee_per_student: Decimal,
    pub average_payment: Decimal,
}

fn percent(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    (part / whole * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

fn collected_in(payments: &[Payment], year: i32, month: u32) -> Decimal {
    payments
        .iter()
        .filter(|p| p.date.year() == year && p.date.month() == month)
        .map(|p| p.amount)
        .sum()
}

pub fn dashboard_summary(students: &[Student], payments: &[Payment], today: NaiveDate) -> DashboardSummary {
    let now = start_of_day(today);
    let total_fees_all: Decimal = students.iter().map(total_fees).sum();
    let total_collected: Decimal = payments.iter().map(|p| p.amount).sum();
    let this_month = collected_in(payments, today.year(), today.month());
    let (ly, lm) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    let last_month = collected_in(payments, ly, lm);
    let growth = if last_month.is_zero() {
        Decimal::ZERO
    } else {
        percent(this_month - last_month, last_month)
    };
    let average = |sum: Decimal, n: usize| {
        if n == 0 {
            Decimal::ZERO
        } else {
            (sum / Decimal::from(n)).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        }
    };

    DashboardSummary {
        total_students: students.len(),
        active_students: students
            .iter()
            .filter(|s| s.status == StudentStatus::Active)
            .count(),
        total_fees: total_fees_all,
        total_collected,
        total_outstanding: students
            .iter()
            .map(|s| compute_outstanding(s, payments))
            .sum(),
        overdue_students: students
            .iter()
            .filter(|s| s.assigned_fees.iter().any(|f| is_line_overdue(f, now)))
            .count(),
        collection_rate: percent(total_collected, total_fees_all),
        this_month_collected: this_month,
        last_month_collected: last_month,
        monthly_growth: growth,
        average_fee_per_student: average(total_fees_all, students.len()),
        average_payment: average(total_collected, payments.len()),
    }
}

fn dashboard<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let summary = dashboard_summary(&store.students()?, &store.payments()?, today());
    if maybe_print_json(flag(sub, "json"), flag(sub, "jsonl"), &summary)? {
        return Ok(());
    }
    let ccy = store.settings()?.currency;
    let money = |d: Decimal| format_currency_compact(d, &ccy);
    let rows = vec![
        vec![
            "Students".into(),
            format!("{} ({} active)", summary.total_students, summary.active_students),
        ],
        vec!["Total fees".into(), money(summary.total_fees)],
        vec![
            "Collected".into(),
            format!("{} ({}%)", money(summary.total_collected), summary.collection_rate),
        ],
        vec!["Outstanding".into(), money(summary.total_outstanding)],
        vec!["Students overdue".into(), summary.overdue_students.to_string()],
        vec![
            "This month".into(),
            format!("{} ({}% vs last month)", money(summary.this_month_collected), summary.monthly_growth),
        ],
        vec!["Avg fee / student".into(), money(summary.average_fee_per_student)],
        vec!["Avg payment".into(), money(summary.average_payment)],
    ];
    println!("{}", pretty_table(&["Metric", "Value"], rows));
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutstandingRow {
    student_id: String,
    name: String,
    grade: String,
    outstanding: Decimal,
}

fn outstanding<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let students = store.students()?;
    let payments = store.payments()?;
    let mut rows: Vec<OutstandingRow> = students
        .iter()
        .map(|s| OutstandingRow {
            student_id: s.student_id.clone(),
            name: s.full_name(),
            grade: s.grade.clone(),
            outstanding: compute_outstanding(s, &payments),
        })
        .filter(|r| r.outstanding > Decimal::ZERO)
        .collect();
    rows.sort_by(|a, b| b.outstanding.cmp(&a.outstanding));
    if maybe_print_json(flag(sub, "json"), flag(sub, "jsonl"), &rows)? {
        return Ok(());
    }
    let ccy = store.settings()?.currency;
    let data = rows
        .into_iter()
        .map(|r| vec![r.student_id, r.name, r.grade, format_currency(r.outstanding, &ccy)])
        .collect();
    println!(
        "{}",
        pretty_table(&["Student ID", "Name", "Grade", "Outstanding"], data)
    );
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeSummary {
    pub grade: String,
    pub students: usize,
    pub total_fees: Decimal,
    pub collected: Decimal,
    pub outstanding: Decimal,
}

/// Per-grade totals, grades in sorted order.
pub fn grade_summaries(students: &[Student], payments: &[Payment]) -> Vec<GradeSummary> {
    let mut by_grade: BTreeMap<&str, GradeSummary> = BTreeMap::new();
    for s in students {
        let entry = by_grade.entry(s.grade.as_str()).or_insert_with(|| GradeSummary {
            grade: s.grade.clone(),
            ..Default::default()
        });
        entry.students += 1;
        entry.total_fees += total_fees(s);
        entry.collected += total_paid(s, payments);
        entry.outstanding += compute_outstanding(s, payments);
    }
    by_grade.into_values().collect()
}

fn by_grade<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let rows = grade_summaries(&store.students()?, &store.payments()?);
    if maybe_print_json(flag(sub, "json"), flag(sub, "jsonl"), &rows)? {
        return Ok(());
    }
    let data = rows
        .into_iter()
        .map(|g| {
            vec![
                g.grade,
                g.students.to_string(),
                fmt_amount(g.total_fees),
                fmt_amount(g.collected),
                fmt_amount(g.outstanding),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Grade", "Students", "Fees", "Collected", "Outstanding"], data)
    );
    Ok(())
}
