// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::error::{LedgerError, StoreError};
use crate::ledger::{derive_status, student_balance};
use crate::models::{Payment, Settings, Student};
use crate::store::{DocumentStore, EntityStore, Tx};
use crate::utils::{format_currency, format_date};

pub fn format_invoice_number(prefix: &str, year: i32, seq: u64) -> String {
    format!("{}-{}-{:04}", prefix, year, seq)
}

/// The number the next issue would hand out, without advancing anything.
pub fn peek_invoice_number(settings: &Settings, year: i32) -> String {
    format_invoice_number(&settings.invoice_prefix, year, settings.invoice_seq.max(1))
}

fn issue<D: DocumentStore>(tx: &mut Tx<'_, D>, year: i32) -> Result<String, StoreError> {
    let mut settings = tx.settings()?;
    let seq = settings.invoice_seq.max(1);
    settings.invoice_seq = seq + 1;
    tx.set_settings(&settings)?;
    Ok(format_invoice_number(&settings.invoice_prefix, year, seq))
}

/// Issues the next number and persists the advanced counter. Concurrent
/// issuers conflict on the settings revision and retry, so a number is
/// never handed out twice. Numbers issued and then abandoned stay skipped.
pub fn next_invoice_number<D: DocumentStore>(
    store: &EntityStore<D>,
    year: i32,
) -> Result<String, StoreError> {
    let number = store.transact(|tx| issue(tx, year))?;
    log::info!("issued invoice number {}", number);
    Ok(number)
}

/// Returns the student's invoice number, issuing and recording one in the
/// same commit when it is missing.
pub fn assign_if_missing<D: DocumentStore>(
    store: &EntityStore<D>,
    student_key: &str,
    year: i32,
) -> Result<String> {
    store.transact(|tx| -> Result<String> {
        let mut students = tx.students()?;
        let student = students
            .iter_mut()
            .find(|s| s.matches_key(student_key))
            .ok_or_else(|| LedgerError::StudentNotFound(student_key.to_string()))?;
        if let Some(existing) = &student.invoice_number {
            return Ok(existing.clone());
        }
        let number = issue(tx, year)?;
        student.invoice_number = Some(number.clone());
        tx.set_students(&students)?;
        Ok(number)
    })
}

/// One-shot pass numbering every student that lacks an invoice number, in
/// roster order. Returns `(studentId, invoiceNumber)` for each new number.
pub fn backfill_invoice_numbers<D: DocumentStore>(
    store: &EntityStore<D>,
    year: i32,
) -> Result<Vec<(String, String)>, StoreError> {
    store.transact(|tx| -> Result<_, StoreError> {
        let mut students = tx.students()?;
        let mut settings = tx.settings()?;
        let mut issued = Vec::new();
        for student in students.iter_mut().filter(|s| s.invoice_number.is_none()) {
            let seq = settings.invoice_seq.max(1);
            settings.invoice_seq = seq + 1;
            let number = format_invoice_number(&settings.invoice_prefix, year, seq);
            student.invoice_number = Some(number.clone());
            issued.push((student.student_id.clone(), number));
        }
        if !issued.is_empty() {
            tx.set_settings(&settings)?;
            tx.set_students(&students)?;
        }
        Ok(issued)
    })
}

pub struct InvoiceContext<'a> {
    pub student: &'a Student,
    pub payments: &'a [Payment],
    pub settings: &'a Settings,
    pub invoice_number: &'a str,
    pub invoice_date: DateTime<Utc>,
    pub today: NaiveDate,
}

pub fn invoice_file_name(student: &Student, invoice_number: &str) -> String {
    let safe: String = student
        .student_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("invoice-{}-{}.html", safe, invoice_number)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn long_date(dt: &DateTime<Utc>) -> String {
    dt.format("%B %-d, %Y").to_string()
}

const INVOICE_CSS: &str = r#"
    body { font-family: Arial, sans-serif; max-width: 800px; margin: 0 auto; padding: 20px; line-height: 1.6; color: #333; }
    .header { display: flex; justify-content: space-between; border-bottom: 2px solid #eee; padding-bottom: 20px; margin-bottom: 40px; }
    .header h1 { margin: 0; color: #2563eb; }
    .header h2 { margin: 0; color: #dc2626; text-align: right; }
    .details { display: grid; grid-template-columns: 1fr 1fr; gap: 40px; margin-bottom: 40px; }
    .details div { background: #f8fafc; padding: 20px; border-radius: 8px; }
    table { width: 100%; border-collapse: collapse; margin-bottom: 30px; }
    th, td { padding: 12px; text-align: left; border-bottom: 1px solid #e2e8f0; }
    th { background: #f1f5f9; }
    .summary { background: #f8fafc; padding: 20px; border-left: 4px solid #2563eb; }
    .total { font-weight: bold; font-size: 18px; }
    .outstanding { color: #dc2626; }
    .paid { color: #059669; }
    .footer { margin-top: 40px; text-align: center; color: #666; font-size: 14px; }
"#;

/// Standalone printable HTML invoice. Presentation only: every figure comes
/// from the ledger functions.
pub fn render_invoice_html(ctx: &InvoiceContext<'_>) -> String {
    let s = ctx.student;
    let ccy = ctx.settings.currency.as_str();
    let money = |d: Decimal| format_currency(d, ccy);
    let balance = student_balance(s, ctx.payments);

    let mut fee_rows = String::new();
    for line in &s.assigned_fees {
        let due = line
            .due_date
            .map(|d| format_date(&d, ctx.settings.date_format))
            .unwrap_or_else(|| "-".to_string());
        fee_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape_html(&line.title),
            due,
            derive_status(line, ctx.today),
            money(line.amount)
        ));
    }

    let mut payment_rows = String::new();
    let mut student_payments: Vec<&Payment> =
        ctx.payments.iter().filter(|p| p.student_id == s.id).collect();
    student_payments.sort_by_key(|p| p.date);
    for p in student_payments {
        payment_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            format_date(&p.date, ctx.settings.date_format),
            escape_html(&p.method),
            money(p.amount)
        ));
    }
    let payments_block = if payment_rows.is_empty() {
        String::new()
    } else {
        format!(
            "<h3>Payment History</h3>\n<table>\n<tr><th>Date</th><th>Method</th><th>Amount</th></tr>\n{}</table>\n",
            payment_rows
        )
    };

    let credit_row = if balance.total_paid > balance.total_fees {
        format!(
            "<p class=\"paid\">Credit: {}</p>\n",
            money(balance.total_paid - balance.total_fees)
        )
    } else {
        String::new()
    };

    let contact: Vec<String> = [&s.guardian_name, &s.contact_email, &s.contact_phone]
        .iter()
        .filter_map(|v| v.as_deref())
        .map(|v| format!("<p>{}</p>", escape_html(v)))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>Invoice {number}</title>
<style>{css}</style>
</head>
<body>
<div class="header">
<div><h1>{school}</h1>{year}</div>
<div><h2>INVOICE</h2><p>{number}</p><p>{date}</p></div>
</div>
<div class="details">
<div><h3>Bill To</h3><p><strong>{name}</strong></p><p>Student ID: {code}</p><p>Grade: {grade}</p>{contact}</div>
<div><h3>Invoice Details</h3><p>Invoice #: {number}</p><p>Date: {date}</p><p>Currency: {ccy}</p></div>
</div>
<h3>Fees</h3>
<table>
<tr><th>Description</th><th>Due Date</th><th>Status</th><th>Amount</th></tr>
{fee_rows}</table>
{payments_block}<div class="summary">
<p>Total Fees: {total_fees}</p>
<p class="paid">Total Paid: {total_paid}</p>
{credit_row}<p class="total outstanding">Outstanding Balance: {outstanding}</p>
</div>
<div class="footer"><p>Thank you for your prompt payment.</p></div>
</body>
</html>
"#,
        number = escape_html(ctx.invoice_number),
        css = INVOICE_CSS,
        school = escape_html(&ctx.settings.school_name),
        year = ctx
            .settings
            .academic_year
            .as_deref()
            .map(|y| format!("<p>Academic Year {}</p>", escape_html(y)))
            .unwrap_or_default(),
        date = long_date(&ctx.invoice_date),
        name = escape_html(&s.full_name()),
        code = escape_html(&s.student_id),
        grade = escape_html(&s.grade),
        contact = contact.join(""),
        ccy = escape_html(ccy),
        fee_rows = fee_rows,
        payments_block = payments_block,
        total_fees = money(balance.total_fees),
        total_paid = money(balance.total_paid),
        credit_row = credit_row,
        outstanding = money(balance.outstanding),
    )
}
