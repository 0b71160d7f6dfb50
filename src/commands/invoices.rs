// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use super::student_index;
use crate::invoice::{
    InvoiceContext, assign_if_missing, backfill_invoice_numbers, invoice_file_name,
    next_invoice_number, peek_invoice_number, render_invoice_html,
};
use crate::models::StudentStatus;
use crate::store::{DocumentStore, EntityStore};
use crate::utils::{arg_str, flag, pretty_table, today};

pub fn handle<D: DocumentStore>(store: &EntityStore<D>, m: &clap::ArgMatches) -> Result<()> {
    let year = Utc::now().year();
    match m.subcommand() {
        Some(("next", sub)) => {
            if flag(sub, "issue") {
                println!("{}", next_invoice_number(store, year)?);
            } else {
                println!("{}", peek_invoice_number(&store.settings()?, year));
            }
        }
        Some(("assign", sub)) => {
            let key = arg_str(sub, "student")?;
            println!("{}", assign_if_missing(store, &key, year)?);
        }
        Some(("backfill", _)) => {
            let issued = backfill_invoice_numbers(store, year)?;
            if issued.is_empty() {
                println!("Every student already has an invoice number");
            } else {
                let rows = issued.into_iter().map(|(s, n)| vec![s, n]).collect();
                println!("{}", pretty_table(&["Student ID", "Invoice"], rows));
            }
        }
        Some(("generate", sub)) => generate(store, sub, year)?,
        _ => {}
    }
    Ok(())
}

fn generate<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches, year: i32) -> Result<()> {
    let keys: Vec<String> = if flag(sub, "all") {
        store
            .students()?
            .into_iter()
            .filter(|s| s.status == StudentStatus::Active)
            .map(|s| s.id)
            .collect()
    } else {
        sub.get_many::<String>("student")
            .map(|v| v.map(|s| s.trim().to_string()).collect())
            .unwrap_or_default()
    };
    let out_dir = PathBuf::from(arg_str(sub, "out-dir")?);
    let pause = sub
        .get_one::<u64>("pause-ms")
        .copied()
        .unwrap_or(1000);
    let written = generate_invoices(
        store,
        &keys,
        &out_dir,
        Duration::from_millis(pause),
        year,
        today(),
    )?;
    for path in &written {
        println!("{}", path.display());
    }
    println!("Wrote {} invoice(s) to {}", written.len(), out_dir.display());
    Ok(())
}

/// Writes one HTML invoice per student, numbering any that lack a number
/// first. Documents are produced one after another with `pause` between
/// them; a failure stops the run and leaves earlier files in place.
pub fn generate_invoices<D: DocumentStore>(
    store: &EntityStore<D>,
    student_keys: &[String],
    out_dir: &Path,
    pause: Duration,
    year: i32,
    today: NaiveDate,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Create {}", out_dir.display()))?;
    let mut written = Vec::with_capacity(student_keys.len());
    for (i, key) in student_keys.iter().enumerate() {
        if i > 0 && !pause.is_zero() {
            thread::sleep(pause);
        }
        let number = assign_if_missing(store, key, year)?;
        let students = store.students()?;
        let student = &students[student_index(&students, key)?];
        let payments = store.payments()?;
        let settings = store.settings()?;
        let html = render_invoice_html(&InvoiceContext {
            student,
            payments: &payments,
            settings: &settings,
            invoice_number: &number,
            invoice_date: Utc::now(),
            today,
        });
        let path = out_dir.join(invoice_file_name(student, &number));
        std::fs::write(&path, html).with_context(|| format!("Write {}", path.display()))?;
        log::info!("wrote invoice {} for {}", number, student.student_id);
        written.push(path);
    }
    Ok(written)
}
