// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, bail};
use chrono::Utc;

use super::template_index;
use crate::ledger::{
    BulkAssignReport, BulkUnassignReport, TargetSelection, bulk_assign, bulk_unassign,
    validate_template,
};
use crate::models::{FeeTemplate, Frequency, Settings, new_id};
use crate::store::{DocumentStore, EntityStore};
use crate::utils::{
    arg_str, flag, fmt_amount, maybe_print_json, opt_str, parse_amount, pretty_table,
};

pub fn handle<D: DocumentStore>(store: &EntityStore<D>, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(store, sub)?,
        Some(("list", sub)) => list(store, sub)?,
        Some(("update", sub)) => update(store, sub)?,
        Some(("rm", sub)) => remove(store, sub)?,
        Some(("assign", sub)) => assign(store, sub)?,
        Some(("unassign", sub)) => unassign(store, sub)?,
        _ => {}
    }
    Ok(())
}

fn parse_due_day(raw: &str) -> Result<u32> {
    raw.trim()
        .parse::<u32>()
        .with_context(|| format!("Invalid due day '{}'", raw))
}

fn check_category(settings: &Settings, category: &str) {
    if !settings.fee_categories.iter().any(|c| c.eq_ignore_ascii_case(category)) {
        log::warn!("category '{}' is not one of the configured fee categories", category);
    }
}

fn add<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let template = FeeTemplate {
        id: new_id(),
        title: arg_str(sub, "title")?,
        category: arg_str(sub, "category")?,
        amount: parse_amount(&arg_str(sub, "amount")?)?,
        frequency: arg_str(sub, "frequency")?.parse::<Frequency>()?,
        due_day: opt_str(sub, "due-day")
            .map(|d| parse_due_day(&d))
            .transpose()?,
        notes: opt_str(sub, "notes"),
    };
    validate_template(&template)?;
    check_category(&store.settings()?, &template.category);
    store.add_fee_template(template.clone())?;
    println!(
        "Added fee template '{}' ({} {})",
        template.title,
        fmt_amount(template.amount),
        template.frequency.as_str()
    );
    Ok(())
}

fn list<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let templates = store.fee_templates()?;
    if maybe_print_json(flag(sub, "json"), flag(sub, "jsonl"), &templates)? {
        return Ok(());
    }
    let students = store.students()?;
    let data = templates
        .iter()
        .map(|t| {
            let assigned = students.iter().filter(|s| s.has_template(&t.id)).count();
            vec![
                t.title.clone(),
                t.category.clone(),
                fmt_amount(t.amount),
                t.frequency.as_str().to_string(),
                t.due_day.map(|d| d.to_string()).unwrap_or_default(),
                assigned.to_string(),
                t.id.clone(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Title", "Category", "Amount", "Frequency", "Due Day", "Assigned", "Id"],
            data
        )
    );
    Ok(())
}

/// Edits only the template. Lines already on students keep the title and
/// amount they were created with.
fn update<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let key = arg_str(sub, "template")?;
    let amount = opt_str(sub, "amount")
        .map(|a| parse_amount(&a))
        .transpose()?;
    let frequency = opt_str(sub, "frequency")
        .map(|f| f.parse::<Frequency>())
        .transpose()?;
    let due_day = opt_str(sub, "due-day")
        .map(|d| parse_due_day(&d))
        .transpose()?;
    let settings = store.settings()?;

    let updated = store.transact(|tx| -> Result<FeeTemplate> {
        let mut templates = tx.fee_templates()?;
        let idx = template_index(&templates, &key)?;
        let t = &mut templates[idx];
        if let Some(v) = opt_str(sub, "title") {
            t.title = v;
        }
        if let Some(v) = opt_str(sub, "category") {
            check_category(&settings, &v);
            t.category = v;
        }
        if let Some(v) = amount {
            t.amount = v;
        }
        if let Some(v) = frequency {
            t.frequency = v;
        }
        match due_day {
            Some(0) => t.due_day = None,
            Some(d) => t.due_day = Some(d),
            None => {}
        }
        if let Some(v) = opt_str(sub, "notes") {
            t.notes = Some(v);
        }
        validate_template(t)?;
        let out = t.clone();
        tx.set_fee_templates(&templates)?;
        Ok(out)
    })?;
    println!("Updated fee template '{}'", updated.title);
    Ok(())
}

fn remove<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let key = arg_str(sub, "template")?;
    let strip = flag(sub, "strip");
    let force = flag(sub, "force");
    let (template, report) = store.transact(|tx| -> Result<_> {
        let mut templates = tx.fee_templates()?;
        let idx = template_index(&templates, &key)?;
        let template = templates.remove(idx);
        let report = if strip {
            let mut students = tx.students()?;
            let report = bulk_unassign(&template, &mut students, force)?;
            if report.removed_lines > 0 {
                tx.set_students(&students)?;
            }
            Some(report)
        } else {
            None
        };
        tx.set_fee_templates(&templates)?;
        Ok((template, report))
    })?;
    println!("Removed fee template '{}'", template.title);
    if let Some(r) = report {
        print_unassign(&r);
    }
    Ok(())
}

fn assign<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let key = arg_str(sub, "template")?;
    let selection = match opt_str(sub, "grade") {
        Some(grade) => TargetSelection::Grade(grade),
        None => {
            let keys: Vec<String> = sub
                .get_many::<String>("student")
                .map(|v| v.map(|s| s.trim().to_string()).collect())
                .unwrap_or_default();
            if keys.is_empty() {
                bail!("Pass --grade or at least one --student");
            }
            TargetSelection::Students(keys)
        }
    };
    let reference = Utc::now();
    let (template, report) = store.transact(|tx| -> Result<(FeeTemplate, BulkAssignReport)> {
        let templates = tx.fee_templates()?;
        let template = templates[template_index(&templates, &key)?].clone();
        let mut students = tx.students()?;
        let report = bulk_assign(&template, &mut students, &selection, reference);
        if !report.newly_assigned.is_empty() {
            tx.set_students(&students)?;
        }
        Ok((template, report))
    })?;
    println!(
        "Assigned '{}' to {} student(s); {} already had it",
        template.title,
        report.newly_assigned.len(),
        report.already_assigned.len()
    );
    if !report.not_found.is_empty() {
        println!("Not found: {}", report.not_found.join(", "));
    }
    Ok(())
}

fn print_unassign(report: &BulkUnassignReport) {
    println!(
        "Removed {} fee line(s) from {} student(s)",
        report.removed_lines,
        report.affected_students.len()
    );
    if report.dangling_allocations > 0 {
        println!(
            "{} payment allocation(s) now point at removed lines (see `doctor`)",
            report.dangling_allocations
        );
    }
}

fn unassign<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let key = arg_str(sub, "template")?;
    let force = flag(sub, "force");
    let report = store.transact(|tx| -> Result<BulkUnassignReport> {
        let templates = tx.fee_templates()?;
        let template = &templates[template_index(&templates, &key)?];
        let mut students = tx.students()?;
        let report = bulk_unassign(template, &mut students, force)?;
        if report.removed_lines > 0 {
            tx.set_students(&students)?;
        }
        Ok(report)
    })?;
    print_unassign(&report);
    Ok(())
}
