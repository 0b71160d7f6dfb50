// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow, bail};

use crate::models::{DateFormat, Settings};
use crate::store::{DocumentStore, EntityStore};
use crate::utils::{arg_str, flag, maybe_print_json, pretty_table};

pub fn handle<D: DocumentStore>(store: &EntityStore<D>, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("show", sub)) => show(store, sub)?,
        Some(("set", sub)) => {
            let key = arg_str(sub, "key")?;
            let value = arg_str(sub, "value")?;
            store.transact(|tx| -> Result<()> {
                let mut settings = tx.settings()?;
                apply_setting(&mut settings, &key, &value)?;
                tx.set_settings(&settings)?;
                Ok(())
            })?;
            println!("Set {} = {}", key, value);
        }
        Some(("add-option", sub)) => {
            let list = arg_str(sub, "list")?;
            let value = arg_str(sub, "value")?;
            let added = edit_option_list(store, &list, |opts| {
                if opts.iter().any(|o| o == &value) {
                    return false;
                }
                opts.push(value.clone());
                true
            })?;
            if added {
                println!("Added '{}' to {}", value, list);
            } else {
                println!("'{}' is already in {}", value, list);
            }
        }
        Some(("remove-option", sub)) => {
            let list = arg_str(sub, "list")?;
            let value = arg_str(sub, "value")?;
            let removed = edit_option_list(store, &list, |opts| {
                let before = opts.len();
                opts.retain(|o| o != &value);
                opts.len() != before
            })?;
            if removed {
                println!("Removed '{}' from {}", value, list);
            } else {
                println!("'{}' is not in {}", value, list);
            }
        }
        _ => {}
    }
    Ok(())
}

fn show<D: DocumentStore>(store: &EntityStore<D>, sub: &clap::ArgMatches) -> Result<()> {
    let s = store.settings()?;
    if maybe_print_json(flag(sub, "json"), flag(sub, "jsonl"), &s)? {
        return Ok(());
    }
    let rows = vec![
        vec!["school-name".into(), s.school_name.clone()],
        vec!["currency".into(), s.currency.clone()],
        vec![
            "academic-year".into(),
            s.academic_year.clone().unwrap_or_default(),
        ],
        vec!["invoice-prefix".into(), s.invoice_prefix.clone()],
        vec!["invoice-seq".into(), s.invoice_seq.to_string()],
        vec!["date-format".into(), s.date_format.as_str().to_string()],
        vec![
            "logo".into(),
            if s.school_logo_data_url.is_some() { "set" } else { "-" }.to_string(),
        ],
        vec!["payment-methods".into(), s.payment_methods.join(", ")],
        vec!["fee-categories".into(), s.fee_categories.join(", ")],
        vec!["grades".into(), s.grade_options.join(", ")],
    ];
    println!("{}", pretty_table(&["Setting", "Value"], rows));
    Ok(())
}

/// Applies one `settings set` key. Blank values are rejected except for
/// the optional fields, where `none` clears them.
pub fn apply_setting(settings: &mut Settings, key: &str, value: &str) -> Result<()> {
    let value = value.trim();
    let clears = value.is_empty() || value.eq_ignore_ascii_case("none");
    match key {
        "school-name" if !value.is_empty() => settings.school_name = value.to_string(),
        "currency" if !value.is_empty() => settings.currency = value.to_uppercase(),
        "invoice-prefix" if !value.is_empty() => settings.invoice_prefix = value.to_string(),
        "academic-year" => {
            settings.academic_year = (!clears).then(|| value.to_string());
        }
        "logo" => {
            settings.school_logo_data_url = (!clears).then(|| value.to_string());
        }
        "invoice-seq" => {
            let seq: u64 = value
                .parse()
                .with_context(|| format!("Invalid invoice sequence '{}'", value))?;
            if seq == 0 {
                bail!("Invoice sequence starts at 1");
            }
            settings.invoice_seq = seq;
        }
        "date-format" => {
            settings.date_format = DateFormat::try_from(value.to_string()).map_err(|e| anyhow!(e))?;
        }
        "school-name" | "currency" | "invoice-prefix" => bail!("{} must not be blank", key),
        other => bail!(
            "Unknown setting '{}' (use school-name|currency|academic-year|invoice-prefix|invoice-seq|date-format|logo)",
            other
        ),
    }
    Ok(())
}

fn edit_option_list<D: DocumentStore>(
    store: &EntityStore<D>,
    list: &str,
    mut edit: impl FnMut(&mut Vec<String>) -> bool,
) -> Result<bool> {
    store.transact(|tx| -> Result<bool> {
        let mut settings = tx.settings()?;
        let opts = match list {
            "payment-methods" => &mut settings.payment_methods,
            "fee-categories" => &mut settings.fee_categories,
            "grades" => &mut settings.grade_options,
            other => bail!(
                "Unknown option list '{}' (use payment-methods|fee-categories|grades)",
                other
            ),
        };
        let changed = edit(opts);
        if changed {
            tx.set_settings(&settings)?;
        }
        Ok(changed)
    })
}
