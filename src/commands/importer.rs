// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};

use crate::store::{DocumentStore, EntityStore, ImportSummary};
use crate::utils::{arg_str, today};

pub fn handle<D: DocumentStore>(store: &EntityStore<D>, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("backup", sub)) => {
            let path = arg_str(sub, "path")?;
            let summary = import_backup(store, &path)?;
            println!(
                "Imported {} student(s), {} fee template(s), {} payment(s) from {}",
                summary.students, summary.fee_templates, summary.payments, path
            );
            if summary.statuses_refreshed > 0 {
                println!("Refreshed {} fee line status(es)", summary.statuses_refreshed);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Replaces every collection with the contents of a JSON backup file. A
/// rejected file leaves the existing data untouched.
pub fn import_backup<D: DocumentStore>(store: &EntityStore<D>, path: &str) -> Result<ImportSummary> {
    let json = std::fs::read_to_string(path).with_context(|| format!("Open backup {}", path))?;
    store
        .import_data(&json, today())
        .with_context(|| format!("Import {}", path))
}
