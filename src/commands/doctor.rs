// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::{IntegrityIssue, audit, refresh_all_statuses};
use crate::store::{DocumentStore, EntityStore};
use crate::utils::{flag, pretty_table, today};
use anyhow::Result;

pub fn handle<D: DocumentStore>(store: &EntityStore<D>, m: &clap::ArgMatches) -> Result<()> {
    let today = today();
    if flag(m, "fix") {
        let fixed = fix_statuses(store, today)?;
        println!("doctor: refreshed {} fee line status(es)", fixed);
    }

    let issues = audit(&store.students()?, &store.payments()?, today);
    if issues.is_empty() {
        println!("✅ doctor: no issues found");
    } else {
        let rows = issues
            .iter()
            .map(|i: &IntegrityIssue| vec![i.kind().to_string(), i.detail()])
            .collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

/// Rewrites stale cached statuses; nothing else is touched.
pub fn fix_statuses<D: DocumentStore>(store: &EntityStore<D>, today: chrono::NaiveDate) -> Result<usize> {
    store.transact(|tx| -> Result<usize> {
        let mut students = tx.students()?;
        let changed = refresh_all_statuses(&mut students, today);
        if changed > 0 {
            tx.set_students(&students)?;
        }
        Ok(changed)
    })
}
