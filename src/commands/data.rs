// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, bail};

use crate::store::{DocumentStore, EntityStore};
use crate::utils::flag;

pub fn handle<D: DocumentStore>(store: &EntityStore<D>, m: &clap::ArgMatches) -> Result<()> {
    if let Some(("clear", sub)) = m.subcommand() {
        if !flag(sub, "yes") {
            bail!("Refusing to erase data without --yes");
        }
        store.clear_all_data()?;
        log::warn!("all ledger data erased");
        println!("All data cleared");
    }
    Ok(())
}
