// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use feeledger::store::{EntityStore, SqliteDocuments};
use feeledger::{cli, commands, db};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let path = db::resolve_path(matches.get_one::<String>("db").map(String::as_str))?;
    let store = EntityStore::new(SqliteDocuments::open(&path)?);
    store.ensure_metadata()?;

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", path.display());
        }
        Some(("student", sub)) => commands::students::handle(&store, sub)?,
        Some(("fee", sub)) => commands::fees::handle(&store, sub)?,
        Some(("pay", sub)) => commands::payments::handle(&store, sub)?,
        Some(("invoice", sub)) => commands::invoices::handle(&store, sub)?,
        Some(("report", sub)) => commands::reports::handle(&store, sub)?,
        Some(("export", sub)) => commands::exporter::handle(&store, sub)?,
        Some(("import", sub)) => commands::importer::handle(&store, sub)?,
        Some(("settings", sub)) => commands::settings::handle(&store, sub)?,
        Some(("doctor", sub)) => commands::doctor::handle(&store, sub)?,
        Some(("data", sub)) => commands::data::handle(&store, sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
