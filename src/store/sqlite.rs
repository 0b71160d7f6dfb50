// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use std::path::Path;

use super::{Document, DocumentStore, Op};
use crate::db;
use crate::error::StoreError;

/// Documents kept in the `documents` table of a SQLite file. Batches run in
/// an IMMEDIATE transaction so the revision check and the write cannot be
/// split by another process.
pub struct SqliteDocuments {
    conn: Connection,
}

impl SqliteDocuments {
    pub fn new(conn: Connection) -> Self {
        SqliteDocuments { conn }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(db::open_or_init(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(db::open_in_memory()?))
    }
}

fn current_revision(tx: &Transaction<'_>, key: &str) -> Result<u64, StoreError> {
    let rev: Option<i64> = tx
        .query_row(
            "SELECT revision FROM documents WHERE key=?1",
            params![key],
            |r| r.get(0),
        )
        .optional()?;
    Ok(rev.unwrap_or(0) as u64)
}

fn next_revision(tx: &Transaction<'_>) -> Result<u64, StoreError> {
    let next: i64 = tx.query_row(
        "UPDATE revision_seq SET value = value + 1 WHERE id = 1 RETURNING value",
        [],
        |r| r.get(0),
    )?;
    Ok(next as u64)
}

impl DocumentStore for SqliteDocuments {
    fn read(&self, key: &str) -> Result<Option<Document>, StoreError> {
        let doc = self
            .conn
            .query_row(
                "SELECT value, revision FROM documents WHERE key=?1",
                params![key],
                |r| {
                    Ok(Document {
                        body: r.get(0)?,
                        revision: r.get::<_, i64>(1)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(doc)
    }

    fn apply(&self, ops: &[Op]) -> Result<(), StoreError> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        for op in ops {
            if let Some(expected) = op.expected() {
                let found = current_revision(&tx, op.key())?;
                if found != expected {
                    // dropping `tx` rolls back
                    return Err(StoreError::Conflict {
                        key: op.key().to_string(),
                        expected,
                        found,
                    });
                }
            }
        }
        for op in ops {
            match op {
                Op::Put { key, body, .. } => {
                    let revision = next_revision(&tx)?;
                    tx.execute(
                        "INSERT INTO documents(key, value, revision, updated_at)
                         VALUES (?1, ?2, ?3, datetime('now'))
                         ON CONFLICT(key) DO UPDATE SET
                            value=excluded.value,
                            revision=excluded.revision,
                            updated_at=excluded.updated_at",
                        params![key, body, revision as i64],
                    )?;
                }
                Op::Delete { key, .. } => {
                    tx.execute("DELETE FROM documents WHERE key=?1", params![key])?;
                }
                Op::Check { .. } => {}
            }
        }
        tx.commit()?;
        Ok(())
    }
}
