// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Durable entity storage.
//!
//! Every collection is one JSON document under a `tfm:v0:` key. Documents
//! carry a revision drawn from one store-wide counter, so a key that is
//! deleted and re-created never repeats an old revision. A [`Tx`] remembers
//! the revision of everything it read and commits its writes as a single
//! batch conditioned on all of them, including keys it only read; two
//! writers interleaving a read-modify-write see a conflict and retry instead
//! of silently overwriting each other.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryDocuments;
pub use sqlite::SqliteDocuments;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::ledger;
use crate::models::{AppMetadata, BackupDocument, FeeTemplate, Payment, Settings, Student};

pub const STORAGE_PREFIX: &str = "tfm:v0:";
const MAX_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Students,
    FeeTemplates,
    Payments,
    Settings,
    Metadata,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Students,
        Collection::FeeTemplates,
        Collection::Payments,
        Collection::Settings,
        Collection::Metadata,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Students => "students",
            Collection::FeeTemplates => "feeTemplates",
            Collection::Payments => "payments",
            Collection::Settings => "settings",
            Collection::Metadata => "metadata",
        }
    }

    pub fn key(&self) -> String {
        format!("{}{}", STORAGE_PREFIX, self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub body: String,
    pub revision: u64,
}

/// One step of an atomic batch. An `expected` revision of `0` means the key
/// must not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Put {
        key: String,
        body: String,
        expected: Option<u64>,
    },
    Delete {
        key: String,
        expected: Option<u64>,
    },
    /// Writes nothing; fails the batch if `key` moved since it was read.
    Check { key: String, expected: u64 },
}

impl Op {
    pub fn key(&self) -> &str {
        match self {
            Op::Put { key, .. } | Op::Delete { key, .. } | Op::Check { key, .. } => key,
        }
    }

    pub fn expected(&self) -> Option<u64> {
        match self {
            Op::Put { expected, .. } | Op::Delete { expected, .. } => *expected,
            Op::Check { expected, .. } => Some(*expected),
        }
    }
}

/// Persistence port. Implementations must apply a batch all-or-nothing and
/// reject it with [`StoreError::Conflict`] when any expected revision is stale.
pub trait DocumentStore {
    fn read(&self, key: &str) -> Result<Option<Document>, StoreError>;
    fn apply(&self, ops: &[Op]) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub key: String,
}

pub type SubscriptionId = u64;
type Observer = Box<dyn Fn(&ChangeEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub students: usize,
    pub fee_templates: usize,
    pub payments: usize,
    pub statuses_refreshed: usize,
}

pub struct EntityStore<D> {
    docs: D,
    observers: RefCell<Vec<(SubscriptionId, Observer)>>,
    next_subscription: Cell<SubscriptionId>,
}

impl<D: DocumentStore> EntityStore<D> {
    pub fn new(docs: D) -> Self {
        EntityStore {
            docs,
            observers: RefCell::new(Vec::new()),
            next_subscription: Cell::new(1),
        }
    }

    /// Registers a callback fired once per changed key after every commit.
    /// Callbacks must not subscribe or unsubscribe re-entrantly.
    pub fn subscribe(&self, callback: impl Fn(&ChangeEvent) + 'static) -> SubscriptionId {
        let id = self.next_subscription.get();
        self.next_subscription.set(id + 1);
        self.observers.borrow_mut().push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        observers.len() != before
    }

    fn notify(&self, changed: &[Collection]) {
        let observers = self.observers.borrow();
        for c in changed {
            let event = ChangeEvent {
                collection: *c,
                key: c.key(),
            };
            for (_, cb) in observers.iter() {
                cb(&event);
            }
        }
    }

    /// Runs `f` against a fresh transaction and commits its writes atomically.
    /// On a revision conflict the closure is re-run against fresh data.
    pub fn transact<R, E, F>(&self, mut f: F) -> Result<R, E>
    where
        F: FnMut(&mut Tx<'_, D>) -> Result<R, E>,
        E: From<StoreError>,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let mut tx = Tx {
                store: self,
                seen: BTreeMap::new(),
                writes: BTreeMap::new(),
            };
            let out = f(&mut tx)?;
            let (ops, changed) = tx.into_ops();
            if ops.is_empty() {
                return Ok(out);
            }
            match self.docs.apply(&ops) {
                Ok(()) => {
                    log::info!(
                        "committed {}",
                        changed.iter().map(|c| c.name()).collect::<Vec<_>>().join(", ")
                    );
                    self.notify(&changed);
                    return Ok(out);
                }
                Err(e) if e.is_conflict() => {
                    log::warn!("{} (attempt {}/{}), retrying", e, attempt, MAX_ATTEMPTS);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::RetriesExhausted(MAX_ATTEMPTS).into())
    }

    pub fn students(&self) -> Result<Vec<Student>, StoreError> {
        self.transact(|tx| tx.students())
    }

    pub fn set_students(&self, students: &[Student]) -> Result<(), StoreError> {
        self.transact(|tx| tx.set_students(students))
    }

    pub fn add_student(&self, student: Student) -> Result<(), StoreError> {
        self.transact(|tx| -> Result<_, StoreError> {
            let mut students = tx.students()?;
            students.push(student.clone());
            tx.set_students(&students)
        })
    }

    /// Whole-record overwrite keyed by `student.id`. Returns false when no
    /// record with that id exists.
    pub fn update_student(&self, student: &Student) -> Result<bool, StoreError> {
        self.transact(|tx| -> Result<_, StoreError> {
            let mut students = tx.students()?;
            match students.iter_mut().find(|s| s.id == student.id) {
                Some(slot) => {
                    *slot = student.clone();
                    tx.set_students(&students)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    pub fn delete_student(&self, id: &str) -> Result<bool, StoreError> {
        self.transact(|tx| -> Result<_, StoreError> {
            let mut students = tx.students()?;
            let before = students.len();
            students.retain(|s| s.id != id);
            if students.len() == before {
                return Ok(false);
            }
            tx.set_students(&students)?;
            Ok(true)
        })
    }

    pub fn fee_templates(&self) -> Result<Vec<FeeTemplate>, StoreError> {
        self.transact(|tx| tx.fee_templates())
    }

    pub fn set_fee_templates(&self, templates: &[FeeTemplate]) -> Result<(), StoreError> {
        self.transact(|tx| tx.set_fee_templates(templates))
    }

    pub fn add_fee_template(&self, template: FeeTemplate) -> Result<(), StoreError> {
        self.transact(|tx| -> Result<_, StoreError> {
            let mut templates = tx.fee_templates()?;
            templates.push(template.clone());
            tx.set_fee_templates(&templates)
        })
    }

    pub fn update_fee_template(&self, template: &FeeTemplate) -> Result<bool, StoreError> {
        self.transact(|tx| -> Result<_, StoreError> {
            let mut templates = tx.fee_templates()?;
            match templates.iter_mut().find(|t| t.id == template.id) {
                Some(slot) => {
                    *slot = template.clone();
                    tx.set_fee_templates(&templates)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    pub fn delete_fee_template(&self, id: &str) -> Result<bool, StoreError> {
        self.transact(|tx| -> Result<_, StoreError> {
            let mut templates = tx.fee_templates()?;
            let before = templates.len();
            templates.retain(|t| t.id != id);
            if templates.len() == before {
                return Ok(false);
            }
            tx.set_fee_templates(&templates)?;
            Ok(true)
        })
    }

    pub fn payments(&self) -> Result<Vec<Payment>, StoreError> {
        self.transact(|tx| tx.payments())
    }

    pub fn set_payments(&self, payments: &[Payment]) -> Result<(), StoreError> {
        self.transact(|tx| tx.set_payments(payments))
    }

    pub fn add_payment(&self, payment: Payment) -> Result<(), StoreError> {
        self.transact(|tx| -> Result<_, StoreError> {
            let mut payments = tx.payments()?;
            payments.push(payment.clone());
            tx.set_payments(&payments)
        })
    }

    pub fn settings(&self) -> Result<Settings, StoreError> {
        self.transact(|tx| tx.settings())
    }

    pub fn set_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.transact(|tx| tx.set_settings(settings))
    }

    pub fn metadata(&self) -> Result<AppMetadata, StoreError> {
        self.transact(|tx| tx.metadata())
    }

    pub fn set_metadata(&self, metadata: &AppMetadata) -> Result<(), StoreError> {
        self.transact(|tx| tx.set_metadata(metadata))
    }

    /// Writes the metadata record on first open; a no-op afterwards.
    pub fn ensure_metadata(&self) -> Result<AppMetadata, StoreError> {
        self.transact(|tx| -> Result<_, StoreError> {
            if let Some(existing) = tx.load::<AppMetadata>(Collection::Metadata)? {
                return Ok(existing);
            }
            let fresh = AppMetadata::default();
            tx.set_metadata(&fresh)?;
            Ok(fresh)
        })
    }

    /// Serializes every collection plus metadata into one pretty JSON bundle
    /// and stamps `metadata.lastBackup`.
    pub fn export_data(&self) -> Result<String, StoreError> {
        self.transact(|tx| -> Result<_, StoreError> {
            let now = Utc::now();
            let mut metadata = tx.metadata()?;
            metadata.last_backup = Some(now);
            tx.set_metadata(&metadata)?;
            let bundle = BackupDocument {
                students: tx.students()?,
                fee_templates: tx.fee_templates()?,
                payments: tx.payments()?,
                settings: tx.settings()?,
                metadata,
                exported_at: now,
            };
            serde_json::to_string_pretty(&bundle).map_err(|source| StoreError::Serialize {
                key: "backup".to_string(),
                source,
            })
        })
    }

    /// Replaces all state from a backup bundle. A malformed document or a
    /// missing `students` array rejects the whole import; other sections
    /// fall back to empty (templates, payments) or current values (settings,
    /// metadata). Cached fee-line statuses are re-derived against `today`.
    pub fn import_data(&self, json: &str, today: NaiveDate) -> Result<ImportSummary, StoreError> {
        let mut root: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| StoreError::InvalidBackup(format!("not valid JSON: {}", e)))?;
        let section = |root: &mut serde_json::Value, name: &str| -> Option<serde_json::Value> {
            root.get_mut(name)
                .map(serde_json::Value::take)
                .filter(|v| !v.is_null())
        };

        let students_raw = section(&mut root, "students")
            .filter(|v| v.is_array())
            .ok_or_else(|| StoreError::InvalidBackup("missing students array".to_string()))?;
        let mut students: Vec<Student> = parse_section("students", students_raw)?;
        let templates: Vec<FeeTemplate> = section(&mut root, "feeTemplates")
            .map(|v| parse_section("feeTemplates", v))
            .transpose()?
            .unwrap_or_default();
        let payments: Vec<Payment> = section(&mut root, "payments")
            .map(|v| parse_section("payments", v))
            .transpose()?
            .unwrap_or_default();
        let settings: Option<Settings> = section(&mut root, "settings")
            .map(|v| parse_section("settings", v))
            .transpose()?;
        let metadata: Option<AppMetadata> = section(&mut root, "metadata")
            .map(|v| parse_section("metadata", v))
            .transpose()?;

        let statuses_refreshed = ledger::refresh_all_statuses(&mut students, today);

        self.transact(|tx| -> Result<_, StoreError> {
            let settings = match &settings {
                Some(s) => s.clone(),
                None => tx.settings()?,
            };
            let metadata = match &metadata {
                Some(m) => m.clone(),
                None => tx.metadata()?,
            };
            tx.set_students(&students)?;
            tx.set_fee_templates(&templates)?;
            tx.set_payments(&payments)?;
            tx.set_settings(&settings)?;
            tx.set_metadata(&metadata)?;
            Ok::<_, StoreError>(())
        })?;

        Ok(ImportSummary {
            students: students.len(),
            fee_templates: templates.len(),
            payments: payments.len(),
            statuses_refreshed,
        })
    }

    pub fn clear_all_data(&self) -> Result<(), StoreError> {
        self.transact(|tx| -> Result<_, StoreError> {
            for c in Collection::ALL {
                tx.delete(c);
            }
            Ok(())
        })
    }

    fn fetch(&self, c: Collection) -> Result<Option<Document>, StoreError> {
        self.docs.read(&c.key()).inspect_err(|e| {
            log::error!("reading {} failed: {}", c.key(), e);
        })
    }
}

fn parse_section<T: DeserializeOwned>(name: &str, value: serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(value)
        .map_err(|e| StoreError::InvalidBackup(format!("section '{}': {}", name, e)))
}

fn decode<T: DeserializeOwned>(c: Collection, body: &str) -> Result<T, StoreError> {
    serde_json::from_str(body).map_err(|source| {
        log::error!("document {} is corrupted: {}", c.key(), source);
        StoreError::Corrupted {
            key: c.key(),
            source,
        }
    })
}

/// One optimistic unit of work. Reads record the revision they observed;
/// writes stay pending until [`EntityStore::transact`] commits them.
pub struct Tx<'a, D> {
    store: &'a EntityStore<D>,
    seen: BTreeMap<Collection, Option<Document>>,
    writes: BTreeMap<Collection, Option<String>>,
}

impl<D: DocumentStore> Tx<'_, D> {
    pub fn load<T: DeserializeOwned>(&mut self, c: Collection) -> Result<Option<T>, StoreError> {
        if let Some(pending) = self.writes.get(&c) {
            return pending.as_deref().map(|body| decode(c, body)).transpose();
        }
        if !self.seen.contains_key(&c) {
            let doc = self.store.fetch(c)?;
            self.seen.insert(c, doc);
        }
        match self.seen.get(&c) {
            Some(Some(doc)) => decode(c, &doc.body).map(Some),
            _ => Ok(None),
        }
    }

    pub fn put<T: Serialize + ?Sized>(&mut self, c: Collection, value: &T) -> Result<(), StoreError> {
        let body = serde_json::to_string(value)
            .map_err(|source| StoreError::Serialize { key: c.key(), source })?;
        self.writes.insert(c, Some(body));
        Ok(())
    }

    pub fn delete(&mut self, c: Collection) {
        self.writes.insert(c, None);
    }

    pub fn students(&mut self) -> Result<Vec<Student>, StoreError> {
        Ok(self.load(Collection::Students)?.unwrap_or_default())
    }

    pub fn set_students(&mut self, students: &[Student]) -> Result<(), StoreError> {
        self.put(Collection::Students, students)
    }

    pub fn fee_templates(&mut self) -> Result<Vec<FeeTemplate>, StoreError> {
        Ok(self.load(Collection::FeeTemplates)?.unwrap_or_default())
    }

    pub fn set_fee_templates(&mut self, templates: &[FeeTemplate]) -> Result<(), StoreError> {
        self.put(Collection::FeeTemplates, templates)
    }

    pub fn payments(&mut self) -> Result<Vec<Payment>, StoreError> {
        Ok(self.load(Collection::Payments)?.unwrap_or_default())
    }

    pub fn set_payments(&mut self, payments: &[Payment]) -> Result<(), StoreError> {
        self.put(Collection::Payments, payments)
    }

    pub fn settings(&mut self) -> Result<Settings, StoreError> {
        Ok(self.load(Collection::Settings)?.unwrap_or_default())
    }

    pub fn set_settings(&mut self, settings: &Settings) -> Result<(), StoreError> {
        self.put(Collection::Settings, settings)
    }

    pub fn metadata(&mut self) -> Result<AppMetadata, StoreError> {
        Ok(self.load(Collection::Metadata)?.unwrap_or_default())
    }

    pub fn set_metadata(&mut self, metadata: &AppMetadata) -> Result<(), StoreError> {
        self.put(Collection::Metadata, metadata)
    }

    fn into_ops(self) -> (Vec<Op>, Vec<Collection>) {
        let mut ops = Vec::with_capacity(self.seen.len().max(self.writes.len()));
        let mut changed = Vec::with_capacity(self.writes.len());
        if self.writes.is_empty() {
            return (ops, changed);
        }
        let revision_of = |c: &Collection| {
            self.seen
                .get(c)
                .map(|doc| doc.as_ref().map_or(0, |d| d.revision))
        };
        for (c, write) in &self.writes {
            let expected = revision_of(c);
            ops.push(match write {
                Some(body) => Op::Put {
                    key: c.key(),
                    body: body.clone(),
                    expected,
                },
                None => Op::Delete {
                    key: c.key(),
                    expected,
                },
            });
            changed.push(*c);
        }
        for c in self.seen.keys().filter(|c| !self.writes.contains_key(c)) {
            if let Some(expected) = revision_of(c) {
                ops.push(Op::Check {
                    key: c.key(),
                    expected,
                });
            }
        }
        (ops, changed)
    }
}
