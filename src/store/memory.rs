// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{Document, DocumentStore, Op};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct State {
    docs: HashMap<String, Document>,
    // Store-wide, so a key deleted and re-created never reuses a revision.
    last_revision: u64,
}

impl State {
    fn bump(&mut self) -> u64 {
        self.last_revision += 1;
        self.last_revision
    }

    fn revision_of(&self, key: &str) -> u64 {
        self.docs.get(key).map_or(0, |d| d.revision)
    }
}

/// In-process document store. Clones share the same backing map, which lets
/// tests stand up two independent `EntityStore`s over one namespace.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocuments {
    state: Rc<RefCell<State>>,
}

impl MemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a raw body, bypassing serialization.
    pub fn insert_raw(&self, key: &str, body: &str) {
        let mut state = self.state.borrow_mut();
        let revision = state.bump();
        state.docs.insert(
            key.to_string(),
            Document {
                body: body.to_string(),
                revision,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.state.borrow().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().docs.is_empty()
    }
}

impl DocumentStore for MemoryDocuments {
    fn read(&self, key: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.state.borrow().docs.get(key).cloned())
    }

    fn apply(&self, ops: &[Op]) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        for op in ops {
            if let Some(expected) = op.expected() {
                let found = state.revision_of(op.key());
                if found != expected {
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
                    let revision = state.bump();
                    state.docs.insert(
                        key.clone(),
                        Document {
                            body: body.clone(),
                            revision,
                        },
                    );
                }
                Op::Delete { key, .. } => {
                    state.docs.remove(key);
                }
                Op::Check { .. } => {}
            }
        }
        Ok(())
    }
}
