// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod data;
pub mod doctor;
pub mod exporter;
pub mod fees;
pub mod importer;
pub mod invoices;
pub mod payments;
pub mod reports;
pub mod settings;
pub mod students;

use crate::error::LedgerError;
use crate::models::{FeeTemplate, Student};

/// Position of the student addressed by internal id or student code.
pub fn student_index(students: &[Student], key: &str) -> Result<usize, LedgerError> {
    students
        .iter()
        .position(|s| s.matches_key(key))
        .ok_or_else(|| LedgerError::StudentNotFound(key.to_string()))
}

/// Templates are addressed by id or, case-insensitively, by title.
pub fn template_index(templates: &[FeeTemplate], key: &str) -> Result<usize, LedgerError> {
    templates
        .iter()
        .position(|t| t.id == key)
        .or_else(|| {
            templates
                .iter()
                .position(|t| t.title.eq_ignore_ascii_case(key))
        })
        .ok_or_else(|| LedgerError::TemplateNotFound(key.to_string()))
}
