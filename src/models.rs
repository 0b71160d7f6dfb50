// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SCHEMA_VERSION: &str = "1.0.0";

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    #[default]
    Active,
    Inactive,
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for StudentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(StudentStatus::Active),
            "inactive" => Ok(StudentStatus::Inactive),
            other => Err(anyhow::anyhow!(
                "Unknown student status '{}' (use active|inactive)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub grade: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardian_name: Option<String>,
    pub enrollment_date: DateTime<Utc>,
    #[serde(default)]
    pub status: StudentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub assigned_fees: Vec<FeeLine>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Matches either the internal id or the human-facing student code.
    pub fn matches_key(&self, key: &str) -> bool {
        self.id == key || self.student_id == key
    }

    pub fn fee_line(&self, fee_line_id: &str) -> Option<&FeeLine> {
        self.assigned_fees.iter().find(|f| f.id == fee_line_id)
    }

    pub fn has_template(&self, template_id: &str) -> bool {
        self.assigned_fees
            .iter()
            .any(|f| f.template_id.as_deref() == Some(template_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    OneTime,
    Monthly,
    Term,
    Annual,
    Custom,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::OneTime => "one-time",
            Frequency::Monthly => "monthly",
            Frequency::Term => "term",
            Frequency::Annual => "annual",
            Frequency::Custom => "custom",
        }
    }
}

impl FromStr for Frequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "one-time" | "onetime" | "once" => Ok(Frequency::OneTime),
            "monthly" => Ok(Frequency::Monthly),
            "term" => Ok(Frequency::Term),
            "annual" | "yearly" => Ok(Frequency::Annual),
            "custom" => Ok(Frequency::Custom),
            other => Err(anyhow::anyhow!(
                "Unknown frequency '{}' (use one-time|monthly|term|annual|custom)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeTemplate {
    pub id: String,
    pub title: String,
    pub category: String,
    pub amount: Decimal,
    pub frequency: Frequency,
    /// Day of month (1-31) used to compute due dates at assignment time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_day: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeLineStatus {
    #[default]
    Open,
    Partial,
    Paid,
    Overdue,
}

impl FeeLineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeLineStatus::Open => "open",
            FeeLineStatus::Partial => "partial",
            FeeLineStatus::Paid => "paid",
            FeeLineStatus::Overdue => "overdue",
        }
    }
}

impl fmt::Display for FeeLineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedPayment {
    pub payment_id: String,
    pub amount: Decimal,
}

/// A concrete obligation on a student. `status` is a cache of
/// `ledger::derive_status` and is never authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeLine {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub title: String,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: FeeLineStatus,
    #[serde(default)]
    pub payments_applied: Vec<AppliedPayment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub fee_line_id: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub student_id: String,
    pub date: DateTime<Utc>,
    pub amount: Decimal,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub applied_to: Vec<Allocation>,
}

impl Payment {
    pub fn allocated(&self) -> Decimal {
        self.applied_to.iter().map(|a| a.amount).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DateFormat {
    #[default]
    MonthDayYear,
    DayMonthYear,
    Iso,
}

impl DateFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateFormat::MonthDayYear => "MM/dd/yyyy",
            DateFormat::DayMonthYear => "dd/MM/yyyy",
            DateFormat::Iso => "yyyy-MM-dd",
        }
    }

    pub fn chrono_pattern(&self) -> &'static str {
        match self {
            DateFormat::MonthDayYear => "%m/%d/%Y",
            DateFormat::DayMonthYear => "%d/%m/%Y",
            DateFormat::Iso => "%Y-%m-%d",
        }
    }
}

impl TryFrom<String> for DateFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "MM/dd/yyyy" => Ok(DateFormat::MonthDayYear),
            "dd/MM/yyyy" => Ok(DateFormat::DayMonthYear),
            "yyyy-MM-dd" => Ok(DateFormat::Iso),
            other => Err(format!(
                "unknown date format '{}' (use MM/dd/yyyy|dd/MM/yyyy|yyyy-MM-dd)",
                other
            )),
        }
    }
}

impl From<DateFormat> for String {
    fn from(value: DateFormat) -> Self {
        value.as_str().to_string()
    }
}

fn default_school_name() -> String {
    "My School".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_invoice_prefix() -> String {
    "INV".to_string()
}

fn default_invoice_seq() -> u64 {
    1
}

fn default_payment_methods() -> Vec<String> {
    ["Cash", "Check", "Bank Transfer", "Online"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_fee_categories() -> Vec<String> {
    ["Tuition", "Books", "Lab Fee", "Transport", "Exam Fee", "Other"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_grade_options() -> Vec<String> {
    [
        "K-1", "K-2", "1st", "2nd", "3rd", "4th", "5th", "6th", "7th", "8th", "9th", "10th",
        "11th", "12th",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// School-level configuration. Any field missing from the stored document
/// takes its default on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_school_name")]
    pub school_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_logo_data_url: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub academic_year: Option<String>,
    #[serde(default = "default_invoice_prefix")]
    pub invoice_prefix: String,
    #[serde(default = "default_invoice_seq")]
    pub invoice_seq: u64,
    #[serde(default)]
    pub date_format: DateFormat,
    #[serde(default = "default_payment_methods")]
    pub payment_methods: Vec<String>,
    #[serde(default = "default_fee_categories")]
    pub fee_categories: Vec<String>,
    #[serde(default = "default_grade_options")]
    pub grade_options: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            school_name: default_school_name(),
            school_logo_data_url: None,
            currency: default_currency(),
            academic_year: Some(Utc::now().format("%Y").to_string()),
            invoice_prefix: default_invoice_prefix(),
            invoice_seq: default_invoice_seq(),
            date_format: DateFormat::default(),
            payment_methods: default_payment_methods(),
            fee_categories: default_fee_categories(),
            grade_options: default_grade_options(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadata {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_backup: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Default for AppMetadata {
    fn default() -> Self {
        AppMetadata {
            version: SCHEMA_VERSION.to_string(),
            last_backup: None,
            created_at: Utc::now(),
        }
    }
}

/// Full backup bundle written by `EntityStore::export_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub students: Vec<Student>,
    pub fee_templates: Vec<FeeTemplate>,
    pub payments: Vec<Payment>,
    pub settings: Settings,
    pub metadata: AppMetadata,
    pub exported_at: DateTime<Utc>,
}
