// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{NaiveDate, TimeZone, Utc};
use feeledger::commands::exporter::{
    self, fee_templates_csv, outstanding_csv, payments_csv, students_csv,
};
use feeledger::cli;
use feeledger::models::{
    Allocation, AppliedPayment, DateFormat, FeeLine, FeeLineStatus, FeeTemplate, Frequency,
    Payment, Settings, Student, StudentStatus,
};
use feeledger::store::{EntityStore, MemoryDocuments};
use rust_decimal::Decimal;
use tempfile::tempdir;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn fee(id: &str, title: &str, amount: i64, due: Option<(i32, u32, u32)>) -> FeeLine {
    FeeLine {
        id: id.into(),
        template_id: Some("tpl-1".into()),
        title: title.into(),
        amount: Decimal::from(amount),
        due_date: due.map(|(y, m, d)| Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()),
        created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        status: FeeLineStatus::Open,
        payments_applied: Vec::new(),
    }
}

fn student(code: &str, last: &str, fees: Vec<FeeLine>) -> Student {
    Student {
        id: format!("id-{}", code),
        student_id: code.into(),
        first_name: "Mary".into(),
        last_name: last.into(),
        grade: "2nd".into(),
        contact_phone: None,
        contact_email: Some("mary@example.com".into()),
        guardian_name: Some("Jane \"JJ\" Doe".into()),
        enrollment_date: Utc.with_ymd_and_hms(2024, 9, 2, 0, 0, 0).unwrap(),
        status: StudentStatus::Active,
        notes: Some("Line one\nline two, with comma".into()),
        invoice_number: None,
        assigned_fees: fees,
    }
}

fn payment(
    id: &str,
    student_id: &str,
    date: (i32, u32, u32),
    amount: i64,
    applied: Vec<(&str, i64)>,
) -> Payment {
    Payment {
        id: id.into(),
        student_id: student_id.into(),
        date: Utc.with_ymd_and_hms(date.0, date.1, date.2, 12, 0, 0).unwrap(),
        amount: Decimal::from(amount),
        method: "Cash".into(),
        notes: None,
        applied_to: applied
            .into_iter()
            .map(|(f, a)| Allocation {
                fee_line_id: f.into(),
                amount: Decimal::from(a),
            })
            .collect(),
    }
}

fn settings() -> Settings {
    Settings {
        date_format: DateFormat::Iso,
        ..Settings::default()
    }
}

#[test]
fn students_csv_quotes_awkward_cells() {
    let s = student("S1", "O'Brien", vec![fee("f1", "Tuition", 100, None)]);
    let payments = vec![payment("p1", "id-S1", (2025, 1, 5), 30, vec![])];
    let csv = students_csv(&[s], &payments, &settings()).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Student ID,First Name,Last Name,Grade,Status,Contact Phone,Contact Email,Guardian Name,Enrollment Date,Total Fees,Total Paid,Outstanding Balance,Notes"
    );
    assert!(csv.contains(
        "S1,Mary,O'Brien,2nd,active,,mary@example.com,\"Jane \"\"JJ\"\" Doe\",2024-09-02,100.00,30.00,70.00,\"Line one\nline two, with comma\""
    ));
}

#[test]
fn payments_csv_filters_by_inclusive_dates_newest_first() {
    let mut f1 = fee("f1", "Tuition", 100, None);
    f1.payments_applied.push(AppliedPayment {
        payment_id: "p2".into(),
        amount: Decimal::from(50),
    });
    let students = vec![student("S1", "Smith", vec![f1])];
    let payments = vec![
        payment("p1", "id-S1", (2025, 1, 1), 10, vec![]),
        payment("p2", "id-S1", (2025, 1, 15), 50, vec![("f1", 50)]),
        payment("p3", "id-S1", (2025, 1, 31), 20, vec![("gone", 20)]),
        payment("p4", "id-ghost", (2025, 1, 20), 5, vec![]),
        payment("p5", "id-S1", (2025, 2, 1), 99, vec![]),
    ];
    let csv = payments_csv(
        &students,
        &payments,
        &settings(),
        Some(day(2025, 1, 1)),
        Some(day(2025, 1, 31)),
    )
    .unwrap();
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(
        rows,
        vec![
            "2025-01-31,S1,Mary Smith,2nd,20.00,Cash,Unknown Fee,",
            "2025-01-20,Unknown,Unknown Student,,5.00,Cash,Not applied,",
            "2025-01-15,S1,Mary Smith,2nd,50.00,Cash,Tuition: $50.00,",
            "2025-01-01,S1,Mary Smith,2nd,10.00,Cash,Not applied,",
        ]
    );
}

#[test]
fn outstanding_csv_lists_debtors_largest_first() {
    let students = vec![
        student("S1", "Small", vec![fee("a", "Books", 40, Some((2025, 1, 10)))]),
        student(
            "S2",
            "Large",
            vec![
                fee("b", "Tuition", 500, Some((2025, 1, 10))),
                fee("c", "Bus", 60, Some((2025, 6, 1))),
            ],
        ),
        student("S3", "Settled", vec![fee("d", "Books", 40, None)]),
    ];
    let payments = vec![payment("p", "id-S3", (2025, 1, 2), 40, vec![])];
    let csv = outstanding_csv(&students, &payments, day(2025, 2, 1)).unwrap();
    let rows: Vec<&str> = csv.lines().collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[1].starts_with("S2,Mary Large,2nd,"));
    assert!(rows[1].ends_with(",560.00,Tuition"));
    assert!(rows[2].ends_with(",40.00,Books"));
}

#[test]
fn fee_templates_csv_counts_assignments() {
    let templates = vec![FeeTemplate {
        id: "tpl-1".into(),
        title: "Tuition".into(),
        category: "Tuition".into(),
        amount: Decimal::new(12345, 2),
        frequency: Frequency::OneTime,
        due_day: Some(5),
        notes: None,
    }];
    let students = vec![
        student("S1", "A", vec![fee("f", "Tuition", 1, None)]),
        student("S2", "B", vec![]),
    ];
    let csv = fee_templates_csv(&templates, &students).unwrap();
    assert_eq!(
        csv.lines().nth(1).unwrap(),
        "Tuition,Tuition,123.45,one-time,5,1,"
    );
}

#[test]
fn export_command_writes_file() {
    let store = EntityStore::new(MemoryDocuments::new());
    store
        .add_student(student("S1", "Smith", vec![fee("f1", "Tuition", 100, None)]))
        .unwrap();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("students.csv");
    let out_str = out_path.to_string_lossy().to_string();

    let matches = cli::build_cli().get_matches_from([
        "feeledger",
        "export",
        "students",
        "--out",
        out_str.as_str(),
    ]);
    let sub = matches.subcommand_matches("export").unwrap();
    exporter::handle(&store, sub).unwrap();

    let written = std::fs::read_to_string(&out_path).unwrap();
    assert!(written.starts_with("Student ID,First Name"));
    assert!(written.contains("S1,Mary,Smith"));
}

#[test]
fn backup_export_is_importable_json() {
    let store = EntityStore::new(MemoryDocuments::new());
    store.add_student(student("S1", "Smith", vec![])).unwrap();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("backup.json");
    let out_str = out_path.to_string_lossy().to_string();

    let matches = cli::build_cli().get_matches_from([
        "feeledger",
        "export",
        "backup",
        "--out",
        out_str.as_str(),
    ]);
    exporter::handle(&store, matches.subcommand_matches("export").unwrap()).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(value["students"][0]["studentId"], "S1");
    assert!(value["exportedAt"].is_string());
    assert_eq!(value["metadata"]["version"], "1.0.0");
}
