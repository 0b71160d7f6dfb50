// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{NaiveDate, TimeZone, Utc};
use feeledger::models::DateFormat;
use feeledger::utils::{
    fmt_amount, format_currency, format_currency_compact, format_date, is_overdue, month_end,
    parse_amount, parse_instant,
};
use rust_decimal::Decimal;

#[test]
fn currency_formatting() {
    assert_eq!(format_currency(Decimal::new(123450, 2), "USD"), "$1,234.50");
    assert_eq!(format_currency(Decimal::from(1_000_000), "usd"), "$1,000,000.00");
    assert_eq!(format_currency(Decimal::ZERO, "USD"), "$0.00");
    assert_eq!(format_currency(Decimal::from(-5), "XYZ"), "-XYZ 5.00");
    assert_eq!(format_currency(Decimal::new(2500, 0), "INR"), "₹2,500.00");
    assert_eq!(format_currency(Decimal::new(10005, 3), "EUR"), "€10.01");
}

#[test]
fn compact_currency() {
    assert_eq!(format_currency_compact(Decimal::from(1234), "USD"), "$1.2K");
    assert_eq!(format_currency_compact(Decimal::from(45_000), "USD"), "$45K");
    assert_eq!(format_currency_compact(Decimal::from(3_100_000), "USD"), "$3.1M");
    assert_eq!(format_currency_compact(Decimal::from(1000), "USD"), "$1K");
    assert_eq!(format_currency_compact(Decimal::from(999), "USD"), "$999.00");
}

#[test]
fn typed_amounts_allow_symbols_and_separators() {
    assert_eq!(parse_amount("$1,234.50").unwrap(), Decimal::new(123450, 2));
    assert_eq!(parse_amount("USD 75").unwrap(), Decimal::from(75));
    assert_eq!(parse_amount(" 75 ").unwrap(), Decimal::from(75));
    assert_eq!(parse_amount("-5").unwrap(), Decimal::from(-5));
    assert_eq!(parse_amount("₹2,500").unwrap(), Decimal::from(2500));
    assert!(parse_amount("abc").is_err());
    assert!(parse_amount("").is_err());
    assert!(parse_amount("12.3.4").is_err());
}

#[test]
fn instants_accept_dates_and_rfc3339() {
    assert_eq!(
        parse_instant("2025-03-04").unwrap(),
        Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap()
    );
    assert_eq!(
        parse_instant("2025-03-04T10:30:00+02:00").unwrap(),
        Utc.with_ymd_and_hms(2025, 3, 4, 8, 30, 0).unwrap()
    );
    assert!(parse_instant("04/03/2025").is_err());
}

#[test]
fn month_ends() {
    assert_eq!(month_end(2024, 2), NaiveDate::from_ymd_opt(2024, 2, 29));
    assert_eq!(month_end(2025, 2), NaiveDate::from_ymd_opt(2025, 2, 28));
    assert_eq!(month_end(2025, 12), NaiveDate::from_ymd_opt(2025, 12, 31));
}

#[test]
fn dates_follow_display_setting() {
    let dt = Utc.with_ymd_and_hms(2025, 7, 4, 15, 0, 0).unwrap();
    assert_eq!(format_date(&dt, DateFormat::MonthDayYear), "07/04/2025");
    assert_eq!(format_date(&dt, DateFormat::DayMonthYear), "04/07/2025");
    assert_eq!(format_date(&dt, DateFormat::Iso), "2025-07-04");
}

#[test]
fn overdue_is_by_calendar_day() {
    let due = Utc.with_ymd_and_hms(2025, 1, 10, 18, 0, 0).unwrap();
    assert!(!is_overdue(&due, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()));
    assert!(is_overdue(&due, NaiveDate::from_ymd_opt(2025, 1, 11).unwrap()));
    assert_eq!(fmt_amount(Decimal::new(5, 1)), "0.50");
}
