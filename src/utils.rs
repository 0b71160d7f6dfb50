// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::DateFormat;

static AMOUNT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?P<sign>-)?\s*(?:[A-Za-z]{3}|[$€£₹¥])?\s*(?P<num>\d[\d,]*(?:\.\d+)?|\.\d+)\s*$",
    )
    .ok()
});

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

/// Accepts an RFC 3339 instant or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let d = parse_date(s)
        .with_context(|| format!("Invalid instant '{}', expected RFC 3339 or YYYY-MM-DD", s))?;
    Ok(start_of_day(d))
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

/// Parses a typed money amount, tolerating a currency symbol or ISO code
/// and thousands separators ("$1,234.50", "USD 75"). Anything else is an
/// error rather than a silent zero.
pub fn parse_amount(s: &str) -> Result<Decimal> {
    let Some(re) = AMOUNT.as_ref() else {
        return parse_decimal(s);
    };
    let caps = re
        .captures(s)
        .with_context(|| format!("Invalid amount '{}'", s))?;
    let digits = caps["num"].replace(',', "");
    let amount = parse_decimal(&digits).with_context(|| format!("Invalid amount '{}'", s))?;
    Ok(if caps.name("sign").is_some() { -amount } else { amount })
}

pub fn start_of_day(d: NaiveDate) -> DateTime<Utc> {
    d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// A due instant is overdue once its calendar day is before `today`.
pub fn is_overdue(due: &DateTime<Utc>, today: NaiveDate) -> bool {
    due.date_naive() < today
}

pub fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1)?.pred_opt()
}

pub fn format_date(dt: &DateTime<Utc>, fmt: DateFormat) -> String {
    dt.format(fmt.chrono_pattern()).to_string()
}

fn currency_symbol(ccy: &str) -> Option<&'static str> {
    match ccy.to_uppercase().as_str() {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "INR" => Some("₹"),
        "JPY" => Some("¥"),
        "NGN" => Some("₦"),
        "PHP" => Some("₱"),
        _ => None,
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn money_prefix(ccy: &str) -> String {
    currency_symbol(ccy)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("{} ", ccy.to_uppercase()))
}

/// `$1,234.50` style rendering; unknown codes are prefixed with the code.
pub fn format_currency(amount: Decimal, ccy: &str) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let body = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = body.split_once('.').unwrap_or((body.as_str(), "00"));
    format!(
        "{}{}{}.{}",
        if negative { "-" } else { "" },
        money_prefix(ccy),
        group_thousands(int_part),
        frac_part
    )
}

/// Short form for dashboards: `$1.2K`, `$45K`, `$3.1M`.
pub fn format_currency_compact(amount: Decimal, ccy: &str) -> String {
    let abs = amount.abs();
    let (divisor, suffix) = if abs >= Decimal::from(1_000_000) {
        (Decimal::from(1_000_000), "M")
    } else if abs >= Decimal::from(1_000) {
        (Decimal::from(1_000), "K")
    } else {
        return format_currency(amount, ccy);
    };
    let scaled = abs / divisor;
    let dp = if scaled < Decimal::TEN { 1 } else { 0 };
    let shown = scaled
        .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    format!(
        "{}{}{}{}",
        if amount.is_sign_negative() { "-" } else { "" },
        money_prefix(ccy),
        shown,
        suffix
    )
}

/// Plain two-decimal rendering used in CSV output.
pub fn fmt_amount(d: Decimal) -> String {
    format!(
        "{:.2}",
        d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

/// Required string argument, trimmed.
pub fn arg_str(m: &clap::ArgMatches, id: &str) -> Result<String> {
    m.get_one::<String>(id)
        .map(|s| s.trim().to_string())
        .with_context(|| format!("Missing required argument --{}", id))
}

/// Optional string argument, trimmed; blank values read as absent.
pub fn opt_str(m: &clap::ArgMatches, id: &str) -> Option<String> {
    m.get_one::<String>(id)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

pub fn flag(m: &clap::ArgMatches, id: &str) -> bool {
    m.try_get_one::<bool>(id).ok().flatten().copied().unwrap_or(false)
}
