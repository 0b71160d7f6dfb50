// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, ArgGroup, Command, crate_version};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as pretty JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print as JSON lines"),
    )
}

fn opt(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).help(help)
}

fn req(name: &'static str, help: &'static str) -> Arg {
    opt(name, help).required(true)
}

fn force() -> Arg {
    Arg::new("force")
        .long("force")
        .action(ArgAction::SetTrue)
        .help("Proceed even if payment allocations would be orphaned")
}

fn out() -> Arg {
    req("out", "Output file path")
}

fn student_profile_args(cmd: Command, required: bool) -> Command {
    let field = |name, help| if required { req(name, help) } else { opt(name, help) };
    cmd.arg(field("first-name", "First name"))
        .arg(field("last-name", "Last name"))
        .arg(field("grade", "Grade"))
        .arg(opt("phone", "Contact phone"))
        .arg(opt("email", "Contact email"))
        .arg(opt("guardian", "Guardian name"))
        .arg(opt("status", "active|inactive"))
        .arg(opt("notes", "Free-text notes"))
}

fn student_cmd() -> Command {
    Command::new("student")
        .about("Manage students and their assigned fees")
        .subcommand(
            student_profile_args(
                Command::new("add")
                    .about("Add a student")
                    .arg(req("student-id", "Human-facing student code")),
                true,
            )
            .arg(opt("enrolled", "Enrollment date YYYY-MM-DD (default today)"))
            .arg(
                opt("fee", "Fee template (id or title) to assign; repeatable")
                    .action(ArgAction::Append),
            ),
        )
        .subcommand(json_flags(
            Command::new("list")
                .about("List students with balances")
                .arg(opt("grade", "Only this grade"))
                .arg(opt("status", "Only active|inactive")),
        ))
        .subcommand(json_flags(
            Command::new("show")
                .about("Show one student's fee lines")
                .arg(req("student", "Student id or code")),
        ))
        .subcommand(student_profile_args(
            Command::new("update")
                .about("Update a student's profile")
                .arg(req("student", "Student id or code"))
                .arg(opt("student-id", "New student code")),
            false,
        ))
        .subcommand(
            Command::new("rm")
                .about("Delete a student")
                .arg(req("student", "Student id or code"))
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Delete even if payments reference the student"),
                ),
        )
        .subcommand(
            Command::new("add-fee")
                .about("Add an ad-hoc fee line to a student")
                .arg(req("student", "Student id or code"))
                .arg(req("title", "Fee title"))
                .arg(req("amount", "Amount"))
                .arg(opt("due", "Due date YYYY-MM-DD")),
        )
        .subcommand(
            Command::new("remove-fee")
                .about("Remove one fee line from a student")
                .arg(req("student", "Student id or code"))
                .arg(req("fee-line", "Fee line id"))
                .arg(force()),
        )
}

fn fee_cmd() -> Command {
    Command::new("fee")
        .about("Manage fee templates and assignments")
        .subcommand(
            Command::new("add")
                .about("Create a fee template")
                .arg(req("title", "Fee title"))
                .arg(req("category", "Fee category (from settings)"))
                .arg(req("amount", "Amount"))
                .arg(opt("frequency", "one-time|monthly|term|annual|custom").default_value("one-time"))
                .arg(opt("due-day", "Day of month the fee falls due (1-31)"))
                .arg(opt("notes", "Notes")),
        )
        .subcommand(json_flags(Command::new("list").about("List fee templates")))
        .subcommand(
            Command::new("update")
                .about("Edit a template (assigned lines keep their snapshot)")
                .arg(req("template", "Template id or title"))
                .arg(opt("title", "Fee title"))
                .arg(opt("category", "Fee category"))
                .arg(opt("amount", "Amount"))
                .arg(opt("frequency", "one-time|monthly|term|annual|custom"))
                .arg(opt("due-day", "Day of month (1-31); 0 clears it"))
                .arg(opt("notes", "Notes")),
        )
        .subcommand(
            Command::new("rm")
                .about("Delete a template")
                .arg(req("template", "Template id or title"))
                .arg(
                    Arg::new("strip")
                        .long("strip")
                        .action(ArgAction::SetTrue)
                        .help("Also remove its fee lines from every student"),
                )
                .arg(force()),
        )
        .subcommand(
            Command::new("assign")
                .about("Assign a template to a grade or to chosen students")
                .arg(req("template", "Template id or title"))
                .arg(opt("grade", "All active students in this grade"))
                .arg(
                    opt("student", "Student id or code; repeatable")
                        .action(ArgAction::Append),
                )
                .group(
                    ArgGroup::new("target")
                        .args(["grade", "student"])
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("unassign")
                .about("Remove a template's fee lines from every student")
                .arg(req("template", "Template id or title"))
                .arg(force()),
        )
}

fn pay_cmd() -> Command {
    Command::new("pay")
        .about("Record and list payments")
        .subcommand(
            Command::new("record")
                .about("Record a payment")
                .arg(req("student", "Student id or code"))
                .arg(req("amount", "Amount received"))
                .arg(req("method", "Payment method (from settings)"))
                .arg(opt("date", "Payment date YYYY-MM-DD or RFC 3339 (default now)"))
                .arg(opt("notes", "Notes"))
                .arg(
                    opt("alloc", "FEE_LINE_ID=AMOUNT; repeatable")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("auto")
                        .long("auto")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("alloc")
                        .help("Allocate overdue-first, then by due date"),
                ),
        )
        .subcommand(json_flags(
            Command::new("list")
                .about("List payments, newest first")
                .arg(opt("student", "Student id or code"))
                .arg(opt("from", "From date YYYY-MM-DD (inclusive)"))
                .arg(opt("to", "To date YYYY-MM-DD (inclusive)")),
        ))
        .subcommand(json_flags(
            Command::new("preview")
                .about("Show how --auto would spread an amount")
                .arg(req("student", "Student id or code"))
                .arg(req("amount", "Amount")),
        ))
}

fn invoice_cmd() -> Command {
    Command::new("invoice")
        .about("Invoice numbering and documents")
        .subcommand(
            Command::new("next")
                .about("Show the next invoice number")
                .arg(
                    Arg::new("issue")
                        .long("issue")
                        .action(ArgAction::SetTrue)
                        .help("Consume it (advances the counter)"),
                ),
        )
        .subcommand(
            Command::new("assign")
                .about("Give a student an invoice number if missing")
                .arg(req("student", "Student id or code")),
        )
        .subcommand(Command::new("backfill").about("Number every student lacking one"))
        .subcommand(
            Command::new("generate")
                .about("Write HTML invoices")
                .arg(
                    opt("student", "Student id or code; repeatable")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .help("Every active student (inactive students are skipped)"),
                )
                .group(ArgGroup::new("who").args(["student", "all"]).required(true))
                .arg(req("out-dir", "Directory for the HTML files"))
                .arg(
                    opt("pause-ms", "Pause between documents in bulk runs")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("1000"),
                ),
        )
}

fn report_cmd() -> Command {
    Command::new("report")
        .about("Dashboard figures")
        .subcommand(json_flags(Command::new("dashboard").about("Headline KPIs")))
        .subcommand(json_flags(
            Command::new("outstanding").about("Students with a balance, largest first"),
        ))
        .subcommand(json_flags(
            Command::new("by-grade").about("Fees, collections and balances per grade"),
        ))
}

fn export_cmd() -> Command {
    Command::new("export")
        .about("Export CSV reports or a JSON backup")
        .subcommand(Command::new("students").arg(out()))
        .subcommand(
            Command::new("payments")
                .arg(out())
                .arg(opt("from", "From date YYYY-MM-DD (inclusive)"))
                .arg(opt("to", "To date YYYY-MM-DD (inclusive)")),
        )
        .subcommand(Command::new("outstanding").arg(out()))
        .subcommand(Command::new("fees").arg(out()))
        .subcommand(Command::new("backup").arg(out()))
}

fn settings_cmd() -> Command {
    let list = || req("list", "payment-methods|fee-categories|grades");
    Command::new("settings")
        .about("School configuration")
        .subcommand(json_flags(Command::new("show")))
        .subcommand(
            Command::new("set")
                .arg(req(
                    "key",
                    "school-name|currency|academic-year|invoice-prefix|invoice-seq|date-format|logo",
                ))
                .arg(req("value", "New value")),
        )
        .subcommand(
            Command::new("add-option")
                .arg(list())
                .arg(req("value", "Option to add")),
        )
        .subcommand(
            Command::new("remove-option")
                .arg(list())
                .arg(req("value", "Option to remove")),
        )
}

pub fn build_cli() -> Command {
    Command::new("feeledger")
        .version(crate_version!())
        .about("Tuition fee ledger: students, fees, payments, invoices")
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .env("FEELEDGER_DB")
                .help("Database file (default: platform data dir)"),
        )
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(student_cmd())
        .subcommand(fee_cmd())
        .subcommand(pay_cmd())
        .subcommand(invoice_cmd())
        .subcommand(report_cmd())
        .subcommand(export_cmd())
        .subcommand(
            Command::new("import")
                .about("Restore from a JSON backup")
                .subcommand(Command::new("backup").arg(req("path", "Backup file"))),
        )
        .subcommand(settings_cmd())
        .subcommand(
            Command::new("doctor")
                .about("Check ledger consistency")
                .arg(
                    Arg::new("fix")
                        .long("fix")
                        .action(ArgAction::SetTrue)
                        .help("Rewrite stale cached statuses"),
                ),
        )
        .subcommand(
            Command::new("data").about("Data management").subcommand(
                Command::new("clear").about("Erase all data").arg(
                    Arg::new("yes")
                        .long("yes")
                        .action(ArgAction::SetTrue)
                        .required(true)
                        .help("Confirm"),
                ),
            ),
        )
}
