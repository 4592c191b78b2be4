//! Text formats for voter-roll exports.

use alloc::{format, string::String};
use chrono::{DateTime, SecondsFormat, Utc};
use core::fmt::Write;

/// Display data of one voter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Voter {
    pub id: u64,
    pub username: String,
    pub display_name: String,
    pub nickname: Option<String>,
}

impl Voter {
    /// Placeholder for a voter who can no longer be looked up (e.g. they left the guild).
    pub fn unknown(id: u64) -> Self {
        Self { id, username: String::from("unknown"), display_name: String::from("Unknown User"), nickname: None }
    }

    /// Name shown in voter lists: nickname, then display name.
    pub fn shown_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.display_name)
    }
}

/// Per-option export: one `user_id | username | display_name | nickname` line per voter.
pub fn voter_lines<'v, I>(voters: I) -> String
where
    I: IntoIterator<Item = &'v Voter>,
{
    let mut out = String::new();
    for Voter { id, username, display_name, nickname } in voters {
        let nickname = nickname.as_deref().unwrap_or("");
        // Writing into a `String` never fails.
        let _ = writeln!(out, "{id} | {username} | {display_name} | {nickname}");
    }
    out
}

pub const CSV_HEADER: &str = "User ID,Username,Display Name,Nickname,Option Index,Option Label,Timestamp (ISO)";

/// One row of the whole-poll CSV export.
pub struct CsvRow<'r> {
    pub voter: &'r Voter,
    pub option: u16,
    pub label: &'r str,
    pub timestamp: DateTime<Utc>,
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Whole-poll export: a header row and one row per vote. String fields are always quoted.
pub fn csv<'r, I>(rows: I) -> String
where
    I: IntoIterator<Item = CsvRow<'r>>,
{
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for CsvRow { voter, option, label, timestamp } in rows {
        let _ = writeln!(
            out,
            "{},{},{},{},{option},{},{}",
            voter.id,
            quote(&voter.username),
            quote(&voter.display_name),
            quote(voter.nickname.as_deref().unwrap_or("")),
            quote(label),
            timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
    }
    out
}
