//! Student roster and the fixed answers about the signed-in student's record.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Currency marker used when formatting balances.
pub const CURRENCY: &str = "₱";

/// One row of the students table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub balance: f64,
}

#[derive(Debug, Deserialize)]
struct StudentsFile {
    #[serde(default)]
    students: Vec<StudentRecord>,
}

/// The students table, loaded once and shared read-only.
///
/// Duplicate ids are kept; lookups return the first match.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    records: Vec<StudentRecord>,
}

impl Roster {
    pub fn new(records: Vec<StudentRecord>) -> Self {
        Self { records }
    }

    /// Load `{"students": [...]}` from disk.
    ///
    /// A missing or malformed file yields an empty roster and a warning.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Students file unavailable, roster is empty");
                return Self::default();
            }
        };

        match serde_json::from_str::<StudentsFile>(&content) {
            Ok(file) => {
                info!(path = %path.display(), count = file.students.len(), "Loaded student roster");
                Self::new(file.students)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Students file malformed, roster is empty");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record with exactly this id.
    pub fn find(&self, student_id: &str) -> Option<&StudentRecord> {
        self.records.iter().find(|r| r.student_id == student_id)
    }

    /// Answer balance or name questions about `student_id`.
    ///
    /// "balance" is checked before "name"; anything else is `None`.
    pub fn lookup(&self, student_id: &str, message: &str) -> Option<String> {
        let record = self.find(student_id)?;
        let lowered = message.to_lowercase();

        if lowered.contains("balance") {
            return Some(format!(
                "Your current balance is {}.",
                format_currency(record.balance)
            ));
        }

        if lowered.contains("name") {
            return Some(format!("You are {} {}.", record.first_name, record.last_name));
        }

        None
    }
}

/// Format an amount as `₱1,234.50`.
pub fn format_currency(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((&fixed, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}{CURRENCY}{grouped}.{cents}")
}
