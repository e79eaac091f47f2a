//! Typed rows persisted in the handler store.
//!
//! Each record serialises with `PascalCase` field names, which is the shape
//! the orchestrator's clients expect in reply payloads.

use rusqlite::{Row, ToSql};
use serde::{Deserialize, Serialize};

/// Mapping between a record type and its table.
///
/// Column order in [`Record::COLUMNS`] must match both
/// [`Record::from_row`] (after the leading `id` column) and
/// [`Record::values`].
pub trait Record: Sized {
    /// Table name.
    const TABLE: &'static str;
    /// Non-key columns, in binding order.
    const COLUMNS: &'static [&'static str];

    /// Returns the primary key; zero means not yet persisted.
    fn id(&self) -> i64;

    /// Stores the key assigned on insert.
    fn set_id(&mut self, id: i64);

    /// Builds a record from a row selected as `id, COLUMNS...`.
    ///
    /// # Errors
    ///
    /// Returns the column conversion error reported by SQLite.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Returns the non-key column values in [`Record::COLUMNS`] order.
    fn values(&self) -> Vec<&dyn ToSql>;
}

/// A named regular expression matched against node names, owned by one
/// data centre and environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Regex {
    /// Primary key.
    pub id: i64,
    /// The regular expression text.
    pub regex: String,
    /// Owning data centre system name.
    pub dc: String,
    /// Owning environment system name.
    pub env: String,
    /// Short name, no spaces.
    pub name: String,
    /// Free-form description.
    pub desc: String,
}

impl Record for Regex {
    const TABLE: &'static str = "regexes";
    const COLUMNS: &'static [&'static str] = &["regex", "dc", "env", "name", "desc"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            regex: text(row, 1)?,
            dc: text(row, 2)?,
            env: text(row, 3)?,
            name: text(row, 4)?,
            desc: text(row, 5)?,
        })
    }

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.regex, &self.dc, &self.env, &self.name, &self.desc]
    }
}

/// A state-file mapping attached to a [`Regex`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegexSlsMap {
    /// Primary key.
    pub id: i64,
    /// Parent regex identifier.
    pub regex_id: i64,
    /// Formula (directory) name; never empty for stored rows.
    pub formula: String,
    /// State file name within the formula; may be empty.
    pub state_file: String,
}

impl RegexSlsMap {
    /// Derives a mapping from a `formula[.state_file]` class key.
    ///
    /// The key splits on its first `.` only, so `a.b.c` yields formula `a`
    /// and state file `b.c`. Empty keys yield `None`.
    #[must_use]
    pub fn from_class(regex_id: i64, class: &str) -> Option<Self> {
        if class.is_empty() {
            return None;
        }
        let (formula, state_file) = class.split_once('.').unwrap_or((class, ""));
        Some(Self {
            id: 0,
            regex_id,
            formula: formula.to_owned(),
            state_file: state_file.to_owned(),
        })
    }
}

impl Record for RegexSlsMap {
    const TABLE: &'static str = "regex_sls_maps";
    const COLUMNS: &'static [&'static str] = &["regex_id", "formula", "state_file"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            regex_id: row.get::<_, Option<i64>>(1)?.unwrap_or_default(),
            formula: text(row, 2)?,
            state_file: text(row, 3)?,
        })
    }

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.regex_id, &self.formula, &self.state_file]
    }
}

/// Node classification: which formula and state file apply to one minion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Enc {
    /// Primary key.
    pub id: i64,
    /// Minion identifier; unique across the store.
    pub salt_id: String,
    /// Formula (directory) name.
    pub formula: String,
    /// State file name.
    pub state_file: String,
    /// Owning data centre system name.
    pub dc: String,
    /// Owning environment system name.
    pub env: String,
}

impl Record for Enc {
    const TABLE: &'static str = "encs";
    const COLUMNS: &'static [&'static str] = &["salt_id", "formula", "state_file", "dc", "env"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            salt_id: text(row, 1)?,
            formula: text(row, 2)?,
            state_file: text(row, 3)?,
            dc: text(row, 4)?,
            env: text(row, 5)?,
        })
    }

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.salt_id,
            &self.formula,
            &self.state_file,
            &self.dc,
            &self.env,
        ]
    }
}

// Columns are nullable; NULL reads back as an empty string.
fn text(row: &Row<'_>, index: usize) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(index)?.unwrap_or_default())
}
