//! Embedded SQLite store shared by every handler process.
//!
//! A [`Store`] borrows the process's [`PortLock`] for its whole life and
//! takes one lock cycle per public call: acquire, run the statement(s),
//! release. Nothing spans two calls, so multi-step sequences such as
//! [`Store::replace_children`] are not atomic with respect to other
//! processes.

mod records;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::{Connection, OptionalExtension, ToSql, params};
use thiserror::Error;
use tracing::{debug, warn};

use crate::lock::PortLock;

pub use records::{Enc, Regex, RegexSlsMap, Record};

const STORE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::store");

/// How long SQLite waits on its own file lock before reporting `SQLITE_BUSY`.
///
/// The port lock already serialises cooperating handlers; this only covers
/// foreign readers of the file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &[(&str, &str)] = &[
    (
        "encs",
        "CREATE TABLE IF NOT EXISTS encs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            salt_id VARCHAR(255),
            formula VARCHAR(255),
            state_file VARCHAR(255),
            dc VARCHAR(255),
            env VARCHAR(255)
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_enc_salt_id ON encs (salt_id);",
    ),
    (
        "regexes",
        "CREATE TABLE IF NOT EXISTS regexes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            regex VARCHAR(255),
            dc VARCHAR(255),
            env VARCHAR(255),
            name VARCHAR(255),
            \"desc\" VARCHAR(255)
        );",
    ),
    (
        "regex_sls_maps",
        "CREATE TABLE IF NOT EXISTS regex_sls_maps (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            regex_id BIGINT,
            formula VARCHAR(255),
            state_file VARCHAR(255)
        );",
    ),
];

/// Errors raised by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite reported an error; the text is passed through unchanged.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    /// Creating a table or index failed while opening the store.
    #[error("creating table {table} failed: {source}")]
    Migrate {
        /// Table being migrated.
        table: &'static str,
        /// Underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },
}

/// Ownership scope for records that belong to one data centre and
/// environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope<'a> {
    dc: &'a str,
    env: &'a str,
}

impl<'a> Scope<'a> {
    /// Creates a scope from data centre and environment system names.
    #[must_use]
    pub const fn new(dc: &'a str, env: &'a str) -> Self {
        Self { dc, env }
    }

    /// Data centre system name.
    #[must_use]
    pub const fn dc(&self) -> &'a str {
        self.dc
    }

    /// Environment system name.
    #[must_use]
    pub const fn env(&self) -> &'a str {
        self.env
    }
}

/// An open store file plus the lock guarding every access to it.
#[derive(Debug)]
pub struct Store<'lock> {
    connection: Connection,
    path: Utf8PathBuf,
    lock: &'lock mut PortLock,
}

impl<'lock> Store<'lock> {
    /// Opens or creates the store at `path` and ensures every table exists.
    ///
    /// Opening and migration run inside a single lock cycle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the file cannot be opened or a table
    /// cannot be created.
    pub fn open(path: &Utf8Path, lock: &'lock mut PortLock) -> Result<Self, StoreError> {
        let connection = {
            let _held = lock.hold();
            let connection = Connection::open(path.as_std_path())?;
            connection.busy_timeout(BUSY_TIMEOUT)?;
            migrate(&connection)?;
            connection
        };
        debug!(target: STORE_TARGET, path = %path, "store opened");
        Ok(Self {
            connection,
            path: path.to_owned(),
            lock,
        })
    }

    /// Returns the store file path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Lists regexes owned by `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] when the query fails.
    pub fn find_regexes(&mut self, scope: Scope<'_>) -> Result<Vec<Regex>, StoreError> {
        self.select("dc = ?1 AND env = ?2", &[&scope.dc, &scope.env])
    }

    /// Looks up one regex by id, only if it is owned by `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] when the query fails.
    pub fn find_regex_scoped(
        &mut self,
        id: i64,
        scope: Scope<'_>,
    ) -> Result<Option<Regex>, StoreError> {
        self.select_one_scoped(id, scope)
    }

    /// Inserts a new regex (id zero) or updates an existing one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] when the write fails.
    pub fn save_regex(&mut self, regex: Regex) -> Result<Regex, StoreError> {
        self.save(regex)
    }

    /// Deletes a regex only if it is owned by `scope`.
    ///
    /// Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] when the delete fails.
    pub fn delete_regex_scoped(&mut self, id: i64, scope: Scope<'_>) -> Result<bool, StoreError> {
        self.delete_scoped::<Regex>(id, scope)
    }

    /// Lists regex mappings, optionally only those of one regex.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] when the query fails.
    pub fn find_maps(&mut self, regex_id: Option<i64>) -> Result<Vec<RegexSlsMap>, StoreError> {
        match regex_id {
            Some(regex_id) => self.select("regex_id = ?1", &[&regex_id]),
            None => self.select("1 = 1", &[]),
        }
    }

    /// Replaces every mapping of `regex_id` with mappings derived from
    /// `classes`.
    ///
    /// Each class is a `formula[.state_file]` key; empty keys are skipped.
    /// The delete and each insert take their own lock cycle, so a failure
    /// part way through leaves a partial set. Returns the stored mappings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] from the first failing statement.
    pub fn replace_children<S: AsRef<str>>(
        &mut self,
        regex_id: i64,
        classes: &[S],
    ) -> Result<Vec<RegexSlsMap>, StoreError> {
        let removed = {
            let _held = self.lock.hold();
            self.connection.execute(
                "DELETE FROM regex_sls_maps WHERE regex_id = ?1",
                params![regex_id],
            )?
        };
        debug!(target: STORE_TARGET, regex_id, removed, "cleared regex mappings");

        let mut stored = Vec::with_capacity(classes.len());
        for class in classes {
            if let Some(mapping) = RegexSlsMap::from_class(regex_id, class.as_ref()) {
                stored.push(self.save(mapping)?);
            }
        }
        Ok(stored)
    }

    /// Lists encs owned by `scope`, optionally for one minion only.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] when the query fails.
    pub fn find_encs(
        &mut self,
        scope: Scope<'_>,
        salt_id: Option<&str>,
    ) -> Result<Vec<Enc>, StoreError> {
        match salt_id {
            Some(salt_id) => self.select(
                "dc = ?1 AND env = ?2 AND salt_id = ?3",
                &[&scope.dc, &scope.env, &salt_id],
            ),
            None => self.select("dc = ?1 AND env = ?2", &[&scope.dc, &scope.env]),
        }
    }

    /// Looks up one enc by id, only if it is owned by `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] when the query fails.
    pub fn find_enc_scoped(&mut self, id: i64, scope: Scope<'_>) -> Result<Option<Enc>, StoreError> {
        self.select_one_scoped(id, scope)
    }

    /// Inserts a new enc (id zero) or updates an existing one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] when the write fails, including a
    /// duplicate `salt_id`.
    pub fn save_enc(&mut self, enc: Enc) -> Result<Enc, StoreError> {
        self.save(enc)
    }

    /// Deletes an enc only if it is owned by `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] when the delete fails.
    pub fn delete_enc_scoped(&mut self, id: i64, scope: Scope<'_>) -> Result<bool, StoreError> {
        self.delete_scoped::<Enc>(id, scope)
    }

    fn select<R: Record>(
        &mut self,
        clause: &str,
        values: &[&dyn ToSql],
    ) -> Result<Vec<R>, StoreError> {
        let sql = format!(
            "SELECT id, {} FROM {} WHERE {clause} ORDER BY id",
            column_list(R::COLUMNS),
            R::TABLE
        );
        let _held = self.lock.hold();
        let mut statement = self.connection.prepare(&sql)?;
        let rows = statement
            .query_map(values, R::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn select_one_scoped<R: Record>(
        &mut self,
        id: i64,
        scope: Scope<'_>,
    ) -> Result<Option<R>, StoreError> {
        let mut rows = self.select::<R>(
            "id = ?1 AND dc = ?2 AND env = ?3",
            &[&id, &scope.dc, &scope.env],
        )?;
        Ok(rows.pop())
    }

    fn save<R: Record>(&mut self, mut record: R) -> Result<R, StoreError> {
        let columns = column_list(R::COLUMNS);
        let _held = self.lock.hold();

        if record.id() != 0 {
            let assignments = R::COLUMNS
                .iter()
                .enumerate()
                .map(|(index, column)| format!("\"{column}\" = ?{}", index + 2))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!("UPDATE {} SET {assignments} WHERE id = ?1", R::TABLE);
            let id = record.id();
            let updated = {
                let mut values: Vec<&dyn ToSql> = vec![&id];
                values.extend(record.values());
                self.connection.execute(&sql, values.as_slice())?
            };
            if updated > 0 {
                debug!(target: STORE_TARGET, table = R::TABLE, id, "record updated");
                return Ok(record);
            }
        }

        // Fresh records and updates of a vanished id both land here; the
        // latter keep their id.
        let id = record.id();
        let inserted_id = if id == 0 {
            let sql = format!(
                "INSERT INTO {} ({columns}) VALUES ({})",
                R::TABLE,
                placeholders(1, R::COLUMNS.len())
            );
            self.connection.execute(&sql, record.values().as_slice())?;
            self.connection.last_insert_rowid()
        } else {
            let sql = format!(
                "INSERT INTO {} (id, {columns}) VALUES ({})",
                R::TABLE,
                placeholders(1, R::COLUMNS.len() + 1)
            );
            let mut values: Vec<&dyn ToSql> = vec![&id];
            values.extend(record.values());
            self.connection.execute(&sql, values.as_slice())?;
            id
        };
        record.set_id(inserted_id);
        debug!(target: STORE_TARGET, table = R::TABLE, id = inserted_id, "record inserted");
        Ok(record)
    }

    fn delete_scoped<R: Record>(&mut self, id: i64, scope: Scope<'_>) -> Result<bool, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE id = ?1 AND dc = ?2 AND env = ?3",
            R::TABLE
        );
        let _held = self.lock.hold();
        let removed = self
            .connection
            .execute(&sql, params![id, scope.dc, scope.env])?;
        debug!(target: STORE_TARGET, table = R::TABLE, id, removed, "scoped delete");
        Ok(removed > 0)
    }
}

fn migrate(connection: &Connection) -> Result<(), StoreError> {
    for &(table, ddl) in SCHEMA {
        connection
            .execute_batch(ddl)
            .map_err(|source| StoreError::Migrate { table, source })?;
    }
    if !salt_id_index_is_unique(connection)? {
        warn!(
            target: STORE_TARGET,
            "idx_enc_salt_id predates this schema and is not unique; duplicate salt ids are accepted"
        );
    }
    Ok(())
}

/// Reports whether `idx_enc_salt_id` enforces uniqueness.
///
/// `CREATE UNIQUE INDEX IF NOT EXISTS` leaves an older non-unique index of
/// the same name in place.
fn salt_id_index_is_unique(connection: &Connection) -> Result<bool, StoreError> {
    let unique: Option<bool> = connection
        .query_row(
            "SELECT \"unique\" FROM pragma_index_list('encs') WHERE name = 'idx_enc_salt_id'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(unique.unwrap_or(false))
}

fn column_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|column| format!("\"{column}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}
