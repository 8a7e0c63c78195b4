use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::data::{DerivativeSet, IndexedSet};
use crate::imaging::ladder::{BaseName, DerivativeFormat};
use crate::error::Result;

/// The DerivativeIndex records every generated derivative set in SQLite.
///
/// Purge consults it so that files written under a base name are found
/// even when their names no longer parse cleanly. File names are not
/// stored; they are rebuilt from (base name, size, format), which keeps a
/// relocated set consistent after a single row update.
pub struct DerivativeIndex {
    conn: Connection,
    db_path: PathBuf,
}

impl DerivativeIndex {
    /// Open (or create) the index database at `db_path`
    pub fn open(db_path: &Path) -> Result<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| crate::error::DerivativeError::io(parent, e))?;
            }
        }

        let conn = Connection::open(db_path)?;
        info!("📁 Derivative index opened at: {}", db_path.display());

        let index = DerivativeIndex {
            conn,
            db_path: db_path.to_path_buf(),
        };
        index.init_schema()?;
        Ok(index)
    }

    /// Index that lives only as long as the value (used by tests and dry runs)
    pub fn in_memory() -> Result<Self> {
        let index = DerivativeIndex {
            conn: Connection::open_in_memory()?,
            db_path: PathBuf::from(":memory:"),
        };
        index.init_schema()?;
        Ok(index)
    }

    /// Create tables and indexes if they don't exist.
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        // One row per (directory, base name)
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS derivative_sets (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                directory       TEXT NOT NULL,
                base_name       TEXT NOT NULL,
                original        TEXT NOT NULL,
                generated_at    INTEGER NOT NULL,
                UNIQUE(directory, base_name)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS derivative_files (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                set_id          INTEGER NOT NULL,
                size            INTEGER NOT NULL,
                format          TEXT NOT NULL,
                width           INTEGER NOT NULL,
                height          INTEGER NOT NULL,
                FOREIGN KEY(set_id) REFERENCES derivative_sets(id) ON DELETE CASCADE
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_derivative_files_set_id
             ON derivative_files(set_id)",
            [],
        )?;

        debug!("Derivative index schema initialized");
        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Number of sets currently recorded
    pub fn set_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM derivative_sets", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Record a freshly generated set, replacing any previous record
    /// for the same directory and base name. Returns the set ID.
    pub fn record_set(&self, set: &DerivativeSet) -> Result<i64> {
        let directory = dir_key(&set.directory);
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM derivative_sets WHERE directory = ?1 AND base_name = ?2",
            params![directory, set.base_name.as_str()],
        )?;
        tx.execute(
            "INSERT INTO derivative_sets (directory, base_name, original, generated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                directory,
                set.base_name.as_str(),
                set.original,
                set.generated_at.timestamp(),
            ],
        )?;
        let set_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO derivative_files (set_id, size, format, width, height)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for file in &set.files {
                stmt.execute(params![
                    set_id,
                    file.size,
                    file.format.extension(),
                    file.width,
                    file.height,
                ])?;
            }
        }

        tx.commit()?;
        Ok(set_id)
    }

    /// File names recorded for a set (empty if the set is unknown)
    pub fn files_for(&self, directory: &Path, base: &BaseName) -> Result<Vec<String>> {
        let Some(set_id) = self.find_set(directory, base.as_str())? else {
            return Ok(Vec::new());
        };
        self.file_names(set_id, base.as_str())
    }

    /// File name of the original a recorded set was generated from
    pub fn original_for(&self, directory: &Path, base: &BaseName) -> Result<Option<String>> {
        let original = self
            .conn
            .query_row(
                "SELECT original FROM derivative_sets WHERE directory = ?1 AND base_name = ?2",
                params![dir_key(directory), base.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(original)
    }

    /// Drop a set's record. Returns true if one existed.
    pub fn forget_set(&self, directory: &Path, base: &BaseName) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM derivative_sets WHERE directory = ?1 AND base_name = ?2",
            params![dir_key(directory), base.as_str()],
        )?;
        Ok(removed > 0)
    }

    /// Point a recorded set at a new directory and base name after its
    /// files were moved. Any record already at the target is replaced.
    pub fn relocate_set(
        &self,
        from_dir: &Path,
        from_base: &BaseName,
        to_dir: &Path,
        to_base: &BaseName,
    ) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM derivative_sets WHERE directory = ?1 AND base_name = ?2",
            params![dir_key(to_dir), to_base.as_str()],
        )?;
        let moved = tx.execute(
            "UPDATE derivative_sets SET directory = ?1, base_name = ?2
             WHERE directory = ?3 AND base_name = ?4",
            params![
                dir_key(to_dir),
                to_base.as_str(),
                dir_key(from_dir),
                from_base.as_str(),
            ],
        )?;
        tx.commit()?;
        Ok(moved > 0)
    }

    /// Get all recorded sets, newest first
    pub fn get_all_sets(&self) -> Result<Vec<IndexedSet>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, directory, base_name, original, generated_at
             FROM derivative_sets ORDER BY generated_at DESC, id DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut sets = Vec::new();
        for row in rows {
            let (id, directory, base_name, original, generated_at) = row?;
            let file_names = self.file_names(id, &base_name)?;
            sets.push(IndexedSet {
                id,
                directory: PathBuf::from(directory),
                base_name,
                original,
                generated_at,
                file_names,
            });
        }

        Ok(sets)
    }

    /// Verify recorded sets still exist on disk.
    /// Forget any set with a missing file; returns how many were dropped.
    pub fn verify_sets(&self) -> Result<usize> {
        let mut dropped = 0;
        for set in self.get_all_sets()? {
            let complete = set
                .file_names
                .iter()
                .all(|name| set.directory.join(name).is_file());

            if !complete {
                self.conn
                    .execute("DELETE FROM derivative_sets WHERE id = ?1", params![set.id])?;
                dropped += 1;
            }
        }

        if dropped > 0 {
            info!("🔄 Dropped {} incomplete derivative sets from the index", dropped);
        }

        Ok(dropped)
    }

    fn find_set(&self, directory: &Path, base_name: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM derivative_sets WHERE directory = ?1 AND base_name = ?2",
                params![dir_key(directory), base_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn file_names(&self, set_id: i64, base_name: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT size, format FROM derivative_files WHERE set_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![set_id], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut names = Vec::new();
        for row in rows {
            let (size, format) = row?;
            // Unknown formats come from a newer writer; keep their extension as stored
            let ext = DerivativeFormat::from_extension(&format)
                .map_or(format.clone(), |f| f.extension().to_string());
            names.push(format!("{}_{}.{}", base_name, size, ext));
        }
        Ok(names)
    }
}

/// Stable text key for a directory ("a/b/" and "a/b" are the same set)
fn dir_key(directory: &Path) -> String {
    directory
        .components()
        .collect::<PathBuf>()
        .to_string_lossy()
        .into_owned()
}

// Implement Debug for better error messages
impl std::fmt::Debug for DerivativeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivativeIndex")
            .field("db_path", &self.db_path)
            .finish()
    }
}
