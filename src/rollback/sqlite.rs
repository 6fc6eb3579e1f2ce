// src/rollback/sqlite.rs

//! SQLite-backed rollback repository

use super::schema;
use super::{ProfileSnapshot, RollbackRepository, SnapshotRef};
use crate::error::{Error, Result};
use crate::location;
use crate::metadata::InstallableUnit;
use crate::profile::Profile;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};
use url::Url;

/// Location reported by in-memory repositories
pub const MEMORY_LOCATION: &str = "memory:rollback";

/// Snapshot storage in a single SQLite database
pub struct SqliteRollbackRepository {
    conn: Mutex<Connection>,
    location: Url,
}

/// A `snapshots` row before its units are attached
struct SnapshotRow {
    id: i64,
    reference: SnapshotRef,
    profile_id: String,
    summary: String,
    timestamp: DateTime<Utc>,
    properties: String,
}

impl SnapshotRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let created_at: String = row.get(4)?;
        let timestamp = DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

        Ok(Self {
            id: row.get(0)?,
            reference: SnapshotRef::new(row.get::<_, String>(1)?),
            profile_id: row.get(2)?,
            summary: row.get(3)?,
            timestamp,
            properties: row.get(5)?,
        })
    }
}

impl SqliteRollbackRepository {
    /// Open (creating if needed) the repository database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        let location = location::from_path(path)?;
        info!("Opened rollback repository at {}", location);
        Self::with_connection(conn, location)
    }

    /// A repository that lives only as long as this value
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let location =
            Url::parse(MEMORY_LOCATION).map_err(|_| Error::InvalidLocation(MEMORY_LOCATION.to_string()))?;
        Self::with_connection(conn, location)
    }

    fn with_connection(conn: Connection, location: Url) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Persist an already captured snapshot
    pub fn insert_snapshot(&self, snapshot: &ProfileSnapshot) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO snapshots (reference, profile_id, summary, created_at, properties)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                snapshot.reference.as_str(),
                &snapshot.profile_id,
                &snapshot.summary,
                snapshot.timestamp.to_rfc3339(),
                serde_json::to_string(&snapshot.properties)?,
            ],
        )?;
        let snapshot_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO snapshot_units (snapshot_id, unit_id, unit_version, unit_json)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for unit in &snapshot.units {
                stmt.execute(params![
                    snapshot_id,
                    &unit.id,
                    unit.version.to_string(),
                    serde_json::to_string(unit)?,
                ])?;
            }
        }

        tx.commit()?;
        debug!(
            "Recorded snapshot {} of profile {} ({} units)",
            snapshot.reference,
            snapshot.profile_id,
            snapshot.units.len()
        );
        Ok(())
    }

    /// Number of snapshots recorded for all profiles
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl std::fmt::Debug for SqliteRollbackRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRollbackRepository")
            .field("location", &self.location.as_str())
            .finish()
    }
}

impl RollbackRepository for SqliteRollbackRepository {
    fn record_snapshot(&self, profile: &Profile, summary: &str) -> Result<SnapshotRef> {
        let snapshot = ProfileSnapshot::capture(profile, summary);
        self.insert_snapshot(&snapshot)?;
        Ok(snapshot.reference)
    }

    fn load_snapshot(&self, reference: &SnapshotRef) -> Result<ProfileSnapshot> {
        let conn = self.lock();

        let row = conn
            .query_row(
                "SELECT id, reference, profile_id, summary, created_at, properties
                 FROM snapshots WHERE reference = ?1",
                [reference.as_str()],
                SnapshotRow::from_row,
            )
            .optional()?
            .ok_or_else(|| Error::SnapshotNotFound(reference.clone()))?;

        let mut stmt = conn.prepare(
            "SELECT unit_json FROM snapshot_units WHERE snapshot_id = ?1
             ORDER BY unit_id, id",
        )?;
        let documents = stmt
            .query_map([row.id], |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut units = documents
            .iter()
            .map(|json| serde_json::from_str::<InstallableUnit>(json))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        units.sort();

        let properties: BTreeMap<String, String> = serde_json::from_str(&row.properties)?;

        Ok(ProfileSnapshot {
            reference: row.reference,
            profile_id: row.profile_id,
            timestamp: row.timestamp,
            summary: row.summary,
            units,
            properties,
        })
    }

    fn list_snapshots(&self, profile_id: &str) -> Result<Vec<SnapshotRef>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT reference FROM snapshots WHERE profile_id = ?1 ORDER BY id DESC",
        )?;

        let references = stmt
            .query_map([profile_id], |row| row.get::<_, String>(0))?
            .map(|r| r.map(SnapshotRef::new))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(references)
    }

    fn location(&self) -> Url {
        self.location.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;
    use tempfile::NamedTempFile;

    fn create_test_repository() -> (NamedTempFile, SqliteRollbackRepository) {
        let temp_file = NamedTempFile::new().unwrap();
        let repository = SqliteRollbackRepository::open(temp_file.path()).unwrap();
        (temp_file, repository)
    }

    fn sample_profile() -> Profile {
        let mut profile = Profile::new("SDKProfile");
        profile.add_unit(InstallableUnit::new("b", Version::new(1, 0, 0)).singleton());
        profile.add_unit(InstallableUnit::new("a", Version::new(2, 0, 0)).property("k", "v"));
        profile
            .properties
            .insert("installFolder".to_string(), "/opt/sdk".to_string());
        profile
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let (_temp, repository) = create_test_repository();
        let profile = sample_profile();

        let reference = repository.record_snapshot(&profile, "before update").unwrap();
        let snapshot = repository.load_snapshot(&reference).unwrap();

        assert_eq!(snapshot.reference, reference);
        assert_eq!(snapshot.profile_id, "SDKProfile");
        assert_eq!(snapshot.summary, "before update");
        assert_eq!(snapshot.properties, profile.properties);

        let expected: Vec<InstallableUnit> = profile.units().cloned().collect();
        assert_eq!(snapshot.units, expected);
        assert!(snapshot.units[1].singleton);
        assert_eq!(snapshot.units[0].properties.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn test_snapshot_of_empty_profile() {
        let repository = SqliteRollbackRepository::open_in_memory().unwrap();
        let reference = repository
            .record_snapshot(&Profile::new("empty"), "initial")
            .unwrap();

        let snapshot = repository.load_snapshot(&reference).unwrap();
        assert!(snapshot.units.is_empty());
        assert!(snapshot.properties.is_empty());
    }

    #[test]
    fn test_unknown_snapshot() {
        let repository = SqliteRollbackRepository::open_in_memory().unwrap();
        let missing = SnapshotRef::new("does-not-exist");

        let err = repository.load_snapshot(&missing).unwrap_err();
        assert!(matches!(err, Error::SnapshotNotFound(r) if r == missing));
    }

    #[test]
    fn test_list_newest_first_per_profile() {
        let (_temp, repository) = create_test_repository();
        let profile = sample_profile();
        let other = Profile::new("other");

        let first = repository.record_snapshot(&profile, "one").unwrap();
        let foreign = repository.record_snapshot(&other, "other").unwrap();
        let second = repository.record_snapshot(&profile, "two").unwrap();

        let listed = repository.list_snapshots("SDKProfile").unwrap();
        assert_eq!(listed, vec![second, first]);
        assert_eq!(repository.list_snapshots("other").unwrap(), vec![foreign]);
        assert!(repository.list_snapshots("nobody").unwrap().is_empty());
        assert_eq!(repository.count().unwrap(), 3);
    }

    #[test]
    fn test_snapshots_survive_reopen() {
        let temp_file = NamedTempFile::new().unwrap();
        let reference = {
            let repository = SqliteRollbackRepository::open(temp_file.path()).unwrap();
            repository.record_snapshot(&sample_profile(), "persisted").unwrap()
        };

        let repository = SqliteRollbackRepository::open(temp_file.path()).unwrap();
        let snapshot = repository.load_snapshot(&reference).unwrap();
        assert_eq!(snapshot.units.len(), 2);
    }

    #[test]
    fn test_location() {
        let (temp, repository) = create_test_repository();
        let location = repository.location();
        assert_eq!(location.scheme(), "file");
        assert_eq!(location::to_file(&location).as_deref(), Some(temp.path()));

        let memory = SqliteRollbackRepository::open_in_memory().unwrap();
        assert_eq!(memory.location().as_str(), MEMORY_LOCATION);
    }
}
