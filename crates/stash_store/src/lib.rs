//! SQLite-backed record store for container records, installed modules and
//! the void audit log.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use stash_core::{
    decode_contents, encode_contents, ActorId, ContainerId, ContainerRecord, InstalledModule,
    ModuleId, NewVoidEntry, Owner, RecordStore, SocketIndex, StashError, VoidEntry,
};

pub const SCHEMA_VERSION: i64 = 1;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One row of the containers table, without contents or sockets.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSummary {
    pub id: ContainerId,
    pub type_id: String,
    pub owner_name: Option<String>,
    pub socket_count: usize,
    pub updated_at_ms: i64,
}

pub struct SqliteStore {
    path: PathBuf,
    conn: Connection,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.path).finish()
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and bring its schema up to date.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create db dir: {}", dir.display()))?;
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("open sqlite db: {}", path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        migrate(&conn).with_context(|| format!("migrate sqlite db: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "record store opened");
        Ok(Self { path, conn })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema_version(&self) -> anyhow::Result<i64> {
        Ok(self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    pub fn list_containers(&self) -> anyhow::Result<Vec<ContainerSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.type_id, c.owner_name, c.updated_at_ms,
                    (SELECT COUNT(*) FROM container_modules m WHERE m.container_id = c.id)
             FROM containers c ORDER BY c.updated_at_ms DESC, c.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, type_id, owner_name, updated_at_ms, sockets) = row?;
            out.push(ContainerSummary {
                id: ContainerId::parse(&id)?,
                type_id,
                owner_name,
                socket_count: usize::try_from(sockets).unwrap_or_default(),
                updated_at_ms,
            });
        }
        Ok(out)
    }

    fn load_record(&self, id: ContainerId) -> anyhow::Result<Option<ContainerRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT type_id, contents, owner_id, owner_name, created_at_ms, updated_at_ms
                 FROM containers WHERE id = ?1",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            )
            .optional()?;
        let Some((type_id, contents, owner_id, owner_name, created_at_ms, updated_at_ms)) = row
        else {
            return Ok(None);
        };

        Ok(Some(ContainerRecord {
            id,
            type_id,
            owner: owner_from_columns(id, owner_id.as_deref(), owner_name),
            created_at_ms,
            updated_at_ms,
            contents: decode_contents(&contents),
            sockets: self.load_sockets(id)?,
        }))
    }

    fn load_sockets(
        &self,
        id: ContainerId,
    ) -> anyhow::Result<BTreeMap<SocketIndex, InstalledModule>> {
        let mut stmt = self.conn.prepare(
            "SELECT socket_index, module_id, snapshot, state
             FROM container_modules WHERE container_id = ?1 ORDER BY socket_index",
        )?;
        let rows = stmt.query_map([id.to_string()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
                row.get::<_, Option<Vec<u8>>>(3)?,
            ))
        })?;
        let mut sockets = BTreeMap::new();
        for row in rows {
            let (index, module_id, snapshot, state) = row?;
            let index = SocketIndex::try_from(index)
                .with_context(|| format!("socket index {index} of container {id}"))?;
            sockets.insert(
                index,
                InstalledModule {
                    module_id: ModuleId::parse(&module_id)?,
                    snapshot,
                    state,
                },
            );
        }
        Ok(sockets)
    }

    /// Upsert the container row and replace its socket rows in one transaction.
    fn write_record(&mut self, record: &ContainerRecord) -> anyhow::Result<()> {
        let id = record.id.to_string();
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO containers (id, type_id, contents, owner_id, owner_name, created_at_ms, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
               type_id = excluded.type_id,
               contents = excluded.contents,
               owner_id = excluded.owner_id,
               owner_name = excluded.owner_name,
               updated_at_ms = excluded.updated_at_ms",
            (
                &id,
                &record.type_id,
                encode_contents(&record.contents),
                record.owner.as_ref().map(|o| o.id.to_string()),
                record.owner.as_ref().map(|o| o.name.as_str()),
                record.created_at_ms,
                record.updated_at_ms,
            ),
        )?;
        tx.execute(
            "DELETE FROM container_modules WHERE container_id = ?1",
            [&id],
        )?;
        for (index, module) in &record.sockets {
            tx.execute(
                "INSERT INTO container_modules (container_id, socket_index, module_id, snapshot, state)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    &id,
                    i64::from(*index),
                    module.module_id.to_string(),
                    &module.snapshot,
                    module.state.as_deref(),
                ),
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_void_entry(&mut self, entry: &NewVoidEntry) -> anyhow::Result<i64> {
        self.conn.execute(
            "INSERT INTO void_audit (created_at_ms, actor_id, actor_name, container_id, container_type,
                                     module_id, item_kind, amount, payload, location)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            (
                now_ms(),
                entry.actor.as_ref().map(|a| a.id.to_string()),
                entry.actor.as_ref().map(|a| a.name.as_str()),
                entry.container_id.to_string(),
                &entry.container_type,
                entry.module_id.to_string(),
                &entry.item_kind,
                i64::from(entry.amount),
                &entry.payload,
                entry.location.as_ref().map(ToString::to_string),
            ),
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn query_void_entries(
        &self,
        actor: Option<ActorId>,
        include_recovered: bool,
    ) -> anyhow::Result<Vec<VoidEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VOID_COLUMNS}
             WHERE (?1 IS NULL OR actor_id = ?1) AND (?2 OR recovered_at_ms IS NULL)
             ORDER BY id DESC"
        ))?;
        let rows = stmt.query_map(
            (actor.map(|a| a.to_string()), include_recovered),
            RawVoidRow::from_row,
        )?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_entry()?);
        }
        Ok(out)
    }

    fn query_void_entry(&self, id: i64) -> anyhow::Result<Option<VoidEntry>> {
        let raw = self
            .conn
            .query_row(
                &format!("{VOID_COLUMNS} WHERE id = ?1"),
                [id],
                RawVoidRow::from_row,
            )
            .optional()?;
        raw.map(RawVoidRow::into_entry).transpose()
    }

    /// `None` when the row does not exist.
    fn set_recovered(&mut self, id: i64, recovered_by: &str) -> anyhow::Result<Option<bool>> {
        let tx = self.conn.transaction()?;
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM void_audit WHERE id = ?1)",
            [id],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(None);
        }
        let n = tx.execute(
            "UPDATE void_audit SET recovered_at_ms = ?2, recovered_by = ?3
             WHERE id = ?1 AND recovered_at_ms IS NULL",
            (id, now_ms(), recovered_by),
        )?;
        tx.commit()?;
        Ok(Some(n == 1))
    }
}

fn owner_from_columns(
    container: ContainerId,
    owner_id: Option<&str>,
    owner_name: Option<String>,
) -> Option<Owner> {
    let raw = owner_id?;
    match ActorId::parse(raw) {
        Ok(id) => Some(Owner {
            id,
            name: owner_name.unwrap_or_default(),
        }),
        Err(_) => {
            tracing::warn!(container = %container, owner_id = raw, "unreadable owner id, dropping owner");
            None
        }
    }
}

const VOID_COLUMNS: &str = "SELECT id, created_at_ms, actor_id, actor_name, container_id, container_type,
        module_id, item_kind, amount, payload, location, recovered_at_ms, recovered_by
 FROM void_audit";

struct RawVoidRow {
    id: i64,
    created_at_ms: i64,
    actor_id: Option<String>,
    actor_name: Option<String>,
    container_id: String,
    container_type: String,
    module_id: String,
    item_kind: String,
    amount: i64,
    payload: Vec<u8>,
    location: Option<String>,
    recovered_at_ms: Option<i64>,
    recovered_by: Option<String>,
}

impl RawVoidRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at_ms: row.get(1)?,
            actor_id: row.get(2)?,
            actor_name: row.get(3)?,
            container_id: row.get(4)?,
            container_type: row.get(5)?,
            module_id: row.get(6)?,
            item_kind: row.get(7)?,
            amount: row.get(8)?,
            payload: row.get(9)?,
            location: row.get(10)?,
            recovered_at_ms: row.get(11)?,
            recovered_by: row.get(12)?,
        })
    }

    fn into_entry(self) -> anyhow::Result<VoidEntry> {
        let id = self.id;
        Ok(VoidEntry {
            id,
            created_at_ms: self.created_at_ms,
            actor_id: self.actor_id.as_deref().map(ActorId::parse).transpose()?,
            actor_name: self.actor_name,
            container_id: ContainerId::parse(&self.container_id)?,
            container_type: self.container_type,
            module_id: ModuleId::parse(&self.module_id)?,
            item_kind: self.item_kind,
            amount: u32::try_from(self.amount)
                .with_context(|| format!("void audit {id} amount {}", self.amount))?,
            payload: self.payload,
            location: self.location,
            recovered_at_ms: self.recovered_at_ms,
            recovered_by: self.recovered_by,
        })
    }
}

fn store_error(op: &'static str) -> impl FnOnce(anyhow::Error) -> StashError {
    move |err| {
        tracing::error!(op, error = %format!("{err:#}"), "record store failure");
        StashError::store(op, err)
    }
}

impl RecordStore for SqliteStore {
    fn load(&mut self, id: ContainerId) -> stash_core::Result<Option<ContainerRecord>> {
        self.load_record(id).map_err(store_error("load container"))
    }

    fn insert(&mut self, record: &mut ContainerRecord) -> stash_core::Result<()> {
        let now = now_ms();
        record.created_at_ms = now;
        record.updated_at_ms = now;
        self.write_record(record)
            .map_err(store_error("insert container"))?;
        tracing::info!(container = %record.id, type_id = %record.type_id, "container inserted");
        Ok(())
    }

    fn save(&mut self, record: &mut ContainerRecord) -> stash_core::Result<()> {
        record.updated_at_ms = now_ms();
        self.write_record(record)
            .map_err(store_error("save container"))?;
        tracing::debug!(
            container = %record.id,
            sockets = record.sockets.len(),
            "container saved"
        );
        Ok(())
    }

    fn append_void_entry(&mut self, entry: &NewVoidEntry) -> stash_core::Result<i64> {
        self.insert_void_entry(entry)
            .map_err(store_error("append void entry"))
    }

    fn void_entry(&mut self, id: i64) -> stash_core::Result<Option<VoidEntry>> {
        self.query_void_entry(id)
            .map_err(store_error("read void entry"))
    }

    fn void_entries(
        &mut self,
        actor: Option<ActorId>,
        include_recovered: bool,
    ) -> stash_core::Result<Vec<VoidEntry>> {
        self.query_void_entries(actor, include_recovered)
            .map_err(store_error("list void entries"))
    }

    fn mark_recovered(&mut self, id: i64, recovered_by: &str) -> stash_core::Result<bool> {
        self.set_recovered(id, recovered_by)
            .map_err(store_error("mark recovered"))?
            .ok_or(StashError::AuditEntryNotFound(id))
    }
}

fn migrate(conn: &Connection) -> anyhow::Result<()> {
    let v: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if v < 1 {
        conn.execute_batch(
            r"
CREATE TABLE IF NOT EXISTS containers (
  id TEXT PRIMARY KEY,
  type_id TEXT NOT NULL,
  contents BLOB NOT NULL,
  owner_id TEXT,
  owner_name TEXT,
  created_at_ms INTEGER NOT NULL,
  updated_at_ms INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS container_modules (
  container_id TEXT NOT NULL REFERENCES containers(id) ON DELETE CASCADE,
  socket_index INTEGER NOT NULL,
  module_id TEXT NOT NULL,
  snapshot BLOB NOT NULL,
  state BLOB,
  PRIMARY KEY (container_id, socket_index)
);
CREATE INDEX IF NOT EXISTS idx_container_modules_module ON container_modules(module_id);

CREATE TABLE IF NOT EXISTS void_audit (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  created_at_ms INTEGER NOT NULL,
  actor_id TEXT,
  actor_name TEXT,
  container_id TEXT NOT NULL,
  container_type TEXT NOT NULL,
  module_id TEXT NOT NULL,
  item_kind TEXT NOT NULL,
  amount INTEGER NOT NULL,
  payload BLOB NOT NULL,
  location TEXT,
  recovered_at_ms INTEGER,
  recovered_by TEXT
);
CREATE INDEX IF NOT EXISTS idx_void_audit_actor ON void_audit(actor_id, id);
",
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        tracing::info!(version = SCHEMA_VERSION, "record store schema created");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stash.db");
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
        drop(store);
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn open_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("stash.db");
        let store = SqliteStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn unreadable_owner_id_is_dropped() {
        let owner = owner_from_columns(
            stash_core::test_fixtures::container(1),
            Some("not-a-uuid"),
            Some("ana".to_string()),
        );
        assert_eq!(owner, None);
    }
}
