use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use timeline::Animation;
use tracing::info;
use uuid::Uuid;

pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| std::env::temp_dir());
    base.join("flipbook")
}

pub fn default_db_path() -> PathBuf { app_data_dir().join("flipbook.db") }

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("animation `{0}` not found")]
    NotFound(String),

    #[error("animation `{name}` has an unreadable body: {source}")]
    Corrupt {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// SQLite-backed store of animation documents, keyed by name.
pub struct ProjectDb {
    conn: Connection,
    path: PathBuf,
}

impl ProjectDb {
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() { fs::create_dir_all(dir)?; }
        let conn = Connection::open(path)?;
        // Recommended PRAGMAs for local interactive app DB
        conn.pragma_update(None, "journal_mode", &"WAL")?;
        conn.pragma_update(None, "synchronous", &"NORMAL")?;
        conn.pragma_update(None, "foreign_keys", &"ON")?;
        apply_migrations(&conn)?;
        Ok(Self { conn, path: path.to_path_buf() })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self { conn, path: PathBuf::from(":memory:") })
    }

    pub fn connection(&self) -> &Connection { &self.conn }

    pub fn path(&self) -> &Path { &self.path }

    /// Inserts or replaces the animation with the same name. Returns its row id.
    pub fn save(&self, anim: &Animation) -> Result<String> {
        let body = anim.to_json()?;
        let now = chrono::Utc::now().timestamp();
        let existing: Option<String> = self
            .conn
            .query_row("SELECT id FROM animations WHERE name = ?1", params![anim.name], |row| row.get(0))
            .optional()?;
        let id = existing.unwrap_or_else(|| Uuid::new_v4().to_string());
        self.conn.execute(
            "INSERT INTO animations(id, name, body_json, item_count, end_time, created_at, updated_at) \
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?6) \
             ON CONFLICT(name) DO UPDATE SET body_json = excluded.body_json, item_count = excluded.item_count, \
             end_time = excluded.end_time, updated_at = excluded.updated_at",
            params![id, anim.name, body, anim.len() as i64, anim.end_time() as i64, now],
        )?;
        info!(name = %anim.name, items = anim.len(), "saved animation");
        Ok(id)
    }

    pub fn load(&self, name: &str) -> Result<Option<Animation>> {
        let body: Option<String> = self
            .conn
            .query_row("SELECT body_json FROM animations WHERE name = ?1", params![name], |row| row.get(0))
            .optional()?;
        let Some(body) = body else { return Ok(None) };
        let anim = Animation::from_json(&body).map_err(|source| StoreError::Corrupt { name: name.to_string(), source })?;
        Ok(Some(anim))
    }

    pub fn load_required(&self, name: &str) -> Result<Animation> {
        self.load(name)?.ok_or_else(|| StoreError::NotFound(name.to_string()).into())
    }

    pub fn list(&self) -> Result<Vec<AnimationRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, item_count, end_time, updated_at FROM animations ORDER BY updated_at DESC, name ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AnimationRow {
                id: row.get(0)?,
                name: row.get(1)?,
                item_count: row.get(2)?,
                end_time: row.get(3)?,
                updated_at: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows { out.push(r?); }
        Ok(out)
    }

    pub fn delete(&self, name: &str) -> Result<bool> {
        let n = self.conn.execute("DELETE FROM animations WHERE name = ?1", params![name])?;
        if n > 0 { info!(name, "deleted animation"); }
        Ok(n > 0)
    }
}

#[derive(Debug, Clone)]
pub struct AnimationRow {
    pub id: String,
    pub name: String,
    pub item_count: i64,
    pub end_time: i64,
    pub updated_at: i64,
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(include_str!("../migrations/V0001__init.sql"))?;
    conn.execute(
        "INSERT OR IGNORE INTO migrations(name, applied_at) VALUES(?1, strftime('%s','now'))",
        params!["V0001__init"],
    )?;
    Ok(())
}
