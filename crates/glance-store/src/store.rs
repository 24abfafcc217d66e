//! Durable identity store.
//!
//! Registered identities (name, embedding, dedup hash) and the archived-face
//! audit trail, both in SQLite. Registration dedups exactly by embedding
//! content hash; archival is idempotent per face identifier. The archive is
//! write-only from the recognition path.

use chrono::Utc;
use glance_core::{Embedding, Identity};
use rusqlite::params;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio_rusqlite::Connection;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("identity already registered")]
    AlreadyRegistered,
    #[error("sqlite: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
}

/// Outcome of an archival attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Inserted,
    /// The identifier was already archived; the attempt was a no-op.
    AlreadyArchived,
}

/// Handle to the SQLite-backed store. Cheap to clone; all clones share one
/// connection, acquired once and released on drop — never opened ad hoc
/// inside helper calls.
#[derive(Clone)]
pub struct IdentityStore {
    conn: Connection,
}

impl IdentityStore {
    /// Open (or create) the database at `path` and ensure the schema.
    pub async fn open(path: &std::path::Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path.to_path_buf()).await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory database, for tests.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TABLE IF NOT EXISTS identities (
                        id             INTEGER PRIMARY KEY,
                        name           TEXT NOT NULL,
                        embedding      BLOB NOT NULL,
                        embedding_hash TEXT NOT NULL UNIQUE,
                        created_at     TEXT NOT NULL
                    );
                    CREATE TABLE IF NOT EXISTS archived_faces (
                        id         INTEGER PRIMARY KEY,
                        face_id    TEXT NOT NULL UNIQUE,
                        image      BLOB NOT NULL,
                        created_at TEXT NOT NULL
                    );",
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Register a new identity. Rejects an embedding whose content hash is
    /// already present — the exact-dedup guard, distinct from
    /// recognition-time similarity matching.
    pub async fn register_identity(
        &self,
        name: &str,
        embedding: &Embedding,
    ) -> Result<i64, StoreError> {
        let name = name.to_string();
        let bytes = embedding.to_le_bytes();
        let hash = embedding_hash(&bytes);
        let created_at = Utc::now().to_rfc3339();

        let result = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO identities (name, embedding, embedding_hash, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![name, bytes, hash, created_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await;

        match result {
            Ok(id) => Ok(id),
            Err(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _)))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::AlreadyRegistered)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch every registered identity, in insertion (id) order.
    ///
    /// A row whose embedding blob does not decode as f32s is skipped with a
    /// warning — one corrupt row must not poison matching.
    pub async fn list_identities(&self) -> Result<Vec<Identity>, StoreError> {
        let identities = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT id, name, embedding FROM identities ORDER BY id")?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ))
                })?;

                let mut identities = Vec::new();
                for row in rows {
                    let (id, name, blob) = row?;
                    match Embedding::from_le_bytes(&blob) {
                        Some(embedding) => identities.push(Identity { id, name, embedding }),
                        None => {
                            tracing::warn!(
                                id,
                                name = %name,
                                blob_len = blob.len(),
                                "embedding blob is not a valid f32 sequence; skipping identity"
                            );
                        }
                    }
                }
                Ok(identities)
            })
            .await?;
        Ok(identities)
    }

    /// Archive a face crop under its identifier, idempotently: a second
    /// attempt for the same identifier is a no-op outcome, not an error.
    pub async fn archive_face(
        &self,
        face_id: &str,
        image: &[u8],
    ) -> Result<ArchiveOutcome, StoreError> {
        let face_id = face_id.to_string();
        let image = image.to_vec();
        let created_at = Utc::now().to_rfc3339();

        let inserted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "INSERT OR IGNORE INTO archived_faces (face_id, image, created_at)
                     VALUES (?1, ?2, ?3)",
                    params![face_id, image, created_at],
                )?;
                Ok(changed > 0)
            })
            .await?;

        Ok(if inserted {
            ArchiveOutcome::Inserted
        } else {
            ArchiveOutcome::AlreadyArchived
        })
    }

    /// Number of archived faces. The archive is an audit trail — this is
    /// for observability, never for matching.
    pub async fn archived_face_count(&self) -> Result<i64, StoreError> {
        let count = self
            .conn
            .call(|conn| {
                let count =
                    conn.query_row("SELECT COUNT(*) FROM archived_faces", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }
}

/// Deterministic content hash of the embedding bytes (SHA-256 hex).
fn embedding_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
