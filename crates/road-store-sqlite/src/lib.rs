use anyhow::Context;
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::{path::PathBuf, time::Duration};
use tokio::task;
use tracing::{debug, info};
use model::{format_timestamp, parse_timestamp, ProcessedReading, StoredRecord};
use road_store_core::{IngestError, RecordStore};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS processed_agent_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    road_state TEXT NOT NULL,
    x REAL NOT NULL,
    y REAL NOT NULL,
    z REAL NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    timestamp TEXT NOT NULL
);
"#;

const SELECT: &str =
    "SELECT id, road_state, x, y, z, latitude, longitude, timestamp FROM processed_agent_data";

const INSERT: &str = "INSERT INTO processed_agent_data (road_state, x, y, z, latitude, longitude, timestamp) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

#[derive(Clone, Debug)]
pub struct SqliteConfig {
    pub db_path: PathBuf,
    /// How long a session waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self { db_path: "road_hub.db".into(), busy_timeout: Duration::from_secs(5) }
    }
}

/// [`RecordStore`] over a SQLite file. Each call opens its own connection on
/// the blocking pool and drops it when the call returns.
#[derive(Clone)]
pub struct SqliteStore {
    cfg: SqliteConfig,
}

impl SqliteStore {
    /// Opens the database and creates `processed_agent_data` if it is missing.
    pub async fn open(cfg: SqliteConfig) -> anyhow::Result<Self> {
        let store = Self { cfg };
        store
            .session(|conn| Ok(conn.execute_batch(CREATE_TABLE)?))
            .await
            .with_context(|| format!("prepare table in {}", store.cfg.db_path.display()))?;
        info!(db = %store.cfg.db_path.display(), "sqlite store ready");
        Ok(store)
    }

    async fn session<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&mut Connection) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let cfg = self.cfg.clone();
        task::spawn_blocking(move || {
            let mut conn = Connection::open(&cfg.db_path)
                .with_context(|| format!("open {}", cfg.db_path.display()))?;
            conn.busy_timeout(cfg.busy_timeout)?;
            f(&mut conn)
        })
        .await?
    }
}

fn conversion_error(
    column: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, err.into())
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    let road_state: String = row.get(1)?;
    let ts: String = row.get(7)?;
    Ok(StoredRecord {
        id: row.get(0)?,
        road_state: road_state.parse().map_err(|e| conversion_error(1, e))?,
        x: row.get(2)?,
        y: row.get(3)?,
        z: row.get(4)?,
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        timestamp: parse_timestamp(&ts)
            .ok_or_else(|| conversion_error(7, format!("bad stored timestamp {ts:?}")))?,
    })
}

fn select_one(conn: &Connection, id: i64) -> anyhow::Result<Option<StoredRecord>> {
    let rec = conn
        .query_row(&format!("{SELECT} WHERE id = ?1"), params![id], row_to_record)
        .optional()?;
    Ok(rec)
}

fn select_all(conn: &Connection) -> anyhow::Result<Vec<StoredRecord>> {
    let mut stmt = conn.prepare(&format!("{SELECT} ORDER BY id"))?;
    let recs = stmt
        .query_map([], row_to_record)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(recs)
}

fn insert_all(conn: &mut Connection, items: &[ProcessedReading]) -> anyhow::Result<Vec<StoredRecord>> {
    let tx = conn.transaction()?;
    let mut out = Vec::with_capacity(items.len());
    {
        let mut stmt = tx.prepare(INSERT)?;
        for p in items {
            let a = &p.agent_data;
            let ts = format_timestamp(&a.timestamp)?;
            stmt.execute(params![
                p.road_state.as_str(),
                a.accelerometer.x,
                a.accelerometer.y,
                a.accelerometer.z,
                a.gps.latitude,
                a.gps.longitude,
                ts,
            ])?;
            out.push(StoredRecord::new(tx.last_insert_rowid(), p));
        }
    }
    tx.commit()?;
    Ok(out)
}

fn update_one(conn: &mut Connection, id: i64, p: &ProcessedReading) -> anyhow::Result<Option<StoredRecord>> {
    let a = &p.agent_data;
    let ts = format_timestamp(&a.timestamp)?;
    let tx = conn.transaction()?;
    let changed = tx.execute(
        "UPDATE processed_agent_data SET road_state = ?1, x = ?2, y = ?3, z = ?4, \
         latitude = ?5, longitude = ?6, timestamp = ?7 WHERE id = ?8",
        params![
            p.road_state.as_str(),
            a.accelerometer.x,
            a.accelerometer.y,
            a.accelerometer.z,
            a.gps.latitude,
            a.gps.longitude,
            ts,
            id,
        ],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    let rec = select_one(&tx, id)?;
    tx.commit()?;
    Ok(rec)
}

fn delete_one(conn: &mut Connection, id: i64) -> anyhow::Result<Option<StoredRecord>> {
    let tx = conn.transaction()?;
    let Some(rec) = select_one(&tx, id)? else {
        return Ok(None);
    };
    tx.execute("DELETE FROM processed_agent_data WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(Some(rec))
}

#[async_trait::async_trait]
impl RecordStore for SqliteStore {
    async fn create_batch(&self, items: Vec<ProcessedReading>) -> Result<Vec<StoredRecord>, IngestError> {
        let n = items.len();
        let recs = self
            .session(move |conn| insert_all(conn, &items))
            .await
            .context("insert batch")?;
        debug!(rows = n, "batch inserted");
        Ok(recs)
    }

    async fn get_by_id(&self, id: i64) -> Result<StoredRecord, IngestError> {
        self.session(move |conn| select_one(conn, id))
            .await?
            .ok_or(IngestError::NotFound(id))
    }

    async fn list(&self) -> Result<Vec<StoredRecord>, IngestError> {
        Ok(self.session(|conn| select_all(conn)).await?)
    }

    async fn update_by_id(&self, id: i64, item: ProcessedReading) -> Result<StoredRecord, IngestError> {
        self.session(move |conn| update_one(conn, id, &item))
            .await
            .with_context(|| format!("update {id}"))?
            .ok_or(IngestError::NotFound(id))
    }

    async fn delete_by_id(&self, id: i64) -> Result<StoredRecord, IngestError> {
        self.session(move |conn| delete_one(conn, id))
            .await
            .with_context(|| format!("delete {id}"))?
            .ok_or(IngestError::NotFound(id))
    }
}
