// Dedicated writer thread
//
// Owns the SQLite connection. All store operations arrive as commands on
// a channel and reply over oneshot, so mutations are serialized and no
// lock is ever held across an await on the async side.

use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tailbatch_core::{DeferredRequest, Priority, RequestId};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::records::{TransmissionRecord, TransmissionStats};

pub(crate) type Reply<T> = tokio::sync::oneshot::Sender<Result<T>>;

pub(crate) enum Command {
    Save(DeferredRequest, Reply<()>),
    FetchBatch(usize, Reply<Vec<DeferredRequest>>),
    Delete(Vec<RequestId>, Reply<()>),
    DeleteExpired(Reply<u64>),
    Count(Reply<u64>),
    TotalPayloadSize(Reply<u64>),
    Clear(Reply<()>),
    LogTransmission(TransmissionRecord, Reply<()>),
    TransmissionStats(DateTime<Utc>, Reply<TransmissionStats>),
    PruneLog(DateTime<Utc>, Reply<u64>),
    Close(Reply<()>),
}

pub(crate) fn run(mut conn: Connection, rx: Receiver<Command>) {
    while let Ok(command) = rx.recv() {
        match command {
            Command::Save(request, reply) => {
                let _ = reply.send(save(&conn, &request));
            }
            Command::FetchBatch(limit, reply) => {
                let _ = reply.send(fetch_batch(&conn, limit));
            }
            Command::Delete(ids, reply) => {
                let _ = reply.send(delete(&mut conn, &ids));
            }
            Command::DeleteExpired(reply) => {
                let _ = reply.send(delete_expired(&conn, Utc::now()));
            }
            Command::Count(reply) => {
                let _ = reply.send(count(&conn));
            }
            Command::TotalPayloadSize(reply) => {
                let _ = reply.send(total_payload_size(&conn));
            }
            Command::Clear(reply) => {
                let _ = reply.send(clear(&conn));
            }
            Command::LogTransmission(record, reply) => {
                let _ = reply.send(log_transmission(&conn, &record));
            }
            Command::TransmissionStats(since, reply) => {
                let _ = reply.send(transmission_stats(&conn, since));
            }
            Command::PruneLog(older_than, reply) => {
                let _ = reply.send(prune_log(&conn, older_than));
            }
            Command::Close(reply) => {
                let _ = reply.send(Ok(()));
                break;
            }
        }
    }
    debug!("store worker stopped");
}

/// Apply pragmas and create tables. Runs on the opening thread, before the
/// worker takes the connection over.
pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    // journal_mode returns a result row; execute() would reject it.
    conn.query_row("PRAGMA journal_mode = WAL", [], |_row| Ok(()))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS deferred_requests (
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            method TEXT NOT NULL,
            headers TEXT,
            body BLOB,
            priority INTEGER NOT NULL,
            enqueued_at REAL NOT NULL,
            max_deferral_time REAL NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_deferred_requests_priority
            ON deferred_requests(priority);
        CREATE INDEX IF NOT EXISTS idx_deferred_requests_enqueued_at
            ON deferred_requests(enqueued_at);
        CREATE TABLE IF NOT EXISTS transmission_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp REAL NOT NULL,
            request_count INTEGER NOT NULL,
            total_bytes INTEGER NOT NULL,
            network_type TEXT,
            is_charging INTEGER,
            trigger_reason TEXT
        );",
    )?;
    Ok(())
}

fn epoch_secs(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1_000_000.0
}

fn from_epoch_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp_micros((secs * 1_000_000.0).round() as i64)
}

fn save(conn: &Connection, request: &DeferredRequest) -> Result<()> {
    let headers = serde_json::to_string(&request.headers)?;
    conn.execute(
        "INSERT OR REPLACE INTO deferred_requests
            (id, url, method, headers, body, priority, enqueued_at, max_deferral_time)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            request.id,
            request.url,
            request.method,
            headers,
            request.body,
            request.priority.as_i64(),
            epoch_secs(request.enqueued_at),
            request.max_deferral.as_secs_f64(),
        ],
    )?;
    Ok(())
}

struct RawRow {
    id: String,
    url: String,
    method: String,
    headers: Option<String>,
    body: Option<Vec<u8>>,
    priority: i64,
    enqueued_at: f64,
    max_deferral: f64,
}

fn fetch_batch(conn: &Connection, limit: usize) -> Result<Vec<DeferredRequest>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, url, method, headers, body, priority, enqueued_at, max_deferral_time
         FROM deferred_requests
         ORDER BY priority ASC, enqueued_at ASC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(RawRow {
            id: row.get(0)?,
            url: row.get(1)?,
            method: row.get(2)?,
            headers: row.get(3)?,
            body: row.get(4)?,
            priority: row.get(5)?,
            enqueued_at: row.get(6)?,
            max_deferral: row.get(7)?,
        })
    })?;

    let mut batch = Vec::new();
    for row in rows {
        batch.push(decode_row(row?)?);
    }
    Ok(batch)
}

fn decode_row(row: RawRow) -> Result<DeferredRequest> {
    let priority = Priority::from_i64(row.priority)
        .ok_or_else(|| StoreError::corrupt(&row.id, format!("priority {}", row.priority)))?;
    let enqueued_at = from_epoch_secs(row.enqueued_at)
        .ok_or_else(|| StoreError::corrupt(&row.id, "enqueued_at out of range"))?;
    if !row.max_deferral.is_finite() || row.max_deferral < 0.0 {
        return Err(StoreError::corrupt(&row.id, "invalid max_deferral_time"));
    }
    let headers: HashMap<String, String> = match row.headers {
        Some(text) if !text.is_empty() => serde_json::from_str(&text)?,
        _ => HashMap::new(),
    };
    Ok(DeferredRequest {
        id: row.id,
        url: row.url,
        method: row.method,
        headers,
        body: row.body.unwrap_or_default(),
        priority,
        enqueued_at,
        max_deferral: Duration::from_secs_f64(row.max_deferral),
    })
}

fn delete(conn: &mut Connection, ids: &[RequestId]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached("DELETE FROM deferred_requests WHERE id = ?1")?;
        for id in ids {
            stmt.execute(params![id])?;
        }
    }
    tx.commit()?;
    Ok(())
}

fn delete_expired(conn: &Connection, now: DateTime<Utc>) -> Result<u64> {
    let removed = conn.execute(
        "DELETE FROM deferred_requests WHERE enqueued_at + max_deferral_time < ?1",
        params![epoch_secs(now)],
    )?;
    Ok(removed as u64)
}

fn count(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM deferred_requests", [], |row| {
        row.get(0)
    })?;
    Ok(n as u64)
}

// Uses stored column lengths; close enough to the derived payload size for
// the forcing threshold, and computable without decoding rows.
fn total_payload_size(conn: &Connection) -> Result<u64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(LENGTH(url) + LENGTH(COALESCE(headers, '')) + LENGTH(COALESCE(body, x''))), 0)
         FROM deferred_requests",
        [],
        |row| row.get(0),
    )?;
    Ok(total.max(0) as u64)
}

fn clear(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM deferred_requests", [])?;
    Ok(())
}

fn log_transmission(conn: &Connection, record: &TransmissionRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO transmission_log
            (timestamp, request_count, total_bytes, network_type, is_charging, trigger_reason)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            epoch_secs(record.timestamp),
            record.request_count as i64,
            record.total_bytes as i64,
            record.network_type.as_str(),
            record.is_charging as i64,
            record.trigger_reason,
        ],
    )?;
    Ok(())
}

fn transmission_stats(conn: &Connection, since: DateTime<Utc>) -> Result<TransmissionStats> {
    let stats = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(request_count), 0), COALESCE(SUM(total_bytes), 0)
         FROM transmission_log WHERE timestamp >= ?1",
        params![epoch_secs(since)],
        |row| {
            Ok(TransmissionStats {
                batch_count: row.get::<_, i64>(0)? as u64,
                total_requests: row.get::<_, i64>(1)? as u64,
                total_bytes: row.get::<_, i64>(2)? as u64,
            })
        },
    )?;
    Ok(stats)
}

fn prune_log(conn: &Connection, older_than: DateTime<Utc>) -> Result<u64> {
    let removed = conn.execute(
        "DELETE FROM transmission_log WHERE timestamp < ?1",
        params![epoch_secs(older_than)],
    )?;
    Ok(removed as u64)
}
