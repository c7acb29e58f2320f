//! Vision queue: priority-ordered deferred requests.
//!
//! SQLite is the only source of truth. Rows are appended on enqueue and
//! updated in place on each transition; `QUEUE.md` is rendered from the
//! table and never read back.
//!
//! Dequeue order is a total order: priority descending, then timestamp
//! ascending, then insertion sequence ascending.

use super::types::{QueueStatus, VisionRequest, VisionStatus, VisionTrigger, generate_vision_id};
use crate::errors::{FacultyError, Result};
use crate::types::{db_timestamp, parse_db_timestamp};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use std::path::Path;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS vision_requests (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    trigger TEXT NOT NULL,
    trigger_reason TEXT NOT NULL,
    priority INTEGER NOT NULL CHECK (priority BETWEEN 0 AND 100),
    source_intel TEXT,
    context_notes TEXT NOT NULL DEFAULT '',
    requester TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'processing', 'completed')),
    claim_token TEXT,
    claimed_at TEXT,
    completed_at TEXT,
    archive_path TEXT
);
CREATE INDEX IF NOT EXISTS idx_vision_dequeue
    ON vision_requests(status, priority DESC, created_at, seq);
"#;

const SELECT_COLUMNS: &str = "seq, id, created_at, trigger, trigger_reason, priority, \
     source_intel, context_notes, requester, status, claim_token, claimed_at, \
     completed_at, archive_path";

const DEQUEUE_ORDER: &str = "priority DESC, created_at ASC, seq ASC";

/// SQLite-backed vision queue
pub struct VisionQueue {
    conn: Connection,
}

impl std::fmt::Debug for VisionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionQueue")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl VisionQueue {
    /// Open (creating if needed) the queue database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FacultyError::queue_with_source(
                    format!("failed to create queue directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            FacultyError::queue_with_source(
                format!("failed to open queue at {}", path.display()),
                e,
            )
        })?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| FacultyError::queue_with_source("failed to set busy timeout", e))?;
        Self::apply_schema(&conn)?;

        tracing::debug!(path = %path.display(), "Vision queue initialized");
        Ok(Self { conn })
    }

    /// Queue that lives only as long as this value (preview runs, tests)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FacultyError::queue_with_source("failed to open in-memory queue", e))?;
        Self::apply_schema(&conn)?;
        Ok(Self { conn })
    }

    fn apply_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| FacultyError::queue_with_source("failed to apply queue schema", e))?;
        Ok(())
    }

    /// Append a request as `pending` and return its id.
    ///
    /// An empty id is replaced by a generated `VIS-` id; status and claim
    /// bookkeeping on the input are ignored.
    pub fn enqueue(&self, request: &VisionRequest) -> Result<String> {
        let id = if request.id.trim().is_empty() {
            generate_vision_id(request.timestamp)
        } else {
            request.id.clone()
        };
        let priority = request.priority.min(100);

        self.conn
            .execute(
                r#"
                INSERT INTO vision_requests
                (id, created_at, trigger, trigger_reason, priority, source_intel,
                 context_notes, requester, status)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending')
                "#,
                params![
                    id,
                    db_timestamp(request.timestamp),
                    request.trigger.as_str(),
                    request.trigger_reason,
                    priority,
                    request.source_intel,
                    request.context_notes,
                    request.requester,
                ],
            )
            .map_err(|e| {
                FacultyError::queue_with_source(format!("failed to enqueue vision {id}"), e)
            })?;

        tracing::info!(
            vision_id = %id,
            priority,
            trigger = request.trigger.as_str(),
            "Vision enqueued"
        );
        Ok(id)
    }

    /// Claim the next pending request, moving it to `processing`.
    ///
    /// Runs in an immediate transaction and only updates a row that is still
    /// `pending`, so two processes never claim the same request.
    pub fn dequeue(&mut self) -> Result<Option<VisionRequest>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| FacultyError::queue_with_source("failed to begin dequeue", e))?;

        let candidate: Option<String> = tx
            .query_row(
                &format!(
                    "SELECT id FROM vision_requests WHERE status = 'pending' \
                     ORDER BY {DEQUEUE_ORDER} LIMIT 1"
                ),
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| FacultyError::queue_with_source("failed to select next vision", e))?;

        let Some(id) = candidate else {
            tracing::debug!("Vision queue empty");
            return Ok(None);
        };

        let token = uuid::Uuid::new_v4().to_string();
        let claimed = tx
            .execute(
                r#"
                UPDATE vision_requests
                SET status = 'processing', claim_token = ?2, claimed_at = ?3
                WHERE id = ?1 AND status = 'pending'
                "#,
                params![id, token, db_timestamp(Utc::now())],
            )
            .map_err(|e| FacultyError::queue_with_source(format!("failed to claim {id}"), e))?;

        if claimed != 1 {
            // Lost the compare-and-swap; leave the row to whoever won.
            tracing::warn!(vision_id = %id, "Vision claimed by another process");
            return Ok(None);
        }

        let request = Self::fetch(&tx, &id)?;
        tx.commit()
            .map_err(|e| FacultyError::queue_with_source("failed to commit dequeue", e))?;

        if let Some(req) = &request {
            tracing::info!(vision_id = %req.id, priority = req.priority, "Vision dequeued");
        }
        Ok(request)
    }

    /// Re-claim at most `limit` `processing` requests whose claim is older
    /// than `lease`, in dequeue order.
    ///
    /// The requests stay `processing` (status never moves backward); they
    /// get a fresh claim token so the caller can re-attempt them. Expired
    /// requests past `limit` keep their old claim until a later call.
    pub fn reclaim_expired(
        &mut self,
        lease: chrono::Duration,
        limit: usize,
    ) -> Result<Vec<VisionRequest>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let now = Utc::now();
        let cutoff = db_timestamp(now - lease);

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| FacultyError::queue_with_source("failed to begin reclaim", e))?;

        let expired: Vec<String> = {
            let mut stmt = tx
                .prepare(&format!(
                    "SELECT id FROM vision_requests \
                     WHERE status = 'processing' AND (claimed_at IS NULL OR claimed_at <= ?1) \
                     ORDER BY {DEQUEUE_ORDER} LIMIT ?2"
                ))
                .map_err(|e| FacultyError::queue_with_source("failed to prepare reclaim", e))?;
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let rows = stmt
                .query_map(params![cutoff, limit], |row| row.get(0))
                .map_err(|e| FacultyError::queue_with_source("failed to query expired claims", e))?;
            rows.collect::<std::result::Result<_, _>>()
                .map_err(|e| FacultyError::queue_with_source("failed to read expired claims", e))?
        };

        let mut reclaimed = Vec::with_capacity(expired.len());
        for id in expired {
            let token = uuid::Uuid::new_v4().to_string();
            let updated = tx
                .execute(
                    r#"
                    UPDATE vision_requests
                    SET claim_token = ?2, claimed_at = ?3
                    WHERE id = ?1 AND status = 'processing'
                    "#,
                    params![id, token, db_timestamp(now)],
                )
                .map_err(|e| {
                    FacultyError::queue_with_source(format!("failed to reclaim {id}"), e)
                })?;
            if updated == 1
                && let Some(req) = Self::fetch(&tx, &id)?
            {
                tracing::warn!(vision_id = %id, "Reclaimed vision with expired lease");
                reclaimed.push(req);
            }
        }

        tx.commit()
            .map_err(|e| FacultyError::queue_with_source("failed to commit reclaim", e))?;
        Ok(reclaimed)
    }

    /// Move a `processing` request to `completed`, recording its archive path.
    ///
    /// `claim_token` must be the token handed out by the `dequeue` or
    /// `reclaim_expired` that gave the caller this request; a claimant whose
    /// lease was reclaimed gets `StaleClaim`. Fails with `InvalidTransition`
    /// from any other status and with a queue error for an unknown id.
    pub fn mark_completed(
        &mut self,
        vision_id: &str,
        claim_token: &str,
        archive_path: &str,
    ) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| FacultyError::queue_with_source("failed to begin completion", e))?;

        let row: Option<(String, Option<String>)> = tx
            .query_row(
                "SELECT status, claim_token FROM vision_requests WHERE id = ?1",
                params![vision_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| {
                FacultyError::queue_with_source(format!("failed to read status of {vision_id}"), e)
            })?;

        let Some((status, current_token)) = row else {
            return Err(FacultyError::queue(format!("unknown vision id {vision_id}")));
        };
        if status != VisionStatus::Processing.as_str() {
            return Err(FacultyError::InvalidTransition {
                vision_id: vision_id.to_string(),
                from: status,
                to: VisionStatus::Completed.as_str().to_string(),
            });
        }
        if current_token.as_deref() != Some(claim_token) {
            tracing::warn!(vision_id, "Completion rejected, claim was reclaimed");
            return Err(FacultyError::StaleClaim {
                vision_id: vision_id.to_string(),
            });
        }

        let updated = tx
            .execute(
                r#"
                UPDATE vision_requests
                SET status = 'completed', completed_at = ?2, archive_path = ?3
                WHERE id = ?1 AND status = 'processing' AND claim_token = ?4
                "#,
                params![vision_id, db_timestamp(Utc::now()), archive_path, claim_token],
            )
            .map_err(|e| {
                FacultyError::queue_with_source(format!("failed to complete {vision_id}"), e)
            })?;
        if updated != 1 {
            return Err(FacultyError::StaleClaim {
                vision_id: vision_id.to_string(),
            });
        }
        tx.commit()
            .map_err(|e| FacultyError::queue_with_source("failed to commit completion", e))?;

        tracing::info!(vision_id, archive_path, "Vision completed");
        Ok(())
    }

    /// Counts by status
    pub fn status(&self) -> Result<QueueStatus> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM vision_requests GROUP BY status")
            .map_err(|e| FacultyError::queue_with_source("failed to prepare status query", e))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| FacultyError::queue_with_source("failed to query status", e))?;

        let mut status = QueueStatus::default();
        for row in rows {
            let (name, count) =
                row.map_err(|e| FacultyError::queue_with_source("failed to read status", e))?;
            let count = usize::try_from(count).unwrap_or(0);
            status.total += count;
            match VisionStatus::parse(&name) {
                Some(VisionStatus::Pending) => status.pending += count,
                Some(VisionStatus::Processing) => status.processing += count,
                Some(VisionStatus::Completed) => status.completed += count,
                None => tracing::warn!(status = %name, "Unknown status in vision queue"),
            }
        }
        Ok(status)
    }

    /// Look up one request by id
    pub fn get(&self, vision_id: &str) -> Result<Option<VisionRequest>> {
        Self::fetch(&self.conn, vision_id)
    }

    /// Requests in dequeue order, optionally filtered by status
    pub fn list(&self, status: Option<VisionStatus>) -> Result<Vec<VisionRequest>> {
        let sql = match status {
            Some(_) => format!(
                "SELECT {SELECT_COLUMNS} FROM vision_requests WHERE status = ?1 ORDER BY {DEQUEUE_ORDER}"
            ),
            None => format!("SELECT {SELECT_COLUMNS} FROM vision_requests ORDER BY {DEQUEUE_ORDER}"),
        };
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| FacultyError::queue_with_source("failed to prepare list query", e))?;

        let rows = match status {
            Some(s) => stmt.query_map(params![s.as_str()], row_to_request),
            None => stmt.query_map([], row_to_request),
        }
        .map_err(|e| FacultyError::queue_with_source("failed to list visions", e))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| FacultyError::queue_with_source("failed to read vision row", e))
    }

    /// Markdown view of the queue, generated from the store
    pub fn render_markdown(&self) -> Result<String> {
        let status = self.status()?;
        let mut out = String::new();
        out.push_str("# Vision Queue\n\n");
        out.push_str(&format!(
            "_Generated {}. Do not edit; this file is rebuilt from the queue database._\n\n",
            Utc::now().format("%Y-%m-%d %H:%M UTC")
        ));
        out.push_str(&format!(
            "**Total:** {} | **Pending:** {} | **Processing:** {} | **Completed:** {}\n",
            status.total, status.pending, status.processing, status.completed
        ));

        for section in [
            VisionStatus::Pending,
            VisionStatus::Processing,
            VisionStatus::Completed,
        ] {
            let items = self.list(Some(section))?;
            out.push_str(&format!(
                "\n## {} ({})\n\n",
                capitalize(section.as_str()),
                items.len()
            ));
            if items.is_empty() {
                out.push_str("_None_\n");
                continue;
            }
            out.push_str("| Vision | Priority | Trigger | Reason | Requested |\n");
            out.push_str("|--------|----------|---------|--------|-----------|\n");
            for item in items {
                out.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    item.id,
                    item.priority,
                    item.trigger,
                    escape_cell(&item.trigger_reason),
                    item.timestamp.format("%Y-%m-%d %H:%M")
                ));
            }
        }
        Ok(out)
    }

    fn fetch(conn: &Connection, vision_id: &str) -> Result<Option<VisionRequest>> {
        conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM vision_requests WHERE id = ?1"),
            params![vision_id],
            row_to_request,
        )
        .optional()
        .map_err(|e| FacultyError::queue_with_source(format!("failed to load {vision_id}"), e))
    }
}

fn row_to_request(row: &Row<'_>) -> rusqlite::Result<VisionRequest> {
    let trigger: String = row.get(3)?;
    let status: String = row.get(9)?;
    let priority: i64 = row.get(5)?;
    Ok(VisionRequest {
        sequence: row.get(0)?,
        id: row.get(1)?,
        timestamp: parse_required(row.get::<_, String>(2)?),
        trigger: VisionTrigger::parse(&trigger).unwrap_or(VisionTrigger::Manual),
        trigger_reason: row.get(4)?,
        priority: u8::try_from(priority.clamp(0, 100)).unwrap_or(100),
        source_intel: row.get(6)?,
        context_notes: row.get(7)?,
        requester: row.get(8)?,
        status: VisionStatus::parse(&status).unwrap_or(VisionStatus::Pending),
        claim_token: row.get(10)?,
        claimed_at: row.get::<_, Option<String>>(11)?.and_then(|s| parse_db_timestamp(&s)),
        completed_at: row.get::<_, Option<String>>(12)?.and_then(|s| parse_db_timestamp(&s)),
        archive_path: row.get(13)?,
    })
}

fn parse_required(raw: String) -> DateTime<Utc> {
    parse_db_timestamp(&raw).unwrap_or_else(Utc::now)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(priority: u8, reason: &str) -> VisionRequest {
        VisionRequest::new(VisionTrigger::Manual, reason).with_priority(priority)
    }

    #[test]
    fn test_total_order_priority_then_fifo() {
        let mut queue = VisionQueue::in_memory().expect("queue");
        let ts = Utc::now();
        let mut ids = Vec::new();
        for (p, reason) in [(90, "first"), (50, "mid"), (90, "second"), (10, "low")] {
            let mut req = request(p, reason);
            req.timestamp = ts;
            ids.push(queue.enqueue(&req).expect("enqueue"));
        }

        let mut order = Vec::new();
        while let Some(req) = queue.dequeue().expect("dequeue") {
            assert_eq!(req.status, VisionStatus::Processing);
            assert!(req.claim_token.is_some());
            order.push(req.trigger_reason);
        }
        assert_eq!(order, vec!["first", "second", "mid", "low"]);
    }

    #[test]
    fn test_earlier_timestamp_wins_tie() {
        let mut queue = VisionQueue::in_memory().expect("queue");
        let now = Utc::now();
        let mut late = request(60, "late");
        late.timestamp = now;
        let mut early = request(60, "early");
        early.timestamp = now - chrono::Duration::minutes(5);
        queue.enqueue(&late).expect("enqueue");
        queue.enqueue(&early).expect("enqueue");

        let next = queue.dequeue().expect("dequeue").expect("item");
        assert_eq!(next.trigger_reason, "early");
    }

    #[test]
    fn test_never_returned_twice() {
        let mut queue = VisionQueue::in_memory().expect("queue");
        let id = queue.enqueue(&request(40, "only")).expect("enqueue");
        let first = queue.dequeue().expect("dequeue").expect("item");
        assert_eq!(first.id, id);
        assert!(queue.dequeue().expect("dequeue").is_none());

        let token = first.claim_token.as_deref().expect("token");
        queue
            .mark_completed(&id, token, "2026/10/ARC.json")
            .expect("complete");
        assert!(queue.dequeue().expect("dequeue").is_none());
        let done = queue.get(&id).expect("get").expect("row");
        assert_eq!(done.status, VisionStatus::Completed);
        assert_eq!(done.archive_path.as_deref(), Some("2026/10/ARC.json"));
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn test_mark_completed_rejects_pending_and_completed() {
        let mut queue = VisionQueue::in_memory().expect("queue");
        let id = queue.enqueue(&request(70, "pending")).expect("enqueue");

        let err = queue.mark_completed(&id, "no-claim", "x").unwrap_err();
        assert!(matches!(
            err,
            FacultyError::InvalidTransition { ref from, .. } if from == "pending"
        ));
        assert_eq!(
            queue.get(&id).expect("get").expect("row").status,
            VisionStatus::Pending
        );

        let claimed = queue.dequeue().expect("dequeue").expect("item");
        let token = claimed.claim_token.expect("token");
        queue.mark_completed(&id, &token, "x").expect("complete");
        let err = queue.mark_completed(&id, &token, "y").unwrap_err();
        assert!(matches!(
            err,
            FacultyError::InvalidTransition { ref from, .. } if from == "completed"
        ));
    }

    #[test]
    fn test_mark_completed_unknown_id() {
        let mut queue = VisionQueue::in_memory().expect("queue");
        let err = queue
            .mark_completed("VIS-00000000-deadbeef", "token", "x")
            .unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::QueueError);
        assert!(err.to_string().contains("unknown vision id"));
    }

    #[test]
    fn test_enqueue_generates_id_and_keeps_explicit_id() {
        let queue = VisionQueue::in_memory().expect("queue");
        let generated = queue.enqueue(&request(10, "a")).expect("enqueue");
        assert!(generated.starts_with("VIS-"));

        let mut explicit = request(10, "b");
        explicit.id = "VIS-20260101-0000abcd".to_string();
        assert_eq!(
            queue.enqueue(&explicit).expect("enqueue"),
            "VIS-20260101-0000abcd"
        );
        assert!(queue.enqueue(&explicit).is_err());
    }

    #[test]
    fn test_status_counts() {
        let mut queue = VisionQueue::in_memory().expect("queue");
        for p in [10, 20, 30] {
            queue.enqueue(&request(p, "x")).expect("enqueue");
        }
        let claimed = queue.dequeue().expect("dequeue").expect("item");
        assert_eq!(claimed.priority, 30);
        assert_eq!(
            queue.status().expect("status"),
            QueueStatus {
                total: 3,
                pending: 2,
                processing: 1,
                completed: 0,
            }
        );
    }

    #[test]
    fn test_reclaim_expired_keeps_processing() {
        let mut queue = VisionQueue::in_memory().expect("queue");
        let id = queue.enqueue(&request(50, "stuck")).expect("enqueue");
        let first = queue.dequeue().expect("dequeue").expect("item");

        assert!(
            queue
                .reclaim_expired(chrono::Duration::hours(1), 10)
                .expect("reclaim")
                .is_empty()
        );

        let reclaimed = queue
            .reclaim_expired(chrono::Duration::zero(), 10)
            .expect("reclaim");
        assert_eq!(reclaimed.len(), 1);
        assert_eq!(reclaimed[0].id, id);
        assert_eq!(reclaimed[0].status, VisionStatus::Processing);
        assert_ne!(reclaimed[0].claim_token, first.claim_token);
    }

    #[test]
    fn test_reclaimed_request_rejects_first_claimant() {
        let mut queue = VisionQueue::in_memory().expect("queue");
        let id = queue.enqueue(&request(50, "contended")).expect("enqueue");
        let first = queue.dequeue().expect("dequeue").expect("item");
        let second = queue
            .reclaim_expired(chrono::Duration::zero(), 1)
            .expect("reclaim")
            .pop()
            .expect("reclaimed");

        let stale = first.claim_token.expect("token");
        let err = queue
            .mark_completed(&id, &stale, "first/ARC.json")
            .unwrap_err();
        assert!(matches!(err, FacultyError::StaleClaim { ref vision_id } if vision_id == &id));
        assert_eq!(err.category(), crate::ErrorCategory::QueueError);
        let row = queue.get(&id).expect("get").expect("row");
        assert_eq!(row.status, VisionStatus::Processing);
        assert!(row.archive_path.is_none());

        let live = second.claim_token.expect("token");
        queue
            .mark_completed(&id, &live, "second/ARC.json")
            .expect("complete");
        assert_eq!(
            queue.get(&id).expect("get").expect("row").archive_path.as_deref(),
            Some("second/ARC.json")
        );
    }

    #[test]
    fn test_reclaim_honors_limit_in_dequeue_order() {
        let mut queue = VisionQueue::in_memory().expect("queue");
        for p in [20, 90, 50] {
            queue.enqueue(&request(p, "stuck")).expect("enqueue");
        }
        let claimed: Vec<VisionRequest> = std::iter::from_fn(|| queue.dequeue().expect("dequeue"))
            .collect();
        assert_eq!(claimed.len(), 3);

        assert!(
            queue
                .reclaim_expired(chrono::Duration::zero(), 0)
                .expect("reclaim")
                .is_empty()
        );
        let reclaimed = queue
            .reclaim_expired(chrono::Duration::zero(), 2)
            .expect("reclaim");
        let priorities: Vec<u8> = reclaimed.iter().map(|r| r.priority).collect();
        assert_eq!(priorities, vec![90, 50]);

        let untouched = claimed.iter().find(|r| r.priority == 20).expect("low");
        assert_eq!(
            queue
                .get(&untouched.id)
                .expect("get")
                .expect("row")
                .claim_token,
            untouched.claim_token
        );
    }

    #[test]
    fn test_persists_across_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("queue.db");
        let id = {
            let queue = VisionQueue::open(&path).expect("open");
            queue.enqueue(&request(80, "durable")).expect("enqueue")
        };
        let mut queue = VisionQueue::open(&path).expect("reopen");
        let next = queue.dequeue().expect("dequeue").expect("item");
        assert_eq!(next.id, id);
    }

    #[test]
    fn test_render_markdown() {
        let mut queue = VisionQueue::in_memory().expect("queue");
        queue
            .enqueue(&request(90, "Evaluate | pipeline split"))
            .expect("enqueue");
        queue.enqueue(&request(20, "later")).expect("enqueue");
        queue.dequeue().expect("dequeue");

        let md = queue.render_markdown().expect("render");
        assert!(md.contains("# Vision Queue"));
        assert!(md.contains("**Pending:** 1"));
        assert!(md.contains("## Processing (1)"));
        assert!(md.contains("Evaluate \\| pipeline split"));
        assert!(md.contains("## Completed (0)"));
    }
}
