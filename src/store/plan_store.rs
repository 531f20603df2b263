//! PlanStore: JSONL append log plus an index inside the code graph.
//!
//! - **JSONL file** (`plans.jsonl`): one `CachedPlanRecord` per line, the
//!   source of truth.
//! - **Graph index**: `plans`/`plan_files` rows, a `File` node per touched
//!   file and an `APPLIES_TO_FILE` edge from the record to each file. Rebuilt
//!   from the log on open when the counts disagree.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, info, warn};
use rusqlite::{Connection, params};

use super::CachedPlanRecord;
use super::similarity;
use crate::domain::{Plan, Step};
use crate::error::{FixloopError, Result};
use crate::graph::{CodeGraph, EdgeRel, NodeLabel};

/// Log file name inside the per-repository data directory
pub const PLANS_LOG_FILE: &str = "plans.jsonl";

/// The two operations the loop needs from a plan cache
#[async_trait]
pub trait PlanCache: Send + Sync {
    /// Append a record for a completed plan
    async fn save(&self, issue: &str, plan: &Plan, file_paths: &BTreeSet<String>) -> Result<CachedPlanRecord>;

    /// A prior plan worth adapting for `issue`, if any
    async fn find_similar(&self, issue: &str) -> Result<Option<CachedPlanRecord>>;
}

/// Persistent plan cache
pub struct PlanStore {
    jsonl_path: PathBuf,
    graph: Arc<CodeGraph>,
    write_lock: Mutex<()>,
    min_similarity: f64,
}

impl PlanStore {
    /// Open the store in `dir`, indexing into `graph`
    pub fn open(dir: &Path, graph: Arc<CodeGraph>) -> Result<Self> {
        fs::create_dir_all(dir)
            .map_err(|e| FixloopError::Store(format!("Failed to create {}: {}", dir.display(), e)))?;

        let store = Self {
            jsonl_path: dir.join(PLANS_LOG_FILE),
            graph,
            write_lock: Mutex::new(()),
            min_similarity: 0.0,
        };
        store.rebuild_index_if_needed()?;
        Ok(store)
    }

    /// Minimum Jaccard score for `find_similar` to return a record
    pub fn with_min_similarity(mut self, min: f64) -> Self {
        self.min_similarity = min;
        self
    }

    pub fn log_path(&self) -> &Path {
        &self.jsonl_path
    }

    fn read_log(&self) -> Result<Vec<CachedPlanRecord>> {
        if !self.jsonl_path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.jsonl_path)?);
        let mut records = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CachedPlanRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping malformed line {} in {}: {}", n + 1, self.jsonl_path.display(), e),
            }
        }
        Ok(records)
    }

    fn rebuild_index_if_needed(&self) -> Result<()> {
        let records = self.read_log()?;
        let indexed = self.len()?;
        if records.len() != indexed {
            info!(
                "rebuilding plan index: log has {} records, index has {}",
                records.len(),
                indexed
            );
            self.rebuild_index(&records)?;
        }
        Ok(())
    }

    fn rebuild_index(&self, records: &[CachedPlanRecord]) -> Result<()> {
        self.graph.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM plans", [])?;
            tx.execute("DELETE FROM plan_files", [])?;
            tx.execute("DELETE FROM edges WHERE rel = ?1", [EdgeRel::AppliesToFile.as_str()])?;
            for record in records {
                Self::index_record(&tx, record)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn index_record(conn: &Connection, record: &CachedPlanRecord) -> Result<()> {
        let steps = serde_json::to_string(&record.plan)?;
        conn.execute(
            "INSERT OR REPLACE INTO plans (id, issue, steps, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![record.id, record.issue, steps, record.created_at],
        )?;
        for file in &record.touched_files {
            conn.execute(
                "INSERT OR IGNORE INTO plan_files (plan_id, file_path) VALUES (?1, ?2)",
                params![record.id, file],
            )?;
            let node = CodeGraph::upsert_node_in(conn, NodeLabel::File, file, file)?;
            CodeGraph::link_in(conn, &record.id, &node, EdgeRel::AppliesToFile)?;
        }
        Ok(())
    }

    fn load_record(conn: &Connection, id: &str, issue: String, steps: String, created_at: i64) -> Result<CachedPlanRecord> {
        let plan: Vec<Step> = serde_json::from_str(&steps)?;
        let mut stmt = conn.prepare("SELECT file_path FROM plan_files WHERE plan_id = ?1 ORDER BY file_path")?;
        let files = stmt
            .query_map([id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<BTreeSet<String>, _>>()?;
        Ok(CachedPlanRecord {
            id: id.to_string(),
            issue,
            plan,
            touched_files: files,
            created_at,
        })
    }

    fn select_records(&self, sql: &str, arg: Option<&str>) -> Result<Vec<CachedPlanRecord>> {
        self.graph.with_conn(|conn| {
            let rows: Vec<(String, String, String, i64)> = {
                let mut stmt = conn.prepare(sql)?;
                let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, String, String, i64)> {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                };
                match arg {
                    Some(a) => stmt.query_map([a], map)?.collect::<rusqlite::Result<Vec<_>>>()?,
                    None => stmt.query_map([], map)?.collect::<rusqlite::Result<Vec<_>>>()?,
                }
            };
            rows.into_iter()
                .map(|(id, issue, steps, created_at)| Self::load_record(conn, &id, issue, steps, created_at))
                .collect()
        })
    }

    /// Append a record: log first, then index. Serialized by a mutex so
    /// concurrent savers never interleave partial lines.
    pub fn save_record(&self, issue: &str, plan: &Plan, file_paths: &BTreeSet<String>) -> Result<CachedPlanRecord> {
        let record = CachedPlanRecord::new(issue, plan, file_paths.clone());
        // One write per record: O_APPEND keeps it whole across processes
        let line = format!("{}\n", serde_json::to_string(&record)?);

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| FixloopError::Store("plan store lock poisoned".to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.jsonl_path)
            .map_err(|e| FixloopError::Store(format!("Failed to open {}: {}", self.jsonl_path.display(), e)))?;
        file.write_all(line.as_bytes())?;
        file.flush()?;

        self.graph.with_conn(|conn| {
            let tx = conn.transaction()?;
            Self::index_record(&tx, &record)?;
            tx.commit()?;
            Ok(())
        })?;

        info!(
            "saved plan {} ({} steps, {} files)",
            record.id,
            record.plan.len(),
            record.touched_files.len()
        );
        Ok(record)
    }

    /// Best-ranked stored record for `issue`
    pub fn find_similar_record(&self, issue: &str) -> Result<Option<CachedPlanRecord>> {
        let records = self.list()?;
        let best = similarity::best_match(issue, &records, self.min_similarity);
        match &best {
            Some((score, record)) => debug!("cache candidate {} score={:.3}", record.id, score),
            None => debug!("no cache candidate among {} records", records.len()),
        }
        Ok(best.map(|(_, r)| r.clone()))
    }

    /// All records, oldest first
    pub fn list(&self) -> Result<Vec<CachedPlanRecord>> {
        self.select_records("SELECT id, issue, steps, created_at FROM plans ORDER BY created_at, id", None)
    }

    pub fn get(&self, id: &str) -> Result<Option<CachedPlanRecord>> {
        let mut found = self.select_records("SELECT id, issue, steps, created_at FROM plans WHERE id = ?1", Some(id))?;
        Ok(found.pop())
    }

    /// Records whose plan touched `file_path`, oldest first
    pub fn find_by_file(&self, file_path: &str) -> Result<Vec<CachedPlanRecord>> {
        self.select_records(
            "SELECT p.id, p.issue, p.steps, p.created_at FROM plans p
             JOIN plan_files f ON f.plan_id = p.id
             WHERE f.file_path = ?1 ORDER BY p.created_at, p.id",
            Some(file_path),
        )
    }

    pub fn len(&self) -> Result<usize> {
        self.graph.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM plans", [], |row| row.get(0))?;
            Ok(n as usize)
        })
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl PlanCache for PlanStore {
    async fn save(&self, issue: &str, plan: &Plan, file_paths: &BTreeSet<String>) -> Result<CachedPlanRecord> {
        self.save_record(issue, plan, file_paths)
    }

    async fn find_similar(&self, issue: &str) -> Result<Option<CachedPlanRecord>> {
        self.find_similar_record(issue)
    }
}
