//! Code knowledge graph backed by SQLite.
//!
//! Structural nodes (files, classes, functions, modules) and their edges live
//! next to the plan-cache tables in one `graph.db` per repository. External
//! ingesters write through `upsert_*`/`link`; the `query_code_graph` tool reads
//! through `query`, which only accepts read-only statements.

use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use glob::{MatchOptions, Pattern};
use log::{debug, info};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{FixloopError, Result};

/// Database file name inside the per-repository data directory
pub const GRAPH_DB_FILE: &str = "graph.db";

/// Node labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeLabel {
    File,
    Class,
    Function,
    Module,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::File => "File",
            NodeLabel::Class => "Class",
            NodeLabel::Function => "Function",
            NodeLabel::Module => "Module",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Some(NodeLabel::File),
            "class" => Some(NodeLabel::Class),
            "function" => Some(NodeLabel::Function),
            "module" => Some(NodeLabel::Module),
            _ => None,
        }
    }
}

/// Edge relation types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeRel {
    Contains,
    Imports,
    AppliesToFile,
}

impl EdgeRel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeRel::Contains => "CONTAINS",
            EdgeRel::Imports => "IMPORTS",
            EdgeRel::AppliesToFile => "APPLIES_TO_FILE",
        }
    }
}

/// Stable node key: `File:<path>` for files, `<Label>:<path>::<name>` otherwise
pub fn node_key(label: NodeLabel, name: &str, file_path: &str) -> String {
    match label {
        NodeLabel::File => format!("File:{}", file_path),
        _ => format!("{}:{}::{}", label.as_str(), file_path, name),
    }
}

/// Absolute, lexically normalized form of `path`. Never touches the
/// filesystem, so the result is the same whether or not the path exists.
fn normalized_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Per-repository data directory: `<data_dir>/<first 16 hex chars of sha256(path)>`.
/// Keyed on the normalized path, so a working copy removed after a run maps
/// to the same directory as while it existed.
pub fn repo_data_dir(data_dir: &Path, repo_path: &Path) -> PathBuf {
    let key = normalized_path(repo_path);
    let mut hasher = Sha256::new();
    hasher.update(key.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    data_dir.join(hex::encode(&digest[..8]))
}

/// SQLite-backed code graph
pub struct CodeGraph {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl CodeGraph {
    /// Open or create `graph.db` in `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(GRAPH_DB_FILE);
        let conn = Connection::open(&path)
            .map_err(|e| FixloopError::Graph(format!("Failed to open {}: {}", path.display(), e)))?;
        Self::init_schema(&conn)?;
        debug!("opened code graph at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    /// In-memory graph (tests, throwaway runs)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                name TEXT NOT NULL,
                file_path TEXT NOT NULL DEFAULT ''
            );
            CREATE INDEX IF NOT EXISTS idx_nodes_label ON nodes(label);
            CREATE INDEX IF NOT EXISTS idx_nodes_file ON nodes(file_path);

            CREATE TABLE IF NOT EXISTS edges (
                src TEXT NOT NULL,
                dst TEXT NOT NULL,
                rel TEXT NOT NULL,
                UNIQUE(src, dst, rel)
            );
            CREATE INDEX IF NOT EXISTS idx_edges_dst ON edges(dst);

            CREATE TABLE IF NOT EXISTS plans (
                id TEXT PRIMARY KEY,
                issue TEXT NOT NULL,
                steps TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS plan_files (
                plan_id TEXT NOT NULL,
                file_path TEXT NOT NULL,
                UNIQUE(plan_id, file_path)
            );
            CREATE INDEX IF NOT EXISTS idx_plan_files_path ON plan_files(file_path);
            "#,
        )?;
        Ok(())
    }

    /// Location of the database file, if on disk
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` with exclusive access to the connection
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| FixloopError::Graph("graph connection lock poisoned".to_string()))?;
        f(&mut conn)
    }

    pub(crate) fn upsert_node_in(conn: &Connection, label: NodeLabel, name: &str, file_path: &str) -> Result<String> {
        let id = node_key(label, name, file_path);
        conn.execute(
            "INSERT OR IGNORE INTO nodes (id, label, name, file_path) VALUES (?1, ?2, ?3, ?4)",
            params![id, label.as_str(), name, file_path],
        )?;
        Ok(id)
    }

    pub(crate) fn link_in(conn: &Connection, src: &str, dst: &str, rel: EdgeRel) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO edges (src, dst, rel) VALUES (?1, ?2, ?3)",
            params![src, dst, rel.as_str()],
        )?;
        Ok(())
    }

    /// Merge a File node; returns its key
    pub fn upsert_file(&self, file_path: &str) -> Result<String> {
        self.with_conn(|conn| Self::upsert_node_in(conn, NodeLabel::File, file_path, file_path))
    }

    /// Merge a symbol node and a `CONTAINS` edge from its file
    pub fn upsert_symbol(&self, label: NodeLabel, name: &str, file_path: &str) -> Result<String> {
        if label == NodeLabel::File {
            return self.upsert_file(file_path);
        }
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let file = Self::upsert_node_in(&tx, NodeLabel::File, file_path, file_path)?;
            let id = Self::upsert_node_in(&tx, label, name, file_path)?;
            Self::link_in(&tx, &file, &id, EdgeRel::Contains)?;
            tx.commit()?;
            Ok(id)
        })
    }

    /// Add an edge between two node keys
    pub fn link(&self, src: &str, dst: &str, rel: EdgeRel) -> Result<()> {
        self.with_conn(|conn| Self::link_in(conn, src, dst, rel))
    }

    /// Drop structural nodes and edges. Plans, their file links and the File
    /// nodes those links point at are kept.
    pub fn clear_structure(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let edges = tx.execute("DELETE FROM edges WHERE rel != ?1", [EdgeRel::AppliesToFile.as_str()])?;
            let nodes = tx.execute(
                "DELETE FROM nodes WHERE label != 'File'
                   OR id NOT IN (SELECT dst FROM edges WHERE rel = ?1)",
                [EdgeRel::AppliesToFile.as_str()],
            )?;
            tx.commit()?;
            info!("cleared code graph structure: {} nodes, {} edges", nodes, edges);
            Ok(nodes + edges)
        })
    }

    /// Register a File node for every regular file under `root`, skipping
    /// hidden files and directories. Returns the number of files seen.
    pub fn index_files(&self, root: &Path) -> Result<usize> {
        let escaped = PathBuf::from(Pattern::escape(&root.to_string_lossy()));
        let pattern = escaped.join("**").join("*");
        let pattern = pattern.to_string_lossy();
        let options = MatchOptions {
            require_literal_leading_dot: true,
            ..MatchOptions::new()
        };
        let paths = glob::glob_with(&pattern, options)
            .map_err(|e| FixloopError::Graph(format!("Bad index pattern: {}", e)))?;

        let mut files = Vec::new();
        for entry in paths.flatten() {
            if !entry.is_file() {
                continue;
            }
            if let Ok(rel) = entry.strip_prefix(root) {
                let rel = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                files.push(rel);
            }
        }

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            for file in &files {
                Self::upsert_node_in(&tx, NodeLabel::File, file, file)?;
            }
            tx.commit()?;
            Ok(())
        })?;
        info!("indexed {} files under {}", files.len(), root.display());
        Ok(files.len())
    }

    /// Number of nodes, optionally restricted to one label
    pub fn count_nodes(&self, label: Option<NodeLabel>) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = match label {
                Some(l) => conn.query_row("SELECT COUNT(*) FROM nodes WHERE label = ?1", [l.as_str()], |row| {
                    row.get(0)
                })?,
                None => conn.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?,
            };
            Ok(count as usize)
        })
    }

    /// Run one read-only SQL statement and return rows as a JSON array of
    /// objects keyed by column name
    pub fn query(&self, sql: &str) -> Result<String> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            if !stmt.readonly() {
                return Err(FixloopError::Graph(
                    "only read-only statements are allowed".to_string(),
                ));
            }
            let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut obj = serde_json::Map::new();
                for (i, name) in columns.iter().enumerate() {
                    obj.insert(name.clone(), value_to_json(row.get_ref(i)?));
                }
                out.push(Value::Object(obj));
            }
            Ok(serde_json::to_string(&out)?)
        })
    }
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::from(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::from(hex::encode(b)),
    }
}

impl std::fmt::Debug for CodeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeGraph").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_upsert_is_idempotent() {
        let graph = CodeGraph::open_in_memory().unwrap();
        let a = graph.upsert_file("src/app.py").unwrap();
        let b = graph.upsert_file("src/app.py").unwrap();
        assert_eq!(a, b);
        assert_eq!(graph.count_nodes(Some(NodeLabel::File)).unwrap(), 1);
    }

    #[test]
    fn test_symbol_links_to_file() {
        let graph = CodeGraph::open_in_memory().unwrap();
        graph.upsert_symbol(NodeLabel::Function, "main", "src/app.py").unwrap();

        let json = graph
            .query("SELECT src, dst, rel FROM edges")
            .unwrap();
        let rows: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["src"], "File:src/app.py");
        assert_eq!(rows[0]["dst"], "Function:src/app.py::main");
        assert_eq!(rows[0]["rel"], "CONTAINS");
    }

    #[test]
    fn test_query_rejects_writes() {
        let graph = CodeGraph::open_in_memory().unwrap();
        let err = graph.query("DELETE FROM nodes").unwrap_err();
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn test_query_returns_typed_values() {
        let graph = CodeGraph::open_in_memory().unwrap();
        let json = graph.query("SELECT 1 AS n, 'x' AS s, NULL AS z").unwrap();
        let rows: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(rows[0]["n"], 1);
        assert_eq!(rows[0]["s"], "x");
        assert!(rows[0]["z"].is_null());
    }

    #[test]
    fn test_clear_structure_keeps_plan_targets() {
        let graph = CodeGraph::open_in_memory().unwrap();
        graph.upsert_symbol(NodeLabel::Class, "App", "src/app.py").unwrap();
        let kept = graph.upsert_file("src/fixed.py").unwrap();
        graph.link("rec-1", &kept, EdgeRel::AppliesToFile).unwrap();

        graph.clear_structure().unwrap();

        assert_eq!(graph.count_nodes(None).unwrap(), 1);
        let json = graph.query("SELECT id FROM nodes").unwrap();
        assert!(json.contains("File:src/fixed.py"));
    }

    #[test]
    fn test_index_files_skips_hidden() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("src/app.py"), "x").unwrap();
        std::fs::write(dir.path().join("README.md"), "x").unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "x").unwrap();

        let graph = CodeGraph::open_in_memory().unwrap();
        let n = graph.index_files(dir.path()).unwrap();
        assert_eq!(n, 2);

        let json = graph.query("SELECT file_path FROM nodes ORDER BY file_path").unwrap();
        assert!(json.contains("src/app.py"));
        assert!(!json.contains("HEAD"));
    }

    #[test]
    fn test_index_files_root_with_glob_metacharacters() {
        let parent = TempDir::new().unwrap();
        let root = parent.path().join("repo[1]*?");
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/app.py"), "x").unwrap();

        let graph = CodeGraph::open_in_memory().unwrap();
        assert_eq!(graph.index_files(&root).unwrap(), 1);
        let json = graph.query("SELECT file_path FROM nodes").unwrap();
        assert!(json.contains("\"src/app.py\""));
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = TempDir::new().unwrap();
        {
            let graph = CodeGraph::open(dir.path()).unwrap();
            graph.upsert_file("a.rs").unwrap();
        }
        let graph = CodeGraph::open(dir.path()).unwrap();
        assert_eq!(graph.count_nodes(None).unwrap(), 1);
        assert!(graph.path().unwrap().ends_with(GRAPH_DB_FILE));
    }

    #[test]
    fn test_repo_data_dir_is_stable() {
        let dir = TempDir::new().unwrap();
        let a = repo_data_dir(Path::new("/data"), dir.path());
        let b = repo_data_dir(Path::new("/data"), dir.path());
        assert_eq!(a, b);
        assert_eq!(a.file_name().unwrap().len(), 16);
    }

    #[test]
    fn test_repo_data_dir_survives_removal() {
        let parent = TempDir::new().unwrap();
        let repo = parent.path().join("temp_repo");
        std::fs::create_dir(&repo).unwrap();
        let present = repo_data_dir(Path::new("/data"), &repo);

        std::fs::remove_dir_all(&repo).unwrap();
        let removed = repo_data_dir(Path::new("/data"), &repo);
        assert_eq!(present, removed);
    }

    #[test]
    fn test_repo_data_dir_relative_matches_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let absolute = repo_data_dir(Path::new("/data"), &cwd.join("temp_repo"));
        assert_eq!(repo_data_dir(Path::new("/data"), Path::new("./temp_repo")), absolute);
        assert_eq!(repo_data_dir(Path::new("/data"), Path::new("temp_repo")), absolute);
        assert_eq!(repo_data_dir(Path::new("/data"), Path::new("x/../temp_repo")), absolute);
    }

    #[test]
    fn test_label_parse() {
        assert_eq!(NodeLabel::parse("function"), Some(NodeLabel::Function));
        assert_eq!(NodeLabel::parse("FILE"), Some(NodeLabel::File));
        assert_eq!(NodeLabel::parse("plan"), None);
    }
}
