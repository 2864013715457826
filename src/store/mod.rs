//! Task document store: one markdown file per task, rewritten in full on
//! every mutation.
//!
//! Each mutating call applies its change to a copy of the task, renders the
//! copy and atomically replaces the document (write `<id>.md.tmp`, then
//! rename). Only after the write succeeds is the caller's task updated, so
//! memory and disk never disagree and a failed write leaves the previous
//! document untouched.
//!
//! There is no locking: a document is written by exactly one worker pipeline.

pub mod document;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::runtime::RuntimeFlavor;

use crate::task::{Finding, Task, TaskError, TaskId, TaskStatus};

pub use document::{parse_frontmatter, DocumentError};

const EXTENSION: &str = "md";

/// Errors from the task document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Task {0} not found")]
    NotFound(TaskId),

    #[error("Storage error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render task {id}: {reason}")]
    Render { id: TaskId, reason: String },

    #[error("Failed to parse task document {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error(transparent)]
    Transition(#[from] TaskError),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// File-backed store rooted at an explicit base directory.
#[derive(Debug, Clone)]
pub struct TaskStore {
    base_dir: PathBuf,
}

impl TaskStore {
    /// Open (and create if needed) a store at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(io_error(&base_dir))?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the document for `id`, whether or not it exists yet.
    pub fn path_for(&self, id: TaskId) -> PathBuf {
        self.base_dir.join(format!("{}.{}", id, EXTENSION))
    }

    /// Write a brand-new document for `task`.
    ///
    /// # Errors
    /// `StoreError::Io` if the document already exists or cannot be written.
    pub fn create(&self, task: &Task) -> Result<PathBuf, StoreError> {
        let path = self.path_for(task.id());
        if path.exists() {
            return Err(StoreError::Io {
                path,
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "task document already exists",
                ),
            });
        }
        self.persist(task)?;
        tracing::debug!("Created task document {}", path.display());
        Ok(path)
    }

    /// Entire current document text for `id`.
    pub fn read_full_text(&self, id: TaskId) -> Result<String, StoreError> {
        let path = self.path_for(id);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(id)),
            Err(err) => Err(io_error(&path)(err)),
        }
    }

    /// Read and parse the persisted task.
    pub fn load(&self, id: TaskId) -> Result<Task, StoreError> {
        let text = self.read_full_text(id)?;
        document::parse(&text).map_err(|e| StoreError::Parse {
            path: self.path_for(id),
            reason: e.to_string(),
        })
    }

    /// All persisted task ids, sorted lexicographically.
    ///
    /// Files that are not `<uuid>.md` (temp files, notes) are ignored.
    pub fn list_ids(&self) -> Result<Vec<TaskId>, StoreError> {
        let entries = fs::read_dir(&self.base_dir).map_err(io_error(&self.base_dir))?;
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(io_error(&self.base_dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<TaskId>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort_by_key(|id| id.to_string());
        Ok(ids)
    }

    /// Document paths in the same order as [`TaskStore::list_ids`].
    pub fn list_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        Ok(self
            .list_ids()?
            .into_iter()
            .map(|id| self.path_for(id))
            .collect())
    }

    pub fn update_status(&self, task: &mut Task, status: TaskStatus) -> Result<(), StoreError> {
        self.mutate(task, |t| t.transition(status).map_err(StoreError::from))?;
        tracing::debug!("Task {} -> {}", task.id(), status);
        Ok(())
    }

    pub fn append_progress(&self, task: &mut Task, note: &str) -> Result<(), StoreError> {
        self.mutate(task, |t| {
            t.push_progress(note);
            Ok(())
        })
    }

    /// Append a finding; citations follow automatically.
    pub fn append_finding(&self, task: &mut Task, finding: Finding) -> Result<(), StoreError> {
        self.mutate(task, |t| {
            t.push_finding(finding.normalized());
            Ok(())
        })
    }

    /// Set (or overwrite) the task summary. Last write wins.
    pub fn set_summary(&self, task: &mut Task, summary: &str) -> Result<(), StoreError> {
        self.mutate(task, |t| {
            t.replace_summary(summary);
            Ok(())
        })
    }

    /// Apply `change` to a copy, persist the copy, then commit it to `task`.
    fn mutate<F>(&self, task: &mut Task, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Task) -> Result<(), StoreError>,
    {
        let mut next = task.clone();
        change(&mut next)?;
        self.persist(&next)?;
        *task = next;
        Ok(())
    }

    fn persist(&self, task: &Task) -> Result<(), StoreError> {
        let content = document::render(task).map_err(|e| StoreError::Render {
            id: task.id(),
            reason: e.to_string(),
        })?;
        let path = self.path_for(task.id());
        let tmp_path = path.with_extension(format!("{}.tmp", EXTENSION));

        offload_blocking(|| {
            let write = || -> std::io::Result<()> {
                let mut file = fs::File::create(&tmp_path)?;
                file.write_all(content.as_bytes())?;
                file.sync_all()
            };
            if let Err(err) = write() {
                let _ = fs::remove_file(&tmp_path);
                return Err(io_error(&tmp_path)(err));
            }
            fs::rename(&tmp_path, &path).map_err(|err| {
                let _ = fs::remove_file(&tmp_path);
                io_error(&path)(err)
            })
        })
    }
}

/// Run blocking file I/O without stalling other tasks on a multi-thread
/// runtime. `block_in_place` is unavailable on a current-thread runtime and
/// outside one, so the closure runs inline there.
fn offload_blocking<R>(f: impl FnOnce() -> R) -> R {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => tokio::task::block_in_place(f),
        _ => f(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, TaskStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = TaskStore::new(temp.path().join("tasks")).expect("store");
        (temp, store)
    }

    #[test]
    fn test_create_and_read_back() {
        let (_temp, store) = store();
        let task = Task::new("Research key information", "rust async runtimes", vec![]);
        let path = store.create(&task).unwrap();
        assert_eq!(path, store.path_for(task.id()));
        let text = store.read_full_text(task.id()).unwrap();
        assert_eq!(text, document::render(&task).unwrap());
        assert_eq!(store.load(task.id()).unwrap(), task);
    }

    #[test]
    fn test_create_refuses_existing() {
        let (_temp, store) = store();
        let task = Task::new("t", "o", vec![]);
        store.create(&task).unwrap();
        assert!(matches!(store.create(&task), Err(StoreError::Io { .. })));
    }

    #[test]
    fn test_read_unknown_id_is_not_found() {
        let (_temp, store) = store();
        let id = TaskId::new();
        assert!(matches!(store.read_full_text(id), Err(StoreError::NotFound(found)) if found == id));
    }

    #[test]
    fn test_every_mutation_is_persisted() {
        let (_temp, store) = store();
        let mut task = Task::new("t", "o", vec![]);
        store.create(&task).unwrap();

        store.append_progress(&mut task, "created").unwrap();
        assert_eq!(store.load(task.id()).unwrap(), task);

        store.update_status(&mut task, TaskStatus::InProgress).unwrap();
        assert_eq!(store.load(task.id()).unwrap().status(), TaskStatus::InProgress);

        store
            .append_finding(&mut task, Finding::new("a").with_url("https://a.example").with_snippet(""))
            .unwrap();
        store
            .append_finding(&mut task, Finding::new("b").with_url("https://a.example"))
            .unwrap();
        let loaded = store.load(task.id()).unwrap();
        assert_eq!(loaded.citations(), &["https://a.example"]);
        assert_eq!(loaded.findings()[0].snippet, None);

        store.set_summary(&mut task, "first").unwrap();
        store.set_summary(&mut task, "second").unwrap();
        assert_eq!(store.load(task.id()).unwrap().summary(), Some("second"));
        assert_eq!(store.read_full_text(task.id()).unwrap(), document::render(&task).unwrap());
    }

    #[test]
    fn test_invalid_transition_leaves_document_unchanged() {
        let (_temp, store) = store();
        let mut task = Task::new("t", "o", vec![]);
        store.create(&task).unwrap();
        let before = store.read_full_text(task.id()).unwrap();
        let snapshot = task.clone();

        let err = store.update_status(&mut task, TaskStatus::Done).unwrap_err();
        assert!(matches!(err, StoreError::Transition(_)));
        assert_eq!(task, snapshot);
        assert_eq!(store.read_full_text(task.id()).unwrap(), before);
    }

    #[test]
    fn test_failed_write_leaves_task_and_document_unchanged() {
        let (temp, store) = store();
        let mut task = Task::new("t", "o", vec![]);
        store.create(&task).unwrap();
        let snapshot = task.clone();

        // A directory squatting on the temp path makes the write fail.
        let tmp_path = store.path_for(task.id()).with_extension("md.tmp");
        fs::create_dir_all(&tmp_path).unwrap();

        assert!(store.append_progress(&mut task, "lost").is_err());
        assert_eq!(task, snapshot);
        assert_eq!(store.load(task.id()).unwrap(), snapshot);
        drop(temp);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_mutations_from_multi_thread_workers() {
        let (_temp, store) = store();
        let mut task = Task::new("t", "o", vec![]);
        store.create(&task).unwrap();

        let worker_store = store.clone();
        let task = tokio::spawn(async move {
            worker_store.update_status(&mut task, TaskStatus::InProgress)?;
            worker_store.append_progress(&mut task, "from a worker thread")?;
            Ok::<_, StoreError>(task)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(store.load(task.id()).unwrap(), task);
    }

    #[tokio::test]
    async fn test_mutations_from_current_thread_runtime() {
        let (_temp, store) = store();
        let mut task = Task::new("t", "o", vec![]);
        store.create(&task).unwrap();
        store.append_progress(&mut task, "inline").unwrap();
        assert_eq!(store.load(task.id()).unwrap(), task);
    }

    #[test]
    fn test_list_ids_sorted_and_filtered() {
        let (_temp, store) = store();
        let mut ids: Vec<TaskId> = (0..5)
            .map(|_| {
                let task = Task::new("t", "o", vec![]);
                store.create(&task).unwrap();
                task.id()
            })
            .collect();
        fs::write(store.base_dir().join("notes.md"), "hello").unwrap();
        fs::write(store.base_dir().join("x.md.tmp"), "partial").unwrap();

        ids.sort_by_key(|id| id.to_string());
        assert_eq!(store.list_ids().unwrap(), ids);
        assert_eq!(store.list_ids().unwrap(), store.list_ids().unwrap());
        assert_eq!(store.list_paths().unwrap().len(), 5);
    }
}
