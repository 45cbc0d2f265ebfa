// Batch data models
use serde::{Deserialize, Serialize};

use super::{Discipline, ProjectStatus};

/// Per-file processing state. Transitions are monotonic:
/// `Queued -> Processing -> {Done, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl FileStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStatus::Done | FileStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Queued => "Queued",
            FileStatus::Processing => "Processing",
            FileStatus::Done => "Done",
            FileStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFile {
    pub file_id: String,
    pub name: String,
    pub status: FileStatus,
    /// Set exactly once, when the file leaves `Processing`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchFile {
    pub fn queued(file_id: String, name: String) -> Self {
        Self {
            file_id,
            name,
            status: FileStatus::Queued,
            duration_sec: None,
            error: None,
        }
    }
}

/// `total` is fixed at creation; `ok + failed <= total` always.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BatchCounters {
    pub ok: u32,
    pub failed: u32,
    pub total: u32,
}

/// Authoritative batch record, owned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    pub batch_id: String,
    pub project_id: String,
    pub discipline: Discipline,
    pub status: ProjectStatus,
    /// Float internally; rounded in status snapshots.
    pub progress: f64,
    pub files: Vec<BatchFile>,
    pub counters: BatchCounters,
    pub elapsed_sec: u64,
    /// Epoch milliseconds; 0 until the batch is started.
    pub started_at: i64,
}

impl BatchRecord {
    pub fn new(batch_id: String, project_id: String, files: Vec<BatchFile>) -> Self {
        let total = files.len() as u32;
        Self {
            batch_id,
            project_id,
            discipline: Discipline::Civil,
            status: ProjectStatus::Processing,
            progress: 0.0,
            files,
            counters: BatchCounters {
                ok: 0,
                failed: 0,
                total,
            },
            elapsed_sec: 0,
            started_at: 0,
        }
    }

    pub fn all_files_terminal(&self) -> bool {
        self.files.iter().all(|f| f.status.is_terminal())
    }

    /// Snapshot projection returned by the status endpoint.
    pub fn snapshot(&self) -> BatchStatus {
        BatchStatus {
            status: self.status,
            progress: self.progress.round().min(100.0) as u8,
            files: self.files.clone(),
            counters: self.counters,
            elapsed_sec: self.elapsed_sec,
        }
    }
}

/// Response of `GET .../batches/{batchId}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatus {
    pub status: ProjectStatus,
    pub progress: u8,
    pub files: Vec<BatchFile>,
    pub counters: BatchCounters,
    pub elapsed_sec: u64,
}

/// Response of `POST .../batches/uploads`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUploadResponse {
    pub batch_id: String,
    pub files: Vec<UploadedFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub file_id: String,
}

/// Payload of `POST .../batches/{batchId}/start`. The engine is an
/// opaque identifier forwarded to the extraction backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartBatchRequest {
    pub discipline: Discipline,
    pub engine: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!FileStatus::Queued.is_terminal());
        assert!(!FileStatus::Processing.is_terminal());
        assert!(FileStatus::Done.is_terminal());
        assert!(FileStatus::Failed.is_terminal());
    }

    #[test]
    fn test_new_batch_counters() {
        let files = vec![
            BatchFile::queued("f_1".to_string(), "a.pdf".to_string()),
            BatchFile::queued("f_2".to_string(), "b.pdf".to_string()),
        ];
        let batch = BatchRecord::new("bat_1".to_string(), "prj_1".to_string(), files);
        assert_eq!(batch.counters.total, 2);
        assert_eq!(batch.counters.ok, 0);
        assert_eq!(batch.counters.failed, 0);
        assert_eq!(batch.status, ProjectStatus::Processing);
        assert_eq!(batch.started_at, 0);
        assert!(!batch.all_files_terminal());
    }

    #[test]
    fn test_snapshot_rounds_progress() {
        let mut batch = BatchRecord::new("bat_1".to_string(), "prj_1".to_string(), vec![]);
        batch.progress = 41.6;
        assert_eq!(batch.snapshot().progress, 42);
        batch.progress = 100.0;
        assert_eq!(batch.snapshot().progress, 100);
    }

    #[test]
    fn test_queued_file_omits_optional_fields() {
        let file = BatchFile::queued("f_1".to_string(), "a.pdf".to_string());
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["status"], "Queued");
        assert!(json.get("duration_sec").is_none());
        assert!(json.get("error").is_none());
    }
}
