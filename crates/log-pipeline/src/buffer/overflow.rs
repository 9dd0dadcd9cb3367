//! 오버플로우 스냅샷 저장소
//!
//! 버퍼가 가득 찼을 때와 종료 시 버퍼 내용을 JSON 배열 파일 하나로 남기고,
//! 다음 시작 시 한 번 읽어 들인 뒤 삭제합니다.
//!
//! 이미 스냅샷이 있으면 기존 이벤트 뒤에 새 이벤트를 이어 붙입니다.
//! 오버플로우 flush 뒤 종료 flush가 와도 앞선 스냅샷을 덮어쓰지 않습니다.
//!
//! 한도가 설정되면 스냅샷은 그 수를 넘지 않습니다. 넘치는 새 이벤트는 기록 시점에
//! 버려지고 `logship_buffer_discarded_events_total`로 집계됩니다.

use std::path::{Path, PathBuf};

use logship_core::event::Event;
use logship_core::metrics as m;

use crate::error::LogPipelineError;

/// 경로가 디렉토리일 때 사용하는 스냅샷 파일명
pub const SNAPSHOT_FILE_NAME: &str = "buffer.json";

/// 오버플로우 스냅샷 저장소
#[derive(Debug, Clone)]
pub struct OverflowStore {
    path: PathBuf,
    max_events: Option<usize>,
}

impl OverflowStore {
    /// 스냅샷 경로를 지정하여 저장소를 생성합니다.
    ///
    /// 경로가 기존 디렉토리를 가리키면 그 안의 `buffer.json`을 사용합니다.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let path = if path.is_dir() {
            path.join(SNAPSHOT_FILE_NAME)
        } else {
            path
        };
        Self {
            path,
            max_events: None,
        }
    }

    /// 스냅샷에 남길 최대 이벤트 수를 지정합니다.
    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = Some(max_events.max(1));
        self
    }

    /// 스냅샷 최대 이벤트 수 (없으면 무제한)
    pub fn max_events(&self) -> Option<usize> {
        self.max_events
    }

    /// 스냅샷 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 스냅샷 파일 존재 여부
    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// 스냅샷을 읽습니다. 파일이 없으면 빈 목록입니다.
    pub async fn load(&self) -> Result<Vec<Event>, LogPipelineError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.error(e)),
        };
        serde_json::from_slice(&data).map_err(|e| self.error(e))
    }

    /// 이벤트를 스냅샷에 이어 붙이고, 한도를 넘어 버린 이벤트 수를 반환합니다.
    ///
    /// 임시 파일에 전체를 쓴 뒤 rename하므로 실패해도 기존 스냅샷은 그대로입니다.
    pub async fn persist(&self, events: &[Event]) -> Result<usize, LogPipelineError> {
        if events.is_empty() {
            return Ok(0);
        }

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| self.error(e))?;
        }

        let mut merged = match self.load().await {
            Ok(existing) => existing,
            Err(e) => {
                let aside = self.path.with_extension("json.corrupt");
                tracing::warn!(
                    path = %self.path.display(),
                    moved_to = %aside.display(),
                    error = %e,
                    "existing overflow snapshot unreadable, moving it aside"
                );
                tokio::fs::rename(&self.path, &aside)
                    .await
                    .map_err(|e| self.error(e))?;
                Vec::new()
            }
        };

        let room = self
            .max_events
            .map_or(events.len(), |max| max.saturating_sub(merged.len()));
        let kept = events.len().min(room);
        let discarded = events.len() - kept;
        if discarded > 0 {
            metrics::counter!(m::BUFFER_DISCARDED_EVENTS_TOTAL).increment(discarded as u64);
            tracing::warn!(
                path = %self.path.display(),
                discarded,
                limit = self.max_events,
                "overflow snapshot is full, discarding newest events"
            );
        }
        if kept == 0 {
            return Ok(discarded);
        }
        merged.extend_from_slice(&events[..kept]);

        let data = serde_json::to_vec_pretty(&merged).map_err(|e| self.error(e))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| self.error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.error(e))?;

        tracing::debug!(
            path = %self.path.display(),
            added = kept,
            total = merged.len(),
            "overflow snapshot written"
        );
        Ok(discarded)
    }

    /// 스냅샷 파일을 삭제합니다. 파일이 없으면 성공입니다.
    pub async fn remove(&self) -> Result<(), LogPipelineError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.error(e)),
        }
    }

    fn error(&self, reason: impl ToString) -> LogPipelineError {
        LogPipelineError::Overflow {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logship_core::types::Severity;

    fn event(cmd: &str) -> Event {
        Event::new("host", "bash_history", "command_executed", Severity::Low, cmd).with_command(cmd)
    }

    #[tokio::test]
    async fn missing_snapshot_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = OverflowStore::new(dir.path().join("buffer.json"));
        assert!(store.load().await.unwrap().is_empty());
        assert!(!store.exists().await);
    }

    #[tokio::test]
    async fn persist_then_load_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = OverflowStore::new(dir.path().join("buffer.json"));
        let events = vec![event("a"), event("b"), event("c")];
        store.persist(&events).await.unwrap();

        assert_eq!(store.load().await.unwrap(), events);
    }

    #[tokio::test]
    async fn persist_appends_to_existing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = OverflowStore::new(dir.path().join("buffer.json"));
        store.persist(&[event("a"), event("b")]).await.unwrap();
        store.persist(&[event("c")]).await.unwrap();

        let loaded = store.load().await.unwrap();
        let commands: Vec<_> = loaded.iter().filter_map(Event::command).collect();
        assert_eq!(commands, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn snapshot_never_grows_past_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = OverflowStore::new(dir.path().join("buffer.json")).with_max_events(3);

        assert_eq!(store.persist(&[event("a"), event("b")]).await.unwrap(), 0);
        assert_eq!(store.persist(&[event("c"), event("d")]).await.unwrap(), 1);
        assert_eq!(store.persist(&[event("e")]).await.unwrap(), 1);

        let loaded = store.load().await.unwrap();
        let commands: Vec<_> = loaded.iter().filter_map(Event::command).collect();
        assert_eq!(commands, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn directory_path_uses_default_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = OverflowStore::new(dir.path());
        assert_eq!(store.path(), dir.path().join(SNAPSHOT_FILE_NAME));
    }

    #[tokio::test]
    async fn persist_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = OverflowStore::new(dir.path().join("nested").join("buffer.json"));
        store.persist(&[event("a")]).await.unwrap();
        assert!(store.exists().await);
    }

    #[tokio::test]
    async fn empty_persist_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = OverflowStore::new(dir.path().join("buffer.json"));
        assert_eq!(store.persist(&[]).await.unwrap(), 0);
        assert!(!store.exists().await);
    }

    #[tokio::test]
    async fn corrupt_snapshot_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buffer.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = OverflowStore::new(&path);

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, LogPipelineError::Overflow { .. }));
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_moved_aside_on_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buffer.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = OverflowStore::new(&path);

        store.persist(&[event("a")]).await.unwrap();
        assert_eq!(store.load().await.unwrap().len(), 1);
        assert!(dir.path().join("buffer.json.corrupt").exists());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = OverflowStore::new(dir.path().join("buffer.json"));
        store.persist(&[event("a")]).await.unwrap();
        store.remove().await.unwrap();
        store.remove().await.unwrap();
        assert!(!store.exists().await);
    }
}
