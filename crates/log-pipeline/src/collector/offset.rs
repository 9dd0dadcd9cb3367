//! 소스별 읽기 오프셋 영속화
//!
//! 오프셋 파일은 소스 하나당 하나이며, 내용은 소비한 바이트 수를 나타내는
//! 10진 정수 한 줄입니다. 파일이 없거나 내용을 해석할 수 없으면 0으로 봅니다.
//!
//! 기록은 임시 파일에 쓴 뒤 rename하므로 중간에 프로세스가 죽어도
//! 잘린 오프셋 파일이 남지 않습니다.

use std::path::{Path, PathBuf};

use logship_core::types::SourceKind;

use crate::error::LogPipelineError;

/// 오프셋 저장소
#[derive(Debug, Clone)]
pub struct OffsetStore {
    dir: PathBuf,
}

impl OffsetStore {
    /// 주어진 디렉토리에 오프셋 파일을 두는 저장소를 생성합니다.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 오프셋 디렉토리
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 디렉토리가 없으면 생성합니다.
    pub async fn ensure_dir(&self) -> Result<(), LogPipelineError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| LogPipelineError::Offset {
                path: self.dir.display().to_string(),
                reason: e.to_string(),
            })
    }

    /// 소스에 대응하는 오프셋 파일 경로
    ///
    /// 같은 종류의 소스가 여러 개여도 겹치지 않도록 대상 경로를 파일명에 넣습니다.
    /// 예: `auth` + `/var/log/auth.log` → `auth_var_log_auth_log.offset`
    pub fn path_for(&self, kind: SourceKind, source_path: &Path) -> PathBuf {
        let sanitized: String = source_path
            .to_string_lossy()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let sanitized = sanitized.trim_matches('_');
        self.dir.join(format!("{}_{}.offset", kind.as_str(), sanitized))
    }

    /// 저장된 오프셋을 읽습니다. 없거나 손상되었으면 0입니다.
    pub async fn load(&self, kind: SourceKind, source_path: &Path) -> u64 {
        let path = self.path_for(kind, source_path);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match content.trim().parse::<u64>() {
                Ok(offset) => offset,
                Err(_) => {
                    tracing::warn!(
                        path = %path.display(),
                        content = content.trim(),
                        "unreadable offset file, starting from 0"
                    );
                    0
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read offset file, starting from 0");
                0
            }
        }
    }

    /// 오프셋을 기록합니다.
    pub async fn save(
        &self,
        kind: SourceKind,
        source_path: &Path,
        offset: u64,
    ) -> Result<(), LogPipelineError> {
        let path = self.path_for(kind, source_path);
        let tmp = path.with_extension("offset.tmp");
        let to_err = |e: std::io::Error| LogPipelineError::Offset {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        tokio::fs::write(&tmp, offset.to_string())
            .await
            .map_err(to_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(to_err)
    }
}
