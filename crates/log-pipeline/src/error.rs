//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for LogshipError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logship_core::error::{
    LogshipError, ParseError, PipelineError, StorageError, TransportError,
};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 로그 라인 파싱 실패 (호출자는 해당 라인을 건너뜀)
    #[error("parse error: {format}: {reason}")]
    Parse {
        /// 파서 형식 (bash_history, syslog 등)
        format: String,
        /// 실패 사유
        reason: String,
    },

    /// tailer 에러 (파일 열기, 감시 등록 등)
    #[error("tailer error: {source_type} {path}: {reason}")]
    Tailer {
        /// 소스 종류
        source_type: String,
        /// 대상 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 오프셋 파일 기록 실패
    #[error("offset store error: {path}: {reason}")]
    Offset {
        /// 오프셋 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 오버플로우 스냅샷 기록/로드 실패
    #[error("overflow store error: {path}: {reason}")]
    Overflow {
        /// 스냅샷 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 배치 전송 실패
    #[error("send error: {0}")]
    Send(#[from] TransportError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<LogPipelineError> for LogshipError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Parse { format, reason } => {
                LogshipError::Parse(ParseError::Malformed { format, reason })
            }
            LogPipelineError::Offset { path, reason }
            | LogPipelineError::Overflow { path, reason } => {
                LogshipError::Storage(StorageError::Persist { path, reason })
            }
            LogPipelineError::Send(e) => LogshipError::Transport(e),
            LogPipelineError::Io(e) => LogshipError::Io(e),
            other => LogshipError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display() {
        let err = LogPipelineError::Parse {
            format: "syslog".to_owned(),
            reason: "line does not match".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("syslog"));
        assert!(msg.contains("line does not match"));
    }

    #[test]
    fn parse_converts_to_core_parse_error() {
        let err = LogPipelineError::Parse {
            format: "auditd".to_owned(),
            reason: "no type field".to_owned(),
        };
        let core: LogshipError = err.into();
        assert!(matches!(core, LogshipError::Parse(_)));
    }

    #[test]
    fn overflow_converts_to_storage_error() {
        let err = LogPipelineError::Overflow {
            path: "/var/lib/logship/buffer.json".to_owned(),
            reason: "read-only file system".to_owned(),
        };
        let core: LogshipError = err.into();
        assert!(matches!(core, LogshipError::Storage(_)));
        assert!(core.to_string().contains("buffer.json"));
    }

    #[test]
    fn config_converts_to_pipeline_error() {
        let err = LogPipelineError::Config {
            field: "sink".to_owned(),
            reason: "missing".to_owned(),
        };
        let core: LogshipError = err.into();
        assert!(matches!(core, LogshipError::Pipeline(_)));
    }

    #[test]
    fn send_error_keeps_transport_variant() {
        let err: LogPipelineError = TransportError::Status(503).into();
        let core: LogshipError = err.into();
        assert!(matches!(
            core,
            LogshipError::Transport(TransportError::Status(503))
        ));
    }
}
