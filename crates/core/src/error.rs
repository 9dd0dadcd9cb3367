//! 에러 타입 -- 도메인별 에러 정의

/// logship 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogshipError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 디스크 영속화 에러 (오프셋, 오버플로우 스냅샷)
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 원격 수집 서버 전송 에러
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline is not running")]
    NotRunning,

    /// 열 수 있는 로그 소스가 하나도 없음
    #[error("no log source could be started")]
    NoSources,
}

/// 파싱 에러
///
/// 파서가 이 에러를 반환하면 해당 라인은 건너뜁니다.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 빈 라인
    #[error("empty line")]
    Empty,

    /// 형식 불일치
    #[error("malformed {format} line: {reason}")]
    Malformed { format: String, reason: String },

    /// 입력 데이터 초과
    #[error("input too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 디스크 기록 실패
    #[error("failed to persist {path}: {reason}")]
    Persist { path: String, reason: String },

    /// 디스크 로드 실패
    #[error("failed to load {path}: {reason}")]
    Load { path: String, reason: String },
}

/// 전송 에러
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// HTTP 요청 자체가 실패 (연결, 타임아웃 등)
    #[error("request failed: {0}")]
    Request(String),

    /// 예상하지 못한 HTTP 상태 코드
    #[error("unexpected http status: {0}")]
    Status(u16),

    /// 수집 서버가 배치를 거부
    #[error("collector rejected batch: status={status}, message={message}")]
    Rejected { status: String, message: String },

    /// 재시도 예산 소진
    #[error("send failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}
