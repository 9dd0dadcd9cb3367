//! 설정 관리 -- logship.toml 파싱 및 런타임 설정
//!
//! [`LogshipConfig`]는 에이전트 전체 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선, 데몬에서 적용)
//! 2. 환경변수 (`LOGSHIP_SERVER_HOST=collector.local` 형식)
//! 3. 설정 파일 (`logship.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logship_core::error::LogshipError> {
//! use logship_core::config::LogshipConfig;
//!
//! // 파일 로드 + 환경변수 오버라이드 + 경로 확장 + 검증
//! let config = LogshipConfig::load("logship.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogshipConfig::parse("[server]\nhost = \"10.0.0.5\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogshipError};
use crate::types::SourceKind;

/// 버퍼 용량 상한
const MAX_MEMORY_SIZE: usize = 10_000_000;

/// logship 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogshipConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 에이전트 식별 정보
    #[serde(default)]
    pub agent: AgentConfig,
    /// 수집 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 로그 소스 목록
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// 이벤트 버퍼 설정
    #[serde(default)]
    pub buffer: BufferConfig,
    /// 배치 전송 설정
    #[serde(default)]
    pub sender: SenderConfig,
    /// 파일 tailing 설정
    #[serde(default)]
    pub tailer: TailerConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LogshipConfig {
    /// TOML 파일에서 설정을 로드하고 실행 가능한 상태로 만듭니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. `~/` 경로 확장, 빈 hostname 채우기
    /// 4. 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogshipError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.resolve();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 읽습니다 (오버라이드, 검증 없음).
    ///
    /// `agent.id`처럼 환경변수로만 주어지는 값이 있을 수 있으므로
    /// 검증은 [`load`](Self::load)에서 오버라이드 이후에 수행합니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogshipError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogshipError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogshipError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogshipError> {
        toml::from_str(toml_str).map_err(|e| {
            LogshipError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGSHIP_{SECTION}_{FIELD}`
    /// 예: `LOGSHIP_SERVER_PORT=9000`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGSHIP_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGSHIP_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.log_file, "LOGSHIP_GENERAL_LOG_FILE");
        override_string(&mut self.general.pid_file, "LOGSHIP_GENERAL_PID_FILE");

        // Agent
        override_string(&mut self.agent.id, "LOGSHIP_AGENT_ID");
        override_string(&mut self.agent.hostname, "LOGSHIP_AGENT_HOSTNAME");

        // Server
        override_string(&mut self.server.host, "LOGSHIP_SERVER_HOST");
        override_u16(&mut self.server.port, "LOGSHIP_SERVER_PORT");
        override_string(&mut self.server.database, "LOGSHIP_SERVER_DATABASE");
        override_string(&mut self.server.collection, "LOGSHIP_SERVER_COLLECTION");

        // Buffer
        override_usize(&mut self.buffer.memory_size, "LOGSHIP_BUFFER_MEMORY_SIZE");
        override_string(&mut self.buffer.disk_path, "LOGSHIP_BUFFER_DISK_PATH");
        override_string(&mut self.buffer.offset_dir, "LOGSHIP_BUFFER_OFFSET_DIR");

        // Sender
        override_usize(
            &mut self.sender.max_batch_size,
            "LOGSHIP_SENDER_MAX_BATCH_SIZE",
        );
        override_u64(
            &mut self.sender.send_interval_secs,
            "LOGSHIP_SENDER_SEND_INTERVAL_SECS",
        );
        override_u64(
            &mut self.sender.retry_interval_secs,
            "LOGSHIP_SENDER_RETRY_INTERVAL_SECS",
        );
        override_u32(&mut self.sender.max_retries, "LOGSHIP_SENDER_MAX_RETRIES");

        // Tailer
        override_string(&mut self.tailer.backpressure, "LOGSHIP_TAILER_BACKPRESSURE");

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGSHIP_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "LOGSHIP_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "LOGSHIP_METRICS_PORT");
    }

    /// 경로의 `~/`를 홈 디렉토리로 확장하고, 빈 `agent.hostname`을
    /// 시스템 호스트명으로 채웁니다.
    pub fn resolve(&mut self) {
        if self.agent.hostname.is_empty() {
            self.agent.hostname = system_hostname();
        }

        for source in &mut self.sources {
            source.path = expand_home(&source.path);
        }
        self.general.log_file = expand_home(&self.general.log_file);
        self.buffer.disk_path = expand_home(&self.buffer.disk_path);
        self.buffer.offset_dir = expand_home(&self.buffer.offset_dir);
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogshipError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.server.host.trim().is_empty() {
            return Err(invalid("server.host", "server host is required"));
        }
        if self.server.port == 0 {
            return Err(invalid("server.port", "must be greater than 0"));
        }
        if !self.server.ingest_path.starts_with('/') {
            return Err(invalid("server.ingest_path", "must start with '/'"));
        }
        if !self.server.health_path.starts_with('/') {
            return Err(invalid("server.health_path", "must start with '/'"));
        }

        if self.agent.id.trim().is_empty() {
            return Err(invalid("agent.id", "agent id is required"));
        }

        if self.sources.is_empty() {
            return Err(invalid(
                "sources",
                "at least one source must be configured",
            ));
        }
        if !self.sources.iter().any(|s| s.enabled) {
            return Err(invalid("sources", "at least one source must be enabled"));
        }
        for (i, source) in self.sources.iter().enumerate() {
            if source.path.trim().is_empty() {
                return Err(invalid(
                    &format!("sources[{i}].path"),
                    "path must not be empty",
                ));
            }
        }

        if self.buffer.memory_size == 0 || self.buffer.memory_size > MAX_MEMORY_SIZE {
            return Err(invalid(
                "buffer.memory_size",
                format!("must be 1-{MAX_MEMORY_SIZE}"),
            ));
        }
        if self.buffer.disk_path.trim().is_empty() {
            return Err(invalid("buffer.disk_path", "disk path is required"));
        }
        if self.buffer.offset_dir.trim().is_empty() {
            return Err(invalid("buffer.offset_dir", "offset directory is required"));
        }

        if self.sender.max_batch_size == 0 {
            return Err(invalid("sender.max_batch_size", "must be greater than 0"));
        }
        if self.sender.send_interval_secs == 0 {
            return Err(invalid("sender.send_interval_secs", "must be greater than 0"));
        }

        let valid_policies = ["drop", "block"];
        if !valid_policies.contains(&self.tailer.backpressure.as_str()) {
            return Err(invalid(
                "tailer.backpressure",
                format!("must be one of: {}", valid_policies.join(", ")),
            ));
        }
        if self.tailer.channel_capacity == 0 {
            return Err(invalid("tailer.channel_capacity", "must be greater than 0"));
        }

        Ok(())
    }

    /// 수집 서버 기본 URL (`http://host:port`)
    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server.host, self.server.port)
    }

    /// 활성화된 소스만 순회합니다.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 로그 파일 경로. 비어 있으면 stdout
    pub log_file: String,
    /// PID 파일 경로. 비어 있으면 기록하지 않음
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            log_file: String::new(),
            pid_file: String::new(),
        }
    }
}

/// 에이전트 식별 정보
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// 에이전트 ID (필수)
    pub id: String,
    /// 이벤트에 기록할 호스트명. 비어 있으면 시스템 호스트명
    pub hostname: String,
}

/// 수집 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 호스트
    pub host: String,
    /// 포트
    pub port: u16,
    /// 대상 데이터베이스 이름
    pub database: String,
    /// 대상 컬렉션 이름
    pub collection: String,
    /// 배치 적재 경로
    pub ingest_path: String,
    /// 헬스 체크 경로
    pub health_path: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 8080,
            database: "siem".to_owned(),
            collection: "events".to_owned(),
            ingest_path: "/query".to_owned(),
            health_path: "/health".to_owned(),
            timeout_secs: 10,
        }
    }
}

/// 로그 소스 하나의 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// 소스 종류
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// 파일 경로
    pub path: String,
    /// 활성화 여부 (생략 시 true)
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl SourceConfig {
    pub fn new(kind: SourceKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            enabled: true,
        }
    }

    pub fn path_buf(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }
}

/// 이벤트 버퍼 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// 메모리 버퍼 용량 (이벤트 수)
    pub memory_size: usize,
    /// 오버플로우 스냅샷 경로. 디렉토리면 그 안의 `buffer.json`
    pub disk_path: String,
    /// 소스별 오프셋 파일 디렉토리
    pub offset_dir: String,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            memory_size: 10_000,
            disk_path: "/var/lib/logship/buffer.json".to_owned(),
            offset_dir: "/var/lib/logship/offsets".to_owned(),
        }
    }
}

/// 배치 전송 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// 배치당 최대 이벤트 수
    pub max_batch_size: usize,
    /// 주기적 드레인 간격 (초)
    #[serde(alias = "send_interval")]
    pub send_interval_secs: u64,
    /// 재시도 간 대기 시간 (초)
    #[serde(alias = "retry_interval")]
    pub retry_interval_secs: u64,
    /// 최초 시도 이후 추가 재시도 횟수
    pub max_retries: u32,
    /// 종료 시 마지막 드레인 제한 시간 (초)
    pub shutdown_timeout_secs: u64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            send_interval_secs: 10,
            retry_interval_secs: 5,
            max_retries: 3,
            shutdown_timeout_secs: 30,
        }
    }
}

/// 파일 tailing 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TailerConfig {
    /// 로테이션/절단 감지용 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 파일이 사라진 뒤 재오픈 전 대기 시간 (밀리초)
    pub reopen_delay_ms: u64,
    /// tailer -> 집계 태스크 채널 용량
    pub channel_capacity: usize,
    /// 실시간 tailing 중 채널 포화 시 동작 (drop, block)
    pub backpressure: String,
    /// 최대 라인 길이 (바이트). 초과하면 건너뜀
    pub max_line_length: usize,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            reopen_delay_ms: 100,
            channel_capacity: 100,
            backpressure: "drop".to_owned(),
            max_line_length: 64 * 1024,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn invalid(field: &str, reason: impl Into<String>) -> LogshipError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// `~/`로 시작하는 경로를 `$HOME` 기준으로 확장합니다.
pub fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest).display().to_string(),
        _ => path.to_owned(),
    }
}

/// 시스템 호스트명. 조회에 실패하면 `"unknown"`
pub fn system_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_owned())
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        if !val.is_empty() {
            *target = val;
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) if parsed > 0 => *target = parsed,
            _ => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse port from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn runnable_config() -> LogshipConfig {
        let mut config = LogshipConfig::default();
        config.agent.id = "agent-001".to_owned();
        config
            .sources
            .push(SourceConfig::new(SourceKind::Auth, "/var/log/auth.log"));
        config
    }

    #[test]
    fn default_config_has_sane_values() {
        let config = LogshipConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.ingest_path, "/query");
        assert_eq!(config.server.timeout_secs, 10);
        assert_eq!(config.tailer.channel_capacity, 100);
        assert_eq!(config.tailer.reopen_delay_ms, 100);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_requires_agent_id() {
        let err = LogshipConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("agent.id"));
    }

    #[test]
    fn runnable_config_passes_validation() {
        runnable_config().validate().unwrap();
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[general]
log_level = "debug"
log_format = "pretty"
log_file = "~/logship/agent.log"

[agent]
id = "agent-42"
hostname = "web-01"

[server]
host = "10.0.0.5"
port = 9000
database = "security"
collection = "host_events"

[[sources]]
type = "bash_history"
path = "~/.bash_history"

[[sources]]
type = "auth"
path = "/var/log/auth.log"
enabled = false

[[sources]]
type = "auditd"
path = "/var/log/audit/audit.log"

[buffer]
memory_size = 500
disk_path = "/tmp/logship"

[sender]
max_batch_size = 50
send_interval = 2
retry_interval = 1
max_retries = 5
"#;
        let config = LogshipConfig::parse(toml).unwrap();
        assert_eq!(config.agent.id, "agent-42");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.sources[0].kind, SourceKind::BashHistory);
        assert!(config.sources[0].enabled);
        assert!(!config.sources[1].enabled);
        assert_eq!(config.enabled_sources().count(), 2);
        assert_eq!(config.buffer.memory_size, 500);
        // 짧은 이름 별칭
        assert_eq!(config.sender.send_interval_secs, 2);
        assert_eq!(config.sender.retry_interval_secs, 1);
        assert_eq!(config.sender.max_retries, 5);
        // 생략된 필드는 기본값
        assert_eq!(config.server.health_path, "/health");
        config.validate().unwrap();
    }

    #[test]
    fn unknown_source_type_is_parse_error() {
        let toml = r#"
[[sources]]
type = "journald"
path = "/run/log/journal"
"#;
        let err = LogshipConfig::parse(toml).unwrap_err();
        assert!(matches!(
            err,
            LogshipError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let result = LogshipConfig::parse("invalid = [[[toml");
        assert!(matches!(
            result,
            Err(LogshipError::Config(ConfigError::ParseFailed { .. }))
        ));
    }

    #[test]
    fn validate_rejects_missing_host() {
        let mut config = runnable_config();
        config.server.host = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.host"));
    }

    #[test]
    fn validate_rejects_zero_port() {
        let mut config = runnable_config();
        config.server.port = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn validate_rejects_no_sources() {
        let mut config = runnable_config();
        config.sources.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sources"));
    }

    #[test]
    fn validate_rejects_all_sources_disabled() {
        let mut config = runnable_config();
        config.sources[0].enabled = false;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("enabled"));
    }

    #[test]
    fn validate_rejects_zero_memory_size() {
        let mut config = runnable_config();
        config.buffer.memory_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("buffer.memory_size"));
    }

    #[test]
    fn validate_rejects_unknown_backpressure() {
        let mut config = runnable_config();
        config.tailer.backpressure = "spill".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tailer.backpressure"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = runnable_config();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn server_url_joins_host_and_port() {
        let mut config = runnable_config();
        config.server.host = "collector".to_owned();
        config.server.port = 8443;
        assert_eq!(config.server_url(), "http://collector:8443");
    }

    #[test]
    #[serial]
    fn expand_home_uses_home_env() {
        let original = std::env::var_os("HOME");
        // SAFETY: serial 테스트로 환경변수 접근이 직렬화됩니다.
        unsafe { std::env::set_var("HOME", "/home/tester") };
        assert_eq!(expand_home("~/.bash_history"), "/home/tester/.bash_history");
        assert_eq!(expand_home("/var/log/syslog"), "/var/log/syslog");
        assert_eq!(expand_home("~user/x"), "~user/x");
        match original {
            Some(home) => unsafe { std::env::set_var("HOME", home) },
            None => unsafe { std::env::remove_var("HOME") },
        }
    }

    #[test]
    fn resolve_fills_empty_hostname() {
        let mut config = runnable_config();
        config.agent.hostname = String::new();
        config.resolve();
        assert!(!config.agent.hostname.is_empty());
    }

    #[test]
    fn resolve_keeps_explicit_hostname() {
        let mut config = runnable_config();
        config.agent.hostname = "edge-7".to_owned();
        config.resolve();
        assert_eq!(config.agent.hostname, "edge-7");
    }

    #[test]
    #[serial]
    fn env_overrides_server_and_agent() {
        let mut config = runnable_config();
        // SAFETY: serial 테스트로 환경변수 접근이 직렬화됩니다.
        unsafe {
            std::env::set_var("LOGSHIP_SERVER_HOST", "collector.internal");
            std::env::set_var("LOGSHIP_SERVER_PORT", "9443");
            std::env::set_var("LOGSHIP_AGENT_ID", "from-env");
        }
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("LOGSHIP_SERVER_HOST");
            std::env::remove_var("LOGSHIP_SERVER_PORT");
            std::env::remove_var("LOGSHIP_AGENT_ID");
        }
        assert_eq!(config.server.host, "collector.internal");
        assert_eq!(config.server.port, 9443);
        assert_eq!(config.agent.id, "from-env");
    }

    #[test]
    #[serial]
    fn env_override_invalid_port_keeps_original() {
        let mut port = 8080;
        // SAFETY: serial 테스트로 환경변수 접근이 직렬화됩니다.
        unsafe { std::env::set_var("TEST_LOGSHIP_PORT_BAD", "not-a-port") };
        override_u16(&mut port, "TEST_LOGSHIP_PORT_BAD");
        assert_eq!(port, 8080);
        unsafe { std::env::set_var("TEST_LOGSHIP_PORT_BAD", "0") };
        override_u16(&mut port, "TEST_LOGSHIP_PORT_BAD");
        assert_eq!(port, 8080);
        unsafe { std::env::remove_var("TEST_LOGSHIP_PORT_BAD") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_LOGSHIP_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let result = LogshipConfig::from_file("/nonexistent/path/logship.toml").await;
        assert!(matches!(
            result,
            Err(LogshipError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[tokio::test]
    #[serial]
    async fn load_applies_env_then_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logship.toml");
        std::fs::write(
            &path,
            "[[sources]]\ntype = \"syslog\"\npath = \"/var/log/syslog\"\n",
        )
        .unwrap();

        // agent.id가 파일에 없으므로 실패
        assert!(LogshipConfig::load(&path).await.is_err());

        // SAFETY: serial 테스트로 환경변수 접근이 직렬화됩니다.
        unsafe { std::env::set_var("LOGSHIP_AGENT_ID", "env-agent") };
        let loaded = LogshipConfig::load(&path).await;
        unsafe { std::env::remove_var("LOGSHIP_AGENT_ID") };

        let config = loaded.unwrap();
        assert_eq!(config.agent.id, "env-agent");
        assert!(!config.agent.hostname.is_empty());
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = runnable_config();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = LogshipConfig::parse(&toml_str).unwrap();
        assert_eq!(parsed.agent.id, config.agent.id);
        assert_eq!(parsed.sources, config.sources);
        assert_eq!(parsed.sender.max_retries, config.sender.max_retries);
    }
}
