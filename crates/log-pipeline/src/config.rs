//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`LogshipConfig`]에서 파이프라인이 쓰는 값만 추려
//! 단위를 정리한 설정입니다. HTTP 전송 관련 값은
//! [`SenderSettings`](crate::sender::SenderSettings)가 따로 가집니다.
//!
//! # 사용 예시
//! ```ignore
//! use logship_core::config::LogshipConfig;
//! use logship_log_pipeline::config::PipelineConfig;
//!
//! let core_config = LogshipConfig::load("/etc/logship/logship.toml").await?;
//! let config = PipelineConfig::from_core(&core_config);
//! config.validate()?;
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use logship_core::config::{LogshipConfig, SourceConfig};

use crate::collector::{BackpressurePolicy, TailerSettings};
use crate::error::LogPipelineError;

/// 버퍼 용량 상한
const MAX_BUFFER_CAPACITY: usize = 10_000_000;

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 에이전트 식별자
    pub agent_id: String,
    /// 이벤트에 기록할 호스트명
    pub hostname: String,
    /// tail할 소스 목록 (활성화된 것만)
    pub sources: Vec<SourceConfig>,

    /// 인메모리 버퍼 용량 (이벤트 수)
    pub buffer_capacity: usize,
    /// 오버플로우 스냅샷 경로
    pub overflow_path: PathBuf,
    /// 오프셋 파일 디렉토리
    pub offset_dir: PathBuf,

    /// 드레인 한 번에 보내는 최대 이벤트 수
    pub batch_size: usize,
    /// 주기적 드레인 간격 (초)
    pub send_interval_secs: u64,
    /// 종료 시 마지막 드레인 제한 시간 (초)
    pub shutdown_timeout_secs: u64,

    /// 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 재오픈 대기 (밀리초)
    pub reopen_delay_ms: u64,
    /// tailer -> 집계 태스크 채널 용량
    pub channel_capacity: usize,
    /// 실시간 tailing 배압 정책
    pub backpressure: BackpressurePolicy,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            agent_id: "agent-001".to_owned(),
            hostname: "localhost".to_owned(),
            sources: Vec::new(),
            buffer_capacity: 10_000,
            overflow_path: PathBuf::from("/var/lib/logship/buffer.json"),
            offset_dir: PathBuf::from("/var/lib/logship/offsets"),
            batch_size: 100,
            send_interval_secs: 10,
            shutdown_timeout_secs: 30,
            poll_interval_ms: 1000,
            reopen_delay_ms: 100,
            channel_capacity: 100,
            backpressure: BackpressurePolicy::Drop,
            max_line_length: 64 * 1024,
        }
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    ///
    /// 비활성화된 소스는 제외됩니다.
    pub fn from_core(core: &LogshipConfig) -> Self {
        let backpressure = core.tailer.backpressure.parse().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to drop backpressure policy");
            BackpressurePolicy::Drop
        });

        Self {
            agent_id: core.agent.id.clone(),
            hostname: core.agent.hostname.clone(),
            sources: core.enabled_sources().cloned().collect(),
            buffer_capacity: core.buffer.memory_size,
            overflow_path: PathBuf::from(&core.buffer.disk_path),
            offset_dir: PathBuf::from(&core.buffer.offset_dir),
            batch_size: core.sender.max_batch_size,
            send_interval_secs: core.sender.send_interval_secs,
            shutdown_timeout_secs: core.sender.shutdown_timeout_secs,
            poll_interval_ms: core.tailer.poll_interval_ms,
            reopen_delay_ms: core.tailer.reopen_delay_ms,
            channel_capacity: core.tailer.channel_capacity,
            backpressure,
            max_line_length: core.tailer.max_line_length,
        }
    }

    /// tailer에 넘길 동작 설정
    pub fn tailer_settings(&self) -> TailerSettings {
        TailerSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            reopen_delay: Duration::from_millis(self.reopen_delay_ms),
            backpressure: self.backpressure,
            max_line_length: self.max_line_length,
            channel_capacity: self.channel_capacity,
        }
    }

    /// 주기적 드레인 간격
    pub fn send_interval(&self) -> Duration {
        Duration::from_secs(self.send_interval_secs)
    }

    /// 종료 드레인 제한 시간
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        let invalid = |field: &str, reason: &str| LogPipelineError::Config {
            field: field.to_owned(),
            reason: reason.to_owned(),
        };

        if self.agent_id.trim().is_empty() {
            return Err(invalid("agent_id", "must not be empty"));
        }
        if self.sources.is_empty() {
            return Err(invalid("sources", "at least one enabled source is required"));
        }
        if let Some(source) = self.sources.iter().find(|s| s.path.trim().is_empty()) {
            return Err(LogPipelineError::Config {
                field: "sources".to_owned(),
                reason: format!("{} source has an empty path", source.kind),
            });
        }
        if self.buffer_capacity == 0 || self.buffer_capacity > MAX_BUFFER_CAPACITY {
            return Err(LogPipelineError::Config {
                field: "buffer_capacity".to_owned(),
                reason: format!("must be 1-{MAX_BUFFER_CAPACITY}"),
            });
        }
        if self.overflow_path.as_os_str().is_empty() {
            return Err(invalid("overflow_path", "must not be empty"));
        }
        if self.offset_dir.as_os_str().is_empty() {
            return Err(invalid("offset_dir", "must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be greater than 0"));
        }
        if self.send_interval_secs == 0 {
            return Err(invalid("send_interval_secs", "must be greater than 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", "must be greater than 0"));
        }
        if self.channel_capacity == 0 {
            return Err(invalid("channel_capacity", "must be greater than 0"));
        }
        Ok(())
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 에이전트 식별자를 설정합니다.
    pub fn agent_id(mut self, id: impl Into<String>) -> Self {
        self.config.agent_id = id.into();
        self
    }

    /// 호스트명을 설정합니다.
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.config.hostname = hostname.into();
        self
    }

    /// 소스를 하나 추가합니다.
    pub fn source(mut self, source: SourceConfig) -> Self {
        self.config.sources.push(source);
        self
    }

    /// 버퍼 용량을 설정합니다.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// 오버플로우 스냅샷 경로를 설정합니다.
    pub fn overflow_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.overflow_path = path.into();
        self
    }

    /// 오프셋 디렉토리를 설정합니다.
    pub fn offset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.offset_dir = dir.into();
        self
    }

    /// 배치 크기를 설정합니다.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// 드레인 간격(초)을 설정합니다.
    pub fn send_interval_secs(mut self, secs: u64) -> Self {
        self.config.send_interval_secs = secs;
        self
    }

    /// 종료 드레인 제한 시간(초)을 설정합니다.
    pub fn shutdown_timeout_secs(mut self, secs: u64) -> Self {
        self.config.shutdown_timeout_secs = secs;
        self
    }

    /// 폴링 주기(밀리초)를 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 재오픈 대기(밀리초)를 설정합니다.
    pub fn reopen_delay_ms(mut self, ms: u64) -> Self {
        self.config.reopen_delay_ms = ms;
        self
    }

    /// 채널 용량을 설정합니다.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// 배압 정책을 설정합니다.
    pub fn backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.config.backpressure = policy;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
