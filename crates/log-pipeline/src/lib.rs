//! logship 로그 파이프라인
//!
//! 로컬 로그 파일을 tail하여 정규화된 이벤트로 만들고, 버퍼링한 뒤
//! 수집 서버로 배치 전송합니다.
//!
//! # 모듈 구성
//!
//! - [`collector`]: 파일 tailer와 오프셋 저장소
//! - [`parser`]: bash history, syslog/auth, auditd 라인 파서
//! - [`buffer`]: 고정 용량 링 버퍼와 디스크 오버플로우
//! - [`sender`]: 재시도하는 HTTP 배치 전송
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정에서 파생)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! SourceTailer x N -> mpsc -> RingBuffer -> drain timer -> HttpSender -> collector
//!      |                          |
//!  OffsetStore              OverflowStore (buffer.json)
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod sender;

pub mod collector;
pub mod parser;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{AgentPipeline, AgentPipelineBuilder, PipelineStats};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 파서
pub use parser::{AuditdParser, BashHistoryParser, SourceParser, SyslogParser};

// 수집기
pub use collector::{BackpressurePolicy, OffsetStore, SourceTailer, TailerSettings};

// 버퍼
pub use buffer::{OverflowStore, RingBuffer};

// 전송
pub use sender::{EventSink, HttpSender, SenderSettings};
