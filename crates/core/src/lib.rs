//! logship 공통 크레이트
//!
//! 에이전트를 구성하는 모든 크레이트가 공유하는 타입, trait, 에러, 설정을 정의합니다.
//!
//! # 모듈 구성
//!
//! - [`config`]: `logship.toml` 파싱, 환경변수 오버라이드, 검증
//! - [`error`]: 도메인별 에러 타입
//! - [`event`]: 정규화된 보안 이벤트와 전송 메시지
//! - [`metrics`]: Prometheus 메트릭 이름 상수
//! - [`pipeline`]: 파이프라인 생명주기 및 파서 trait
//! - [`types`]: 심각도, 소스 종류 등 공통 열거형

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{
    ConfigError, LogshipError, ParseError, PipelineError, StorageError, TransportError,
};

// 설정
pub use config::LogshipConfig;

// 이벤트
pub use event::{BatchMessage, Event};

// 파이프라인 trait
pub use pipeline::{HealthStatus, LogParser, Pipeline};

// 도메인 타입
pub use types::{Severity, SourceKind};
