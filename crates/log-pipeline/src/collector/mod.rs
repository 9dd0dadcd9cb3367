//! 로그 수집 모듈 -- 로컬 파일을 tail하여 이벤트를 만듭니다.
//!
//! # 구성
//! - [`SourceTailer`]: 파일 하나를 따라가며 파싱된 [`Event`](logship_core::Event)를 채널로 보냄
//! - [`OffsetStore`]: 소스별 읽기 위치를 디스크에 보존
//!
//! # 아키텍처
//! tailer 하나당 두 개의 tokio 태스크가 돕니다.
//! 재생(replay) 태스크는 저장된 오프셋부터 파일 끝까지 읽고,
//! 감시(watch) 태스크는 파일 변경 알림과 주기적 폴링으로 새 라인을 따라갑니다.
//! 두 태스크는 같은 상태 뮤텍스를 공유하며, 감시 태스크는 재생이 끝날 때까지
//! 파일을 읽지 않습니다.

pub mod offset;
pub mod tailer;

pub use offset::OffsetStore;
pub use tailer::{EventStream, SourceTailer, TailerSettings};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LogPipelineError;

/// tailer 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailerStatus {
    /// 실행 대기 중
    Idle,
    /// 실행 중
    Running,
    /// 정상 종료됨
    Stopped,
}

/// 소비자 채널이 가득 찼을 때의 동작
///
/// 재생 중에는 정책과 무관하게 항상 기다립니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackpressurePolicy {
    /// 이벤트를 버리고 오프셋은 전진
    #[default]
    Drop,
    /// 자리가 날 때까지 대기
    Block,
}

impl BackpressurePolicy {
    /// 설정 문자열 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for BackpressurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackpressurePolicy {
    type Err = LogPipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "block" => Ok(Self::Block),
            other => Err(LogPipelineError::Config {
                field: "tailer.backpressure".to_owned(),
                reason: format!("unknown policy '{other}', expected 'drop' or 'block'"),
            }),
        }
    }
}
