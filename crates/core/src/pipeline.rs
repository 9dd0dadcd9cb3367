//! 파이프라인 trait -- 모듈 생명주기와 파서 확장 포인트 정의

use std::future::Future;

use crate::error::LogshipError;
use crate::event::Event;

/// 모듈 상태 점검 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 성능 저하 또는 일시 장애
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 데몬이 관리하는 장기 실행 모듈의 생명주기
///
/// `start` → `stop` 순서로 한 번씩 호출됩니다.
pub trait Pipeline: Send {
    /// 모듈을 시작합니다. 백그라운드 태스크를 스폰한 뒤 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LogshipError>> + Send;

    /// 모듈을 정지하고 남은 작업을 정리합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LogshipError>> + Send;

    /// 현재 상태를 점검합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// 로그 라인 파서 trait
///
/// `Err`는 "이 라인은 건너뛴다"는 의미입니다. 호출자는 에러를
/// 전파하지 않고 다음 라인으로 넘어갑니다.
pub trait LogParser: Send + Sync {
    /// 이벤트의 `source` 필드에 기록될 소스 이름
    fn source_type(&self) -> &str;

    /// 한 줄을 이벤트로 변환합니다.
    fn parse(&self, line: &str, hostname: &str) -> Result<Event, LogshipError>;
}
