//! 배치 전송 -- 수집 서버로 이벤트 배치를 HTTP로 보냅니다.
//!
//! # 프로토콜
//! - 전송: `POST {ingest_url}`, 본문 `{"database", "collection", "events": [...]}`
//! - 응답: `{"status": "success" | ..., "message": "..."}`. `success`가 아니면 실패
//! - 헬스 체크: `GET {health_url}`, 200이 아니면 연결 실패
//!
//! # 재시도
//! 실패하면 `retry_interval`만큼 쉬고 다시 시도하며, 최대 `max_retries + 1`번 시도합니다.
//! 배치에는 중복 제거 키가 없으므로 서버가 일부만 반영한 뒤 재전송되면
//! 중복이 생길 수 있습니다 (at-least-once).

use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use logship_core::config::LogshipConfig;
use logship_core::error::TransportError;
use logship_core::event::{BatchMessage, Event};
use logship_core::metrics as m;

use crate::error::LogPipelineError;

/// 이벤트 배치를 받아 가는 목적지
///
/// 파이프라인은 이 trait을 통해 전송하므로 테스트에서 HTTP 없이 대체할 수 있습니다.
pub trait EventSink: Send + Sync + 'static {
    /// 배치를 전송합니다. 재시도를 모두 소진하면 에러를 반환합니다.
    fn send(&self, batch: &[Event]) -> impl Future<Output = Result<(), LogPipelineError>> + Send;

    /// 전송 상태에 영향을 주지 않는 연결 확인
    fn test_connectivity(&self) -> impl Future<Output = Result<(), LogPipelineError>> + Send;
}

/// HTTP 전송 설정
#[derive(Debug, Clone)]
pub struct SenderSettings {
    /// 에이전트 식별자
    pub agent_id: String,
    /// 배치 전송 URL
    pub ingest_url: String,
    /// 헬스 체크 URL
    pub health_url: String,
    /// 대상 데이터베이스
    pub database: String,
    /// 대상 컬렉션
    pub collection: String,
    /// 요청 타임아웃
    pub timeout: Duration,
    /// 재시도 간격
    pub retry_interval: Duration,
    /// 첫 시도 이후 추가 시도 횟수
    pub max_retries: u32,
}

impl SenderSettings {
    /// core 설정에서 전송 설정을 만듭니다.
    pub fn from_core(core: &LogshipConfig) -> Self {
        let base = core.server_url();
        Self {
            agent_id: core.agent.id.clone(),
            ingest_url: format!("{base}{}", core.server.ingest_path),
            health_url: format!("{base}{}", core.server.health_path),
            database: core.server.database.clone(),
            collection: core.server.collection.clone(),
            timeout: Duration::from_secs(core.server.timeout_secs),
            retry_interval: Duration::from_secs(core.sender.retry_interval_secs),
            max_retries: core.sender.max_retries,
        }
    }
}

#[derive(Serialize)]
struct IngestRequest<'a> {
    database: &'a str,
    collection: &'a str,
    events: &'a [Event],
}

#[derive(Deserialize)]
struct IngestResponse {
    status: String,
    #[serde(default)]
    message: String,
}

/// HTTP 배치 전송기
pub struct HttpSender {
    client: reqwest::Client,
    settings: SenderSettings,
}

impl HttpSender {
    /// 새 전송기를 생성합니다.
    pub fn new(settings: SenderSettings) -> Result<Self, LogPipelineError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { client, settings })
    }

    /// 전송 설정
    pub fn settings(&self) -> &SenderSettings {
        &self.settings
    }

    async fn attempt(&self, message: &BatchMessage) -> Result<(), TransportError> {
        let body = IngestRequest {
            database: &self.settings.database,
            collection: &self.settings.collection,
            events: &message.events,
        };

        let response = self
            .client
            .post(&self.settings.ingest_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let reply: IngestResponse = serde_json::from_str(&text).map_err(|e| {
            TransportError::Request(format!("unreadable collector response: {e}"))
        })?;

        if reply.status != "success" {
            return Err(TransportError::Rejected {
                status: reply.status,
                message: reply.message,
            });
        }
        Ok(())
    }
}

impl EventSink for HttpSender {
    async fn send(&self, batch: &[Event]) -> Result<(), LogPipelineError> {
        if batch.is_empty() {
            return Ok(());
        }

        let message = BatchMessage::new(self.settings.agent_id.clone(), batch.to_vec());
        let attempts = self.settings.max_retries.saturating_add(1);
        let started = Instant::now();
        let mut last = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                metrics::counter!(m::SENDER_RETRIES_TOTAL).increment(1);
                tracing::info!(
                    attempt,
                    max_attempts = attempts,
                    retry_in_secs = self.settings.retry_interval.as_secs_f64(),
                    "retrying batch"
                );
                tokio::time::sleep(self.settings.retry_interval).await;
            }

            match self.attempt(&message).await {
                Ok(()) => {
                    metrics::counter!(m::SENDER_BATCHES_TOTAL, m::LABEL_RESULT => "success")
                        .increment(1);
                    metrics::counter!(m::SENDER_EVENTS_SENT_TOTAL).increment(batch.len() as u64);
                    metrics::histogram!(m::SENDER_SEND_DURATION_SECONDS)
                        .record(started.elapsed().as_secs_f64());
                    tracing::info!(
                        agent_id = %message.agent_id,
                        count = batch.len(),
                        attempt,
                        database = %self.settings.database,
                        collection = %self.settings.collection,
                        "batch delivered"
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "batch delivery attempt failed");
                    last = e.to_string();
                }
            }
        }

        metrics::counter!(m::SENDER_BATCHES_TOTAL, m::LABEL_RESULT => "failure").increment(1);
        Err(TransportError::Exhausted { attempts, last }.into())
    }

    async fn test_connectivity(&self) -> Result<(), LogPipelineError> {
        let response = self
            .client
            .get(&self.settings.health_url)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(TransportError::Status(status.as_u16()).into());
        }
        Ok(())
    }
}
