//! 파이프라인 오케스트레이션 -- tailer/버퍼/전송의 전체 흐름을 관리합니다.
//!
//! [`AgentPipeline`]은 core의 [`Pipeline`] trait을 구현하여
//! `logship-daemon`에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! SourceTailer x N -> mpsc -> aggregator -> RingBuffer -> drain timer -> EventSink
//!                                              |
//!                                              +-> OverflowStore (가득 참 / 종료)
//! ```
//!
//! # 상태 전이
//! `Idle -> Starting -> Running -> Stopping -> Stopped`. 정지 후에는 다시 시작할 수 없습니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use logship_core::error::{LogshipError, PipelineError};
use logship_core::metrics as m;
use logship_core::pipeline::{HealthStatus, Pipeline};

use crate::buffer::{OverflowStore, RingBuffer};
use crate::collector::{OffsetStore, SourceTailer};
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::sender::EventSink;

/// 버퍼 사용률이 이 값 이상이면 Degraded
const DEGRADED_UTILIZATION: f64 = 0.9;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// 누적 처리 통계
#[derive(Debug, Default)]
struct Counters {
    buffered: AtomicU64,
    buffer_errors: AtomicU64,
    sent: AtomicU64,
    failed_drains: AtomicU64,
    last_drain_failed: AtomicBool,
}

/// 파이프라인 통계 스냅샷
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    /// 버퍼에 들어간 이벤트 수
    pub events_buffered: u64,
    /// 오버플로우 flush 실패로 버려진 이벤트 수
    pub buffer_errors: u64,
    /// 전송 완료 후 버퍼에서 제거된 이벤트 수
    ///
    /// 전송 중 버퍼가 스냅샷으로 비워진 배치는 다음 시작 때 다시 전송되므로 세지 않습니다.
    pub events_sent: u64,
    /// 실패한 드레인 횟수
    pub failed_drains: u64,
}

/// 로그 수집 에이전트 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use logship_log_pipeline::{AgentPipelineBuilder, HttpSender, PipelineConfig, SenderSettings};
///
/// let sender = HttpSender::new(SenderSettings::from_core(&core_config))?;
/// let mut pipeline = AgentPipelineBuilder::new()
///     .config(PipelineConfig::from_core(&core_config))
///     .sink(sender)
///     .build()?;
///
/// pipeline.start().await?;
/// // ... 종료 신호 대기
/// pipeline.stop().await?;
/// ```
pub struct AgentPipeline<S: EventSink> {
    config: PipelineConfig,
    state: PipelineState,
    sink: Arc<S>,
    buffer: Option<Arc<Mutex<RingBuffer>>>,
    tailers: Vec<SourceTailer>,
    tasks: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
    counters: Arc<Counters>,
}

impl<S: EventSink> AgentPipeline<S> {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Idle => "idle",
            PipelineState::Starting => "starting",
            PipelineState::Running => "running",
            PipelineState::Stopping => "stopping",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 실행 중인 tailer 수
    pub fn active_sources(&self) -> usize {
        self.tailers.len()
    }

    /// 버퍼에 있는 이벤트 수 (시작 전이면 0)
    pub async fn buffer_size(&self) -> usize {
        match &self.buffer {
            Some(buffer) => buffer.lock().await.size(),
            None => 0,
        }
    }

    /// 누적 통계
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            events_buffered: self.counters.buffered.load(Ordering::Relaxed),
            buffer_errors: self.counters.buffer_errors.load(Ordering::Relaxed),
            events_sent: self.counters.sent.load(Ordering::Relaxed),
            failed_drains: self.counters.failed_drains.load(Ordering::Relaxed),
        }
    }

    /// 전송 대상
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 파이프라인 종료 토큰. 취소되면 모든 태스크가 멈추기 시작합니다.
    ///
    /// 데몬은 이 토큰과 시그널을 함께 기다렸다가 [`Pipeline::stop`]을 호출합니다.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 타이머를 기다리지 않고 드레인을 한 번 수행합니다. 보낸 이벤트 수를 반환합니다.
    pub async fn drain_now(&self) -> Result<usize, LogshipError> {
        let buffer = self
            .buffer
            .as_ref()
            .ok_or(LogshipError::Pipeline(PipelineError::NotRunning))?;
        drain_once(buffer, self.sink.as_ref(), self.config.batch_size, &self.counters)
            .await
            .map_err(LogshipError::from)
    }

    /// 설정된 소스마다 tailer를 만들고 시작합니다. 실패한 소스는 건너뜁니다.
    async fn start_tailers(&mut self, tx: &mpsc::Sender<logship_core::Event>) {
        let offsets = OffsetStore::new(&self.config.offset_dir);
        if let Err(e) = offsets.ensure_dir().await {
            tracing::warn!(error = %e, "offset directory unavailable, offsets will not persist");
        }
        let settings = self.config.tailer_settings();

        for source in &self.config.sources {
            let tailer = SourceTailer::new(
                source,
                self.config.hostname.clone(),
                offsets.clone(),
                settings.clone(),
                tx.clone(),
                &self.cancel,
            );
            let mut tailer = match tailer {
                Ok(tailer) => tailer,
                Err(e) => {
                    tracing::warn!(source = %source.kind, path = %source.path, error = %e, "skipping source");
                    continue;
                }
            };

            match tailer.start().await {
                Ok(()) => self.tailers.push(tailer),
                Err(e) => {
                    tracing::warn!(source = %source.kind, path = %source.path, error = %e, "skipping source");
                }
            }
        }
    }
}

impl<S: EventSink> Pipeline for AgentPipeline<S> {
    async fn start(&mut self) -> Result<(), LogshipError> {
        match self.state {
            PipelineState::Idle => {}
            PipelineState::Starting | PipelineState::Running => {
                return Err(PipelineError::AlreadyRunning.into());
            }
            PipelineState::Stopping | PipelineState::Stopped => {
                return Err(PipelineError::InitFailed("pipeline cannot be restarted".to_owned()).into());
            }
        }

        self.state = PipelineState::Starting;
        tracing::info!(
            agent_id = %self.config.agent_id,
            sources = self.config.sources.len(),
            "starting agent pipeline"
        );

        // 1. 수집 서버 연결 확인 (실패해도 계속 진행)
        match self.sink.test_connectivity().await {
            Ok(()) => tracing::info!("collector reachable"),
            Err(e) => tracing::warn!(error = %e, "collector unreachable, batches will be retried"),
        }

        // 2. tailer 시작
        let (tx, mut rx) = mpsc::channel(self.config.channel_capacity.max(1));
        self.start_tailers(&tx).await;
        drop(tx);

        if self.tailers.is_empty() {
            self.state = PipelineState::Idle;
            tracing::error!("no log source could be opened");
            return Err(PipelineError::NoSources.into());
        }
        metrics::gauge!(m::AGENT_ACTIVE_SOURCES).set(self.tailers.len() as f64);

        // 3. 버퍼 열기 (스냅샷 복구)
        let overflow = OverflowStore::new(&self.config.overflow_path);
        let buffer = Arc::new(Mutex::new(
            RingBuffer::open(self.config.buffer_capacity, overflow).await,
        ));
        self.buffer = Some(Arc::clone(&buffer));

        // 4. 집계 태스크: 모든 tailer의 이벤트를 버퍼로
        let agg_buffer = Arc::clone(&buffer);
        let agg_counters = Arc::clone(&self.counters);
        let agg_cancel = self.cancel.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    event = rx.recv() => event,
                    _ = agg_cancel.cancelled() => {
                        // 새 입력을 막고 이미 채널에 있는 이벤트만 마저 받습니다.
                        rx.close();
                        rx.recv().await
                    }
                };
                let Some(event) = event else {
                    break;
                };

                let mut buffer = agg_buffer.lock().await;
                match buffer.add(event).await {
                    Ok(()) => {
                        agg_counters.buffered.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        agg_counters.buffer_errors.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(error = %e, "overflow flush failed, event dropped");
                    }
                }
            }
            tracing::debug!("aggregator finished");
        }));

        // 5. 주기적 드레인
        let drain_buffer = Arc::clone(&buffer);
        let drain_sink = Arc::clone(&self.sink);
        let drain_counters = Arc::clone(&self.counters);
        let drain_cancel = self.cancel.clone();
        let batch_size = self.config.batch_size;
        let interval = self.config.send_interval();
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // 첫 tick은 즉시 완료되므로 건너뜁니다.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = drain_cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    _ = drain_cancel.cancelled() => break,
                    _ = drain_once(&drain_buffer, drain_sink.as_ref(), batch_size, &drain_counters) => {}
                }
            }
            tracing::debug!("drain timer finished");
        }));

        self.state = PipelineState::Running;
        let buffered = buffer.lock().await.size();
        tracing::info!(
            active_sources = self.tailers.len(),
            buffered,
            "agent pipeline started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogshipError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        self.state = PipelineState::Stopping;
        tracing::info!("stopping agent pipeline");

        // 1. 모든 태스크에 종료 신호
        self.cancel.cancel();

        // 2. tailer 정지
        for tailer in &mut self.tailers {
            if let Err(e) = tailer.stop().await {
                tracing::warn!(source = %tailer.kind(), error = %e, "tailer stop failed");
            }
        }
        metrics::gauge!(m::AGENT_ACTIVE_SOURCES).set(0.0);

        // 3. 집계/드레인 태스크 종료 대기
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "pipeline task ended abnormally");
            }
        }

        let Some(buffer) = self.buffer.clone() else {
            self.state = PipelineState::Stopped;
            return Ok(());
        };

        // 4. 마지막 드레인 (제한 시간 내)
        let timeout = self.config.shutdown_timeout();
        match tokio::time::timeout(
            timeout,
            drain_once(&buffer, self.sink.as_ref(), self.config.batch_size, &self.counters),
        )
        .await
        {
            Ok(Ok(sent)) => tracing::info!(sent, "final drain complete"),
            Ok(Err(e)) => tracing::warn!(error = %e, "final drain failed"),
            Err(_) => tracing::warn!(timeout_secs = timeout.as_secs(), "final drain timed out"),
        }

        // 5. 남은 이벤트를 디스크로
        let result = {
            let mut buffer = buffer.lock().await;
            let remaining = buffer.size();
            let result = buffer.flush().await;
            match &result {
                Ok(discarded) if remaining > 0 => tracing::info!(
                    remaining,
                    discarded,
                    path = %buffer.overflow().path().display(),
                    "buffer flushed to overflow snapshot"
                ),
                Ok(_) => {}
                Err(e) => tracing::error!(remaining, error = %e, "failed to flush buffer at shutdown"),
            }
            result.map(|_| ())
        };

        self.state = PipelineState::Stopped;
        tracing::info!(stats = ?self.stats(), "agent pipeline stopped");
        result.map_err(LogshipError::from)
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.counters.last_drain_failed.load(Ordering::Relaxed) {
                    return HealthStatus::Degraded("last delivery attempt failed".to_owned());
                }
                let utilization = match &self.buffer {
                    Some(buffer) => buffer.lock().await.utilization(),
                    None => 0.0,
                };
                if utilization >= DEGRADED_UTILIZATION {
                    HealthStatus::Degraded(format!(
                        "buffer utilization high: {:.1}%",
                        utilization * 100.0
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Idle => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Starting => HealthStatus::Unhealthy("starting".to_owned()),
            PipelineState::Stopping => HealthStatus::Unhealthy("stopping".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 배치 하나를 꺼내 보내고, 성공하면 버퍼에서 제거합니다.
///
/// 전송 중에는 버퍼 잠금을 잡지 않습니다. 그 사이 오버플로우로 버퍼가 비워졌다면
/// (에포크 변경) 배치는 이미 스냅샷에 있으므로 제거하지 않습니다.
async fn drain_once<S: EventSink>(
    buffer: &Mutex<RingBuffer>,
    sink: &S,
    batch_size: usize,
    counters: &Counters,
) -> Result<usize, LogPipelineError> {
    let (batch, epoch) = {
        let buffer = buffer.lock().await;
        (buffer.peek_batch(batch_size), buffer.epoch())
    };
    if batch.is_empty() {
        counters.last_drain_failed.store(false, Ordering::Relaxed);
        return Ok(0);
    }

    if let Err(e) = sink.send(&batch).await {
        counters.failed_drains.fetch_add(1, Ordering::Relaxed);
        counters.last_drain_failed.store(true, Ordering::Relaxed);
        tracing::warn!(count = batch.len(), error = %e, "drain failed, batch kept for next cycle");
        return Err(e);
    }

    let mut buffer = buffer.lock().await;
    let removed = if buffer.epoch() == epoch {
        buffer.remove_front(batch.len())
    } else {
        tracing::debug!(
            count = batch.len(),
            "buffer was flushed during send, delivered events remain in snapshot"
        );
        0
    };
    counters.sent.fetch_add(removed as u64, Ordering::Relaxed);
    counters.last_drain_failed.store(false, Ordering::Relaxed);
    Ok(batch.len())
}

/// 에이전트 파이프라인 빌더
pub struct AgentPipelineBuilder<S: EventSink> {
    config: PipelineConfig,
    sink: Option<S>,
}

impl<S: EventSink> AgentPipelineBuilder<S> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            sink: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 전송 대상을 지정합니다.
    pub fn sink(mut self, sink: S) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 설정을 검증하고 파이프라인을 생성합니다.
    pub fn build(self) -> Result<AgentPipeline<S>, LogPipelineError> {
        self.config.validate()?;
        let sink = self.sink.ok_or_else(|| LogPipelineError::Config {
            field: "sink".to_owned(),
            reason: "an event sink is required".to_owned(),
        })?;

        Ok(AgentPipeline {
            config: self.config,
            state: PipelineState::Idle,
            sink: Arc::new(sink),
            buffer: None,
            tailers: Vec::new(),
            tasks: Vec::new(),
            cancel: CancellationToken::new(),
            counters: Arc::new(Counters::default()),
        })
    }
}

impl<S: EventSink> Default for AgentPipelineBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}
