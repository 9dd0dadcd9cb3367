//! 파일 tailer
//!
//! 로그 파일 하나를 `tail -f`처럼 따라가며 라인마다 파싱하여 이벤트 채널로 보냅니다.
//!
//! # 동작
//! - 시작 시 저장된 오프셋부터 파일 끝까지 재생합니다. 재생 중에는 채널이 가득 차도
//!   이벤트를 버리지 않고 기다립니다.
//! - 이후에는 파일 변경 알림(notify)과 주기적 폴링으로 추가된 라인을 읽습니다.
//!   채널이 가득 차면 [`BackpressurePolicy`]에 따라 버리거나 기다립니다.
//! - 이벤트를 넘길 때마다 오프셋을 전진시키고 즉시 디스크에 기록합니다.
//! - 개행으로 끝나지 않은 마지막 조각은 개행이 올 때까지 보류합니다.
//! - `max_line_length`를 넘는 라인은 메모리에 쌓지 않고 개행까지 버린 뒤,
//!   오프셋은 그 라인 끝으로 전진시킵니다.
//!
//! # 로테이션 감지
//! - inode 변경 (logrotate의 rename 후 재생성)
//! - 파일 삭제: `reopen_delay`만큼 기다린 뒤 다시 열기를 반복
//! - 파일 크기 축소 (truncation): 처음부터 다시 읽기
//!
//! 새 파일로 넘어가기 전 이전 핸들에 남은 라인을 먼저 읽습니다.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logship_core::config::SourceConfig;
use logship_core::event::Event;
use logship_core::metrics as m;
use logship_core::pipeline::LogParser;
use logship_core::types::SourceKind;

use super::{BackpressurePolicy, OffsetStore, TailerStatus};
use crate::error::LogPipelineError;
use crate::parser::SourceParser;

/// tailer가 내보내는 이벤트 스트림
///
/// tailer가 [`SourceTailer::stop`]으로 종료되면 스트림도 끝납니다.
pub type EventStream = mpsc::Receiver<Event>;

/// tailer 동작 설정
#[derive(Debug, Clone)]
pub struct TailerSettings {
    /// 변경 알림이 없을 때의 폴링 주기
    pub poll_interval: Duration,
    /// 파일이 사라진 뒤 다시 열기 전 대기 시간
    pub reopen_delay: Duration,
    /// 채널이 가득 찼을 때의 동작
    pub backpressure: BackpressurePolicy,
    /// 이보다 긴 라인은 건너뜀 (바이트)
    pub max_line_length: usize,
    /// [`SourceTailer::with_stream`]이 만드는 채널 용량
    pub channel_capacity: usize,
}

impl Default for TailerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            reopen_delay: Duration::from_millis(100),
            backpressure: BackpressurePolicy::Drop,
            max_line_length: 64 * 1024,
            channel_capacity: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// 시작 시 재생: 항상 대기
    Replay,
    /// 실시간 추적: 배압 정책 적용
    Follow,
}

enum Flow {
    Continue,
    Stop,
}

enum Handoff {
    Delivered,
    Dropped,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(meta: &std::fs::Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(_meta: &std::fs::Metadata) -> Option<Self> {
        None
    }
}

/// 재생/감시 태스크가 공유하는 가변 상태
struct TailState {
    reader: Option<BufReader<File>>,
    identity: Option<FileIdentity>,
    /// 완전히 소비한 라인 끝까지의 바이트 수
    offset: u64,
    /// 마지막으로 디스크에 기록한 오프셋
    persisted: u64,
    /// 개행을 기다리는 조각
    pending: Vec<u8>,
    /// 너무 길어 버리는 중인 라인에서 이미 건너뛴 바이트 수
    discarded: u64,
    tx: Option<mpsc::Sender<Event>>,
}

impl TailState {
    /// 파일에서 이미 읽은 위치
    fn cursor(&self) -> u64 {
        self.offset + self.pending.len() as u64 + self.discarded
    }

    /// 진행 중인 라인을 잊습니다.
    fn reset_line(&mut self) {
        self.pending.clear();
        self.discarded = 0;
    }
}

/// 불변 컨텍스트
struct TailContext {
    kind: SourceKind,
    path: PathBuf,
    hostname: String,
    parser: SourceParser,
    offsets: OffsetStore,
    settings: TailerSettings,
    cancel: CancellationToken,
}

/// 단일 파일 tailer
pub struct SourceTailer {
    ctx: Arc<TailContext>,
    state: Arc<Mutex<TailState>>,
    tasks: Vec<JoinHandle<()>>,
    status: TailerStatus,
}

impl SourceTailer {
    /// 새 tailer를 생성합니다.
    ///
    /// `parent` 토큰이 취소되면 이 tailer도 멈춥니다. 파싱된 이벤트는 `tx`로 전달됩니다.
    pub fn new(
        source: &SourceConfig,
        hostname: impl Into<String>,
        offsets: OffsetStore,
        settings: TailerSettings,
        tx: mpsc::Sender<Event>,
        parent: &CancellationToken,
    ) -> Result<Self, LogPipelineError> {
        let ctx = TailContext {
            kind: source.kind,
            path: source.path_buf(),
            hostname: hostname.into(),
            parser: SourceParser::for_kind(source.kind)?,
            offsets,
            settings,
            cancel: parent.child_token(),
        };

        Ok(Self {
            ctx: Arc::new(ctx),
            state: Arc::new(Mutex::new(TailState {
                reader: None,
                identity: None,
                offset: 0,
                persisted: 0,
                pending: Vec::new(),
                discarded: 0,
                tx: Some(tx),
            })),
            tasks: Vec::new(),
            status: TailerStatus::Idle,
        })
    }

    /// 자체 채널을 가진 tailer를 생성하고 이벤트 스트림을 함께 반환합니다.
    pub fn with_stream(
        source: &SourceConfig,
        hostname: impl Into<String>,
        offsets: OffsetStore,
        settings: TailerSettings,
        parent: &CancellationToken,
    ) -> Result<(Self, EventStream), LogPipelineError> {
        let (tx, rx) = mpsc::channel(settings.channel_capacity.max(1));
        let tailer = Self::new(source, hostname, offsets, settings, tx, parent)?;
        Ok((tailer, rx))
    }

    /// 파일을 열고 재생/감시 태스크를 시작합니다.
    ///
    /// 파일을 열 수 없으면 에러를 반환하며 태스크는 시작되지 않습니다.
    pub async fn start(&mut self) -> Result<(), LogPipelineError> {
        if self.status != TailerStatus::Idle {
            return Err(self.ctx.error("tailer can only be started once"));
        }

        let ctx = Arc::clone(&self.ctx);
        let len = tokio::fs::metadata(&ctx.path)
            .await
            .map_err(|e| ctx.error(e.to_string()))?
            .len();

        let saved = ctx.offsets.load(ctx.kind, &ctx.path).await;
        let offset = if saved > len {
            warn!(
                source = ctx.kind.as_str(),
                path = %ctx.path.display(),
                saved,
                len,
                "saved offset is past end of file, starting from 0"
            );
            0
        } else {
            saved
        };

        let (reader, identity) = ctx
            .open_at(offset)
            .await
            .map_err(|e| ctx.error(e.to_string()))?;

        {
            let mut state = self.state.lock().await;
            state.reader = Some(reader);
            state.identity = identity;
            state.offset = offset;
            state.persisted = saved;
            state.reset_line();
            ctx.persist(&mut state).await;
        }

        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let watcher = ctx.watch_parent(trigger_tx);

        // 재생이 끝날 때까지 감시 태스크가 상태를 잡지 못하도록 먼저 잠급니다.
        let guard = Arc::clone(&self.state).lock_owned().await;
        let replay_ctx = Arc::clone(&ctx);
        self.tasks.push(tokio::spawn(async move {
            let mut state = guard;
            match replay_ctx.read_available(&mut state, Mode::Replay).await {
                Ok(_) => debug!(
                    source = replay_ctx.kind.as_str(),
                    path = %replay_ctx.path.display(),
                    offset = state.offset,
                    "replay complete"
                ),
                Err(e) => warn!(
                    source = replay_ctx.kind.as_str(),
                    path = %replay_ctx.path.display(),
                    error = %e,
                    "replay failed"
                ),
            }
        }));

        let state = Arc::clone(&self.state);
        self.tasks.push(tokio::spawn(async move {
            let _watcher = watcher;
            let mut trigger_rx = trigger_rx;
            let mut ticker = tokio::time::interval(ctx.settings.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ctx.cancel.cancelled() => break,
                    Some(()) = trigger_rx.recv() => {}
                    _ = ticker.tick() => {}
                }

                let mut state = state.lock().await;
                match ctx.sync(&mut state).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Stop) => break,
                    Err(e) => warn!(
                        source = ctx.kind.as_str(),
                        path = %ctx.path.display(),
                        error = %e,
                        "tail pass failed"
                    ),
                }
            }

            debug!(source = ctx.kind.as_str(), path = %ctx.path.display(), "watch task finished");
        }));

        self.status = TailerStatus::Running;
        info!(
            source = self.ctx.kind.as_str(),
            path = %self.ctx.path.display(),
            offset,
            "tailer started"
        );
        Ok(())
    }

    /// tailer를 멈추고 파일을 닫습니다. 이벤트 스트림은 여기서 끝납니다.
    pub async fn stop(&mut self) -> Result<(), LogPipelineError> {
        self.ctx.cancel.cancel();

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(
                    source = self.ctx.kind.as_str(),
                    error = %e,
                    "tailer task ended abnormally"
                );
            }
        }

        let mut state = self.state.lock().await;
        self.ctx.persist(&mut state).await;
        state.reader = None;
        state.identity = None;
        state.reset_line();
        state.tx = None;
        let offset = state.offset;
        drop(state);

        self.status = TailerStatus::Stopped;
        info!(
            source = self.ctx.kind.as_str(),
            path = %self.ctx.path.display(),
            offset,
            "tailer stopped"
        );
        Ok(())
    }

    /// 소스 종류
    pub fn kind(&self) -> SourceKind {
        self.ctx.kind
    }

    /// 대상 파일 경로
    pub fn path(&self) -> &Path {
        &self.ctx.path
    }

    /// 현재 상태
    pub fn status(&self) -> &TailerStatus {
        &self.status
    }

    /// 현재 오프셋 (재생 중이면 재생이 끝난 뒤 반환)
    pub async fn offset(&self) -> u64 {
        self.state.lock().await.offset
    }
}

impl TailContext {
    fn error(&self, reason: impl Into<String>) -> LogPipelineError {
        LogPipelineError::Tailer {
            source_type: self.kind.as_str().to_owned(),
            path: self.path.display().to_string(),
            reason: reason.into(),
        }
    }

    async fn open_at(
        &self,
        offset: u64,
    ) -> std::io::Result<(BufReader<File>, Option<FileIdentity>)> {
        let mut file = File::open(&self.path).await?;
        let identity = FileIdentity::of(&file.metadata().await?);
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        Ok((BufReader::new(file), identity))
    }

    /// 대상 파일이 있는 디렉토리를 감시합니다. 실패하면 폴링만 사용합니다.
    fn watch_parent(&self, trigger: mpsc::Sender<()>) -> Option<notify::RecommendedWatcher> {
        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let relevant = match res {
                Ok(event) => {
                    event.paths.is_empty()
                        || event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == file_name.as_deref())
                }
                Err(_) => true,
            };
            if relevant {
                // 이미 대기 중인 알림이 있으면 합쳐집니다.
                let _ = trigger.try_send(());
            }
        });

        let mut watcher = match watcher {
            Ok(w) => w,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "file watcher unavailable, polling only");
                return None;
            }
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            warn!(path = %dir.display(), error = %e, "failed to watch directory, polling only");
            return None;
        }
        Some(watcher)
    }

    /// 로테이션/truncation을 확인한 뒤 새 라인을 읽습니다.
    async fn sync(&self, state: &mut TailState) -> Result<Flow, LogPipelineError> {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Some(meta),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        if state.reader.is_some() {
            let replaced = match &meta {
                None => true,
                Some(meta) => {
                    let current = FileIdentity::of(meta);
                    current.is_some() && current != state.identity
                }
            };

            if replaced {
                if let Flow::Stop = self.read_available(state, Mode::Follow).await? {
                    return Ok(Flow::Stop);
                }
                info!(
                    source = self.kind.as_str(),
                    path = %self.path.display(),
                    offset = state.offset,
                    "file rotated or removed, reopening"
                );
                state.reader = None;
                state.identity = None;
                state.reset_line();
                if !self.pause(self.settings.reopen_delay).await {
                    return Ok(Flow::Stop);
                }
            } else if let Some(meta) = &meta {
                if meta.len() < state.cursor() {
                    info!(
                        source = self.kind.as_str(),
                        path = %self.path.display(),
                        offset = state.offset,
                        len = meta.len(),
                        "file truncated, reading from start"
                    );
                    if let Some(reader) = state.reader.as_mut() {
                        reader.seek(SeekFrom::Start(0)).await?;
                    }
                    state.offset = 0;
                    state.reset_line();
                    self.persist(state).await;
                }
            }
        }

        if state.reader.is_none() {
            match self.open_at(0).await {
                Ok((reader, identity)) => {
                    state.reader = Some(reader);
                    state.identity = identity;
                    state.offset = 0;
                    state.reset_line();
                    self.persist(state).await;
                    metrics::counter!(m::TAILER_REOPENS_TOTAL, m::LABEL_SOURCE => self.kind.as_str())
                        .increment(1);
                    info!(source = self.kind.as_str(), path = %self.path.display(), "file reopened");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %self.path.display(), "file not present, will retry");
                    return Ok(Flow::Continue);
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "failed to reopen file, will retry");
                    return Ok(Flow::Continue);
                }
            }
        }

        self.read_available(state, Mode::Follow).await
    }

    /// 현재 핸들에서 읽을 수 있는 완전한 라인을 모두 처리합니다.
    ///
    /// 보류 조각이 `max_line_length`를 넘으면 바로 버리므로, 메모리에는 한 라인 한도와
    /// 읽기 버퍼 하나만큼만 남습니다.
    async fn read_available(
        &self,
        state: &mut TailState,
        mode: Mode,
    ) -> Result<Flow, LogPipelineError> {
        let limit = self.settings.max_line_length.saturating_add(1);
        loop {
            let Some(reader) = state.reader.as_mut() else {
                break;
            };
            let buf = reader.fill_buf().await?;
            if buf.is_empty() {
                break;
            }
            let (used, complete) = match buf.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (buf.len(), false),
            };
            if state.discarded > 0 {
                state.discarded += used as u64;
            } else {
                state.pending.extend_from_slice(&buf[..used]);
            }
            reader.consume(used);

            if !complete {
                if state.discarded == 0 && state.pending.len() > limit {
                    debug!(
                        source = self.kind.as_str(),
                        max = self.settings.max_line_length,
                        "line exceeds max length, discarding until newline"
                    );
                    state.discarded = state.pending.len() as u64;
                    state.pending = Vec::new();
                }
                continue;
            }

            if state.discarded > 0 {
                let end = state.cursor();
                state.reset_line();
                self.skip_overlong(state, end);
                continue;
            }

            let raw = std::mem::take(&mut state.pending);
            let end = state.offset + raw.len() as u64;
            if let Flow::Stop = self.handle_line(state, &raw, end, mode).await {
                return Ok(Flow::Stop);
            }
        }

        // 건너뛴 라인만 있었던 경우에도 위치를 남깁니다.
        self.persist(state).await;
        Ok(Flow::Continue)
    }

    async fn handle_line(&self, state: &mut TailState, raw: &[u8], end: u64, mode: Mode) -> Flow {
        let source = self.kind.as_str();
        let line = trim_newline(raw);

        if line.len() > self.settings.max_line_length {
            debug!(source, len = line.len(), "line exceeds max length, skipping");
            self.skip_overlong(state, end);
            return Flow::Continue;
        }

        let text = String::from_utf8_lossy(line);
        let event = match self.parser.parse(&text, &self.hostname) {
            Ok(event) => event,
            Err(e) => {
                if !text.trim().is_empty() {
                    debug!(source, error = %e, "skipping unparseable line");
                    metrics::counter!(m::TAILER_PARSE_SKIPPED_TOTAL, m::LABEL_SOURCE => source)
                        .increment(1);
                }
                state.offset = end;
                return Flow::Continue;
            }
        };

        match self.hand_off(state, event, mode).await {
            Handoff::Delivered => {
                metrics::counter!(m::TAILER_EVENTS_COLLECTED_TOTAL, m::LABEL_SOURCE => source)
                    .increment(1);
            }
            Handoff::Dropped => {
                debug!(source, "event channel full, dropping event");
                metrics::counter!(m::TAILER_EVENTS_DROPPED_TOTAL, m::LABEL_SOURCE => source)
                    .increment(1);
            }
            Handoff::Stop => return Flow::Stop,
        }

        state.offset = end;
        self.persist(state).await;
        Flow::Continue
    }

    fn skip_overlong(&self, state: &mut TailState, end: u64) {
        metrics::counter!(m::TAILER_PARSE_SKIPPED_TOTAL, m::LABEL_SOURCE => self.kind.as_str())
            .increment(1);
        state.offset = end;
    }

    async fn hand_off(&self, state: &TailState, event: Event, mode: Mode) -> Handoff {
        let Some(tx) = state.tx.as_ref() else {
            return Handoff::Stop;
        };

        let wait = mode == Mode::Replay || self.settings.backpressure == BackpressurePolicy::Block;
        if wait {
            tokio::select! {
                res = tx.send(event) => match res {
                    Ok(()) => Handoff::Delivered,
                    Err(_) => Handoff::Stop,
                },
                _ = self.cancel.cancelled() => Handoff::Stop,
            }
        } else {
            match tx.try_send(event) {
                Ok(()) => Handoff::Delivered,
                Err(TrySendError::Full(_)) => Handoff::Dropped,
                Err(TrySendError::Closed(_)) => Handoff::Stop,
            }
        }
    }

    async fn persist(&self, state: &mut TailState) {
        if state.offset == state.persisted {
            return;
        }
        match self.offsets.save(self.kind, &self.path, state.offset).await {
            Ok(()) => state.persisted = state.offset,
            Err(e) => warn!(
                source = self.kind.as_str(),
                path = %self.path.display(),
                error = %e,
                "failed to persist offset"
            ),
        }
    }

    /// 취소되면 false
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.cancel.cancelled() => false,
        }
    }
}

fn trim_newline(raw: &[u8]) -> &[u8] {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    line.strip_suffix(b"\r").unwrap_or(line)
}
