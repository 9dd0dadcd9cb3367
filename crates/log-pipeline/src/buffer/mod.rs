//! 이벤트 버퍼링 -- 고정 용량 링 버퍼와 디스크 오버플로우
//!
//! [`RingBuffer`]는 tailer들이 만든 이벤트를 전송 전까지 보관하는 FIFO 큐입니다.
//!
//! # 오버플로우 정책
//! 버퍼가 가득 찬 상태에서 `add`가 오면 현재 내용 전체를 [`OverflowStore`]로
//! 내보낸 뒤 비우고 새 이벤트를 넣습니다. 내보내기에 실패하면 `add`는 에러를
//! 반환하고 버퍼는 그대로 남습니다. 스냅샷은 버퍼 용량만큼만 이벤트를 담으며,
//! 그 이상은 기록 시점에 버려집니다.
//!
//! # 에포크
//! 버퍼가 통째로 비워질 때마다(오버플로우, 종료 flush) 에포크가 증가합니다.
//! 배치를 꺼낸 뒤 전송하는 사이에 에포크가 바뀌었다면 그 배치는 이미 디스크로
//! 넘어간 것이므로 전송 성공 후에도 `remove_front`를 호출하지 않아야 합니다.

pub mod overflow;

pub use overflow::OverflowStore;

use logship_core::event::Event;
use logship_core::metrics as m;

use crate::error::LogPipelineError;

/// 고정 용량 링 버퍼
///
/// 항상 `0 <= size() <= capacity()`이며, 가장 오래된 이벤트는 `tail` 위치에 있습니다.
/// 동시 접근은 호출자가 하나의 뮤텍스로 보호합니다.
pub struct RingBuffer {
    slots: Vec<Option<Box<Event>>>,
    head: usize,
    tail: usize,
    count: usize,
    epoch: u64,
    overflow: OverflowStore,
}

impl RingBuffer {
    /// 빈 버퍼를 생성합니다. 스냅샷 복구는 하지 않습니다.
    ///
    /// 스냅샷 한도는 버퍼 용량으로 맞춥니다.
    pub fn new(capacity: usize, overflow: OverflowStore) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
            count: 0,
            epoch: 0,
            overflow: overflow.with_max_events(capacity),
        }
    }

    /// 버퍼를 생성하고 오버플로우 스냅샷이 있으면 복구합니다.
    pub async fn open(capacity: usize, overflow: OverflowStore) -> Self {
        let mut buffer = Self::new(capacity, overflow);
        buffer.recover().await;
        buffer
    }

    /// 스냅샷에서 최대 용량만큼 이벤트를 읽어 들이고 스냅샷을 삭제합니다.
    ///
    /// 스냅샷을 읽지 못하면 파일을 그대로 두고 빈 버퍼로 시작합니다.
    /// 복구한 이벤트 수를 반환합니다.
    pub async fn recover(&mut self) -> usize {
        let path = self.overflow.path().display().to_string();
        let events = match self.overflow.load().await {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(path = %path, error = %e, "failed to load overflow snapshot, starting empty");
                return 0;
            }
        };
        if events.is_empty() {
            return 0;
        }

        let total = events.len();
        let room = self.capacity() - self.count;
        for event in events.into_iter().take(room) {
            self.push(event);
        }
        let recovered = total.min(room);
        if total > recovered {
            metrics::counter!(m::BUFFER_DISCARDED_EVENTS_TOTAL).increment((total - recovered) as u64);
            tracing::warn!(
                path = %path,
                total,
                recovered,
                discarded = total - recovered,
                "overflow snapshot larger than buffer capacity"
            );
        }

        // 삭제에 실패하면 다음 시작 때 같은 스냅샷을 다시 읽습니다.
        if let Err(e) = self.overflow.remove().await {
            tracing::warn!(path = %path, error = %e, "failed to delete overflow snapshot, it will be replayed on next start");
        }

        metrics::counter!(m::BUFFER_RECOVERED_EVENTS_TOTAL).increment(recovered as u64);
        self.record_size();
        tracing::info!(path = %path, recovered, "recovered events from overflow snapshot");
        recovered
    }

    /// 이벤트를 추가합니다.
    ///
    /// 가득 차 있으면 먼저 전체 내용을 스냅샷으로 내보냅니다. 내보내기에 실패하면
    /// 버퍼는 바뀌지 않으며 이벤트는 저장되지 않습니다.
    pub async fn add(&mut self, event: Event) -> Result<(), LogPipelineError> {
        if self.count >= self.capacity() {
            let flushed = self.count;
            let discarded = self.flush().await?;
            metrics::counter!(m::BUFFER_OVERFLOW_FLUSHES_TOTAL).increment(1);
            tracing::warn!(
                flushed,
                discarded,
                path = %self.overflow.path().display(),
                "buffer full, flushed contents to overflow snapshot"
            );
        }

        self.push(event);
        self.record_size();
        Ok(())
    }

    /// 가장 오래된 이벤트를 최대 `n`개까지 순서대로 복사해 반환합니다.
    pub fn peek_batch(&self, n: usize) -> Vec<Event> {
        let take = n.min(self.count);
        (0..take)
            .filter_map(|i| self.slots[(self.tail + i) % self.capacity()].as_deref().cloned())
            .collect()
    }

    /// 가장 오래된 이벤트 `n`개를 버립니다 (현재 개수로 제한). 버린 개수를 반환합니다.
    pub fn remove_front(&mut self, n: usize) -> usize {
        let n = n.min(self.count);
        for _ in 0..n {
            self.slots[self.tail] = None;
            self.tail = (self.tail + 1) % self.capacity();
        }
        self.count -= n;
        self.record_size();
        n
    }

    /// 현재 내용 전체를 스냅샷으로 내보내고 버퍼를 비웁니다.
    ///
    /// 비어 있으면 아무 일도 하지 않습니다. 실패하면 버퍼는 그대로입니다.
    /// 스냅샷 한도 때문에 버려진 이벤트 수를 반환합니다.
    pub async fn flush(&mut self) -> Result<usize, LogPipelineError> {
        if self.count == 0 {
            return Ok(0);
        }

        let events = self.peek_batch(self.count);
        let discarded = self.overflow.persist(&events).await?;
        self.reset();
        self.record_size();
        Ok(discarded)
    }

    /// 현재 이벤트 수
    pub fn size(&self) -> usize {
        self.count
    }

    /// 버퍼가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// 최대 용량
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 버퍼가 통째로 비워진 횟수
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// 사용률 (0.0~1.0)
    pub fn utilization(&self) -> f64 {
        f64::from(u32::try_from(self.count).unwrap_or(u32::MAX))
            / f64::from(u32::try_from(self.capacity()).unwrap_or(u32::MAX))
    }

    /// 오버플로우 저장소
    pub fn overflow(&self) -> &OverflowStore {
        &self.overflow
    }

    fn push(&mut self, event: Event) {
        self.slots[self.head] = Some(Box::new(event));
        self.head = (self.head + 1) % self.capacity();
        self.count += 1;
    }

    fn reset(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.tail = 0;
        self.count = 0;
        self.epoch += 1;
    }

    fn record_size(&self) {
        metrics::gauge!(m::BUFFER_SIZE).set(self.count as f64);
    }
}
