//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logship_`
//! - 영역: `tailer_`, `buffer_`, `sender_`, `agent_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use logship_core::metrics as m;
//!
//! metrics::counter!(m::TAILER_EVENTS_COLLECTED_TOTAL, m::LABEL_SOURCE => "auth").increment(1);
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 소스 종류 레이블 키 (bash_history, syslog, auth, auditd)
pub const LABEL_SOURCE: &str = "source";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Tailer 메트릭 ──────────────────────────────────────────────────

/// Tailer: 파싱되어 전달된 이벤트 수 (counter, label: source)
pub const TAILER_EVENTS_COLLECTED_TOTAL: &str = "logship_tailer_events_collected_total";

/// Tailer: 팬인 채널 포화로 버려진 이벤트 수 (counter, label: source)
pub const TAILER_EVENTS_DROPPED_TOTAL: &str = "logship_tailer_events_dropped_total";

/// Tailer: 파싱에 실패해 건너뛴 라인 수 (counter, label: source)
pub const TAILER_PARSE_SKIPPED_TOTAL: &str = "logship_tailer_parse_skipped_total";

/// Tailer: 로테이션/삭제 후 재오픈 횟수 (counter, label: source)
pub const TAILER_REOPENS_TOTAL: &str = "logship_tailer_reopens_total";

// ─── Buffer 메트릭 ──────────────────────────────────────────────────

/// Buffer: 현재 메모리 버퍼 내 이벤트 수 (gauge)
pub const BUFFER_SIZE: &str = "logship_buffer_size";

/// Buffer: 디스크 오버플로우 플러시 횟수 (counter)
pub const BUFFER_OVERFLOW_FLUSHES_TOTAL: &str = "logship_buffer_overflow_flushes_total";

/// Buffer: 시작 시 스냅샷에서 복구한 이벤트 수 (counter)
pub const BUFFER_RECOVERED_EVENTS_TOTAL: &str = "logship_buffer_recovered_events_total";

/// Buffer: 스냅샷 한도를 넘어 버려진 이벤트 수 (counter)
pub const BUFFER_DISCARDED_EVENTS_TOTAL: &str = "logship_buffer_discarded_events_total";

// ─── Sender 메트릭 ──────────────────────────────────────────────────

/// Sender: 전송 완료 배치 수 (counter, label: result)
pub const SENDER_BATCHES_TOTAL: &str = "logship_sender_batches_total";

/// Sender: 전송 완료 이벤트 수 (counter)
pub const SENDER_EVENTS_SENT_TOTAL: &str = "logship_sender_events_sent_total";

/// Sender: 재시도 횟수 (counter)
pub const SENDER_RETRIES_TOTAL: &str = "logship_sender_retries_total";

/// Sender: 배치 1건 전송 소요 시간 (histogram, 초)
pub const SENDER_SEND_DURATION_SECONDS: &str = "logship_sender_send_duration_seconds";

// ─── Agent 메트릭 ───────────────────────────────────────────────────

/// Agent: 실행 중인 tailer 수 (gauge)
pub const AGENT_ACTIVE_SOURCES: &str = "logship_agent_active_sources";

/// Agent: 가동 시간 (gauge, 초)
pub const AGENT_UPTIME_SECONDS: &str = "logship_agent_uptime_seconds";

/// Agent: 빌드 정보 (gauge, 항상 1, label: version)
pub const AGENT_BUILD_INFO: &str = "logship_agent_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다. 레코더가 없으면 아무 일도 하지 않습니다.
pub fn describe_all() {
    describe_counter!(
        TAILER_EVENTS_COLLECTED_TOTAL,
        "Total number of events parsed and handed to the aggregator"
    );
    describe_counter!(
        TAILER_EVENTS_DROPPED_TOTAL,
        "Total number of events dropped because the fan-in channel was full"
    );
    describe_counter!(
        TAILER_PARSE_SKIPPED_TOTAL,
        "Total number of lines skipped because they could not be parsed"
    );
    describe_counter!(
        TAILER_REOPENS_TOTAL,
        "Total number of times a tailed file was reopened after rotation or removal"
    );

    describe_gauge!(BUFFER_SIZE, "Current number of events held in memory");
    describe_counter!(
        BUFFER_OVERFLOW_FLUSHES_TOTAL,
        "Total number of times the full buffer was flushed to disk"
    );
    describe_counter!(
        BUFFER_RECOVERED_EVENTS_TOTAL,
        "Total number of events reloaded from the overflow snapshot at startup"
    );
    describe_counter!(
        BUFFER_DISCARDED_EVENTS_TOTAL,
        "Total number of events discarded because the overflow snapshot was at its limit"
    );

    describe_counter!(SENDER_BATCHES_TOTAL, "Total number of batch deliveries by result");
    describe_counter!(
        SENDER_EVENTS_SENT_TOTAL,
        "Total number of events acknowledged by the collector"
    );
    describe_counter!(SENDER_RETRIES_TOTAL, "Total number of send retries");
    describe_histogram!(
        SENDER_SEND_DURATION_SECONDS,
        "Time to deliver one batch including retries, in seconds"
    );

    describe_gauge!(AGENT_ACTIVE_SOURCES, "Number of log sources currently tailed");
    describe_gauge!(AGENT_UPTIME_SECONDS, "Agent uptime in seconds");
    describe_gauge!(
        AGENT_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
