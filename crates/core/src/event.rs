//! 이벤트 -- 파서가 생성하고 버퍼와 전송기를 거쳐 수집 서버로 전달되는 레코드
//!
//! [`Event`]는 생성 이후 변경되지 않습니다. 필드는 비공개이며
//! `with_*` 빌더는 소유권을 받아 새 값을 반환하므로, 파서가 이벤트를
//! 넘겨준 뒤에는 누구도 내용을 바꿀 수 없습니다.
//!
//! # JSON 형식
//! ```text
//! {
//!   "timestamp": "2024-06-01T12:00:00Z",
//!   "hostname": "web-01",
//!   "source": "auth",
//!   "event_type": "sudo_command",
//!   "severity": "medium",
//!   "user": "root",            // 없으면 생략
//!   "process": "sudo",         // 없으면 생략
//!   "command": "/usr/bin/id",  // 없으면 생략
//!   "raw_log": "..."
//! }
//! ```

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Severity;

/// 정규화된 보안 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(with = "utc_seconds")]
    timestamp: DateTime<Utc>,
    hostname: String,
    source: String,
    event_type: String,
    severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    process: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    raw_log: String,
}

impl Event {
    /// 현재 시각(초 단위 절삭)으로 새 이벤트를 생성합니다.
    pub fn new(
        hostname: impl Into<String>,
        source: impl Into<String>,
        event_type: impl Into<String>,
        severity: Severity,
        raw_log: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now().trunc_subsecs(0),
            hostname: hostname.into(),
            source: source.into(),
            event_type: event_type.into(),
            severity,
            user: None,
            process: None,
            command: None,
            raw_log: raw_log.into(),
        }
    }

    /// 타임스탬프를 지정합니다. 초 미만 단위는 버립니다.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp.trunc_subsecs(0);
        self
    }

    /// 사용자 필드를 설정합니다.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// 프로세스 필드를 설정합니다.
    pub fn with_process(mut self, process: impl Into<String>) -> Self {
        self.process = Some(process.into());
        self
    }

    /// 명령어 필드를 설정합니다.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn process(&self) -> Option<&str> {
        self.process.as_deref()
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn raw_log(&self) -> &str {
        &self.raw_log
    }
}

/// 한 번의 전송 단위
///
/// 에이전트 식별자, 생성 시각(UTC), 순서가 보존된 이벤트 목록을 묶습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMessage {
    pub agent_id: String,
    #[serde(with = "utc_seconds")]
    pub timestamp: DateTime<Utc>,
    pub events: Vec<Event>,
}

impl BatchMessage {
    /// 현재 시각으로 메시지를 생성합니다.
    pub fn new(agent_id: impl Into<String>, events: Vec<Event>) -> Self {
        Self {
            agent_id: agent_id.into(),
            timestamp: Utc::now().trunc_subsecs(0),
            events,
        }
    }
}

/// `YYYY-MM-DDTHH:MM:SSZ` 고정 형식 직렬화
///
/// 역직렬화는 소수 초나 오프셋이 붙은 RFC 3339 문자열도 받아들입니다.
mod utc_seconds {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, FORMAT) {
            return Ok(naive.and_utc());
        }
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
