//! 로그 파싱 모듈 -- 소스 종류별 라인 파서
//!
//! 각 파서는 core의 [`LogParser`] trait을 구현합니다.
//! [`SourceParser`]는 지원하는 파서의 닫힌 집합이며, tailer는 소스 종류에
//! 맞는 variant 하나를 보유합니다.
//!
//! # 지원 형식
//! - 셸 히스토리 ([`BashHistoryParser`])
//! - BSD syslog / auth.log ([`SyslogParser`])
//! - Linux audit 로그 ([`AuditdParser`])
//!
//! # 사용 예시
//! ```ignore
//! use logship_core::{LogParser, SourceKind};
//! use logship_log_pipeline::parser::SourceParser;
//!
//! let parser = SourceParser::for_kind(SourceKind::Auth)?;
//! let event = parser.parse("Jun  1 12:00:00 host sshd[42]: Failed password for bob", "host")?;
//! assert_eq!(event.event_type(), "login_failed");
//! ```

pub mod auditd;
pub mod bash_history;
pub mod syslog;

pub use auditd::AuditdParser;
pub use bash_history::BashHistoryParser;
pub use syslog::SyslogParser;

use logship_core::error::LogshipError;
use logship_core::event::Event;
use logship_core::pipeline::LogParser;
use logship_core::types::SourceKind;

use crate::error::LogPipelineError;

/// 소스 종류별 파서
pub enum SourceParser {
    BashHistory(BashHistoryParser),
    Syslog(SyslogParser),
    Auditd(AuditdParser),
}

impl SourceParser {
    /// 소스 종류에 맞는 파서를 생성합니다.
    ///
    /// `syslog`와 `auth`는 같은 파서를 쓰고 이벤트의 `source` 값만 다릅니다.
    pub fn for_kind(kind: SourceKind) -> Result<Self, LogPipelineError> {
        Ok(match kind {
            SourceKind::BashHistory => Self::BashHistory(BashHistoryParser::new()),
            SourceKind::Syslog | SourceKind::Auth => Self::Syslog(SyslogParser::new(kind)?),
            SourceKind::Auditd => Self::Auditd(AuditdParser::new()?),
        })
    }
}

impl LogParser for SourceParser {
    fn source_type(&self) -> &str {
        match self {
            Self::BashHistory(p) => p.source_type(),
            Self::Syslog(p) => p.source_type(),
            Self::Auditd(p) => p.source_type(),
        }
    }

    fn parse(&self, line: &str, hostname: &str) -> Result<Event, LogshipError> {
        match self {
            Self::BashHistory(p) => p.parse(line, hostname),
            Self::Syslog(p) => p.parse(line, hostname),
            Self::Auditd(p) => p.parse(line, hostname),
        }
    }
}

/// 앞뒤 공백을 제거하고, 빈 라인이면 에러를 반환합니다.
fn non_blank(line: &str) -> Result<&str, LogshipError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Err(logship_core::error::ParseError::Empty.into())
    } else {
        Ok(trimmed)
    }
}
