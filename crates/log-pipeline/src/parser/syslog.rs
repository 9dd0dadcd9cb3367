//! BSD syslog 파서 (`/var/log/syslog`, `/var/log/auth.log`)
//!
//! # 라인 형식
//! ```text
//! Jun  1 12:00:00 host sshd[1234]: Failed password for bob from 10.0.0.9
//! 2024-06-01T12:00:00.123456+00:00 host sudo: alice : TTY=pts/0 ; USER=root ; COMMAND=/usr/bin/id
//! ```
//!
//! 헤더의 타임스탬프는 BSD(`MMM d HH:MM:SS`, 로컬 시각)와 RFC 3339(rsyslog
//! 고정밀 형식)를 인식합니다. 인식하지 못하면 첫 두 토큰을 건너뛰는 느슨한
//! 패턴으로 다시 시도하고, 그래도 맞지 않으면 라인을 건너뜁니다.
//!
//! # 분류
//! 메시지 내용으로 먼저 분류하고, 프로세스 이름으로 보정합니다.
//! `sudo` 라인은 메시지 분류와 무관하게 `sudo_command`가 되며, `COMMAND=`가
//! 있으면 `USER=`/`COMMAND=` 값을 user/command 필드로 추출합니다.

use chrono::{DateTime, Datelike, Local, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use logship_core::error::LogshipError;
use logship_core::event::Event;
use logship_core::pipeline::LogParser;
use logship_core::types::{Severity, SourceKind};

use super::non_blank;
use crate::error::LogPipelineError;

/// 타임스탬프를 인식하는 헤더 패턴
const HEADER_PATTERN: &str = r"^(?P<ts>[A-Z][a-z]{2}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}|\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2}))\s+(?P<host>\S+)\s+(?P<proc>[^:\[\s]+)(?:\[(?P<pid>\d+)\])?\s*:\s*(?P<msg>.+)$";

/// 첫 두 토큰을 무조건 건너뛰는 느슨한 패턴
const LOOSE_PATTERN: &str =
    r"^\S+\s+\S+\s+(?P<proc>[^:\[\s]+)(?:\[(?P<pid>\d+)\])?\s*:\s*(?P<msg>.+)$";

/// sudo 메시지: `alice : TTY=pts/0 ; PWD=/home/alice ; USER=root ; COMMAND=/usr/bin/id`
const SUDO_PATTERN: &str = r"(\w+)\s*:.*USER=(\w+)\s*;\s*COMMAND=(.+)$";

/// sudo로 실행되면 위험한 명령어 패턴
const DANGEROUS_SUDO_PATTERNS: &[&str] = &[
    "rm -rf", "dd if=", "mkfs", "fdisk", "passwd", "userdel", "shutdown", "reboot", "halt",
];

/// BSD syslog 파서
///
/// `syslog`와 `auth` 소스가 공유하며, 생성 시 받은 소스 종류가 이벤트의
/// `source` 값이 됩니다.
pub struct SyslogParser {
    source: SourceKind,
    header: Regex,
    loose: Regex,
    sudo: Regex,
}

/// 헤더에서 분리한 필드
struct Header<'a> {
    timestamp: Option<DateTime<Utc>>,
    process: &'a str,
    pid: Option<&'a str>,
    message: &'a str,
}

impl SyslogParser {
    /// 새 파서를 생성합니다.
    pub fn new(source: SourceKind) -> Result<Self, LogPipelineError> {
        Ok(Self {
            source,
            header: Regex::new(HEADER_PATTERN)?,
            loose: Regex::new(LOOSE_PATTERN)?,
            sudo: Regex::new(SUDO_PATTERN)?,
        })
    }

    fn split_header<'a>(&self, line: &'a str) -> Option<Header<'a>> {
        if let Some(caps) = self.header.captures(line) {
            return Some(Header {
                timestamp: caps.name("ts").and_then(|m| parse_timestamp(m.as_str())),
                process: caps.name("proc")?.as_str(),
                pid: caps.name("pid").map(|m| m.as_str()),
                message: caps.name("msg")?.as_str(),
            });
        }
        let caps = self.loose.captures(line)?;
        Some(Header {
            timestamp: None,
            process: caps.name("proc")?.as_str(),
            pid: caps.name("pid").map(|m| m.as_str()),
            message: caps.name("msg")?.as_str(),
        })
    }

    /// 메시지와 프로세스 이름으로 (event_type, severity)를 결정합니다.
    fn classify(process: &str, message: &str) -> (&'static str, Severity) {
        let by_message = if message.contains("session opened") {
            Some(("session_opened", Severity::Medium))
        } else if message.contains("session closed") {
            Some(("session_closed", Severity::Low))
        } else if message.contains("authentication failure") {
            Some(("auth_failure", Severity::High))
        } else if message.contains("Accepted password") || message.contains("Accepted publickey")
        {
            Some(("user_login", Severity::Medium))
        } else if message.contains("Failed password") {
            Some(("login_failed", Severity::High))
        } else {
            None
        };

        match (process, by_message) {
            ("sudo", _) if DANGEROUS_SUDO_PATTERNS.iter().any(|p| message.contains(p)) => {
                ("dangerous_sudo_command", Severity::High)
            }
            ("sudo", _) => ("sudo_command", Severity::Medium),
            (_, Some(classified)) => classified,
            ("systemd", None) => ("systemd_event", Severity::Low),
            ("sshd", None) => ("ssh_event", Severity::Medium),
            _ => ("system_event", Severity::Low),
        }
    }
}

impl LogParser for SyslogParser {
    fn source_type(&self) -> &str {
        self.source.as_str()
    }

    fn parse(&self, line: &str, hostname: &str) -> Result<Event, LogshipError> {
        let line = non_blank(line)?;
        let header = self.split_header(line).ok_or_else(|| LogPipelineError::Parse {
            format: self.source.as_str().to_owned(),
            reason: "line does not match syslog header".to_owned(),
        })?;

        let (event_type, severity) = Self::classify(header.process, header.message);
        let process = match header.pid {
            Some(pid) => format!("{}[{}]", header.process, pid),
            None => header.process.to_owned(),
        };

        let mut event = Event::new(hostname, self.source_type(), event_type, severity, line)
            .with_process(process);
        if let Some(ts) = header.timestamp {
            event = event.with_timestamp(ts);
        }

        if header.process == "sudo" && header.message.contains("COMMAND=") {
            if let Some(caps) = self.sudo.captures(header.message) {
                event = event
                    .with_user(&caps[2])
                    .with_command(caps[3].trim_end());
            }
        }

        Ok(event)
    }
}

/// BSD 또는 RFC 3339 타임스탬프를 UTC로 변환합니다.
///
/// BSD 형식은 연도가 없으므로 올해로 가정하고, 그 결과가 하루 이상
/// 미래라면 작년 로그로 봅니다.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.contains('T') {
        return DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
    }

    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let now = Local::now();
    let at_year = |year: i32| {
        NaiveDateTime::parse_from_str(&format!("{year} {normalized}"), "%Y %b %d %H:%M:%S")
            .ok()
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
    };

    let this_year = at_year(now.year())?;
    let resolved = if this_year > now + chrono::Duration::days(1) {
        at_year(now.year() - 1)?
    } else {
        this_year
    };
    Some(resolved.with_timezone(&Utc))
}
