//! Linux audit 로그 파서 (`/var/log/audit/audit.log`)
//!
//! # 라인 형식
//! ```text
//! type=SYSCALL msg=audit(1717243200.123:456): arch=c000003e syscall=59 success=yes uid=0 comm="bash" exe="/usr/bin/bash"
//! ```
//!
//! `type=` 값으로 이벤트 종류를 정하고, `key=value` 필드에서 user/process/command를
//! 채웁니다. `msg=audit(<epoch>.<ms>:<serial>)`이 있으면 그 시각을 이벤트 시각으로 씁니다.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use regex::Regex;

use logship_core::error::LogshipError;
use logship_core::event::Event;
use logship_core::pipeline::LogParser;
use logship_core::types::Severity;

use super::non_blank;
use crate::error::LogPipelineError;

/// 실패 시 high, 성공 시 medium으로 보는 인증/실행 관련 레코드
const SENSITIVE_TYPES: &[&str] = &[
    "USER_LOGIN",
    "USER_AUTH",
    "CRED_ACQ",
    "CRED_DISP",
    "USER_CMD",
    "EXECVE",
];

/// medium으로 보는 시스템 콜 번호 (x86_64: open, execve, execveat)
const WATCHED_SYSCALLS: &[&str] = &["2", "59", "322"];

/// Linux audit 로그 파서
pub struct AuditdParser {
    record_type: Regex,
    field: Regex,
    audit_stamp: Regex,
}

impl AuditdParser {
    /// 새 파서를 생성합니다.
    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            record_type: Regex::new(r"type=(\w+)")?,
            field: Regex::new(r"(\w+)=([^\s]+)")?,
            audit_stamp: Regex::new(r"audit\((\d+)\.(\d{1,3})")?,
        })
    }

    fn event_type(record_type: &str) -> &'static str {
        match record_type {
            "SYSCALL" => "system_call",
            "EXECVE" => "process_execution",
            "USER_LOGIN" => "user_login",
            "USER_LOGOUT" => "user_logout",
            "USER_AUTH" => "user_authentication",
            "USER_ACCT" => "user_account",
            "CRED_ACQ" => "credential_acquisition",
            "CRED_DISP" => "credential_disposal",
            "USER_START" => "user_session_start",
            "USER_END" => "user_session_end",
            "USER_CMD" => "user_command",
            "PATH" => "file_access",
            "CWD" => "working_directory",
            "PROCTITLE" => "process_title",
            _ => "audit_event",
        }
    }

    fn severity(record_type: &str, line: &str, fields: &HashMap<&str, &str>) -> Severity {
        if SENSITIVE_TYPES.contains(&record_type) {
            if line.contains("res=failed") || line.contains("success=no") {
                return Severity::High;
            }
            return Severity::Medium;
        }

        if record_type == "SYSCALL"
            && fields
                .get("syscall")
                .is_some_and(|nr| WATCHED_SYSCALLS.contains(nr))
        {
            return Severity::Medium;
        }

        Severity::Low
    }

    fn timestamp(&self, line: &str) -> Option<DateTime<Utc>> {
        let caps = self.audit_stamp.captures(line)?;
        let secs: i64 = caps[1].parse().ok()?;
        DateTime::from_timestamp(secs, 0)
    }
}

impl LogParser for AuditdParser {
    fn source_type(&self) -> &str {
        "auditd"
    }

    fn parse(&self, line: &str, hostname: &str) -> Result<Event, LogshipError> {
        let line = non_blank(line)?;

        let record_type = self
            .record_type
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or("UNKNOWN");

        // 같은 키가 여러 번 나오면 처음 값을 씁니다 (msg 안쪽의 중복 uid 등).
        let mut fields: HashMap<&str, &str> = HashMap::new();
        for caps in self.field.captures_iter(line) {
            if let (Some(k), Some(v)) = (caps.get(1), caps.get(2)) {
                fields.entry(k.as_str()).or_insert(v.as_str());
            }
        }

        let severity = Self::severity(record_type, line, &fields);
        let mut event = Event::new(
            hostname,
            self.source_type(),
            Self::event_type(record_type),
            severity,
            line,
        );

        if let Some(ts) = self.timestamp(line) {
            event = event.with_timestamp(ts);
        }

        if let Some(user) = fields.get("uid").or_else(|| fields.get("auid")) {
            event = event.with_user(*user);
        }

        if let Some(process) = fields.get("comm").or_else(|| fields.get("exe")) {
            event = event.with_process(process.trim_matches('"'));
        }

        if record_type == "EXECVE" {
            if let Some(a0) = fields.get("a0") {
                event = event.with_command(a0.trim_matches('"'));
            }
        }

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse(line: &str) -> Event {
        AuditdParser::new().unwrap().parse(line, "host").unwrap()
    }

    #[test]
    fn execve_syscall_is_medium() {
        let event = parse(
            r#"type=SYSCALL msg=audit(1717243200.123:456): arch=c000003e syscall=59 success=yes exit=0 uid=1000 auid=1000 comm="bash" exe="/usr/bin/bash""#,
        );
        assert_eq!(event.event_type(), "system_call");
        assert_eq!(event.severity(), Severity::Medium);
        assert_eq!(event.user(), Some("1000"));
        assert_eq!(event.process(), Some("bash"));
        assert_eq!(
            event.timestamp(),
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn syscall_number_must_match_exactly() {
        let event = parse("type=SYSCALL msg=audit(1.0:1): syscall=22 success=yes");
        assert_eq!(event.severity(), Severity::Low);
    }

    #[test]
    fn failed_login_is_high() {
        let event = parse(
            r#"type=USER_LOGIN msg=audit(1717243200.5:9): pid=1 uid=0 auid=4294967295 msg='op=login acct="bob" exe="/usr/sbin/sshd" res=failed'"#,
        );
        assert_eq!(event.event_type(), "user_login");
        assert_eq!(event.severity(), Severity::High);
        assert_eq!(event.user(), Some("0"));
        assert_eq!(event.process(), Some("/usr/sbin/sshd"));
    }

    #[test]
    fn execve_sets_command_from_a0() {
        let event = parse(r#"type=EXECVE msg=audit(1717243200.1:7): argc=2 a0="curl" a1="http://x""#);
        assert_eq!(event.event_type(), "process_execution");
        assert_eq!(event.severity(), Severity::Medium);
        assert_eq!(event.command(), Some("curl"));
    }

    #[test]
    fn auid_is_used_when_uid_missing() {
        let event = parse("type=USER_END msg=audit(1.0:2): pid=3 auid=1001 ses=4");
        assert_eq!(event.event_type(), "user_session_end");
        assert_eq!(event.user(), Some("1001"));
        assert_eq!(event.severity(), Severity::Low);
    }

    #[test]
    fn unknown_record_type_is_generic() {
        let event = parse("type=BPF msg=audit(1.0:3): prog-id=12 op=LOAD");
        assert_eq!(event.event_type(), "audit_event");
        assert_eq!(event.severity(), Severity::Low);
    }

    #[test]
    fn line_without_type_is_still_recorded() {
        let event = parse("garbage without structure");
        assert_eq!(event.event_type(), "audit_event");
        assert_eq!(event.raw_log(), "garbage without structure");
    }
}
