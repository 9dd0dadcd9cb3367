//! 셸 히스토리 파서
//!
//! `~/.bash_history`의 각 라인은 실행된 명령어 하나입니다.
//! 명령어 내용에 따라 심각도를 올립니다.
//!
//! | 조건 | event_type | severity |
//! |---|---|---|
//! | 기본 | `command_executed` | low |
//! | `sudo `로 시작 | `privileged_command` | medium |
//! | 위험 패턴 포함 | `dangerous_command` | high |

use logship_core::error::LogshipError;
use logship_core::event::Event;
use logship_core::pipeline::LogParser;
use logship_core::types::Severity;

use super::non_blank;

/// 파괴적이거나 권한을 크게 바꾸는 명령어 패턴
const DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf",
    "dd if=",
    "mkfs",
    "fdisk",
    "passwd root",
    "> /dev/",
    "chmod 777",
];

/// 셸 히스토리 파서
#[derive(Debug, Default)]
pub struct BashHistoryParser;

impl BashHistoryParser {
    pub fn new() -> Self {
        Self
    }

    fn is_dangerous(command: &str) -> bool {
        DANGEROUS_PATTERNS.iter().any(|p| command.contains(p))
    }
}

impl LogParser for BashHistoryParser {
    fn source_type(&self) -> &str {
        "bash_history"
    }

    fn parse(&self, line: &str, hostname: &str) -> Result<Event, LogshipError> {
        let command = non_blank(line)?;

        let (event_type, severity) = if Self::is_dangerous(command) {
            ("dangerous_command", Severity::High)
        } else if command.starts_with("sudo ") {
            ("privileged_command", Severity::Medium)
        } else {
            ("command_executed", Severity::Low)
        };

        let mut event = Event::new(hostname, self.source_type(), event_type, severity, command)
            .with_command(command);
        if command.contains("sudo su") {
            event = event.with_user("root");
        }
        Ok(event)
    }
}
