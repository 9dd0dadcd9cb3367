//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 열거형

use std::fmt;

use serde::{Deserialize, Serialize};

/// 심각도 레벨
///
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Low < Medium < High < Critical`).
/// 직렬화 시 소문자 문자열(`"low"`, `"high"` 등)을 사용합니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 일상적인 활동
    #[default]
    Low,
    /// 주의가 필요한 활동 (권한 상승, 로그인 등)
    Medium,
    /// 위험 활동 (인증 실패, 파괴적 명령 등)
    High,
    /// 치명적 -- 즉시 대응 필요
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }

    /// 직렬화 형식과 같은 소문자 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 로그 소스 종류
///
/// 지원하는 소스는 닫힌 집합입니다. 새 소스를 추가하려면 variant와
/// 대응하는 파서를 함께 추가해야 합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// 셸 히스토리 (`~/.bash_history`)
    BashHistory,
    /// BSD syslog (`/var/log/syslog`)
    Syslog,
    /// 인증 로그 (`/var/log/auth.log`), syslog 형식
    Auth,
    /// Linux audit 로그 (`/var/log/audit/audit.log`)
    Auditd,
}

impl SourceKind {
    /// 이벤트의 `source` 필드와 오프셋 파일명에 쓰이는 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BashHistory => "bash_history",
            Self::Syslog => "syslog",
            Self::Auth => "auth",
            Self::Auditd => "auditd",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
