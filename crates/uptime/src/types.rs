//! Service, observation and probe types.

use chrono::{DateTime, Utc};
use common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Registry identifier of a monitored service. Never reused.
pub type ServiceId = i64;

/// Identifier of a stored observation.
pub type ObservationId = i64;

/// Protocol used to probe a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// GET request against a URL
    Http,
    /// Plain TCP connect to `host:port`
    Tcp,
    /// One ICMP echo request
    Ping,
}

impl ServiceKind {
    /// All recognized kinds
    pub const ALL: [ServiceKind; 3] = [ServiceKind::Http, ServiceKind::Tcp, ServiceKind::Ping];

    /// Canonical, persisted spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Http => "http",
            ServiceKind::Tcp => "tcp",
            ServiceKind::Ping => "ping",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(ServiceKind::Http),
            "tcp" => Ok(ServiceKind::Tcp),
            "ping" => Ok(ServiceKind::Ping),
            other => Err(Error::validation(format!(
                "unknown kind {:?} (expected http, tcp or ping)",
                other
            ))),
        }
    }
}

/// A registered endpoint as stored in the registry.
///
/// `kind` is kept as persisted text. Rows written by other tools may carry a
/// kind this build does not recognize; the sweep skips those instead of
/// guessing a protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredService {
    pub id: ServiceId,
    pub name: String,
    pub kind: String,
    pub target: String,
}

impl MonitoredService {
    /// Recognized kind, if any
    pub fn service_kind(&self) -> Option<ServiceKind> {
        self.kind.parse().ok()
    }
}

/// Registration request, as received from callers.
///
/// Field aliases accept the `type`/`url` names used by older clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewService {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "type")]
    pub kind: String,
    #[serde(default, alias = "url")]
    pub target: String,
}

impl NewService {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            target: target.into(),
        }
    }

    /// Check required fields, kind and target shape.
    pub fn validate(&self) -> Result<ServiceDefinition> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::validation("name is required"));
        }

        if self.kind.trim().is_empty() {
            return Err(Error::validation("kind is required"));
        }
        let kind: ServiceKind = self.kind.parse()?;

        let target = self.target.trim();
        if target.is_empty() {
            return Err(Error::validation("target is required"));
        }
        validate_target(kind, target)?;

        Ok(ServiceDefinition {
            name: name.to_string(),
            kind,
            target: target.to_string(),
        })
    }
}

/// A validated registration, ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub name: String,
    pub kind: ServiceKind,
    pub target: String,
}

fn validate_target(kind: ServiceKind, target: &str) -> Result<()> {
    if target.chars().any(char::is_whitespace) {
        return Err(Error::validation("target must not contain whitespace"));
    }

    match kind {
        ServiceKind::Http => {
            let url = url::Url::parse(target)
                .map_err(|e| Error::validation(format!("invalid URL {:?}: {}", target, e)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::validation(format!(
                    "unsupported scheme {:?} for http service",
                    url.scheme()
                )));
            }
            if url.host_str().is_none() {
                return Err(Error::validation("URL has no host"));
            }
        }
        ServiceKind::Tcp => {
            let (host, port) = target
                .rsplit_once(':')
                .ok_or_else(|| Error::validation("tcp target must be host:port"))?;
            let host = host.trim_start_matches('[').trim_end_matches(']');
            if host.is_empty() {
                return Err(Error::validation("tcp target has no host"));
            }
            match port.parse::<u16>() {
                Ok(p) if p > 0 => {}
                _ => return Err(Error::validation(format!("invalid port {:?}", port))),
            }
        }
        ServiceKind::Ping => {
            if target.starts_with('-') {
                return Err(Error::validation("ping target must be a host name or address"));
            }
        }
    }

    Ok(())
}

/// One stored probe outcome. Never updated after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub id: ObservationId,
    pub service_id: ServiceId,
    pub up: bool,
    pub checked_at: DateTime<Utc>,
}

/// Observation before the store assigns its id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewObservation {
    pub service_id: ServiceId,
    pub up: bool,
    pub checked_at: DateTime<Utc>,
}

impl NewObservation {
    /// Observation stamped with the current time
    pub fn now(service_id: ServiceId, up: bool) -> Self {
        Self {
            service_id,
            up,
            checked_at: Utc::now(),
        }
    }
}

/// Probe status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// Target answered as expected
    Up,
    /// Target answered, but not as expected
    Down,
    /// Probe exceeded its deadline
    Timeout,
    /// Probe could not be carried out (refused, DNS, spawn failure)
    Error,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Up => "up",
            ProbeStatus::Down => "down",
            ProbeStatus::Timeout => "timeout",
            ProbeStatus::Error => "error",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probe result
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Status of the probe
    pub status: ProbeStatus,

    /// Time spent probing
    pub duration: Duration,

    /// Optional failure detail
    pub message: Option<String>,

    /// Response code (HTTP probes)
    pub response_code: Option<u16>,
}

impl ProbeResult {
    pub fn up(duration: Duration) -> Self {
        Self {
            status: ProbeStatus::Up,
            duration,
            message: None,
            response_code: None,
        }
    }

    pub fn down(duration: Duration, message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Down,
            duration,
            message: Some(message.into()),
            response_code: None,
        }
    }

    pub fn timeout(duration: Duration) -> Self {
        Self {
            status: ProbeStatus::Timeout,
            duration,
            message: Some("probe timed out".to_string()),
            response_code: None,
        }
    }

    pub fn error(duration: Duration, message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Error,
            duration,
            message: Some(message.into()),
            response_code: None,
        }
    }

    pub fn with_response_code(mut self, code: u16) -> Self {
        self.response_code = Some(code);
        self
    }

    /// The boolean that gets persisted
    pub fn is_up(&self) -> bool {
        self.status == ProbeStatus::Up
    }
}

/// Per-protocol probe settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerSettings {
    #[serde(with = "humantime_serde")]
    pub http_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub tcp_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub ping_timeout: Duration,

    /// Echo utility to invoke for ping probes
    pub ping_command: String,
}

impl Default for CheckerSettings {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(10),
            tcp_timeout: Duration::from_secs(5),
            ping_timeout: Duration::from_secs(2),
            ping_command: "ping".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing_is_case_insensitive() {
        assert_eq!("HTTP".parse::<ServiceKind>().unwrap(), ServiceKind::Http);
        assert_eq!(" tcp ".parse::<ServiceKind>().unwrap(), ServiceKind::Tcp);
        assert_eq!("Ping".parse::<ServiceKind>().unwrap(), ServiceKind::Ping);
        assert!("gopher".parse::<ServiceKind>().unwrap_err().is_validation());
    }

    #[test]
    fn test_validate_normalizes_fields() {
        let def = NewService::new("  api ", "HTTP", " http://localhost:9999 ")
            .validate()
            .unwrap();
        assert_eq!(def.name, "api");
        assert_eq!(def.kind, ServiceKind::Http);
        assert_eq!(def.target, "http://localhost:9999");
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        assert!(NewService::new("", "http", "http://a").validate().is_err());
        assert!(NewService::new("a", "", "http://a").validate().is_err());
        assert!(NewService::new("a", "tcp", "   ").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_kind() {
        let err = NewService::new("a", "smtp", "mail:25").validate().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_validate_target_shapes() {
        assert!(NewService::new("a", "http", "https://example.com/health").validate().is_ok());
        assert!(NewService::new("a", "http", "ftp://example.com").validate().is_err());
        assert!(NewService::new("a", "http", "not a url").validate().is_err());

        assert!(NewService::new("a", "tcp", "db.internal:5432").validate().is_ok());
        assert!(NewService::new("a", "tcp", "[::1]:22").validate().is_ok());
        assert!(NewService::new("a", "tcp", "db.internal").validate().is_err());
        assert!(NewService::new("a", "tcp", "db.internal:0").validate().is_err());
        assert!(NewService::new("a", "tcp", ":80").validate().is_err());

        assert!(NewService::new("a", "ping", "10.0.0.1").validate().is_ok());
        assert!(NewService::new("a", "ping", "-f").validate().is_err());
    }

    #[test]
    fn test_new_service_accepts_legacy_field_names() {
        let json = r#"{"name":"api","type":"http","url":"http://localhost:9999"}"#;
        let svc: NewService = serde_json::from_str(json).unwrap();
        assert_eq!(svc.kind, "http");
        assert_eq!(svc.target, "http://localhost:9999");
    }

    #[test]
    fn test_unrecognized_stored_kind() {
        let svc = MonitoredService {
            id: 7,
            name: "legacy".into(),
            kind: "gopher".into(),
            target: "host".into(),
        };
        assert_eq!(svc.service_kind(), None);
    }

    #[test]
    fn test_observation_json_round_trip_keeps_instant() {
        let obs = Observation {
            id: 1,
            service_id: 2,
            up: true,
            checked_at: Utc::now(),
        };
        let json = serde_json::to_string(&obs).unwrap();
        let back: Observation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, obs);
    }

    #[test]
    fn test_probe_result_is_up() {
        assert!(ProbeResult::up(Duration::from_millis(3)).is_up());
        assert!(!ProbeResult::down(Duration::ZERO, "status 500").is_up());
        assert!(!ProbeResult::timeout(Duration::ZERO).is_up());
        assert!(!ProbeResult::error(Duration::ZERO, "refused").is_up());
    }

    #[test]
    fn test_default_checker_settings() {
        let settings = CheckerSettings::default();
        assert_eq!(settings.http_timeout, Duration::from_secs(10));
        assert_eq!(settings.tcp_timeout, Duration::from_secs(5));
        assert_eq!(settings.ping_timeout, Duration::from_secs(2));
    }
}
