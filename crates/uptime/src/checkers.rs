//! Reachability probes.
//!
//! A probe never fails from the caller's point of view: every outcome,
//! including transport errors and timeouts, comes back as a [`ProbeResult`].

use crate::types::{CheckerSettings, MonitoredService, ProbeResult, ServiceKind};
use async_trait::async_trait;
use common::{Error, Result};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Reachability probe for one protocol
#[async_trait]
pub trait Checker: Send + Sync {
    /// Probe `target`, bounded by this checker's timeout
    async fn probe(&self, target: &str) -> ProbeResult;

    /// Kind of service this checker handles
    fn kind(&self) -> ServiceKind;

    /// Deadline applied to every probe
    fn timeout(&self) -> Duration;
}

/// HTTP checker: one GET, up for status codes in `[200, 400)`.
///
/// Up to [`MAX_REDIRECTS`] redirects are followed and the final response is
/// judged. A redirect loop or an overlong chain counts as a failed probe.
pub struct HttpChecker {
    client: reqwest::Client,
    timeout_duration: Duration,
}

impl HttpChecker {
    pub fn new(timeout_duration: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout_duration)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| Error::other(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout_duration,
        })
    }
}

/// Redirect hops followed before an HTTP probe gives up
pub const MAX_REDIRECTS: usize = 10;

/// Success predicate for HTTP probes
pub fn is_up_status(code: u16) -> bool {
    (200..400).contains(&code)
}

#[async_trait]
impl Checker for HttpChecker {
    async fn probe(&self, target: &str) -> ProbeResult {
        let start = Instant::now();

        match timeout(self.timeout_duration, self.client.get(target).send()).await {
            Ok(Ok(response)) => {
                let duration = start.elapsed();
                let code = response.status().as_u16();

                if is_up_status(code) {
                    debug!(url = %target, status = code, duration_ms = duration.as_millis(), "HTTP probe up");
                    ProbeResult::up(duration).with_response_code(code)
                } else {
                    debug!(url = %target, status = code, "HTTP probe down: unexpected status code");
                    ProbeResult::down(duration, format!("unexpected status code: {}", code))
                        .with_response_code(code)
                }
            }
            Ok(Err(e)) if e.is_timeout() => {
                debug!(url = %target, "HTTP probe timed out");
                ProbeResult::timeout(start.elapsed())
            }
            Ok(Err(e)) => {
                debug!(url = %target, error = %e, "HTTP probe failed");
                ProbeResult::error(start.elapsed(), format!("HTTP request failed: {}", e))
            }
            Err(_) => {
                debug!(url = %target, "HTTP probe timed out");
                ProbeResult::timeout(start.elapsed())
            }
        }
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Http
    }

    fn timeout(&self) -> Duration {
        self.timeout_duration
    }
}

/// TCP checker: up iff a connection to `host:port` establishes in time.
pub struct TcpChecker {
    timeout_duration: Duration,
}

impl TcpChecker {
    pub fn new(timeout_duration: Duration) -> Self {
        Self { timeout_duration }
    }
}

#[async_trait]
impl Checker for TcpChecker {
    async fn probe(&self, target: &str) -> ProbeResult {
        let start = Instant::now();

        // The deadline covers name resolution as well as the handshake.
        match timeout(self.timeout_duration, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                let duration = start.elapsed();
                debug!(target = %target, duration_ms = duration.as_millis(), "TCP probe up");
                ProbeResult::up(duration)
            }
            Ok(Err(e)) => {
                debug!(target = %target, error = %e, "TCP probe failed");
                ProbeResult::error(start.elapsed(), format!("connection failed: {}", e))
            }
            Err(_) => {
                debug!(target = %target, "TCP probe timed out");
                ProbeResult::timeout(start.elapsed())
            }
        }
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Tcp
    }

    fn timeout(&self) -> Duration {
        self.timeout_duration
    }
}

/// Argument convention of the platform echo utility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingPlatform {
    /// `ping -n 1 -w <millis> host`
    Windows,
    /// `ping -c 1 -t <seconds> host` (macOS, FreeBSD)
    Bsd,
    /// `ping -c 1 -W <seconds> host` (Linux iputils)
    Unix,
}

impl PingPlatform {
    /// Convention for the host this binary runs on
    pub fn current() -> Self {
        if cfg!(windows) {
            PingPlatform::Windows
        } else if cfg!(any(target_os = "macos", target_os = "freebsd")) {
            PingPlatform::Bsd
        } else {
            PingPlatform::Unix
        }
    }

    /// Arguments for a single echo request with the given wait time.
    ///
    /// Whole-second conventions round down, with a floor of one second.
    pub fn args(&self, host: &str, wait: Duration) -> Vec<String> {
        let millis = wait.as_millis().max(1);
        let secs = wait.as_secs().max(1);

        match self {
            PingPlatform::Windows => vec![
                "-n".into(),
                "1".into(),
                "-w".into(),
                millis.to_string(),
                host.into(),
            ],
            PingPlatform::Bsd => vec![
                "-c".into(),
                "1".into(),
                "-t".into(),
                secs.to_string(),
                host.into(),
            ],
            PingPlatform::Unix => vec![
                "-c".into(),
                "1".into(),
                "-W".into(),
                secs.to_string(),
                host.into(),
            ],
        }
    }
}

/// Ping checker: one echo request through the platform utility.
///
/// The child process is killed when the timeout elapses, so a stuck utility
/// cannot hold the probe past its deadline.
pub struct PingChecker {
    program: String,
    platform: PingPlatform,
    timeout_duration: Duration,
}

impl PingChecker {
    pub fn new(program: impl Into<String>, timeout_duration: Duration) -> Self {
        Self {
            program: program.into(),
            platform: PingPlatform::current(),
            timeout_duration,
        }
    }

    /// Override the argument convention
    pub fn with_platform(mut self, platform: PingPlatform) -> Self {
        self.platform = platform;
        self
    }
}

#[async_trait]
impl Checker for PingChecker {
    async fn probe(&self, target: &str) -> ProbeResult {
        let start = Instant::now();

        if target.is_empty() || target.starts_with('-') {
            return ProbeResult::error(start.elapsed(), format!("refusing ping target {:?}", target));
        }

        let mut command = Command::new(&self.program);
        command
            .args(self.platform.args(target, self.timeout_duration))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match timeout(self.timeout_duration, command.status()).await {
            Ok(Ok(status)) if status.success() => {
                let duration = start.elapsed();
                debug!(host = %target, duration_ms = duration.as_millis(), "Ping probe up");
                ProbeResult::up(duration)
            }
            Ok(Ok(status)) => {
                debug!(host = %target, %status, "Ping probe down");
                ProbeResult::down(start.elapsed(), format!("{} exited with {}", self.program, status))
            }
            Ok(Err(e)) => {
                warn!(program = %self.program, error = %e, "Failed to run ping utility");
                ProbeResult::error(start.elapsed(), format!("failed to run {}: {}", self.program, e))
            }
            Err(_) => {
                debug!(host = %target, "Ping probe timed out");
                ProbeResult::timeout(start.elapsed())
            }
        }
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Ping
    }

    fn timeout(&self) -> Duration {
        self.timeout_duration
    }
}

/// Lookup table from service kind to checker
#[derive(Clone, Default)]
pub struct CheckerSet {
    checkers: HashMap<ServiceKind, Arc<dyn Checker>>,
}

impl CheckerSet {
    /// Empty set; every service is skipped until checkers are added
    pub fn new() -> Self {
        Self::default()
    }

    /// HTTP, TCP and ping checkers built from `settings`
    pub fn standard(settings: &CheckerSettings) -> Result<Self> {
        Ok(Self::new()
            .with_checker(Arc::new(HttpChecker::new(settings.http_timeout)?))
            .with_checker(Arc::new(TcpChecker::new(settings.tcp_timeout)))
            .with_checker(Arc::new(PingChecker::new(
                settings.ping_command.clone(),
                settings.ping_timeout,
            ))))
    }

    /// Register `checker` for its kind, replacing any previous one
    pub fn with_checker(mut self, checker: Arc<dyn Checker>) -> Self {
        self.checkers.insert(checker.kind(), checker);
        self
    }

    pub fn get(&self, kind: ServiceKind) -> Option<Arc<dyn Checker>> {
        self.checkers.get(&kind).cloned()
    }

    /// Checker for a stored service; `None` for unrecognized or unsupported kinds
    pub fn for_service(&self, service: &MonitoredService) -> Option<Arc<dyn Checker>> {
        service.service_kind().and_then(|kind| self.get(kind))
    }

    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProbeStatus;
    use axum::http::{StatusCode, header};
    use axum::{Router, routing::get};
    use std::net::SocketAddr;

    async fn spawn_http_target() -> SocketAddr {
        let app = Router::new()
            .route("/ok", get(|| async { StatusCode::OK }))
            .route("/empty", get(|| async { StatusCode::NO_CONTENT }))
            .route(
                "/moved",
                get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/ok")]) }),
            )
            .route(
                "/gone",
                get(|| async { (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/missing")]) }),
            )
            .route(
                "/loop",
                get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/loop")]) }),
            )
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    StatusCode::OK
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn unused_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_status_predicate() {
        assert!(!is_up_status(101));
        assert!(!is_up_status(199));
        assert!(is_up_status(200));
        assert!(is_up_status(302));
        assert!(is_up_status(399));
        assert!(!is_up_status(400));
        assert!(!is_up_status(503));
    }

    #[tokio::test]
    async fn test_http_checker_status_codes() {
        let addr = spawn_http_target().await;
        let checker = HttpChecker::new(Duration::from_secs(2)).unwrap();

        for (path, up) in [
            ("/ok", true),
            ("/empty", true),
            ("/missing", false),
            ("/broken", false),
        ] {
            let result = checker.probe(&format!("http://{}{}", addr, path)).await;
            assert_eq!(result.is_up(), up, "unexpected outcome for {}", path);
            assert!(result.response_code.is_some());
        }
    }

    #[tokio::test]
    async fn test_http_checker_judges_final_response_after_redirects() {
        let addr = spawn_http_target().await;
        let checker = HttpChecker::new(Duration::from_secs(2)).unwrap();

        let result = checker.probe(&format!("http://{}/moved", addr)).await;
        assert!(result.is_up());
        assert_eq!(result.response_code, Some(200));

        let result = checker.probe(&format!("http://{}/gone", addr)).await;
        assert_eq!(result.status, ProbeStatus::Down);
        assert_eq!(result.response_code, Some(404));

        let result = checker.probe(&format!("http://{}/loop", addr)).await;
        assert!(!result.is_up());
        assert!(result.response_code.is_none());
    }

    #[tokio::test]
    async fn test_http_checker_times_out() {
        let addr = spawn_http_target().await;
        let checker = HttpChecker::new(Duration::from_millis(200)).unwrap();

        let result = checker.probe(&format!("http://{}/slow", addr)).await;
        assert_eq!(result.status, ProbeStatus::Timeout);
        assert!(result.duration < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_http_checker_connection_refused() {
        let port = unused_port().await;
        let checker = HttpChecker::new(Duration::from_secs(1)).unwrap();

        let result = checker.probe(&format!("http://127.0.0.1:{}/", port)).await;
        assert!(!result.is_up());
        assert!(result.response_code.is_none());
    }

    #[tokio::test]
    async fn test_tcp_checker_up() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let checker = TcpChecker::new(Duration::from_secs(1));

        let result = checker.probe(&addr.to_string()).await;
        assert!(result.is_up());
    }

    #[tokio::test]
    async fn test_tcp_checker_refused() {
        let port = unused_port().await;
        let checker = TcpChecker::new(Duration::from_millis(500));

        let result = checker.probe(&format!("127.0.0.1:{}", port)).await;
        assert!(!result.is_up());
        assert!(result.duration <= Duration::from_millis(700));
    }

    #[tokio::test]
    async fn test_tcp_checker_bad_host() {
        let checker = TcpChecker::new(Duration::from_secs(2));

        let result = checker.probe("no-such-host.invalid:80").await;
        assert!(!result.is_up());
    }

    #[test]
    fn test_ping_arguments_per_platform() {
        let wait = Duration::from_secs(2);
        assert_eq!(
            PingPlatform::Windows.args("example.com", wait),
            ["-n", "1", "-w", "2000", "example.com"]
        );
        assert_eq!(
            PingPlatform::Unix.args("example.com", wait),
            ["-c", "1", "-W", "2", "example.com"]
        );
        assert_eq!(
            PingPlatform::Bsd.args("example.com", wait),
            ["-c", "1", "-t", "2", "example.com"]
        );
    }

    #[test]
    fn test_ping_wait_stays_within_whole_seconds() {
        let args = PingPlatform::Unix.args("h", Duration::from_millis(1500));
        assert_eq!(args[3], "1");
        let args = PingPlatform::Bsd.args("h", Duration::from_millis(2999));
        assert_eq!(args[3], "2");
        let args = PingPlatform::Unix.args("h", Duration::from_millis(10));
        assert_eq!(args[3], "1");
        let args = PingPlatform::Windows.args("h", Duration::from_millis(1500));
        assert_eq!(args[3], "1500");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ping_checker_uses_exit_status() {
        let up = PingChecker::new("true", Duration::from_secs(1));
        assert!(up.probe("127.0.0.1").await.is_up());

        let down = PingChecker::new("false", Duration::from_secs(1));
        let result = down.probe("127.0.0.1").await;
        assert_eq!(result.status, ProbeStatus::Down);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ping_checker_kills_stuck_utility_at_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("stuck-ping");
        std::fs::write(&script, "#!/bin/sh\nsleep 10\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let timeout = Duration::from_millis(300);
        let checker = PingChecker::new(script.to_string_lossy(), timeout);
        let result = checker.probe("127.0.0.1").await;

        assert_eq!(result.status, ProbeStatus::Timeout);
        assert!(
            result.duration < timeout + Duration::from_millis(500),
            "probe ran for {:?}",
            result.duration
        );
    }

    #[tokio::test]
    async fn test_ping_checker_missing_utility() {
        let checker = PingChecker::new("definitely-not-a-ping-binary", Duration::from_secs(1));
        let result = checker.probe("127.0.0.1").await;
        assert_eq!(result.status, ProbeStatus::Error);
    }

    #[tokio::test]
    async fn test_ping_checker_rejects_option_like_target() {
        let checker = PingChecker::new("ping", Duration::from_secs(1));
        let result = checker.probe("-f").await;
        assert_eq!(result.status, ProbeStatus::Error);
    }

    #[test]
    fn test_checker_set_lookup() {
        let set = CheckerSet::standard(&CheckerSettings::default()).unwrap();
        assert_eq!(set.len(), 3);
        for kind in ServiceKind::ALL {
            assert_eq!(set.get(kind).unwrap().kind(), kind);
        }
        assert_eq!(set.get(ServiceKind::Http).unwrap().timeout(), Duration::from_secs(10));
        assert_eq!(set.get(ServiceKind::Tcp).unwrap().timeout(), Duration::from_secs(5));

        let unknown = MonitoredService {
            id: 1,
            name: "x".into(),
            kind: "gopher".into(),
            target: "x".into(),
        };
        assert!(set.for_service(&unknown).is_none());
        assert!(CheckerSet::new().is_empty());
    }
}
