//! Core functionality for driving the external tools.
//!
//! Every tool (the echo utility, the deep scanner and the protocol tester) is
//! described by a text template such as `nmap -sCV -Pn -T5 -oN {{output}} {{ip}}`.
//! The template is filled per host and executed through the platform shell as
//! its own OS process. [`probe`] runs the liveness sweep, [`dispatch`] runs the
//! follow-up scans.
pub mod dispatch;
pub mod probe;

use std::net::IpAddr;
use std::process::{Output, Stdio};

use log::debug;
use serde_derive::Serialize;
use text_placeholder::Template;
use tokio::io;
use tokio::process::Command;

pub use dispatch::{Dispatcher, ScanJob, ScanKind, ScanOutcome};
pub use probe::{Liveness, LivenessReport, Prober};

/// Default echo probe: one request, `{{timeout}}` seconds to answer.
pub const DEFAULT_PROBE_COMMAND: &str = "ping -c 1 -W {{timeout}} {{ip}}";

/// Default deep service scan, written to the `{{output}}` report.
pub const DEFAULT_DEEP_SCAN_COMMAND: &str = "nmap -sCV -Pn -T5 -oN {{output}} {{ip}}";

/// Default protocol checker.
pub const DEFAULT_PROTOCOL_COMMAND: &str = "nxc {{protocol}} {{ip}}";

/// Values a tool template can refer to.
///
/// Fields that do not apply to a given tool are left empty.
#[derive(Serialize, Debug, Default)]
pub struct ExecParts {
    ip: String,
    timeout: String,
    output: String,
    protocol: String,
}

impl ExecParts {
    /// Placeholders for `ip`, everything else empty.
    pub fn for_host(ip: IpAddr) -> Self {
        Self {
            ip: ip.to_string(),
            ..Self::default()
        }
    }

    /// Sets `{{timeout}}`.
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds.to_string();
        self
    }

    /// Sets `{{output}}`.
    pub fn output(mut self, path: impl Into<String>) -> Self {
        self.output = path.into();
        self
    }

    /// Sets `{{protocol}}`.
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }
}

/// A tool invocation template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    call_format: String,
}

impl ToolCommand {
    pub fn new(call_format: impl Into<String>) -> Self {
        Self {
            call_format: call_format.into(),
        }
    }

    pub fn call_format(&self) -> &str {
        &self.call_format
    }

    /// Fills the template. Errors are returned as text so callers can wrap them
    /// in their own error type.
    pub fn render(&self, parts: &ExecParts) -> Result<String, String> {
        Template::new(&self.call_format)
            .fill_with_struct(parts)
            .map_err(|e| format!("{e:?} in template {:?}", self.call_format))
    }
}

/// Runs `command` through the platform shell and collects its output.
///
/// The child is killed if the returned future is dropped before it finishes,
/// which is how callers enforce a deadline.
pub async fn execute(command: &str) -> io::Result<Output> {
    debug!("Running {}", command);

    let (shell, flag) = if cfg!(unix) {
        ("sh", "-c")
    } else {
        ("cmd.exe", "/c")
    };

    Command::new(shell)
        .args([flag, command])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
}

/// Describes how a process ended, for error messages.
pub fn describe_status(output: &Output) -> String {
    match output.status.code() {
        Some(code) => format!("exit code {code}"),
        None => {
            #[cfg(unix)]
            {
                use std::os::unix::process::ExitStatusExt;
                if let Some(signal) = output.status.signal() {
                    return format!("signal {signal}");
                }
            }
            "unknown status".to_owned()
        }
    }
}
