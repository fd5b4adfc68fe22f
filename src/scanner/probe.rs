//! Liveness sweep: one echo probe per host, all through a bounded pool.
use std::net::IpAddr;
use std::time::Duration;

use futures::{stream, StreamExt};
use log::{debug, info, warn};
use tokio::time;

use super::{describe_status, execute, ExecParts, ToolCommand, DEFAULT_PROBE_COMMAND};
use crate::error::ProbeError;
use crate::reporter::{Phase, Reporter};

/// Text the default echo utility prints for every reply.
pub const DEFAULT_REPLY_MARKER: &str = "bytes from";

/// Time a probe process gets on top of its own timeout before it is killed.
const PROBE_GRACE: Duration = Duration::from_secs(2);

/// What a single probe found out about a host.
#[derive(Debug)]
pub enum Liveness {
    Alive,
    Unreachable,
    ProbeError(ProbeError),
}

impl Liveness {
    pub fn is_alive(&self) -> bool {
        matches!(self, Liveness::Alive)
    }
}

/// Outcome of one sweep, in the order the hosts were given.
#[derive(Debug, Default)]
pub struct LivenessReport {
    entries: Vec<(IpAddr, Liveness)>,
}

impl LivenessReport {
    pub fn entries(&self) -> &[(IpAddr, Liveness)] {
        &self.entries
    }

    /// The hosts that replied, in sweep order.
    pub fn alive(&self) -> Vec<IpAddr> {
        self.entries
            .iter()
            .filter(|(_, liveness)| liveness.is_alive())
            .map(|(host, _)| *host)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Runs the echo probe against every host of a range.
///
/// `batch_size` probes are in flight at once. Each probe is allowed its
/// `timeout` plus a short grace period; a probe still running after that is
/// killed and its host counted as unreachable.
#[derive(Debug, Clone)]
pub struct Prober {
    command: ToolCommand,
    reply_marker: String,
    timeout: Duration,
    batch_size: usize,
}

impl Prober {
    pub fn new(timeout: Duration, batch_size: usize) -> Self {
        Self {
            command: ToolCommand::new(DEFAULT_PROBE_COMMAND),
            reply_marker: DEFAULT_REPLY_MARKER.to_owned(),
            timeout,
            batch_size: batch_size.max(1),
        }
    }

    /// Replaces the echo utility invocation.
    pub fn with_command(mut self, command: ToolCommand) -> Self {
        self.command = command;
        self
    }

    /// Replaces the text that marks a reply in the probe's output.
    pub fn with_reply_marker(mut self, marker: impl Into<String>) -> Self {
        self.reply_marker = marker.into();
        self
    }

    /// The longest a single probe can take.
    pub fn deadline(&self) -> Duration {
        self.timeout + PROBE_GRACE
    }

    /// Probes every host and returns once all probes have finished.
    pub async fn run(&self, hosts: &[IpAddr], reporter: &dyn Reporter) -> LivenessReport {
        reporter.phase_started(Phase::Probe, hosts.len());
        debug!(
            "Start probing.\nBatch size {}\nNumber of hosts {}\nTimeout {:?}",
            self.batch_size,
            hosts.len(),
            self.timeout
        );

        let total = hosts.len();
        let mut done = 0;
        let entries = stream::iter(hosts.iter().copied())
            .map(|host| async move { (host, self.probe(host).await) })
            .buffered(self.batch_size)
            .inspect(|(host, liveness)| {
                match liveness {
                    Liveness::Alive => {
                        info!("Host {} is alive.", host);
                        reporter.host_alive(*host);
                    }
                    Liveness::Unreachable => debug!("Host {} did not reply", host),
                    Liveness::ProbeError(e) => {
                        warn!("Error processing {}: {}", host, e);
                        reporter.probe_failed(*host, e);
                    }
                }
                done += 1;
                reporter.host_completed(Phase::Probe, done, total);
            })
            .collect::<Vec<_>>()
            .await;

        reporter.phase_finished(Phase::Probe);
        LivenessReport { entries }
    }

    async fn probe(&self, host: IpAddr) -> Liveness {
        let parts = ExecParts::for_host(host).timeout(self.timeout_secs());
        let command = match self.command.render(&parts) {
            Ok(command) => command,
            Err(e) => return Liveness::ProbeError(ProbeError::Template(e)),
        };

        match time::timeout(self.deadline(), execute(&command)).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if stdout.contains(self.reply_marker.as_str()) {
                    return Liveness::Alive;
                }
                match output.status.code() {
                    // ping exits 1 when nothing answered.
                    Some(0 | 1) => Liveness::Unreachable,
                    _ => Liveness::ProbeError(ProbeError::Exit {
                        status: describe_status(&output),
                        stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
                    }),
                }
            }
            Ok(Err(e)) => Liveness::ProbeError(ProbeError::Io(e)),
            Err(_) => {
                debug!("Probe of {} overran {:?}, killed", host, self.deadline());
                Liveness::Unreachable
            }
        }
    }

    /// Echo utilities take whole seconds; never ask for zero.
    fn timeout_secs(&self) -> u64 {
        let millis = self.timeout.as_millis();
        u64::try_from(millis.div_ceil(1000)).unwrap_or(u64::MAX).max(1)
    }
}
