//! Fans follow-up scans out over the live hosts and gathers what they produce.
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::{stream, StreamExt};
use log::{debug, info, warn};

use super::{
    describe_status, execute, ExecParts, ToolCommand, DEFAULT_DEEP_SCAN_COMMAND,
    DEFAULT_PROTOCOL_COMMAND,
};
use crate::error::ScanFailure;
use crate::protocol::{Protocol, ResultRow};
use crate::reporter::{Phase, Reporter};

/// What to run against a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    DeepServiceScan,
    ProtocolCheck(Protocol),
}

/// One host paired with the scan to run against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanJob {
    pub host: IpAddr,
    pub kind: ScanKind,
}

/// How a deep scan of one host ended.
#[derive(Debug)]
pub enum ScanOutcome {
    /// The scanner exited cleanly and wrote this report.
    Report(PathBuf),
    Failed(ScanFailure),
}

impl ScanOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScanOutcome::Report(_))
    }
}

/// File name of the deep scan report for `host`.
///
/// Anything that is not a letter or digit becomes `_`, so both `10.0.0.1` and
/// `fe80::1` give names that are safe on every filesystem.
pub fn report_file_name(host: IpAddr) -> String {
    let safe: String = host
        .to_string()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("nmap_scan_{safe}.txt")
}

/// Runs deep scans and protocol checks, `batch_size` subprocesses at a time.
///
/// Results always come back in the order the hosts were given, whatever order
/// the subprocesses finish in.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    deep_scan_command: ToolCommand,
    protocol_command: ToolCommand,
    output_dir: PathBuf,
    batch_size: usize,
}

impl Dispatcher {
    pub fn new(output_dir: impl Into<PathBuf>, batch_size: usize) -> Self {
        Self {
            deep_scan_command: ToolCommand::new(DEFAULT_DEEP_SCAN_COMMAND),
            protocol_command: ToolCommand::new(DEFAULT_PROTOCOL_COMMAND),
            output_dir: output_dir.into(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn with_deep_scan_command(mut self, command: ToolCommand) -> Self {
        self.deep_scan_command = command;
        self
    }

    pub fn with_protocol_command(mut self, command: ToolCommand) -> Self {
        self.protocol_command = command;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the deep scan report for `host` is written.
    pub fn report_path(&self, host: IpAddr) -> PathBuf {
        self.output_dir.join(report_file_name(host))
    }

    /// Runs one deep scan per host. Every host gets exactly one outcome.
    pub async fn deep_scan(
        &self,
        hosts: &[IpAddr],
        reporter: &dyn Reporter,
    ) -> Vec<(IpAddr, ScanOutcome)> {
        info!("Starting Nmap scans on {} live hosts", hosts.len());
        reporter.phase_started(Phase::DeepScan, hosts.len());

        let total = hosts.len();
        let done = AtomicUsize::new(0);
        let done = &done;

        let outcomes = stream::iter(hosts.iter().copied())
            .map(|host| async move {
                let job = ScanJob {
                    host,
                    kind: ScanKind::DeepServiceScan,
                };
                reporter.scan_started(&job);

                let outcome = match self.run_deep_scan(host).await {
                    Ok(report) => ScanOutcome::Report(report),
                    Err(failure) => {
                        warn!("Nmap scan failed for {}: {}", host, failure);
                        reporter.scan_failed(&job, &failure);
                        ScanOutcome::Failed(failure)
                    }
                };

                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                reporter.host_completed(Phase::DeepScan, finished, total);
                (host, outcome)
            })
            .buffered(self.batch_size)
            .collect::<Vec<_>>()
            .await;

        info!("All Nmap scans completed.");
        reporter.phase_finished(Phase::DeepScan);
        outcomes
    }

    async fn run_deep_scan(&self, host: IpAddr) -> Result<PathBuf, ScanFailure> {
        let report = self.report_path(host);
        let parts = ExecParts::for_host(host).output(shell_quote(&report.to_string_lossy()));
        let command = self
            .deep_scan_command
            .render(&parts)
            .map_err(ScanFailure::Template)?;

        run_checked(&command).await?;

        if !report.exists() {
            return Err(ScanFailure::MissingReport(report));
        }
        Ok(report)
    }

    /// Runs the protocol checker once per host and returns every parsed row,
    /// host by host, line by line.
    ///
    /// Progress is reported once per host after its checker has exited.
    pub async fn protocol_scan(
        &self,
        hosts: &[IpAddr],
        protocol: Protocol,
        reporter: &dyn Reporter,
    ) -> Vec<ResultRow> {
        info!(
            "Starting netexec scans with protocol {} on {} live hosts",
            protocol,
            hosts.len()
        );
        reporter.phase_started(Phase::ProtocolScan, hosts.len());

        let total = hosts.len();
        let done = AtomicUsize::new(0);
        let done = &done;

        let rows = stream::iter(hosts.iter().copied())
            .map(|host| async move {
                let job = ScanJob {
                    host,
                    kind: ScanKind::ProtocolCheck(protocol),
                };
                reporter.scan_started(&job);

                let rows = match self.run_protocol_check(host, protocol).await {
                    Ok(rows) => rows,
                    Err(failure) => {
                        warn!("Error running nxc for {} and protocol {}: {}", host, protocol, failure);
                        reporter.scan_failed(&job, &failure);
                        Vec::new()
                    }
                };

                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                reporter.host_completed(Phase::ProtocolScan, finished, total);
                rows
            })
            .buffered(self.batch_size)
            .concat()
            .await;

        reporter.phase_finished(Phase::ProtocolScan);
        rows
    }

    async fn run_protocol_check(
        &self,
        host: IpAddr,
        protocol: Protocol,
    ) -> Result<Vec<ResultRow>, ScanFailure> {
        let parts = ExecParts::for_host(host).protocol(protocol.keyword());
        let command = self
            .protocol_command
            .render(&parts)
            .map_err(ScanFailure::Template)?;

        let stdout = run_checked(&command).await?;
        let rows = ResultRow::parse_output(&stdout);
        debug!("{} rows from {}", rows.len(), command);
        Ok(rows)
    }
}

/// Runs `command` and returns its stdout, failing on a non-zero exit.
async fn run_checked(command: &str) -> Result<String, ScanFailure> {
    let output = execute(command)
        .await
        .map_err(|source| ScanFailure::Launch {
            command: command.to_owned(),
            source,
        })?;

    if !output.status.success() {
        return Err(ScanFailure::Exit {
            command: command.to_owned(),
            status: describe_status(&output),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Quotes a path so the shell passes it through as one word.
fn shell_quote(value: &str) -> String {
    if cfg!(unix) {
        format!("'{}'", value.replace('\'', r"'\''"))
    } else {
        format!("\"{value}\"")
    }
}
