//! Progress and status sink handed to the prober and the dispatcher.
//!
//! The core never prints. It tells a [`Reporter`] what happened and the
//! binary decides how to show it (see `tui::TerminalReporter`).
use std::net::IpAddr;

use crate::error::{ProbeError, ScanFailure};
use crate::scanner::ScanJob;

/// Which fan-out a notification belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Probe,
    DeepScan,
    ProtocolScan,
}

/// Receives notifications while a phase runs.
///
/// All methods default to doing nothing so sinks only implement what they show.
#[allow(unused_variables)]
pub trait Reporter: Send + Sync {
    /// A phase is about to run over `hosts` hosts.
    fn phase_started(&self, phase: Phase, hosts: usize) {}

    /// A probe got a reply.
    fn host_alive(&self, host: IpAddr) {}

    /// A probe could not run; the host is treated as down.
    fn probe_failed(&self, host: IpAddr, error: &ProbeError) {}

    /// A scan subprocess is being launched.
    fn scan_started(&self, job: &ScanJob) {}

    /// A scan subprocess failed for one host.
    fn scan_failed(&self, job: &ScanJob, failure: &ScanFailure) {}

    /// A host finished within `phase`; `done` counts finished hosts so far.
    fn host_completed(&self, phase: Phase, done: usize, total: usize) {}

    /// Every host of the phase has finished.
    fn phase_finished(&self, phase: Phase) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {}
