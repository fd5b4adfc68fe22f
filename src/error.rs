//! Error types for range parsing, probing and scan dispatch.
//!
//! Every failure below a range is scoped to a single host: the prober and the
//! dispatcher record these errors next to the host they belong to and keep
//! going. Only [`InvalidRangeError`] stops work, and only for its own range.
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A range specification that cannot be enumerated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidRangeError {
    /// The text is not an `address/prefix` pair or a bare address.
    #[error("Invalid CIDR format: {spec}. Use format like 10.10.110.0/24 ({reason})")]
    Malformed {
        /// The range as typed by the user.
        spec: String,
        /// Why the parser rejected it.
        reason: String,
    },

    /// The range is valid but holds more addresses than the sweep allows.
    #[error(
        "Range {spec} holds {addresses} addresses, more than the limit of {limit} (raise it with --max-hosts)"
    )]
    TooLarge {
        /// The range as typed by the user.
        spec: String,
        /// Number of addresses in the network.
        addresses: u128,
        /// The configured `max_hosts` guard.
        limit: u64,
    },
}

/// A liveness probe that could not produce an answer.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The echo utility could not be spawned or its output could not be read.
    #[error("could not run probe: {0}")]
    Io(#[from] io::Error),

    /// The echo utility ran but failed for a reason other than "no reply".
    #[error("probe exited with {status}: {stderr}")]
    Exit {
        /// Exit code, or a description of the terminating signal.
        status: String,
        /// What the utility printed on stderr, trimmed.
        stderr: String,
    },

    /// The probe command template could not be rendered.
    #[error("could not render probe command: {0}")]
    Template(String),
}

/// Why a deep scan or a protocol check failed for one host.
#[derive(Error, Debug)]
pub enum ScanFailure {
    /// The tool could not be spawned or waited on.
    #[error("could not launch `{command}`: {source}")]
    Launch {
        /// The rendered command line.
        command: String,
        /// Underlying spawn error.
        #[source]
        source: io::Error,
    },

    /// The tool ran and exited unsuccessfully.
    #[error("`{command}` exited with {status}")]
    Exit {
        /// The rendered command line.
        command: String,
        /// Exit code, or a description of the terminating signal.
        status: String,
    },

    /// The deep scanner exited cleanly but never wrote its report.
    #[error("report {} was not written", .0.display())]
    MissingReport(PathBuf),

    /// The command template could not be rendered.
    #[error("could not render command: {0}")]
    Template(String),
}
