//! Shapes sweep and scan results into tables for display.
//!
//! Nothing here does I/O. Rows come out in the order the results went in.
use std::net::IpAddr;

use crate::protocol::{Protocol, ResultRow};
use crate::scanner::ScanOutcome;

/// A table cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    /// A host whose scan failed; shown distinctly from normal text.
    Failed,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// The plain text of the cell.
    pub fn as_str(&self) -> &str {
        match self {
            Cell::Text(value) => value,
            Cell::Failed => "Failed",
        }
    }
}

/// Title, column headers and rows, ready for the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultTable {
    pub title: String,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
}

impl ResultTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One row per live host.
pub fn liveness_table(alive: &[IpAddr]) -> ResultTable {
    ResultTable {
        title: "Ping Sweep Results".to_owned(),
        headers: vec!["IP Address"],
        rows: alive.iter().map(|ip| vec![Cell::text(ip.to_string())]).collect(),
    }
}

/// One row per scanned host: the report it produced, or a failure marker.
pub fn deep_scan_table(outcomes: &[(IpAddr, ScanOutcome)]) -> ResultTable {
    let rows = outcomes
        .iter()
        .map(|(ip, outcome)| {
            let result = match outcome {
                ScanOutcome::Report(path) => Cell::text(path.display().to_string()),
                ScanOutcome::Failed(_) => Cell::Failed,
            };
            vec![Cell::text(ip.to_string()), result]
        })
        .collect();

    ResultTable {
        title: "Nmap Scan Results".to_owned(),
        headers: vec!["IP Address", "Result File"],
        rows,
    }
}

/// One row per finding of the protocol checker.
pub fn protocol_table(protocol: Protocol, rows: &[ResultRow]) -> ResultTable {
    ResultTable {
        title: format!("Netexec Scan Results for {protocol}"),
        headers: vec!["Protocol", "IP Address", "Port", "Details"],
        rows: rows
            .iter()
            .map(|row| {
                vec![
                    Cell::text(row.protocol.as_str()),
                    Cell::text(row.host.as_str()),
                    Cell::text(row.port.as_str()),
                    Cell::text(row.detail.as_str()),
                ]
            })
            .collect(),
    }
}
