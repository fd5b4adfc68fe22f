//! Terminal output: status macros, the banner, tables and the reporter used
//! by the binary.
use std::net::IpAddr;
use std::sync::Mutex;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;

use crate::error::{ProbeError, ScanFailure};
use crate::reporter::{Phase, Reporter};
use crate::results::{Cell, ResultTable};
use crate::scanner::{ScanJob, ScanKind};

#[doc(hidden)]
pub use colored::Colorize as __Colorize;

/// Prints a red `[!]` line unless greppable.
#[macro_export]
macro_rules! warning {
    ($name:expr) => {{
        use $crate::tui::__Colorize as _;
        println!("{} {}", "[!]".red().bold(), $name);
    }};
    ($name:expr, $greppable:expr, $accessible:expr) => {{
        use $crate::tui::__Colorize as _;
        // if not greppable then print, otherwise no else statement so do not print.
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!("{} {}", "[!]".red().bold(), $name);
            }
        }
    }};
}

/// Prints a blue `[~]` line unless greppable.
#[macro_export]
macro_rules! detail {
    ($name:expr) => {{
        use $crate::tui::__Colorize as _;
        println!("{} {}", "[~]".blue().bold(), $name);
    }};
    ($name:expr, $greppable:expr, $accessible:expr) => {{
        use $crate::tui::__Colorize as _;
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!("{} {}", "[~]".blue().bold(), $name);
            }
        }
    }};
}

/// Prints a green `[>]` line unless greppable.
#[macro_export]
macro_rules! output {
    ($name:expr) => {{
        use $crate::tui::__Colorize as _;
        println!("{} {}", "[>]".green().bold(), $name);
    }};
    ($name:expr, $greppable:expr, $accessible:expr) => {{
        use $crate::tui::__Colorize as _;
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!("{} {}", "[>]".green().bold(), $name);
            }
        }
    }};
}

const BANNER: &str = r#"
 ____  _            _
|  _ \(_)_   _____ | |_ ___ _ __
| |_) | \ \ / / _ \| __/ _ \ '__|
|  __/| |\ V / (_) | ||  __/ |
|_|   |_| \_/ \___/ \__\___|_|
"#;

/// Prints the start-up banner.
pub fn print_opening(accessible: bool) {
    if accessible {
        println!("Pivoter {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    print_gradient(BANNER);
    println!(
        "{}\n",
        "Sweep a range, then pivot into nmap and netexec.".magenta().bold()
    );
}

// Kept apart: colorful and colored both add methods to &str.
fn print_gradient(text: &str) {
    use colorful::{Color, Colorful};
    println!("{}", text.gradient(Color::Cyan).bold());
}

/// Renders a table as text.
///
/// Greppable output is one tab separated line per row with no title or
/// headers. Accessible output keeps the layout but drops colour.
pub fn render_table(table: &ResultTable, greppable: bool, accessible: bool) -> String {
    if greppable {
        return table
            .rows
            .iter()
            .map(|row| row.iter().map(Cell::as_str).join("\t"))
            .join("\n");
    }

    let widths: Vec<usize> = table
        .headers
        .iter()
        .enumerate()
        .map(|(column, header)| {
            table
                .rows
                .iter()
                .filter_map(|row| row.get(column))
                .map(|cell| cell.as_str().chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let separator = widths.iter().map(|w| "-".repeat(w + 2)).join("+");
    let separator = format!("+{separator}+");

    let header = table
        .headers
        .iter()
        .zip(&widths)
        .map(|(header, &width)| {
            let padded = format!(" {header:<width$} ");
            if accessible {
                padded
            } else {
                padded.magenta().bold().to_string()
            }
        })
        .join("|");

    let mut lines = vec![
        table.title.clone(),
        separator.clone(),
        format!("|{header}|"),
        separator.clone(),
    ];
    for row in &table.rows {
        let cells = row
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| {
                let padded = format!(" {:<width$} ", cell.as_str());
                match cell {
                    Cell::Failed if !accessible => padded.red().to_string(),
                    _ => padded,
                }
            })
            .join("|");
        lines.push(format!("|{cells}|"));
    }
    lines.push(separator);
    lines.join("\n")
}

/// Prints status lines and a progress bar for protocol checks.
pub struct TerminalReporter {
    greppable: bool,
    accessible: bool,
    progress: Mutex<Option<ProgressBar>>,
}

impl TerminalReporter {
    pub fn new(greppable: bool, accessible: bool) -> Self {
        Self {
            greppable,
            accessible,
            progress: Mutex::new(None),
        }
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if self.greppable || self.accessible {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} Scanning [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

impl Reporter for TerminalReporter {
    fn phase_started(&self, phase: Phase, hosts: usize) {
        match phase {
            Phase::Probe => detail!(
                format!("Probing {hosts} hosts..."),
                self.greppable,
                self.accessible
            ),
            Phase::DeepScan => detail!(
                format!("Starting Nmap scans on {hosts} live hosts..."),
                self.greppable,
                self.accessible
            ),
            Phase::ProtocolScan => {
                if let Ok(mut progress) = self.progress.lock() {
                    *progress = Some(self.progress_bar(hosts));
                }
            }
        }
    }

    fn host_alive(&self, host: IpAddr) {
        output!(
            format!("Host {host} is alive."),
            self.greppable,
            self.accessible
        );
    }

    fn probe_failed(&self, host: IpAddr, error: &ProbeError) {
        warning!(
            format!("Error processing {host}: {error}"),
            self.greppable,
            self.accessible
        );
    }

    fn scan_started(&self, job: &ScanJob) {
        if job.kind == ScanKind::DeepServiceScan {
            detail!(
                format!("Running Nmap scan for {}...", job.host),
                self.greppable,
                self.accessible
            );
        }
    }

    fn scan_failed(&self, job: &ScanJob, failure: &ScanFailure) {
        let message = match job.kind {
            ScanKind::DeepServiceScan => format!("Nmap scan failed for {}: {failure}", job.host),
            ScanKind::ProtocolCheck(protocol) => {
                format!("Error running nxc for {} and protocol {protocol}: {failure}", job.host)
            }
        };

        let progress = self.progress.lock().ok().and_then(|p| p.clone());
        match progress {
            Some(pb) if !pb.is_hidden() => pb.suspend(|| warning!(message)),
            _ => warning!(message, self.greppable, self.accessible),
        }
    }

    fn host_completed(&self, phase: Phase, done: usize, _total: usize) {
        if phase != Phase::ProtocolScan {
            return;
        }
        if let Some(pb) = self.progress.lock().ok().and_then(|p| p.clone()) {
            pb.set_position(done as u64);
        }
    }

    fn phase_finished(&self, phase: Phase) {
        match phase {
            Phase::Probe => detail!("Ping sweep completed.", self.greppable, self.accessible),
            Phase::DeepScan => detail!("All Nmap scans completed.", self.greppable, self.accessible),
            Phase::ProtocolScan => {
                if let Some(pb) = self.progress.lock().ok().and_then(|mut p| p.take()) {
                    pb.finish();
                }
            }
        }
    }
}
