//! The operations a user can trigger on a swept range.
//!
//! [`Session`] ties the enumerator, the prober and the dispatcher together.
//! Whatever drives it (an interactive menu, a flag on the command line, a
//! test) only chooses an [`Action`] and renders the [`ResultTable`] it gets
//! back.
use std::net::IpAddr;

use log::info;

use crate::address;
use crate::error::InvalidRangeError;
use crate::protocol::Protocol;
use crate::reporter::Reporter;
use crate::results::{self, ResultTable};
use crate::scanner::{Dispatcher, LivenessReport, Prober};

/// What to do with the live hosts of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    DeepScan,
    ProtocolCheck(Protocol),
    /// Leave this range and move on to the next one.
    Next,
}

/// What running an [`Action`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Table(ResultTable),
    /// There were no live hosts to act on.
    NoHosts,
    /// The range is done.
    Finished,
}

/// Result of sweeping one range.
#[derive(Debug)]
pub struct Sweep {
    pub range: String,
    pub report: LivenessReport,
}

impl Sweep {
    pub fn alive(&self) -> Vec<IpAddr> {
        self.report.alive()
    }

    pub fn table(&self) -> ResultTable {
        results::liveness_table(&self.alive())
    }
}

/// Everything needed to sweep ranges and scan their hosts.
#[derive(Debug, Clone)]
pub struct Session {
    prober: Prober,
    dispatcher: Dispatcher,
    max_hosts: u64,
}

impl Session {
    pub fn new(prober: Prober, dispatcher: Dispatcher, max_hosts: u64) -> Self {
        Self {
            prober,
            dispatcher,
            max_hosts,
        }
    }

    /// Enumerates `range` and probes every usable host in it.
    ///
    /// A malformed range fails before a single probe is sent.
    pub async fn sweep(
        &self,
        range: &str,
        reporter: &dyn Reporter,
    ) -> Result<Sweep, InvalidRangeError> {
        let hosts = address::enumerate(range, self.max_hosts)?;
        info!("Starting ping sweep on {} ({} hosts)", range, hosts.len());

        let report = self.prober.run(&hosts, reporter).await;
        Ok(Sweep {
            range: range.to_owned(),
            report,
        })
    }

    /// Runs `action` against `hosts`.
    pub async fn run_action(
        &self,
        action: Action,
        hosts: &[IpAddr],
        reporter: &dyn Reporter,
    ) -> ActionOutcome {
        match action {
            Action::Next => ActionOutcome::Finished,
            _ if hosts.is_empty() => ActionOutcome::NoHosts,
            Action::DeepScan => {
                let outcomes = self.dispatcher.deep_scan(hosts, reporter).await;
                ActionOutcome::Table(results::deep_scan_table(&outcomes))
            }
            Action::ProtocolCheck(protocol) => {
                let rows = self.dispatcher.protocol_scan(hosts, protocol, reporter).await;
                ActionOutcome::Table(results::protocol_table(protocol, &rows))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NullReporter;
    use crate::scanner::ToolCommand;
    use std::time::Duration;

    fn session() -> Session {
        let prober = Prober::new(Duration::from_secs(1), 8).with_command(ToolCommand::new(
            "case {{ip}} in *.1) echo '64 bytes from {{ip}}: icmp_seq=1 ttl=64';; esac",
        ));
        let dispatcher = Dispatcher::new(".", 8);
        Session::new(prober, dispatcher, address::DEFAULT_MAX_HOSTS)
    }

    #[tokio::test]
    async fn sweep_of_slash_30_finds_the_replying_host() {
        let sweep = session()
            .sweep("10.10.110.0/30", &NullReporter)
            .await
            .unwrap();

        assert_eq!(sweep.report.len(), 2);
        assert_eq!(sweep.alive(), ["10.10.110.1".parse::<IpAddr>().unwrap()]);
        assert_eq!(sweep.table().rows.len(), 1);
    }

    #[tokio::test]
    async fn malformed_range_is_rejected_without_probing() {
        let err = session().sweep("10.10.110.0/99", &NullReporter).await;
        assert!(matches!(err, Err(InvalidRangeError::Malformed { .. })));
    }

    #[tokio::test]
    async fn actions_on_no_hosts_do_nothing() {
        let session = session();
        assert_eq!(
            session.run_action(Action::DeepScan, &[], &NullReporter).await,
            ActionOutcome::NoHosts
        );
        assert_eq!(
            session.run_action(Action::Next, &[], &NullReporter).await,
            ActionOutcome::Finished
        );
    }
}
