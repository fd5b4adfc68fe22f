//! Sweep, pick an action, aggregate: the library end to end.
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use pivoter::action::{Action, ActionOutcome, Session};
use pivoter::address::DEFAULT_MAX_HOSTS;
use pivoter::error::ScanFailure;
use pivoter::protocol::Protocol;
use pivoter::reporter::{Phase, Reporter};
use pivoter::results::Cell;
use pivoter::scanner::{Dispatcher, Prober, ScanJob, ToolCommand};

#[derive(Default)]
struct Recorder {
    alive: Mutex<Vec<IpAddr>>,
    progress: Mutex<Vec<(Phase, usize, usize)>>,
    failed: Mutex<Vec<ScanJob>>,
}

impl Reporter for Recorder {
    fn host_alive(&self, host: IpAddr) {
        self.alive.lock().unwrap().push(host);
    }

    fn scan_failed(&self, job: &ScanJob, _failure: &ScanFailure) {
        self.failed.lock().unwrap().push(*job);
    }

    fn host_completed(&self, phase: Phase, done: usize, total: usize) {
        self.progress.lock().unwrap().push((phase, done, total));
    }
}

fn session(output_dir: &std::path::Path) -> Session {
    let prober = Prober::new(Duration::from_secs(1), 16).with_command(ToolCommand::new(
        "case {{ip}} in *.1|*.2|*.3) echo '64 bytes from {{ip}}: icmp_seq=1 ttl=64';; *) exit 1;; esac",
    ));
    let dispatcher = Dispatcher::new(output_dir, 2)
        .with_deep_scan_command(ToolCommand::new(
            "case {{ip}} in *.2) exit 1;; esac; echo 'PORT STATE SERVICE' > {{output}}",
        ))
        .with_protocol_command(ToolCommand::new(
            "case {{ip}} in *.3) sleep 0.2;; esac; \
             echo '{{protocol}} {{ip}} 445 HOST [*] Windows'; echo '{{protocol}} {{ip}}'",
        ));
    Session::new(prober, dispatcher, DEFAULT_MAX_HOSTS)
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

#[tokio::test]
async fn sweep_then_scan_a_small_network() {
    let dir = tempfile::tempdir().unwrap();
    let session = session(dir.path());
    let recorder = Recorder::default();

    let sweep = session.sweep("172.16.5.0/29", &recorder).await.unwrap();
    let hosts = sweep.alive();
    assert_eq!(sweep.report.len(), 6);
    assert_eq!(hosts, [ip("172.16.5.1"), ip("172.16.5.2"), ip("172.16.5.3")]);
    assert_eq!(*recorder.alive.lock().unwrap(), hosts);

    let ActionOutcome::Table(deep) = session.run_action(Action::DeepScan, &hosts, &recorder).await
    else {
        panic!("deep scan should produce a table");
    };
    assert_eq!(deep.rows.len(), 3);
    assert_eq!(deep.rows[1], [Cell::text("172.16.5.2"), Cell::Failed]);
    assert!(dir.path().join("nmap_scan_172_16_5_1.txt").exists());
    assert!(dir.path().join("nmap_scan_172_16_5_3.txt").exists());
    assert!(!dir.path().join("nmap_scan_172_16_5_2.txt").exists());

    let ActionOutcome::Table(check) = session
        .run_action(Action::ProtocolCheck(Protocol::Ldap), &hosts, &recorder)
        .await
    else {
        panic!("protocol check should produce a table");
    };
    let hosts_in_rows: Vec<&str> = check.rows.iter().map(|row| row[1].as_str()).collect();
    assert_eq!(hosts_in_rows, ["172.16.5.1", "172.16.5.2", "172.16.5.3"]);
    assert!(check.rows.iter().all(|row| row[0].as_str() == "ldap"));

    let protocol_progress: Vec<usize> = recorder
        .progress
        .lock()
        .unwrap()
        .iter()
        .filter(|(phase, _, total)| *phase == Phase::ProtocolScan && *total == 3)
        .map(|(_, done, _)| *done)
        .collect();
    assert_eq!(protocol_progress, [1, 2, 3]);

    let failed = recorder.failed.lock().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].host, ip("172.16.5.2"));
}

#[tokio::test]
async fn next_ends_the_range() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = session(dir.path())
        .run_action(Action::Next, &[ip("172.16.5.1")], &Recorder::default())
        .await;
    assert_eq!(outcome, ActionOutcome::Finished);
}
