//! This crate exposes the internal functionality of the Pivoter sweep tool.
//!
//! Pivoter finds the live hosts of one or more network ranges with a ping
//! sweep, then runs follow-up scans against them: an nmap service and version
//! scan per host, or a netexec protocol check (smb, ldap, winrm, ...) per host.
//!
//! ## Architecture Overview
//!
//! 1. **Enumeration**: [`address::enumerate`] turns `10.10.110.0/24` into the
//!    usable host addresses of that network.
//! 2. **Probing**: [`scanner::Prober`] runs one echo probe per host, a bounded
//!    number at a time, and keeps the hosts that replied in input order.
//! 3. **Dispatch**: [`scanner::Dispatcher`] runs the deep scan or the protocol
//!    checker once per live host and collects their results.
//! 4. **Aggregation**: [`results`] shapes everything into tables.
//!
//! [`action::Session`] wires the four together behind an [`action::Action`].
//! Progress is reported through a [`reporter::Reporter`], so the library never
//! writes to the terminal itself.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use pivoter::action::{Action, ActionOutcome, Session};
//! use pivoter::address::DEFAULT_MAX_HOSTS;
//! use pivoter::protocol::Protocol;
//! use pivoter::reporter::NullReporter;
//! use pivoter::scanner::{Dispatcher, Prober};
//!
//! #[tokio::main]
//! async fn main() {
//!     let session = Session::new(
//!         Prober::new(Duration::from_secs(1), 256),
//!         Dispatcher::new(".", 16),
//!         DEFAULT_MAX_HOSTS,
//!     );
//!
//!     let sweep = session.sweep("10.10.110.0/24", &NullReporter).await.unwrap();
//!     let hosts = sweep.alive();
//!
//!     let action = Action::ProtocolCheck(Protocol::Smb);
//!     if let ActionOutcome::Table(table) = session.run_action(action, &hosts, &NullReporter).await {
//!         println!("{} findings", table.rows.len());
//!     }
//! }
//! ```
#![allow(clippy::needless_doctest_main)]

pub mod tui;

pub mod input;

pub mod error;

pub mod address;

pub mod scanner;

pub mod protocol;

pub mod reporter;

pub mod results;

pub mod action;
