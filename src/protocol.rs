//! The protocol catalog of the checker and the parser for its output lines.
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde_derive::Deserialize;

/// Protocols the checker can test, in menu order.
#[derive(Deserialize, Debug, ValueEnum, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Mssql,
    Ldap,
    Ftp,
    Wmi,
    Nfs,
    Ssh,
    Smb,
    Winrm,
    Vnc,
    Rdp,
}

impl Protocol {
    /// Every protocol, in the order the menu lists them.
    pub const CATALOG: [Protocol; 10] = [
        Protocol::Mssql,
        Protocol::Ldap,
        Protocol::Ftp,
        Protocol::Wmi,
        Protocol::Nfs,
        Protocol::Ssh,
        Protocol::Smb,
        Protocol::Winrm,
        Protocol::Vnc,
        Protocol::Rdp,
    ];

    /// The keyword the checker expects on its command line.
    pub fn keyword(self) -> &'static str {
        match self {
            Protocol::Mssql => "mssql",
            Protocol::Ldap => "ldap",
            Protocol::Ftp => "ftp",
            Protocol::Wmi => "wmi",
            Protocol::Nfs => "nfs",
            Protocol::Ssh => "ssh",
            Protocol::Smb => "smb",
            Protocol::Winrm => "winrm",
            Protocol::Vnc => "vnc",
            Protocol::Rdp => "rdp",
        }
    }

    /// Looks up a 1-based menu index.
    pub fn from_menu_index(index: usize) -> Option<Self> {
        index
            .checked_sub(1)
            .and_then(|i| Self::CATALOG.get(i))
            .copied()
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::CATALOG
            .iter()
            .copied()
            .find(|p| p.keyword() == wanted)
            .ok_or_else(|| format!("Unknown protocol '{s}'"))
    }
}

/// One finding of the protocol checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub protocol: String,
    pub host: String,
    pub port: String,
    pub detail: String,
}

impl ResultRow {
    /// Splits `line` on whitespace into at most four fields.
    ///
    /// The fourth field is the rest of the line with its inner spacing kept.
    /// Lines with fewer than four fields are banners or status noise and give
    /// `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_start();
        let mut head: [&str; 3] = [""; 3];
        for field in &mut head {
            let end = rest.find(char::is_whitespace)?;
            *field = &rest[..end];
            rest = rest[end..].trim_start();
        }

        let detail = rest.trim_end();
        if detail.is_empty() {
            return None;
        }

        let [protocol, host, port] = head;
        Some(Self {
            protocol: protocol.to_owned(),
            host: host.to_owned(),
            port: port.to_owned(),
            detail: detail.to_owned(),
        })
    }

    /// Parses every line of a checker's output, dropping malformed ones.
    pub fn parse_output(output: &str) -> Vec<Self> {
        output.lines().filter_map(Self::parse).collect()
    }
}
