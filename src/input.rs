//! Provides a means to read, parse and hold configuration options for sweeps.
use clap::{Parser, ValueEnum};
use serde_derive::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::address::DEFAULT_MAX_HOSTS;
use crate::protocol::Protocol;
use crate::scanner::probe::DEFAULT_REPLY_MARKER;
use crate::scanner::{DEFAULT_DEEP_SCAN_COMMAND, DEFAULT_PROBE_COMMAND, DEFAULT_PROTOCOL_COMMAND};

/// What to do once a range has been swept.
///   - menu asks interactively, once per range, until "next" is chosen.
///   - deep runs the deep service scan on every live host.
///   - protocol runs the protocol checker given with `--protocol`.
///   - none only reports the live hosts.
#[derive(Deserialize, Debug, ValueEnum, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionMode {
    Menu,
    Deep,
    Protocol,
    None,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pivoter",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nARGS:\n{positionals}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// Ping sweep one or more ranges, then run nmap or netexec against the live hosts.
/// Only use this against networks you are authorised to test.
pub struct Opts {
    /// Ranges to sweep, as address/prefix (10.10.110.0/24) or a single address.
    #[arg(value_name = "RANGE")]
    pub ranges: Vec<String>,

    /// Whether to ignore the configuration file or not.
    #[arg(short, long)]
    pub no_config: bool,

    /// Hide the banner
    #[arg(long)]
    pub no_banner: bool,

    /// Custom path to config file
    #[arg(short, long, value_parser)]
    pub config_path: Option<PathBuf>,

    /// Greppable mode. Only print results, one per line, no decoration.
    #[arg(short, long)]
    pub greppable: bool,

    /// Accessible mode. Turns off features which negatively affect screen readers.
    #[arg(long)]
    pub accessible: bool,

    /// How many probes or scans run at the same time. Lowered automatically
    /// when the open file limit of your OS cannot support it.
    #[arg(short, long, default_value = "256")]
    pub batch_size: u16,

    /// The timeout in milliseconds before an unanswered probe marks a host down.
    #[arg(short, long, default_value = "1000")]
    pub timeout: u32,

    /// Automatically ups the ULIMIT with the value you provided.
    #[arg(short, long)]
    pub ulimit: Option<u64>,

    /// Refuse ranges holding more addresses than this.
    #[arg(long, default_value_t = DEFAULT_MAX_HOSTS)]
    pub max_hosts: u64,

    /// Directory the nmap reports are written to.
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// What to do after each sweep.
    #[arg(long, value_enum, ignore_case = true, default_value = "menu")]
    pub action: ActionMode,

    /// Protocol for `--action protocol`.
    #[arg(short, long, value_enum, ignore_case = true)]
    pub protocol: Option<Protocol>,

    /// Echo probe command. Placeholders: {{ip}} {{timeout}} (seconds).
    #[arg(long, default_value = DEFAULT_PROBE_COMMAND)]
    pub probe_command: String,

    /// Text in the probe output that means the host replied.
    #[arg(long, default_value = DEFAULT_REPLY_MARKER)]
    pub reply_marker: String,

    /// Deep scan command. Placeholders: {{ip}} {{output}}.
    #[arg(long, default_value = DEFAULT_DEEP_SCAN_COMMAND)]
    pub deep_scan_command: String,

    /// Protocol check command. Placeholders: {{ip}} {{protocol}}.
    #[arg(long, default_value = DEFAULT_PROTOCOL_COMMAND)]
    pub protocol_command: String,
}

#[cfg(not(tarpaulin_include))]
impl Opts {
    pub fn read() -> Self {
        Opts::parse()
    }

    /// Merges the values found within the user configuration file into the
    /// command line arguments.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(
            greppable, accessible, batch_size, timeout, max_hosts, output_dir, action,
            probe_command, reply_marker, deep_scan_command, protocol_command
        );

        // Ranges given on the command line win over the configured ones.
        if self.ranges.is_empty() {
            if let Some(ranges) = &config.ranges {
                self.ranges = ranges.clone();
            }
        }
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        merge_optional!(ulimit);

        if self.protocol.is_none() {
            self.protocol = config.protocol;
        }
    }

    /// Probe timeout as a `Duration`.
    pub fn probe_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(u64::from(self.timeout))
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            ranges: vec![],
            no_config: true,
            no_banner: false,
            config_path: None,
            greppable: true,
            accessible: false,
            batch_size: 0,
            timeout: 0,
            ulimit: None,
            max_hosts: DEFAULT_MAX_HOSTS,
            output_dir: PathBuf::from("."),
            action: ActionMode::Menu,
            protocol: None,
            probe_command: DEFAULT_PROBE_COMMAND.to_owned(),
            reply_marker: DEFAULT_REPLY_MARKER.to_owned(),
            deep_scan_command: DEFAULT_DEEP_SCAN_COMMAND.to_owned(),
            protocol_command: DEFAULT_PROTOCOL_COMMAND.to_owned(),
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[cfg(not(tarpaulin_include))]
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    ranges: Option<Vec<String>>,
    greppable: Option<bool>,
    accessible: Option<bool>,
    batch_size: Option<u16>,
    timeout: Option<u32>,
    ulimit: Option<u64>,
    max_hosts: Option<u64>,
    output_dir: Option<PathBuf>,
    action: Option<ActionMode>,
    protocol: Option<Protocol>,
    probe_command: Option<String>,
    reply_marker: Option<String>,
    deep_scan_command: Option<String>,
    protocol_command: Option<String>,
}

#[cfg(not(tarpaulin_include))]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct. A missing file is an empty configuration.
    ///
    /// # Format
    ///
    /// ranges = ["10.10.110.0/24"]
    /// timeout = 1000
    /// batch_size = 128
    /// output_dir = "/tmp/loot"
    /// action = "protocol"
    /// protocol = "smb"
    /// deep_scan_command = "nmap -sCV -Pn -T4 -oN {{output}} {{ip}}"
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_path = match custom_config_path {
            Some(path) => path,
            None => match default_config_path() {
                Some(path) => path,
                None => return Ok(Config::default()),
            },
        };

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)?;
        Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("Found {e} in {}", config_path.display()))
    }

    /// Parses TOML text into a Config.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Constructs default path to config toml
pub fn default_config_path() -> Option<PathBuf> {
    let mut config_path = dirs::home_dir()?;
    config_path.push(".pivoter.toml");
    Some(config_path)
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use parameterized::parameterized;
    use std::path::PathBuf;

    use super::{ActionMode, Config, Opts};
    use crate::protocol::Protocol;

    impl Config {
        fn sample() -> Self {
            Self {
                ranges: Some(vec!["10.10.110.0/24".to_owned()]),
                greppable: Some(false),
                accessible: Some(true),
                batch_size: Some(32),
                timeout: Some(2_000),
                ulimit: Some(4_096),
                output_dir: Some(PathBuf::from("/tmp/loot")),
                action: Some(ActionMode::Protocol),
                protocol: Some(Protocol::Smb),
                ..Config::default()
            }
        }
    }

    #[test]
    fn verify_cli() {
        Opts::command().debug_assert();
    }

    #[parameterized(input = {
        vec!["pivoter", "10.10.110.0/24"],
        vec!["pivoter", "10.10.110.0/24", "172.16.0.0/28"],
        vec!["pivoter"],
    }, ranges = {
        vec!["10.10.110.0/24"],
        vec!["10.10.110.0/24", "172.16.0.0/28"],
        vec![],
    })]
    fn parse_positional_ranges(input: Vec<&str>, ranges: Vec<&str>) {
        let opts = Opts::parse_from(input);
        assert_eq!(opts.ranges, ranges);
        assert_eq!(opts.action, ActionMode::Menu);
        assert_eq!(opts.timeout, 1000);
    }

    #[test]
    fn parse_protocol_action() {
        let opts = Opts::parse_from([
            "pivoter", "--action", "protocol", "--protocol", "WINRM", "10.0.0.0/30",
        ]);
        assert_eq!(opts.action, ActionMode::Protocol);
        assert_eq!(opts.protocol, Some(Protocol::Winrm));
    }

    #[test]
    fn unknown_protocol_is_rejected() {
        assert!(Opts::try_parse_from(["pivoter", "--protocol", "telnet", "10.0.0.1"]).is_err());
    }

    #[test]
    fn opts_no_merge_when_config_is_ignored() {
        let mut opts = Opts::default();
        opts.merge(&Config::sample());

        assert!(opts.ranges.is_empty());
        assert!(opts.greppable);
        assert_eq!(opts.timeout, 0);
        assert_eq!(opts.action, ActionMode::Menu);
    }

    #[test]
    fn opts_merge_required_arguments() {
        let mut opts = Opts::default();
        let config = Config::sample();

        opts.merge_required(&config);

        assert_eq!(opts.ranges, config.ranges.unwrap());
        assert_eq!(opts.greppable, config.greppable.unwrap());
        assert_eq!(opts.timeout, config.timeout.unwrap());
        assert_eq!(opts.output_dir, config.output_dir.unwrap());
        assert_eq!(opts.action, ActionMode::Protocol);
    }

    #[test]
    fn command_line_ranges_win_over_config() {
        let mut opts = Opts {
            ranges: vec!["192.168.0.0/30".to_owned()],
            ..Opts::default()
        };
        opts.merge_required(&Config::sample());
        assert_eq!(opts.ranges, ["192.168.0.0/30"]);
    }

    #[test]
    fn opts_merge_optional_arguments() {
        let mut opts = Opts {
            protocol: Some(Protocol::Ldap),
            ..Opts::default()
        };
        let config = Config::sample();

        opts.merge_optional(&config);

        assert_eq!(opts.ulimit, Some(4_096));
        assert_eq!(opts.protocol, Some(Protocol::Ldap));
    }

    #[test]
    fn config_parses_from_toml() {
        let config = Config::parse(
            r#"
            ranges = ["10.10.110.0/24"]
            action = "deep"
            protocol = "rdp"
            deep_scan_command = "nmap -sV -oN {{output}} {{ip}}"
            "#,
        )
        .unwrap();

        assert_eq!(config.action, Some(ActionMode::Deep));
        assert_eq!(config.protocol, Some(Protocol::Rdp));
        assert_eq!(
            config.deep_scan_command.as_deref(),
            Some("nmap -sV -oN {{output}} {{ip}}")
        );
    }

    #[test]
    fn config_rejects_unknown_protocol() {
        assert!(Config::parse("protocol = \"telnet\"").is_err());
    }
}
