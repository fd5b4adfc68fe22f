#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::doc_markdown, clippy::if_not_else, clippy::non_ascii_literal)]

use pivoter::action::{Action, ActionOutcome, Session};
use pivoter::input::{ActionMode, Config, Opts};
use pivoter::protocol::Protocol;
use pivoter::scanner::{Dispatcher, Prober, ToolCommand};
use pivoter::tui::{print_opening, render_table, TerminalReporter};
use pivoter::{detail, output, warning};

use std::io::{self, BufRead, Write};
use std::process;

use log::debug;

/// Descriptors kept free for the tool itself.
const RESERVED_FDS: u64 = 100;
/// Pipes held open by every running subprocess (stdin, stdout, stderr).
const FDS_PER_PROCESS: u64 = 3;

#[cfg(not(tarpaulin_include))]
#[allow(clippy::too_many_lines)]
#[tokio::main]
/// Sweeps each range given on the command line, then runs the chosen
/// follow-up scans against its live hosts.
async fn main() {
    env_logger::init();

    let mut opts: Opts = Opts::read();
    let config = if opts.no_config {
        Config::default()
    } else {
        match Config::read(opts.config_path.clone()) {
            Ok(config) => config,
            Err(e) => {
                warning!(format!("{e}.\nAborting."));
                process::exit(1);
            }
        }
    };
    opts.merge(&config);

    debug!("Main() `opts` arguments are {:?}", opts);

    if !opts.greppable && !opts.no_banner {
        print_opening(opts.accessible);
    }

    if opts.ranges.is_empty() {
        warning!("Usage: pivoter <range1> [<range2> ... <rangeN>]");
        process::exit(1);
    }

    if opts.action == ActionMode::Protocol && opts.protocol.is_none() {
        warning!("--action protocol needs --protocol <PROTOCOL>.");
        process::exit(1);
    }

    let ulimit = adjust_ulimit_size(&opts);
    let batch_size = infer_batch_size(opts.batch_size, ulimit);
    if batch_size < usize::from(opts.batch_size) {
        warning!(
            format!("File limit {ulimit} only allows {batch_size} tools to run at once, lowering the batch size."),
            opts.greppable,
            opts.accessible
        );
    }

    let prober = Prober::new(opts.probe_timeout(), batch_size)
        .with_command(ToolCommand::new(opts.probe_command.as_str()))
        .with_reply_marker(opts.reply_marker.as_str());
    let dispatcher = Dispatcher::new(opts.output_dir.clone(), batch_size)
        .with_deep_scan_command(ToolCommand::new(opts.deep_scan_command.as_str()))
        .with_protocol_command(ToolCommand::new(opts.protocol_command.as_str()));
    let session = Session::new(prober, dispatcher, opts.max_hosts);
    let reporter = TerminalReporter::new(opts.greppable, opts.accessible);

    let stdin = io::stdin();
    let mut input = stdin.lock();

    for range in &opts.ranges {
        detail!(
            format!("Processing range: {range}"),
            opts.greppable,
            opts.accessible
        );

        let sweep = match session.sweep(range, &reporter).await {
            Ok(sweep) => sweep,
            Err(e) => {
                warning!(e.to_string(), opts.greppable, opts.accessible);
                continue;
            }
        };

        let hosts = sweep.alive();
        if hosts.is_empty() {
            warning!("No live hosts found.", opts.greppable, opts.accessible);
            continue;
        }
        println!("{}", render_table(&sweep.table(), opts.greppable, opts.accessible));

        loop {
            let action = match opts.action {
                ActionMode::Menu => prompt_action(&mut input, opts.greppable),
                ActionMode::Deep => Action::DeepScan,
                ActionMode::Protocol => match opts.protocol {
                    Some(protocol) => Action::ProtocolCheck(protocol),
                    None => Action::Next,
                },
                ActionMode::None => Action::Next,
            };

            match session.run_action(action, &hosts, &reporter).await {
                ActionOutcome::Table(table) => {
                    println!("{}", render_table(&table, opts.greppable, opts.accessible));
                }
                ActionOutcome::NoHosts => {
                    warning!("No live hosts to scan.", opts.greppable, opts.accessible);
                }
                ActionOutcome::Finished => break,
            }

            if opts.action != ActionMode::Menu {
                break;
            }
        }
    }

    output!("All ranges processed.", opts.greppable, opts.accessible);
}

/// Menu entries shown after every sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    DeepScan,
    ProtocolCheck,
    Next,
}

fn parse_menu_choice(line: &str) -> Option<MenuChoice> {
    match line.trim() {
        // Enter alone moves on.
        "" | "3" => Some(MenuChoice::Next),
        "1" => Some(MenuChoice::DeepScan),
        "2" => Some(MenuChoice::ProtocolCheck),
        _ => None,
    }
}

/// Accepts a catalog index (`7`) or a protocol name (`smb`).
fn parse_protocol_choice(line: &str) -> Option<Protocol> {
    let line = line.trim();
    match line.parse::<usize>() {
        Ok(index) => Protocol::from_menu_index(index),
        Err(_) => line.parse().ok(),
    }
}

/// Prompts go to stderr in greppable mode so stdout only carries results.
fn say(greppable: bool, text: &str) {
    if greppable {
        eprintln!("{text}");
    } else {
        println!("{text}");
    }
}

/// Prints `prompt` and reads one line. `None` means end of input.
fn read_line<R: BufRead>(input: &mut R, greppable: bool, prompt: &str) -> Option<String> {
    if greppable {
        eprint!("{prompt}: ");
    } else {
        print!("{prompt}: ");
        let _ = io::stdout().flush();
    }

    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line),
    }
}

/// Asks which action to run next until a valid answer is given.
fn prompt_action<R: BufRead>(input: &mut R, greppable: bool) -> Action {
    loop {
        say(greppable, "\nWhat would you like to do next?");
        say(greppable, "1) Perform an Nmap scan on live hosts");
        say(greppable, "2) Run netexec (nxc) scans on live hosts");
        say(greppable, "3) Move on to the next range");

        let Some(line) = read_line(input, greppable, "\nEnter your choice [3]") else {
            return Action::Next;
        };

        match parse_menu_choice(&line) {
            Some(MenuChoice::DeepScan) => return Action::DeepScan,
            Some(MenuChoice::ProtocolCheck) => {
                return match prompt_protocol(input, greppable) {
                    Some(protocol) => Action::ProtocolCheck(protocol),
                    None => Action::Next,
                }
            }
            Some(MenuChoice::Next) => return Action::Next,
            None => say(greppable, "Please select one of the available options"),
        }
    }
}

fn prompt_protocol<R: BufRead>(input: &mut R, greppable: bool) -> Option<Protocol> {
    say(greppable, "\nAvailable Protocols for netexec (nxc) Scans:");
    for (index, protocol) in Protocol::CATALOG.iter().enumerate() {
        say(greppable, &format!("{}) {protocol}", index + 1));
    }

    loop {
        let line = read_line(input, greppable, "\nSelect a protocol to scan")?;
        if let Some(protocol) = parse_protocol_choice(&line) {
            return Some(protocol);
        }
        say(greppable, "Please select one of the available options");
    }
}

#[cfg(unix)]
fn adjust_ulimit_size(opts: &Opts) -> u64 {
    use rlimit::Resource;

    if let Some(limit) = opts.ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            detail!(
                format!("Automatically increasing ulimit value to {limit}."),
                opts.greppable,
                opts.accessible
            );
        } else {
            warning!(
                "ERROR. Failed to set ulimit value.",
                opts.greppable,
                opts.accessible
            );
        }
    }

    match Resource::NOFILE.get() {
        Ok((soft, _)) => soft,
        Err(_) => u64::MAX,
    }
}

#[cfg(not(unix))]
fn adjust_ulimit_size(_opts: &Opts) -> u64 {
    u64::MAX
}

/// How many subprocesses can run at once under the open file limit `ulimit`.
fn infer_batch_size(requested: u16, ulimit: u64) -> usize {
    let allowed = ulimit.saturating_sub(RESERVED_FDS) / FDS_PER_PROCESS;
    let batch_size = u64::from(requested).min(allowed).max(1);
    usize::try_from(batch_size).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::{
        infer_batch_size, parse_menu_choice, parse_protocol_choice, prompt_action, MenuChoice,
    };
    use pivoter::action::Action;
    use pivoter::protocol::Protocol;
    use std::io::Cursor;

    #[test]
    fn batch_size_fits_in_file_limit() {
        assert_eq!(infer_batch_size(256, 1024), 256);
        assert_eq!(infer_batch_size(256, 400), 100);
        assert_eq!(infer_batch_size(256, 50), 1);
        assert_eq!(infer_batch_size(0, 1024), 1);
        assert_eq!(infer_batch_size(u16::MAX, u64::MAX), usize::from(u16::MAX));
    }

    #[test]
    fn menu_choices() {
        assert_eq!(parse_menu_choice("1\n"), Some(MenuChoice::DeepScan));
        assert_eq!(parse_menu_choice(" 2 "), Some(MenuChoice::ProtocolCheck));
        assert_eq!(parse_menu_choice("3"), Some(MenuChoice::Next));
        assert_eq!(parse_menu_choice("\n"), Some(MenuChoice::Next));
        assert_eq!(parse_menu_choice("4"), None);
        assert_eq!(parse_menu_choice("nmap"), None);
    }

    #[test]
    fn protocol_choices() {
        assert_eq!(parse_protocol_choice("7\n"), Some(Protocol::Smb));
        assert_eq!(parse_protocol_choice("ldap"), Some(Protocol::Ldap));
        assert_eq!(parse_protocol_choice("0"), None);
        assert_eq!(parse_protocol_choice("11"), None);
    }

    #[test]
    fn prompt_retries_until_valid_answer() {
        let mut input = Cursor::new("9\nfoo\n2\nbogus\n8\n");
        assert_eq!(
            prompt_action(&mut input, true),
            Action::ProtocolCheck(Protocol::Winrm)
        );
    }

    #[test]
    fn end_of_input_moves_on() {
        assert_eq!(prompt_action(&mut Cursor::new(""), true), Action::Next);
        assert_eq!(prompt_action(&mut Cursor::new("2\n"), true), Action::Next);
    }
}
