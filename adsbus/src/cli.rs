//! Command-line surface (spec §6.1): one repeatable flag per transport
//! module (`--connect`, `--listen`, `--exec`, `--file`) plus `--log`,
//! grounded on `maker/src/cli.rs`'s `#[derive(Parser)]` style -- long
//! flags, doc comments as `--help` text, `default_value` where the spec
//! implies one.
//!
//! Endpoint flags take a single `<fmt>=...` string rather than several
//! separate flags, since each is repeatable and tied together as one
//! unit (spec: "`--connect <fmt>=<host>/<port>`"); parsing that shape
//! out of a plain string is closer to the original's `adsbus_opts_add`
//! per-module registration than clap's built-in multi-value flags
//! would be.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

/// `--connect <fmt>=<host>/<port>`: an outgoing connector.
#[derive(Debug, Clone)]
pub struct ConnectSpec {
    pub format: String,
    pub host: String,
    pub port: String,
}

impl FromStr for ConnectSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (format, rest) = split_format(s, "--connect")?;
        let (host, port) = rest
            .rsplit_once('/')
            .ok_or_else(|| format!("`--connect {s}`: expected `<fmt>=<host>/<port>`"))?;
        if host.is_empty() {
            return Err(format!(
                "`--connect {s}`: host must not be empty (use --listen for a passive endpoint)"
            ));
        }
        if port.is_empty() {
            return Err(format!("`--connect {s}`: port must not be empty"));
        }
        Ok(ConnectSpec { format, host: host.to_string(), port: port.to_string() })
    }
}

/// `--listen <fmt>=[host]/<port>`: an incoming listener. An empty host
/// binds every interface.
#[derive(Debug, Clone)]
pub struct ListenSpec {
    pub format: String,
    pub host: Option<String>,
    pub port: String,
}

impl FromStr for ListenSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (format, rest) = split_format(s, "--listen")?;
        let (host, port) = rest
            .rsplit_once('/')
            .ok_or_else(|| format!("`--listen {s}`: expected `<fmt>=[host]/<port>`"))?;
        if port.is_empty() {
            return Err(format!("`--listen {s}`: port must not be empty"));
        }
        let host = if host.is_empty() { None } else { Some(host.to_string()) };
        Ok(ListenSpec { format, host, port: port.to_string() })
    }
}

/// `--exec <fmt>=<command>` / `--file <fmt>=<path>`: a format paired
/// with an opaque command line or filesystem path.
#[derive(Debug, Clone)]
pub struct NamedSpec {
    pub format: String,
    pub value: String,
}

impl FromStr for NamedSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (format, value) = split_format(s, "--exec/--file")?;
        if value.is_empty() {
            return Err(format!("`{s}`: value must not be empty"));
        }
        Ok(NamedSpec { format, value: value.to_string() })
    }
}

fn split_format<'a>(s: &'a str, flag: &str) -> Result<(String, &'a str), String> {
    let (format, rest) = s
        .split_once('=')
        .ok_or_else(|| format!("`{flag} {s}`: expected `<fmt>=...`"))?;
    if format.is_empty() {
        return Err(format!("`{flag} {s}`: format name must not be empty"));
    }
    Ok((format.to_string(), rest))
}

#[derive(Parser, Debug)]
#[command(name = "adsbus", about = "Multi-protocol ADS-B telemetry bus")]
pub struct Opts {
    /// Register an outgoing connector: `<fmt>=<host>/<port>`. Repeatable.
    #[arg(long = "connect", value_name = "FMT=HOST/PORT", value_parser = clap::value_parser!(ConnectSpec))]
    pub connect: Vec<ConnectSpec>,

    /// Register an incoming listener: `<fmt>=[host]/<port>`. Repeatable.
    #[arg(long = "listen", value_name = "FMT=[HOST]/PORT", value_parser = clap::value_parser!(ListenSpec))]
    pub listen: Vec<ListenSpec>,

    /// Run a subprocess as a source/sink: `<fmt>=<command>`. Repeatable.
    #[arg(long = "exec", value_name = "FMT=COMMAND", value_parser = clap::value_parser!(NamedSpec))]
    pub exec: Vec<NamedSpec>,

    /// Bind a file: `<fmt>=<path>`. Repeatable. Pass `-` as the path to
    /// bind the process's own standard input/output instead.
    #[arg(long = "file", value_name = "FMT=PATH", value_parser = clap::value_parser!(NamedSpec))]
    pub file: Vec<NamedSpec>,

    /// Redirect log output to this path instead of stderr. Rotates on SIGHUP.
    #[arg(long = "log", value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Emit JSON log lines instead of plain `<category> <message>` ones.
    #[arg(short = 'j', long)]
    pub json: bool,

    /// Log verbosity (off, error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_spec_parses_host_and_port() {
        let spec: ConnectSpec = "raw=1.2.3.4/30005".parse().unwrap();
        assert_eq!(spec.format, "raw");
        assert_eq!(spec.host, "1.2.3.4");
        assert_eq!(spec.port, "30005");
    }

    #[test]
    fn connect_spec_rejects_empty_host() {
        assert!("raw=/30005".parse::<ConnectSpec>().is_err());
    }

    #[test]
    fn listen_spec_allows_empty_host() {
        let spec: ListenSpec = "json=/30005".parse().unwrap();
        assert_eq!(spec.format, "json");
        assert_eq!(spec.host, None);
        assert_eq!(spec.port, "30005");
    }

    #[test]
    fn listen_spec_with_explicit_host() {
        let spec: ListenSpec = "beast=0.0.0.0/30005".parse().unwrap();
        assert_eq!(spec.host.as_deref(), Some("0.0.0.0"));
    }

    #[test]
    fn named_spec_parses_file_path() {
        let spec: NamedSpec = "raw=/var/log/feed.txt".parse().unwrap();
        assert_eq!(spec.format, "raw");
        assert_eq!(spec.value, "/var/log/feed.txt");
    }

    #[test]
    fn missing_equals_is_rejected() {
        assert!("raw".parse::<NamedSpec>().is_err());
    }
}
