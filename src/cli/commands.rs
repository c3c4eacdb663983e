use std::path::PathBuf;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "jackal", version, about = "Reconnaissance and assessment task engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Print findings as JSON lines instead of styled output
    #[arg(long, global = true)]
    pub json: bool,

    /// Engine settings file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite file to record findings and job outcomes into
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find live hosts
    Alive(AliveArgs),
    /// Scan ports and fingerprint services
    Ports(PortsArgs),
    /// Brute-force web paths
    Dirs(DirsArgs),
    /// Try credential pairs against network services
    Brute(BruteArgs),
    /// Mine a web page and its scripts for endpoints and secrets
    Jsfind(JsFindArgs),
    /// Verify a proof of concept against a target
    Poc(PocArgs),
    /// Start the HTTP API server
    Serve(ServeArgs),
    /// Validate an engine settings file
    Validate(ValidateArgs),
}

/// Limits shared by every job command.
#[derive(Args, Clone, Debug)]
pub struct LimitArgs {
    /// Worker count
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Args, Clone, Debug)]
pub struct AliveArgs {
    /// Host expression: IP, CIDR, range or comma list
    pub target: String,

    #[command(flatten)]
    pub limits: LimitArgs,

    /// Skip the ICMP echo probe
    #[arg(long)]
    pub no_icmp: bool,

    /// Skip the TCP connect ping
    #[arg(long)]
    pub no_tcp_ping: bool,

    /// Ports for the TCP ping (port expression)
    #[arg(long)]
    pub tcp_ports: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct PortsArgs {
    /// Host expression: IP, CIDR, range or comma list
    pub target: String,

    /// Port expression, `common` or `all`
    #[arg(short, long, default_value = "common")]
    pub ports: String,

    #[command(flatten)]
    pub limits: LimitArgs,

    /// Only scan hosts that answer a liveness sweep
    #[arg(long)]
    pub alive_check: bool,

    /// Skip ICMP during the liveness sweep
    #[arg(long)]
    pub no_icmp: bool,

    /// Report open ports without banner grabbing
    #[arg(long)]
    pub no_fingerprint: bool,

    /// Also probe well-known UDP services
    #[arg(long)]
    pub udp: bool,
}

#[derive(Args, Clone, Debug)]
pub struct DirsArgs {
    /// Base URL or host expression
    pub target: String,

    /// Extensions substituted for %EXT% (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Wordlist path (built-in list when omitted)
    #[arg(short, long)]
    pub dict: Option<String>,

    #[command(flatten)]
    pub limits: LimitArgs,

    /// Report 404s and soft-404 pages too
    #[arg(long)]
    pub keep_404: bool,

    /// Follow redirects
    #[arg(long)]
    pub follow_redirects: bool,

    /// Recurse into found directories this many levels
    #[arg(long, default_value = "0")]
    pub depth: u32,
}

#[derive(Args, Clone, Debug)]
pub struct BruteArgs {
    /// Host expression
    pub target: String,

    /// Services to try (ssh, ftp, mysql, postgres, redis, telnet, pop3, imap, smtp, http-basic)
    #[arg(short = 'P', long, value_delimiter = ',', required = true)]
    pub protocols: Vec<String>,

    /// Username list path
    #[arg(short, long)]
    pub users: Option<String>,

    /// Password list path
    #[arg(short, long)]
    pub passwords: Option<String>,

    #[command(flatten)]
    pub limits: LimitArgs,
}

#[derive(Args, Clone, Debug)]
pub struct JsFindArgs {
    /// Page URL to start from
    pub target: String,

    #[command(flatten)]
    pub limits: LimitArgs,

    /// Follow same-origin links one level further
    #[arg(long)]
    pub deep: bool,

    /// Probe discovered endpoints
    #[arg(long)]
    pub active: bool,

    /// Also probe endpoints that look destructive
    #[arg(long)]
    pub no_danger_filter: bool,
}

#[derive(Args, Clone, Debug)]
pub struct PocArgs {
    #[command(subcommand)]
    pub mode: PocCommand,
}

#[derive(Subcommand, Clone, Debug)]
pub enum PocCommand {
    /// Run a declarative HTTP template
    Template {
        /// Base URL of the target
        target: String,
        /// Template file (YAML or JSON)
        file: PathBuf,
        /// Per-request timeout in milliseconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Run a script with an external interpreter
    Script {
        /// Target passed to the script
        target: String,
        /// Script file
        file: PathBuf,
        /// Interpreter to run the script with
        #[arg(long)]
        interpreter: Option<PathBuf>,
        /// Wall-clock limit in seconds
        #[arg(long)]
        script_timeout: Option<u64>,
    },
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Listen port
    #[arg(long, default_value = "8080")]
    pub port: u16,

    /// Listen address
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
}

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Config file to validate
    pub config: PathBuf,
}
