//! Node configuration types.
//!
//! Configuration is layered: defaults, then `TRUST_GOSSIP_*` environment
//! variables, then command-line flags. The peer set is fixed for the life
//! of the node.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use trust_gossip_core::identity::{PeerIdentity, PeerSet};
use trust_gossip_core::message::NodeId;
use trust_gossip_core::seen::DEFAULT_SEEN_CAPACITY;

use crate::error::{Error, Result};

// Environment variable names for configuration.

/// Node id environment variable.
pub const ENV_NODE_ID: &str = "TRUST_GOSSIP_NODE_ID";
/// Peer listener bind address environment variable.
pub const ENV_LISTEN_ADDR: &str = "TRUST_GOSSIP_LISTEN_ADDR";
/// Address advertised in `senderAddress` environment variable.
pub const ENV_ADVERTISE_ADDR: &str = "TRUST_GOSSIP_ADVERTISE_ADDR";
/// Comma-separated `host:port` peer list environment variable.
pub const ENV_PEERS: &str = "TRUST_GOSSIP_PEERS";
/// Traitor flag environment variable.
pub const ENV_TRAITOR: &str = "TRUST_GOSSIP_TRAITOR";
/// Audit log path environment variable.
pub const ENV_AUDIT_PATH: &str = "TRUST_GOSSIP_AUDIT_PATH";
/// HTTP control bind address environment variable.
pub const ENV_CONTROL_ADDR: &str = "TRUST_GOSSIP_CONTROL_ADDR";
/// Per-send timeout (milliseconds) environment variable.
pub const ENV_SEND_TIMEOUT_MS: &str = "TRUST_GOSSIP_SEND_TIMEOUT_MS";
/// Seen-set capacity environment variable.
pub const ENV_SEEN_CAPACITY: &str = "TRUST_GOSSIP_SEEN_CAPACITY";
/// Audit queue capacity environment variable.
pub const ENV_AUDIT_QUEUE: &str = "TRUST_GOSSIP_AUDIT_QUEUE";

/// Offset from the peer port to the default control port
pub const CONTROL_PORT_OFFSET: u16 = 1000;
/// Default per-send timeout
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(2);
/// Default audit queue depth
pub const DEFAULT_AUDIT_QUEUE_CAPACITY: usize = 64;

/// Environment variable parsing helpers.
mod env_parse {
    use std::time::Duration;

    use super::{Error, Result};

    /// Parse any `FromStr` value from an environment variable.
    pub fn parse<T>(key: &str) -> Option<Result<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        std::env::var(key).ok().map(|val| {
            val.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {key}: {e}")))
        })
    }

    /// Parse a boolean from an environment variable.
    /// Accepts "true", "1", "yes", "on" as true (case-insensitive).
    /// Accepts "false", "0", "no", "off" as false (case-insensitive).
    pub fn parse_bool(key: &str) -> Option<Result<bool>> {
        std::env::var(key).ok().map(|val| super::parse_bool_value(key, &val))
    }

    /// Parse a duration in milliseconds from an environment variable.
    pub fn parse_duration_ms(key: &str) -> Option<Result<Duration>> {
        parse::<u64>(key).map(|r| r.map(Duration::from_millis))
    }
}

fn parse_bool_value(key: &str, val: &str) -> Result<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "invalid {key}: expected boolean (true/false/1/0/yes/no/on/off)"
        ))),
    }
}

/// Parse a comma-separated `host:port` list
pub fn parse_peer_list(raw: &str) -> Result<Vec<PeerIdentity>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<PeerIdentity>().map_err(Error::from))
        .collect()
}

/// Configuration for one node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    /// Integer id stamped into `senderId` / `originId`
    pub node_id: NodeId,
    /// Peer listener bind address
    pub listen_addr: SocketAddr,
    /// Address advertised as `senderAddress`; must match how peers list us
    pub advertise_address: String,
    /// Fixed, ordered membership
    pub peers: Vec<PeerIdentity>,
    /// Perturb every outgoing amount by ±50
    pub traitor: bool,
    /// Audit log path; defaults to `trust_scores_node_{id}.log`
    pub audit_path: Option<PathBuf>,
    /// Control HTTP bind address; defaults to the listen port + 1000
    pub control_addr: Option<SocketAddr>,
    /// Bound on each outbound connect + write
    pub send_timeout: Duration,
    /// Capacity of the seen set and of the delivery cache
    pub seen_capacity: usize,
    /// Depth of the audit write queue
    pub audit_queue_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            advertise_address: "0.0.0.0".to_string(),
            peers: Vec::new(),
            traitor: false,
            audit_path: None,
            control_addr: None,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            seen_capacity: DEFAULT_SEEN_CAPACITY,
            audit_queue_capacity: DEFAULT_AUDIT_QUEUE_CAPACITY,
        }
    }
}

/// What the command line asked for
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Run a node with this configuration
    Run(NodeConfig),
    /// Print usage and exit
    Help,
}

/// Usage text for the node binary
pub const USAGE: &str = "\
Trust Gossip Node

USAGE:
  trust_gossip_node [OPTIONS]

OPTIONS:
  --id <N>               Node id (default: 0)
  --listen <ADDR>        Peer listener address (default: 0.0.0.0:8000)
  --advertise <HOST>     Address sent as senderAddress (default: 0.0.0.0)
  --peer <HOST:PORT>     Peer (repeatable; replaces TRUST_GOSSIP_PEERS)
  --traitor              Corrupt every forwarded amount by +/-50
  --audit <PATH>         Audit log file (default: trust_scores_node_<id>.log)
  --control <ADDR>       Control HTTP address (default: listen port + 1000)
  -h, --help             Show this help";

impl NodeConfig {
    /// Create a new builder
    pub fn builder() -> NodeConfigBuilder {
        NodeConfigBuilder::new()
    }

    /// Defaults overridden by `TRUST_GOSSIP_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(id) = env_parse::parse(ENV_NODE_ID) {
            config.node_id = id?;
        }
        if let Some(addr) = env_parse::parse(ENV_LISTEN_ADDR) {
            config.listen_addr = addr?;
            config.advertise_address = config.listen_addr.ip().to_string();
        }
        if let Ok(addr) = std::env::var(ENV_ADVERTISE_ADDR) {
            config.advertise_address = addr.trim().to_string();
        }
        if let Ok(raw) = std::env::var(ENV_PEERS) {
            config.peers = parse_peer_list(&raw)?;
        }
        if let Some(traitor) = env_parse::parse_bool(ENV_TRAITOR) {
            config.traitor = traitor?;
        }
        if let Ok(path) = std::env::var(ENV_AUDIT_PATH) {
            config.audit_path = Some(PathBuf::from(path));
        }
        if let Some(addr) = env_parse::parse(ENV_CONTROL_ADDR) {
            config.control_addr = Some(addr?);
        }
        if let Some(timeout) = env_parse::parse_duration_ms(ENV_SEND_TIMEOUT_MS) {
            config.send_timeout = timeout?;
        }
        if let Some(capacity) = env_parse::parse(ENV_SEEN_CAPACITY) {
            config.seen_capacity = capacity?;
        }
        if let Some(capacity) = env_parse::parse(ENV_AUDIT_QUEUE) {
            config.audit_queue_capacity = capacity?;
        }

        Ok(config)
    }

    /// Apply command-line flags on top of this configuration
    pub fn apply_args<I>(mut self, args: I) -> Result<Command>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut cli_peers: Option<Vec<PeerIdentity>> = None;
        let mut advertise_set = false;

        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| Error::Config(format!("{flag} requires a value")))
            };
            match arg.as_str() {
                "--id" => {
                    let raw = value("--id")?;
                    self.node_id = raw
                        .parse()
                        .map_err(|e| Error::Config(format!("invalid --id {raw:?}: {e}")))?;
                }
                "--listen" | "-l" => {
                    let raw = value("--listen")?;
                    self.listen_addr = raw
                        .parse()
                        .map_err(|e| Error::Config(format!("invalid --listen {raw:?}: {e}")))?;
                }
                "--advertise" => {
                    self.advertise_address = value("--advertise")?;
                    advertise_set = true;
                }
                "--peer" | "-p" => {
                    let peer: PeerIdentity = value("--peer")?.parse()?;
                    cli_peers.get_or_insert_with(Vec::new).push(peer);
                }
                "--traitor" => self.traitor = true,
                "--audit" => self.audit_path = Some(PathBuf::from(value("--audit")?)),
                "--control" => {
                    let raw = value("--control")?;
                    self.control_addr = Some(
                        raw.parse()
                            .map_err(|e| Error::Config(format!("invalid --control {raw:?}: {e}")))?,
                    );
                }
                "--help" | "-h" => return Ok(Command::Help),
                other => return Err(Error::Config(format!("unknown argument: {other}"))),
            }
        }

        if let Some(peers) = cli_peers {
            self.peers = peers;
        }
        if !advertise_set && std::env::var(ENV_ADVERTISE_ADDR).is_err() {
            self.advertise_address = self.listen_addr.ip().to_string();
        }

        Ok(Command::Run(self))
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.peers.is_empty() {
            return Err(Error::Config("peer set must not be empty".into()));
        }
        if self.advertise_address.trim().is_empty() {
            return Err(Error::Config("advertise address must not be empty".into()));
        }
        if self.seen_capacity == 0 {
            return Err(Error::Config("seen capacity must be non-zero".into()));
        }
        if self.audit_queue_capacity == 0 {
            return Err(Error::Config("audit queue capacity must be non-zero".into()));
        }
        if self.send_timeout.is_zero() {
            return Err(Error::Config("send timeout must be non-zero".into()));
        }
        Ok(())
    }

    /// Identity this node advertises in `senderAddress` / `senderPort`
    pub fn identity(&self) -> PeerIdentity {
        PeerIdentity::new(self.advertise_address.clone(), self.listen_addr.port())
    }

    /// Membership as a peer set
    pub fn peer_set(&self) -> PeerSet {
        PeerSet::new(self.peers.iter().cloned())
    }

    /// Resolved audit log path
    pub fn audit_path(&self) -> PathBuf {
        self.audit_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("trust_scores_node_{}.log", self.node_id)))
    }

    /// Resolved control address
    pub fn control_addr(&self) -> Result<SocketAddr> {
        if let Some(addr) = self.control_addr {
            return Ok(addr);
        }
        let port = self
            .listen_addr
            .port()
            .checked_add(CONTROL_PORT_OFFSET)
            .ok_or_else(|| {
                Error::Config(format!(
                    "listen port {} leaves no room for control port offset {CONTROL_PORT_OFFSET}",
                    self.listen_addr.port()
                ))
            })?;
        Ok(SocketAddr::new(self.listen_addr.ip(), port))
    }
}

/// Builder for NodeConfig
#[derive(Debug, Default)]
pub struct NodeConfigBuilder {
    config: NodeConfig,
}

impl NodeConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the node id
    pub fn node_id(mut self, id: NodeId) -> Self {
        self.config.node_id = id;
        self
    }

    /// Set the listen address; the advertised address follows its IP
    pub fn listen_addr(mut self, addr: SocketAddr) -> Self {
        self.config.listen_addr = addr;
        self.config.advertise_address = addr.ip().to_string();
        self
    }

    /// Set the advertised address
    pub fn advertise_address(mut self, address: impl Into<String>) -> Self {
        self.config.advertise_address = address.into();
        self
    }

    /// Set the membership
    pub fn peers(mut self, peers: impl IntoIterator<Item = PeerIdentity>) -> Self {
        self.config.peers = peers.into_iter().collect();
        self
    }

    /// Mark the node as a traitor
    pub fn traitor(mut self, traitor: bool) -> Self {
        self.config.traitor = traitor;
        self
    }

    /// Set the audit log path
    pub fn audit_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.audit_path = Some(path.into());
        self
    }

    /// Set the control address
    pub fn control_addr(mut self, addr: SocketAddr) -> Self {
        self.config.control_addr = Some(addr);
        self
    }

    /// Set the per-send timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.config.send_timeout = timeout;
        self
    }

    /// Set the seen-set capacity
    pub fn seen_capacity(mut self, capacity: usize) -> Self {
        self.config.seen_capacity = capacity;
        self
    }

    /// Set the audit queue capacity
    pub fn audit_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.audit_queue_capacity = capacity;
        self
    }

    /// Build the configuration
    pub fn build(self) -> NodeConfig {
        self.config
    }
}
