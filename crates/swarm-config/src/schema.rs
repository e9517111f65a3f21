use serde::{Deserialize, Serialize};

/// Top-level configuration for a `swarm-node` process.
///
/// Every field has a production-safe default so an empty (or absent)
/// config file still boots a working, loopback-only node: listen
/// addresses default to `127.0.0.1`, the store lives under the user's
/// data directory, and no seed peers are dialed until the operator adds
/// some.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    pub node: NodeConfig,
    pub net: NetConfig,
    pub store: StoreConfig,
    pub integrator: IntegratorConfig,
    pub broker: BrokerConfig,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            net: NetConfig::default(),
            store: StoreConfig::default(),
            integrator: IntegratorConfig::default(),
            broker: BrokerConfig::default(),
        }
    }
}

/// Role hint applied on first boot only — once a node has a persisted
/// [`swarm_model::NodeRecord`] its role is whatever is on disk, not
/// whatever this config says.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub role_hint: String,
    pub data_dir: Option<String>,
    /// The swarm's realm, embedded in every DID as `did:<realm>:<node-id>`
    /// and used as this swarm's own identifier in cross-swarm bounty and
    /// offering records.
    pub realm: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            role_hint: "worker".to_string(),
            data_dir: None,
            realm: "swarm".to_string(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_p2p_port() -> u16 {
    7420
}

fn default_max_connections() -> usize {
    20
}

/// Networking defaults mirror the "deny surprises by default" posture: bind
/// to loopback only, accept no seed peers until the operator names some.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    pub bind_addr: String,
    pub p2p_port: u16,
    pub seed_peers: Vec<String>,
    pub max_connections: usize,
    pub lan_discovery: bool,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            p2p_port: default_p2p_port(),
            seed_peers: Vec::new(),
            max_connections: default_max_connections(),
            lan_discovery: true,
        }
    }
}

fn default_store_path() -> String {
    "swarm.sqlite3".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    pub default_test_command: Option<String>,
    pub max_merge_attempts: u32,
    pub worktree_root: Option<String>,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            default_test_command: None,
            max_merge_attempts: 3,
            worktree_root: None,
        }
    }
}

fn default_bounty_ttl_seconds() -> u64 {
    3600
}

fn default_reputation_floor() -> f64 {
    0.3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub enabled: bool,
    pub listen_port: u16,
    pub peers: Vec<String>,
    pub bounty_ttl_seconds: u64,
    pub reputation_floor: f64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_port: 7421,
            peers: Vec::new(),
            bounty_ttl_seconds: default_bounty_ttl_seconds(),
            reputation_floor: default_reputation_floor(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_to_loopback() {
        let cfg = SwarmConfig::default();
        assert_eq!(cfg.net.bind_addr, "127.0.0.1");
        assert!(cfg.net.seed_peers.is_empty());
    }

    #[test]
    fn broker_disabled_by_default() {
        assert!(!BrokerConfig::default().enabled);
    }
}
