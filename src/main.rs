// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{BrokerCommands, Cli, Commands, NodeCommands};
use swarm_broker::{Board, BrokerOverflowDelegator, ReputationLedger};
use swarm_dispatcher::{Dispatcher, NoopBroker, NoopExecutor};
use swarm_model::{LamportClock, NodeRole};
use swarm_net::discovery::memory::InMemoryDiscovery;
use swarm_net::{NetNode, TransportConfig};
use swarm_store::Store;

const NODE_ID_KEY: &str = "node_id";
const NODE_ROLE_KEY: &str = "node_role";
const LAMPORT_KEY: &str = "lamport_counter";
const CLOCK_CHECKPOINT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(20);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Node { command } => match command {
            NodeCommands::Run { config } => run_node(config.as_deref()).await,
            NodeCommands::ShowConfig { config } => show_config(config.as_deref()),
            NodeCommands::Id { config } => show_id(config.as_deref()),
        },
        Commands::Broker { command } => match command {
            BrokerCommands::Run { config } => run_broker(config.as_deref()).await,
        },
        Commands::Completions { shell } => {
            cli::print_completions(*shell);
            Ok(())
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}

fn show_config(config: Option<&std::path::Path>) -> anyhow::Result<()> {
    let cfg = swarm_config::load(config)?;
    println!("{}", serde_yaml::to_string(&cfg).unwrap_or_default());
    Ok(())
}

fn show_id(config: Option<&std::path::Path>) -> anyhow::Result<()> {
    let cfg = swarm_config::load(config)?;
    let store = open_store(&cfg)?;
    let clock = Arc::new(load_clock(&store)?);
    let node_id = load_or_generate_node_id(&store)?;
    let role = load_or_generate_role(&store, &cfg)?;
    let identity = swarm_identity::load_or_generate(&store, &cfg.node.realm, &node_id, role, &clock)?;
    println!("node_id:    {node_id}");
    println!("role:       {role:?}");
    println!("did:        {}", identity.did());
    println!("public_key: {}", identity.keypair.public_key_hex());
    Ok(())
}

fn data_dir(cfg: &swarm_config::SwarmConfig) -> PathBuf {
    match &cfg.node.data_dir {
        Some(p) => PathBuf::from(p),
        None => dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("swarm"),
    }
}

fn open_store(cfg: &swarm_config::SwarmConfig) -> anyhow::Result<Arc<Store>> {
    let dir = data_dir(cfg);
    std::fs::create_dir_all(&dir).with_context(|| format!("creating data dir {}", dir.display()))?;
    let path = dir.join(&cfg.store.path);
    Ok(Arc::new(Store::open(&path).with_context(|| format!("opening store at {}", path.display()))?))
}

fn load_clock(store: &Store) -> anyhow::Result<LamportClock> {
    let checkpoint = store
        .get_state(LAMPORT_KEY)?
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    Ok(LamportClock::new(checkpoint))
}

fn load_or_generate_node_id(store: &Store) -> anyhow::Result<String> {
    if let Some(id) = store.get_state(NODE_ID_KEY)? {
        return Ok(id);
    }
    let id = uuid::Uuid::new_v4().simple().to_string();
    store.set_state(NODE_ID_KEY, &id)?;
    Ok(id)
}

fn load_or_generate_role(store: &Store, cfg: &swarm_config::SwarmConfig) -> anyhow::Result<NodeRole> {
    if let Some(raw) = store.get_state(NODE_ROLE_KEY)? {
        return Ok(parse_role(&raw));
    }
    let role = parse_role(&cfg.node.role_hint);
    store.set_state(NODE_ROLE_KEY, role_str(role))?;
    Ok(role)
}

fn parse_role(raw: &str) -> NodeRole {
    match raw {
        "emperor" => NodeRole::Emperor,
        "seneschal" => NodeRole::Seneschal,
        _ => NodeRole::Worker,
    }
}

fn role_str(role: NodeRole) -> &'static str {
    match role {
        NodeRole::Emperor => "emperor",
        NodeRole::Worker => "worker",
        NodeRole::Seneschal => "seneschal",
    }
}

/// Periodically checkpoints the Lamport counter so a restart resumes close
/// to where it left off instead of re-witnessing every peer from zero
/// (spec.md §3: "Integer counter persisted periodically").
fn spawn_clock_checkpoint(store: Arc<Store>, clock: Arc<LamportClock>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLOCK_CHECKPOINT_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = store.set_state(LAMPORT_KEY, &clock.current().to_string()) {
                warn!(error = %e, "failed to checkpoint lamport counter");
            }
        }
    });
}

async fn run_node(config: Option<&std::path::Path>) -> anyhow::Result<()> {
    let cfg = swarm_config::load(config)?;
    let store = open_store(&cfg)?;
    let clock = Arc::new(load_clock(&store)?);
    let node_id = load_or_generate_node_id(&store)?;
    let role = load_or_generate_role(&store, &cfg)?;

    info!(%node_id, ?role, "starting swarm node");
    spawn_clock_checkpoint(store.clone(), clock.clone());

    let identity = Arc::new(swarm_identity::load_or_generate(&store, &cfg.node.realm, &node_id, role, &clock)?);
    info!(did = %identity.did(), "identity ready");

    let bind_addr = format!("{}:{}", cfg.net.bind_addr, cfg.net.p2p_port)
        .parse()
        .with_context(|| "parsing net.bind_addr/p2p_port")?;
    let discovery = Arc::new(InMemoryDiscovery::new());
    let mut transport = TransportConfig::new(bind_addr, node_id.clone(), discovery);
    transport.seed_peers = cfg.net.seed_peers.clone();
    transport.max_connections = cfg.net.max_connections;
    transport.lan_discovery = cfg.net.lan_discovery;

    let net = NetNode::spawn(transport).await.context("starting p2p transport")?;

    swarm_gossip::spawn(net.clone(), store.clone(), clock.clone());
    let _verified_peers = swarm_identity::auth::spawn(net.clone(), store.clone(), identity.clone(), node_id.clone());

    let participates = role != NodeRole::Seneschal;
    let election = swarm_election::spawn(net.clone(), node_id.clone(), participates, cfg.net.seed_peers.is_empty());

    let broker: Arc<dyn swarm_dispatcher::OverflowBroker> = if cfg.broker.enabled {
        let broker_net = broker_net(&cfg, &cfg.node.realm).await?;
        let board = Arc::new(Board::new(store.clone(), clock.clone(), broker_net.clone(), cfg.node.realm.clone()));
        swarm_broker::spawn(board.clone(), broker_net);
        let reputation = Arc::new(ReputationLedger::new(store.clone(), cfg.node.realm.clone()));
        Arc::new(BrokerOverflowDelegator::new(
            store.clone(),
            clock.clone(),
            board,
            reputation,
            cfg.broker.reputation_floor,
        ))
    } else {
        Arc::new(NoopBroker)
    };

    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        clock.clone(),
        net.clone(),
        node_id.clone(),
        Arc::new(NoopExecutor),
        broker,
    ));
    let _trigger = swarm_dispatcher::spawn(dispatcher, election.subscribe());

    let collaborator: Arc<dyn swarm_integrator::GitCollaborator> = Arc::new(swarm_integrator::NoopCollaborator);
    swarm_integrator::spawn(store.clone(), clock.clone(), collaborator, election.subscribe());

    if role == NodeRole::Emperor || election.is_emperor() {
        maybe_self_issue_emperor_trust(&store, &clock, &identity)?;
    }

    info!("swarm node ready, entering event loop");
    std::future::pending::<()>().await;
    Ok(())
}

/// The emperor's root of trust: a self-issued `emperor_trust` credential
/// with itself as both issuer and subject (spec.md §4.8). Issued once; a
/// restart finds the existing credential and leaves it alone.
fn maybe_self_issue_emperor_trust(store: &Store, clock: &LamportClock, identity: &swarm_identity::NodeIdentity) -> anyhow::Result<()> {
    let existing = store.credentials_for_subject(identity.did(), Some("emperor_trust"))?;
    if existing.iter().any(|c| c.credential_type == "emperor_trust" && c.issuer_did == identity.did()) {
        return Ok(());
    }
    let cred = swarm_identity::issue_credential(
        identity.did(),
        identity.did(),
        "emperor_trust",
        serde_json::Map::new(),
        chrono::Duration::days(365),
        &identity.keypair,
        clock.tick(),
    );
    store.insert_credential(&cred)?;
    info!(did = %identity.did(), "self-issued emperor_trust credential");
    Ok(())
}

async fn broker_net(cfg: &swarm_config::SwarmConfig, swarm_id: &str) -> anyhow::Result<swarm_net::NetHandle> {
    let bind_addr = format!("{}:{}", cfg.net.bind_addr, cfg.broker.listen_port)
        .parse()
        .with_context(|| "parsing net.bind_addr/broker.listen_port")?;
    let discovery = Arc::new(InMemoryDiscovery::new());
    let mut transport = TransportConfig::new(bind_addr, swarm_id.to_string(), discovery);
    transport.seed_peers = cfg.broker.peers.clone();
    NetNode::spawn(transport).await.context("starting broker transport")
}

async fn run_broker(config: Option<&std::path::Path>) -> anyhow::Result<()> {
    let cfg = swarm_config::load(config)?;
    let store = open_store(&cfg)?;
    let clock = Arc::new(load_clock(&store)?);
    let node_id = load_or_generate_node_id(&store)?;

    info!(%node_id, "starting standalone broker (seneschal)");
    spawn_clock_checkpoint(store.clone(), clock.clone());

    let net = broker_net(&cfg, &cfg.node.realm).await?;
    let board = Arc::new(Board::new(store.clone(), clock.clone(), net.clone(), cfg.node.realm.clone()));
    swarm_broker::spawn(board, net);

    info!("broker ready, entering event loop");
    std::future::pending::<()>().await;
    Ok(())
}
