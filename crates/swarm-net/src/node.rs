//! The transport node: a TCP mesh keyed by application node-id, framed with
//! a 4-byte length prefix and JSON envelopes.
//!
//! Follows a handle/state split: [`NetHandle`] is cheap to clone and hands
//! commands to the event loop through an `mpsc` channel; [`NodeState`] owns
//! every piece of mutable connection state and runs exclusively inside
//! [`NetNode::spawn`]'s `tokio::select!` loop. Nothing outside that loop
//! ever touches a live `TcpStream`.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use serde_json::Value;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    sync::{broadcast, mpsc, oneshot},
};
use tracing::{debug, info, warn};

use crate::config::TransportConfig;
use crate::error::NetError;
use crate::protocol::{
    codec::{read_framed, write_framed},
    types::{tag, Envelope, Hello, PeerAddr, Pex, Ping, Pong},
};

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const CONN_WRITE_CHANNEL_CAPACITY: usize = 256;
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_MISSED_PONGS: u32 = 2;

/// Events the transport emits for layers above it (gossip, queue,
/// election, identity, broker) to react to.
#[derive(Debug, Clone)]
pub enum NetEvent {
    PeerConnected { node_id: String },
    PeerDisconnected { node_id: String },
    /// A frame outside the transport's own tag range (0x01–0x07) arrived
    /// from `from`. Upper layers decode `payload` per `msg_type`.
    Message {
        from: String,
        msg_type: u8,
        payload: Value,
    },
    DialFailed { addr: String, error: String },
}

/// Commands accepted by the event loop via [`NetHandle`].
pub enum NetCommand {
    Dial(SocketAddr),
    SendTo {
        node_id: String,
        msg_type: u8,
        payload: Value,
        reply: oneshot::Sender<bool>,
    },
    Broadcast {
        msg_type: u8,
        payload: Value,
        exclude: Option<String>,
    },
    ConnectedPeers(oneshot::Sender<Vec<String>>),
    Shutdown,
}

/// Cheap-clone handle to a running transport node.
#[derive(Clone)]
pub struct NetHandle {
    cmd_tx: mpsc::Sender<NetCommand>,
    event_tx: broadcast::Sender<NetEvent>,
    roster: Arc<Mutex<HashMap<String, PeerMeta>>>,
}

impl NetHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<NetEvent> {
        self.event_tx.subscribe()
    }

    pub async fn dial(&self, addr: SocketAddr) -> Result<(), NetError> {
        self.cmd_tx.send(NetCommand::Dial(addr)).await.map_err(|_| NetError::Shutdown)
    }

    /// Send a message to exactly one connected peer. Returns `false` if the
    /// peer was not connected — sends are never fatal.
    pub async fn send_to(
        &self,
        node_id: impl Into<String>,
        msg_type: u8,
        payload: Value,
    ) -> Result<bool, NetError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(NetCommand::SendTo {
                node_id: node_id.into(),
                msg_type,
                payload,
                reply: tx,
            })
            .await
            .map_err(|_| NetError::Shutdown)?;
        rx.await.map_err(|_| NetError::Shutdown)
    }

    pub async fn broadcast(&self, msg_type: u8, payload: Value, exclude: Option<String>) -> Result<(), NetError> {
        self.cmd_tx
            .send(NetCommand::Broadcast { msg_type, payload, exclude })
            .await
            .map_err(|_| NetError::Shutdown)
    }

    pub async fn connected_peers(&self) -> Result<Vec<String>, NetError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(NetCommand::ConnectedPeers(tx))
            .await
            .map_err(|_| NetError::Shutdown)?;
        rx.await.map_err(|_| NetError::Shutdown)
    }

    pub async fn shutdown(&self) -> Result<(), NetError> {
        self.cmd_tx.send(NetCommand::Shutdown).await.map_err(|_| NetError::Shutdown)
    }

    pub fn roster_snapshot(&self) -> Vec<PeerAddr> {
        self.roster
            .lock()
            .expect("roster mutex poisoned")
            .iter()
            .map(|(node_id, meta)| PeerAddr {
                node_id: node_id.clone(),
                addr: meta.addr.to_string(),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct PeerMeta {
    addr: SocketAddr,
    #[allow(dead_code)]
    connected_at: Instant,
}

struct ConnectedPeer {
    addr: SocketAddr,
    write_tx: mpsc::Sender<Envelope>,
    missed_pongs: u32,
    next_ping_nonce: u64,
}

enum ConnEvent {
    Established {
        node_id: String,
        addr: SocketAddr,
        write_tx: mpsc::Sender<Envelope>,
    },
    Frame { node_id: String, env: Envelope },
    Closed { node_id: String },
}

/// A running transport node. [`NetNode::spawn`] starts the event loop on
/// the current runtime and returns a handle to it.
pub struct NetNode;

impl NetNode {
    pub async fn spawn(config: TransportConfig) -> Result<NetHandle, NetError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|e| NetError::Transport(format!("bind {}: {e}", config.bind_addr)))?;
        let local_addr = listener.local_addr().map_err(NetError::from)?;
        info!(node_id = %config.node_id, addr = %local_addr, "transport node listening");

        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let roster = Arc::new(Mutex::new(HashMap::new()));

        let handle = NetHandle {
            cmd_tx,
            event_tx: event_tx.clone(),
            roster: roster.clone(),
        };

        if config.lan_discovery {
            crate::beacon::spawn(
                config.node_id.clone(),
                local_addr.port(),
                config.discovery.clone(),
                config.beacon_interval,
            );
        }

        let state = NodeState {
            config,
            listener,
            local_addr,
            cmd_rx,
            event_tx,
            roster,
            peers: HashMap::new(),
            dialed_addrs: Default::default(),
        };

        tokio::spawn(state.run());
        Ok(handle)
    }
}

struct NodeState {
    config: TransportConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    cmd_rx: mpsc::Receiver<NetCommand>,
    event_tx: broadcast::Sender<NetEvent>,
    roster: Arc<Mutex<HashMap<String, PeerMeta>>>,
    peers: HashMap<String, ConnectedPeer>,
    dialed_addrs: std::collections::HashSet<SocketAddr>,
}

impl NodeState {
    async fn run(mut self) {
        let (conn_tx, mut conn_rx) = mpsc::channel::<ConnEvent>(256);
        let mut keepalive = tokio::time::interval(self.config.keepalive_interval);
        keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut discovery_poll = tokio::time::interval(self.config.discovery_poll_interval);
        discovery_poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut pex_tick = tokio::time::interval(self.config.pex_interval);
        pex_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        for seed in self.config.seed_peers.clone() {
            match seed.parse::<SocketAddr>() {
                Ok(addr) => self.spawn_outbound(addr, conn_tx.clone()),
                Err(_) => warn!(seed = %seed, "ignoring unparsable seed peer address"),
            }
        }

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.spawn_inbound(stream, addr, conn_tx.clone()),
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }

                Some(event) = conn_rx.recv() => {
                    self.handle_conn_event(event);
                }

                Some(cmd) = self.cmd_rx.recv() => {
                    if !self.handle_command(cmd, &conn_tx) {
                        break;
                    }
                }

                _ = keepalive.tick() => {
                    self.send_pings();
                }

                _ = discovery_poll.tick() => {
                    self.poll_discovery(&conn_tx);
                }

                _ = pex_tick.tick() => {
                    self.broadcast_pex();
                }
            }
        }

        info!(node_id = %self.config.node_id, "transport node shutting down");
    }

    fn spawn_inbound(&self, stream: TcpStream, addr: SocketAddr, conn_tx: mpsc::Sender<ConnEvent>) {
        let my_hello = self.my_hello();
        tokio::spawn(handshake_and_run(stream, addr, my_hello, conn_tx));
    }

    fn spawn_outbound(&mut self, addr: SocketAddr, conn_tx: mpsc::Sender<ConnEvent>) {
        if self.dialed_addrs.contains(&addr) {
            return;
        }
        self.dialed_addrs.insert(addr);
        let my_hello = self.my_hello();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            match TcpStream::connect(addr).await {
                Ok(stream) => handshake_and_run(stream, addr, my_hello, conn_tx).await,
                Err(e) => {
                    warn!(addr = %addr, error = %e, "dial failed");
                    let _ = event_tx.send(NetEvent::DialFailed {
                        addr: addr.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        });
    }

    fn my_hello(&self) -> Hello {
        Hello {
            node_id: self.config.node_id.clone(),
            listen_port: self.local_addr.port(),
            public_key_hex: None,
        }
    }

    fn handle_conn_event(&mut self, event: ConnEvent) {
        match event {
            ConnEvent::Established { node_id, addr, write_tx } => {
                if node_id == self.config.node_id {
                    debug!("rejecting connection claiming our own node-id");
                    return;
                }
                if self.peers.contains_key(&node_id) {
                    // Deterministic tiebreak: the lower node-id keeps its
                    // existing edge; the duplicate from the other side is
                    // dropped rather than replacing a live connection.
                    if self.config.node_id < node_id {
                        debug!(peer = %node_id, "duplicate edge dropped by tiebreak");
                        return;
                    }
                }
                info!(peer = %node_id, addr = %addr, "peer connected");
                self.peers.insert(
                    node_id.clone(),
                    ConnectedPeer {
                        addr,
                        write_tx,
                        missed_pongs: 0,
                        next_ping_nonce: 1,
                    },
                );
                self.roster.lock().expect("roster mutex poisoned").insert(
                    node_id.clone(),
                    PeerMeta { addr, connected_at: Instant::now() },
                );
                let _ = self.event_tx.send(NetEvent::PeerConnected { node_id });
            }
            ConnEvent::Frame { node_id, env } => self.handle_frame(node_id, env),
            ConnEvent::Closed { node_id } => {
                if self.peers.remove(&node_id).is_some() {
                    self.roster.lock().expect("roster mutex poisoned").remove(&node_id);
                    let _ = self.event_tx.send(NetEvent::PeerDisconnected { node_id });
                }
            }
        }
    }

    fn handle_frame(&mut self, node_id: String, env: Envelope) {
        match env.msg_type {
            tag::HELLO => { /* handshake already completed; ignore stray re-announcements */ }
            tag::PING => {
                if let Ok(ping) = env.decode::<Ping>() {
                    if let Some(peer) = self.peers.get(&node_id) {
                        let pong = Pong { nonce: ping.nonce };
                        if let Ok(reply) = Envelope::new(tag::PONG, &pong) {
                            let _ = peer.write_tx.try_send(reply);
                        }
                    }
                }
            }
            tag::PONG => {
                if let Some(peer) = self.peers.get_mut(&node_id) {
                    peer.missed_pongs = 0;
                }
            }
            tag::PEX => {
                if let Ok(pex) = env.decode::<Pex>() {
                    for peer_addr in pex.peers {
                        if peer_addr.node_id != self.config.node_id {
                            let _ = self.config.discovery.publish(peer_addr);
                        }
                    }
                }
            }
            other => {
                let _ = self.event_tx.send(NetEvent::Message {
                    from: node_id,
                    msg_type: other,
                    payload: env.payload,
                });
            }
        }
    }

    fn handle_command(&mut self, cmd: NetCommand, conn_tx: &mpsc::Sender<ConnEvent>) -> bool {
        match cmd {
            NetCommand::Dial(addr) => {
                self.spawn_outbound(addr, conn_tx.clone());
                true
            }
            NetCommand::SendTo { node_id, msg_type, payload, reply } => {
                let sent = match self.peers.get(&node_id) {
                    Some(peer) => match Envelope::new(msg_type, &payload) {
                        Ok(env) => peer.write_tx.try_send(env).is_ok(),
                        Err(_) => false,
                    },
                    None => false,
                };
                let _ = reply.send(sent);
                true
            }
            NetCommand::Broadcast { msg_type, payload, exclude } => {
                if let Ok(env) = Envelope::new(msg_type, &payload) {
                    for (node_id, peer) in self.peers.iter() {
                        if exclude.as_deref() == Some(node_id.as_str()) {
                            continue;
                        }
                        let _ = peer.write_tx.try_send(env.clone());
                    }
                }
                true
            }
            NetCommand::ConnectedPeers(reply) => {
                let _ = reply.send(self.peers.keys().cloned().collect());
                true
            }
            NetCommand::Shutdown => false,
        }
    }

    fn send_pings(&mut self) {
        let mut dead = Vec::new();
        for (node_id, peer) in self.peers.iter_mut() {
            if peer.missed_pongs >= MAX_MISSED_PONGS {
                dead.push(node_id.clone());
                continue;
            }
            let ping = Ping { nonce: peer.next_ping_nonce };
            peer.next_ping_nonce += 1;
            peer.missed_pongs += 1;
            if let Ok(env) = Envelope::new(tag::PING, &ping) {
                let _ = peer.write_tx.try_send(env);
            }
        }
        for node_id in dead {
            warn!(peer = %node_id, "closing connection after missed pongs");
            self.peers.remove(&node_id);
            self.roster.lock().expect("roster mutex poisoned").remove(&node_id);
            let _ = self.event_tx.send(NetEvent::PeerDisconnected { node_id });
        }
    }

    /// Trade known addresses with every connected peer (spec.md §4.1:
    /// "a peer-exchange that trades known addresses periodically"). Each
    /// peer's own advertised address is excluded from the batch sent back
    /// to it, since it already knows how to reach itself.
    fn broadcast_pex(&mut self) {
        if self.peers.is_empty() {
            return;
        }
        let known: Vec<PeerAddr> = self
            .peers
            .iter()
            .map(|(node_id, peer)| PeerAddr {
                node_id: node_id.clone(),
                addr: peer.addr.to_string(),
            })
            .collect();
        for (node_id, peer) in self.peers.iter() {
            let batch: Vec<PeerAddr> = known.iter().filter(|p| &p.node_id != node_id).cloned().collect();
            if batch.is_empty() {
                continue;
            }
            if let Ok(env) = Envelope::new(tag::PEX, &Pex { peers: batch }) {
                let _ = peer.write_tx.try_send(env);
            }
        }
    }

    fn poll_discovery(&mut self, conn_tx: &mpsc::Sender<ConnEvent>) {
        if self.peers.len() >= self.config.max_connections {
            return;
        }
        let known = match self.config.discovery.fetch_all() {
            Ok(k) => k,
            Err(e) => {
                warn!(error = %e, "discovery poll failed");
                return;
            }
        };
        for peer_addr in known {
            if peer_addr.node_id == self.config.node_id || self.peers.contains_key(&peer_addr.node_id) {
                continue;
            }
            if self.peers.len() >= self.config.max_connections {
                break;
            }
            if let Ok(addr) = peer_addr.addr.parse::<SocketAddr>() {
                self.spawn_outbound(addr, conn_tx.clone());
            }
        }
    }
}

/// Perform the HELLO handshake, then hand the connection off to dedicated
/// reader/writer tasks and report the outcome through `conn_tx`.
async fn handshake_and_run(mut stream: TcpStream, addr: SocketAddr, my_hello: Hello, conn_tx: mpsc::Sender<ConnEvent>) {
    let hello_env = match Envelope::new(tag::HELLO, &my_hello) {
        Ok(e) => e,
        Err(_) => return,
    };

    let handshake = async {
        write_framed(&mut stream, &hello_env).await?;
        read_framed(&mut stream).await
    };

    let incoming = match tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake).await {
        Ok(Ok(env)) if env.msg_type == tag::HELLO => env,
        Ok(Ok(_)) => {
            debug!(addr = %addr, "peer sent non-HELLO as first frame");
            return;
        }
        Ok(Err(e)) => {
            debug!(addr = %addr, error = %e, "handshake io error");
            return;
        }
        Err(_) => {
            debug!(addr = %addr, "handshake timed out");
            return;
        }
    };

    let peer_hello: Hello = match incoming.decode() {
        Ok(h) => h,
        Err(_) => return,
    };

    let (mut read_half, mut write_half) = stream.into_split();
    let (write_tx, mut write_rx) = mpsc::channel::<Envelope>(CONN_WRITE_CHANNEL_CAPACITY);

    let node_id = peer_hello.node_id.clone();

    let _ = conn_tx
        .send(ConnEvent::Established { node_id: node_id.clone(), addr, write_tx })
        .await;

    tokio::spawn(async move {
        while let Some(env) = write_rx.recv().await {
            if write_framed(&mut write_half, &env).await.is_err() {
                break;
            }
        }
        let _ = write_half.shutdown().await;
    });

    loop {
        match read_framed(&mut read_half).await {
            Ok(env) => {
                if conn_tx.send(ConnEvent::Frame { node_id: node_id.clone(), env }).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(peer = %node_id, error = %e, "connection closed");
                break;
            }
        }
    }
    let _ = conn_tx.send(ConnEvent::Closed { node_id }).await;
}
