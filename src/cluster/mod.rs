//! Cluster membership client: a thin wrapper around [`foca`], a pure-Rust
//! SWIM implementation.
//!
//! The rest of the server only ever sees [`ClusterClient`]'s narrow surface
//! (`num_nodes`, `members`, `join`, `leave`, an event stream), never `foca`
//! types directly — a fixed `role=kv` tag and protocol version 5 are
//! advertised to every peer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use foca::{BincodeCodec, Config, Foca, Identity, OwnedNotification, State, Timer};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use crate::config::ServerConfig;
use crate::error::{DataBuddyError, Result};
use crate::types::NodeId;

/// Fixed SWIM/memberlist protocol version advertised by every node,
/// matching the Go original's `ProtocolVersion = 5` constant used for both
/// memberlist and serf.
pub const PROTOCOL_VERSION: (u16, u16, u16) = (5, 5, 5);

/// The fixed tag every DataBuddy node advertises. No per-node tag
/// propagation is implemented (see DESIGN.md) since every node in this
/// deployment plays the same role.
pub const ROLE_TAG: &str = "kv";

/// This node's cluster identity: its gossip listen address plus the
/// derived node ID used as its cluster-visible name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// UDP/TCP socket address other members send gossip traffic to.
    pub addr: SocketAddr,
    /// Stable node identifier, `sha256_hex(hostname || listen_addr)`.
    pub id: NodeId,
}

impl Identity for NodeIdentity {
    type Addr = SocketAddr;

    fn renew(&self) -> Option<Self> {
        None
    }

    fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn win_addr_conflict(&self, adversary: &Self) -> bool {
        self.id.as_str() > adversary.id.as_str()
    }
}

/// A remote cluster member, as surfaced to `CLUSTER PEERS`.
#[derive(Clone, Debug)]
pub struct ClusterMember {
    /// Node name (derived ID).
    pub name: String,
    /// `host:port` gossip address.
    pub address: String,
    /// Tag map. Always `{"role": "kv"}` in this deployment.
    pub tags: HashMap<String, String>,
    /// `"alive"`, `"suspect"`, or `"failed"`.
    pub status: String,
    /// (min, cur, max) protocol version triplet.
    pub protocol_version: (u16, u16, u16),
}

/// Membership change and liveness events, delivered to the dedicated
/// consumer task spawned by the server loop.
///
/// `Query` and `UserEvent` round out the event surface for callers that
/// want to match on it exhaustively; the `foca` backend never constructs
/// them (see DESIGN.md).
#[derive(Clone, Debug)]
pub enum GossipEvent {
    /// A member joined or was confirmed alive.
    MemberUp(ClusterMember),
    /// A member left or was declared down.
    MemberDown(ClusterMember),
    /// A query was received (never emitted by the `foca` backend).
    Query(Vec<u8>),
    /// A user event was received (never emitted by the `foca` backend).
    UserEvent(Vec<u8>),
}

enum ClusterCommand {
    Join(Vec<SocketAddr>),
    Leave,
}

#[derive(Default)]
struct Snapshot {
    members: Vec<ClusterMember>,
}

/// Handle to the running gossip client.
pub struct ClusterClient {
    identity: NodeIdentity,
    snapshot: Arc<RwLock<Snapshot>>,
    commands: mpsc::UnboundedSender<ClusterCommand>,
    events: Option<mpsc::Receiver<GossipEvent>>,
}

impl ClusterClient {
    /// Derives this node's identity, binds the gossip UDP socket, and spawns
    /// the background task that drives the SWIM protocol. Joins `seeds` if
    /// non-empty; a failed join is fatal to startup.
    #[instrument(skip(config))]
    pub async fn start(config: &ServerConfig) -> Result<Self> {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        let gossip_addr: SocketAddr = config
            .gossip_addr()
            .parse()
            .map_err(|e| DataBuddyError::cluster(format!("invalid gossip address: {e}")))?;
        let identity = NodeIdentity {
            addr: gossip_addr,
            id: NodeId::derive(&hostname, &config.gossip_addr()),
        };

        let socket = UdpSocket::bind(gossip_addr)
            .await
            .map_err(|e| DataBuddyError::cluster(format!("binding gossip socket: {e}")))?;

        let snapshot = Arc::new(RwLock::new(Snapshot::default()));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(16);

        let driver = GossipDriver {
            identity: identity.clone(),
            socket,
            snapshot: snapshot.clone(),
            events: event_tx,
        };
        tokio::spawn(driver.run(command_rx));

        let seeds = parse_seeds(&config.join_seeds)?;
        if !seeds.is_empty() {
            command_tx
                .send(ClusterCommand::Join(seeds))
                .map_err(|_| DataBuddyError::cluster("gossip driver already stopped"))?;
        }

        info!(node_id = %identity.id, addr = %identity.addr, "cluster client started");

        Ok(Self {
            identity,
            snapshot,
            commands: command_tx,
            events: Some(event_rx),
        })
    }

    /// This node's derived identity.
    pub fn local_identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Number of known cluster members, including self.
    pub fn num_nodes(&self) -> usize {
        self.snapshot.read().expect("cluster snapshot lock poisoned").members.len() + 1
    }

    /// All known members, not including self (self is implicit).
    pub fn members(&self) -> Vec<ClusterMember> {
        let mut members = self.snapshot.read().expect("cluster snapshot lock poisoned").members.clone();
        members.push(ClusterMember {
            name: self.identity.id.to_string(),
            address: self.identity.addr.to_string(),
            tags: [(String::from("role"), String::from(ROLE_TAG))].into_iter().collect(),
            status: "alive".to_string(),
            protocol_version: PROTOCOL_VERSION,
        });
        members
    }

    /// Takes ownership of the event receiver. Callers should spawn a task
    /// draining it. Returns `None` if already taken.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<GossipEvent>> {
        self.events.take()
    }

    /// Leaves the cluster gracefully. `Shutdown()` itself is implicit in
    /// dropping the client, since the background task exits when the
    /// command channel closes.
    pub async fn leave(&self) -> Result<()> {
        self.commands
            .send(ClusterCommand::Leave)
            .map_err(|_| DataBuddyError::cluster("gossip driver already stopped"))
    }
}

fn parse_seeds(seeds: &[String]) -> Result<Vec<SocketAddr>> {
    seeds
        .iter()
        .map(|s| {
            s.parse::<SocketAddr>()
                .map_err(|e| DataBuddyError::cluster(format!("invalid join seed '{s}': {e}")))
        })
        .collect()
}

type FocaInstance = Foca<NodeIdentity, BincodeCodec<bincode2::config::Configuration>, StdRng, foca::NoCustomBroadcast>;

/// Owns the `Foca` state machine and the UDP socket, draining its runtime
/// events into the socket, a scheduled-timer channel, and the public event
/// channel. One instance per `ClusterClient`.
struct GossipDriver {
    identity: NodeIdentity,
    socket: UdpSocket,
    snapshot: Arc<RwLock<Snapshot>>,
    events: mpsc::Sender<GossipEvent>,
}

impl GossipDriver {
    async fn run(self, mut commands: mpsc::UnboundedReceiver<ClusterCommand>) {
        let rng = StdRng::from_os_rng();
        let codec = BincodeCodec(bincode2::config::standard());
        let mut foca: FocaInstance = Foca::new(self.identity.clone(), Config::simple(), rng, codec);
        let mut runtime = foca::AccumulatingRuntime::new();

        let (timer_tx, mut timer_rx) = mpsc::unbounded_channel::<Timer<NodeIdentity>>();
        let mut buf = vec![0u8; 4096];

        loop {
            tokio::select! {
                recv = self.socket.recv_from(&mut buf) => {
                    match recv {
                        Ok((n, _from)) => {
                            if let Err(e) = foca.handle_data(&buf[..n], &mut runtime) {
                                warn!(error = %e, "handling gossip datagram");
                            }
                        }
                        Err(e) => warn!(error = %e, "receiving gossip datagram"),
                    }
                }
                Some(timer) = timer_rx.recv() => {
                    if let Err(e) = foca.handle_timer(timer, &mut runtime) {
                        warn!(error = %e, "handling gossip timer");
                    }
                }
                cmd = commands.recv() => {
                    match cmd {
                        Some(ClusterCommand::Join(seeds)) => {
                            for seed in seeds {
                                let placeholder = NodeIdentity {
                                    addr: seed,
                                    id: NodeId::derive("seed", &seed.to_string()),
                                };
                                if let Err(e) = foca.announce(placeholder, &mut runtime) {
                                    warn!(%seed, error = %e, "announcing to seed");
                                }
                            }
                        }
                        Some(ClusterCommand::Leave) => {
                            if let Err(e) = foca.leave_cluster(&mut runtime) {
                                warn!(error = %e, "leaving cluster");
                            }
                        }
                        None => break,
                    }
                }
            }

            self.drain_runtime(&mut runtime, &timer_tx).await;
            self.refresh_snapshot(&foca);
        }
    }

    async fn drain_runtime(
        &self,
        runtime: &mut foca::AccumulatingRuntime<NodeIdentity>,
        timer_tx: &mpsc::UnboundedSender<Timer<NodeIdentity>>,
    ) {
        while let Some((to, data)) = runtime.to_send() {
            if let Err(e) = self.socket.send_to(&data, to.addr).await {
                warn!(peer = %to.addr, error = %e, "sending gossip datagram");
            }
        }

        while let Some((after, timer)) = runtime.to_schedule() {
            let tx = timer_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                let _ = tx.send(timer);
            });
        }

        while let Some(notification) = runtime.to_notify() {
            self.handle_notification(notification).await;
        }
    }

    async fn handle_notification(&self, notification: foca::OwnedNotification<NodeIdentity>) {
        match notification {
            OwnedNotification::MemberUp(id) => {
                info!(node_id = %id.id, "member up");
                let _ = self.events.try_send(GossipEvent::MemberUp(member_view(&id, State::Alive)));
            }
            OwnedNotification::MemberDown(id) => {
                info!(node_id = %id.id, "member down");
                let _ = self.events.try_send(GossipEvent::MemberDown(member_view(&id, State::Down)));
            }
            other => {
                info!("gossip notification: {other:?}");
            }
        }
    }

    fn refresh_snapshot(&self, foca: &FocaInstance) {
        let members = foca
            .iter_members()
            .filter(|m| m.id() != &self.identity)
            .map(|m| member_view(m.id(), m.state()))
            .collect();
        self.snapshot.write().expect("cluster snapshot lock poisoned").members = members;
    }
}

fn member_view(id: &NodeIdentity, state: State) -> ClusterMember {
    ClusterMember {
        name: id.id.to_string(),
        address: id.addr.to_string(),
        tags: [(String::from("role"), String::from(ROLE_TAG))].into_iter().collect(),
        status: match state {
            State::Alive => "alive",
            State::Suspect => "suspect",
            State::Down => "failed",
        }
        .to_string(),
        protocol_version: PROTOCOL_VERSION,
    }
}
