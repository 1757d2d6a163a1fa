//! Lossy link demo
//!
//! Runs a server, the owning client and an observing client in one process,
//! connected through a `MemoryNetwork` that drops every fourth unreliable
//! message. The owner walks a scripted pattern; all three peers should end
//! at the same position.
//!
//! ```bash
//! cargo run -p lossy_link
//! RUST_LOG=rewind_netcode=debug cargo run -p lossy_link -- demos/lossy_link/replication.ron
//! ```

use rewind_core::{
    EntityId, ManualClock, Ownership, PeerId, Pose, SimulatedEntity, StepContext, Tick,
};
use rewind_netcode::{
    MemoryNetwork, MemoryTransport, PredictionManager, ReplicationConfig, Sender,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TICKS: u64 = 300;
const SETTLE_TICKS: u64 = 30;
const WALKER: EntityId = EntityId(1);
const OWNER: PeerId = PeerId(1);
const OBSERVER: PeerId = PeerId(2);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Stick {
    dx: i8,
    dy: i8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WalkerState {
    position: [i32; 2],
}

#[derive(Debug, Default)]
struct Walker {
    position: [i32; 2],
    scripted: bool,
}

impl Walker {
    fn scripted() -> Self {
        Self {
            position: [0, 0],
            scripted: true,
        }
    }
}

impl SimulatedEntity for Walker {
    type Input = Stick;
    type Correction = WalkerState;

    fn sample_input(&mut self, tick: Tick) -> Stick {
        if !self.scripted || tick.raw() >= TICKS {
            return Stick::default();
        }
        // Walk a square, resting every fourth leg
        match (tick.raw() / 20) % 5 {
            0 => Stick { dx: 1, dy: 0 },
            1 => Stick { dx: 0, dy: 1 },
            2 => Stick { dx: -1, dy: 0 },
            3 => Stick { dx: 0, dy: -1 },
            _ => Stick::default(),
        }
    }

    fn step(&mut self, _ctx: &mut StepContext<'_>, input: &Stick) {
        self.position[0] += i32::from(input.dx);
        self.position[1] += i32::from(input.dy);
    }

    fn build_correction(&self) -> WalkerState {
        WalkerState {
            position: self.position,
        }
    }

    fn apply_correction(&mut self, correction: &WalkerState) {
        self.position = correction.position;
    }

    fn pose(&self) -> Option<Pose> {
        Some(Pose::at([self.position[0] as f32, self.position[1] as f32, 0.0]))
    }
}

struct Peer {
    name: &'static str,
    manager: PredictionManager,
    link: MemoryTransport,
}

impl Peer {
    fn position(&self) -> Option<[i32; 2]> {
        self.manager
            .get::<Walker>(WALKER)
            .map(|walker| walker.entity().position)
    }
}

/// Deliver pending messages and run one tick on every peer
fn step(
    network: &MemoryNetwork,
    clock: &ManualClock,
    server: &mut Peer,
    clients: [&mut Peer; 2],
) -> usize {
    for (sender, bytes) in network.drain_server() {
        server.manager.enqueue(sender, bytes);
    }
    let mut failures = server.manager.run_tick(clock, &mut server.link).send_failures;

    for (peer, client) in [OWNER, OBSERVER].into_iter().zip(clients) {
        for bytes in network.drain_client(peer) {
            client.manager.enqueue(Sender::Server, bytes);
        }
        failures += client.manager.run_tick(clock, &mut client.link).send_failures;
    }
    failures
}

fn load_config() -> ReplicationConfig {
    let Some(path) = std::env::args().nth(1) else {
        return ReplicationConfig::default();
    };
    match ReplicationConfig::load_file(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!(%path, error = %e, "failed to load config, using defaults");
            ReplicationConfig::default()
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,lossy_link=info")),
        )
        .init();

    let config = load_config();
    let network = MemoryNetwork::new().with_loss_every(4);

    let mut server = Peer {
        name: "server",
        manager: PredictionManager::new(config.clone()),
        link: network.server(),
    };
    let mut owner = Peer {
        name: "owner",
        manager: PredictionManager::new(config.clone()),
        link: network.connect(OWNER),
    };
    let mut observer = Peer {
        name: "observer",
        manager: PredictionManager::new(config),
        link: network.connect(OBSERVER),
    };

    let registered = server
        .manager
        .register(WALKER, Walker::default(), &Ownership::server_for(OWNER))
        .and_then(|_| {
            owner
                .manager
                .register(WALKER, Walker::scripted(), &Ownership::owned_by_me(OWNER))
        })
        .and_then(|_| {
            observer
                .manager
                .register(WALKER, Walker::default(), &Ownership::observed(Some(OWNER)))
        });
    if let Err(e) = registered {
        eprintln!("failed to register walker: {e}");
        std::process::exit(1);
    }

    info!(ticks = TICKS, "starting lossy link run");

    let mut clock = ManualClock::new(60);
    let mut send_failures = 0;
    // The tail lets the last input and corrections land
    for _ in 0..TICKS + SETTLE_TICKS {
        send_failures += step(&network, &clock, &mut server, [&mut owner, &mut observer]);
        clock.advance();
    }

    println!("dropped messages: {}", network.dropped());
    println!("send failures:    {send_failures}");
    for peer in [&server, &owner, &observer] {
        let stats = peer.manager.stats(WALKER).unwrap_or_default();
        println!(
            "{:<9} position {:?}  corrections {:>3}  replayed ticks {:>5}  failures {}  clears {}",
            peer.name,
            peer.position().unwrap_or_default(),
            stats.corrections,
            stats.replayed_ticks,
            stats.alignment_failures,
            stats.history_clears,
        );
    }

    let converged = server.position() == owner.position() && owner.position() == observer.position();
    if converged {
        info!("all peers converged");
    } else {
        warn!("peers disagree on the final position");
    }
}
