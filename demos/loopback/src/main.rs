//! Loopback Demo
//!
//! One host and three clients exchange steps over a simulated network with
//! latency, jitter and loss. The host first streams a bootstrap blob to every
//! client, then all clients predict one step per frame. At the end every
//! client must hold the same composed timeline.
//!
//! Run with `RUST_LOG=debug` to watch composition and resends.

mod network;

use log::info;
use network::{LinkConfig, SimulatedNetwork};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tickline_core::{ConnectionId, Millis};
use tickline_hub::{Host, HostConfig};
use tickline_netcode::{CombinedAuthoritativeStep, PredictedStep, StepClient, StepClientConfig};

const HOST: ConnectionId = ConnectionId(0);
const CLIENTS: u32 = 3;
const FRAMES: u32 = 600;
const FRAME_MS: Millis = 16;

struct DemoClient {
    connection: ConnectionId,
    client: StepClient,
    timeline: Vec<CombinedAuthoritativeStep>,
    bootstrapped: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("=== Tickline Loopback Demo ===\n");

    let config = match std::env::args().nth(1) {
        Some(path) => {
            println!("Loading host configuration from: {}", path);
            HostConfig::load(&path)?
        }
        None => HostConfig::from_ron_str(include_str!("../host.ron"))?,
    };
    let first_tick_id = config.first_tick_id;
    let mut host = Host::new(config)?;

    let mut network = SimulatedNetwork::new(LinkConfig {
        base_latency_ms: 30,
        jitter_ms: 20,
        loss_rate: 0.05,
        seed: 42,
    });
    let mut inputs = ChaCha8Rng::seed_from_u64(7);

    let snapshot: Vec<u8> = (0..8000u32).map(|i| (i % 251) as u8).collect();
    let mut clients = Vec::new();
    for raw in 1..=CLIENTS {
        let connection = ConnectionId(raw);
        host.start_blob_transfer(connection, snapshot.clone())?;
        clients.push(DemoClient {
            connection,
            client: StepClient::new(StepClientConfig::default(), first_tick_id),
            timeline: Vec::new(),
            bootstrapped: None,
        });
    }

    for frame in 0..FRAMES {
        let now = Millis::from(frame) * FRAME_MS;
        network.advance_to(now);

        for demo in &mut clients {
            let input = vec![demo.connection.0 as u8, inputs.gen::<u8>()];
            let step = PredictedStep::new(first_tick_id.advanced_by(frame), input)?;
            demo.client.push_predicted_step(0, step)?;
            demo.client.service(&mut network.endpoint(demo.connection), HOST)?;

            while let Some(step) = demo.client.pop_authoritative_step() {
                demo.timeline.push(step);
            }
            if demo.bootstrapped.is_none() {
                if let Some(blob) = demo.client.take_blob() {
                    if blob != snapshot {
                        let message = format!("{} received a corrupt snapshot", demo.connection);
                        return Err(message.into());
                    }
                    info!("{} bootstrapped at frame {}", demo.connection, frame);
                    demo.bootstrapped = Some(frame as usize);
                }
            }
        }

        host.service(&mut network.endpoint(HOST), now)?;
    }

    report(&host, &clients, &network)
}

fn report(
    host: &Host,
    clients: &[DemoClient],
    network: &SimulatedNetwork,
) -> Result<(), Box<dyn std::error::Error>> {
    let stats = network.stats();
    let combiner = host.producer().combiner().stats();
    println!(
        "Network: {} sent, {} dropped, {} delivered",
        stats.sent, stats.dropped, stats.delivered
    );
    println!(
        "Host: composed {} ticks (next {}), {} records provided, {} synthesised",
        combiner.composed,
        host.next_tick_id(),
        combiner.provided,
        combiner.synthesised
    );

    for demo in clients {
        let gaps = demo.client.gap_stats();
        println!(
            "  {}: {} ticks confirmed, bootstrap at frame {:?}, {} datagrams missed, {} rejected",
            demo.connection,
            demo.timeline.len(),
            demo.bootstrapped,
            gaps.missed,
            gaps.rejected
        );
    }

    let shortest = clients
        .iter()
        .map(|demo| demo.timeline.len())
        .min()
        .unwrap_or(0);
    let reference = clients.first().map(|demo| &demo.timeline[..shortest]);
    for demo in clients {
        if Some(&demo.timeline[..shortest]) != reference {
            return Err(format!("{} diverged from the other clients", demo.connection).into());
        }
    }
    if let Some(last) = reference.and_then(|timeline| timeline.last()) {
        println!("\nAll clients agree on {} ticks up to {}", shortest, last.tick_id);
    }
    Ok(())
}
