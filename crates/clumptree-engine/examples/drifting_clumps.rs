//! Drifting clumps -- track a synthetic population through births and deaths.
//!
//! Generates a seeded sequence of snapshots in which clumps drift at their
//! velocity, accrete a little mass, occasionally dissolve, and occasionally
//! form. The whole sequence is fed through a [`Tracker`] and a summary of the
//! resulting tracks is printed together with the record hash.
//!
//! Run with: `cargo run -p clumptree-engine --example drifting_clumps`
//! Optionally pass a TOML config path: `... -- clumptree.toml`
//! Set `RUST_LOG=debug` to see per-step assignment logs.

use anyhow::Context;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use clumptree_engine::prelude::*;

const SEED: u64 = 0x5eed_c1a5;
const STEPS: usize = 40;
const DT: f64 = 0.5;
const INITIAL_CLUMPS: usize = 12;
const DEATH_CHANCE: f64 = 0.03;
const BIRTH_CHANCE: f64 = 0.25;

// ---------------------------------------------------------------------------
// Synthetic population
// ---------------------------------------------------------------------------

fn random_clump(rng: &mut Pcg64, label: u64) -> Clump {
    Clump {
        label,
        position: [
            rng.gen_range(-200.0..200.0),
            rng.gen_range(-200.0..200.0),
            rng.gen_range(-200.0..200.0),
        ],
        velocity: [
            rng.gen_range(-2.0..2.0),
            rng.gen_range(-2.0..2.0),
            rng.gen_range(-2.0..2.0),
        ],
        mass: rng.gen_range(1.0..50.0),
        radius: rng.gen_range(1.0..4.0),
    }
}

/// Advance the population by one step and return it as a snapshot in
/// descending-mass order. Labels are reassigned per snapshot, as a clump
/// finder would.
fn evolve(rng: &mut Pcg64, population: &mut Vec<Clump>, time: f64) -> anyhow::Result<Snapshot> {
    population.retain(|_| !rng.gen_bool(DEATH_CHANCE));
    for clump in population.iter_mut() {
        clump.position = clump.drifted_position(DT);
        clump.mass *= rng.gen_range(1.0..1.03);
    }
    if rng.gen_bool(BIRTH_CHANCE) {
        population.push(random_clump(rng, 0));
    }

    population.sort_by(|a, b| b.mass.total_cmp(&a.mass));
    let clumps = population
        .iter()
        .enumerate()
        .map(|(label, clump)| Clump {
            label: label as u64,
            ..clump.clone()
        })
        .collect();
    Snapshot::new(time, clumps).context("generated snapshot is invalid")
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => TrackerConfig::load(&path)
            .with_context(|| format!("failed to load tracker config from {path}"))?,
        None => TrackerConfig::default(),
    };

    let mut rng = Pcg64::seed_from_u64(SEED);
    let mut population: Vec<Clump> = (0..INITIAL_CLUMPS)
        .map(|_| random_clump(&mut rng, 0))
        .collect();

    let mut source = MemorySource::new();
    for step in 0..STEPS {
        let snapshot = evolve(&mut rng, &mut population, step as f64 * DT)?;
        source.insert_snapshot(step as u64, &snapshot);
    }

    let mut tracker = Tracker::new(config)?;
    let processed = tracker.run(&source)?;

    println!("processed {processed} snapshots");
    println!(
        "identifiers minted: {}",
        tracker.max_id().map(ClumpId::get).unwrap_or(0)
    );
    println!("{:>6} {:>8} {:>8} {:>10}", "id", "samples", "born", "last mass");
    for track in tracker.tracks().values() {
        let born = track.first_time().unwrap_or(f64::NAN);
        let last_mass = track.samples().last().map(|s| s.mass).unwrap_or(f64::NAN);
        println!(
            "{:>6} {:>8} {:>8.1} {:>10.3}",
            track.id(),
            track.len(),
            born,
            last_mass
        );
    }

    let record = tracker.into_record()?;
    record.verify()?;
    println!("record hash: {}", record.hash);

    Ok(())
}
