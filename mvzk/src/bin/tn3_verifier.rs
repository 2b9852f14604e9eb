use std::path::PathBuf;
use std::time::Instant;

use anyhow::{ensure, Result};
use clap::Parser;
use mvzk::circuit::Circuit;
use mvzk::net::{NetworkConfig, TlsMesh};
use mvzk::player::Player;
use mvzk::proto::tn3;

/// Verify a proof of the Schwartz-Zippel flavour.
#[derive(Parser)]
struct Args {
    network_config: PathBuf,
    player_num: usize,
    circuit: PathBuf,
    /// Row length n2 of the triple grid; must match the prover's.
    batch_size: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    ensure!(
        (1..=tn3::N).contains(&args.player_num),
        "player number must be in 1..={}",
        tn3::N
    );
    ensure!(args.batch_size > 0, "invalid batch size (n2)");

    let mut circ: Circuit = std::fs::read_to_string(&args.circuit)?.parse()?;
    circ.sort()?;

    let config = NetworkConfig::from_file(&args.network_config)?;
    let mesh = TlsMesh::establish(args.player_num, &config, tn3::N + 1)?;
    let mut me = Player::new(mesh);

    // Receive the first proof message before starting the clock so the
    // prover's time is not counted twice.
    let part_1 = me.recv_from(0)?;
    let started = Instant::now();
    let preprocessed = PathBuf::from(format!("Player{}.pre", args.player_num));
    let accepted = tn3::verify(&mut me, &circ, part_1, &preprocessed, args.batch_size)?;
    println!("Proof {}.", if accepted { "accepted" } else { "rejected" });
    println!(
        "Performed the verifier execution in {:.3} seconds.",
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
