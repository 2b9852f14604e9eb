use std::path::PathBuf;
use std::time::Instant;

use anyhow::{ensure, Result};
use clap::Parser;
use mvzk::circuit::Circuit;
use mvzk::net::{NetworkConfig, TlsMesh};
use mvzk::player::Player;
use mvzk::proto::log;

/// Verify a proof of the compression-based flavour.
#[derive(Parser)]
struct Args {
    network_config: PathBuf,
    player_num: usize,
    circuit: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    ensure!(
        (1..=log::N).contains(&args.player_num),
        "player number must be in 1..={}",
        log::N
    );

    let mut circ: Circuit = std::fs::read_to_string(&args.circuit)?.parse()?;
    circ.sort()?;

    let config = NetworkConfig::from_file(&args.network_config)?;
    let mesh = TlsMesh::establish(args.player_num, &config, log::N + 1)?;
    let mut me = Player::new(mesh);

    // Receive the proof before starting the clock so the prover's time is
    // not counted twice.
    let proof = me.recv_from(0)?;
    let started = Instant::now();
    let preprocessed = PathBuf::from(format!("Player{}.pre", args.player_num));
    let accepted = log::verify(&mut me, &circ, proof, &preprocessed)?;
    println!("Proof {}.", if accepted { "accepted" } else { "rejected" });
    println!(
        "Performed the verifier execution in {:.3} seconds.",
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
