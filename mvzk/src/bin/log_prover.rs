use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use mvzk::circuit::Circuit;
use mvzk::net::{NetworkConfig, TlsMesh};
use mvzk::player::Player;
use mvzk::proto::log;

/// Prove circuit satisfiability with the compression-based flavour.
#[derive(Parser)]
struct Args {
    network_config: PathBuf,
    circuit: PathBuf,
    private_input: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut circ: Circuit = std::fs::read_to_string(&args.circuit)?.parse()?;
    circ.sort()?;

    let config = NetworkConfig::from_file(&args.network_config)?;
    let mesh = TlsMesh::establish(0, &config, log::N + 1)?;
    let mut me = Player::new(mesh);

    let started = Instant::now();
    let size = log::prove(&mut me, &circ, &args.private_input, "Player0.pre".as_ref())?;
    println!("Proof size: {size} bytes.");
    println!(
        "Performed the prover execution in {:.3} seconds.",
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
