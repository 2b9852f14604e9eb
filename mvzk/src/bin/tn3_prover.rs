use std::path::PathBuf;
use std::time::Instant;

use anyhow::{ensure, Result};
use clap::Parser;
use mvzk::circuit::Circuit;
use mvzk::net::{NetworkConfig, TlsMesh};
use mvzk::player::Player;
use mvzk::proto::tn3;

/// Prove circuit satisfiability with the Schwartz-Zippel flavour.
#[derive(Parser)]
struct Args {
    network_config: PathBuf,
    circuit: PathBuf,
    private_input: PathBuf,
    /// Row length n2 of the triple grid.
    batch_size: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    ensure!(args.batch_size > 0, "invalid batch size (n2)");

    let mut circ: Circuit = std::fs::read_to_string(&args.circuit)?.parse()?;
    circ.sort()?;

    let config = NetworkConfig::from_file(&args.network_config)?;
    let mesh = TlsMesh::establish(0, &config, tn3::N + 1)?;
    let mut me = Player::new(mesh);

    let started = Instant::now();
    let size = tn3::prove(
        &mut me,
        &circ,
        &args.private_input,
        "Player0.pre".as_ref(),
        args.batch_size,
    )?;
    println!("Proof size: {size} bytes.");
    println!(
        "Performed the prover execution in {:.3} seconds.",
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
