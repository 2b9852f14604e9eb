use std::path::PathBuf;
use std::time::Instant;

use anyhow::{ensure, Result};
use clap::Parser;
use mvzk::bitio::{BitWrite, FileBitWriter};
use mvzk::net::{NetworkConfig, TlsMesh};
use mvzk::player::Player;
use mvzk::preprocessing::generate_field;
use mvzk::proto::tn4::{K, N, PREPROCESSING_REPETITIONS, T};
use mvzk_field::coding::default_xcoords;

/// Generate the preprocessed share file for the linear-combination flavour.
#[derive(Parser)]
struct Args {
    network_config: PathBuf,
    player_num: usize,
    /// Number of field elements to produce.
    n1: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    ensure!(args.player_num <= N, "player number out of range");
    ensure!(args.n1 > 0, "invalid number of outputs");

    let config = NetworkConfig::from_file(&args.network_config)?;
    let mesh = TlsMesh::establish(args.player_num, &config, N + 1)?;
    let mut me = Player::new(mesh);

    let started = Instant::now();
    let xcoords = default_xcoords::<K>(N);
    let Some(out) = generate_field(
        &mut me,
        args.player_num as u32,
        args.n1,
        PREPROCESSING_REPETITIONS,
        T,
        &xcoords,
    )?
    else {
        eprintln!("Linear combinations are incorrect!");
        return Ok(());
    };
    println!(
        "Performed the preprocessing for {} field elements in {:.3} seconds.",
        args.n1,
        started.elapsed().as_secs_f64()
    );

    let mut file = FileBitWriter::create(format!("Player{}.pre", args.player_num))?;
    for el in out {
        file.write_element(el)?;
    }
    file.finish()?;
    Ok(())
}
