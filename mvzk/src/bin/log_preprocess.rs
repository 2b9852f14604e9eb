use std::path::PathBuf;
use std::time::Instant;

use anyhow::{ensure, Result};
use clap::Parser;
use mvzk::bitio::{BitWrite, FileBitWriter};
use mvzk::net::{NetworkConfig, TlsMesh};
use mvzk::player::Player;
use mvzk::preprocessing::generate_field;
use mvzk::proto::log::{
    CheckEl, K, K_EXT, N, PREPROCESSING_REPETITIONS, PREPROCESSING_REPETITIONS_EXT, T,
};
use mvzk_field::coding::default_xcoords;
use mvzk_field::Embedding;

/// Generate the preprocessed share file for the compression-based flavour.
#[derive(Parser)]
struct Args {
    network_config: PathBuf,
    player_num: usize,
    /// Number of share-field elements to produce.
    n1: usize,
    /// Number of check-field elements to produce.
    n2: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    ensure!(args.player_num <= N, "player number out of range");
    ensure!(args.n1 > 0 && args.n2 > 0, "invalid number of outputs");

    let config = NetworkConfig::from_file(&args.network_config)?;
    let mesh = TlsMesh::establish(args.player_num, &config, N + 1)?;
    let mut me = Player::new(mesh);

    let started = Instant::now();
    let xcoords = default_xcoords::<K>(N);
    let Some(base) = generate_field(
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

    let lift = Embedding::<K, K_EXT>::new();
    let ext_xcoords: Vec<CheckEl> = xcoords.iter().map(|&x| lift.apply(x)).collect();
    let Some(ext) = generate_field(
        &mut me,
        (args.player_num + N + 1) as u32,
        args.n2,
        PREPROCESSING_REPETITIONS_EXT,
        T,
        &ext_xcoords,
    )?
    else {
        eprintln!("Linear combinations are incorrect!");
        return Ok(());
    };
    println!(
        "Performed the preprocessing for {} + {} field elements in {:.3} seconds.",
        args.n1,
        args.n2,
        started.elapsed().as_secs_f64()
    );

    let mut out = FileBitWriter::create(format!("Player{}.pre", args.player_num))?;
    for el in base {
        out.write_element(el)?;
    }
    for el in ext {
        out.write_element(el)?;
    }
    out.finish()?;
    Ok(())
}
