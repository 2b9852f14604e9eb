//! End-to-end protocol runs with every party as a thread over the
//! in-process mesh: offline preprocessing into share files, then proving
//! and verifying.

use std::path::{Path, PathBuf};
use std::thread;

use anyhow::Result;
use mvzk::bitio::{BitWrite, FileBitWriter};
use mvzk::circuit::Circuit;
use mvzk::net::LocalMesh;
use mvzk::player::Player;
use mvzk::preprocessing::generate_field;
use mvzk::proto::{log, tn3, tn4};
use mvzk_field::coding::default_xcoords;
use mvzk_field::Embedding;

/// out = !(a & b & c): satisfied (output 0) exactly on input (1, 1, 1).
const TRIPLE_AND: &str = "\
3 6
3 1 1 1
1 1

2 1 0 1 3 AND
2 1 3 2 4 AND
1 1 4 5 INV
";

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mvzk-e2e-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_input_bits(path: &Path, bits: &[bool]) {
    let mut byte = 0u8;
    for (i, &b) in bits.iter().enumerate() {
        byte |= (b as u8) << i;
    }
    assert!(bits.len() <= 8);
    std::fs::write(path, [byte]).unwrap();
}

fn sorted_circuit() -> Circuit {
    let mut circ: Circuit = TRIPLE_AND.parse().unwrap();
    circ.sort().unwrap();
    circ
}

/// Offline phase for the log flavour: both fields into `Player<i>.pre`.
fn log_preprocess(me: &mut Player<LocalMesh>, dir: &Path) -> Result<PathBuf> {
    let idx = me.index();
    let xcoords = default_xcoords::<{ log::K }>(log::N);
    let base = generate_field(
        me,
        idx as u32,
        5, // 3 input bits + 2 AND gates
        log::PREPROCESSING_REPETITIONS,
        log::T,
        &xcoords,
    )?
    .expect("honest preprocessing passes");

    let lift = Embedding::<{ log::K }, { log::K_EXT }>::new();
    let ext_xcoords: Vec<log::CheckEl> = xcoords.iter().map(|&x| lift.apply(x)).collect();
    let ext = generate_field(
        me,
        (idx + log::N + 1) as u32,
        7, // masking triple + 2 coefficients per compression round
        log::PREPROCESSING_REPETITIONS_EXT,
        log::T,
        &ext_xcoords,
    )?
    .expect("honest preprocessing passes");

    let path = dir.join(format!("Player{idx}.pre"));
    let mut out = FileBitWriter::create(&path)?;
    for el in base {
        out.write_element(el)?;
    }
    for el in ext {
        out.write_element(el)?;
    }
    out.finish()?;
    Ok(path)
}

fn single_field_preprocess<const K: usize>(
    me: &mut Player<LocalMesh>,
    dir: &Path,
    n: usize,
    t: usize,
    nout: usize,
    repetitions: usize,
) -> Result<PathBuf> {
    let idx = me.index();
    let xcoords = default_xcoords::<K>(n);
    let out = generate_field(me, idx as u32, nout, repetitions, t, &xcoords)?
        .expect("honest preprocessing passes");
    let path = dir.join(format!("Player{idx}.pre"));
    let mut file = FileBitWriter::create(&path)?;
    for el in out {
        file.write_element(el)?;
    }
    file.finish()?;
    Ok(path)
}

/// Runs preprocessing plus the proof phase for the log flavour; the prover
/// transcript can be tampered with before broadcast.
fn run_log(tamper: Option<(usize, u8)>) -> Vec<bool> {
    let dir = scratch_dir(if tamper.is_some() { "log-tamper" } else { "log" });
    let input_path = dir.join("input.bits");
    write_input_bits(&input_path, &[true, true, true]);

    let handles: Vec<_> = LocalMesh::create(log::N + 1)
        .into_iter()
        .map(|mesh| {
            let dir = dir.clone();
            let input_path = input_path.clone();
            thread::spawn(move || -> Result<Option<bool>> {
                let circ = sorted_circuit();
                let mut me = Player::new(mesh);
                let pre_path = log_preprocess(&mut me, &dir)?;
                if me.index() == 0 {
                    let mut proof = log::build_proof(&circ, &input_path, &pre_path)?;
                    if let Some((byte, mask)) = tamper {
                        proof[byte] ^= mask;
                    }
                    me.send_all(&proof, None)?;
                    Ok(None)
                } else {
                    let proof = me.recv_from(0)?;
                    Ok(Some(log::verify(&mut me, &circ, proof, &pre_path)?))
                }
            })
        })
        .collect();

    let verdicts: Vec<bool> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap().unwrap())
        .collect();
    std::fs::remove_dir_all(&dir).unwrap();
    assert_eq!(verdicts.len(), log::N);
    verdicts
}

#[test]
fn log_proof_is_accepted() {
    assert!(run_log(None).iter().all(|&ok| ok));
}

#[test]
fn log_tampered_proof_is_rejected_by_all() {
    // Flip one bit of the first masked input share.
    assert!(run_log(Some((0, 1))).iter().all(|&ok| !ok));
}

fn run_tn4(tamper: Option<(usize, u8)>) -> Vec<bool> {
    let dir = scratch_dir(if tamper.is_some() { "tn4-tamper" } else { "tn4" });
    let input_path = dir.join("input.bits");
    write_input_bits(&input_path, &[true, true, true]);

    let handles: Vec<_> = LocalMesh::create(tn4::N + 1)
        .into_iter()
        .map(|mesh| {
            let dir = dir.clone();
            let input_path = input_path.clone();
            thread::spawn(move || -> Result<Option<bool>> {
                let circ = sorted_circuit();
                let mut me = Player::new(mesh);
                let pre_path = single_field_preprocess::<{ tn4::K }>(
                    &mut me,
                    &dir,
                    tn4::N,
                    tn4::T,
                    5,
                    tn4::PREPROCESSING_REPETITIONS,
                )?;
                if me.index() == 0 {
                    let mut proof = tn4::build_proof(&circ, &input_path, &pre_path)?;
                    if let Some((byte, mask)) = tamper {
                        proof[byte] ^= mask;
                    }
                    me.send_all(&proof, None)?;
                    Ok(None)
                } else {
                    let proof = me.recv_from(0)?;
                    Ok(Some(tn4::verify(&mut me, &circ, proof, &pre_path)?))
                }
            })
        })
        .collect();

    let verdicts: Vec<bool> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap().unwrap())
        .collect();
    std::fs::remove_dir_all(&dir).unwrap();
    assert_eq!(verdicts.len(), tn4::N);
    verdicts
}

#[test]
fn tn4_honest_triples_are_consistent() {
    assert!(run_tn4(None).iter().all(|&ok| ok));
}

#[test]
fn tn4_flipped_and_output_is_rejected() {
    // The proof is 3 masked inputs then 2 masked AND outputs, 3 bits each;
    // flip the first bit of the first AND output (bit 9 = byte 1, bit 1).
    assert!(run_tn4(Some((1, 0b10))).iter().all(|&ok| !ok));
}

fn run_tn3(tamper: Option<(usize, u8)>) -> Vec<bool> {
    let n2 = 2;
    let dir = scratch_dir(if tamper.is_some() { "tn3-tamper" } else { "tn3" });
    let input_path = dir.join("input.bits");
    write_input_bits(&input_path, &[true, true, true]);

    // 3 inputs + 2 ANDs + 12 interpolation masks + 3 * (n2 + 4) committed
    // evaluations, for n1 = 1.
    let nout = 3 + 2
        + 2 * tn3::FULL_REPETITIONS * tn3::SZ_REPETITIONS
        + tn3::FULL_REPETITIONS * (n2 + 2 * tn3::SZ_REPETITIONS);

    let handles: Vec<_> = LocalMesh::create(tn3::N + 1)
        .into_iter()
        .map(|mesh| {
            let dir = dir.clone();
            let input_path = input_path.clone();
            thread::spawn(move || -> Result<Option<bool>> {
                let circ = sorted_circuit();
                let mut me = Player::new(mesh);
                let pre_path = single_field_preprocess::<{ tn3::K }>(
                    &mut me,
                    &dir,
                    tn3::N,
                    tn3::T,
                    nout,
                    tn3::PREPROCESSING_REPETITIONS,
                )?;
                if me.index() == 0 {
                    let (mut part_1, part_2) =
                        tn3::build_proof(&circ, &input_path, &pre_path, n2)?;
                    if let Some((byte, mask)) = tamper {
                        part_1[byte] ^= mask;
                    }
                    me.send_all(&part_1, None)?;
                    me.send_all(&part_2, None)?;
                    Ok(None)
                } else {
                    let part_1 = me.recv_from(0)?;
                    Ok(Some(tn3::verify(&mut me, &circ, part_1, &pre_path, n2)?))
                }
            })
        })
        .collect();

    let verdicts: Vec<bool> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap().unwrap())
        .collect();
    std::fs::remove_dir_all(&dir).unwrap();
    assert_eq!(verdicts.len(), tn3::N);
    verdicts
}

#[test]
fn tn3_proof_is_accepted() {
    assert!(run_tn3(None).iter().all(|&ok| ok));
}

#[test]
fn tn3_tampered_transcript_is_rejected_by_all() {
    assert!(run_tn3(Some((0, 1))).iter().all(|&ok| !ok));
}
