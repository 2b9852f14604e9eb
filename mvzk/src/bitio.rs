//! Bit-granular readers and writers over files and byte buffers.
//!
//! Bits are packed little-endian within each byte: the i-th bit written to a
//! fresh byte lands at bit position i. A partial final byte is zero-padded
//! when flushed. Field elements of width K occupy K consecutive bits.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use mvzk_field::Gf2k;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BitIoError {
    #[error("out of data in buffer")]
    OutOfData,
    #[error("unexpected end of input file")]
    UnexpectedEof,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub trait BitRead {
    fn get_bit(&mut self) -> Result<bool, BitIoError>;

    /// Reads one field element as K consecutive bits.
    fn read_element<const K: usize>(&mut self) -> Result<Gf2k<K>, BitIoError>
    where
        Self: Sized,
    {
        let mut bits = [false; K];
        for bit in bits.iter_mut() {
            *bit = self.get_bit()?;
        }
        Ok(Gf2k::from_bits(bits))
    }
}

pub trait BitWrite {
    fn put_bit(&mut self, bit: bool) -> Result<(), BitIoError>;

    /// Writes one field element as K consecutive bits.
    fn write_element<const K: usize>(&mut self, el: Gf2k<K>) -> Result<(), BitIoError>
    where
        Self: Sized,
    {
        for bit in el.to_bits() {
            self.put_bit(bit)?;
        }
        Ok(())
    }
}

pub struct FileBitReader {
    file: BufReader<File>,
    buffer: u8,
    bits_left: u8,
}

impl FileBitReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BitIoError> {
        Ok(Self {
            file: BufReader::new(File::open(path)?),
            buffer: 0,
            bits_left: 0,
        })
    }
}

impl BitRead for FileBitReader {
    fn get_bit(&mut self) -> Result<bool, BitIoError> {
        if self.bits_left == 0 {
            let mut byte = [0u8; 1];
            self.file.read_exact(&mut byte).map_err(|e| {
                if e.kind() == ErrorKind::UnexpectedEof {
                    BitIoError::UnexpectedEof
                } else {
                    BitIoError::Io(e)
                }
            })?;
            self.buffer = byte[0];
            self.bits_left = 8;
        }
        self.bits_left -= 1;
        let bit = self.buffer & 1 == 1;
        self.buffer >>= 1;
        Ok(bit)
    }
}

pub struct BufferBitReader {
    data: Vec<u8>,
    idx: usize,
    buffer: u8,
    bits_left: u8,
}

impl BufferBitReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            idx: 0,
            buffer: 0,
            bits_left: 0,
        }
    }
}

impl BitRead for BufferBitReader {
    fn get_bit(&mut self) -> Result<bool, BitIoError> {
        if self.bits_left == 0 {
            if self.idx >= self.data.len() {
                return Err(BitIoError::OutOfData);
            }
            self.buffer = self.data[self.idx];
            self.idx += 1;
            self.bits_left = 8;
        }
        self.bits_left -= 1;
        let bit = self.buffer & 1 == 1;
        self.buffer >>= 1;
        Ok(bit)
    }
}

#[derive(Default)]
pub struct BufferBitWriter {
    data: Vec<u8>,
    buffer: u8,
    bits: u8,
}

impl BufferBitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed bytes written so far (excludes the partial byte).
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The partial byte and how many bits of it are in use.
    pub fn partial(&self) -> (u8, u8) {
        (self.buffer, self.bits)
    }

    /// Flushes the zero-padded partial byte and hands out the accumulated
    /// bytes, leaving the writer in a fresh state.
    pub fn drain(&mut self) -> Vec<u8> {
        if self.bits > 0 {
            self.data.push(self.buffer);
        }
        self.buffer = 0;
        self.bits = 0;
        std::mem::take(&mut self.data)
    }
}

impl BitWrite for BufferBitWriter {
    fn put_bit(&mut self, bit: bool) -> Result<(), BitIoError> {
        self.buffer |= (bit as u8) << self.bits;
        self.bits += 1;
        if self.bits == 8 {
            self.data.push(self.buffer);
            self.buffer = 0;
            self.bits = 0;
        }
        Ok(())
    }
}

pub struct FileBitWriter {
    file: BufWriter<File>,
    buffer: u8,
    bits: u8,
    finished: bool,
}

impl FileBitWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, BitIoError> {
        Ok(Self {
            file: BufWriter::new(File::create(path)?),
            buffer: 0,
            bits: 0,
            finished: false,
        })
    }

    /// Flushes the zero-padded partial byte and the underlying file.
    pub fn finish(&mut self) -> Result<(), BitIoError> {
        if self.bits > 0 {
            self.file.write_all(&[self.buffer])?;
            self.buffer = 0;
            self.bits = 0;
        }
        self.file.flush()?;
        self.finished = true;
        Ok(())
    }
}

impl BitWrite for FileBitWriter {
    fn put_bit(&mut self, bit: bool) -> Result<(), BitIoError> {
        self.buffer |= (bit as u8) << self.bits;
        self.bits += 1;
        if self.bits == 8 {
            self.file.write_all(&[self.buffer])?;
            self.buffer = 0;
            self.bits = 0;
        }
        Ok(())
    }
}

impl Drop for FileBitWriter {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvzk_field::Sample;

    #[test]
    fn bit_round_trip_with_padding() {
        let pattern = [true, false, true, true, false, false, true, false, true, true, true];
        let mut w = BufferBitWriter::new();
        for &b in &pattern {
            w.put_bit(b).unwrap();
        }
        let bytes = w.drain();
        assert_eq!(bytes.len(), 2);

        let mut r = BufferBitReader::new(bytes);
        for &b in &pattern {
            assert_eq!(r.get_bit().unwrap(), b);
        }
        // The trailing padding bits are zero.
        for _ in pattern.len()..16 {
            assert!(!r.get_bit().unwrap());
        }
        assert!(matches!(r.get_bit(), Err(BitIoError::OutOfData)));
    }

    #[test]
    fn drained_writer_restarts_clean() {
        let mut w = BufferBitWriter::new();
        for _ in 0..3 {
            w.put_bit(true).unwrap();
        }
        assert_eq!(w.drain(), vec![0b111]);
        w.put_bit(false).unwrap();
        w.put_bit(true).unwrap();
        assert_eq!(w.drain(), vec![0b10]);
    }

    #[test]
    fn mixed_width_elements_round_trip() {
        let shares = Gf2k::<3>::rand_vec(20);
        let checks = Gf2k::<87>::rand_vec(5);

        let mut w = BufferBitWriter::new();
        for &el in &shares {
            w.write_element(el).unwrap();
        }
        for &el in &checks {
            w.write_element(el).unwrap();
        }

        let mut r = BufferBitReader::new(w.drain());
        for &el in &shares {
            assert_eq!(r.read_element::<3>().unwrap(), el);
        }
        for &el in &checks {
            assert_eq!(r.read_element::<87>().unwrap(), el);
        }
    }

    #[test]
    fn file_round_trip() {
        let path = std::env::temp_dir().join(format!("mvzk-bitio-{}.bin", std::process::id()));
        let elements = Gf2k::<27>::rand_vec(100);
        {
            let mut w = FileBitWriter::create(&path).unwrap();
            for &el in &elements {
                w.write_element(el).unwrap();
            }
            w.finish().unwrap();
        }
        let mut r = FileBitReader::open(&path).unwrap();
        for &el in &elements {
            assert_eq!(r.read_element::<27>().unwrap(), el);
        }
        std::fs::remove_file(&path).unwrap();
    }
}
