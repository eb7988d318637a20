//! Low-level byte helpers shared by the container codecs.

use crate::error::{ExchangeError, Result};
use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::warn;
use std::io::{Cursor, Read, Write};

/// A cursor over a fully inflated buffer that knows how much is left, so
/// every failed read can report where it happened.
pub struct ByteReader<'a> {
    inner: Cursor<&'a [u8]>,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            inner: Cursor::new(bytes),
        }
    }

    pub fn offset(&self) -> u64 {
        self.inner.position()
    }

    pub fn remaining(&self) -> usize {
        let len = self.inner.get_ref().len() as u64;
        len.saturating_sub(self.inner.position()) as usize
    }

    pub fn read_exactly(&mut self, n: usize) -> Result<Vec<u8>> {
        let offset = self.offset();
        read_exactly(&mut self.inner, n).map_err(|err| match err {
            ExchangeError::TruncatedInput {
                wanted, available, ..
            } => ExchangeError::TruncatedInput {
                offset,
                wanted,
                available,
            },
            other => other,
        })
    }

    pub fn read_i32_be(&mut self) -> Result<i32> {
        let bytes = self.read_exactly(4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&bytes);
        Ok(i32_from_be(word))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let offset = self.offset();
        self.inner
            .read_u8()
            .map_err(|_| ExchangeError::TruncatedInput {
                offset,
                wanted: 1,
                available: 0,
            })
    }

    pub fn read_remaining(&mut self) -> Result<Vec<u8>> {
        read_remaining(&mut self.inner)
    }
}

/// Reads exactly `n` bytes or fails with `TruncatedInput`.
pub fn read_exactly<R: Read>(reader: &mut R, n: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(n);
    let got = reader.by_ref().take(n as u64).read_to_end(&mut buf)?;
    if got < n {
        return Err(ExchangeError::TruncatedInput {
            offset: 0,
            wanted: n,
            available: got,
        });
    }
    Ok(buf)
}

pub fn read_remaining<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}

pub fn i32_from_be(bytes: [u8; 4]) -> i32 {
    BigEndian::read_i32(&bytes)
}

pub fn write_i32_be<W: Write>(writer: &mut W, value: i32) -> Result<()> {
    writer.write_i32::<BigEndian>(value)?;
    Ok(())
}

/// Inflates a whole `.subject` file. Anything that is not a valid deflate
/// stream is reported as `ContainerCorrupt`.
pub fn inflate(raw: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(raw);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| {
            warn!(
                "Deflate stream broke after {} of {} input bytes: {}",
                decoder.total_in(),
                raw.len(),
                e
            );
            ExchangeError::ContainerCorrupt(format!("deflate stream: {}", e))
        })?;
    Ok(out)
}

pub fn deflate(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_exactly_reports_shortfall() {
        let mut reader = ByteReader::new(&[1, 2, 3, 4, 5]);
        assert_eq!(reader.read_exactly(2).unwrap(), vec![1, 2]);
        match reader.read_exactly(8) {
            Err(ExchangeError::TruncatedInput {
                offset,
                wanted,
                available,
            }) => {
                assert_eq!(offset, 2);
                assert_eq!(wanted, 8);
                assert_eq!(available, 3);
            }
            other => panic!("expected TruncatedInput, got {:?}", other),
        }
    }

    #[test]
    fn big_endian_ints() {
        assert_eq!(i32_from_be([0, 0, 0, 5]), 5);
        assert_eq!(i32_from_be([0xff, 0xff, 0xff, 0xff]), -1);

        let mut buf = Vec::new();
        write_i32_be(&mut buf, 258).unwrap();
        assert_eq!(buf, vec![0, 0, 1, 2]);
        assert_eq!(ByteReader::new(&buf).read_i32_be().unwrap(), 258);
    }

    #[test]
    fn remaining_tracks_position() {
        let data = [9u8; 10];
        let mut reader = ByteReader::new(&data);
        reader.read_u8().unwrap();
        assert_eq!(reader.remaining(), 9);
        assert_eq!(reader.read_remaining().unwrap().len(), 9);
        assert_eq!(reader.remaining(), 0);
        assert!(reader.read_u8().is_err());
    }

    #[test]
    fn inflate_rejects_garbage() {
        let packed = deflate(b"hello subject").unwrap();
        assert_eq!(inflate(&packed).unwrap(), b"hello subject");
        assert!(matches!(
            inflate(b"definitely not deflate"),
            Err(ExchangeError::ContainerCorrupt(_))
        ));
    }
}
