//! The block device: random-access reads of fixed-size blocks from a backing image.
//!
//! The teacher (`mkfs/src/ext2.rs`) always seeks and reads directly against a
//! `&mut File`. This repo generalizes that one step, to a small positional-read
//! trait, so the core can be driven by an in-memory `Cursor<Vec<u8>>` in tests
//! without touching the filesystem; production code still just wraps a `File`.

use crate::error::Error;
use std::fs::File;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;

/// A byte source that can be read at an arbitrary offset without disturbing any
/// other reader of the same source (aside from the usual single-cursor caveats
/// documented on [`BlockDevice`]).
pub trait RandomAccess {
    /// Fills `buf` completely with the bytes starting at `offset`.
    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

impl<T: Read + Seek> RandomAccess for T {
    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf)
    }
}

/// Wraps a [`RandomAccess`] byte source and knows the filesystem's block size, so
/// every caller addresses blocks instead of raw byte offsets.
///
/// Per §5, a `BlockDevice` holds an exclusive, mutable position over its backing
/// source: it is not reentrant, and two iterators driving the same device cannot
/// interleave their advances.
#[derive(Debug)]
pub struct BlockDevice<D> {
    inner: D,
    block_size: u32,
}

impl<D: RandomAccess> BlockDevice<D> {
    /// Wraps `inner`, a byte source whose blocks are `block_size` bytes long.
    pub fn new(inner: D, block_size: u32) -> Self {
        Self { inner, block_size }
    }

    /// The filesystem's block size in bytes.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Reads exactly `buf.len()` bytes starting at byte offset `offset`.
    pub fn read_bytes_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        self.inner.read_exact_at(offset, buf)?;
        Ok(())
    }

    /// Reads block `addr` (already biased by `sb_block_number`, see §4.2) into
    /// `buf`, which must be at least `block_size` bytes long.
    pub fn read_block(&mut self, addr: u64, buf: &mut [u8]) -> Result<(), Error> {
        let offset = addr * self.block_size as u64;
        self.read_bytes_at(offset, &mut buf[..self.block_size as usize])
    }
}

/// Opens an ext2 image file for reading.
///
/// The reader never writes, so the file is opened read-only even though the CLI
/// declares (unimplemented) write subcommands.
pub fn open_image(path: &std::path::Path) -> Result<File, Error> {
    File::open(path).map_err(Error::from)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_block_with_bias() {
        let mut data = vec![0u8; 4096];
        data[1024..1028].copy_from_slice(&[1, 2, 3, 4]);
        let mut dev = BlockDevice::new(Cursor::new(data), 1024);

        let mut buf = [0u8; 1024];
        dev.read_block(1, &mut buf).unwrap();
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
    }
}
