//! The tiered direct/IND/DIND/TIND block-pointer walker.
//!
//! Ported from the only place in either source tree that actually implements this:
//! `original_source/src/inode.cpp`'s `InodeIterator`. The triple-indirect branch
//! here resolves the L2 pointer out of the just-read TIND root block rather than
//! (as that C++ does) re-indexing `inode.block_pointers` with an index that can run
//! past its 15 slots; see `DESIGN.md`. Sparse intermediate pointers (a zero IND/DIND/
//! TIND root, or a zero L1/L2 entry) are treated the same as a zero leaf pointer:
//! the whole subtree they would have addressed is elided rather than read as block 0.

use crate::device::BlockDevice;
use crate::device::RandomAccess;
use crate::error::Error;
use crate::inode::DIND_BLOCK;
use crate::inode::IND_BLOCK;
use crate::inode::Inode;
use crate::inode::N_BLOCKS;
use crate::inode::TIND_BLOCK;

/// A lazy, single-pass sequence of an inode's data blocks.
///
/// Every advance overwrites the internal scratch buffer, including the
/// overwrites used to walk indirect pointer blocks, so a span returned by
/// [`BlockStream::current`] is only valid until the next call to
/// [`BlockStream::advance`].
#[derive(Debug)]
pub struct BlockStream<'a, D> {
    dev: &'a mut BlockDevice<D>,
    sb_block_number: u32,
    block_size: u32,
    block_pointers: [u32; N_BLOCKS],
    size_in_bytes: u64,
    /// Logical slot budget: total physical blocks (data + indirect) attached to
    /// the inode, per `disk_sector_count * 512 / block_size`.
    n: u64,
    /// -1 before the first advance, or once exhausted.
    counter: i64,
    scratch: Vec<u8>,
    current_len: usize,
}

impl<'a, D: RandomAccess> BlockStream<'a, D> {
    pub fn new(dev: &'a mut BlockDevice<D>, inode: &Inode, version_major: u32, sb_block_number: u32) -> Self {
        let block_size = dev.block_size();
        let disk_sector_count = inode.disk_sector_count;
        Self {
            dev,
            sb_block_number,
            block_size,
            block_pointers: inode.block_pointers,
            size_in_bytes: inode.size(version_major),
            n: disk_sector_count as u64 * 512 / block_size as u64,
            counter: -1,
            scratch: vec![0u8; block_size as usize],
            current_len: 0,
        }
    }

    /// Advances to the next data block, skipping sparse holes. Returns `true` if
    /// a block was loaded into the scratch buffer, `false` if the stream is now
    /// exhausted.
    pub fn advance(&mut self) -> Result<bool, Error> {
        loop {
            let candidate = self.counter + 1;
            if candidate < 0 || candidate as u64 >= self.n {
                self.counter = -1;
                return Ok(false);
            }
            let c = candidate as u64;
            let pointer = self.resolve_pointer(c)?;
            self.counter = candidate;
            if pointer == 0 {
                continue;
            }
            self.read_physical(pointer)?;
            self.current_len = self.required_len(c);
            return Ok(true);
        }
    }

    /// The span loaded by the most recent successful [`BlockStream::advance`].
    pub fn current(&self) -> &[u8] {
        &self.scratch[..self.current_len]
    }

    /// Whether the stream has no more blocks to offer.
    pub fn is_done(&self) -> bool {
        self.counter < 0
    }

    fn read_physical(&mut self, block: u32) -> Result<(), Error> {
        let addr = self.sb_block_number as u64 + block as u64;
        self.dev.read_block(addr, &mut self.scratch)
    }

    fn ptr_at(&self, idx: usize) -> u32 {
        let off = idx * 4;
        u32::from_le_bytes(self.scratch[off..off + 4].try_into().unwrap())
    }

    /// Maps logical slot `c` to its physical block pointer, per §4.5's tier table.
    /// Returns 0 for any slot whose data (or an ancestor indirect block) is a
    /// sparse hole.
    fn resolve_pointer(&mut self, c: u64) -> Result<u32, Error> {
        if c < 12 {
            return Ok(self.block_pointers[c as usize]);
        }
        let p = (self.block_size / 4) as u64;
        let last_ind = 12 + p;
        let last_dind = last_ind + p * p;
        let last_tind = last_dind + p * p * p;

        if c < last_ind {
            let idx = c - 12;
            let ind = self.block_pointers[IND_BLOCK];
            if ind == 0 {
                return Ok(0);
            }
            self.read_physical(ind)?;
            return Ok(self.ptr_at(idx as usize));
        }
        if c < last_dind {
            let j = c - last_ind;
            let dind = self.block_pointers[DIND_BLOCK];
            if dind == 0 {
                return Ok(0);
            }
            self.read_physical(dind)?;
            let l1 = self.ptr_at((j / p) as usize);
            if l1 == 0 {
                return Ok(0);
            }
            self.read_physical(l1)?;
            return Ok(self.ptr_at((j % p) as usize));
        }
        if c < last_tind {
            let j = c - last_dind;
            let tind = self.block_pointers[TIND_BLOCK];
            if tind == 0 {
                return Ok(0);
            }
            self.read_physical(tind)?;
            let l2 = self.ptr_at((j / (p * p)) as usize);
            if l2 == 0 {
                return Ok(0);
            }
            self.read_physical(l2)?;
            let l1 = self.ptr_at(((j / p) % p) as usize);
            if l1 == 0 {
                return Ok(0);
            }
            self.read_physical(l1)?;
            return Ok(self.ptr_at((j % p) as usize));
        }
        Err(Error::FileTooLarge)
    }

    /// Cumulative count of indirect pointer blocks consumed from the budget to
    /// reach and include slot `c`: one for entering indirect addressing at all,
    /// plus one per distinct L1 block, plus (in the TIND tier) one per distinct
    /// L2 block.
    fn indirect_blocks_consumed(&self, c: u64) -> u64 {
        let p = (self.block_size / 4) as u64;
        let last_ind = 12 + p;
        let last_dind = last_ind + p * p;
        let last_tind = last_dind + p * p * p;

        if c < 12 {
            0
        } else if c < last_ind {
            1
        } else if c < last_dind {
            let j = c - last_ind;
            1 + (j / p + 1)
        } else if c < last_tind {
            let j = c - last_dind;
            1 + (j / (p * p) + 1) + (j / p + 1)
        } else {
            0
        }
    }

    /// The number of valid bytes in the scratch buffer after loading slot `c`:
    /// `block_size` unless `c` is the last data slot, in which case it is the
    /// byte remainder of the inode's size (or a full block if that remainder is 0).
    fn required_len(&self, c: u64) -> usize {
        let consumed = self.indirect_blocks_consumed(c);
        if c + 1 != self.n.saturating_sub(consumed) {
            return self.block_size as usize;
        }
        let remainder = (self.size_in_bytes % self.block_size as u64) as usize;
        if remainder == 0 {
            self.block_size as usize
        } else {
            remainder
        }
    }
}

impl<'a, D> PartialEq for BlockStream<'a, D> {
    fn eq(&self, other: &Self) -> bool {
        match (self.counter, other.counter) {
            (a, b) if a < 0 && b < 0 => true,
            (a, b) => a == b,
        }
    }
}
