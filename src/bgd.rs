//! The block-group descriptor table.

use crate::device::BlockDevice;
use crate::device::RandomAccess;
use crate::error::Error;
use std::mem;
use std::mem::size_of;
use std::slice;

/// One block-group descriptor. Only `inode_table_block` is used by this reader;
/// the bitmap addresses and free counters are kept for record fidelity (mirroring
/// `mkfs::ext2::BlockGroupDescriptor`) but have no reader in this repo since nothing
/// here allocates or frees blocks or inodes.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug)]
pub struct BlockGroupDescriptor {
    pub block_bitmap_block: u32,
    pub inode_bitmap_block: u32,
    pub inode_table_block: u32,
    pub unallocated_blocks: u16,
    pub unallocated_inodes: u16,
    pub directories_count: u16,
    pub _padding: [u8; 14],
}

impl BlockGroupDescriptor {
    fn decode(bytes: &[u8]) -> Self {
        assert_eq!(bytes.len(), size_of::<Self>());
        let mut bgd: Self = unsafe { mem::zeroed() };
        let dst = unsafe { slice::from_raw_parts_mut(&mut bgd as *mut _ as *mut u8, size_of::<Self>()) };
        dst.copy_from_slice(bytes);
        bgd
    }
}

/// The full block-group descriptor array for an image.
#[derive(Debug)]
pub struct BgdTable {
    groups: Vec<BlockGroupDescriptor>,
}

impl BgdTable {
    /// Reads the BGD table, which starts at block `sb_block_number + 1` and spans
    /// `group_count * size_of::<BlockGroupDescriptor>()` bytes (§4.3).
    pub fn read<D: RandomAccess>(
        dev: &mut BlockDevice<D>,
        sb_block_number: u32,
        group_count: u32,
    ) -> Result<Self, Error> {
        let start_block = sb_block_number as u64 + 1;
        let entry_size = size_of::<BlockGroupDescriptor>();
        let total_bytes = group_count as usize * entry_size;
        let mut raw = vec![0u8; total_bytes];
        dev.read_bytes_at(start_block * dev.block_size() as u64, &mut raw)?;

        let groups = raw
            .chunks_exact(entry_size)
            .map(BlockGroupDescriptor::decode)
            .collect();
        Ok(Self { groups })
    }

    /// Returns the descriptor for block group `i`, or `None` if out of range.
    pub fn get(&self, i: u32) -> Option<&BlockGroupDescriptor> {
        self.groups.get(i as usize)
    }

    /// The number of groups in the table.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the table has no groups (never true for a valid image).
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
