//! A synthetic in-memory ext2 image builder for integration tests.
//!
//! Grounded on `mkfs::ext2::Ext2Factory::create` (superblock, BGD table, inode
//! table, root inode, in that layout order) but assembled directly into a
//! `Vec<u8>` instead of written to a device file, and extended with the
//! ability to poke arbitrary block pointers (including indirect tiers and
//! holes) so the tier-boundary and sparse-elision scenarios can be built
//! without allocating gigabytes of backing storage. `Ext2Factory::create`
//! never writes `.`/`..`/`lost+found` directory entries (see its trailing
//! `TODO` comments); this builder does, since the directory-completeness
//! invariant depends on them existing.

use std::mem;
use std::mem::size_of;
use std::num::NonZeroU32;

pub const EXT2_SIGNATURE: u16 = 0xef53;
pub const FS_STATE_CLEAN: u16 = 1;
pub const REQUIRED_FEATURE_DIR_TYPE: u32 = 0x2;
pub const INODE_SIZE: usize = 128;
pub const TYPE_DIRECTORY: u16 = 0o040000;
pub const TYPE_FILE: u16 = 0o100000;

/// Builds a single-block-group ext2 image.
pub struct ImageBuilder {
    data: Vec<u8>,
    block_size: u32,
    sb_block_number: u32,
    inode_table_block: u32,
    next_free_block: u32,
    inodes_per_group: u32,
}

impl ImageBuilder {
    /// `total_blocks` must be large enough to hold the superblock region, one
    /// BGD block, the inode table, and every block the test goes on to
    /// allocate with [`ImageBuilder::alloc_block`].
    pub fn new(block_size: u32, total_blocks: u32, inodes_per_group: u32) -> Self {
        let sb_block_number = if block_size == 1024 { 1 } else { 0 };
        let bgd_block = sb_block_number + 1;
        let inode_table_bytes = inodes_per_group as usize * INODE_SIZE;
        let inode_table_blocks = (inode_table_bytes as u32).div_ceil(block_size);
        let inode_table_block = bgd_block + 1;

        let mut builder = Self {
            data: vec![0u8; block_size as usize * total_blocks as usize],
            block_size,
            sb_block_number,
            inode_table_block,
            next_free_block: inode_table_block + inode_table_blocks,
            inodes_per_group,
        };
        builder.write_bgd(inode_table_block);
        builder
    }

    fn block_size_log(&self) -> u32 {
        (self.block_size / 1024).trailing_zeros()
    }

    /// Writes the superblock (and, for `version_major >= 1`, the extended
    /// superblock immediately after it).
    pub fn write_superblock(&mut self, version_major: u32, required_features: u32) {
        let mut sb: extread::superblock::Superblock = unsafe { mem::zeroed() };
        sb.signature = EXT2_SIGNATURE;
        sb.fs_state = FS_STATE_CLEAN;
        sb.sb_block_number = self.sb_block_number;
        sb.block_size_log = self.block_size_log();
        sb.blocks_per_group = (self.data.len() / self.block_size as usize) as u32;
        sb.total_blocks = sb.blocks_per_group;
        sb.inodes_per_group = self.inodes_per_group;
        sb.version_major = version_major;
        let bytes = unsafe {
            std::slice::from_raw_parts(
                &sb as *const _ as *const u8,
                size_of::<extread::superblock::Superblock>(),
            )
        };
        self.data[1024..1024 + bytes.len()].copy_from_slice(bytes);

        if version_major >= 1 {
            let mut ext: extread::superblock::ExtSuperblock = unsafe { mem::zeroed() };
            ext.inode_size = INODE_SIZE as u16;
            ext.required_features = required_features;
            let ext_bytes = unsafe {
                std::slice::from_raw_parts(
                    &ext as *const _ as *const u8,
                    size_of::<extread::superblock::ExtSuperblock>(),
                )
            };
            let off = 1024 + bytes.len();
            self.data[off..off + ext_bytes.len()].copy_from_slice(ext_bytes);
        }
    }

    fn write_bgd(&mut self, inode_table_block: u32) {
        let bgd_off = (self.sb_block_number as usize + 1) * self.block_size as usize;
        self.data[bgd_off + 8..bgd_off + 12].copy_from_slice(&inode_table_block.to_le_bytes());
    }

    /// Writes a 128-byte inode record for `id` (absolute, not group-relative).
    pub fn write_inode(&mut self, id: NonZeroU32, mode: u16, size: u32, block_pointers: [u32; 15]) {
        let index_within_group = id.get() - 1;
        let offset = self.inode_table_block as usize * self.block_size as usize
            + index_within_group as usize * INODE_SIZE;

        let mut inode: extread::inode::Inode = unsafe { mem::zeroed() };
        inode.type_and_permissions = mode;
        inode.lower_size = size;
        inode.hard_link_count = 1;
        inode.disk_sector_count = (size.div_ceil(self.block_size) * self.block_size / 512).max(self.block_size / 512);
        inode.block_pointers = block_pointers;
        let bytes =
            unsafe { std::slice::from_raw_parts(&inode as *const _ as *const u8, size_of::<extread::inode::Inode>()) };
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Allocates the next free absolute block number and returns both the
    /// absolute number (for bookkeeping) and the pointer value to store in an
    /// inode or indirect block (the absolute number minus `sb_block_number`,
    /// since every read biases by that amount).
    pub fn alloc_block(&mut self) -> (u32, u32) {
        let absolute = self.next_free_block;
        self.next_free_block += 1;
        (absolute, absolute - self.sb_block_number)
    }

    /// Writes raw bytes at absolute block `absolute`, zero-padded to a full block.
    pub fn write_block(&mut self, absolute: u32, data: &[u8]) {
        let off = absolute as usize * self.block_size as usize;
        self.data[off..off + data.len()].copy_from_slice(data);
    }

    /// Writes an indirect pointer block: `pointers[i]` goes at 4-byte slot `i`.
    pub fn write_pointer_block(&mut self, absolute: u32, pointers: &[u32]) {
        let mut bytes = vec![0u8; self.block_size as usize];
        for (i, p) in pointers.iter().enumerate() {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&p.to_le_bytes());
        }
        self.write_block(absolute, &bytes);
    }

    /// Writes a directory block containing `entries` (inode id, name), the last
    /// one stretched with `rec_len` to fill the remainder of the block.
    pub fn write_dir_block(&mut self, absolute: u32, entries: &[(u32, &[u8])], has_dir_type: bool) {
        let mut bytes = vec![0u8; self.block_size as usize];
        let mut offset = 0usize;
        for (i, (inode, name)) in entries.iter().enumerate() {
            let header_len = 8 + name.len();
            let rec_len = if i + 1 == entries.len() {
                self.block_size as usize - offset
            } else {
                header_len.div_ceil(4) * 4
            };
            bytes[offset..offset + 4].copy_from_slice(&inode.to_le_bytes());
            bytes[offset + 4..offset + 6].copy_from_slice(&(rec_len as u16).to_le_bytes());
            bytes[offset + 6] = name.len() as u8;
            bytes[offset + 7] = if has_dir_type { 1 } else { 0 };
            bytes[offset + 8..offset + 8 + name.len()].copy_from_slice(name);
            offset += rec_len;
        }
        self.write_block(absolute, &bytes);
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Builds a minimal, well-formed image: root directory (inode 2) containing
/// `.`, `..` and `lost+found` (inode 11, an empty directory).
pub fn minimal_image(block_size: u32) -> Vec<u8> {
    let mut b = ImageBuilder::new(block_size, 16, 32);
    b.write_superblock(1, 0);

    let (root_abs, root_ptr) = b.alloc_block();
    let (lf_abs, lf_ptr) = b.alloc_block();

    b.write_dir_block(
        root_abs,
        &[(2, b"."), (2, b".."), (11, b"lost+found")],
        true,
    );
    b.write_dir_block(lf_abs, &[(11, b"."), (2, b"..")], true);

    let mut root_ptrs = [0u32; 15];
    root_ptrs[0] = root_ptr;
    b.write_inode(extread::inode::ROOT_INODE, TYPE_DIRECTORY | 0o755, block_size, root_ptrs);

    let mut lf_ptrs = [0u32; 15];
    lf_ptrs[0] = lf_ptr;
    b.write_inode(NonZeroU32::new(11).unwrap(), TYPE_DIRECTORY | 0o755, block_size, lf_ptrs);

    b.into_bytes()
}
