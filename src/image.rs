//! The mounted image: ties the device, superblocks, BGD table and path
//! resolver together, mirroring `original_source/src/filesystem.hpp`'s
//! `Filesystem` class (constructor does the mount-time work; methods hand back
//! views that borrow it).

use crate::blockstream::BlockStream;
use crate::device::BlockDevice;
use crate::device::RandomAccess;
use crate::dirent::DirIterator;
use crate::error::Error;
use crate::error::ForcePolicy;
use crate::inode::Inode;
use crate::inode::ROOT_INODE;
use crate::path;
use crate::superblock;
use crate::bgd::BgdTable;
use crate::superblock::ExtSuperblock;
use crate::superblock::Superblock;
use std::mem::size_of;
use std::num::NonZeroU32;

/// A mounted ext2 image.
#[derive(Debug)]
pub struct Image<D> {
    device: BlockDevice<D>,
    superblock: Superblock,
    ext_superblock: Option<ExtSuperblock>,
    bgds: BgdTable,
}

impl<D: RandomAccess> Image<D> {
    /// Mounts an image: reads and validates the superblock(s), then the block-
    /// group descriptor table. `policy` governs whether validation failures
    /// marked forcible (§7) are suppressed.
    pub fn mount(mut dev: D, policy: &ForcePolicy) -> Result<Self, Error> {
        let mut raw_sb = vec![0u8; size_of::<Superblock>()];
        dev.read_exact_at(superblock::SUPERBLOCK_OFFSET, &mut raw_sb)?;
        let sb = Superblock::decode(&raw_sb);

        let ext_superblock = if sb.version_major >= 1 {
            let mut raw_ext = vec![0u8; size_of::<ExtSuperblock>()];
            let ext_offset = superblock::SUPERBLOCK_OFFSET + size_of::<Superblock>() as u64;
            dev.read_exact_at(ext_offset, &mut raw_ext)?;
            Some(ExtSuperblock::decode(&raw_ext))
        } else {
            None
        };

        superblock::validate_all(&sb, ext_superblock.as_ref(), policy, superblock::now_unix())?;

        let block_size = sb.block_size();
        let mut device = BlockDevice::new(dev, block_size);
        let bgds = BgdTable::read(&mut device, sb.sb_block_number, sb.group_count())?;

        Ok(Self { device, superblock: sb, ext_superblock, bgds })
    }

    fn inode_size(&self) -> usize {
        match self.ext_superblock {
            Some(ext) if ext.inode_size != 0 => ext.inode_size as usize,
            _ => 128,
        }
    }

    /// Whether directory entries in this image carry a file-type byte (§3).
    pub fn has_dir_type(&self) -> bool {
        self.ext_superblock.map(|ext| ext.has_dir_type()).unwrap_or(false)
    }

    /// Reads the inode numbered `inode_id`, per §4.4's group/offset arithmetic.
    pub fn read_inode(&mut self, inode_id: NonZeroU32) -> Result<Inode, Error> {
        let id = inode_id.get() - 1;
        let inodes_per_group = self.superblock.inodes_per_group;
        let group = id / inodes_per_group;
        let index_within_group = id % inodes_per_group;

        let bgd = self
            .bgds
            .get(group)
            .ok_or_else(|| Error::FormatMismatch(format!("inode {} has no matching block group", inode_id.get())))?;

        let byte_offset = (self.superblock.sb_block_number as u64 + bgd.inode_table_block as u64)
            * self.device.block_size() as u64
            + index_within_group as u64 * self.inode_size() as u64;

        let mut raw = vec![0u8; size_of::<Inode>()];
        self.device.read_bytes_at(byte_offset, &mut raw)?;
        Ok(Inode::decode(&raw))
    }

    /// Opens a block stream over `inode`'s data.
    pub fn blocks<'a>(&'a mut self, inode: &Inode) -> BlockStream<'a, D> {
        BlockStream::new(&mut self.device, inode, self.superblock.version_major, self.superblock.sb_block_number)
    }

    /// Opens a directory-entry iterator over `stream`. A free-standing
    /// associate function rather than a `&self` method: an active `stream`
    /// already holds the exclusive borrow `blocks` took out on this image, and
    /// `has_dir_type` is cheap to read beforehand (see [`Image::has_dir_type`]).
    pub fn entries<'a, 'b>(stream: &'b mut BlockStream<'a, D>, has_dir_type: bool) -> DirIterator<'a, 'b, D> {
        DirIterator::new(stream, has_dir_type)
    }

    /// Resolves an absolute path to its inode, starting from the root
    /// directory and scanning one path component at a time (§4.7).
    pub fn resolve(&mut self, path: &str) -> Result<Inode, Error> {
        let components = path::split_components(path)?;
        let mut inode = self.read_inode(ROOT_INODE)?;

        for component in components {
            if !inode.is_directory() {
                return Err(Error::NotFound);
            }

            let has_dir_type = self.has_dir_type();
            let version_major = self.superblock.version_major;
            let sb_block_number = self.superblock.sb_block_number;

            let matched = {
                let mut stream = BlockStream::new(&mut self.device, &inode, version_major, sb_block_number);
                let mut dir = DirIterator::new(&mut stream, has_dir_type);
                let mut matched = None;
                while dir.advance()? {
                    let entry = dir.current();
                    if entry.name() == component.as_bytes() {
                        matched = Some(entry.inode);
                        break;
                    }
                }
                matched
            };

            let inode_id = matched.and_then(NonZeroU32::new).ok_or(Error::NotFound)?;
            inode = self.read_inode(inode_id)?;
        }

        Ok(inode)
    }
}
