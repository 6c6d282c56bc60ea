//! Directory-entry decoding, layered on top of [`BlockStream`].

use crate::blockstream::BlockStream;
use crate::device::RandomAccess;
use crate::error::Error;

/// A directory entry borrowed from the current block.
pub struct DirEntry<'a> {
    pub inode: u32,
    name: &'a [u8],
    file_type_hint: Option<u8>,
}

impl<'a> DirEntry<'a> {
    /// The entry's filename, as raw bytes (ext2 filenames are not guaranteed to
    /// be valid UTF-8).
    pub fn name(&self) -> &'a [u8] {
        self.name
    }

    /// The file-type hint byte, present only when the image's required features
    /// include the directory-entry file-type bit (§3). Nothing in this repo's
    /// directory walk consults it; it is decoded for callers that want it.
    pub fn file_type_hint(&self) -> Option<u8> {
        self.file_type_hint
    }
}

/// Walks the directory entries of a block stream for a directory inode.
///
/// Entries never straddle block boundaries, so unlike [`BlockStream`] this
/// decoder copies each entry's fixed header and name out of the current block
/// into an owned buffer before yielding it, which sidesteps the borrow that
/// would otherwise tie a [`DirEntry`] to the stream's scratch buffer across the
/// next call to [`DirIterator::advance`].
pub struct DirIterator<'a, 'b, D> {
    stream: &'b mut BlockStream<'a, D>,
    has_dir_type: bool,
    offset_within_block: usize,
    current: Vec<u8>,
    done: bool,
}

impl<'a, 'b, D: RandomAccess> DirIterator<'a, 'b, D> {
    /// `has_dir_type` is the image's directory-entry file-type feature bit
    /// (`ExtSuperblock::has_dir_type`), passed by value so this constructor
    /// doesn't need to borrow the `Image` that already lent out `stream`.
    pub fn new(stream: &'b mut BlockStream<'a, D>, has_dir_type: bool) -> Self {
        Self {
            stream,
            has_dir_type,
            offset_within_block: usize::MAX, // forces a pull on the first advance
            current: Vec::new(),
            done: false,
        }
    }

    /// Advances to the next directory entry. Returns `true` if one was loaded,
    /// `false` once the directory is exhausted.
    pub fn advance(&mut self) -> Result<bool, Error> {
        if self.done {
            return Ok(false);
        }
        loop {
            if self.offset_within_block >= self.stream.current().len() {
                if !self.stream.advance()? {
                    self.done = true;
                    return Ok(false);
                }
                self.offset_within_block = 0;
            }

            let block = self.stream.current();
            if self.offset_within_block + 6 > block.len() {
                self.done = true;
                return Ok(false);
            }
            let inode = u32::from_le_bytes(block[self.offset_within_block..self.offset_within_block + 4].try_into().unwrap());
            let rec_len = u16::from_le_bytes(
                block[self.offset_within_block + 4..self.offset_within_block + 6]
                    .try_into()
                    .unwrap(),
            ) as usize;

            if inode == 0 && rec_len == 0 {
                self.done = true;
                return Ok(false);
            }
            if inode == 0 {
                self.offset_within_block += rec_len;
                continue;
            }

            let entry_end = (self.offset_within_block + rec_len).min(block.len());
            self.current = block[self.offset_within_block..entry_end].to_vec();
            self.offset_within_block += rec_len;
            return Ok(true);
        }
    }

    /// The entry loaded by the most recent successful [`DirIterator::advance`].
    pub fn current(&self) -> DirEntry<'_> {
        let inode = u32::from_le_bytes(self.current[0..4].try_into().unwrap());
        let lower_name_length = self.current[6];
        let upper_byte = self.current[7];
        let (name_length, file_type_hint) = if self.has_dir_type {
            (lower_name_length as usize, Some(upper_byte))
        } else {
            (lower_name_length as usize | ((upper_byte as usize) << 8), None)
        };
        let name = &self.current[8..8 + name_length];
        DirEntry { inode, name, file_type_hint }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::BlockDevice;
    use crate::inode::Inode;
    use std::io::Cursor;
    use std::mem;

    fn write_entry(block: &mut [u8], offset: usize, inode: u32, rec_len: u16, name: &[u8], dir_type: Option<u8>) {
        block[offset..offset + 4].copy_from_slice(&inode.to_le_bytes());
        block[offset + 4..offset + 6].copy_from_slice(&rec_len.to_le_bytes());
        block[offset + 6] = name.len() as u8;
        block[offset + 7] = dir_type.unwrap_or(0);
        block[offset + 8..offset + 8 + name.len()].copy_from_slice(name);
    }

    #[test]
    fn walks_two_entries_and_skips_a_tombstone() {
        let block_size = 64u32;
        let mut block = vec![0u8; block_size as usize];
        write_entry(&mut block, 0, 5, 16, b"foo", None);
        // tombstone: inode 0 but a nonzero rec_len to skip over
        write_entry(&mut block, 16, 0, 16, b"", None);
        write_entry(&mut block, 32, 9, 32, b"bar", None);

        let mut data = vec![0u8; block_size as usize * 2];
        data[block_size as usize..block_size as usize * 2].copy_from_slice(&block);
        let mut dev = BlockDevice::new(Cursor::new(data), block_size);

        let mut inode: Inode = unsafe { mem::zeroed() };
        inode.block_pointers[0] = 1;
        inode.disk_sector_count = (block_size / 512).max(1);
        inode.lower_size = block_size;

        let mut stream = BlockStream::new(&mut dev, &inode, 0, 0);
        let mut dir = DirIterator::new(&mut stream, false);

        assert!(dir.advance().unwrap());
        assert_eq!(dir.current().inode, 5);
        assert_eq!(dir.current().name(), b"foo");

        assert!(dir.advance().unwrap());
        assert_eq!(dir.current().inode, 9);
        assert_eq!(dir.current().name(), b"bar");

        assert!(!dir.advance().unwrap());
    }
}
