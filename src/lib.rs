//! A user-space reader for ext2 filesystem images: mounts an image file,
//! resolves absolute paths, lists directories, and streams file contents,
//! all without going through a kernel filesystem driver.

pub mod blockstream;
pub mod device;
pub mod dirent;
pub mod error;
pub mod bgd;
pub mod image;
pub mod inode;
pub mod path;
pub mod superblock;
pub mod util;
