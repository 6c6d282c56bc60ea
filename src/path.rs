//! Host-path splitting: turning the CLI's path argument into the ordered
//! component list the resolver in `image.rs` consumes.
//!
//! This is host-path work, not filesystem work — it never touches the image —
//! so it lives as a free function rather than a method on [`crate::image::Image`],
//! mirroring how `original_source/src/filesystem.cpp::get_inode_from_path` leans
//! on `std::filesystem::path`'s own iteration instead of writing path-splitting
//! logic itself.

use crate::error::Error;

/// Splits an absolute path into its non-empty components, normalizing away
/// repeated `/` separators and a trailing `/`.
///
/// Returns [`Error::InvalidArgument`] if `path` does not start with `/`.
pub fn split_components(path: &str) -> Result<Vec<&str>, Error> {
    if !path.starts_with('/') {
        return Err(Error::InvalidArgument(format!("path {path:?} is not absolute")));
    }
    Ok(path.split('/').filter(|segment| !segment.is_empty()).collect())
}
