//! Small integer helpers shared across the on-disk record decoders.

/// Ceiling integer division: `ceil(numerator / denominator)`.
///
/// Used throughout the corpus this crate is built from (block/inode bitmap
/// sizing, page counts, block counts) wherever a byte or element count has to
/// be rounded up to a whole unit; here it is `Superblock::group_count`'s basis.
pub fn ceil_division(numerator: u64, denominator: u64) -> u64 {
    (numerator + denominator - 1) / denominator
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rounds_up_on_remainder() {
        assert_eq!(ceil_division(10, 3), 4);
        assert_eq!(ceil_division(9, 3), 3);
        assert_eq!(ceil_division(0, 3), 0);
    }
}
