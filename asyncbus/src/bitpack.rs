/// Pack an ordered sequence of bits into an integer. The first bit is the
/// least significant. At most 64 bits fit.
pub fn bitpack(bits: &[bool]) -> u64 {
    debug_assert!(bits.len() <= 64, "cannot pack {} bits into a u64", bits.len());
    bits.iter()
        .enumerate()
        .fold(0, |value, (i, &bit)| value | (bit as u64) << i)
}
