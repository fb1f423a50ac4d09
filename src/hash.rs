/// Fast 2-value hash with xorshift
#[inline(always)]
pub fn hash2(a: u64, b: u64) -> u64 {
    let mut seed = a.wrapping_mul(2654435761).wrapping_add(b.wrapping_mul(2246822519));
    seed ^= seed << 13;
    seed ^= seed >> 7;
    seed ^= seed << 17;
    seed
}

/// Fast 3-value hash with xorshift
#[inline(always)]
pub fn hash3(a: u64, b: u64, c: u64) -> u64 {
    let mut seed = a
        .wrapping_mul(2654435761)
        .wrapping_add(b.wrapping_mul(2246822519))
        .wrapping_add(c);
    seed ^= seed << 13;
    seed ^= seed >> 7;
    seed ^= seed << 17;
    seed
}

/// Fold a string into a running hash, length included so "ab"+"c" != "a"+"bc"
#[inline]
pub fn hash_str(seed: u64, s: &str) -> u64 {
    let mut h = hash2(seed, s.len() as u64);
    for chunk in s.as_bytes().chunks(8) {
        let mut word = [0u8; 8];
        word[..chunk.len()].copy_from_slice(chunk);
        h = hash2(h, u64::from_le_bytes(word));
    }
    h
}
