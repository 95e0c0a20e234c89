//! Hash primitives shared by the ready-made dictionary types.
//!
//! All functions return 32-bit hashes; the dictionary widens them to `u64`
//! before masking. Only [`gen_hash`] and [`gen_case_hash`] consume the seed
//! held by [`DictConfig`](crate::config::DictConfig).

/// Seed used by the byte hashes until a caller installs another one.
pub const DEFAULT_HASH_SEED: u32 = 5381;

/// Thomas Wang's 32 bit integer mix.
pub fn int_hash(key: u32) -> u32 {
    let mut key = key;
    key = key.wrapping_add(!(key << 15));
    key ^= key >> 10;
    key = key.wrapping_add(key << 3);
    key ^= key >> 6;
    key = key.wrapping_add(!(key << 11));
    key ^= key >> 16;
    key
}

/// Identity hash for integer keys that are already well distributed.
#[inline]
pub fn identity_hash(key: u32) -> u32 {
    key
}

/// Seeded MurmurHash2 over an arbitrary byte sequence.
///
/// Words are read little-endian so the result does not depend on the host.
pub fn gen_hash(data: &[u8], seed: u32) -> u32 {
    const M: u32 = 0x5bd1_e995;
    const R: u32 = 24;

    let mut h = seed ^ (data.len() as u32);

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);

        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        if tail.len() >= 3 {
            h ^= u32::from(tail[2]) << 16;
        }
        if tail.len() >= 2 {
            h ^= u32::from(tail[1]) << 8;
        }
        h ^= u32::from(tail[0]);
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;
    h
}

/// Case-insensitive djb-style hash (`hash * 33 + lower(c)`), seeded.
pub fn gen_case_hash(data: &[u8], seed: u32) -> u32 {
    data.iter().fold(seed, |h, &c| {
        (h << 5)
            .wrapping_add(h)
            .wrapping_add(u32::from(c.to_ascii_lowercase()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_hash_mixes_and_is_deterministic() {
        assert_eq!(int_hash(42), int_hash(42));
        assert_ne!(int_hash(1), int_hash(2));
        assert_ne!(int_hash(1), 1);
    }

    #[test]
    fn identity_hash_is_identity() {
        for k in [0u32, 1, 7, u32::MAX] {
            assert_eq!(identity_hash(k), k);
        }
    }

    #[test]
    fn gen_hash_empty_input_depends_only_on_seed() {
        assert_eq!(gen_hash(b"", 1), gen_hash(b"", 1));
        assert_ne!(gen_hash(b"", 1), gen_hash(b"", 2));
    }

    /// Every tail length (0..=3) feeds into the result: appending a byte
    /// always changes the hash for these inputs.
    #[test]
    fn gen_hash_covers_tail_bytes() {
        let inputs: [&[u8]; 5] = [b"abcd", b"abcde", b"abcdef", b"abcdefg", b"abcdefgh"];
        let hashes: Vec<u32> = inputs.iter().map(|s| gen_hash(s, DEFAULT_HASH_SEED)).collect();
        for w in hashes.windows(2) {
            assert_ne!(w[0], w[1]);
        }
    }

    #[test]
    fn gen_hash_changes_with_seed() {
        assert_ne!(gen_hash(b"key", 5381), gen_hash(b"key", 5382));
    }

    #[test]
    fn gen_case_hash_ignores_ascii_case() {
        let seed = DEFAULT_HASH_SEED;
        assert_eq!(gen_case_hash(b"Hello", seed), gen_case_hash(b"hELLO", seed));
        assert_ne!(gen_case_hash(b"hello", seed), gen_case_hash(b"hellp", seed));
    }

    #[test]
    fn gen_case_hash_is_djb_over_lowercase() {
        let seed = 5381u32;
        let expected = seed.wrapping_mul(33).wrapping_add(u32::from(b'a'));
        assert_eq!(gen_case_hash(b"A", seed), expected);
    }
}
