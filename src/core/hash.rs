//! Symbol hashing for asset names
//!
//! Type and instance names are turned into 32-bit ids with FastHash, a
//! SuperFastHash variant seeded with the input length. Instance names are
//! case-insensitive (ASCII lowercased before hashing), type names are not.

/// FastHash of raw bytes
pub fn fast_hash(data: &[u8]) -> u32 {
    let mut hash = data.len() as u32;
    if data.is_empty() {
        return 0;
    }

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        hash = hash.wrapping_add(u16::from_le_bytes([chunk[0], chunk[1]]) as u32);
        let tmp = ((u16::from_le_bytes([chunk[2], chunk[3]]) as u32) << 11) ^ hash;
        hash = (hash << 16) ^ tmp;
        hash = hash.wrapping_add(hash >> 11);
    }

    // Tail bytes are sign-extended like the reference C implementation
    let tail = chunks.remainder();
    match tail.len() {
        3 => {
            hash = hash.wrapping_add(u16::from_le_bytes([tail[0], tail[1]]) as u32);
            hash ^= hash << 16;
            hash ^= ((tail[2] as i8 as i32) << 18) as u32;
            hash = hash.wrapping_add(hash >> 11);
        }
        2 => {
            hash = hash.wrapping_add(u16::from_le_bytes([tail[0], tail[1]]) as u32);
            hash ^= hash << 11;
            hash = hash.wrapping_add(hash >> 17);
        }
        1 => {
            hash = hash.wrapping_add(tail[0] as i8 as i32 as u32);
            hash ^= hash << 10;
            hash = hash.wrapping_add(hash >> 1);
        }
        _ => {}
    }

    hash ^= hash << 3;
    hash = hash.wrapping_add(hash >> 5);
    hash ^= hash << 4;
    hash = hash.wrapping_add(hash >> 17);
    hash ^= hash << 25;
    hash = hash.wrapping_add(hash >> 6);
    hash
}

/// Hash a symbol exactly as written (type names)
pub fn case_sensitive_symbol_hash(symbol: &str) -> u32 {
    fast_hash(symbol.as_bytes())
}

/// Hash a symbol ignoring ASCII case (instance names)
pub fn case_insensitive_symbol_hash(symbol: &str) -> u32 {
    fast_hash(symbol.to_ascii_lowercase().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_hashes_to_zero() {
        assert_eq!(fast_hash(b""), 0);
    }

    #[test]
    fn test_deterministic() {
        let first = case_sensitive_symbol_hash("GameObject");
        for _ in 0..10 {
            assert_eq!(case_sensitive_symbol_hash("GameObject"), first);
        }
    }

    #[test]
    fn test_case_sensitivity() {
        assert_ne!(
            case_sensitive_symbol_hash("Texture"),
            case_sensitive_symbol_hash("texture")
        );
        assert_eq!(
            case_insensitive_symbol_hash("AlienTank"),
            case_insensitive_symbol_hash("alientank")
        );
        assert_eq!(
            case_insensitive_symbol_hash("ALIENTANK"),
            case_sensitive_symbol_hash("alientank")
        );
    }

    #[test]
    fn test_every_tail_length_differs() {
        // 4, 5, 6 and 7 bytes exercise the full-block path and each tail branch
        let hashes: Vec<u32> = ["abcd", "abcde", "abcdef", "abcdefg"]
            .iter()
            .map(|s| fast_hash(s.as_bytes()))
            .collect();
        for i in 0..hashes.len() {
            for j in (i + 1)..hashes.len() {
                assert_ne!(hashes[i], hashes[j]);
            }
        }
    }
}
