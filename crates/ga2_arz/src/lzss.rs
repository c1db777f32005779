//! Ring buffer LZSS coder shared by compression and decompression.

pub(crate) const RING_SIZE: usize = 0x1000;
const RING_MASK: usize = RING_SIZE - 1;
pub(crate) const RING_INIT: usize = 0xFEE;

pub(crate) const MIN_MATCH: usize = 3;
pub(crate) const MAX_MATCH: usize = 18;

/// Candidates visited per position before settling on the best match so far
const MAX_PROBES: usize = 128;

const NIL: u32 = u32::MAX;

/// Decode an LZSS token stream, producing at most `limit` bytes.
///
/// Decoding stops early when the input runs out; the caller compares the output length with the
/// size it expected.
pub(crate) fn decode(mut input: impl Iterator<Item = u8>, limit: usize) -> Vec<u8> {
    let mut window = [0u8; RING_SIZE];
    let mut cursor = RING_INIT;
    let mut output = Vec::with_capacity(limit);
    let mut flags: u32 = 0;

    while output.len() < limit {
        flags >>= 1;
        if flags & 0x100 == 0 {
            let Some(flag_byte) = input.next() else {
                break;
            };
            flags = 0xFF00 | flag_byte as u32;
        }

        if flags & 1 != 0 {
            let Some(literal) = input.next() else {
                break;
            };
            window[cursor] = literal;
            output.push(literal);
            cursor = (cursor + 1) & RING_MASK;
            continue;
        }

        let (Some(lo), Some(hi)) = (input.next(), input.next()) else {
            break;
        };
        let mut offset = lo as usize | ((hi as usize & 0xF0) << 4);
        let length = (hi as usize & 0x0F) + MIN_MATCH;

        for _ in 0..length {
            let value = window[offset & RING_MASK];
            window[cursor] = value;
            if output.len() < limit {
                output.push(value);
            }
            offset += 1;
            cursor = (cursor + 1) & RING_MASK;
        }
    }

    output
}

/// Hash chains over two byte prefixes, pointing back into the source.
struct MatchFinder {
    head: Vec<u32>,
    chain: Vec<u32>,
}

impl MatchFinder {
    fn new() -> Self {
        Self {
            head: vec![NIL; 0x10000],
            chain: vec![NIL; RING_SIZE],
        }
    }

    fn key(source: &[u8], at: usize) -> usize {
        (source[at] as usize) << 8 | source[at + 1] as usize
    }

    /// Register position `at`, which must have a successor byte.
    fn insert(&mut self, source: &[u8], at: usize) {
        let key = Self::key(source, at);
        self.chain[at & RING_MASK] = self.head[key];
        self.head[key] = at as u32;
    }

    /// Longest earlier match for `source[at..]`, as `(length, position)`.
    fn longest(&self, source: &[u8], at: usize) -> (usize, usize) {
        if at + 1 >= source.len() {
            return (0, 0);
        }

        let (mut best_len, mut best_pos) = (0, 0);
        let mut candidate = self.head[Self::key(source, at)];
        let mut probes = MAX_PROBES;

        while candidate != NIL && probes > 0 {
            let position = candidate as usize;
            if at - position > RING_SIZE {
                break;
            }
            probes -= 1;

            let length = source[position..]
                .iter()
                .zip(&source[at..])
                .take(MAX_MATCH)
                .take_while(|(a, b)| a == b)
                .count();

            if length > best_len {
                best_len = length;
                best_pos = position;
                if length == MAX_MATCH {
                    break;
                }
            }

            candidate = self.chain[position & RING_MASK];
        }

        (best_len, best_pos)
    }
}

/// Greedy LZSS encoding of `source`.
pub(crate) fn encode(source: &[u8]) -> Vec<u8> {
    let len = source.len();
    let mut output = Vec::with_capacity(len + (len >> 3) + 16);
    if len == 0 {
        return output;
    }

    let mut finder = MatchFinder::new();
    let mut at = 0;

    while at < len {
        let flag_index = output.len();
        output.push(0);
        let mut flags = 0u8;

        for bit in 0..8 {
            if at >= len {
                break;
            }

            let (length, position) = finder.longest(source, at);
            if length >= MIN_MATCH {
                let offset = (RING_INIT + position) & RING_MASK;
                output.push(offset as u8);
                output.push(((offset >> 4) & 0xF0) as u8 | (length - MIN_MATCH) as u8);

                for step in at..at + length {
                    if step + 1 >= len {
                        break;
                    }
                    finder.insert(source, step);
                }
                at += length;
            } else {
                flags |= 1 << bit;
                if at + 1 < len {
                    finder.insert(source, at);
                }
                output.push(source[at]);
                at += 1;
            }
        }

        output[flag_index] = flags;
    }

    output
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{decode, encode};

    #[test]
    fn encode_repeated_pattern() {
        #[rustfmt::skip]
        let expected = vec![
            // Flags: three literals then a reference
            0x07,
            0x61, 0x62, 0x63,
            // Offset 0xFEE, length 9
            0xEE, 0xF6,
        ];

        assert_eq!(encode(b"abcabcabcabc"), expected);
    }

    #[test]
    fn decode_overlapping_reference() {
        let input = [0x07, 0x61, 0x62, 0x63, 0xEE, 0xF6];
        assert_eq!(decode(input.into_iter(), 12), b"abcabcabcabc");
    }

    #[test]
    fn decode_respects_limit() {
        let input = [0x07, 0x61, 0x62, 0x63, 0xEE, 0xF6];
        assert_eq!(decode(input.into_iter(), 5), b"abcab");
    }

    #[test]
    fn decode_stops_on_truncated_reference() {
        let input = [0x07, 0x61, 0x62, 0x63, 0xEE];
        assert_eq!(decode(input.into_iter(), 12), b"abc");
    }

    #[test]
    fn decode_reads_zeroed_window() {
        // A reference before anything was written copies the zero filled window
        let input = [0x00, 0x00, 0x00];
        assert_eq!(decode(input.into_iter(), 3), vec![0, 0, 0]);
    }

    #[test]
    fn encode_long_run_uses_maximum_matches() {
        let source = vec![0x55u8; 1000];
        let encoded = encode(&source);
        assert!(encoded.len() < 200);
        assert_eq!(decode(encoded.into_iter(), source.len()), source);
    }

    #[test]
    fn encode_round_trips_beyond_window_size() {
        let mut source: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 251) as u8).collect();
        let prefix = source[..64].to_vec();
        source.extend_from_slice(&prefix);

        let encoded = encode(&source);
        assert_eq!(decode(encoded.into_iter(), source.len()), source);
    }
}
