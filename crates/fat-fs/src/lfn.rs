//! Long file name encode/decode (§4.7 "LFN decoding"/"LFN encoding"),
//! grounded on `original_source/kernel/fs/fatfs.c`'s fragment byte offsets
//! and the standard FAT rotate-and-add short-name checksum.
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::layout::{ATTR_LFN, DIR_ENTRY_SIZE};

/// Byte offsets of the five UTF-16LE characters in the first group of an
/// LFN fragment.
const CHARS_GROUP1: [usize; 5] = [1, 3, 5, 7, 9];
/// The next six characters.
const CHARS_GROUP2: [usize; 6] = [14, 16, 18, 20, 22, 24];
/// The final two characters.
const CHARS_GROUP3: [usize; 2] = [28, 30];
const CHARS_PER_FRAGMENT: usize = 13;

/// Low 6 bits of an LFN fragment's byte 0: its 1-based order.
const ORDER_MASK: u8 = 0x3F;
/// Bit 0x40: this fragment is the last (highest-numbered) one, which is
/// the first fragment physically encountered since LFNs precede their 8.3
/// entry in reverse order.
const LAST_FLAG: u8 = 0x40;

fn is_legal_short_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "$%'-_@~`!(){}^#&".contains(c)
}

/// Strip spaces, collapse/trim dots, then split into (base, extension),
/// each sanitized to uppercase with illegal 8.3 characters mapped to `_`
/// and truncated to 6/3 characters respectively (§4.7 encoding step 1).
pub fn derive_base_ext(long_name: &str) -> (String, String) {
    let no_spaces: String = long_name.chars().filter(|&c| c != ' ').collect();
    let trimmed = no_spaces.trim_matches('.');

    let mut collapsed = String::new();
    let mut last_was_dot = false;
    for c in trimmed.chars() {
        if c == '.' {
            if last_was_dot {
                continue;
            }
            last_was_dot = true;
        } else {
            last_was_dot = false;
        }
        collapsed.push(c);
    }

    let (base, ext) = match collapsed.rfind('.') {
        Some(idx) => (String::from(&collapsed[..idx]), String::from(&collapsed[idx + 1..])),
        None => (collapsed.clone(), String::new()),
    };

    (sanitize(&base, 6), sanitize(&ext, 3))
}

fn sanitize(s: &str, max_chars: usize) -> String {
    let mut out = String::new();
    for c in s.chars() {
        if out.chars().count() >= max_chars {
            break;
        }
        let up = c.to_ascii_uppercase();
        out.push(if is_legal_short_char(up) { up } else { '_' });
    }
    out
}

/// Build the 11-byte short name for collision attempt `n` (1-based):
/// `base` truncated just enough to fit `-N`, space-padded to 8, plus the
/// 3-byte extension (§4.7 encoding step 2).
pub fn short_name_for_attempt(base: &str, ext: &str, n: u32) -> [u8; 11] {
    let suffix = format!("-{n}");
    let keep = (8usize.saturating_sub(suffix.len())).min(base.len());

    let mut name8 = [b' '; 8];
    name8[..keep].copy_from_slice(&base.as_bytes()[..keep]);
    name8[keep..keep + suffix.len()].copy_from_slice(suffix.as_bytes());

    let mut out = [b' '; 11];
    out[..8].copy_from_slice(&name8);
    let extlen = ext.len().min(3);
    out[8..8 + extlen].copy_from_slice(&ext.as_bytes()[..extlen]);
    out
}

/// FAT's rotate-and-add short-name checksum (§4.7 encoding step 3),
/// stored in byte 13 of every LFN fragment belonging to one 8.3 entry.
pub fn short_name_checksum(short_name: &[u8; 11]) -> u8 {
    let mut sum: u8 = 0;
    for &b in short_name {
        sum = (sum >> 1) | ((sum & 1) << 7);
        sum = sum.wrapping_add(b);
    }
    sum
}

/// Encode `long_name` into its LFN fragment records, already in the order
/// they're written to disk: highest-numbered fragment first, each OR'd
/// with `LAST_FLAG` on the last-in-sequence one (which is this function's
/// *first* output record) (§4.7 encoding step 4).
pub fn encode_fragments(long_name: &str, checksum: u8) -> Vec<[u8; DIR_ENTRY_SIZE]> {
    let units: Vec<u16> = long_name.encode_utf16().collect();
    let num_fragments = (units.len() + CHARS_PER_FRAGMENT - 1) / CHARS_PER_FRAGMENT;
    let num_fragments = num_fragments.max(1);

    let mut fragments = Vec::with_capacity(num_fragments);
    for frag_idx in 0..num_fragments {
        let order = frag_idx + 1;
        let start = frag_idx * CHARS_PER_FRAGMENT;

        let mut chars = [0xFFFFu16; CHARS_PER_FRAGMENT];
        for i in 0..CHARS_PER_FRAGMENT {
            if start + i < units.len() {
                chars[i] = units[start + i];
            } else if start + i == units.len() {
                chars[i] = 0x0000;
            }
        }

        let mut buf = [0u8; DIR_ENTRY_SIZE];
        buf[0] = order as u8;
        if frag_idx == num_fragments - 1 {
            buf[0] |= LAST_FLAG;
        }
        buf[11] = ATTR_LFN;
        buf[13] = checksum;
        for (i, &off) in CHARS_GROUP1.iter().enumerate() {
            buf[off..off + 2].copy_from_slice(&chars[i].to_le_bytes());
        }
        for (i, &off) in CHARS_GROUP2.iter().enumerate() {
            buf[off..off + 2].copy_from_slice(&chars[5 + i].to_le_bytes());
        }
        for (i, &off) in CHARS_GROUP3.iter().enumerate() {
            buf[off..off + 2].copy_from_slice(&chars[11 + i].to_le_bytes());
        }
        fragments.push(buf);
    }

    fragments.reverse();
    fragments
}

/// Decode a run of LFN fragment records (in the on-disk, highest-order-
/// first arrangement `encode_fragments` produces) back into the long name
/// (§4.7 decoding).
pub fn decode_fragments(fragments: &[[u8; DIR_ENTRY_SIZE]]) -> String {
    let max_order = fragments.iter().map(|f| (f[0] & ORDER_MASK) as usize).max().unwrap_or(0);
    let mut buf = vec![0xFFFFu16; max_order * CHARS_PER_FRAGMENT];

    for f in fragments {
        let order = (f[0] & ORDER_MASK) as usize;
        if order == 0 {
            continue;
        }
        let base = (order - 1) * CHARS_PER_FRAGMENT;
        for (i, &off) in CHARS_GROUP1.iter().enumerate() {
            buf[base + i] = u16::from_le_bytes([f[off], f[off + 1]]);
        }
        for (i, &off) in CHARS_GROUP2.iter().enumerate() {
            buf[base + 5 + i] = u16::from_le_bytes([f[off], f[off + 1]]);
        }
        for (i, &off) in CHARS_GROUP3.iter().enumerate() {
            buf[base + 11 + i] = u16::from_le_bytes([f[off], f[off + 1]]);
        }
    }

    if let Some(term) = buf.iter().position(|&c| c == 0x0000) {
        buf.truncate(term);
    } else {
        while buf.last() == Some(&0xFFFF) {
            buf.pop();
        }
    }

    char::decode_utf16(buf).map(|r| r.unwrap_or('\u{FFFD}')).collect()
}

/// Is this raw record (identified by its attribute byte) an LFN fragment?
pub fn is_lfn_fragment(attribs: u8) -> bool {
    attribs == ATTR_LFN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_short_ascii_name() {
        let name = "readme.txt";
        let (base, ext) = derive_base_ext(name);
        let short = short_name_for_attempt(&base, &ext, 1);
        let sum = short_name_checksum(&short);
        let frags = encode_fragments(name, sum);
        let decoded = decode_fragments(&frags);
        assert_eq!(decoded, name);
    }

    #[test]
    fn round_trip_long_name_spanning_multiple_fragments() {
        let name = "this is a very long file name that needs more than one lfn fragment.txt";
        assert!(name.len() <= 255);
        let (base, ext) = derive_base_ext(name);
        let short = short_name_for_attempt(&base, &ext, 1);
        let frags = encode_fragments(name, short_name_checksum(&short));
        assert!(frags.len() > 1);
        assert_eq!(decode_fragments(&frags), name);
    }

    #[test]
    fn round_trip_unicode_name() {
        let name = "caf\u{e9}-r\u{e9}sum\u{e9}.txt";
        let (base, ext) = derive_base_ext(name);
        let frags = encode_fragments(name, short_name_checksum(&short_name_for_attempt(&base, &ext, 1)));
        assert_eq!(decode_fragments(&frags), name);
    }

    #[test]
    fn last_fragment_flag_is_on_the_first_record_written() {
        let frags = encode_fragments("abcdefghijklmnopqrstuvwxyz.txt", 0);
        assert!(frags.len() >= 2);
        assert_ne!(frags[0][0] & 0x40, 0, "first on-disk record carries the last-in-sequence flag");
        assert_eq!(frags[0][0] & ORDER_MASK, frags.len() as u8);
        assert_eq!(frags.last().unwrap()[0] & ORDER_MASK, 1);
    }

    #[test]
    fn short_name_attempt_appends_incrementing_suffix() {
        let (base, ext) = derive_base_ext("file.txt");
        let s1 = short_name_for_attempt(&base, &ext, 1);
        let s2 = short_name_for_attempt(&base, &ext, 2);
        assert_ne!(s1, s2);
        assert_eq!(&s1[..], b"FILE-1  TXT");
        assert_eq!(&s2[..], b"FILE-2  TXT");
    }

    #[test]
    fn checksum_matches_for_identical_short_names() {
        let s = *b"FILE-1  TXT";
        assert_eq!(short_name_checksum(&s), short_name_checksum(&s));
    }

    #[test]
    fn illegal_characters_become_underscore() {
        let (base, _ext) = derive_base_ext("a+b*c.txt");
        assert!(!base.contains('+'));
        assert!(!base.contains('*'));
    }

    #[test]
    fn duplicate_interior_dots_collapse() {
        let (base, ext) = derive_base_ext("a...b.txt");
        assert_eq!(base, "A.B");
        assert_eq!(ext, "TXT");
    }
}
