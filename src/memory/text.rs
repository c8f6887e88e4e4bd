//! Character lists
//!
//! Text lives in the heap as a list of fixnum character codes. This module
//! holds the 7-bit character class table used by `cmp CLS`, conversions
//! between Rust strings and character lists, and the fixnum parser behind
//! `cvt LST_NUM`.

use super::heap::Heap;
use super::value::{Val, NIL};
use crate::interpreter::errors::VmError;

/// Character class bits
pub mod class {
    pub const CTL: i64 = 1 << 0;
    pub const DGT: i64 = 1 << 1;
    pub const UPR: i64 = 1 << 2;
    pub const LWR: i64 = 1 << 3;
    /// `"'(),;[]`{|}`
    pub const DLM: i64 = 1 << 4;
    pub const SYM: i64 = 1 << 5;
    pub const HEX: i64 = 1 << 6;
    pub const WSP: i64 = 1 << 7;
}

use class::*;

const CLASS_TABLE: [u8; 128] = {
    let mut table = [0u8; 128];
    let mut c = 0;
    while c < 128 {
        let bits = match c as u8 {
            0x09..=0x0D => CTL | WSP,
            0x00..=0x1F | 0x7F => CTL,
            b' ' => WSP,
            b'"' | b'\'' | b'(' | b')' | b',' | b';' | b'[' | b']' | b'`' | b'{' | b'|'
            | b'}' => DLM,
            b'0'..=b'9' => DGT | HEX,
            b'A'..=b'F' => UPR | HEX,
            b'G'..=b'Z' => UPR,
            b'a'..=b'f' => LWR | HEX,
            b'g'..=b'z' => LWR,
            _ => SYM,
        };
        table[c] = bits as u8;
        c += 1;
    }
    table
};

/// Is character code `ch` in any of the classes in `mask`
pub fn char_in_class(ch: i64, mask: i64) -> bool {
    (0..128).contains(&ch) && (CLASS_TABLE[ch as usize] as i64 & mask) != 0
}

/// Store a string as a character list
pub fn list_from_str(heap: &mut Heap, s: &str) -> Result<Val, VmError> {
    let mut list = NIL;
    for ch in s.chars().rev() {
        list = heap.cons(Val::fix(ch as i64), list)?;
    }
    Ok(list)
}

/// Read a character list back into a string. Non-characters become `~`.
pub fn list_to_string(heap: &Heap, list: Val) -> Result<String, VmError> {
    let mut budget = heap.budget("list_to_string");
    let mut out = String::new();
    let mut p = list;
    while heap.is_pair(p) {
        budget.spend()?;
        let ch = heap
            .car(p)
            .as_fix()
            .and_then(|n| u32::try_from(n).ok())
            .and_then(char::from_u32)
            .unwrap_or('~');
        out.push(ch);
        p = heap.cdr(p);
    }
    Ok(out)
}

/// Parse a decimal fixnum from a character list.
///
/// A single leading `+`/`-` is accepted, `_` separators are skipped, and
/// parsing stops at the first other character.
pub fn parse_fixnum(heap: &Heap, list: Val) -> Result<Val, VmError> {
    let mut budget = heap.budget("parse_fixnum");
    let mut num: i64 = 0;
    let mut neg: Option<bool> = None;
    let mut p = list;
    while heap.is_pair(p) {
        budget.spend()?;
        let ch = heap.car(p).as_fix().unwrap_or(-1);
        p = heap.cdr(p);
        if char_in_class(ch, DGT) {
            num = num.wrapping_mul(10).wrapping_add(ch - '0' as i64);
        } else if ch == '_' as i64 {
            // separator
        } else if neg.is_none() && ch == '-' as i64 {
            neg = Some(true);
            continue;
        } else if neg.is_none() && ch == '+' as i64 {
            neg = Some(false);
            continue;
        } else {
            break;
        }
        neg.get_or_insert(false);
    }
    if neg == Some(true) {
        num = num.wrapping_neg();
    }
    Ok(Val::fix(num))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_classes() {
        assert!(char_in_class('7' as i64, DGT));
        assert!(char_in_class('7' as i64, HEX));
        assert!(char_in_class('a' as i64, LWR | HEX));
        assert!(!char_in_class('g' as i64, HEX));
        assert!(char_in_class('Q' as i64, UPR));
        assert!(char_in_class('(' as i64, DLM));
        assert!(char_in_class('!' as i64, SYM));
        assert!(char_in_class('\n' as i64, WSP | CTL));
        assert!(char_in_class(' ' as i64, WSP));
        assert!(!char_in_class(' ' as i64, CTL));
        assert!(char_in_class(0x7F, CTL));
        assert!(!char_in_class(200, SYM));
        assert!(!char_in_class(-1, CTL));
    }

    #[test]
    fn test_parse_fixnum() {
        let mut heap = Heap::new(256);
        let cases = [
            ("42", 42),
            ("-17", -17),
            ("+8", 8),
            ("1_000", 1000),
            ("12ab", 12),
            ("", 0),
            ("3-4", 3),
        ];
        for (text, expected) in cases {
            let list = list_from_str(&mut heap, text).unwrap();
            assert_eq!(
                parse_fixnum(&heap, list).unwrap(),
                Val::fix(expected),
                "parsing {:?}",
                text
            );
        }
    }

    #[test]
    fn test_string_conversion() {
        let mut heap = Heap::new(64);
        let list = list_from_str(&mut heap, "hi!").unwrap();
        assert_eq!(heap.list_len(list).unwrap(), 3);
        assert_eq!(list_to_string(&heap, list).unwrap(), "hi!");
    }
}
