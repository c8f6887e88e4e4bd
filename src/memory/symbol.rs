//! Interned symbols
//!
//! A symbol cell is `{t: Symbol_T, x: hash, y: characters, z: global binding}`.
//! Symbols are interned in a 256-bucket table keyed by the low byte of a
//! CRC-32 over the character codes, so two symbols with the same spelling are
//! always the same cell.

use super::heap::Heap;
use super::text::{list_from_str, list_to_string};
use super::value::{Val, NIL, SYMBOL_T, UNDEF};
use crate::interpreter::errors::VmError;

pub const SYM_BUCKETS: usize = 256;

const CRC_POLY: u32 = 0x04c1_1db7;

const CRC_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ CRC_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

#[inline]
fn add_crc(crc: u32, octet: u8) -> u32 {
    let index = octet ^ (crc >> 24) as u8;
    (crc << 8) ^ CRC_TABLE[index as usize]
}

/// POSIX `cksum` CRC over the low byte of each character, then the length
pub fn list_crc(heap: &Heap, list: Val) -> Result<u32, VmError> {
    let mut budget = heap.budget("list_crc");
    let mut crc = 0u32;
    let mut len: u64 = 0;
    let mut p = list;
    while heap.is_pair(p) {
        budget.spend()?;
        let ch = heap.car(p).as_fix().unwrap_or(0);
        crc = add_crc(crc, ch as u8);
        len += 1;
        p = heap.cdr(p);
    }
    while len != 0 {
        crc = add_crc(crc, len as u8);
        len >>= 8;
    }
    Ok(!crc)
}

/// Bucketed intern table
#[derive(Debug, Clone)]
pub struct SymbolTable {
    buckets: [Val; SYM_BUCKETS],
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            buckets: [NIL; SYM_BUCKETS],
        }
    }

    /// Bucket heads, each a list of symbols; the collector treats these as roots
    pub fn buckets(&self) -> &[Val] {
        &self.buckets
    }

    /// Return the symbol spelled by `chars`, creating it if needed
    pub fn intern(&mut self, heap: &mut Heap, chars: Val) -> Result<Val, VmError> {
        let hash = Val::fix(list_crc(heap, chars)? as i64);
        if let Some(found) = self.lookup(heap, hash, chars)? {
            return Ok(found);
        }
        let sym = heap.alloc(SYMBOL_T, hash, chars, UNDEF)?;
        let slot = Self::slot(hash);
        self.buckets[slot] = heap.cons(sym, self.buckets[slot])?;
        Ok(sym)
    }

    pub fn intern_str(&mut self, heap: &mut Heap, name: &str) -> Result<Val, VmError> {
        let chars = list_from_str(heap, name)?;
        let sym = self.intern(heap, chars)?;
        if heap.y(sym)? != chars {
            heap.free_list_spine(chars)?;
        }
        Ok(sym)
    }

    fn lookup(&self, heap: &Heap, hash: Val, chars: Val) -> Result<Option<Val>, VmError> {
        let mut budget = heap.budget("symbol lookup");
        let mut chain = self.buckets[Self::slot(hash)];
        while heap.is_pair(chain) {
            budget.spend()?;
            let sym = heap.car(chain);
            if heap.x(sym)? == hash && heap.equal(chars, heap.y(sym)?)? {
                return Ok(Some(sym));
            }
            chain = heap.cdr(chain);
        }
        Ok(None)
    }

    fn slot(hash: Val) -> usize {
        (hash.raw() & 0xFF) as usize
    }

    /// Spelling of a symbol
    pub fn name(heap: &Heap, sym: Val) -> Result<String, VmError> {
        list_to_string(heap, heap.y(sym)?)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crc_of(text: &str) -> u32 {
        let mut heap = Heap::new(256);
        let list = list_from_str(&mut heap, text).unwrap();
        list_crc(&heap, list).unwrap()
    }

    #[test]
    fn test_crc_table_polynomial() {
        assert_eq!(CRC_TABLE[0], 0);
        assert_eq!(CRC_TABLE[1], 0x04c1_1db7);
        assert_eq!(CRC_TABLE[255], 0xb1f7_40b4);
    }

    #[test]
    fn test_cksum_reference_values() {
        // `printf '' | cksum` and `printf 'a' | cksum`
        assert_eq!(crc_of(""), 4_294_967_295);
        assert_eq!(crc_of("a"), 1_220_704_766);
    }

    #[test]
    fn test_intern_returns_same_cell() {
        let mut heap = Heap::new(512);
        let mut symbols = SymbolTable::new();
        let a = symbols.intern_str(&mut heap, "lambda").unwrap();
        let used = heap.in_use();
        let b = symbols.intern_str(&mut heap, "lambda").unwrap();
        assert_eq!(a, b);
        // the duplicate spelling was given back
        assert_eq!(heap.in_use(), used);
        let c = symbols.intern_str(&mut heap, "vau").unwrap();
        assert_ne!(a, c);
        assert!(heap.is_symbol(a));
        assert_eq!(SymbolTable::name(&heap, a).unwrap(), "lambda");
    }
}
