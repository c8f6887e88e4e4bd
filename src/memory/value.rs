//! Tagged machine words
//!
//! Every field of every cell holds one [`Val`]. The two most significant bits
//! select the kind of word:
//!
//! - bit 63 set: an immediate fixnum (63-bit two's complement)
//! - bit 62 set (bit 63 clear): a capability, the only handle actor code has
//!   on an actor
//! - neither: a plain reference to a cell, used internally by the VM
//!
//! [`Word`] is the tagged-union view used at the API boundary. Plain indices
//! never leave the crate; a [`CellRef`] is opaque.

use std::fmt;

/// Raw machine word
pub type Raw = u64;

const MSB1: Raw = 1 << 63;
const MSB2: Raw = 1 << 62;
const TAG: Raw = MSB1 | MSB2;

/// A tagged VM word
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Val(Raw);

/// Undefined value (`#?`)
pub const UNDEF: Val = Val(0);
/// Empty list (`()`)
pub const NIL: Val = Val(1);
pub const FALSE: Val = Val(2);
pub const TRUE: Val = Val(3);
/// The unit value (`#unit`)
pub const UNIT: Val = Val(4);

pub const TYPE_T: Val = Val(5);
pub const EVENT_T: Val = Val(6);
pub const INSTR_T: Val = Val(7);
pub const ACTOR_T: Val = Val(8);
pub const FIXNUM_T: Val = Val(9);
pub const SYMBOL_T: Val = Val(10);
pub const PAIR_T: Val = Val(11);
pub const FREE_T: Val = Val(12);

/// First allocatable cell index
pub const START: usize = 13;

/// Literals carry this in their T field
pub const LITERAL_T: Val = UNDEF;

impl Val {
    /// Encode a fixnum. Values outside the 63-bit range wrap.
    #[inline]
    pub const fn fix(n: i64) -> Val {
        Val((n as Raw) | MSB1)
    }

    #[inline]
    pub const fn bool(b: bool) -> Val {
        if b {
            TRUE
        } else {
            FALSE
        }
    }

    /// Plain reference to the cell at `index`
    #[inline]
    pub(crate) const fn ptr(index: usize) -> Val {
        Val(index as Raw & !TAG)
    }

    #[inline]
    pub const fn raw(self) -> Raw {
        self.0
    }

    #[inline]
    pub const fn is_fix(self) -> bool {
        self.0 & MSB1 != 0
    }

    #[inline]
    pub const fn is_cap(self) -> bool {
        self.0 & TAG == MSB2
    }

    #[inline]
    pub const fn is_ref(self) -> bool {
        self.0 & TAG == 0
    }

    /// Sign-extended fixnum payload
    #[inline]
    pub const fn as_fix(self) -> Option<i64> {
        if self.is_fix() {
            Some(((self.0 << 1) as i64) >> 1)
        } else {
            None
        }
    }

    /// Reinterpret a reference as a capability
    #[inline]
    pub const fn to_cap(self) -> Val {
        Val((self.0 & !MSB1) | MSB2)
    }

    /// Strip the tag bits, leaving a plain reference
    #[inline]
    pub const fn to_ref(self) -> Val {
        Val(self.0 & !TAG)
    }

    /// Cell index addressed by a reference or capability
    #[inline]
    pub(crate) const fn index(self) -> usize {
        (self.0 & !TAG) as usize
    }

    pub fn decode(self) -> Word {
        if let Some(n) = self.as_fix() {
            Word::Fixnum(n)
        } else if self.is_cap() {
            Word::Cap(CellRef(self.index()))
        } else {
            Word::Ref(CellRef(self.index()))
        }
    }
}

/// Opaque cell identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef(usize);

/// Tagged-union view of a [`Val`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word {
    Fixnum(i64),
    Ref(CellRef),
    Cap(CellRef),
}

impl From<Word> for Val {
    fn from(word: Word) -> Val {
        match word {
            Word::Fixnum(n) => Val::fix(n),
            Word::Ref(r) => Val::ptr(r.0),
            Word::Cap(r) => Val::ptr(r.0).to_cap(),
        }
    }
}

impl From<i64> for Val {
    fn from(n: i64) -> Val {
        Val::fix(n)
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Val {
        Val::bool(b)
    }
}

const NAMES: [&str; START] = [
    "#?", "()", "#f", "#t", "#unit", "Type_T", "Event_T", "Instr_T", "Actor_T", "Fixnum_T",
    "Symbol_T", "Pair_T", "Free_T",
];

impl Val {
    /// Name of a reserved literal or type marker
    pub fn reserved_name(self) -> Option<&'static str> {
        if self.is_ref() {
            NAMES.get(self.index()).copied()
        } else {
            None
        }
    }
}

impl fmt::Debug for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(n) = self.as_fix() {
            write!(f, "{:+}", n)
        } else if self.is_cap() {
            write!(f, "@{}", self.index())
        } else if let Some(name) = self.reserved_name() {
            f.write_str(name)
        } else {
            write!(f, "^{}", self.index())
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixnum_sign_extension() {
        assert_eq!(Val::fix(-1).as_fix(), Some(-1));
        assert_eq!(Val::fix(42).as_fix(), Some(42));
        assert_eq!(Val::fix(i64::MIN >> 1).as_fix(), Some(i64::MIN >> 1));
        assert_eq!(NIL.as_fix(), None);
    }

    #[test]
    fn test_tag_predicates_are_exclusive() {
        let r = Val::ptr(100);
        let c = r.to_cap();
        let n = Val::fix(100);
        assert!(r.is_ref() && !r.is_cap() && !r.is_fix());
        assert!(c.is_cap() && !c.is_ref() && !c.is_fix());
        assert!(n.is_fix() && !n.is_ref() && !n.is_cap());
        assert_eq!(c.to_ref(), r);
        assert_eq!(c.index(), 100);
    }

    #[test]
    fn test_word_conversion() {
        assert_eq!(Val::fix(-7).decode(), Word::Fixnum(-7));
        let cap = Val::ptr(20).to_cap();
        assert!(matches!(cap.decode(), Word::Cap(_)));
        assert_eq!(Val::from(cap.decode()), cap);
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", Val::fix(5)), "+5");
        assert_eq!(format!("{:?}", Val::fix(-5)), "-5");
        assert_eq!(format!("{:?}", NIL), "()");
        assert_eq!(format!("{:?}", Val::ptr(40)), "^40");
        assert_eq!(format!("{:?}", Val::ptr(40).to_cap()), "@40");
    }
}
