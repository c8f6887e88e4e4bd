//! Memory model for the actor VM
//!
//! - [`value`]: the tagged [`Val`] word and reserved literals
//! - [`heap`]: fixed-capacity [`Heap`] of [`Cell`]s with a free-list allocator
//! - [`queue`]: intrusive FIFOs threaded through the Z field
//! - [`symbol`]: interned symbols and their CRC-32 hash
//! - [`text`]: character classes, character lists and fixnum parsing
//! - [`print`]: s-expression rendering for traces and logs

pub mod heap;
pub mod print;
pub mod queue;
pub mod symbol;
pub mod text;
pub mod value;

pub use heap::Heap;
pub use queue::{EventQueue, Fifo};
pub use symbol::SymbolTable;
pub use value::{Val, Word};

use crate::interpreter::errors::VmError;
use value::UNDEF;

/// One heap record: four tagged words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub t: Val,
    pub x: Val,
    pub y: Val,
    pub z: Val,
}

impl Cell {
    pub const fn new(t: Val, x: Val, y: Val, z: Val) -> Self {
        Cell { t, x, y, z }
    }

    pub fn get(&self, field: Field) -> Val {
        match field {
            Field::T => self.t,
            Field::X => self.x,
            Field::Y => self.y,
            Field::Z => self.z,
        }
    }

    /// Children in the order the collector visits them
    pub fn fields(&self) -> [Val; 4] {
        [self.t, self.x, self.y, self.z]
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::new(UNDEF, UNDEF, UNDEF, UNDEF)
    }
}

/// Field selector for `get`/`set`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    T = 0,
    X = 1,
    Y = 2,
    Z = 3,
}

impl Field {
    pub fn from_fix(n: i64) -> Option<Field> {
        match n {
            0 => Some(Field::T),
            1 => Some(Field::X),
            2 => Some(Field::Y),
            3 => Some(Field::Z),
            _ => None,
        }
    }
}

/// Iteration allowance for one traversal.
///
/// Every walk over heap structure that could loop forever on corrupted links
/// takes a fresh budget; running it out is a fatal [`VmError::Runaway`].
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    left: usize,
    what: &'static str,
}

impl Budget {
    pub fn new(limit: usize, what: &'static str) -> Self {
        Budget { left: limit, what }
    }

    #[inline]
    pub fn spend(&mut self) -> Result<(), VmError> {
        if self.left == 0 {
            return Err(VmError::Runaway(self.what));
        }
        self.left -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_runs_out() {
        let mut budget = Budget::new(2, "walk");
        assert!(budget.spend().is_ok());
        assert!(budget.spend().is_ok());
        assert_eq!(budget.spend(), Err(VmError::Runaway("walk")));
    }

    #[test]
    fn test_field_selector() {
        let cell = Cell::new(value::PAIR_T, Val::fix(1), value::NIL, UNDEF);
        assert_eq!(cell.get(Field::from_fix(1).unwrap()), Val::fix(1));
        assert_eq!(Field::from_fix(4), None);
    }
}
