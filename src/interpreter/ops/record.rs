use tracing::warn;

use crate::interpreter::engine::Vm;
use crate::interpreter::errors::VmError;
use crate::memory::value::{Val, ACTOR_T, FIXNUM_T, FREE_T, UNDEF};
use crate::memory::Field;

impl Vm {
    pub(crate) fn exec_typeq(&mut self, t: Val) -> Result<(), VmError> {
        let v = self.pop()?;
        let matches = if t == FIXNUM_T {
            v.is_fix()
        } else if t == ACTOR_T {
            self.heap.is_actor(v)
        } else {
            self.heap.typeq(t, v)
        };
        self.push(Val::bool(matches))
    }

    /// Build a raw cell from 1 to 4 stack items, T deepest
    pub(crate) fn exec_cell(&mut self, n: i64) -> Result<(), VmError> {
        if !(0..=4).contains(&n) {
            return Err(VmError::InvalidCount { op: "cell", count: n });
        }
        let z = if n > 3 { self.pop()? } else { UNDEF };
        let y = if n > 2 { self.pop()? } else { UNDEF };
        let x = if n > 1 { self.pop()? } else { UNDEF };
        let t = self.pop()?;
        check_type_field("cell", t)?;
        let cell = self.heap.alloc(t, x, y, z)?;
        self.push(cell)
    }

    pub(crate) fn exec_get(&mut self, field: Field) -> Result<(), VmError> {
        let cell = self.pop()?;
        let v = if self.heap.is_cell(cell) {
            self.heap.get(cell, field)?
        } else {
            warn!(cell = ?cell, ?field, "get from a non-cell");
            UNDEF
        };
        self.push(v)
    }

    /// Store the top item into the cell beneath it, which stays on the stack
    pub(crate) fn exec_set(&mut self, field: Field) -> Result<(), VmError> {
        let v = self.pop()?;
        let cell = self.heap.car(self.sp()?);
        if field == Field::T {
            check_type_field("set", v)?;
        }
        if !self.heap.in_heap(cell) || cell.is_cap() || self.heap.is_free(cell) {
            warn!(cell = ?cell, ?field, "set on a non-cell");
            return Ok(());
        }
        self.heap.set(cell, field, v)
    }
}

/// Actors are only made by `new`, free cells only by the allocator
fn check_type_field(op: &'static str, t: Val) -> Result<(), VmError> {
    if t == ACTOR_T {
        Err(VmError::ActorViaCell)
    } else if t == FREE_T {
        Err(VmError::TypeMismatch {
            op,
            expected: "allocatable type",
            got: t,
        })
    } else {
        Ok(())
    }
}
