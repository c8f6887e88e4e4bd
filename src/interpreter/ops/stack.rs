//! The continuation's operand stack
//!
//! The stack is a cdr-chain of pairs hanging off the continuation's X field,
//! top first. Its spine belongs to the continuation alone, so popping frees
//! the pair that held the value.

use tracing::warn;

use crate::interpreter::engine::Vm;
use crate::interpreter::errors::VmError;
use crate::memory::value::{Val, NIL, UNDEF};

impl Vm {
    pub(crate) fn sp(&self) -> Result<Val, VmError> {
        self.heap.x(self.cont())
    }

    fn set_sp(&mut self, sp: Val) -> Result<(), VmError> {
        let cont = self.cont();
        self.heap.set_x(cont, sp)
    }

    pub(crate) fn push(&mut self, v: Val) -> Result<(), VmError> {
        let sp = self.sp()?;
        let sp = self.heap.cons(v, sp)?;
        self.set_sp(sp)
    }

    /// Pop the top item. An empty stack yields `UNDEF` with a warning.
    pub(crate) fn pop(&mut self) -> Result<Val, VmError> {
        let sp = self.sp()?;
        if !self.heap.is_pair(sp) {
            let ip = self.heap.t(self.cont())?;
            warn!(ip = ?ip, "stack underflow");
            return Ok(UNDEF);
        }
        let item = self.heap.car(sp);
        self.set_sp(self.heap.cdr(sp))?;
        self.heap.free(sp)?;
        Ok(item)
    }

    /// Pop a fixnum operand for `op`
    pub(crate) fn pop_fixnum(&mut self, op: &'static str) -> Result<i64, VmError> {
        let v = self.pop()?;
        v.as_fix().ok_or(VmError::TypeMismatch {
            op,
            expected: "fixnum",
            got: v,
        })
    }

    /// Pop `n` items, top first
    pub(crate) fn pop_n(&mut self, n: usize) -> Result<Vec<Val>, VmError> {
        (0..n).map(|_| self.pop()).collect()
    }

    /// Top `n` items, top first, without popping
    fn peek_n(&self, n: usize) -> Result<Vec<Val>, VmError> {
        let mut p = self.sp()?;
        let mut items = Vec::with_capacity(n);
        for _ in 0..n {
            items.push(self.heap.car(p));
            p = self.heap.cdr(p);
        }
        Ok(items)
    }

    pub(crate) fn depth(&self) -> Result<usize, VmError> {
        self.heap.list_len(self.sp()?)
    }

    /// Free the whole stack
    pub(crate) fn clear_stack(&mut self) -> Result<(), VmError> {
        let sp = self.sp()?;
        self.set_sp(NIL)?;
        self.heap.free_list_spine(sp)
    }

    /// Detach the top `n` items, spine and all, as a list. Used to hand
    /// stack items to an actor as its state.
    pub(crate) fn carve(&mut self, n: i64, op: &'static str) -> Result<Val, VmError> {
        if n < 0 {
            return Err(VmError::InvalidCount { op, count: n });
        }
        if n == 0 {
            return Ok(NIL);
        }
        let n = n as usize;
        if self.depth()? < n {
            return Err(VmError::StackUnderflow(op));
        }
        let list = self.sp()?;
        let mut last = list;
        for _ in 1..n {
            last = self.heap.cdr(last);
        }
        self.set_sp(self.heap.cdr(last))?;
        self.heap.set_cdr(last, NIL)?;
        Ok(list)
    }

    pub(crate) fn exec_depth(&mut self) -> Result<(), VmError> {
        let depth = self.depth()?;
        self.push(Val::fix(depth as i64))
    }

    pub(crate) fn exec_drop(&mut self, n: i64) -> Result<(), VmError> {
        let depth = self.depth()?;
        let n = usize::try_from(n).unwrap_or(0);
        for _ in 0..n.min(depth) {
            self.pop()?;
        }
        if n > depth {
            // one underflow warning for the whole shortfall
            self.pop()?;
        }
        Ok(())
    }

    /// Copy the nth item to the top; `pick 1` duplicates the top
    pub(crate) fn exec_pick(&mut self, n: i64) -> Result<(), VmError> {
        let mut v = UNDEF;
        if n > 0 {
            let mut p = self.sp()?;
            for _ in 1..n {
                if !self.heap.is_pair(p) {
                    break;
                }
                p = self.heap.cdr(p);
            }
            v = self.heap.car(p);
        }
        self.push(v)
    }

    /// Copy the top n items, keeping their order
    pub(crate) fn exec_dup(&mut self, n: i64) -> Result<(), VmError> {
        let n = usize::try_from(n).unwrap_or(0);
        if n > self.depth()? {
            return Err(VmError::StackUnderflow("dup"));
        }
        for v in self.peek_n(n)?.into_iter().rev() {
            self.push(v)?;
        }
        Ok(())
    }

    /// `roll n` brings the nth item to the top; `roll -n` sinks the top item
    /// to position n
    pub(crate) fn exec_roll(&mut self, n: i64) -> Result<(), VmError> {
        let depth = self.depth()?;
        let m = n.unsigned_abs() as usize;
        if m <= 1 {
            return Ok(());
        }
        if depth < m {
            // rolling up past the bottom brings up nothing, rolling down
            // past it loses the top
            return if n > 0 {
                self.push(UNDEF)
            } else {
                self.pop().map(drop)
            };
        }
        let sp = self.sp()?;
        if n > 0 {
            let mut before = sp;
            for _ in 2..m {
                before = self.heap.cdr(before);
            }
            let moved = self.heap.cdr(before);
            self.heap.set_cdr(before, self.heap.cdr(moved))?;
            self.heap.set_cdr(moved, sp)?;
            self.set_sp(moved)
        } else {
            let mut after = sp;
            for _ in 1..m {
                after = self.heap.cdr(after);
            }
            self.set_sp(self.heap.cdr(sp))?;
            self.heap.set_cdr(sp, self.heap.cdr(after))?;
            self.heap.set_cdr(after, sp)
        }
    }
}
