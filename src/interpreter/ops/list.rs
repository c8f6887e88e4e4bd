use crate::interpreter::engine::Vm;
use crate::interpreter::errors::VmError;
use crate::memory::heap::Heap;
use crate::memory::value::{Val, UNDEF};

/// Index into a list: 0 is the list itself, `+n` the nth item, `-n` the
/// nth tail. Anything past the end is `UNDEF`.
pub fn extract_nth(heap: &Heap, mut list: Val, n: i64) -> Val {
    if n == 0 {
        return list;
    }
    let steps = n.unsigned_abs();
    let mut walked = 0;
    while heap.is_pair(list) {
        walked += 1;
        if walked == steps {
            return if n > 0 { heap.car(list) } else { heap.cdr(list) };
        }
        list = heap.cdr(list);
    }
    UNDEF
}

impl Vm {
    /// Validate a count of stack items about to be popped
    pub(crate) fn stack_count(&self, op: &'static str, n: i64) -> Result<usize, VmError> {
        let n = usize::try_from(n).map_err(|_| VmError::InvalidCount { op, count: n })?;
        if n > self.depth()? {
            return Err(VmError::StackUnderflow(op));
        }
        Ok(n)
    }

    /// Pop n items and a tail, pushing `(item1 ... itemN . tail)`
    pub(crate) fn exec_pair(&mut self, n: i64) -> Result<(), VmError> {
        let n = self.stack_count("pair", n)?;
        let items = self.pop_n(n)?;
        let mut list = self.pop()?;
        for &item in items.iter().rev() {
            list = self.heap.cons(item, list)?;
        }
        self.push(list)
    }

    /// Inverse of `pair`: push the tail, then the items so the first ends
    /// on top
    pub(crate) fn exec_part(&mut self, n: i64) -> Result<(), VmError> {
        if n < 0 {
            return Err(VmError::InvalidCount { op: "part", count: n });
        }
        let mut rest = self.pop()?;
        let mut items = Vec::new();
        for _ in 0..n {
            if !self.heap.is_pair(rest) {
                return Err(VmError::TypeMismatch {
                    op: "part",
                    expected: "pair",
                    got: rest,
                });
            }
            items.push(self.heap.car(rest));
            rest = self.heap.cdr(rest);
        }
        self.push(rest)?;
        for &item in items.iter().rev() {
            self.push(item)?;
        }
        Ok(())
    }

    pub(crate) fn exec_nth(&mut self, n: i64) -> Result<(), VmError> {
        let list = self.pop()?;
        let v = extract_nth(&self.heap, list, n);
        self.push(v)
    }
}
