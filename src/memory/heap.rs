//! Cell heap
//!
//! A fixed array of [`Cell`]s allocated once at startup:
//! - `0..START` holds the reserved literals and type markers
//! - cells below the permanent boundary (see [`Heap::seal`]) are never freed
//! - above that, cells come from the free list first and then from a
//!   monotonically growing `top`
//!
//! Freed cells are tagged `Free_T` and pushed onto the free list through their
//! Z field. Cells never move, so a reference stays valid until the cell is
//! freed.
//!
//! # Error Handling
//!
//! Structural violations (bad reference, double free, exhaustion) are fatal
//! [`VmError`]s. Pair accessors follow the lenient Lisp convention: `car` of a
//! non-pair is `UNDEF`, and `set_car` on a non-pair only logs a warning.

use tracing::{debug, warn};

use super::value::{
    Val, ACTOR_T, EVENT_T, FALSE, FREE_T, INSTR_T, LITERAL_T, NIL, PAIR_T, START, SYMBOL_T,
    TYPE_T, UNDEF,
};
use super::{Budget, Cell, Field};
use crate::gc::incremental::ColorMap;
use crate::interpreter::errors::VmError;

/// The cell heap
#[derive(Debug, Clone)]
pub struct Heap {
    cells: Vec<Cell>,
    top: usize,
    free_head: Val,
    free_count: usize,
    permanent: usize,
    sanity: usize,
    colors: Option<ColorMap>,
}

impl Heap {
    /// Create a heap of `capacity` cells with the reserved prefix installed
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(START + 1);
        let mut cells = vec![Cell::default(); capacity];
        for (i, cell) in cells.iter_mut().enumerate().take(START) {
            let t = if i < TYPE_T.index() { LITERAL_T } else { TYPE_T };
            *cell = Cell::new(t, UNDEF, UNDEF, UNDEF);
        }
        Heap {
            cells,
            top: START,
            free_head: NIL,
            free_count: 0,
            permanent: START,
            sanity: capacity,
            colors: None,
        }
    }

    /// Override the iteration allowance handed to each traversal
    pub fn with_sanity(mut self, sanity: usize) -> Self {
        self.sanity = sanity;
        self
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// One past the highest cell ever allocated
    pub fn top(&self) -> usize {
        self.top
    }

    /// Cells still available above `top`
    pub fn unallocated(&self) -> usize {
        self.capacity() - self.top
    }

    pub fn free_count(&self) -> usize {
        self.free_count
    }

    pub fn free_head(&self) -> Val {
        self.free_head
    }

    /// Cells currently holding data
    pub fn in_use(&self) -> usize {
        self.top - self.free_count
    }

    /// First index the allocator may reuse
    pub fn permanent_boundary(&self) -> usize {
        self.permanent
    }

    pub fn budget(&self, what: &'static str) -> Budget {
        Budget::new(self.sanity, what)
    }

    /// Make every cell allocated so far permanent.
    ///
    /// Free cells below the new boundary are dropped from the free list so
    /// they can never be handed out again.
    pub fn seal(&mut self) -> Result<(), VmError> {
        let boundary = self.top;
        let mut budget = self.budget("seal");
        let mut kept = NIL;
        let mut count = 0;
        let mut p = self.free_head;
        while p != NIL {
            budget.spend()?;
            let next = self.cells[p.index()].z;
            if p.index() >= boundary {
                self.cells[p.index()].z = kept;
                kept = p;
                count += 1;
            }
            p = next;
        }
        self.free_head = kept;
        self.free_count = count;
        self.permanent = boundary;
        debug!(boundary, "heap sealed");
        Ok(())
    }

    /// True for any reference below `top`, reserved cells included
    #[inline]
    pub fn is_cell(&self, v: Val) -> bool {
        v.is_ref() && v.index() < self.top
    }

    /// True for allocatable cells addressed by a reference or capability
    #[inline]
    pub fn in_heap(&self, v: Val) -> bool {
        !v.is_fix() && v.index() >= START && v.index() < self.top
    }

    pub fn is_permanent(&self, v: Val) -> bool {
        !v.is_fix() && v.index() < self.permanent
    }

    /// Borrow the cell behind a plain reference
    pub fn cell(&self, v: Val) -> Result<&Cell, VmError> {
        if self.is_cell(v) {
            Ok(&self.cells[v.index()])
        } else {
            Err(VmError::InvalidRef(v))
        }
    }

    pub fn t(&self, v: Val) -> Result<Val, VmError> {
        Ok(self.cell(v)?.t)
    }

    pub fn x(&self, v: Val) -> Result<Val, VmError> {
        Ok(self.cell(v)?.x)
    }

    pub fn y(&self, v: Val) -> Result<Val, VmError> {
        Ok(self.cell(v)?.y)
    }

    pub fn z(&self, v: Val) -> Result<Val, VmError> {
        Ok(self.cell(v)?.z)
    }

    pub fn get(&self, v: Val, field: Field) -> Result<Val, VmError> {
        Ok(self.cell(v)?.get(field))
    }

    /// Store into one field of a cell, shading the stored value
    pub fn set(&mut self, v: Val, field: Field, value: Val) -> Result<(), VmError> {
        if !self.is_cell(v) {
            return Err(VmError::InvalidRef(v));
        }
        let cell = &mut self.cells[v.index()];
        match field {
            Field::T => cell.t = value,
            Field::X => cell.x = value,
            Field::Y => cell.y = value,
            Field::Z => cell.z = value,
        }
        self.shade(value);
        Ok(())
    }

    pub fn set_t(&mut self, v: Val, value: Val) -> Result<(), VmError> {
        self.set(v, Field::T, value)
    }

    pub fn set_x(&mut self, v: Val, value: Val) -> Result<(), VmError> {
        self.set(v, Field::X, value)
    }

    pub fn set_y(&mut self, v: Val, value: Val) -> Result<(), VmError> {
        self.set(v, Field::Y, value)
    }

    pub fn set_z(&mut self, v: Val, value: Val) -> Result<(), VmError> {
        self.set(v, Field::Z, value)
    }

    /// Allocate a cell, preferring the free list over fresh cells
    pub fn alloc(&mut self, t: Val, x: Val, y: Val, z: Val) -> Result<Val, VmError> {
        let next = if self.free_head != NIL {
            let next = self.free_head;
            self.free_head = self.cells[next.index()].z;
            self.free_count -= 1;
            next
        } else if self.top < self.capacity() {
            self.top += 1;
            Val::ptr(self.top - 1)
        } else {
            return Err(VmError::HeapExhausted {
                capacity: self.capacity(),
            });
        };
        self.cells[next.index()] = Cell::new(t, x, y, z);
        self.shade(next);
        Ok(next)
    }

    /// Return a cell to the free list. Capabilities free their actor.
    pub fn free(&mut self, v: Val) -> Result<(), VmError> {
        let v = v.to_ref();
        if v.index() < self.permanent || v.index() >= self.top {
            return Err(VmError::InvalidRef(v));
        }
        if self.cells[v.index()].t == FREE_T {
            return Err(VmError::DoubleFree(v));
        }
        self.reclaim(v.index());
        Ok(())
    }

    /// Link a cell into the free list without any checks
    pub(crate) fn reclaim(&mut self, index: usize) {
        self.cells[index] = Cell::new(FREE_T, UNDEF, UNDEF, self.free_head);
        self.free_head = Val::ptr(index);
        self.free_count += 1;
        if let Some(colors) = self.colors.as_mut() {
            colors.mark_free(index);
        }
    }

    /// Forget the free list; the collector rebuilds it while sweeping
    pub(crate) fn clear_free_list(&mut self) {
        self.free_head = NIL;
        self.free_count = 0;
    }

    /// Walk the free list, checking every link
    pub fn free_list_len(&self) -> Result<usize, VmError> {
        let mut budget = self.budget("free list walk");
        let mut n = 0;
        let mut p = self.free_head;
        while p != NIL {
            budget.spend()?;
            let cell = self.cell(p)?;
            if cell.t != FREE_T {
                return Err(VmError::Assertion("free list links a live cell"));
            }
            n += 1;
            p = cell.z;
        }
        Ok(n)
    }

    pub fn is_free(&self, v: Val) -> bool {
        self.typeq(FREE_T, v)
    }

    /// Does the free list contain this cell
    pub fn free_list_contains(&self, v: Val) -> Result<bool, VmError> {
        let mut budget = self.budget("free list walk");
        let mut p = self.free_head;
        while p != NIL {
            budget.spend()?;
            if p == v.to_ref() {
                return Ok(true);
            }
            p = self.cell(p)?.z;
        }
        Ok(false)
    }

    #[inline]
    pub fn typeq(&self, t: Val, v: Val) -> bool {
        self.is_cell(v) && self.cells[v.index()].t == t
    }

    pub fn is_pair(&self, v: Val) -> bool {
        self.typeq(PAIR_T, v)
    }

    pub fn is_event(&self, v: Val) -> bool {
        self.typeq(EVENT_T, v)
    }

    pub fn is_code(&self, v: Val) -> bool {
        self.typeq(INSTR_T, v)
    }

    pub fn is_symbol(&self, v: Val) -> bool {
        self.typeq(SYMBOL_T, v)
    }

    /// A capability addressing a live actor cell
    pub fn is_actor(&self, v: Val) -> bool {
        v.is_cap() && self.typeq(ACTOR_T, v.to_ref())
    }

    pub fn cons(&mut self, head: Val, tail: Val) -> Result<Val, VmError> {
        self.alloc(PAIR_T, head, tail, UNDEF)
    }

    #[inline]
    pub fn car(&self, v: Val) -> Val {
        if self.is_pair(v) {
            self.cells[v.index()].x
        } else {
            UNDEF
        }
    }

    #[inline]
    pub fn cdr(&self, v: Val) -> Val {
        if self.is_pair(v) {
            self.cells[v.index()].y
        } else {
            UNDEF
        }
    }

    pub fn set_car(&mut self, v: Val, x: Val) -> Result<(), VmError> {
        if self.is_pair(v) {
            self.set_x(v, x)
        } else {
            warn!(target_cell = ?v, "set_car defined only for pairs");
            Ok(())
        }
    }

    pub fn set_cdr(&mut self, v: Val, y: Val) -> Result<(), VmError> {
        if self.is_pair(v) {
            self.set_y(v, y)
        } else {
            warn!(target_cell = ?v, "set_cdr defined only for pairs");
            Ok(())
        }
    }

    /// Number of pairs in a cdr-chain
    pub fn list_len(&self, mut v: Val) -> Result<usize, VmError> {
        let mut budget = self.budget("list_len");
        let mut n = 0;
        while self.is_pair(v) {
            budget.spend()?;
            n += 1;
            v = self.cdr(v);
        }
        Ok(n)
    }

    /// Structural equality over pairs, identity elsewhere
    pub fn equal(&self, x: Val, y: Val) -> Result<bool, VmError> {
        let mut budget = self.budget("equal");
        self.equal_within(x, y, &mut budget)
    }

    fn equal_within(&self, mut x: Val, mut y: Val, budget: &mut Budget) -> Result<bool, VmError> {
        if x == y {
            return Ok(true);
        }
        while self.is_pair(x) && self.is_pair(y) {
            budget.spend()?;
            if !self.equal_within(self.car(x), self.car(y), budget)? {
                break;
            }
            x = self.cdr(x);
            y = self.cdr(y);
            if x == y {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Build a NIL-terminated list from a slice
    pub fn list_from(&mut self, items: &[Val]) -> Result<Val, VmError> {
        let mut list = NIL;
        for &item in items.iter().rev() {
            list = self.cons(item, list)?;
        }
        Ok(list)
    }

    /// Collect the items of a cdr-chain
    pub fn list_to_vec(&self, mut v: Val) -> Result<Vec<Val>, VmError> {
        let mut budget = self.budget("list_to_vec");
        let mut items = Vec::new();
        while self.is_pair(v) {
            budget.spend()?;
            items.push(self.car(v));
            v = self.cdr(v);
        }
        Ok(items)
    }

    /// Free every pair of a cdr-chain (not the items)
    pub fn free_list_spine(&mut self, mut v: Val) -> Result<(), VmError> {
        let mut budget = self.budget("free spine");
        while self.is_pair(v) && v.index() >= self.permanent {
            budget.spend()?;
            let rest = self.cdr(v);
            self.free(v)?;
            v = rest;
        }
        Ok(())
    }

    /// Truthiness as used by `if`: anything but `#f`
    pub fn truthy(v: Val) -> bool {
        v != FALSE
    }

    pub(crate) fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Start tracking tri-color marks for the incremental collector
    pub(crate) fn enable_colors(&mut self) {
        if self.colors.is_none() {
            self.colors = Some(ColorMap::new(&self.cells, self.top));
        }
    }

    pub(crate) fn colors(&self) -> Option<&ColorMap> {
        self.colors.as_ref()
    }

    /// Split borrow for the incremental collector
    pub(crate) fn colors_and_cells(&mut self) -> Option<(&mut ColorMap, &[Cell], usize)> {
        let top = self.top;
        let cells = self.cells.as_slice();
        self.colors.as_mut().map(|colors| (colors, cells, top))
    }

    /// Write barrier: mark `v` live in the current generation
    #[inline]
    pub(crate) fn shade(&mut self, v: Val) {
        if let Some(colors) = self.colors.as_mut() {
            colors.mark_live(&self.cells, self.top, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::value::TRUE;

    #[test]
    fn test_reserved_prefix() {
        let heap = Heap::new(64);
        assert_eq!(heap.top(), START);
        assert_eq!(heap.t(NIL).unwrap(), LITERAL_T);
        assert_eq!(heap.t(PAIR_T).unwrap(), TYPE_T);
        assert!(!heap.in_heap(NIL));
    }

    #[test]
    fn test_alloc_free_round_trip() {
        let mut heap = Heap::new(64);
        let a = heap.cons(Val::fix(1), NIL).unwrap();
        let before = heap.free_list_len().unwrap();
        heap.free(a).unwrap();
        assert_eq!(heap.free_list_len().unwrap(), before + 1);
        let b = heap.cons(Val::fix(1), NIL).unwrap();
        assert_eq!(a, b);
        assert_eq!(heap.free_list_len().unwrap(), before);
    }

    #[test]
    fn test_double_free_is_fatal() {
        let mut heap = Heap::new(64);
        let a = heap.cons(TRUE, NIL).unwrap();
        heap.free(a).unwrap();
        let err = heap.free(a).unwrap_err();
        assert_eq!(err, VmError::DoubleFree(a));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_reserved_cells_cannot_be_freed() {
        let mut heap = Heap::new(64);
        assert!(matches!(heap.free(NIL), Err(VmError::InvalidRef(_))));
    }

    #[test]
    fn test_exhaustion() {
        let mut heap = Heap::new(START + 2);
        heap.cons(NIL, NIL).unwrap();
        heap.cons(NIL, NIL).unwrap();
        assert_eq!(
            heap.cons(NIL, NIL),
            Err(VmError::HeapExhausted { capacity: START + 2 })
        );
    }

    #[test]
    fn test_car_cdr_on_non_pairs() {
        let heap = Heap::new(64);
        assert_eq!(heap.car(Val::fix(3)), UNDEF);
        assert_eq!(heap.cdr(NIL), UNDEF);
    }

    #[test]
    fn test_structural_equality() {
        let mut heap = Heap::new(64);
        let a = heap.list_from(&[Val::fix(1), Val::fix(2)]).unwrap();
        let b = heap.list_from(&[Val::fix(1), Val::fix(2)]).unwrap();
        let c = heap.list_from(&[Val::fix(1)]).unwrap();
        assert!(heap.equal(a, b).unwrap());
        assert!(!heap.equal(a, c).unwrap());
    }

    #[test]
    fn test_seal_makes_cells_permanent() {
        let mut heap = Heap::new(64);
        let a = heap.cons(NIL, NIL).unwrap();
        let b = heap.cons(NIL, NIL).unwrap();
        heap.free(b).unwrap();
        heap.seal().unwrap();
        assert_eq!(heap.free_count(), 0);
        assert!(heap.is_permanent(a));
        assert!(matches!(heap.free(a), Err(VmError::InvalidRef(_))));
        let c = heap.cons(NIL, NIL).unwrap();
        assert_ne!(c, b);
    }

    #[test]
    fn test_cycle_hits_budget() {
        let mut heap = Heap::new(64).with_sanity(16);
        let a = heap.cons(Val::fix(1), NIL).unwrap();
        heap.set_cdr(a, a).unwrap();
        assert_eq!(heap.list_len(a), Err(VmError::Runaway("list_len")));
    }
}
