//! Incremental tri-color collector
//!
//! Every cell carries a [`Color`]: one of two alternating generation labels,
//! `Scan` (reachable but children not yet visited) or `Free`. Each call to
//! [`Collector::step`] does a bounded amount of work in the current phase:
//!
//! ```text
//! Flip  -> swap generations, shade queue heads and pinned roots
//! Roots -> shade symbol buckets and permanent cells, a stride at a time
//! Scan  -> promote Scan cells to the live generation, shading children
//! Sweep -> reclaim cells still labeled with the previous generation
//! ```
//!
//! The heap runs a write barrier while this collector is active: newly
//! allocated cells and every value stored into a cell are shaded live, so the
//! mutator can never hide a reachable cell from an in-progress cycle.

use tracing::debug;

use super::{Collector, GcReport, Roots};
use crate::config::Config;
use crate::interpreter::errors::VmError;
use crate::memory::heap::Heap;
use crate::memory::value::{Val, FREE_T, START};
use crate::memory::{Budget, Cell};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    GenX,
    GenY,
    Scan,
    Free,
}

/// Per-cell colors plus the current generation labels
#[derive(Debug, Clone)]
pub struct ColorMap {
    marks: Vec<Color>,
    prev: Color,
    next: Color,
}

impl ColorMap {
    pub(crate) fn new(cells: &[Cell], top: usize) -> Self {
        let marks = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if i < top && cell.t != FREE_T {
                    Color::GenX
                } else {
                    Color::Free
                }
            })
            .collect();
        ColorMap {
            marks,
            prev: Color::GenY,
            next: Color::GenX,
        }
    }

    pub fn color(&self, index: usize) -> Color {
        self.marks[index]
    }

    /// Label for cells proven live in the current cycle
    pub fn live(&self) -> Color {
        self.next
    }

    fn flip(&mut self) {
        std::mem::swap(&mut self.prev, &mut self.next);
    }

    fn collectable(cells: &[Cell], top: usize, v: Val) -> Option<usize> {
        if v.is_fix() {
            return None;
        }
        let index = v.index();
        (index >= START && index < top && cells[index].t != FREE_T).then_some(index)
    }

    /// Mark `v` live and queue its children for scanning
    pub(crate) fn mark_live(&mut self, cells: &[Cell], top: usize, v: Val) {
        let Some(index) = Self::collectable(cells, top, v) else {
            return;
        };
        self.marks[index] = self.next;
        for child in cells[index].fields() {
            if let Some(c) = Self::collectable(cells, top, child) {
                if self.marks[c] == self.prev {
                    self.marks[c] = Color::Scan;
                }
            }
        }
    }

    pub(crate) fn mark_free(&mut self, index: usize) {
        self.marks[index] = Color::Free;
    }

    /// Next cell in `lo..hi` with `color`, starting after `cursor` and
    /// wrapping around once
    fn find(&self, color: Color, lo: usize, hi: usize, cursor: &mut usize) -> Option<usize> {
        if lo >= hi {
            return None;
        }
        let span = hi - lo;
        let start = (*cursor).clamp(lo, hi - 1) - lo;
        for step in 1..=span {
            let index = lo + (start + step) % span;
            if self.marks[index] == color {
                *cursor = index;
                return Some(index);
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Flip,
    Roots,
    Scan,
    Sweep,
}

#[derive(Debug, Clone)]
pub struct Incremental {
    phase: Phase,
    index: usize,
    cursor: usize,
    stride: usize,
    cycles: u64,
    completed: u64,
}

impl Incremental {
    pub fn new(config: &Config) -> Self {
        Incremental {
            phase: Phase::Flip,
            index: 0,
            cursor: START,
            stride: config.gc_stride,
            cycles: 0,
            completed: 0,
        }
    }

    /// Cycles that have finished their sweep
    pub fn completed(&self) -> u64 {
        self.completed
    }

    fn flip(&mut self, heap: &mut Heap, roots: &Roots<'_>) {
        let Some((colors, cells, top)) = heap.colors_and_cells() else {
            return;
        };
        colors.flip();
        for root in roots.direct() {
            colors.mark_live(cells, top, root);
        }
        self.cycles += 1;
        self.phase = Phase::Roots;
        self.index = 0;
    }

    fn shade_roots(&mut self, heap: &mut Heap, roots: &Roots<'_>) {
        let boundary = heap.permanent_boundary();
        let Some((colors, cells, top)) = heap.colors_and_cells() else {
            return;
        };
        let total = roots.symbols.len() + boundary.saturating_sub(START);
        for _ in 0..self.stride {
            if self.index >= total {
                self.phase = Phase::Scan;
                self.cursor = START;
                return;
            }
            let root = match roots.symbols.get(self.index) {
                Some(&bucket) => bucket,
                None => Val::ptr(START + self.index - roots.symbols.len()),
            };
            colors.mark_live(cells, top, root);
            self.index += 1;
        }
    }

    fn scan(&mut self, heap: &mut Heap) {
        let boundary = heap.permanent_boundary();
        let Some((colors, cells, top)) = heap.colors_and_cells() else {
            return;
        };
        for _ in 0..self.stride {
            match colors.find(Color::Scan, START, top, &mut self.cursor) {
                Some(index) => colors.mark_live(cells, top, Val::ptr(index)),
                None => {
                    self.phase = Phase::Sweep;
                    self.cursor = boundary;
                    return;
                }
            }
        }
    }

    fn sweep(&mut self, heap: &mut Heap) {
        let lo = heap.permanent_boundary();
        let top = heap.top();
        for _ in 0..self.stride {
            let found = heap
                .colors()
                .and_then(|colors| colors.find(colors.prev, lo, top, &mut self.cursor));
            match found {
                Some(index) => heap.reclaim(index),
                None => {
                    self.completed += 1;
                    self.phase = Phase::Flip;
                    debug!(
                        cycle = self.cycles,
                        free = heap.free_count(),
                        "incremental gc cycle complete"
                    );
                    return;
                }
            }
        }
    }

    fn report(heap: &Heap) -> GcReport {
        let marked = heap.colors().map_or(0, |colors| {
            (START..heap.top())
                .filter(|&i| colors.color(i) == colors.live())
                .count()
        });
        GcReport {
            top: heap.top(),
            marked: marked + START,
            free: heap.free_count(),
        }
    }
}

impl Collector for Incremental {
    fn name(&self) -> &'static str {
        "incremental"
    }

    /// Finish the cycle in progress, then run one complete cycle
    fn collect(&mut self, heap: &mut Heap, roots: &Roots<'_>) -> Result<GcReport, VmError> {
        heap.enable_colors();
        let goal = self.completed + if self.phase == Phase::Flip { 1 } else { 2 };
        let mut budget = Budget::new(heap.capacity() * 8 + 1024, "incremental collect");
        while self.completed < goal {
            budget.spend()?;
            self.step(heap, roots)?;
        }
        Ok(Self::report(heap))
    }

    fn step(&mut self, heap: &mut Heap, roots: &Roots<'_>) -> Result<(), VmError> {
        match self.phase {
            Phase::Flip => self.flip(heap, roots),
            Phase::Roots => self.shade_roots(heap, roots),
            Phase::Scan => self.scan(heap),
            Phase::Sweep => self.sweep(heap),
        }
        Ok(())
    }

    fn cycles(&self) -> u64 {
        self.cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcStrategy;
    use crate::memory::value::{NIL, UNDEF};

    fn setup(capacity: usize) -> (Heap, Incremental) {
        let config = Config::default()
            .with_heap_capacity(capacity)
            .with_gc(GcStrategy::Incremental);
        let mut heap = Heap::new(capacity);
        heap.enable_colors();
        (heap, Incremental::new(&config))
    }

    fn roots(pinned: &[Val]) -> Roots<'_> {
        Roots {
            events: NIL,
            conts: NIL,
            symbols: &[],
            pinned,
        }
    }

    #[test]
    fn test_collect_reclaims_garbage_and_keeps_roots() {
        let (mut heap, mut gc) = setup(512);
        let kept = heap.list_from(&[Val::fix(1), Val::fix(2), Val::fix(3)]).unwrap();
        let lost = heap.list_from(&[Val::fix(4), Val::fix(5)]).unwrap();
        gc.collect(&mut heap, &roots(&[kept])).unwrap();
        assert!(heap.free_list_contains(lost).unwrap());
        assert!(!heap.free_list_contains(kept).unwrap());
        assert_eq!(
            heap.list_to_vec(kept).unwrap(),
            vec![Val::fix(1), Val::fix(2), Val::fix(3)]
        );
        assert_eq!(gc.completed(), 1);
    }

    #[test]
    fn test_barrier_protects_cells_allocated_mid_cycle() {
        let (mut heap, mut gc) = setup(512);
        let root = heap.cons(Val::fix(0), NIL).unwrap();
        let pinned = [root];
        // start a cycle, then hang a fresh cell off the already-scanned root
        for _ in 0..3 {
            gc.step(&mut heap, &roots(&pinned)).unwrap();
        }
        let fresh = heap.cons(Val::fix(9), NIL).unwrap();
        heap.set_cdr(root, fresh).unwrap();
        gc.collect(&mut heap, &roots(&pinned)).unwrap();
        assert!(!heap.free_list_contains(fresh).unwrap());
        assert_eq!(heap.car(heap.cdr(root)), Val::fix(9));
    }

    #[test]
    fn test_explicit_free_is_not_reclaimed_twice() {
        let (mut heap, mut gc) = setup(256);
        let a = heap.cons(UNDEF, NIL).unwrap();
        heap.free(a).unwrap();
        gc.collect(&mut heap, &roots(&[])).unwrap();
        gc.collect(&mut heap, &roots(&[])).unwrap();
        assert_eq!(heap.free_list_len().unwrap(), 1);
    }

    #[test]
    fn test_find_wraps_around() {
        let cells = vec![Cell::default(); 32];
        let mut map = ColorMap::new(&cells, 32);
        map.marks[START + 2] = Color::Scan;
        let mut cursor = START + 10;
        assert_eq!(map.find(Color::Scan, START, 32, &mut cursor), Some(START + 2));
        assert_eq!(cursor, START + 2);
    }
}
