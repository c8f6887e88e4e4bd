//! Stop-the-world mark-sweep
//!
//! One mark bit per cell. A collection clears every bit and empties the free
//! list, marks everything reachable from the roots, then sweeps the heap from
//! top down, reclaiming every unmarked cell. The sweep therefore rebuilds the
//! free list from scratch, lowest address first.

use std::fmt::Write;

use tracing::{debug, info, warn};

use super::{Collector, GcReport, Roots};
use crate::config::Config;
use crate::interpreter::errors::VmError;
use crate::memory::heap::Heap;
use crate::memory::value::{
    Val, ACTOR_T, EVENT_T, FREE_T, INSTR_T, LITERAL_T, PAIR_T, START, SYMBOL_T, TYPE_T,
};

#[derive(Debug, Clone)]
pub struct MarkSweep {
    bits: Vec<u64>,
    top_margin: usize,
    low_water: usize,
    critical: usize,
    automatic: bool,
    cycles: u64,
}

impl MarkSweep {
    /// Collector that runs at safepoints when memory gets tight
    pub fn new(config: &Config) -> Self {
        MarkSweep {
            bits: vec![0; config.heap_capacity.div_ceil(64)],
            top_margin: config.gc_top_margin,
            low_water: config.gc_low_water,
            critical: config.gc_critical,
            automatic: true,
            cycles: 0,
        }
    }

    /// Collector that only runs when asked
    pub fn manual(config: &Config) -> Self {
        MarkSweep {
            automatic: false,
            ..Self::new(config)
        }
    }

    #[inline]
    fn is_marked(&self, index: usize) -> bool {
        self.bits[index / 64] & (1 << (index % 64)) != 0
    }

    #[inline]
    fn set_mark(&mut self, index: usize) {
        self.bits[index / 64] |= 1 << (index % 64);
    }

    fn clear(&mut self, heap: &mut Heap) {
        if self.bits.len() * 64 < heap.capacity() {
            self.bits.resize(heap.capacity().div_ceil(64), 0);
        }
        self.bits.iter_mut().for_each(|word| *word = 0);
        for index in 0..START {
            self.set_mark(index);
        }
        heap.clear_free_list();
    }

    /// Mark everything reachable from `root`: T, X and Z through a work
    /// list, Y (the cdr-chain) by iteration
    fn mark_from(&mut self, heap: &Heap, root: Val, work: &mut Vec<Val>) -> usize {
        let cells = heap.cells();
        let top = heap.top();
        let mut count = 0;
        work.push(root);
        while let Some(mut v) = work.pop() {
            loop {
                if v.is_fix() {
                    break;
                }
                let index = v.index();
                if index < START || index >= top || self.is_marked(index) {
                    break;
                }
                let cell = &cells[index];
                if cell.t == FREE_T {
                    break;
                }
                self.set_mark(index);
                count += 1;
                work.push(cell.t);
                work.push(cell.x);
                work.push(cell.z);
                v = cell.y;
            }
        }
        count
    }

    fn mark_roots(&mut self, heap: &Heap, roots: &Roots<'_>) -> usize {
        let mut work = Vec::new();
        let mut count = START;
        for &bucket in roots.symbols {
            count += self.mark_from(heap, bucket, &mut work);
        }
        for root in roots.direct() {
            count += self.mark_from(heap, root, &mut work);
        }
        for index in START..heap.permanent_boundary() {
            count += self.mark_from(heap, Val::ptr(index), &mut work);
        }
        count
    }

    fn sweep(&mut self, heap: &mut Heap) -> usize {
        let mut reclaimed = 0;
        for index in (heap.permanent_boundary()..heap.top()).rev() {
            if !self.is_marked(index) {
                heap.reclaim(index);
                reclaimed += 1;
            }
        }
        reclaimed
    }

    /// One full collection, optionally logging a memory map
    pub fn mark_and_sweep(
        &mut self,
        heap: &mut Heap,
        roots: &Roots<'_>,
        dump: bool,
    ) -> Result<GcReport, VmError> {
        self.cycles += 1;
        self.clear(heap);
        let marked = self.mark_roots(heap, roots);
        if dump {
            info!("memory map\n{}", self.dump_map(heap));
        }
        let available = self.sweep(heap);
        let report = GcReport {
            top: heap.top(),
            marked,
            free: heap.free_count(),
        };
        debug!(cycle = self.cycles, available, "{}", report);
        Ok(report)
    }

    /// One character per cell, 64 cells per line
    pub fn dump_map(&self, heap: &Heap) -> String {
        let mut out = String::new();
        for index in 0..heap.top() {
            if index > 0 && index % 64 == 0 {
                out.push('\n');
            }
            let c = if !self.is_marked(index) {
                '.'
            } else {
                match heap.cells()[index].t {
                    t if t == LITERAL_T => 'l',
                    t if t == TYPE_T => 't',
                    t if t == EVENT_T => 'E',
                    t if t == INSTR_T => 'i',
                    t if t == ACTOR_T => 'A',
                    t if t == SYMBOL_T => 'S',
                    t if t == PAIR_T => 'p',
                    t if t == FREE_T => '?',
                    _ => 'K',
                }
            };
            out.push(c);
        }
        let _ = write!(out, "\ntop={} free={}", heap.top(), heap.free_count());
        out
    }
}

impl Collector for MarkSweep {
    fn name(&self) -> &'static str {
        if self.automatic {
            "mark-sweep"
        } else {
            "manual"
        }
    }

    fn collect(&mut self, heap: &mut Heap, roots: &Roots<'_>) -> Result<GcReport, VmError> {
        self.mark_and_sweep(heap, roots, false)
    }

    fn safepoint(
        &mut self,
        heap: &mut Heap,
        roots: &Roots<'_>,
    ) -> Result<Option<GcReport>, VmError> {
        if !self.automatic
            || heap.unallocated() >= self.top_margin
            || heap.free_count() >= self.low_water
        {
            return Ok(None);
        }
        let mut report = self.mark_and_sweep(heap, roots, false)?;
        if heap.free_count() < self.critical {
            warn!(free = heap.free_count(), "low on cell memory");
            report = self.mark_and_sweep(heap, roots, true)?;
        }
        Ok(Some(report))
    }

    fn cycles(&self) -> u64 {
        self.cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::value::{NIL, UNDEF};

    fn roots<'a>(events: Val, pinned: &'a [Val]) -> Roots<'a> {
        Roots {
            events,
            conts: NIL,
            symbols: &[],
            pinned,
        }
    }

    #[test]
    fn test_unreachable_cells_are_reclaimed() {
        let config = Config::default().with_heap_capacity(256);
        let mut heap = Heap::new(256);
        let mut gc = MarkSweep::new(&config);
        let kept = heap.list_from(&[Val::fix(1), Val::fix(2)]).unwrap();
        let lost = heap.cons(Val::fix(3), NIL).unwrap();
        let report = gc.collect(&mut heap, &roots(NIL, &[kept])).unwrap();
        assert!(heap.free_list_contains(lost).unwrap());
        assert!(!heap.free_list_contains(kept).unwrap());
        assert_eq!(heap.car(kept), Val::fix(1));
        assert_eq!(report.free, 1);
        assert_eq!(gc.cycles(), 1);
    }

    #[test]
    fn test_long_list_marks_without_recursion() {
        let config = Config::default().with_heap_capacity(8192);
        let mut heap = Heap::new(8192);
        let mut gc = MarkSweep::new(&config);
        let mut list = NIL;
        for n in 0..5000 {
            list = heap.cons(Val::fix(n), list).unwrap();
        }
        gc.collect(&mut heap, &roots(NIL, &[list])).unwrap();
        assert_eq!(heap.list_len(list).unwrap(), 5000);
        assert_eq!(heap.free_count(), 0);
    }

    #[test]
    fn test_free_cells_stay_free() {
        let config = Config::default().with_heap_capacity(256);
        let mut heap = Heap::new(256);
        let mut gc = MarkSweep::new(&config);
        let a = heap.cons(UNDEF, NIL).unwrap();
        heap.free(a).unwrap();
        // a stale root pointing at a free cell must not resurrect it
        gc.collect(&mut heap, &roots(NIL, &[a])).unwrap();
        assert_eq!(heap.free_list_len().unwrap(), 1);
        assert!(heap.is_free(a));
    }

    #[test]
    fn test_safepoint_waits_for_pressure() {
        let config = Config::default().with_heap_capacity(1024);
        let mut heap = Heap::new(1024);
        let mut gc = MarkSweep::new(&config);
        heap.cons(UNDEF, NIL).unwrap();
        assert_eq!(gc.safepoint(&mut heap, &roots(NIL, &[])).unwrap(), None);
        while heap.unallocated() > 0 {
            heap.cons(UNDEF, NIL).unwrap();
        }
        let report = gc.safepoint(&mut heap, &roots(NIL, &[])).unwrap();
        assert!(report.is_some());
        assert_eq!(heap.free_count(), 1024 - START);
    }

    #[test]
    fn test_manual_mode_ignores_safepoints() {
        let config = Config::default().with_heap_capacity(128);
        let mut heap = Heap::new(128);
        let mut gc = MarkSweep::manual(&config);
        while heap.unallocated() > 0 {
            heap.cons(UNDEF, NIL).unwrap();
        }
        assert_eq!(gc.safepoint(&mut heap, &roots(NIL, &[])).unwrap(), None);
        gc.collect(&mut heap, &roots(NIL, &[])).unwrap();
        assert_eq!(heap.free_count(), 128 - START);
    }

    #[test]
    fn test_dump_map_shape() {
        let config = Config::default().with_heap_capacity(256);
        let mut heap = Heap::new(256);
        let mut gc = MarkSweep::new(&config);
        let pair = heap.cons(UNDEF, NIL).unwrap();
        gc.collect(&mut heap, &roots(NIL, &[pair])).unwrap();
        let map = gc.dump_map(&heap);
        assert!(map.starts_with("llllltttttttt"));
        assert!(map.contains('p'));
    }
}
