//! Garbage collection
//!
//! Two collectors share the [`Collector`] interface:
//! - [`mark_sweep::MarkSweep`]: stop-the-world, runs at safepoints when the
//!   heap is nearly full (or only on request, in manual mode)
//! - [`incremental::Incremental`]: tri-color marking in small steps, one step
//!   per executed instruction, backed by a write barrier in the heap
//!
//! Both treat the same locations as roots: the two queue heads, the symbol
//! table buckets, the pinned roots, and every permanent (sealed) cell.

pub mod incremental;
pub mod mark_sweep;

use std::fmt;

use crate::config::{Config, GcStrategy};
use crate::interpreter::errors::VmError;
use crate::memory::heap::Heap;
use crate::memory::value::Val;

/// Root locations for one collection
#[derive(Debug, Clone, Copy)]
pub struct Roots<'a> {
    pub events: Val,
    pub conts: Val,
    pub symbols: &'a [Val],
    pub pinned: &'a [Val],
}

impl Roots<'_> {
    /// Queue heads and pinned roots; symbols are walked separately
    pub fn direct(&self) -> impl Iterator<Item = Val> + '_ {
        [self.events, self.conts]
            .into_iter()
            .chain(self.pinned.iter().copied())
    }
}

/// Outcome of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GcReport {
    /// Heap top when the collection finished
    pub top: usize,
    /// Cells found live
    pub marked: usize,
    /// Free-list length afterwards
    pub free: usize,
}

impl fmt::Display for GcReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gc: top={} used={} free={}",
            self.top, self.marked, self.free
        )
    }
}

/// A garbage collection strategy
pub trait Collector: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Run a complete collection now
    fn collect(&mut self, heap: &mut Heap, roots: &Roots<'_>) -> Result<GcReport, VmError>;

    /// Called after a continuation retires
    fn safepoint(
        &mut self,
        _heap: &mut Heap,
        _roots: &Roots<'_>,
    ) -> Result<Option<GcReport>, VmError> {
        Ok(None)
    }

    /// Called before every instruction
    fn step(&mut self, _heap: &mut Heap, _roots: &Roots<'_>) -> Result<(), VmError> {
        Ok(())
    }

    /// Collection cycles started so far
    fn cycles(&self) -> u64;
}

/// Build the collector selected by `config`, preparing the heap for it
pub fn collector_for(config: &Config, heap: &mut Heap) -> Box<dyn Collector> {
    match config.gc {
        GcStrategy::MarkSweep => Box::new(mark_sweep::MarkSweep::new(config)),
        GcStrategy::Manual => Box::new(mark_sweep::MarkSweep::manual(config)),
        GcStrategy::Incremental => {
            heap.enable_colors();
            Box::new(incremental::Incremental::new(config))
        }
    }
}
