// Defaults for the actor VM

/// Default heap size in cells
pub const DEFAULT_HEAP_CAPACITY: usize = 16 * 1024;

/// Mark-sweep runs only once fewer than this many cells remain above top...
pub const GC_TOP_MARGIN: usize = 256;

/// ...and the free list holds fewer than this many cells
pub const GC_LOW_WATER: usize = 64;

/// Below this many free cells after a collection, collect again and dump a map
pub const GC_CRITICAL: usize = 128;

/// Cells visited per incremental collector step
pub const GC_STRIDE: usize = 16;

/// Milliseconds between clock events
pub const CLOCK_PERIOD_MS: u64 = 1000;
