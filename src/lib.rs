//! # Introduction
//!
//! uFork is a virtual machine for actors. Every piece of state lives in
//! fixed-size four-field cells on a garbage-collected heap, and all work is
//! done by actors reacting to messages. Each message is handled as a
//! transaction: effects stay private to the actor until it commits, and an
//! actor handles one message at a time.
//!
//! ## Execution pipeline
//!
//! ```text
//! Assembler → cell image → events → dispatch → continuations → execute
//!                             ↑                                   │
//!                             └────────── commit (sends) ─────────┘
//! ```
//!
//! 1. [`asm`]: builds instruction chains and actors in the heap.
//! 2. [`interpreter`]: the [`interpreter::engine::Vm`] that dispatches events
//!    to idle actors and interleaves their continuations one instruction at a
//!    time.
//! 3. [`memory`]: the tagged [`memory::value::Val`] word, the
//!    [`memory::heap::Heap`] of cells, queues, symbols and printing.
//! 4. [`gc`]: stop-the-world mark-sweep and an incremental tri-color
//!    collector behind one trait.
//! 5. [`device`]: console, clock and debug-trace devices.
//! 6. [`config`]: tunables, validated before a VM is built.
//! 7. [`demo`]: programs used by the `ufork` binary.
//!
//! ## Instruction set
//!
//! Cells: `typeq`, `cell`, `get`, `set`. Lists: `pair`, `part`, `nth`.
//! Stack: `push`, `depth`, `drop`, `pick`, `dup`, `roll`.
//! Arithmetic: `alu`, `eq`, `cmp`. Control: `if`, `msg`, `my`.
//! Actors: `send`, `new`, `beh`, `end`. I/O: `cvt`, `putc`, `getc`, `debug`.

pub mod asm;
pub mod config;
pub mod demo;
pub mod device;
pub mod gc;
pub mod interpreter;
pub mod memory;
