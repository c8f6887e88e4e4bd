//! The actor VM and its driver loop
//!
//! [`Vm`] owns everything a running program touches: the cell heap, the
//! event and continuation queues, the symbol table, pinned roots, the
//! collector and the devices. Nothing is global, so independent VMs can run
//! side by side.
//!
//! # Driver loop
//!
//! ```text
//! loop {
//!     interrupt()   // clock device may enqueue one event
//!     dispatch()    // at most one event becomes a continuation
//!     execute()     // one instruction of the head continuation
//! }
//! ```
//!
//! The loop is finished when `execute` finds no continuation to run.

use tracing::{debug, error, warn};

use super::errors::VmError;
use super::instr::{EndAction, Instr};
use crate::config::{Config, ConfigError};
use crate::device::clock::{Clock, ClockDevice};
use crate::device::console::{Console, NullConsole};
use crate::device::trace::TraceLog;
use crate::gc::{collector_for, Collector, GcReport, Roots};
use crate::memory::heap::Heap;
use crate::memory::queue::{EventQueue, Fifo};
use crate::memory::symbol::SymbolTable;
use crate::memory::value::{Val, ACTOR_T, EVENT_T, NIL, UNDEF};

/// Root view over the VM's fields, usable while other fields are borrowed
macro_rules! roots {
    ($vm:expr) => {
        Roots {
            events: $vm.events.head(),
            conts: $vm.conts.head(),
            symbols: $vm.symbols.buckets(),
            pinned: &$vm.roots,
        }
    };
}

/// Runtime counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Events turned into continuations
    pub dispatched: u64,
    /// Events put back because their target was busy
    pub requeued: u64,
    /// Events dropped because their target no longer exists
    pub dropped: u64,
    pub instructions: u64,
    pub commits: u64,
    pub aborts: u64,
    pub releases: u64,
    pub stops: u64,
    pub clock_events: u64,
    pub gc_cycles: u64,
}

/// Result of one dispatch step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Event queue was empty
    Idle,
    /// Target busy; the event went back to the tail
    Busy(Val),
    /// Target gone; the event was freed
    Dropped(Val),
    /// A continuation was queued
    Spawned(Val),
}

/// Result of one execute step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    NoThreads,
    /// Instruction ran; the continuation is queued again
    Continue,
    /// The continuation finished its transaction
    Retired(EndAction),
}

/// Where control goes after an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Next(Val),
    End(EndAction),
}

/// An actor virtual machine
pub struct Vm {
    pub(crate) heap: Heap,
    pub(crate) events: EventQueue,
    pub(crate) conts: Fifo,
    pub(crate) symbols: SymbolTable,
    pub(crate) roots: Vec<Val>,
    gc: Box<dyn Collector>,
    pub(crate) console: Box<dyn Console>,
    clock: Option<ClockDevice>,
    pub(crate) trace: TraceLog,
    pub(crate) stats: Stats,
    config: Config,
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("top", &self.heap.top())
            .field("free", &self.heap.free_count())
            .field("events", &self.events)
            .field("conts", &self.conts)
            .field("gc", &self.gc)
            .field("stats", &self.stats)
            .finish()
    }
}

impl Vm {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut heap = Heap::new(config.heap_capacity).with_sanity(config.effective_sanity());
        let gc = collector_for(&config, &mut heap);
        debug!(
            capacity = config.heap_capacity,
            gc = gc.name(),
            "vm created"
        );
        Ok(Vm {
            heap,
            events: EventQueue::new(),
            conts: Fifo::new(),
            symbols: SymbolTable::new(),
            roots: Vec::new(),
            gc,
            console: Box::new(NullConsole),
            clock: None,
            trace: TraceLog::new(),
            stats: Stats::default(),
            config,
        })
    }

    pub fn with_console(mut self, console: impl Console + 'static) -> Self {
        self.console = Box::new(console);
        self
    }

    pub fn set_console(&mut self, console: Box<dyn Console>) {
        self.console = console;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    pub fn stats(&self) -> Stats {
        Stats {
            gc_cycles: self.gc.cycles(),
            ..self.stats
        }
    }

    pub fn collector_name(&self) -> &'static str {
        self.gc.name()
    }

    /// Intern a symbol by name
    pub fn intern(&mut self, name: &str) -> Result<Val, VmError> {
        self.symbols.intern_str(&mut self.heap, name)
    }

    /// Keep `v` (and everything reachable from it) alive across collections
    pub fn mark_root(&mut self, v: Val) {
        self.heap.shade(v);
        self.roots.push(v);
    }

    /// Make every cell built so far permanent (the program image)
    pub fn seal(&mut self) -> Result<(), VmError> {
        self.heap.seal()
    }

    /// Create an actor from host code, returning its capability
    pub fn new_actor(&mut self, beh: Val, state: Val) -> Result<Val, VmError> {
        if !self.heap.is_code(beh) {
            return Err(VmError::NotCode {
                op: "new_actor",
                got: beh,
            });
        }
        if state != NIL && !self.heap.is_pair(state) {
            return Err(VmError::TypeMismatch {
                op: "new_actor",
                expected: "state list",
                got: state,
            });
        }
        let actor = self.heap.alloc(ACTOR_T, beh, state, UNDEF)?;
        Ok(actor.to_cap())
    }

    /// Queue a message for `target` from outside any transaction
    pub fn send(&mut self, target: Val, message: Val) -> Result<(), VmError> {
        if !self.heap.is_actor(target) {
            return Err(VmError::NotAnActor(target));
        }
        let event = self.heap.alloc(EVENT_T, target, message, NIL)?;
        self.events.put(&mut self.heap, event)
    }

    /// Deliver one epoch-seconds message to `handler` per elapsed second
    pub fn attach_clock(&mut self, clock: impl Clock + 'static, handler: Val) -> Result<(), VmError> {
        if !self.heap.is_actor(handler) {
            return Err(VmError::NotAnActor(handler));
        }
        self.mark_root(handler);
        self.clock = Some(ClockDevice::new(Box::new(clock), handler));
        Ok(())
    }

    /// Events waiting in the queue, head first
    pub fn pending_events(&self) -> Result<Vec<Val>, VmError> {
        self.events.to_vec(&self.heap)
    }

    /// Continuations waiting to run, head first
    pub fn threads(&self) -> Result<Vec<Val>, VmError> {
        self.conts.to_vec(&self.heap)
    }

    pub fn is_idle(&self) -> bool {
        self.events.is_empty() && self.conts.is_empty()
    }

    /// Run a full collection now
    pub fn collect(&mut self) -> Result<GcReport, VmError> {
        let roots = roots!(self);
        self.gc.collect(&mut self.heap, &roots)
    }

    /// Service the clock device
    pub fn interrupt(&mut self) -> Result<bool, VmError> {
        let Some(clock) = self.clock.as_mut() else {
            return Ok(false);
        };
        let Some(seconds) = clock.poll() else {
            return Ok(false);
        };
        let handler = clock.handler();
        if self.heap.is_actor(handler) {
            let event = self.heap.alloc(EVENT_T, handler, Val::fix(seconds), NIL)?;
            self.events.put(&mut self.heap, event)?;
            self.stats.clock_events += 1;
            debug!(seconds, "clock event");
        }
        Ok(true)
    }

    /// Turn the next event into a continuation, if its target is idle
    pub fn dispatch(&mut self) -> Result<Dispatch, VmError> {
        let Some(event) = self.events.pop(&mut self.heap)? else {
            return Ok(Dispatch::Idle);
        };
        let target = self.heap.x(event)?;
        if !self.heap.is_actor(target) {
            warn!(event = ?event, target = ?target, "dropping event for missing actor");
            self.heap.free(event)?;
            self.stats.dropped += 1;
            return Ok(Dispatch::Dropped(event));
        }
        let actor = target.to_ref();
        if self.heap.z(actor)? != UNDEF {
            if self.config.trace_dispatch {
                debug!(event = ?event, target = ?target, "dispatch busy");
            }
            self.events.put(&mut self.heap, event)?;
            self.stats.requeued += 1;
            return Ok(Dispatch::Busy(event));
        }
        let ip = self.heap.x(actor)?;
        if !self.heap.is_code(ip) {
            return Err(VmError::Assertion("actor behavior is not code"));
        }
        let state = self.heap.y(actor)?;
        self.heap.set_z(actor, NIL)?;
        let sp = self.copy_list(state)?;
        let cont = self.heap.alloc(ip, sp, event, NIL)?;
        self.conts.put(&mut self.heap, cont)?;
        self.stats.dispatched += 1;
        if self.config.trace_dispatch {
            debug!(cont = ?cont, ip = ?ip, event = ?event, "thread spawn");
        }
        Ok(Dispatch::Spawned(cont))
    }

    /// Run one instruction of the head continuation
    pub fn execute(&mut self) -> Result<Step, VmError> {
        let cont = self.conts.head();
        if cont == NIL {
            return Ok(Step::NoThreads);
        }
        {
            let roots = roots!(self);
            self.gc.step(&mut self.heap, &roots)?;
        }
        let ip = self.heap.t(cont)?;
        self.stats.instructions += 1;
        let outcome = Instr::decode(&self.heap, ip).and_then(|(instr, next)| {
            let flow = self.perform(instr, next)?;
            match flow {
                Flow::Next(next) if !self.heap.is_code(next) => Err(VmError::NotCode {
                    op: "next instruction",
                    got: next,
                }),
                flow => Ok(flow),
            }
        });
        let flow = match outcome {
            Ok(flow) => flow,
            Err(err) if err.is_fatal() => {
                error!(%err, ip = ?ip, "fatal fault");
                return Err(err);
            }
            Err(err) => {
                error!(%err, ip = ?ip, "instruction failed, aborting transaction");
                self.abort_transaction()?;
                Flow::End(EndAction::Abort)
            }
        };
        match flow {
            Flow::Next(next) => {
                self.heap.set_t(cont, next)?;
                if let Some(cont) = self.conts.pop(&mut self.heap)? {
                    self.conts.put(&mut self.heap, cont)?;
                }
                Ok(Step::Continue)
            }
            Flow::End(action) => {
                self.retire()?;
                Ok(Step::Retired(action))
            }
        }
    }

    /// Free the finished head continuation and its event, then maybe collect
    fn retire(&mut self) -> Result<(), VmError> {
        let cont = self
            .conts
            .pop(&mut self.heap)?
            .ok_or(VmError::Assertion("no continuation to retire"))?;
        let event = self.heap.y(cont)?;
        self.heap.free(event)?;
        self.heap.free(cont)?;
        let roots = roots!(self);
        if let Some(report) = self.gc.safepoint(&mut self.heap, &roots)? {
            debug!(%report, "safepoint collection");
        }
        Ok(())
    }

    /// One interrupt/dispatch/execute cycle. Returns false once no
    /// continuation was left to run.
    ///
    /// Events for missing actors are skipped within the same cycle, so a
    /// dropped event never ends the run while deliverable ones are queued.
    pub fn tick(&mut self) -> Result<bool, VmError> {
        self.interrupt()?;
        let mut budget = self.heap.budget("dispatch");
        while let Dispatch::Dropped(_) = self.dispatch()? {
            budget.spend()?;
        }
        Ok(self.execute()? != Step::NoThreads)
    }

    /// Run until no continuation is left
    pub fn run(&mut self) -> Result<Stats, VmError> {
        while self.tick()? {}
        Ok(self.stats())
    }

    /// Run at most `limit` cycles. Returns true if the loop finished.
    pub fn run_for(&mut self, limit: usize) -> Result<bool, VmError> {
        for _ in 0..limit {
            if !self.tick()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Fresh copy of a list spine, so the new continuation owns its stack
    fn copy_list(&mut self, list: Val) -> Result<Val, VmError> {
        let items = self.heap.list_to_vec(list)?;
        self.heap.list_from(&items)
    }
}
