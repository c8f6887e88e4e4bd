//! Actor transactions
//!
//! Dispatching an event opens a transaction on its target: the actor's
//! marker goes from `UNDEF` (idle) to `NIL` (busy, nothing pending). While it
//! runs, `send` prepends new events to the marker and `beh` records a pending
//! behavior on the event being handled. Nothing becomes visible to the rest
//! of the system until `end`:
//!
//! | action  | pending sends | pending `beh` | stored state | marker  |
//! |---------|---------------|---------------|--------------|---------|
//! | ABORT   | freed         | discarded     | unchanged    | `UNDEF` |
//! | STOP    | kept          | discarded     | unchanged    | kept    |
//! | COMMIT  | queued        | applied       | replaced     | `UNDEF` |
//! | RELEASE | queued        | discarded     | `NIL`        | freed   |
//!
//! Committed events reach the queue in the order they were sent. A replaced
//! state list may still be referenced through `my state`, so it is left to
//! the collector.

use tracing::{debug, warn};

use super::engine::Vm;
use super::errors::VmError;
use super::instr::EndAction;
use crate::memory::value::{Val, NIL, UNDEF};

impl Vm {
    /// Head continuation
    pub(crate) fn cont(&self) -> Val {
        self.conts.head()
    }

    /// Event being handled by the head continuation
    pub(crate) fn event(&self) -> Result<Val, VmError> {
        self.heap.y(self.cont())
    }

    /// Actor cell (not capability) running the head continuation
    pub(crate) fn me(&self) -> Result<Val, VmError> {
        let target = self.heap.x(self.event()?)?;
        if !self.heap.is_actor(target) {
            return Err(VmError::Assertion("running continuation has no actor"));
        }
        Ok(target.to_ref())
    }

    /// Record a new behavior and state to install at commit
    pub(crate) fn stage_become(&mut self, beh: Val, state: Val) -> Result<(), VmError> {
        self.discard_become()?;
        let staged = self.heap.cons(beh, state)?;
        let event = self.event()?;
        self.heap.set_z(event, staged)
    }

    fn take_become(&mut self) -> Result<Option<(Val, Val)>, VmError> {
        let event = self.event()?;
        let staged = self.heap.z(event)?;
        if !self.heap.is_pair(staged) {
            return Ok(None);
        }
        let beh_state = (self.heap.car(staged), self.heap.cdr(staged));
        self.heap.set_z(event, NIL)?;
        self.heap.free(staged)?;
        Ok(Some(beh_state))
    }

    fn discard_become(&mut self) -> Result<(), VmError> {
        if let Some((_, state)) = self.take_become()? {
            self.heap.free_list_spine(state)?;
        }
        Ok(())
    }

    /// Pending events of `me`, oldest send first
    fn pending(&self, me: Val) -> Result<Vec<Val>, VmError> {
        let mut budget = self.heap.budget("pending events");
        let mut sent = Vec::new();
        let mut event = self.heap.z(me)?;
        while self.heap.is_event(event) {
            budget.spend()?;
            sent.push(event);
            event = self.heap.z(event)?;
        }
        sent.reverse();
        Ok(sent)
    }

    /// Queue the pending events of `me`. A target released while this
    /// transaction was open gets nothing.
    fn flush_pending(&mut self, me: Val) -> Result<usize, VmError> {
        let mut delivered = 0;
        for event in self.pending(me)? {
            let target = self.heap.x(event)?;
            if self.heap.is_actor(target) {
                self.events.put(&mut self.heap, event)?;
                delivered += 1;
            } else {
                warn!(event = ?event, target = ?target, "dropping send to missing actor");
                self.heap.free(event)?;
                self.stats.dropped += 1;
            }
        }
        Ok(delivered)
    }

    /// Finish the running transaction
    pub(crate) fn end_transaction(&mut self, action: EndAction) -> Result<(), VmError> {
        let me = self.me()?;
        match action {
            EndAction::Abort => {
                let reason = self.pop()?;
                debug!(actor = ?me.to_cap(), reason = ?reason, "abort");
                self.abort_transaction()?;
            }
            EndAction::Stop => {
                self.discard_become()?;
                self.clear_stack()?;
                self.stats.stops += 1;
                debug!(actor = ?me.to_cap(), "stop");
            }
            EndAction::Commit => {
                self.clear_stack()?;
                if let Some((beh, state)) = self.take_become()? {
                    self.heap.set_x(me, beh)?;
                    self.heap.set_y(me, state)?;
                }
                let sent = self.flush_pending(me)?;
                self.heap.set_z(me, UNDEF)?;
                self.stats.commits += 1;
                if self.config().trace_dispatch {
                    debug!(actor = ?me.to_cap(), sent, "commit");
                }
            }
            EndAction::Release => {
                self.discard_become()?;
                self.clear_stack()?;
                let sent = self.flush_pending(me)?;
                self.heap.set_y(me, NIL)?;
                if self.heap.is_permanent(me) {
                    warn!(actor = ?me.to_cap(), "permanent actor cannot be released");
                    self.heap.set_z(me, UNDEF)?;
                } else {
                    self.heap.free(me)?;
                }
                self.stats.releases += 1;
                debug!(actor = ?me.to_cap(), sent, "release");
            }
        }
        Ok(())
    }

    /// Roll the running transaction back and make its actor idle again
    pub(crate) fn abort_transaction(&mut self) -> Result<(), VmError> {
        let me = self.me()?;
        self.discard_become()?;
        self.clear_stack()?;
        for event in self.pending(me)? {
            self.heap.free(event)?;
        }
        self.heap.set_z(me, UNDEF)?;
        self.stats.aborts += 1;
        Ok(())
    }
}
