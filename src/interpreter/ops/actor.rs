use super::list::extract_nth;
use crate::interpreter::engine::Vm;
use crate::interpreter::errors::VmError;
use crate::interpreter::instr::Me;
use crate::memory::value::{Val, ACTOR_T, EVENT_T, UNDEF};

impl Vm {
    pub(crate) fn exec_msg(&mut self, n: i64) -> Result<(), VmError> {
        let message = self.heap.y(self.event()?)?;
        let v = extract_nth(&self.heap, message, n);
        self.push(v)
    }

    pub(crate) fn exec_my(&mut self, which: Me) -> Result<(), VmError> {
        let me = self.me()?;
        let v = match which {
            Me::SelfCap => me.to_cap(),
            Me::Beh => self.heap.x(me)?,
            Me::State => self.heap.y(me)?,
        };
        self.push(v)
    }

    /// Pop a target, then a message (`send 0`) or `n` items as a list. The
    /// event is held on the sender's marker until commit.
    pub(crate) fn exec_send(&mut self, n: i64) -> Result<(), VmError> {
        let target = self.pop()?;
        if !self.heap.is_actor(target) {
            return Err(VmError::NotAnActor(target));
        }
        let message = if n == 0 {
            self.pop()?
        } else {
            let n = self.stack_count("send", n)?;
            let items = self.pop_n(n)?;
            self.heap.list_from(&items)?
        };
        let me = self.me()?;
        let pending = self.heap.z(me)?;
        let event = self.heap.alloc(EVENT_T, target, message, pending)?;
        self.heap.set_z(me, event)
    }

    fn pop_behavior(&mut self, op: &'static str) -> Result<Val, VmError> {
        let ip = self.pop()?;
        if !self.heap.is_code(ip) {
            return Err(VmError::NotCode { op, got: ip });
        }
        Ok(ip)
    }

    /// Pop a behavior, take `n` items as state, push the new actor's
    /// capability
    pub(crate) fn exec_new(&mut self, n: i64) -> Result<(), VmError> {
        let beh = self.pop_behavior("new")?;
        let state = self.carve(n, "new")?;
        let actor = self.heap.alloc(ACTOR_T, beh, state, UNDEF)?;
        self.push(actor.to_cap())
    }

    /// Like `new`, but the behavior and state replace the running actor's
    /// own when the transaction commits
    pub(crate) fn exec_beh(&mut self, n: i64) -> Result<(), VmError> {
        let beh = self.pop_behavior("beh")?;
        let state = self.carve(n, "beh")?;
        self.stage_become(beh, state)
    }
}
