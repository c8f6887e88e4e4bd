pub mod actor;
pub mod arith;
pub mod io;
pub mod list;
pub mod record;
pub mod stack;

// Each submodule adds `impl Vm` blocks for one family of instructions
use crate::interpreter::engine::{Flow, Vm};
use crate::interpreter::errors::VmError;
use crate::interpreter::instr::Instr;
use crate::memory::heap::Heap;
use crate::memory::value::Val;

impl Vm {
    /// Run one decoded instruction. `next` is its fall-through successor.
    pub(crate) fn perform(&mut self, instr: Instr, next: Val) -> Result<Flow, VmError> {
        match instr {
            Instr::Typeq(t) => self.exec_typeq(t)?,
            Instr::Cell(n) => self.exec_cell(n)?,
            Instr::Get(field) => self.exec_get(field)?,
            Instr::Set(field) => self.exec_set(field)?,
            Instr::Pair(n) => self.exec_pair(n)?,
            Instr::Part(n) => self.exec_part(n)?,
            Instr::Nth(n) => self.exec_nth(n)?,
            Instr::Push(v) => self.push(v)?,
            Instr::Depth => self.exec_depth()?,
            Instr::Drop(n) => self.exec_drop(n)?,
            Instr::Pick(n) => self.exec_pick(n)?,
            Instr::Dup(n) => self.exec_dup(n)?,
            Instr::Roll(n) => self.exec_roll(n)?,
            Instr::Alu(op) => self.exec_alu(op)?,
            Instr::Eq(v) => self.exec_eq(v)?,
            Instr::Cmp(rel) => self.exec_cmp(rel)?,
            Instr::If(target) => {
                let cond = self.pop()?;
                return Ok(Flow::Next(if Heap::truthy(cond) { target } else { next }));
            }
            Instr::Msg(n) => self.exec_msg(n)?,
            Instr::My(which) => self.exec_my(which)?,
            Instr::Send(n) => self.exec_send(n)?,
            Instr::New(n) => self.exec_new(n)?,
            Instr::Beh(n) => self.exec_beh(n)?,
            Instr::End(action) => {
                self.end_transaction(action)?;
                return Ok(Flow::End(action));
            }
            Instr::Cvt(conv) => self.exec_cvt(conv)?,
            Instr::Putc => self.exec_putc()?,
            Instr::Getc => self.exec_getc()?,
            Instr::Debug(tag) => self.exec_debug(tag)?,
        }
        Ok(Flow::Next(next))
    }
}
