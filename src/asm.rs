//! Program builder
//!
//! Programs are cell graphs. [`Assembler`] lays out instruction chains from
//! [`Instr`] sequences and keeps named entry points, so host code and tests
//! can write behaviors without poking cells by hand:
//!
//! ```
//! use ufork::asm::Assembler;
//! use ufork::config::Config;
//! use ufork::interpreter::engine::Vm;
//! use ufork::interpreter::instr::{EndAction, Instr};
//! use ufork::memory::value::{Val, NIL, UNIT};
//!
//! let mut vm = Vm::new(Config::default()).unwrap();
//! let mut asm = Assembler::new(&mut vm);
//! let beh = asm
//!     .chain(&[Instr::Msg(0), Instr::Debug(Val::fix(1)), Instr::End(EndAction::Commit)], NIL)
//!     .unwrap();
//! let actor = asm.actor(beh, &[]).unwrap();
//! asm.finish().unwrap();
//!
//! vm.send(actor, UNIT).unwrap();
//! vm.run().unwrap();
//! assert_eq!(vm.trace().get_output(), vec!["[+1] #unit"]);
//! ```

use rustc_hash::FxHashMap;

use crate::interpreter::engine::Vm;
use crate::interpreter::errors::VmError;
use crate::interpreter::instr::Instr;
use crate::memory::text::list_from_str;
use crate::memory::value::{Val, INSTR_T, UNDEF};

pub struct Assembler<'vm> {
    vm: &'vm mut Vm,
    labels: FxHashMap<String, Val>,
}

impl<'vm> Assembler<'vm> {
    pub fn new(vm: &'vm mut Vm) -> Self {
        Assembler {
            vm,
            labels: FxHashMap::default(),
        }
    }

    /// Lay out `code` in order. The last instruction continues at `then`
    /// unless it is an `end`. Returns the entry point.
    pub fn chain(&mut self, code: &[Instr], then: Val) -> Result<Val, VmError> {
        let heap = self.vm.heap_mut();
        let mut next = then;
        for instr in code.iter().rev() {
            let (op, imm) = instr.encode();
            let z = if instr.is_terminal() { UNDEF } else { next };
            next = heap.alloc(INSTR_T, op, imm, z)?;
        }
        Ok(next)
    }

    /// A chain that must finish with `end`
    pub fn block(&mut self, code: &[Instr]) -> Result<Val, VmError> {
        match code.last() {
            Some(last) if last.is_terminal() => self.chain(code, UNDEF),
            _ => Err(VmError::Assertion("block must finish with `end`")),
        }
    }

    pub fn define(&mut self, name: &str, v: Val) -> Val {
        self.labels.insert(name.to_string(), v);
        v
    }

    pub fn label(&self, name: &str) -> Option<Val> {
        self.labels.get(name).copied()
    }

    /// New idle actor with `state` as its state list
    pub fn actor(&mut self, beh: Val, state: &[Val]) -> Result<Val, VmError> {
        let state = self.vm.heap_mut().list_from(state)?;
        self.vm.new_actor(beh, state)
    }

    pub fn list(&mut self, items: &[Val]) -> Result<Val, VmError> {
        self.vm.heap_mut().list_from(items)
    }

    /// Character list
    pub fn string(&mut self, s: &str) -> Result<Val, VmError> {
        list_from_str(self.vm.heap_mut(), s)
    }

    pub fn symbol(&mut self, name: &str) -> Result<Val, VmError> {
        self.vm.intern(name)
    }

    /// Seal everything built so far into the permanent image and hand back
    /// the labels
    pub fn finish(self) -> Result<FxHashMap<String, Val>, VmError> {
        self.vm.seal()?;
        Ok(self.labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::interpreter::instr::{AluOp, EndAction};
    use crate::memory::value::NIL;

    #[test]
    fn test_chain_links_in_order() {
        let mut vm = Vm::new(Config::default()).unwrap();
        let mut asm = Assembler::new(&mut vm);
        let entry = asm
            .chain(
                &[Instr::Push(Val::fix(1)), Instr::Alu(AluOp::Not), Instr::End(EndAction::Stop)],
                NIL,
            )
            .unwrap();
        let heap = vm.heap();
        let (first, second) = Instr::decode(heap, entry).unwrap();
        assert_eq!(first, Instr::Push(Val::fix(1)));
        let (instr, third) = Instr::decode(heap, second).unwrap();
        assert_eq!(instr, Instr::Alu(AluOp::Not));
        let (last, after) = Instr::decode(heap, third).unwrap();
        assert_eq!(last, Instr::End(EndAction::Stop));
        assert_eq!(after, UNDEF);
    }

    #[test]
    fn test_block_requires_end() {
        let mut vm = Vm::new(Config::default()).unwrap();
        let mut asm = Assembler::new(&mut vm);
        assert!(asm.block(&[Instr::Depth]).is_err());
        assert!(asm.block(&[]).is_err());
        assert!(asm.block(&[Instr::Depth, Instr::End(EndAction::Commit)]).is_ok());
    }

    #[test]
    fn test_finish_seals_and_returns_labels() {
        let mut vm = Vm::new(Config::default()).unwrap();
        let mut asm = Assembler::new(&mut vm);
        let code = asm.block(&[Instr::End(EndAction::Commit)]).unwrap();
        asm.define("main", code);
        assert_eq!(asm.label("main"), Some(code));
        assert_eq!(asm.label("missing"), None);
        let labels = asm.finish().unwrap();
        assert_eq!(labels["main"], code);
        assert!(vm.heap().is_permanent(code));
    }
}
