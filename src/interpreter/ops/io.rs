use tracing::info;

use crate::interpreter::engine::Vm;
use crate::interpreter::errors::VmError;
use crate::interpreter::instr::Conversion;
use crate::memory::print::render;
use crate::memory::text::parse_fixnum;
use crate::memory::value::Val;

impl Vm {
    pub(crate) fn exec_cvt(&mut self, conv: Conversion) -> Result<(), VmError> {
        let chars = self.pop()?;
        let v = match conv {
            Conversion::ListToNumber => parse_fixnum(&self.heap, chars)?,
            Conversion::ListToSymbol => self.symbols.intern(&mut self.heap, chars)?,
        };
        self.push(v)
    }

    pub(crate) fn exec_putc(&mut self) -> Result<(), VmError> {
        let c = self.pop_fixnum("putc")?;
        self.console.putc((c & 0xFF) as u8);
        Ok(())
    }

    /// Push the next input byte, or -1 when none is ready
    pub(crate) fn exec_getc(&mut self) -> Result<(), VmError> {
        let c = self.console.getc().map_or(-1, i64::from);
        self.push(Val::fix(c))
    }

    pub(crate) fn exec_debug(&mut self, tag: Val) -> Result<(), VmError> {
        let v = self.pop()?;
        let text = render(&self.heap, v)?;
        info!(target: "ufork::debug", "[{:?}] {}", tag, text);
        self.trace.record(tag, text);
        Ok(())
    }
}
