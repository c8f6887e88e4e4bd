use crate::interpreter::engine::Vm;
use crate::interpreter::errors::VmError;
use crate::interpreter::instr::{AluOp, Relation};
use crate::memory::text::char_in_class;
use crate::memory::value::Val;

impl Vm {
    /// Fixnum arithmetic. Binary operators pop `m` then `n` and push
    /// `n op m`.
    pub(crate) fn exec_alu(&mut self, op: AluOp) -> Result<(), VmError> {
        let m = if op == AluOp::Not {
            0
        } else {
            self.pop_fixnum("alu")?
        };
        let n = self.pop_fixnum("alu")?;
        self.push(Val::fix(op.apply(n, m)))
    }

    pub(crate) fn exec_eq(&mut self, expected: Val) -> Result<(), VmError> {
        let v = self.pop()?;
        self.push(Val::bool(v == expected))
    }

    /// `eq`/`ne` compare any two values; the ordering relations and `cls`
    /// need fixnums
    pub(crate) fn exec_cmp(&mut self, rel: Relation) -> Result<(), VmError> {
        let result = match rel {
            Relation::Eq | Relation::Ne => {
                let m = self.pop()?;
                let n = self.pop()?;
                (n == m) == (rel == Relation::Eq)
            }
            _ => {
                let m = self.pop_fixnum("cmp")?;
                let n = self.pop_fixnum("cmp")?;
                match rel {
                    Relation::Ge => n >= m,
                    Relation::Gt => n > m,
                    Relation::Lt => n < m,
                    Relation::Le => n <= m,
                    _ => char_in_class(n, m),
                }
            }
        };
        self.push(Val::bool(result))
    }
}
