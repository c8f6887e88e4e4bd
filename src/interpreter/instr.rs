//! Instruction cells
//!
//! An instruction is a cell `{t: Instr_T, x: opcode, y: immediate, z: next}`.
//! Code is a chain of such cells; `if` is the only instruction with two
//! successors (`y` when true, `z` when false) and `end` has none.
//!
//! [`Instr`] is the decoded form: one variant per opcode with a typed
//! immediate. [`Instr::decode`] reads a cell, [`Instr::encode`] produces the
//! `(x, y)` pair to store in one.

use super::errors::VmError;
use crate::memory::heap::Heap;
use crate::memory::value::{Val, UNDEF};
use crate::memory::Field;

/// Opcode numbers as stored in an instruction's X field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Typeq = 0,
    Cell = 1,
    Get = 2,
    Set = 3,
    Pair = 4,
    Part = 5,
    Nth = 6,
    Push = 7,
    Depth = 8,
    Drop = 9,
    Pick = 10,
    Dup = 11,
    Roll = 12,
    Alu = 13,
    Eq = 14,
    Cmp = 15,
    If = 16,
    Msg = 17,
    My = 18,
    Send = 19,
    New = 20,
    Beh = 21,
    End = 22,
    Cvt = 23,
    Putc = 24,
    Getc = 25,
    Debug = 26,
}

impl Opcode {
    const ALL: [Opcode; 27] = [
        Opcode::Typeq,
        Opcode::Cell,
        Opcode::Get,
        Opcode::Set,
        Opcode::Pair,
        Opcode::Part,
        Opcode::Nth,
        Opcode::Push,
        Opcode::Depth,
        Opcode::Drop,
        Opcode::Pick,
        Opcode::Dup,
        Opcode::Roll,
        Opcode::Alu,
        Opcode::Eq,
        Opcode::Cmp,
        Opcode::If,
        Opcode::Msg,
        Opcode::My,
        Opcode::Send,
        Opcode::New,
        Opcode::Beh,
        Opcode::End,
        Opcode::Cvt,
        Opcode::Putc,
        Opcode::Getc,
        Opcode::Debug,
    ];

    pub fn from_val(v: Val) -> Option<Opcode> {
        let n = v.as_fix()?;
        usize::try_from(n).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn to_val(self) -> Val {
        Val::fix(self as i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Not = 0,
    And = 1,
    Or = 2,
    Xor = 3,
    Add = 4,
    Sub = 5,
    Mul = 6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Eq = 0,
    Ge = 1,
    Gt = 2,
    Lt = 3,
    Le = 4,
    Ne = 5,
    /// Character-class membership
    Cls = 6,
}

/// What `my` reads from the running actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Me {
    SelfCap = 0,
    Beh = 1,
    State = 2,
}

/// How a transaction ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndAction {
    Abort = -1,
    Stop = 0,
    Commit = 1,
    Release = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Character list to fixnum
    ListToNumber = 0,
    /// Character list to interned symbol
    ListToSymbol = 1,
}

macro_rules! selector {
    ($ty:ty, $op:literal, { $($n:literal => $variant:expr),+ $(,)? }) => {
        impl $ty {
            pub fn from_val(v: Val) -> Result<Self, VmError> {
                match v.as_fix() {
                    $(Some($n) => Ok($variant),)+
                    _ => Err(VmError::UnknownSelector { op: $op, got: v }),
                }
            }

            pub fn to_val(self) -> Val {
                Val::fix(self as i64)
            }
        }
    };
}

selector!(AluOp, "alu", {
    0 => AluOp::Not, 1 => AluOp::And, 2 => AluOp::Or, 3 => AluOp::Xor,
    4 => AluOp::Add, 5 => AluOp::Sub, 6 => AluOp::Mul,
});
selector!(Relation, "cmp", {
    0 => Relation::Eq, 1 => Relation::Ge, 2 => Relation::Gt, 3 => Relation::Lt,
    4 => Relation::Le, 5 => Relation::Ne, 6 => Relation::Cls,
});
selector!(Me, "my", { 0 => Me::SelfCap, 1 => Me::Beh, 2 => Me::State });
selector!(EndAction, "end", {
    -1 => EndAction::Abort, 0 => EndAction::Stop, 1 => EndAction::Commit, 2 => EndAction::Release,
});
selector!(Conversion, "cvt", { 0 => Conversion::ListToNumber, 1 => Conversion::ListToSymbol });

impl AluOp {
    /// `n op m`, wrapping. `not` ignores `m`.
    pub fn apply(self, n: i64, m: i64) -> i64 {
        match self {
            AluOp::Not => !n,
            AluOp::And => n & m,
            AluOp::Or => n | m,
            AluOp::Xor => n ^ m,
            AluOp::Add => n.wrapping_add(m),
            AluOp::Sub => n.wrapping_sub(m),
            AluOp::Mul => n.wrapping_mul(m),
        }
    }
}

/// A decoded instruction (successor not included)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    /// Is the popped value of this type
    Typeq(Val),
    /// Allocate a cell from 1 to 4 popped fields
    Cell(i64),
    Get(Field),
    Set(Field),
    Pair(i64),
    Part(i64),
    Nth(i64),
    Push(Val),
    Depth,
    Drop(i64),
    Pick(i64),
    Dup(i64),
    Roll(i64),
    Alu(AluOp),
    /// Compare the popped value with the immediate
    Eq(Val),
    Cmp(Relation),
    /// Branch to the immediate when the popped value is not `#f`
    If(Val),
    Msg(i64),
    My(Me),
    Send(i64),
    New(i64),
    Beh(i64),
    End(EndAction),
    Cvt(Conversion),
    Putc,
    Getc,
    /// Pop and trace a value, labeled with the immediate
    Debug(Val),
}

fn count(op: &'static str, v: Val) -> Result<i64, VmError> {
    v.as_fix().ok_or(VmError::TypeMismatch {
        op,
        expected: "fixnum immediate",
        got: v,
    })
}

fn field(v: Val) -> Result<Field, VmError> {
    v.as_fix()
        .and_then(Field::from_fix)
        .ok_or(VmError::UnknownSelector { op: "field", got: v })
}

impl Instr {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instr::Typeq(_) => Opcode::Typeq,
            Instr::Cell(_) => Opcode::Cell,
            Instr::Get(_) => Opcode::Get,
            Instr::Set(_) => Opcode::Set,
            Instr::Pair(_) => Opcode::Pair,
            Instr::Part(_) => Opcode::Part,
            Instr::Nth(_) => Opcode::Nth,
            Instr::Push(_) => Opcode::Push,
            Instr::Depth => Opcode::Depth,
            Instr::Drop(_) => Opcode::Drop,
            Instr::Pick(_) => Opcode::Pick,
            Instr::Dup(_) => Opcode::Dup,
            Instr::Roll(_) => Opcode::Roll,
            Instr::Alu(_) => Opcode::Alu,
            Instr::Eq(_) => Opcode::Eq,
            Instr::Cmp(_) => Opcode::Cmp,
            Instr::If(_) => Opcode::If,
            Instr::Msg(_) => Opcode::Msg,
            Instr::My(_) => Opcode::My,
            Instr::Send(_) => Opcode::Send,
            Instr::New(_) => Opcode::New,
            Instr::Beh(_) => Opcode::Beh,
            Instr::End(_) => Opcode::End,
            Instr::Cvt(_) => Opcode::Cvt,
            Instr::Putc => Opcode::Putc,
            Instr::Getc => Opcode::Getc,
            Instr::Debug(_) => Opcode::Debug,
        }
    }

    /// Immediate operand as stored in the Y field
    pub fn immediate(&self) -> Val {
        match *self {
            Instr::Typeq(v) | Instr::Push(v) | Instr::Eq(v) | Instr::If(v) | Instr::Debug(v) => v,
            Instr::Cell(n)
            | Instr::Pair(n)
            | Instr::Part(n)
            | Instr::Nth(n)
            | Instr::Drop(n)
            | Instr::Pick(n)
            | Instr::Dup(n)
            | Instr::Roll(n)
            | Instr::Msg(n)
            | Instr::Send(n)
            | Instr::New(n)
            | Instr::Beh(n) => Val::fix(n),
            Instr::Get(f) | Instr::Set(f) => Val::fix(f as i64),
            Instr::Alu(op) => op.to_val(),
            Instr::Cmp(rel) => rel.to_val(),
            Instr::My(me) => me.to_val(),
            Instr::End(action) => action.to_val(),
            Instr::Cvt(conv) => conv.to_val(),
            Instr::Depth | Instr::Putc | Instr::Getc => UNDEF,
        }
    }

    /// `(x, y)` fields for an instruction cell
    pub fn encode(&self) -> (Val, Val) {
        (self.opcode().to_val(), self.immediate())
    }

    /// Does control never fall through to the Z successor
    pub fn is_terminal(&self) -> bool {
        matches!(self, Instr::End(_))
    }

    /// Decode the instruction cell at `ip`, returning it with its successor
    pub fn decode(heap: &Heap, ip: Val) -> Result<(Instr, Val), VmError> {
        if !heap.is_code(ip) {
            return Err(VmError::NotCode {
                op: "execute",
                got: ip,
            });
        }
        let cell = heap.cell(ip)?;
        let op = Opcode::from_val(cell.x).ok_or(VmError::IllegalOpcode(cell.x))?;
        let y = cell.y;
        let instr = match op {
            Opcode::Typeq => Instr::Typeq(y),
            Opcode::Cell => Instr::Cell(count("cell", y)?),
            Opcode::Get => Instr::Get(field(y)?),
            Opcode::Set => Instr::Set(field(y)?),
            Opcode::Pair => Instr::Pair(count("pair", y)?),
            Opcode::Part => Instr::Part(count("part", y)?),
            Opcode::Nth => Instr::Nth(count("nth", y)?),
            Opcode::Push => Instr::Push(y),
            Opcode::Depth => Instr::Depth,
            Opcode::Drop => Instr::Drop(count("drop", y)?),
            Opcode::Pick => Instr::Pick(count("pick", y)?),
            Opcode::Dup => Instr::Dup(count("dup", y)?),
            Opcode::Roll => Instr::Roll(count("roll", y)?),
            Opcode::Alu => Instr::Alu(AluOp::from_val(y)?),
            Opcode::Eq => Instr::Eq(y),
            Opcode::Cmp => Instr::Cmp(Relation::from_val(y)?),
            Opcode::If => Instr::If(y),
            Opcode::Msg => Instr::Msg(count("msg", y)?),
            Opcode::My => Instr::My(Me::from_val(y)?),
            Opcode::Send => Instr::Send(count("send", y)?),
            Opcode::New => Instr::New(count("new", y)?),
            Opcode::Beh => Instr::Beh(count("beh", y)?),
            Opcode::End => Instr::End(EndAction::from_val(y)?),
            Opcode::Cvt => Instr::Cvt(Conversion::from_val(y)?),
            Opcode::Putc => Instr::Putc,
            Opcode::Getc => Instr::Getc,
            Opcode::Debug => Instr::Debug(y),
        };
        Ok((instr, cell.z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::value::{INSTR_T, NIL};

    fn store(heap: &mut Heap, instr: Instr, next: Val) -> Val {
        let (x, y) = instr.encode();
        heap.alloc(INSTR_T, x, y, next).unwrap()
    }

    #[test]
    fn test_decode_round_trip() {
        let mut heap = Heap::new(128);
        let end = store(&mut heap, Instr::End(EndAction::Commit), UNDEF);
        let ip = store(&mut heap, Instr::Alu(AluOp::Add), end);
        assert_eq!(
            Instr::decode(&heap, ip).unwrap(),
            (Instr::Alu(AluOp::Add), end)
        );
        assert_eq!(
            Instr::decode(&heap, end).unwrap().0,
            Instr::End(EndAction::Commit)
        );
    }

    #[test]
    fn test_opcode_numbering() {
        assert_eq!(Opcode::Typeq.to_val(), Val::fix(0));
        assert_eq!(Opcode::Send.to_val(), Val::fix(19));
        assert_eq!(Opcode::Debug.to_val(), Val::fix(26));
        assert_eq!(Opcode::from_val(Val::fix(22)), Some(Opcode::End));
        assert_eq!(Opcode::from_val(Val::fix(27)), None);
        assert_eq!(Opcode::from_val(Val::fix(-1)), None);
        assert_eq!(EndAction::Abort.to_val(), Val::fix(-1));
    }

    #[test]
    fn test_unknown_opcode_is_recoverable() {
        let mut heap = Heap::new(128);
        let ip = heap.alloc(INSTR_T, Val::fix(99), UNDEF, NIL).unwrap();
        let err = Instr::decode(&heap, ip).unwrap_err();
        assert_eq!(err, VmError::IllegalOpcode(Val::fix(99)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_bad_selector() {
        let mut heap = Heap::new(128);
        let ip = heap
            .alloc(INSTR_T, Opcode::Alu.to_val(), Val::fix(12), NIL)
            .unwrap();
        assert!(matches!(
            Instr::decode(&heap, ip),
            Err(VmError::UnknownSelector { op: "alu", .. })
        ));
    }
}
