//! Runtime error types for the actor VM
//!
//! [`VmError`] covers everything that can go wrong while building or running
//! a program. Errors fall into two classes (see [`VmError::is_fatal`]):
//!
//! - recoverable: a bad operand or instruction. The current transaction is
//!   aborted and the scheduler carries on with the next continuation.
//! - fatal: an internal invariant no longer holds (heap exhausted, corrupt
//!   links, run-away traversal). The driver loop stops and returns the error.

use crate::memory::value::Val;

/// Runtime errors raised by the heap, collector and interpreter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    /// Operand of the wrong kind
    #[error("{op}: expected {expected}, got {got:?}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        got: Val,
    },

    /// Instruction cell carries an unknown opcode number
    #[error("illegal instruction: opcode {0:?}")]
    IllegalOpcode(Val),

    /// Immediate selector outside the opcode's range
    #[error("{op}: unknown selector {got:?}")]
    UnknownSelector { op: &'static str, got: Val },

    /// Negative or out-of-range count immediate
    #[error("{op}: invalid count {count}")]
    InvalidCount { op: &'static str, count: i64 },

    /// Read from an empty operand stack where a value is required
    #[error("{0}: stack underflow")]
    StackUnderflow(&'static str),

    /// Send target is not an actor capability
    #[error("send requires an actor, got {0:?}")]
    NotAnActor(Val),

    /// Actor cells must be created with `new`
    #[error("use `new` to create actors")]
    ActorViaCell,

    /// Instruction pointer does not address code
    #[error("{op}: expected code, got {got:?}")]
    NotCode { op: &'static str, got: Val },

    /// No free cells and no room above top
    #[error("out of cell memory ({capacity} cells)")]
    HeapExhausted { capacity: usize },

    /// A bounded traversal ran out of budget
    #[error("run-away loop in {0}")]
    Runaway(&'static str),

    /// Dereference of something that is not an allocated cell
    #[error("invalid cell reference {0:?}")]
    InvalidRef(Val),

    /// Cell freed twice
    #[error("double free of {0:?}")]
    DoubleFree(Val),

    /// Internal consistency check failed
    #[error("assertion failed: {0}")]
    Assertion(&'static str),
}

impl VmError {
    /// Fatal errors stop the driver loop; the rest abort one transaction
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VmError::HeapExhausted { .. }
                | VmError::Runaway(_)
                | VmError::InvalidRef(_)
                | VmError::DoubleFree(_)
                | VmError::Assertion(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::value::NIL;

    #[test]
    fn test_error_classes() {
        assert!(!VmError::IllegalOpcode(Val::fix(99)).is_fatal());
        assert!(!VmError::NotAnActor(NIL).is_fatal());
        assert!(VmError::HeapExhausted { capacity: 16 }.is_fatal());
        assert!(VmError::Runaway("list_len").is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = VmError::TypeMismatch {
            op: "alu",
            expected: "fixnum",
            got: NIL,
        };
        assert_eq!(err.to_string(), "alu: expected fixnum, got ()");
        assert_eq!(
            VmError::InvalidCount { op: "send", count: -1 }.to_string(),
            "send: invalid count -1"
        );
    }
}
