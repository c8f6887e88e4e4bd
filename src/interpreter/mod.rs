//! Actor VM execution engine
//!
//! This module provides the core execution logic:
//! - [`engine`]: the [`engine::Vm`] and its interrupt/dispatch/execute loop
//! - [`transaction`]: opening and ending actor transactions
//! - [`instr`]: instruction decoding
//! - [`ops`]: one `impl Vm` block per instruction family
//! - [`errors`]: runtime error types
//!
//! # Execution Model
//!
//! An event addressed to an idle actor becomes a continuation: the actor's
//! behavior as instruction pointer, a fresh copy of its state as operand
//! stack, and the event itself. Continuations run round-robin, one
//! instruction per turn, until they reach `end`. Effects are buffered on the
//! actor and only published when the transaction commits.

pub mod constants;
pub mod engine;
pub mod errors;
pub mod instr;
pub mod ops;
pub mod transaction;
