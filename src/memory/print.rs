//! S-expression rendering of heap values

use std::fmt::Write;

use super::heap::Heap;
use super::symbol::SymbolTable;
use super::value::{Val, ACTOR_T, EVENT_T, INSTR_T, NIL, PAIR_T, SYMBOL_T};
use super::Budget;
use crate::interpreter::errors::VmError;

/// Render `v` the way the `debug` instruction prints it
pub fn render(heap: &Heap, v: Val) -> Result<String, VmError> {
    let mut out = String::new();
    let mut budget = heap.budget("render");
    render_into(heap, v, &mut out, &mut budget)?;
    Ok(out)
}

fn render_into(heap: &Heap, v: Val, out: &mut String, budget: &mut Budget) -> Result<(), VmError> {
    budget.spend()?;
    if v.is_fix() || v.reserved_name().is_some() {
        let _ = write!(out, "{:?}", v);
        return Ok(());
    }
    if v.is_cap() {
        let kind = if heap.is_actor(v) { "actor" } else { "cap" };
        let _ = write!(out, "#{}@{}", kind, v.index());
        return Ok(());
    }
    if !heap.is_cell(v) {
        let _ = write!(out, "{:?}", v);
        return Ok(());
    }
    let t = heap.t(v)?;
    if t == PAIR_T {
        out.push('(');
        let mut p = v;
        loop {
            budget.spend()?;
            render_into(heap, heap.car(p), out, budget)?;
            p = heap.cdr(p);
            if heap.is_pair(p) {
                out.push(' ');
            } else {
                break;
            }
        }
        if p != NIL {
            out.push_str(" . ");
            render_into(heap, p, out, budget)?;
        }
        out.push(')');
    } else if t == SYMBOL_T {
        out.push_str(&SymbolTable::name(heap, v)?);
    } else {
        let kind = if t == INSTR_T {
            "code"
        } else if t == EVENT_T {
            "event"
        } else if t == ACTOR_T {
            "actor-ref"
        } else {
            "cell"
        };
        let _ = write!(out, "#{}^{}", kind, v.index());
    }
    Ok(())
}
