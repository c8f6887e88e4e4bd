//! Demo programs run by the `ufork` binary
//!
//! Each builder lays out its behaviors with an [`Assembler`], creates the
//! actors, and seals the image. The caller only has to send the first
//! message or attach a device.

use crate::asm::Assembler;
use crate::interpreter::engine::Vm;
use crate::interpreter::errors::VmError;
use crate::interpreter::instr::{AluOp, EndAction, Instr, Me};
use crate::memory::value::{Val, UNIT};

/// `debug` tag for clock event timestamps
pub const TICK_TAG: Val = Val::fix(1);
/// `debug` tag for the clock demo's running count
pub const COUNT_TAG: Val = Val::fix(2);

/// End-of-transmission (Ctrl-D) ends an interactive echo
const EOT: i64 = 4;

/// Echo actor: copy one byte from input to output per message, sending
/// itself another message until input runs dry. Returns the actor.
///
/// In `interactive` mode "no byte ready" just means try again, and only
/// Ctrl-D stops the loop.
pub fn echo(vm: &mut Vm, interactive: bool) -> Result<Val, VmError> {
    let mut asm = Assembler::new(vm);
    let again = [
        Instr::Push(UNIT),
        Instr::My(Me::SelfCap),
        Instr::Send(0),
        Instr::End(EndAction::Commit),
    ];
    let done = asm.block(&[Instr::Drop(1), Instr::End(EndAction::Commit)])?;
    asm.define("done", done);
    let resend = asm.block(&again)?;
    let write = asm.chain(&[Instr::Putc], resend)?;
    let beh = if interactive {
        let idle = asm.chain(&[Instr::Drop(1)], resend)?;
        asm.define("idle", idle);
        let check_eot = asm.chain(
            &[Instr::Dup(1), Instr::Eq(Val::fix(EOT)), Instr::If(done)],
            write,
        )?;
        asm.chain(
            &[Instr::Getc, Instr::Dup(1), Instr::Eq(Val::fix(-1)), Instr::If(idle)],
            check_eot,
        )?
    } else {
        asm.chain(
            &[Instr::Getc, Instr::Dup(1), Instr::Eq(Val::fix(-1)), Instr::If(done)],
            write,
        )?
    };
    asm.define("echo", beh);
    let actor = asm.actor(beh, &[])?;
    asm.finish()?;
    Ok(actor)
}

/// Clock handler: trace each timestamp, count the ticks in the actor's
/// state, and trace the count. Returns the actor.
pub fn clock_counter(vm: &mut Vm) -> Result<Val, VmError> {
    let mut asm = Assembler::new(vm);
    // the behavior refers to itself through `my beh`
    let beh = asm.block(&[
        Instr::Msg(0),
        Instr::Debug(TICK_TAG),
        Instr::Push(Val::fix(1)),
        Instr::Alu(AluOp::Add),
        Instr::Dup(1),
        Instr::Debug(COUNT_TAG),
        Instr::My(Me::Beh),
        Instr::Beh(1),
        Instr::End(EndAction::Commit),
    ])?;
    asm.define("tick", beh);
    let actor = asm.actor(beh, &[Val::fix(0)])?;
    asm.finish()?;
    Ok(actor)
}
