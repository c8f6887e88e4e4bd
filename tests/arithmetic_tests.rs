use ufork::asm::Assembler;
use ufork::config::Config;
use ufork::interpreter::engine::Vm;
use ufork::interpreter::instr::{AluOp, Conversion, EndAction, Instr, Me, Relation};
use ufork::memory::value::{Val, ACTOR_T, FIXNUM_T, NIL, PAIR_T, UNIT};
use ufork::memory::Field;

const OUT: Val = Val::fix(1);

/// Run one transaction of a fresh actor and return the VM. `build` returns
/// the code, which gets `debug` and `end commit` appended.
fn run_with(build: impl FnOnce(&mut Assembler<'_>) -> Vec<Instr>) -> Vm {
    let mut vm = Vm::new(Config::default()).expect("default config");
    let mut asm = Assembler::new(&mut vm);
    let mut code = build(&mut asm);
    code.push(Instr::Debug(OUT));
    code.push(Instr::End(EndAction::Commit));
    let beh = asm.block(&code).expect("behavior");
    let actor = asm.actor(beh, &[]).expect("actor");
    asm.finish().expect("seal");
    vm.send(actor, UNIT).expect("send");
    vm.run().expect("run");
    vm
}

fn output(code: Vec<Instr>) -> Vec<String> {
    let vm = run_with(|_| code);
    vm.trace()
        .values_for(OUT)
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn push(n: i64) -> Instr {
    Instr::Push(Val::fix(n))
}

#[test]
fn test_alu_operations() {
    assert_eq!(output(vec![push(3), push(4), Instr::Alu(AluOp::Add)]), ["+7"]);
    assert_eq!(output(vec![push(10), push(3), Instr::Alu(AluOp::Sub)]), ["+7"]);
    assert_eq!(output(vec![push(-6), push(7), Instr::Alu(AluOp::Mul)]), ["-42"]);
    assert_eq!(output(vec![push(12), push(10), Instr::Alu(AluOp::And)]), ["+8"]);
    assert_eq!(output(vec![push(12), push(3), Instr::Alu(AluOp::Or)]), ["+15"]);
    assert_eq!(output(vec![push(5), push(1), Instr::Alu(AluOp::Xor)]), ["+4"]);
    assert_eq!(output(vec![push(0), Instr::Alu(AluOp::Not)]), ["-1"]);
}

#[test]
fn test_comparisons() {
    assert_eq!(output(vec![push(7), push(3), Instr::Cmp(Relation::Lt)]), ["#f"]);
    assert_eq!(output(vec![push(7), push(3), Instr::Cmp(Relation::Gt)]), ["#t"]);
    assert_eq!(output(vec![push(3), push(3), Instr::Cmp(Relation::Ge)]), ["#t"]);
    assert_eq!(output(vec![push(4), push(3), Instr::Cmp(Relation::Le)]), ["#f"]);
    assert_eq!(
        output(vec![Instr::Push(NIL), Instr::Push(NIL), Instr::Cmp(Relation::Eq)]),
        ["#t"]
    );
    assert_eq!(output(vec![Instr::Push(UNIT), push(0), Instr::Cmp(Relation::Ne)]), ["#t"]);
    // '7' is a digit
    assert_eq!(output(vec![push(55), push(0x02), Instr::Cmp(Relation::Cls)]), ["#t"]);
    assert_eq!(output(vec![push(5), Instr::Eq(Val::fix(5))]), ["#t"]);
}

#[test]
fn test_non_fixnum_operand_aborts_the_transaction() {
    let vm = run_with(|_| vec![Instr::Push(NIL), push(4), Instr::Alu(AluOp::Add)]);
    assert!(vm.trace().is_empty());
    assert_eq!(vm.stats().aborts, 1);
    assert_eq!(vm.stats().commits, 0);
    assert!(vm.is_idle());
}

#[test]
fn test_roll_and_pick() {
    // roll 3 brings the third item up
    assert_eq!(
        output(vec![push(1), push(2), push(3), Instr::Roll(3), Instr::Pair(2)]),
        ["(+1 +3 . +2)"]
    );
    // roll -3 sinks the top to third place
    assert_eq!(
        output(vec![push(1), push(2), push(3), Instr::Roll(-3), Instr::Pair(2)]),
        ["(+2 +1 . +3)"]
    );
    assert_eq!(output(vec![push(1), push(2), Instr::Pick(2)]), ["+1"]);
    assert_eq!(
        output(vec![push(1), push(2), Instr::Dup(2), Instr::Pair(3)]),
        ["(+2 +1 +2 . +1)"]
    );
}

#[test]
fn test_stack_underflow_policy() {
    // roll up past the bottom pushes UNDEF
    assert_eq!(output(vec![push(1), Instr::Roll(3), Instr::Pair(1)]), ["(#? . +1)"]);
    // roll down past the bottom drops the top
    assert_eq!(output(vec![push(1), push(2), Instr::Roll(-3)]), ["+1"]);
    assert_eq!(output(vec![push(1), Instr::Pick(3)]), ["#?"]);
    assert_eq!(output(vec![push(1), push(2), Instr::Drop(5), Instr::Depth]), ["+0"]);
    assert_eq!(output(vec![push(9), push(8), Instr::Depth]), ["+2"]);
}

#[test]
fn test_pair_part_nth() {
    assert_eq!(
        output(vec![Instr::Push(NIL), push(3), push(2), push(1), Instr::Pair(3)]),
        ["(+1 +2 +3)"]
    );
    assert_eq!(
        output(vec![
            Instr::Push(NIL),
            push(3),
            push(2),
            push(1),
            Instr::Pair(3),
            Instr::Part(2),
            Instr::Pair(1),
        ]),
        ["(+1 . +2)"]
    );
    assert_eq!(
        output(vec![Instr::Push(NIL), push(3), push(2), Instr::Pair(2), Instr::Nth(-1)]),
        ["(+3)"]
    );
    assert_eq!(
        output(vec![Instr::Push(NIL), push(3), push(2), Instr::Pair(2), Instr::Nth(5)]),
        ["#?"]
    );
}

#[test]
fn test_cells_and_types() {
    assert_eq!(
        output(vec![Instr::Push(PAIR_T), push(1), Instr::Push(NIL), Instr::Cell(3)]),
        ["(+1)"]
    );
    assert_eq!(
        output(vec![
            Instr::Push(PAIR_T),
            push(1),
            Instr::Push(NIL),
            Instr::Cell(3),
            push(5),
            Instr::Set(Field::X),
            Instr::Get(Field::X),
        ]),
        ["+5"]
    );
    assert_eq!(output(vec![push(3), Instr::Typeq(FIXNUM_T)]), ["#t"]);
    assert_eq!(output(vec![Instr::My(Me::SelfCap), Instr::Typeq(ACTOR_T)]), ["#t"]);
    assert_eq!(output(vec![push(3), Instr::Typeq(PAIR_T)]), ["#f"]);

    // actors only come from `new`
    let vm = run_with(|_| vec![Instr::Push(ACTOR_T), Instr::Cell(1)]);
    assert_eq!(vm.stats().aborts, 1);
}

#[test]
fn test_conversions() {
    let vm = run_with(|asm| {
        let digits = asm.string("-12_3x4").unwrap();
        vec![Instr::Push(digits), Instr::Cvt(Conversion::ListToNumber)]
    });
    assert_eq!(vm.trace().values_for(OUT), ["-123"]);

    let vm = run_with(|asm| {
        let known = asm.symbol("hello").unwrap();
        let chars = asm.string("hello").unwrap();
        vec![
            Instr::Push(chars),
            Instr::Cvt(Conversion::ListToSymbol),
            Instr::Dup(1),
            Instr::Debug(Val::fix(2)),
            Instr::Eq(known),
        ]
    });
    assert_eq!(vm.trace().values_for(Val::fix(2)), ["hello"]);
    assert_eq!(vm.trace().values_for(OUT), ["#t"]);
}

#[test]
fn test_if_branches_on_exact_false() {
    let mut vm = Vm::new(Config::default()).unwrap();
    let mut asm = Assembler::new(&mut vm);
    let yes = asm.block(&[push(1), Instr::Debug(OUT), Instr::End(EndAction::Commit)]).unwrap();
    let no = asm.block(&[push(0), Instr::Debug(OUT), Instr::End(EndAction::Commit)]).unwrap();
    // everything but #f counts as true, including () and 0
    let beh = asm.chain(&[Instr::Msg(0), Instr::If(yes)], no).unwrap();
    let actor = asm.actor(beh, &[]).unwrap();
    asm.finish().unwrap();

    for msg in [Val::fix(0), NIL, Val::bool(false), Val::bool(true)] {
        vm.send(actor, msg).unwrap();
    }
    vm.run().unwrap();
    // busy re-queues rotate the queue, so only the multiset is fixed
    let mut seen = vm.trace().values_for(OUT);
    seen.sort_unstable();
    assert_eq!(seen, ["+0", "+1", "+1", "+1"]);
}
