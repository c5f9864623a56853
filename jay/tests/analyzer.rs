use anyhow::Result;
use pretty_assertions::assert_eq;
use jay::analysis::analyzer::Analyzer;
use jay::analysis::basic::{BasicInterpreter, BasicValue};
use jay::analysis::frame::Frame;
use jay::error::Error;
use jay::tree::class::ClassName;
use jay::tree::method::code::{Code, Insn, InsnList, Label, LvIndex, TryCatchBlock};
use jay::tree::method::{Method, MethodAccess, MethodDescriptor, MethodName};

fn static_method(descriptor: &str, max_stack: u16, max_locals: u16, insns: Vec<Insn>) -> Method {
	let access = MethodAccess { is_static: true, ..MethodAccess::default() };
	let mut method = Method::new(access, MethodName::from("run"), MethodDescriptor::from(descriptor));
	let instructions: InsnList = insns.into_iter().collect();
	method.code = Some(Code::new(max_stack, max_locals, instructions));
	method
}

fn analyze(method: &Method) -> Result<Vec<Option<Frame<BasicValue>>>> {
	let owner = ClassName::from("com/example/Main");
	Analyzer::new(BasicInterpreter).analyze(owner.as_slice(), method)
}

fn var(index: u16) -> LvIndex {
	LvIndex { index }
}

#[test]
fn pop_of_a_long_fails_with_the_instruction_index() {
	let method = static_method("()V", 3, 0, vec![
		Insn::IConst1,
		Insn::LConst1,
		Insn::Pop,
		Insn::Return,
	]);
	let err = analyze(&method).unwrap_err();
	match err.downcast_ref::<Error>() {
		Some(Error::AnalysisFailed { index, .. }) => assert_eq!(*index, 2),
		other => panic!("expected AnalysisFailed, got {other:?}"),
	}
	assert!(format!("{err:#}").contains("illegal stack"), "{err:#}");
}

#[test]
fn pop2_of_a_long_succeeds() -> Result<()> {
	let method = static_method("()V", 3, 0, vec![
		Insn::IConst1,
		Insn::LConst1,
		Insn::Pop2,
		Insn::Return,
	]);
	let frames = analyze(&method)?;
	assert_eq!(frames.len(), 4);
	assert!(frames.iter().all(Option::is_some));
	// the int is still there when the method returns
	let at_return = frames[3].as_ref().expect("reachable");
	assert_eq!(at_return.stack_size(), 1);
	assert_eq!(at_return.stack(0)?, &BasicValue::Int);
	Ok(())
}

#[test]
fn dead_code_gets_no_frames() -> Result<()> {
	let method = static_method("()I", 1, 0, vec![
		Insn::IConst0,
		Insn::IReturn,
		Insn::IConst1,
		Insn::IReturn,
	]);
	let frames = analyze(&method)?;
	assert_eq!(frames.len(), 4);
	assert!(frames[0].is_some());
	assert!(frames[1].is_some());
	assert!(frames[2].is_none());
	assert!(frames[3].is_none());
	Ok(())
}

#[test]
fn abstract_methods_are_skipped() -> Result<()> {
	let access = MethodAccess { is_abstract: true, ..MethodAccess::default() };
	let method = Method::new(access, MethodName::from("run"), MethodDescriptor::from("()V"));
	assert_eq!(analyze(&method)?.len(), 0);
	Ok(())
}

#[test]
fn falling_off_the_end_is_detected() {
	let method = static_method("()V", 1, 0, vec![
		Insn::Nop,
	]);
	let err = analyze(&method).unwrap_err();
	assert!(matches!(err.downcast_ref::<Error>(), Some(Error::FallOffEnd)), "{err:?}");
}

#[test]
fn parameters_seed_the_entry_frame() -> Result<()> {
	let method = static_method("(IJ)V", 1, 4, vec![
		Insn::Return,
	]);
	let frames = analyze(&method)?;
	let entry = frames[0].as_ref().expect("reachable");
	assert_eq!(entry.local(0)?, &BasicValue::Int);
	assert_eq!(entry.local(1)?, &BasicValue::Long);
	// the second half of the long, and the untouched local after it
	assert_eq!(entry.local(2)?, &BasicValue::Uninitialized);
	assert_eq!(entry.local(3)?, &BasicValue::Uninitialized);
	Ok(())
}

#[test]
fn instance_methods_get_a_receiver() -> Result<()> {
	let mut method = Method::new(MethodAccess::default(), MethodName::from("run"), MethodDescriptor::from("()V"));
	method.code = Some(Code::new(1, 1, [Insn::Return].into_iter().collect()));
	let frames = analyze(&method)?;
	assert_eq!(frames[0].as_ref().expect("reachable").local(0)?, &BasicValue::Reference);
	Ok(())
}

#[test]
fn conditional_jumps_merge_both_paths() -> Result<()> {
	let target = Label::new();
	let method = static_method("(Z)I", 1, 1, vec![
		Insn::ILoad(var(0)),
		Insn::IfEq(target),
		Insn::IConst1,
		Insn::IReturn,
		Insn::Label(target),
		Insn::IConst0,
		Insn::IReturn,
	]);
	let frames = analyze(&method)?;
	assert!(frames.iter().all(Option::is_some));
	// both return sites see an int on the stack
	assert_eq!(frames[3].as_ref().expect("reachable").stack(0)?, &BasicValue::Int);
	assert_eq!(frames[6].as_ref().expect("reachable").stack(0)?, &BasicValue::Int);
	Ok(())
}

#[test]
fn merged_branches_join_their_values() -> Result<()> {
	let else_branch = Label::new();
	let join = Label::new();
	let method = static_method("(Z)V", 2, 2, vec![
		Insn::ILoad(var(0)),
		Insn::IfEq(else_branch),
		Insn::IConst0,
		Insn::IStore(var(1)),
		Insn::Goto(join),
		Insn::Label(else_branch),
		Insn::FConst0,
		Insn::FStore(var(1)),
		Insn::Label(join),
		Insn::Return,
	]);
	let frames = analyze(&method)?;
	// int on one path, float on the other: the join knows nothing
	let at_join = frames[8].as_ref().expect("reachable");
	assert_eq!(at_join.local(1)?, &BasicValue::Uninitialized);
	Ok(())
}

#[test]
fn lookup_switch_reaches_all_targets() -> Result<()> {
	let default = Label::new();
	let one = Label::new();
	let method = static_method("(I)I", 1, 1, vec![
		Insn::ILoad(var(0)),
		Insn::LookupSwitch { default, pairs: vec![(1, one)] },
		Insn::Label(one),
		Insn::IConst1,
		Insn::IReturn,
		Insn::Label(default),
		Insn::IConst0,
		Insn::IReturn,
	]);
	let frames = analyze(&method)?;
	assert!(frames.iter().all(Option::is_some));
	Ok(())
}

#[test]
fn exception_handlers_see_one_stack_value() -> Result<()> {
	let start = Label::new();
	let end = Label::new();
	let handler = Label::new();
	let mut method = static_method("()V", 2, 0, vec![
		Insn::Label(start),
		Insn::IConst0,
		Insn::Pop,
		Insn::Label(end),
		Insn::Return,
		Insn::Label(handler),
		Insn::AThrow,
	]);
	if let Some(code) = method.code.as_mut() {
		code.exception_table.push(TryCatchBlock { start, end, handler, catch: None });
	}

	let frames = analyze(&method)?;
	let at_handler = frames[5].as_ref().expect("the handler is reachable");
	assert_eq!(at_handler.stack_size(), 1);
	assert_eq!(at_handler.stack(0)?, &BasicValue::Reference);
	Ok(())
}

#[test]
fn subroutine_locals_merge_back_at_the_caller() -> Result<()> {
	let subroutine = Label::new();
	let method = static_method("(F)V", 2, 3, vec![
		Insn::FLoad(var(0)),
		Insn::FStore(var(1)),      // local 1 is a float before the call
		Insn::Jsr(subroutine),
		Insn::Return,              // 3: after the subroutine returns
		Insn::Label(subroutine),   // 4
		Insn::AStore(var(2)),      // spill the return address
		Insn::IConst0,
		Insn::IStore(var(1)),      // the subroutine overwrites local 1
		Insn::Ret(var(2)),
	]);
	let frames = analyze(&method)?;
	let after_call = frames[3].as_ref().expect("the return is reachable");
	// local 0 was never touched by the subroutine: taken from before the jsr
	assert_eq!(after_call.local(0)?, &BasicValue::Float);
	// locals 1 and 2 are in the subroutine's locals_used: taken from the ret
	assert_eq!(after_call.local(1)?, &BasicValue::Int);
	assert_eq!(after_call.local(2)?, &BasicValue::ReturnAddress);
	Ok(())
}

#[test]
fn nested_subroutine_calls_are_accepted() -> Result<()> {
	let outer = Label::new();
	let inner = Label::new();
	let method = static_method("()V", 2, 4, vec![
		Insn::Jsr(outer),
		Insn::Return,
		Insn::Label(outer),      // 2
		Insn::AStore(var(0)),
		Insn::Jsr(inner),
		Insn::Ret(var(0)),       // 5
		Insn::Label(inner),      // 6
		Insn::AStore(var(1)),
		Insn::Ret(var(1)),
	]);
	let frames = analyze(&method)?;
	assert!(frames.iter().all(Option::is_some));
	Ok(())
}

#[test]
fn ret_outside_a_subroutine_fails() {
	let method = static_method("()V", 1, 1, vec![
		Insn::AConstNull,
		Insn::AStore(var(0)),
		Insn::Ret(var(0)),
	]);
	let err = analyze(&method).unwrap_err();
	match err.downcast_ref::<Error>() {
		Some(Error::AnalysisFailed { index, .. }) => assert_eq!(*index, 2),
		other => panic!("expected AnalysisFailed, got {other:?}"),
	}
}
