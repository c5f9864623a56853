use anyhow::Result;
use pretty_assertions::assert_eq;
use jay::analysis::analyzer::Analyzer;
use jay::analysis::frame::Frame;
use jay::analysis::simple::{ObjectOracle, SimpleVerifier, TypedValue};
use jay::analysis::verifier::BasicVerifier;
use jay::error::Error;
use jay::tree::class::ClassName;
use jay::tree::descriptor::{ArrayType, Type};
use jay::tree::method::code::{Code, Insn, InsnList, Label, LvIndex};
use jay::tree::method::{Method, MethodAccess, MethodDescriptor, MethodName};

fn static_method(descriptor: &str, max_stack: u16, max_locals: u16, insns: Vec<Insn>) -> Method {
	let access = MethodAccess { is_static: true, ..MethodAccess::default() };
	let mut method = Method::new(access, MethodName::from("run"), MethodDescriptor::from(descriptor));
	let instructions: InsnList = insns.into_iter().collect();
	method.code = Some(Code::new(max_stack, max_locals, instructions));
	method
}

fn analyze_typed(method: &Method) -> Result<Vec<Option<Frame<TypedValue>>>> {
	let owner = ClassName::from("com/example/Main");
	Analyzer::new(SimpleVerifier::new(ObjectOracle)).analyze(owner.as_slice(), method)
}

fn assert_fails_verification(method: &Method, index: usize) {
	let owner = ClassName::from("com/example/Main");
	let err = Analyzer::new(SimpleVerifier::new(ObjectOracle))
		.analyze(owner.as_slice(), method)
		.unwrap_err();
	match err.downcast_ref::<Error>() {
		Some(Error::AnalysisFailed { index: at, .. }) => assert_eq!(*at, index),
		other => panic!("expected AnalysisFailed, got {other:?}"),
	}
	assert!(format!("{err:#}").contains("verification failed"), "{err:#}");
}

fn object(name: &str) -> Type {
	Type::Object(ClassName::from(name))
}

#[test]
fn unrelated_branch_values_merge_to_object() -> Result<()> {
	let else_branch = Label::new();
	let join = Label::new();
	let method = static_method("(I)Ljava/lang/Object;", 1, 1, vec![
		Insn::ILoad(LvIndex { index: 0 }),
		Insn::IfEq(else_branch),
		Insn::Ldc(jay::tree::method::code::Loadable::String("left".into())),
		Insn::Goto(join),
		Insn::Label(else_branch),
		Insn::New(ClassName::from("java/lang/Integer")),
		Insn::Label(join),
		Insn::AReturn,
	]);
	let frames = analyze_typed(&method)?;
	let at_return = frames[7].as_ref().expect("reachable");
	assert_eq!(at_return.stack(0)?, &TypedValue::Of(object("java/lang/Object")));
	Ok(())
}

#[test]
fn array_types_flow_through_loads() -> Result<()> {
	// String[][] element loads give String[]
	let method = static_method("([[Ljava/lang/String;)[Ljava/lang/String;", 2, 1, vec![
		Insn::ALoad(LvIndex { index: 0 }),
		Insn::IConst0,
		Insn::AALoad,
		Insn::AReturn,
	]);
	let frames = analyze_typed(&method)?;
	let at_return = frames[3].as_ref().expect("reachable");
	assert_eq!(
		at_return.stack(0)?,
		&TypedValue::Of(Type::Array(1, ArrayType::Object(ClassName::from("java/lang/String")))),
	);
	Ok(())
}

#[test]
fn returning_the_wrong_category_fails() {
	let method = static_method("()I", 1, 0, vec![
		Insn::FConst0,
		Insn::IReturn,
	]);
	assert_fails_verification(&method, 1);
}

#[test]
fn returning_an_unrelated_class_fails() {
	// the oracle can't prove Object is a String
	let method = static_method("()Ljava/lang/String;", 1, 0, vec![
		Insn::New(ClassName::from("java/lang/Object")),
		Insn::AReturn,
	]);
	assert_fails_verification(&method, 1);
}

#[test]
fn null_is_assignable_to_any_reference() -> Result<()> {
	let method = static_method("()Ljava/lang/String;", 1, 0, vec![
		Insn::AConstNull,
		Insn::AReturn,
	]);
	let frames = analyze_typed(&method)?;
	assert!(frames.iter().all(Option::is_some));
	Ok(())
}

#[test]
fn iaload_rejects_a_float_array() {
	let method = static_method("([FI)I", 2, 2, vec![
		Insn::ALoad(LvIndex { index: 0 }),
		Insn::ILoad(LvIndex { index: 1 }),
		Insn::IALoad,
		Insn::IReturn,
	]);
	assert_fails_verification(&method, 2);
}

#[test]
fn exception_values_carry_the_catch_type() -> Result<()> {
	use jay::tree::method::code::TryCatchBlock;

	let start = Label::new();
	let end = Label::new();
	let handler = Label::new();
	let mut method = static_method("()V", 2, 0, vec![
		Insn::Label(start),
		Insn::Nop,
		Insn::Label(end),
		Insn::Return,
		Insn::Label(handler),
		Insn::AThrow,
	]);
	if let Some(code) = method.code.as_mut() {
		code.exception_table.push(TryCatchBlock {
			start,
			end,
			handler,
			catch: Some(ClassName::from("java/io/IOException")),
		});
	}
	let frames = analyze_typed(&method)?;
	let at_handler = frames[4].as_ref().expect("the handler is reachable");
	assert_eq!(at_handler.stack_size(), 1);
	assert_eq!(at_handler.stack(0)?, &TypedValue::Of(object("java/io/IOException")));
	Ok(())
}

#[test]
fn basic_verifier_checks_shapes_only() {
	// an int where a reference belongs: caught even by the shape check
	let method = static_method("()V", 1, 1, vec![
		Insn::IConst0,
		Insn::AStore(LvIndex { index: 0 }),
		Insn::Return,
	]);
	let owner = ClassName::from("com/example/Main");
	let err = Analyzer::new(BasicVerifier::new())
		.analyze(owner.as_slice(), &method)
		.unwrap_err();
	match err.downcast_ref::<Error>() {
		Some(Error::AnalysisFailed { index, .. }) => assert_eq!(*index, 1),
		other => panic!("expected AnalysisFailed, got {other:?}"),
	}

	// but two different strings of the same shape pass
	let method = static_method("(Ljava/lang/String;)Ljava/lang/Integer;", 1, 1, vec![
		Insn::ALoad(LvIndex { index: 0 }),
		Insn::AReturn,
	]);
	assert!(Analyzer::new(BasicVerifier::new()).analyze(owner.as_slice(), &method).is_ok());
}
