use std::fmt::Debug;
use anyhow::Result;
use crate::tree::descriptor::Type;
use crate::tree::method::code::{Insn, InsnKey, TryCatchBlock};

/// An abstract value, as an [`Interpreter`] produces and consumes them.
///
/// Values form a lattice (through [`Interpreter::merge`]); the analyzer only
/// ever relies on their slot size and on equality, which is how it detects
/// that a merge reached a fixpoint. The lattice must be of finite height or
/// the analysis will not terminate.
pub trait Value: Clone + Eq + Debug {
	/// The number of 32-bit slots this value takes: 2 for `long` and `double`
	/// values, 1 for everything else.
	///
	/// A size-2 value occupies two local variable slots but a single operand
	/// stack slot.
	fn size(&self) -> u8;
}

/// An instruction, together with the key identifying its node.
///
/// Interpreters that only look at the opcode ignore the key; value domains
/// that track instruction identity (like
/// [`SourceValue`](crate::analysis::source::SourceValue)) store it.
#[derive(Debug, Copy, Clone)]
pub struct InsnRef<'a> {
	pub key: InsnKey,
	pub insn: &'a Insn,
}

/// Lifts instructions over an abstract value domain.
///
/// [`Frame::execute`](crate::analysis::frame::Frame::execute) pops the
/// operands an instruction consumes, hands them to the matching operation
/// here, and pushes whatever comes back. The `new_*` methods create the
/// values the analyzer seeds frames with; by default they all defer to
/// [`new_value`](Self::new_value).
pub trait Interpreter {
	type Value: Value;

	/// Creates a value of the given type; `None` asks for the placeholder
	/// filling uninitialized or unused slots.
	fn new_value(&mut self, ty: Option<&Type>) -> Self::Value;

	/// The value of the method parameter (or, for instance methods,
	/// receiver) in local variable slot `local`.
	fn new_parameter_value(&mut self, is_instance_method: bool, local: usize, ty: &Type) -> Self::Value {
		let _ = (is_instance_method, local);
		self.new_value(Some(ty))
	}

	/// The value return instructions are checked against; `None` for `void`.
	fn new_return_type_value(&mut self, ty: Option<&Type>) -> Option<Self::Value> {
		ty.map(|ty| self.new_value(Some(ty)))
	}

	/// The placeholder for the uninitialized local variable slot `local`.
	fn new_empty_value(&mut self, local: usize) -> Self::Value {
		let _ = local;
		self.new_value(None)
	}

	/// The value sitting on the operand stack when control enters the
	/// handler of the given try/catch block.
	fn new_exception_value(&mut self, block: &TryCatchBlock, catch_type: &Type) -> Self::Value {
		let _ = block;
		self.new_value(Some(catch_type))
	}

	/// An instruction producing a value out of nothing: constants, `new`,
	/// `getstatic`, `jsr`.
	fn new_operation(&mut self, insn: InsnRef<'_>) -> Result<Self::Value>;

	/// A load or store moving `value` between a local slot and the stack.
	fn copy_operation(&mut self, insn: InsnRef<'_>, value: Self::Value) -> Result<Self::Value>;

	/// An instruction consuming one value. Also called for value-consuming
	/// instructions without a result (conditional jumps, `athrow`, returns,
	/// monitor instructions); the result is discarded then.
	fn unary_operation(&mut self, insn: InsnRef<'_>, value: Self::Value) -> Result<Self::Value>;

	/// An instruction consuming two values (`value1` below `value2`).
	fn binary_operation(&mut self, insn: InsnRef<'_>, value1: Self::Value, value2: Self::Value) -> Result<Self::Value>;

	/// An array store, consuming array reference, index and value.
	fn ternary_operation(&mut self, insn: InsnRef<'_>, value1: Self::Value, value2: Self::Value, value3: Self::Value) -> Result<Self::Value>;

	/// A method invocation or `multianewarray`, consuming any number of
	/// values (for invocations of instance methods, the receiver first).
	fn nary_operation(&mut self, insn: InsnRef<'_>, values: Vec<Self::Value>) -> Result<Self::Value>;

	/// A value-carrying return; `expected` is the frame's return type value,
	/// `None` in a `void` method.
	fn return_operation(&mut self, insn: InsnRef<'_>, value: Self::Value, expected: Option<&Self::Value>) -> Result<()>;

	/// The least upper bound of two values.
	///
	/// Must be monotone, and must return a value equal to `value1` whenever
	/// the bound doesn't move, so the analyzer can detect that nothing
	/// changed.
	fn merge(&mut self, value1: Self::Value, value2: Self::Value) -> Self::Value;
}
