use anyhow::Result;
use crate::error::Error;
use crate::analysis::interpreter::{InsnRef, Interpreter, Value};
use crate::analysis::subroutine::BitSet;
use crate::tree::method::code::Insn;

/// One abstract execution frame: the local variable slots and the operand
/// stack of a method, holding values of an interpreter's domain.
///
/// The slots live in one flat buffer, locals first, then `stack_size` stack
/// slots. A `long` or `double` value occupies *two* local slots (the second
/// holding the uninitialized placeholder) but a *single* stack slot; the
/// value's [`size`](Value::size) accounts for that where it matters.
#[derive(Debug, Clone)]
pub struct Frame<V> {
	/// `num_locals` local slots, then `max_stack` stack slots.
	values: Vec<V>,
	num_locals: usize,
	/// Number of stack slots in use; the buffer beyond holds stale values.
	stack_top: usize,
	/// What return instructions are checked against; `None` in a `void` method.
	return_value: Option<V>,
}

impl<V: Value> Frame<V> {
	/// Creates a frame with all slots uninitialized and an empty stack.
	pub fn new<I: Interpreter<Value = V>>(num_locals: usize, max_stack: usize, interpreter: &mut I) -> Frame<V> {
		let mut values = Vec::with_capacity(num_locals + max_stack);
		for local in 0..num_locals {
			values.push(interpreter.new_empty_value(local));
		}
		for _ in 0..max_stack {
			values.push(interpreter.new_value(None));
		}
		Frame {
			values,
			num_locals,
			stack_top: 0,
			return_value: None,
		}
	}

	/// Copies all slots, the stack height and the return type value from
	/// `other` into this frame. Both frames must have the same capacities.
	pub fn init(&mut self, other: &Frame<V>) {
		assert_eq!(self.num_locals, other.num_locals, "frames have different numbers of locals");
		assert_eq!(self.values.len(), other.values.len(), "frames have different capacities");
		self.values.clone_from(&other.values);
		self.stack_top = other.stack_top;
		self.return_value.clone_from(&other.return_value);
	}

	pub fn num_locals(&self) -> usize {
		self.num_locals
	}

	pub fn max_stack(&self) -> usize {
		self.values.len() - self.num_locals
	}

	/// The number of stack slots in use.
	pub fn stack_size(&self) -> usize {
		self.stack_top
	}

	pub fn local(&self, index: usize) -> Result<&V> {
		if index < self.num_locals {
			Ok(&self.values[index])
		} else {
			Err(Error::IllegalStack(format!("local variable index {index} out of bounds")).into())
		}
	}

	pub fn set_local(&mut self, index: usize, value: V) -> Result<()> {
		if index < self.num_locals {
			self.values[index] = value;
			Ok(())
		} else {
			Err(Error::IllegalStack(format!("local variable index {index} out of bounds")).into())
		}
	}

	/// The stack slot `index` positions below the top.
	pub fn stack(&self, index: usize) -> Result<&V> {
		if index < self.stack_top {
			Ok(&self.values[self.num_locals + self.stack_top - 1 - index])
		} else {
			Err(Error::IllegalStack(format!("no stack value {index} below the top")).into())
		}
	}

	pub fn push(&mut self, value: V) -> Result<()> {
		if self.stack_top < self.max_stack() {
			self.values[self.num_locals + self.stack_top] = value;
			self.stack_top += 1;
			Ok(())
		} else {
			Err(Error::IllegalStack("operand stack overflow".to_string()).into())
		}
	}

	pub fn pop(&mut self) -> Result<V> {
		if self.stack_top > 0 {
			self.stack_top -= 1;
			Ok(self.values[self.num_locals + self.stack_top].clone())
		} else {
			Err(Error::IllegalStack("operand stack underflow".to_string()).into())
		}
	}

	pub fn clear_stack(&mut self) {
		self.stack_top = 0;
	}

	pub fn return_value(&self) -> Option<&V> {
		self.return_value.as_ref()
	}

	pub fn set_return_value(&mut self, value: Option<V>) {
		self.return_value = value;
	}

	fn pop_sized(&mut self, size: u8, insn: &Insn) -> Result<V> {
		let value = self.pop()?;
		if value.size() != size {
			return Err(Error::IllegalStack(format!("illegal operand size for {insn:?}")).into());
		}
		Ok(value)
	}

	/// Simulates a single instruction, popping its operands, consulting the
	/// interpreter, and pushing the result.
	///
	/// Fails with [`Error::IllegalStack`] on underflow, overflow or a value
	/// of the wrong size category; verifying interpreters also raise
	/// [`Error::Verification`] out of their operations.
	pub fn execute<I: Interpreter<Value = V>>(&mut self, insn: InsnRef<'_>, interpreter: &mut I) -> Result<()> {
		match insn.insn {
			Insn::Nop
			| Insn::Label(_) | Insn::Line(_) | Insn::Frame(_)
			| Insn::Goto(_) | Insn::Ret(_) => {},

			Insn::AConstNull
			| Insn::IConstM1
			| Insn::IConst0 | Insn::IConst1 | Insn::IConst2 | Insn::IConst3 | Insn::IConst4 | Insn::IConst5
			| Insn::LConst0 | Insn::LConst1
			| Insn::FConst0 | Insn::FConst1 | Insn::FConst2
			| Insn::DConst0 | Insn::DConst1
			| Insn::BiPush(_) | Insn::SiPush(_)
			| Insn::Ldc(_)
			| Insn::GetStatic(_)
			| Insn::New(_)
			| Insn::Jsr(_) => {
				let value = interpreter.new_operation(insn)?;
				self.push(value)?;
			},

			Insn::ILoad(var) | Insn::LLoad(var) | Insn::FLoad(var) | Insn::DLoad(var) | Insn::ALoad(var) => {
				let local = self.local(var.index as usize)?.clone();
				let value = interpreter.copy_operation(insn, local)?;
				self.push(value)?;
			},

			Insn::IStore(var) | Insn::LStore(var) | Insn::FStore(var) | Insn::DStore(var) | Insn::AStore(var) => {
				let value = self.pop()?;
				let value = interpreter.copy_operation(insn, value)?;
				let var = var.index as usize;
				let size = value.size();
				self.set_local(var, value)?;
				if size == 2 {
					self.set_local(var + 1, interpreter.new_empty_value(var + 1))?;
				}
				if var > 0 && self.local(var - 1)?.size() == 2 {
					self.set_local(var - 1, interpreter.new_empty_value(var - 1))?;
				}
			},

			Insn::IALoad | Insn::LALoad | Insn::FALoad | Insn::DALoad
			| Insn::AALoad | Insn::BALoad | Insn::CALoad | Insn::SALoad => {
				let index = self.pop()?;
				let arrayref = self.pop()?;
				let value = interpreter.binary_operation(insn, arrayref, index)?;
				self.push(value)?;
			},

			Insn::IAStore | Insn::LAStore | Insn::FAStore | Insn::DAStore
			| Insn::AAStore | Insn::BAStore | Insn::CAStore | Insn::SAStore => {
				let value = self.pop()?;
				let index = self.pop()?;
				let arrayref = self.pop()?;
				interpreter.ternary_operation(insn, arrayref, index, value)?;
			},

			Insn::Pop => {
				self.pop_sized(1, insn.insn)?;
			},
			Insn::Pop2 => {
				let value = self.pop()?;
				if value.size() == 1 {
					self.pop_sized(1, insn.insn)?;
				}
			},

			Insn::Dup => {
				let value = self.pop_sized(1, insn.insn)?;
				self.push(value.clone())?;
				self.push(value)?;
			},
			Insn::DupX1 => {
				let value1 = self.pop_sized(1, insn.insn)?;
				let value2 = self.pop_sized(1, insn.insn)?;
				self.push(value1.clone())?;
				self.push(value2)?;
				self.push(value1)?;
			},
			Insn::DupX2 => {
				let value1 = self.pop_sized(1, insn.insn)?;
				let value2 = self.pop()?;
				if value2.size() == 1 {
					let value3 = self.pop_sized(1, insn.insn)?;
					self.push(value1.clone())?;
					self.push(value3)?;
					self.push(value2)?;
					self.push(value1)?;
				} else {
					self.push(value1.clone())?;
					self.push(value2)?;
					self.push(value1)?;
				}
			},
			Insn::Dup2 => {
				let value1 = self.pop()?;
				if value1.size() == 1 {
					let value2 = self.pop_sized(1, insn.insn)?;
					self.push(value2.clone())?;
					self.push(value1.clone())?;
					self.push(value2)?;
					self.push(value1)?;
				} else {
					self.push(value1.clone())?;
					self.push(value1)?;
				}
			},
			Insn::Dup2X1 => {
				let value1 = self.pop()?;
				if value1.size() == 1 {
					let value2 = self.pop_sized(1, insn.insn)?;
					let value3 = self.pop_sized(1, insn.insn)?;
					self.push(value2.clone())?;
					self.push(value1.clone())?;
					self.push(value3)?;
					self.push(value2)?;
					self.push(value1)?;
				} else {
					let value2 = self.pop_sized(1, insn.insn)?;
					self.push(value1.clone())?;
					self.push(value2)?;
					self.push(value1)?;
				}
			},
			Insn::Dup2X2 => {
				let value1 = self.pop()?;
				if value1.size() == 1 {
					let value2 = self.pop_sized(1, insn.insn)?;
					let value3 = self.pop()?;
					if value3.size() == 1 {
						let value4 = self.pop_sized(1, insn.insn)?;
						self.push(value2.clone())?;
						self.push(value1.clone())?;
						self.push(value4)?;
						self.push(value3)?;
						self.push(value2)?;
						self.push(value1)?;
					} else {
						self.push(value2.clone())?;
						self.push(value1.clone())?;
						self.push(value3)?;
						self.push(value2)?;
						self.push(value1)?;
					}
				} else {
					let value2 = self.pop()?;
					if value2.size() == 1 {
						let value3 = self.pop_sized(1, insn.insn)?;
						self.push(value1.clone())?;
						self.push(value3)?;
						self.push(value2)?;
						self.push(value1)?;
					} else {
						self.push(value1.clone())?;
						self.push(value2)?;
						self.push(value1)?;
					}
				}
			},
			Insn::Swap => {
				let value1 = self.pop_sized(1, insn.insn)?;
				let value2 = self.pop_sized(1, insn.insn)?;
				self.push(value1)?;
				self.push(value2)?;
			},

			Insn::IAdd | Insn::LAdd | Insn::FAdd | Insn::DAdd
			| Insn::ISub | Insn::LSub | Insn::FSub | Insn::DSub
			| Insn::IMul | Insn::LMul | Insn::FMul | Insn::DMul
			| Insn::IDiv | Insn::LDiv | Insn::FDiv | Insn::DDiv
			| Insn::IRem | Insn::LRem | Insn::FRem | Insn::DRem
			| Insn::IShl | Insn::LShl | Insn::IShr | Insn::LShr | Insn::IUShr | Insn::LUShr
			| Insn::IAnd | Insn::LAnd | Insn::IOr | Insn::LOr | Insn::IXor | Insn::LXor
			| Insn::LCmp | Insn::FCmpL | Insn::FCmpG | Insn::DCmpL | Insn::DCmpG => {
				let value2 = self.pop()?;
				let value1 = self.pop()?;
				let value = interpreter.binary_operation(insn, value1, value2)?;
				self.push(value)?;
			},

			Insn::INeg | Insn::LNeg | Insn::FNeg | Insn::DNeg
			| Insn::I2L | Insn::I2F | Insn::I2D
			| Insn::L2I | Insn::L2F | Insn::L2D
			| Insn::F2I | Insn::F2L | Insn::F2D
			| Insn::D2I | Insn::D2L | Insn::D2F
			| Insn::I2B | Insn::I2C | Insn::I2S => {
				let value = self.pop()?;
				let value = interpreter.unary_operation(insn, value)?;
				self.push(value)?;
			},

			Insn::IInc(var, _) => {
				let var = var.index as usize;
				let value = interpreter.unary_operation(insn, self.local(var)?.clone())?;
				self.set_local(var, value)?;
			},

			Insn::IfEq(_) | Insn::IfNe(_) | Insn::IfLt(_) | Insn::IfGe(_) | Insn::IfGt(_) | Insn::IfLe(_)
			| Insn::IfNull(_) | Insn::IfNonNull(_)
			| Insn::TableSwitch { .. } | Insn::LookupSwitch { .. } => {
				let value = self.pop()?;
				interpreter.unary_operation(insn, value)?;
			},

			Insn::IfICmpEq(_) | Insn::IfICmpNe(_)
			| Insn::IfICmpLt(_) | Insn::IfICmpGe(_) | Insn::IfICmpGt(_) | Insn::IfICmpLe(_)
			| Insn::IfACmpEq(_) | Insn::IfACmpNe(_) => {
				let value2 = self.pop()?;
				let value1 = self.pop()?;
				interpreter.binary_operation(insn, value1, value2)?;
			},

			Insn::IReturn | Insn::LReturn | Insn::FReturn | Insn::DReturn | Insn::AReturn => {
				let value = self.pop()?;
				interpreter.unary_operation(insn, value.clone())?;
				interpreter.return_operation(insn, value, self.return_value.as_ref())?;
			},
			Insn::Return => {
				if self.return_value.is_some() {
					return Err(Error::Verification {
						expected: "a value return".to_string(),
						actual: "RETURN in a method declaring a return type".to_string(),
					}.into());
				}
			},

			Insn::PutStatic(_) | Insn::AThrow | Insn::MonitorEnter | Insn::MonitorExit => {
				let value = self.pop()?;
				interpreter.unary_operation(insn, value)?;
			},
			Insn::GetField(_)
			| Insn::NewArray(_) | Insn::ANewArray(_) | Insn::ArrayLength
			| Insn::CheckCast(_) | Insn::InstanceOf(_) => {
				let value = self.pop()?;
				let value = interpreter.unary_operation(insn, value)?;
				self.push(value)?;
			},
			Insn::PutField(_) => {
				let value2 = self.pop()?;
				let value1 = self.pop()?;
				interpreter.binary_operation(insn, value1, value2)?;
			},

			Insn::InvokeVirtual(method_ref)
			| Insn::InvokeSpecial(method_ref, _)
			| Insn::InvokeInterface(method_ref) => {
				self.execute_invoke(insn, method_ref.desc.parse()?, true, interpreter)?;
			},
			Insn::InvokeStatic(method_ref, _) => {
				self.execute_invoke(insn, method_ref.desc.parse()?, false, interpreter)?;
			},
			Insn::InvokeDynamic(invoke_dynamic) => {
				self.execute_invoke(insn, invoke_dynamic.descriptor.parse()?, false, interpreter)?;
			},

			Insn::MultiANewArray(_, dimensions) => {
				let mut values = Vec::with_capacity(*dimensions as usize);
				for _ in 0..*dimensions {
					values.push(self.pop()?);
				}
				values.reverse();
				let value = interpreter.nary_operation(insn, values)?;
				self.push(value)?;
			},
		}
		Ok(())
	}

	fn execute_invoke<I: Interpreter<Value = V>>(
		&mut self,
		insn: InsnRef<'_>,
		descriptor: crate::tree::descriptor::ParsedMethodDescriptor,
		has_receiver: bool,
		interpreter: &mut I,
	) -> Result<()> {
		// one stack slot per argument, sizes notwithstanding
		let mut values = Vec::with_capacity(descriptor.parameter_descriptors.len() + 1);
		for _ in &descriptor.parameter_descriptors {
			values.push(self.pop()?);
		}
		if has_receiver {
			values.push(self.pop()?);
		}
		values.reverse();

		let value = interpreter.nary_operation(insn, values)?;
		if descriptor.return_descriptor.is_some() {
			self.push(value)?;
		}
		Ok(())
	}

	/// Pointwise lattice-merges `other` into this frame, returning whether
	/// anything changed. The stack heights must agree.
	pub fn merge<I: Interpreter<Value = V>>(&mut self, other: &Frame<V>, interpreter: &mut I) -> Result<bool> {
		if self.stack_top != other.stack_top {
			return Err(Error::IncompatibleFrames { left: self.stack_top, right: other.stack_top }.into());
		}
		let mut changed = false;
		for i in 0..self.num_locals + self.stack_top {
			let merged = interpreter.merge(self.values[i].clone(), other.values[i].clone());
			if merged != self.values[i] {
				self.values[i] = merged;
				changed = true;
			}
		}
		Ok(changed)
	}

	/// The specialized merge after a subroutine returns: every local the
	/// subroutine never touched is taken over from the frame at the calling
	/// `jsr` instead. The stack (of the frame at the `ret`) is kept as is.
	pub fn merge_after_ret(&mut self, frame_before_jsr: &Frame<V>, locals_used: &BitSet) {
		for i in 0..self.num_locals {
			if !locals_used.get(i) {
				self.values[i] = frame_before_jsr.values[i].clone();
			}
		}
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use anyhow::Result;
	use crate::analysis::basic::{BasicInterpreter, BasicValue};
	use crate::analysis::frame::Frame;
	use crate::analysis::interpreter::InsnRef;
	use crate::analysis::subroutine::BitSet;
	use crate::error::Error;
	use crate::tree::method::code::{Insn, InsnList};

	fn run(frame: &mut Frame<BasicValue>, insns: &[Insn]) -> Result<()> {
		// keys only matter for source tracking; make some up
		let mut list = InsnList::new();
		for insn in insns {
			list.push_back(insn.clone());
		}
		let mut interpreter = BasicInterpreter;
		for (key, insn) in list.iter() {
			frame.execute(InsnRef { key, insn }, &mut interpreter)?;
		}
		Ok(())
	}

	fn new_frame(num_locals: usize, max_stack: usize) -> Frame<BasicValue> {
		Frame::new(num_locals, max_stack, &mut BasicInterpreter)
	}

	#[test]
	fn push_pop_sizes() -> Result<()> {
		let mut frame = new_frame(0, 4);
		run(&mut frame, &[Insn::IConst0, Insn::LConst1])?;
		assert_eq!(frame.stack_size(), 2);
		assert_eq!(frame.stack(0)?, &BasicValue::Long);
		assert_eq!(frame.stack(1)?, &BasicValue::Int);

		run(&mut frame, &[Insn::Pop2, Insn::Pop])?;
		assert_eq!(frame.stack_size(), 0);
		Ok(())
	}

	#[test]
	fn pop_of_long_is_illegal() {
		let mut frame = new_frame(0, 4);
		let err = run(&mut frame, &[Insn::IConst1, Insn::LConst1, Insn::Pop]).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::IllegalStack(_))), "{err:?}");
	}

	#[test]
	fn pop2_of_two_ints() -> Result<()> {
		let mut frame = new_frame(0, 4);
		run(&mut frame, &[Insn::IConst1, Insn::IConst2, Insn::Pop2])?;
		assert_eq!(frame.stack_size(), 0);
		Ok(())
	}

	#[test]
	fn stack_underflow_and_overflow() {
		let mut frame = new_frame(0, 1);
		let err = run(&mut frame, &[Insn::Pop]).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::IllegalStack(_))), "{err:?}");

		let mut frame = new_frame(0, 1);
		let err = run(&mut frame, &[Insn::IConst0, Insn::IConst0]).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::IllegalStack(_))), "{err:?}");
	}

	#[test]
	fn dup_x1() -> Result<()> {
		let mut frame = new_frame(0, 4);
		run(&mut frame, &[Insn::FConst0, Insn::IConst0, Insn::Dup, Insn::DupX1])?;
		// [float, int, int] after Dup; DupX1 gives [float, int, int, int]
		assert_eq!(frame.stack_size(), 4);
		assert_eq!(frame.stack(3)?, &BasicValue::Float);
		Ok(())
	}

	#[test]
	fn dup2_of_long_and_of_int_pair() -> Result<()> {
		let mut frame = new_frame(0, 4);
		run(&mut frame, &[Insn::LConst0, Insn::Dup2])?;
		assert_eq!(frame.stack_size(), 2);

		let mut frame = new_frame(0, 4);
		run(&mut frame, &[Insn::IConst0, Insn::FConst0, Insn::Dup2])?;
		assert_eq!(frame.stack_size(), 4);
		assert_eq!(frame.stack(0)?, &BasicValue::Float);
		assert_eq!(frame.stack(1)?, &BasicValue::Int);
		Ok(())
	}

	#[test]
	fn dup_of_long_is_illegal() {
		let mut frame = new_frame(0, 4);
		let err = run(&mut frame, &[Insn::LConst0, Insn::Dup]).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::IllegalStack(_))), "{err:?}");
	}

	#[test]
	fn long_store_clears_following_slot() -> Result<()> {
		let mut frame = new_frame(4, 4);
		frame.set_local(1, BasicValue::Int)?;
		run(&mut frame, &[Insn::LConst0, Insn::LStore(crate::tree::method::code::LvIndex { index: 0 })])?;
		assert_eq!(frame.local(0)?, &BasicValue::Long);
		assert_eq!(frame.local(1)?, &BasicValue::Uninitialized);
		Ok(())
	}

	#[test]
	fn store_clobbering_second_half_of_long() -> Result<()> {
		let mut frame = new_frame(4, 4);
		run(&mut frame, &[
			Insn::LConst0,
			Insn::LStore(crate::tree::method::code::LvIndex { index: 0 }),
			Insn::IConst0,
			Insn::IStore(crate::tree::method::code::LvIndex { index: 1 }),
		])?;
		// the long in slot 0 lost its second half and is no longer usable
		assert_eq!(frame.local(0)?, &BasicValue::Uninitialized);
		assert_eq!(frame.local(1)?, &BasicValue::Int);
		Ok(())
	}

	#[test]
	fn merge_detects_fixpoint() -> Result<()> {
		let mut interpreter = BasicInterpreter;
		let mut a = new_frame(1, 2);
		let mut b = new_frame(1, 2);
		a.set_local(0, BasicValue::Int)?;
		b.set_local(0, BasicValue::Float)?;

		assert!(a.merge(&b, &mut interpreter)?);
		assert_eq!(a.local(0)?, &BasicValue::Uninitialized);
		// merging the same frame again changes nothing
		assert!(!a.merge(&b, &mut interpreter)?);
		Ok(())
	}

	#[test]
	fn merge_of_different_heights_fails() -> Result<()> {
		let mut interpreter = BasicInterpreter;
		let mut a = new_frame(0, 2);
		let b = new_frame(0, 2);
		a.push(BasicValue::Int)?;
		let err = a.merge(&b, &mut interpreter).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::IncompatibleFrames { left: 1, right: 0 })), "{err:?}");
		Ok(())
	}

	#[test]
	fn merge_after_ret_restores_untouched_locals() -> Result<()> {
		let mut before_jsr = new_frame(3, 1);
		before_jsr.set_local(0, BasicValue::Int)?;
		before_jsr.set_local(1, BasicValue::Float)?;

		let mut after_ret = new_frame(3, 1);
		after_ret.set_local(1, BasicValue::Reference)?;
		after_ret.set_local(2, BasicValue::Reference)?;

		let mut used = BitSet::new(3);
		used.set(1);
		used.set(2);

		after_ret.merge_after_ret(&before_jsr, &used);
		assert_eq!(after_ret.local(0)?, &BasicValue::Int); // from before the jsr
		assert_eq!(after_ret.local(1)?, &BasicValue::Reference); // the subroutine's
		assert_eq!(after_ret.local(2)?, &BasicValue::Reference);
		Ok(())
	}
}
