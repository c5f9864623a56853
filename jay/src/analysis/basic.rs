use std::fmt::{Display, Formatter};
use anyhow::{bail, Result};
use crate::analysis::interpreter::{InsnRef, Interpreter, Value};
use crate::tree::descriptor::Type;
use crate::tree::method::code::{Insn, Loadable};

/// The seven-kind value abstraction: just enough to know the size and rough
/// category of every slot.
///
/// All integral types narrower than `int` (boolean, byte, char, short) are
/// `Int`, and all class and array types are `Reference`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BasicValue {
	/// An empty or unusable slot, and the bottom of the merge lattice.
	Uninitialized,
	Int,
	Float,
	Long,
	Double,
	Reference,
	/// The address a `jsr` pushes for its subroutine to `ret` to.
	ReturnAddress,
}

impl Value for BasicValue {
	fn size(&self) -> u8 {
		match self {
			BasicValue::Long | BasicValue::Double => 2,
			_ => 1,
		}
	}
}

impl Display for BasicValue {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			BasicValue::Uninitialized => ".",
			BasicValue::Int => "int",
			BasicValue::Float => "float",
			BasicValue::Long => "long",
			BasicValue::Double => "double",
			BasicValue::Reference => "reference",
			BasicValue::ReturnAddress => "return-address",
		})
	}
}

impl BasicValue {
	pub(crate) fn of_type(ty: &Type) -> BasicValue {
		match ty {
			Type::Z | Type::B | Type::C | Type::S | Type::I => BasicValue::Int,
			Type::F => BasicValue::Float,
			Type::J => BasicValue::Long,
			Type::D => BasicValue::Double,
			Type::Object(_) | Type::Array(..) => BasicValue::Reference,
		}
	}

	pub(crate) fn of_loadable(constant: &Loadable) -> Result<BasicValue> {
		Ok(match constant {
			Loadable::Integer(_) => BasicValue::Int,
			Loadable::Float(_) => BasicValue::Float,
			Loadable::Long(_) => BasicValue::Long,
			Loadable::Double(_) => BasicValue::Double,
			Loadable::Class(_)
			| Loadable::String(_)
			| Loadable::MethodHandle(_)
			| Loadable::MethodType(_) => BasicValue::Reference,
			// a dynamic constant is of whatever type its descriptor says
			Loadable::Dynamic(constant_dynamic) => {
				BasicValue::of_type(&constant_dynamic.descriptor.parse()?.0)
			},
		})
	}
}

/// The [`Interpreter`] over [`BasicValue`]s: computes sizes and categories,
/// checks nothing.
#[derive(Debug, Default, Copy, Clone)]
pub struct BasicInterpreter;

impl Interpreter for BasicInterpreter {
	type Value = BasicValue;

	fn new_value(&mut self, ty: Option<&Type>) -> BasicValue {
		match ty {
			Some(ty) => BasicValue::of_type(ty),
			None => BasicValue::Uninitialized,
		}
	}

	fn new_operation(&mut self, insn: InsnRef<'_>) -> Result<BasicValue> {
		Ok(match insn.insn {
			Insn::AConstNull => BasicValue::Reference,
			Insn::IConstM1
			| Insn::IConst0 | Insn::IConst1 | Insn::IConst2 | Insn::IConst3 | Insn::IConst4 | Insn::IConst5
			| Insn::BiPush(_) | Insn::SiPush(_) => BasicValue::Int,
			Insn::LConst0 | Insn::LConst1 => BasicValue::Long,
			Insn::FConst0 | Insn::FConst1 | Insn::FConst2 => BasicValue::Float,
			Insn::DConst0 | Insn::DConst1 => BasicValue::Double,
			Insn::Ldc(constant) => BasicValue::of_loadable(constant)?,
			Insn::GetStatic(field_ref) => BasicValue::of_type(&field_ref.desc.parse()?.0),
			Insn::New(_) => BasicValue::Reference,
			Insn::Jsr(_) => BasicValue::ReturnAddress,
			other => bail!("not a value-producing instruction: {other:?}"),
		})
	}

	fn copy_operation(&mut self, _insn: InsnRef<'_>, value: BasicValue) -> Result<BasicValue> {
		Ok(value)
	}

	fn unary_operation(&mut self, insn: InsnRef<'_>, _value: BasicValue) -> Result<BasicValue> {
		Ok(match insn.insn {
			Insn::INeg | Insn::IInc(..)
			| Insn::L2I | Insn::F2I | Insn::D2I
			| Insn::I2B | Insn::I2C | Insn::I2S
			| Insn::InstanceOf(_) | Insn::ArrayLength => BasicValue::Int,
			Insn::FNeg | Insn::I2F | Insn::L2F | Insn::D2F => BasicValue::Float,
			Insn::LNeg | Insn::I2L | Insn::F2L | Insn::D2L => BasicValue::Long,
			Insn::DNeg | Insn::I2D | Insn::L2D | Insn::F2D => BasicValue::Double,
			Insn::GetField(field_ref) => BasicValue::of_type(&field_ref.desc.parse()?.0),
			Insn::NewArray(_) | Insn::ANewArray(_) | Insn::CheckCast(_) => BasicValue::Reference,
			// consumed without producing anything; the frame discards this
			Insn::IfEq(_) | Insn::IfNe(_) | Insn::IfLt(_) | Insn::IfGe(_) | Insn::IfGt(_) | Insn::IfLe(_)
			| Insn::IfNull(_) | Insn::IfNonNull(_)
			| Insn::TableSwitch { .. } | Insn::LookupSwitch { .. }
			| Insn::IReturn | Insn::LReturn | Insn::FReturn | Insn::DReturn | Insn::AReturn
			| Insn::PutStatic(_) | Insn::AThrow
			| Insn::MonitorEnter | Insn::MonitorExit => BasicValue::Uninitialized,
			other => bail!("not a unary instruction: {other:?}"),
		})
	}

	fn binary_operation(&mut self, insn: InsnRef<'_>, _value1: BasicValue, _value2: BasicValue) -> Result<BasicValue> {
		Ok(match insn.insn {
			Insn::IALoad | Insn::BALoad | Insn::CALoad | Insn::SALoad
			| Insn::IAdd | Insn::ISub | Insn::IMul | Insn::IDiv | Insn::IRem
			| Insn::IShl | Insn::IShr | Insn::IUShr | Insn::IAnd | Insn::IOr | Insn::IXor
			| Insn::LCmp | Insn::FCmpL | Insn::FCmpG | Insn::DCmpL | Insn::DCmpG => BasicValue::Int,
			Insn::FALoad | Insn::FAdd | Insn::FSub | Insn::FMul | Insn::FDiv | Insn::FRem => BasicValue::Float,
			Insn::LALoad
			| Insn::LAdd | Insn::LSub | Insn::LMul | Insn::LDiv | Insn::LRem
			| Insn::LShl | Insn::LShr | Insn::LUShr | Insn::LAnd | Insn::LOr | Insn::LXor => BasicValue::Long,
			Insn::DALoad | Insn::DAdd | Insn::DSub | Insn::DMul | Insn::DDiv | Insn::DRem => BasicValue::Double,
			Insn::AALoad => BasicValue::Reference,
			// consumed without producing anything; the frame discards this
			Insn::IfICmpEq(_) | Insn::IfICmpNe(_)
			| Insn::IfICmpLt(_) | Insn::IfICmpGe(_) | Insn::IfICmpGt(_) | Insn::IfICmpLe(_)
			| Insn::IfACmpEq(_) | Insn::IfACmpNe(_)
			| Insn::PutField(_) => BasicValue::Uninitialized,
			other => bail!("not a binary instruction: {other:?}"),
		})
	}

	fn ternary_operation(&mut self, _insn: InsnRef<'_>, _value1: BasicValue, _value2: BasicValue, _value3: BasicValue) -> Result<BasicValue> {
		// array stores produce nothing
		Ok(BasicValue::Uninitialized)
	}

	fn nary_operation(&mut self, insn: InsnRef<'_>, _values: Vec<BasicValue>) -> Result<BasicValue> {
		Ok(match insn.insn {
			Insn::MultiANewArray(..) => BasicValue::Reference,
			Insn::InvokeVirtual(method_ref)
			| Insn::InvokeSpecial(method_ref, _)
			| Insn::InvokeStatic(method_ref, _)
			| Insn::InvokeInterface(method_ref) => {
				match method_ref.desc.parse()?.return_descriptor {
					Some(ty) => BasicValue::of_type(&ty),
					None => BasicValue::Uninitialized,
				}
			},
			Insn::InvokeDynamic(invoke_dynamic) => {
				match invoke_dynamic.descriptor.parse()?.return_descriptor {
					Some(ty) => BasicValue::of_type(&ty),
					None => BasicValue::Uninitialized,
				}
			},
			other => bail!("not an n-ary instruction: {other:?}"),
		})
	}

	fn return_operation(&mut self, _insn: InsnRef<'_>, _value: BasicValue, _expected: Option<&BasicValue>) -> Result<()> {
		Ok(())
	}

	fn merge(&mut self, value1: BasicValue, value2: BasicValue) -> BasicValue {
		if value1 == value2 {
			value1
		} else {
			BasicValue::Uninitialized
		}
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use anyhow::Result;
	use crate::analysis::basic::{BasicInterpreter, BasicValue};
	use crate::analysis::interpreter::{InsnRef, Interpreter, Value};
	use crate::tree::descriptor::{ArrayType, Type};
	use crate::tree::method::code::{Insn, InsnList, Loadable};

	fn one(insn: Insn) -> (InsnList, crate::tree::method::code::InsnKey) {
		let mut list = InsnList::new();
		let key = list.push_back(insn);
		(list, key)
	}

	#[test]
	fn values_from_types() {
		let mut interpreter = BasicInterpreter;
		assert_eq!(interpreter.new_value(Some(&Type::Z)), BasicValue::Int);
		assert_eq!(interpreter.new_value(Some(&Type::S)), BasicValue::Int);
		assert_eq!(interpreter.new_value(Some(&Type::J)), BasicValue::Long);
		assert_eq!(interpreter.new_value(Some(&Type::Array(1, ArrayType::D))), BasicValue::Reference);
		assert_eq!(interpreter.new_value(None), BasicValue::Uninitialized);
	}

	#[test]
	fn ldc_kinds() -> Result<()> {
		let mut interpreter = BasicInterpreter;
		let (list, key) = one(Insn::Ldc(Loadable::Long(17)));
		let value = interpreter.new_operation(InsnRef { key, insn: list.insn(key) })?;
		assert_eq!(value, BasicValue::Long);
		assert_eq!(value.size(), 2);

		let (list, key) = one(Insn::Ldc(Loadable::String("hi".into())));
		assert_eq!(interpreter.new_operation(InsnRef { key, insn: list.insn(key) })?, BasicValue::Reference);
		Ok(())
	}

	#[test]
	fn merge_collapses_to_uninitialized() {
		let mut interpreter = BasicInterpreter;
		assert_eq!(interpreter.merge(BasicValue::Int, BasicValue::Int), BasicValue::Int);
		assert_eq!(interpreter.merge(BasicValue::Int, BasicValue::Float), BasicValue::Uninitialized);
		assert_eq!(interpreter.merge(BasicValue::Reference, BasicValue::ReturnAddress), BasicValue::Uninitialized);
	}
}
