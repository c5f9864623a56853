use std::collections::BTreeSet;
use anyhow::Result;
use crate::analysis::interpreter::{InsnRef, Interpreter, Value};
use crate::tree::descriptor::Type;
use crate::tree::method::code::{Insn, InsnKey, Loadable};

/// A value tracked back to the set of instructions that may have produced it.
///
/// This is the def-set domain: per slot, which `InsnKey`s may have put the
/// value there on some execution path. Sizes are tracked so the frame
/// machinery stays sound; everything else about the value is forgotten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceValue {
	pub size: u8,
	pub producers: BTreeSet<InsnKey>,
}

impl SourceValue {
	pub fn new(size: u8) -> SourceValue {
		SourceValue { size, producers: BTreeSet::new() }
	}

	pub fn of(size: u8, producer: InsnKey) -> SourceValue {
		let mut producers = BTreeSet::new();
		producers.insert(producer);
		SourceValue { size, producers }
	}
}

impl Value for SourceValue {
	fn size(&self) -> u8 {
		self.size
	}
}

/// The [`Interpreter`] over [`SourceValue`]s: every operation produces a
/// value whose producer set is the operation's own instruction, and
/// [`merge`](Interpreter::merge) takes the union.
#[derive(Debug, Default, Copy, Clone)]
pub struct SourceInterpreter;

fn size_of_return(desc: &crate::tree::method::MethodDescriptorSlice) -> Result<u8> {
	Ok(match desc.parse()?.return_descriptor {
		Some(ty) => ty.size(),
		None => 1,
	})
}

impl Interpreter for SourceInterpreter {
	type Value = SourceValue;

	fn new_value(&mut self, ty: Option<&Type>) -> SourceValue {
		SourceValue::new(ty.map_or(1, Type::size))
	}

	fn new_operation(&mut self, insn: InsnRef<'_>) -> Result<SourceValue> {
		let size = match insn.insn {
			Insn::LConst0 | Insn::LConst1 | Insn::DConst0 | Insn::DConst1 => 2,
			Insn::Ldc(Loadable::Long(_) | Loadable::Double(_)) => 2,
			Insn::Ldc(Loadable::Dynamic(constant_dynamic)) => constant_dynamic.descriptor.parse()?.0.size(),
			Insn::GetStatic(field_ref) => field_ref.desc.parse()?.0.size(),
			_ => 1,
		};
		Ok(SourceValue::of(size, insn.key))
	}

	fn copy_operation(&mut self, insn: InsnRef<'_>, value: SourceValue) -> Result<SourceValue> {
		Ok(SourceValue::of(value.size, insn.key))
	}

	fn unary_operation(&mut self, insn: InsnRef<'_>, _value: SourceValue) -> Result<SourceValue> {
		let size = match insn.insn {
			Insn::LNeg | Insn::DNeg
			| Insn::I2L | Insn::I2D | Insn::L2D | Insn::F2L | Insn::F2D | Insn::D2L => 2,
			Insn::GetField(field_ref) => field_ref.desc.parse()?.0.size(),
			_ => 1,
		};
		Ok(SourceValue::of(size, insn.key))
	}

	fn binary_operation(&mut self, insn: InsnRef<'_>, _value1: SourceValue, _value2: SourceValue) -> Result<SourceValue> {
		let size = match insn.insn {
			Insn::LALoad | Insn::DALoad
			| Insn::LAdd | Insn::LSub | Insn::LMul | Insn::LDiv | Insn::LRem
			| Insn::LShl | Insn::LShr | Insn::LUShr
			| Insn::LAnd | Insn::LOr | Insn::LXor
			| Insn::DAdd | Insn::DSub | Insn::DMul | Insn::DDiv | Insn::DRem => 2,
			_ => 1,
		};
		Ok(SourceValue::of(size, insn.key))
	}

	fn ternary_operation(&mut self, insn: InsnRef<'_>, _value1: SourceValue, _value2: SourceValue, _value3: SourceValue) -> Result<SourceValue> {
		Ok(SourceValue::of(1, insn.key))
	}

	fn nary_operation(&mut self, insn: InsnRef<'_>, _values: Vec<SourceValue>) -> Result<SourceValue> {
		let size = match insn.insn {
			Insn::MultiANewArray(..) => 1,
			Insn::InvokeVirtual(method_ref)
			| Insn::InvokeSpecial(method_ref, _)
			| Insn::InvokeStatic(method_ref, _)
			| Insn::InvokeInterface(method_ref) => size_of_return(&method_ref.desc)?,
			Insn::InvokeDynamic(invoke_dynamic) => size_of_return(&invoke_dynamic.descriptor)?,
			_ => 1,
		};
		Ok(SourceValue::of(size, insn.key))
	}

	fn return_operation(&mut self, _insn: InsnRef<'_>, _value: SourceValue, _expected: Option<&SourceValue>) -> Result<()> {
		Ok(())
	}

	fn merge(&mut self, value1: SourceValue, value2: SourceValue) -> SourceValue {
		if value1.size == value2.size && value1.producers.is_superset(&value2.producers) {
			return value1;
		}
		let mut producers = value1.producers;
		producers.extend(value2.producers.iter().copied());
		SourceValue {
			size: value1.size.min(value2.size),
			producers,
		}
	}
}
