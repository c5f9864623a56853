use anyhow::{bail, Result};
use crate::analysis::basic::{BasicInterpreter, BasicValue};
use crate::analysis::interpreter::{InsnRef, Interpreter};
use crate::error::Error;
use crate::tree::descriptor::Type;
use crate::tree::method::code::Insn;

/// A [`BasicInterpreter`] that additionally checks, per opcode, that every
/// operand is of the kind the instruction expects, failing with
/// [`Error::Verification`] otherwise.
///
/// The seven-kind domain can't tell classes apart, so all reference checks
/// pass for any reference; [`SimpleVerifier`](crate::analysis::simple::SimpleVerifier)
/// is the precise variant.
#[derive(Debug, Default, Copy, Clone)]
pub struct BasicVerifier {
	inner: BasicInterpreter,
}

impl BasicVerifier {
	pub fn new() -> BasicVerifier {
		BasicVerifier::default()
	}

	/// Subtype check of the seven-kind domain: plain equality.
	fn check(&self, expected: BasicValue, actual: &BasicValue) -> Result<()> {
		if *actual == expected {
			Ok(())
		} else {
			Err(Error::Verification { expected: expected.to_string(), actual: actual.to_string() }.into())
		}
	}

	fn check_field_value(&mut self, desc: &crate::tree::field::FieldDescriptorSlice, actual: &BasicValue) -> Result<()> {
		self.check(BasicValue::of_type(&desc.parse()?.0), actual)
	}
}

impl Interpreter for BasicVerifier {
	type Value = BasicValue;

	fn new_value(&mut self, ty: Option<&Type>) -> BasicValue {
		self.inner.new_value(ty)
	}

	fn new_operation(&mut self, insn: InsnRef<'_>) -> Result<BasicValue> {
		self.inner.new_operation(insn)
	}

	fn copy_operation(&mut self, insn: InsnRef<'_>, value: BasicValue) -> Result<BasicValue> {
		match insn.insn {
			Insn::ILoad(_) | Insn::IStore(_) => self.check(BasicValue::Int, &value)?,
			Insn::FLoad(_) | Insn::FStore(_) => self.check(BasicValue::Float, &value)?,
			Insn::LLoad(_) | Insn::LStore(_) => self.check(BasicValue::Long, &value)?,
			Insn::DLoad(_) | Insn::DStore(_) => self.check(BasicValue::Double, &value)?,
			Insn::ALoad(_) => self.check(BasicValue::Reference, &value)?,
			// a store may also spill the return address a `jsr` pushed
			Insn::AStore(_) => {
				if !matches!(value, BasicValue::Reference | BasicValue::ReturnAddress) {
					self.check(BasicValue::Reference, &value)?;
				}
			},
			other => bail!("not a load or store: {other:?}"),
		}
		self.inner.copy_operation(insn, value)
	}

	fn unary_operation(&mut self, insn: InsnRef<'_>, value: BasicValue) -> Result<BasicValue> {
		match insn.insn {
			Insn::INeg | Insn::IInc(..)
			| Insn::I2L | Insn::I2F | Insn::I2D
			| Insn::I2B | Insn::I2C | Insn::I2S
			| Insn::IfEq(_) | Insn::IfNe(_) | Insn::IfLt(_) | Insn::IfGe(_) | Insn::IfGt(_) | Insn::IfLe(_)
			| Insn::TableSwitch { .. } | Insn::LookupSwitch { .. }
			| Insn::IReturn
			| Insn::NewArray(_) | Insn::ANewArray(_) => self.check(BasicValue::Int, &value)?,
			Insn::FNeg | Insn::F2I | Insn::F2L | Insn::F2D | Insn::FReturn => self.check(BasicValue::Float, &value)?,
			Insn::LNeg | Insn::L2I | Insn::L2F | Insn::L2D | Insn::LReturn => self.check(BasicValue::Long, &value)?,
			Insn::DNeg | Insn::D2I | Insn::D2L | Insn::D2F | Insn::DReturn => self.check(BasicValue::Double, &value)?,
			Insn::GetField(_)
			| Insn::ArrayLength
			| Insn::CheckCast(_) | Insn::InstanceOf(_)
			| Insn::AReturn | Insn::AThrow
			| Insn::MonitorEnter | Insn::MonitorExit
			| Insn::IfNull(_) | Insn::IfNonNull(_) => self.check(BasicValue::Reference, &value)?,
			Insn::PutStatic(field_ref) => self.check_field_value(&field_ref.desc, &value)?,
			other => bail!("not a unary instruction: {other:?}"),
		}
		self.inner.unary_operation(insn, value)
	}

	fn binary_operation(&mut self, insn: InsnRef<'_>, value1: BasicValue, value2: BasicValue) -> Result<BasicValue> {
		let (expected1, expected2) = match insn.insn {
			Insn::IALoad | Insn::LALoad | Insn::FALoad | Insn::DALoad
			| Insn::AALoad | Insn::BALoad | Insn::CALoad | Insn::SALoad =>
				(BasicValue::Reference, BasicValue::Int),
			Insn::IAdd | Insn::ISub | Insn::IMul | Insn::IDiv | Insn::IRem
			| Insn::IShl | Insn::IShr | Insn::IUShr
			| Insn::IAnd | Insn::IOr | Insn::IXor
			| Insn::IfICmpEq(_) | Insn::IfICmpNe(_)
			| Insn::IfICmpLt(_) | Insn::IfICmpGe(_) | Insn::IfICmpGt(_) | Insn::IfICmpLe(_) =>
				(BasicValue::Int, BasicValue::Int),
			Insn::FAdd | Insn::FSub | Insn::FMul | Insn::FDiv | Insn::FRem
			| Insn::FCmpL | Insn::FCmpG =>
				(BasicValue::Float, BasicValue::Float),
			Insn::LAdd | Insn::LSub | Insn::LMul | Insn::LDiv | Insn::LRem
			| Insn::LAnd | Insn::LOr | Insn::LXor
			| Insn::LCmp =>
				(BasicValue::Long, BasicValue::Long),
			// the shift distance of a long shift is an int
			Insn::LShl | Insn::LShr | Insn::LUShr =>
				(BasicValue::Long, BasicValue::Int),
			Insn::DAdd | Insn::DSub | Insn::DMul | Insn::DDiv | Insn::DRem
			| Insn::DCmpL | Insn::DCmpG =>
				(BasicValue::Double, BasicValue::Double),
			Insn::IfACmpEq(_) | Insn::IfACmpNe(_) =>
				(BasicValue::Reference, BasicValue::Reference),
			Insn::PutField(field_ref) => {
				self.check(BasicValue::Reference, &value1)?;
				self.check_field_value(&field_ref.desc, &value2)?;
				return self.inner.binary_operation(insn, value1, value2);
			},
			other => bail!("not a binary instruction: {other:?}"),
		};
		self.check(expected1, &value1)?;
		self.check(expected2, &value2)?;
		self.inner.binary_operation(insn, value1, value2)
	}

	fn ternary_operation(&mut self, insn: InsnRef<'_>, value1: BasicValue, value2: BasicValue, value3: BasicValue) -> Result<BasicValue> {
		let expected3 = match insn.insn {
			Insn::IAStore | Insn::BAStore | Insn::CAStore | Insn::SAStore => BasicValue::Int,
			Insn::LAStore => BasicValue::Long,
			Insn::FAStore => BasicValue::Float,
			Insn::DAStore => BasicValue::Double,
			Insn::AAStore => BasicValue::Reference,
			other => bail!("not an array store: {other:?}"),
		};
		self.check(BasicValue::Reference, &value1)?;
		self.check(BasicValue::Int, &value2)?;
		self.check(expected3, &value3)?;
		self.inner.ternary_operation(insn, value1, value2, value3)
	}

	fn nary_operation(&mut self, insn: InsnRef<'_>, values: Vec<BasicValue>) -> Result<BasicValue> {
		match insn.insn {
			Insn::MultiANewArray(..) => {
				for value in &values {
					self.check(BasicValue::Int, value)?;
				}
			},
			Insn::InvokeVirtual(method_ref)
			| Insn::InvokeSpecial(method_ref, _)
			| Insn::InvokeInterface(method_ref) => {
				self.check_invocation(&method_ref.desc, &values, true)?;
			},
			Insn::InvokeStatic(method_ref, _) => {
				self.check_invocation(&method_ref.desc, &values, false)?;
			},
			Insn::InvokeDynamic(invoke_dynamic) => {
				self.check_invocation(&invoke_dynamic.descriptor, &values, false)?;
			},
			other => bail!("not an n-ary instruction: {other:?}"),
		}
		self.inner.nary_operation(insn, values)
	}

	fn return_operation(&mut self, _insn: InsnRef<'_>, value: BasicValue, expected: Option<&BasicValue>) -> Result<()> {
		match expected {
			Some(expected) => self.check(*expected, &value),
			None => Err(Error::Verification {
				expected: "void".to_string(),
				actual: value.to_string(),
			}.into()),
		}
	}

	fn merge(&mut self, value1: BasicValue, value2: BasicValue) -> BasicValue {
		self.inner.merge(value1, value2)
	}
}

impl BasicVerifier {
	fn check_invocation(&mut self, desc: &crate::tree::method::MethodDescriptorSlice, values: &[BasicValue], has_receiver: bool) -> Result<()> {
		let parsed = desc.parse()?;
		let expected_count = parsed.parameter_descriptors.len() + usize::from(has_receiver);
		if values.len() != expected_count {
			bail!("expected {expected_count} argument slots for {desc:?}, got {}", values.len());
		}
		let mut values = values.iter();
		if has_receiver {
			// the receiver slot
			let receiver = values.next();
			if let Some(receiver) = receiver {
				self.check(BasicValue::Reference, receiver)?;
			}
		}
		for (ty, value) in parsed.parameter_descriptors.iter().zip(values) {
			self.check(BasicValue::of_type(ty), value)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use crate::analysis::basic::BasicValue;
	use crate::analysis::interpreter::{InsnRef, Interpreter};
	use crate::analysis::verifier::BasicVerifier;
	use crate::error::Error;
	use crate::tree::method::code::{Insn, InsnList, LvIndex};

	fn with_insn<T>(insn: Insn, f: impl FnOnce(InsnRef<'_>) -> T) -> T {
		let mut list = InsnList::new();
		let key = list.push_back(insn);
		f(InsnRef { key, insn: list.insn(key) })
	}

	fn assert_verification_error(result: Result<BasicValue>) {
		let err = result.unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Verification { .. })), "{err:?}");
	}

	#[test]
	fn iadd_wants_two_ints() {
		let mut verifier = BasicVerifier::new();
		with_insn(Insn::IAdd, |insn| {
			assert!(verifier.binary_operation(insn, BasicValue::Int, BasicValue::Int).is_ok());
		});
		with_insn(Insn::IAdd, |insn| {
			assert_verification_error(verifier.binary_operation(insn, BasicValue::Int, BasicValue::Float));
		});
	}

	#[test]
	fn long_shift_distance_is_int() {
		let mut verifier = BasicVerifier::new();
		with_insn(Insn::LShl, |insn| {
			assert!(verifier.binary_operation(insn, BasicValue::Long, BasicValue::Int).is_ok());
		});
		with_insn(Insn::LShl, |insn| {
			assert_verification_error(verifier.binary_operation(insn, BasicValue::Long, BasicValue::Long));
		});
	}

	#[test]
	fn astore_takes_references_and_return_addresses() {
		let mut verifier = BasicVerifier::new();
		with_insn(Insn::AStore(LvIndex { index: 0 }), |insn| {
			assert!(verifier.copy_operation(insn, BasicValue::Reference).is_ok());
			assert!(verifier.copy_operation(insn, BasicValue::ReturnAddress).is_ok());
			assert_verification_error(verifier.copy_operation(insn, BasicValue::Int));
		});
	}

	#[test]
	fn return_against_void() {
		let mut verifier = BasicVerifier::new();
		with_insn(Insn::IReturn, |insn| {
			let err = verifier.return_operation(insn, BasicValue::Int, None).unwrap_err();
			assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Verification { .. })), "{err:?}");
		});
	}
}
