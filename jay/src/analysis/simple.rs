use std::fmt::{Display, Formatter};
use anyhow::{bail, Result};
use java_string::JavaStr;
use crate::analysis::interpreter::{InsnRef, Interpreter, Value};
use crate::error::Error;
use crate::tree::class::{ClassName, ClassNameSlice};
use crate::tree::descriptor::{ArrayType, ParsedFieldDescriptor, Type};
use crate::tree::method::code::{self, Insn, Loadable};

/// Answers the class hierarchy questions [`SimpleVerifier`] asks.
///
/// Where the classes come from (a class path scan, pre-parsed metadata,
/// anything) is the oracle's business; the verifier stays pure. An oracle
/// that cannot resolve a class should answer conservatively (`false`,
/// `None`), not panic.
pub trait TypeOracle {
	fn is_interface(&self, class: &ClassNameSlice) -> bool;

	/// The direct superclass, or `None` for `java/lang/Object` (and for
	/// classes the oracle cannot resolve).
	fn super_class(&self, class: &ClassNameSlice) -> Option<ClassName>;

	/// Whether `source` is `target` or a subclass/implementation of it.
	fn is_assignable(&self, target: &ClassNameSlice, source: &ClassNameSlice) -> bool;
}

/// The oracle that knows nothing beyond `java/lang/Object`: no interfaces,
/// every class a direct subclass of `Object`.
///
/// With it, unrelated classes merge straight to `Object`, which is always
/// sound, just imprecise.
#[derive(Debug, Default, Copy, Clone)]
pub struct ObjectOracle;

impl TypeOracle for ObjectOracle {
	fn is_interface(&self, _class: &ClassNameSlice) -> bool {
		false
	}

	fn super_class(&self, class: &ClassNameSlice) -> Option<ClassName> {
		if class == ClassName::JAVA_LANG_OBJECT {
			None
		} else {
			Some(ClassName::JAVA_LANG_OBJECT.to_owned())
		}
	}

	fn is_assignable(&self, target: &ClassNameSlice, source: &ClassNameSlice) -> bool {
		target == source || target == ClassName::JAVA_LANG_OBJECT
	}
}

/// An exact abstract value: `null`, a return address, or a value of a precise
/// [`Type`].
///
/// Scalar `boolean`/`byte`/`char`/`short` collapse to `int` (they are
/// indistinguishable on the stack); array types stay exact, element types
/// included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
	/// An empty or unusable slot, and the bottom of the merge lattice.
	Uninitialized,
	/// The address a `jsr` pushes for its subroutine to `ret` to.
	ReturnAddress,
	/// The `null` reference, assignable to every reference type.
	Null,
	Of(Type),
}

impl Value for TypedValue {
	fn size(&self) -> u8 {
		match self {
			TypedValue::Of(ty) => ty.size(),
			_ => 1,
		}
	}
}

impl Display for TypedValue {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			TypedValue::Uninitialized => f.write_str("."),
			TypedValue::ReturnAddress => f.write_str("return-address"),
			TypedValue::Null => f.write_str("null"),
			TypedValue::Of(ty) => write!(f, "{}", ParsedFieldDescriptor(ty.clone()).write()),
		}
	}
}

const JAVA_LANG_STRING: &ClassNameSlice = {
	// SAFETY: a valid class name.
	unsafe { ClassNameSlice::from_inner_unchecked(JavaStr::from_str("java/lang/String")) }
};
const JAVA_LANG_CLASS: &ClassNameSlice = {
	// SAFETY: a valid class name.
	unsafe { ClassNameSlice::from_inner_unchecked(JavaStr::from_str("java/lang/Class")) }
};
const METHOD_HANDLE: &ClassNameSlice = {
	// SAFETY: a valid class name.
	unsafe { ClassNameSlice::from_inner_unchecked(JavaStr::from_str("java/lang/invoke/MethodHandle")) }
};
const METHOD_TYPE: &ClassNameSlice = {
	// SAFETY: a valid class name.
	unsafe { ClassNameSlice::from_inner_unchecked(JavaStr::from_str("java/lang/invoke/MethodType")) }
};
const JAVA_LANG_CLONEABLE: &ClassNameSlice = {
	// SAFETY: a valid class name.
	unsafe { ClassNameSlice::from_inner_unchecked(JavaStr::from_str("java/lang/Cloneable")) }
};
const JAVA_IO_SERIALIZABLE: &ClassNameSlice = {
	// SAFETY: a valid class name.
	unsafe { ClassNameSlice::from_inner_unchecked(JavaStr::from_str("java/io/Serializable")) }
};

/// Scalar sub-int types are not distinguishable from `int` in a frame slot.
fn canonical(ty: &Type) -> Type {
	match ty {
		Type::Z | Type::B | Type::C | Type::S => Type::I,
		other => other.clone(),
	}
}

/// An [`Interpreter`] over exact types: checks every operand like
/// [`BasicVerifier`](crate::analysis::verifier::BasicVerifier), but down to
/// class and array types, with subtyping answered by a [`TypeOracle`] and
/// [`merge`](Interpreter::merge) walking superclasses to the least common
/// ancestor it can prove.
#[derive(Debug, Clone)]
pub struct SimpleVerifier<O> {
	oracle: O,
}

impl<O: TypeOracle> SimpleVerifier<O> {
	pub fn new(oracle: O) -> SimpleVerifier<O> {
		SimpleVerifier { oracle }
	}

	pub fn oracle(&self) -> &O {
		&self.oracle
	}

	fn verification_error(&self, expected: impl Into<String>, actual: &TypedValue) -> anyhow::Error {
		Error::Verification { expected: expected.into(), actual: actual.to_string() }.into()
	}

	fn expect(&self, expected: &TypedValue, actual: &TypedValue) -> Result<()> {
		if self.is_sub_type(actual, expected) {
			Ok(())
		} else {
			Err(self.verification_error(expected.to_string(), actual))
		}
	}

	fn expect_int(&self, actual: &TypedValue) -> Result<()> {
		self.expect(&TypedValue::Of(Type::I), actual)
	}

	fn expect_reference(&self, actual: &TypedValue) -> Result<()> {
		match actual {
			TypedValue::Null => Ok(()),
			TypedValue::Of(ty) if ty.is_reference() => Ok(()),
			other => Err(self.verification_error("a reference", other)),
		}
	}

	/// Checks for an array whose element is one of `elements` (e.g. both
	/// `byte[]` and `boolean[]` for `baload`).
	fn expect_array_of(&self, elements: &[ArrayType], actual: &TypedValue) -> Result<()> {
		match actual {
			TypedValue::Null => Ok(()),
			TypedValue::Of(Type::Array(1, element)) if elements.contains(element) => Ok(()),
			other => Err(self.verification_error(
				format!("an array of {}", ParsedFieldDescriptor(elements[0].clone().into_type()).write()),
				other,
			)),
		}
	}

	fn expect_reference_array(&self, actual: &TypedValue) -> Result<()> {
		match actual {
			TypedValue::Null => Ok(()),
			TypedValue::Of(Type::Array(dimension, element)) if *dimension > 1 || element.is_reference() => Ok(()),
			other => Err(self.verification_error("an array of references", other)),
		}
	}

	/// Whether `value` may stand wherever an `expected` value is required.
	fn is_sub_type(&self, value: &TypedValue, expected: &TypedValue) -> bool {
		match (value, expected) {
			(value, expected) if value == expected => true,
			(TypedValue::Null, TypedValue::Of(ty)) => ty.is_reference(),
			(TypedValue::Of(source), TypedValue::Of(target)) => self.is_assignable_type(target, source),
			_ => false,
		}
	}

	/// Whether a value of type `source` is assignable to `target`.
	fn is_assignable_type(&self, target: &Type, source: &Type) -> bool {
		if target == source {
			return true;
		}
		match target {
			Type::Object(target_class) if target_class.as_slice() == ClassName::JAVA_LANG_OBJECT =>
				source.is_reference(),
			Type::Object(target_class) => match source {
				Type::Object(source_class) => self.oracle.is_assignable(target_class, source_class),
				// arrays implement exactly Cloneable and Serializable
				Type::Array(..) =>
					target_class.as_slice() == JAVA_LANG_CLONEABLE
						|| target_class.as_slice() == JAVA_IO_SERIALIZABLE,
				_ => false,
			},
			Type::Array(target_dimension, target_element) => match source {
				Type::Array(source_dimension, source_element) if source_dimension == target_dimension => {
					match (target_element, source_element) {
						(ArrayType::Object(target_class), ArrayType::Object(source_class)) =>
							self.is_assignable_type(
								&Type::Object(target_class.clone()),
								&Type::Object(source_class.clone()),
							),
						(target_element, source_element) => target_element == source_element,
					}
				},
				// a deeper array is a subtype of a shallower Object[]-like array
				Type::Array(source_dimension, _) if source_dimension > target_dimension => {
					matches!(target_element, ArrayType::Object(class)
						if class.as_slice() == ClassName::JAVA_LANG_OBJECT
							|| class.as_slice() == JAVA_LANG_CLONEABLE
							|| class.as_slice() == JAVA_IO_SERIALIZABLE)
				},
				_ => false,
			},
			_ => false,
		}
	}

	/// The direct supertype used by the merge walk: the oracle's superclass
	/// for classes, `Object` for arrays and unresolvable classes.
	fn super_of(&self, ty: &Type) -> Option<Type> {
		match ty {
			Type::Object(class) if class.as_slice() == ClassName::JAVA_LANG_OBJECT => None,
			Type::Object(class) => Some(Type::Object(
				self.oracle.super_class(class).unwrap_or_else(|| ClassName::JAVA_LANG_OBJECT.to_owned()),
			)),
			Type::Array(..) => Some(Type::Object(ClassName::JAVA_LANG_OBJECT.to_owned())),
			_ => None,
		}
	}

	/// The least common supertype of two reference types this verifier can
	/// prove: arrays of equal dimensions merge componentwise, everything else
	/// walks `a`'s superclass chain until it reaches a supertype of `b`
	/// (at the latest, `Object`).
	fn least_upper_bound(&self, a: &Type, b: &Type) -> Type {
		if self.is_assignable_type(a, b) {
			return a.clone();
		}
		if self.is_assignable_type(b, a) {
			return b.clone();
		}
		if let (Type::Array(da, ea), Type::Array(db, eb)) = (a, b) {
			if da == db {
				if let (ArrayType::Object(ca), ArrayType::Object(cb)) = (ea, eb) {
					let element = self.least_upper_bound(
						&Type::Object(ca.clone()),
						&Type::Object(cb.clone()),
					);
					if let Type::Object(element_class) = element {
						return Type::Array(*da, ArrayType::Object(element_class));
					}
				}
			}
		}
		let mut cur = a.clone();
		loop {
			cur = match self.super_of(&cur) {
				Some(cur) => cur,
				None => return Type::Object(ClassName::JAVA_LANG_OBJECT.to_owned()),
			};
			if self.is_assignable_type(&cur, b) {
				return cur;
			}
		}
	}

	fn value_of_class_name(&self, class: &ClassNameSlice) -> Result<TypedValue> {
		Ok(TypedValue::Of(canonical(&Type::from_class_name(class)?)))
	}

	fn check_invocation(
		&mut self,
		desc: &crate::tree::method::MethodDescriptorSlice,
		owner: Option<&ClassNameSlice>,
		values: &[TypedValue],
	) -> Result<TypedValue> {
		let parsed = desc.parse()?;
		let expected_count = parsed.parameter_descriptors.len() + usize::from(owner.is_some());
		if values.len() != expected_count {
			bail!("expected {expected_count} argument slots for {desc:?}, got {}", values.len());
		}
		let mut values = values.iter();
		if let Some(owner) = owner {
			let receiver = values.next();
			if let Some(receiver) = receiver {
				self.expect(&self.value_of_class_name(owner)?, receiver)?;
			}
		}
		for (ty, value) in parsed.parameter_descriptors.iter().zip(values) {
			self.expect(&TypedValue::Of(canonical(ty)), value)?;
		}
		Ok(match parsed.return_descriptor {
			Some(ty) => TypedValue::Of(canonical(&ty)),
			None => TypedValue::Uninitialized,
		})
	}
}

impl<O: TypeOracle> Interpreter for SimpleVerifier<O> {
	type Value = TypedValue;

	fn new_value(&mut self, ty: Option<&Type>) -> TypedValue {
		match ty {
			Some(ty) => TypedValue::Of(canonical(ty)),
			None => TypedValue::Uninitialized,
		}
	}

	fn new_operation(&mut self, insn: InsnRef<'_>) -> Result<TypedValue> {
		Ok(match insn.insn {
			Insn::AConstNull => TypedValue::Null,
			Insn::IConstM1
			| Insn::IConst0 | Insn::IConst1 | Insn::IConst2 | Insn::IConst3 | Insn::IConst4 | Insn::IConst5
			| Insn::BiPush(_) | Insn::SiPush(_) => TypedValue::Of(Type::I),
			Insn::LConst0 | Insn::LConst1 => TypedValue::Of(Type::J),
			Insn::FConst0 | Insn::FConst1 | Insn::FConst2 => TypedValue::Of(Type::F),
			Insn::DConst0 | Insn::DConst1 => TypedValue::Of(Type::D),
			Insn::Ldc(constant) => match constant {
				Loadable::Integer(_) => TypedValue::Of(Type::I),
				Loadable::Float(_) => TypedValue::Of(Type::F),
				Loadable::Long(_) => TypedValue::Of(Type::J),
				Loadable::Double(_) => TypedValue::Of(Type::D),
				Loadable::String(_) => TypedValue::Of(Type::Object(JAVA_LANG_STRING.to_owned())),
				Loadable::Class(_) => TypedValue::Of(Type::Object(JAVA_LANG_CLASS.to_owned())),
				Loadable::MethodHandle(_) => TypedValue::Of(Type::Object(METHOD_HANDLE.to_owned())),
				Loadable::MethodType(_) => TypedValue::Of(Type::Object(METHOD_TYPE.to_owned())),
				Loadable::Dynamic(constant_dynamic) =>
					TypedValue::Of(canonical(&constant_dynamic.descriptor.parse()?.0)),
			},
			Insn::GetStatic(field_ref) => TypedValue::Of(canonical(&field_ref.desc.parse()?.0)),
			Insn::New(class) => self.value_of_class_name(class)?,
			Insn::Jsr(_) => TypedValue::ReturnAddress,
			other => bail!("not a value-producing instruction: {other:?}"),
		})
	}

	fn copy_operation(&mut self, insn: InsnRef<'_>, value: TypedValue) -> Result<TypedValue> {
		match insn.insn {
			Insn::ILoad(_) | Insn::IStore(_) => self.expect_int(&value)?,
			Insn::FLoad(_) | Insn::FStore(_) => self.expect(&TypedValue::Of(Type::F), &value)?,
			Insn::LLoad(_) | Insn::LStore(_) => self.expect(&TypedValue::Of(Type::J), &value)?,
			Insn::DLoad(_) | Insn::DStore(_) => self.expect(&TypedValue::Of(Type::D), &value)?,
			Insn::ALoad(_) => self.expect_reference(&value)?,
			Insn::AStore(_) => {
				if value != TypedValue::ReturnAddress {
					self.expect_reference(&value)?;
				}
			},
			other => bail!("not a load or store: {other:?}"),
		}
		Ok(value)
	}

	fn unary_operation(&mut self, insn: InsnRef<'_>, value: TypedValue) -> Result<TypedValue> {
		Ok(match insn.insn {
			Insn::INeg | Insn::IInc(..) | Insn::I2B | Insn::I2C | Insn::I2S => {
				self.expect_int(&value)?;
				TypedValue::Of(Type::I)
			},
			Insn::I2F => { self.expect_int(&value)?; TypedValue::Of(Type::F) },
			Insn::I2L => { self.expect_int(&value)?; TypedValue::Of(Type::J) },
			Insn::I2D => { self.expect_int(&value)?; TypedValue::Of(Type::D) },
			Insn::FNeg => { self.expect(&TypedValue::Of(Type::F), &value)?; TypedValue::Of(Type::F) },
			Insn::F2I => { self.expect(&TypedValue::Of(Type::F), &value)?; TypedValue::Of(Type::I) },
			Insn::F2L => { self.expect(&TypedValue::Of(Type::F), &value)?; TypedValue::Of(Type::J) },
			Insn::F2D => { self.expect(&TypedValue::Of(Type::F), &value)?; TypedValue::Of(Type::D) },
			Insn::LNeg => { self.expect(&TypedValue::Of(Type::J), &value)?; TypedValue::Of(Type::J) },
			Insn::L2I => { self.expect(&TypedValue::Of(Type::J), &value)?; TypedValue::Of(Type::I) },
			Insn::L2F => { self.expect(&TypedValue::Of(Type::J), &value)?; TypedValue::Of(Type::F) },
			Insn::L2D => { self.expect(&TypedValue::Of(Type::J), &value)?; TypedValue::Of(Type::D) },
			Insn::DNeg => { self.expect(&TypedValue::Of(Type::D), &value)?; TypedValue::Of(Type::D) },
			Insn::D2I => { self.expect(&TypedValue::Of(Type::D), &value)?; TypedValue::Of(Type::I) },
			Insn::D2L => { self.expect(&TypedValue::Of(Type::D), &value)?; TypedValue::Of(Type::J) },
			Insn::D2F => { self.expect(&TypedValue::Of(Type::D), &value)?; TypedValue::Of(Type::F) },

			Insn::IfEq(_) | Insn::IfNe(_) | Insn::IfLt(_) | Insn::IfGe(_) | Insn::IfGt(_) | Insn::IfLe(_)
			| Insn::TableSwitch { .. } | Insn::LookupSwitch { .. } => {
				self.expect_int(&value)?;
				TypedValue::Uninitialized
			},
			Insn::IfNull(_) | Insn::IfNonNull(_)
			| Insn::AThrow | Insn::MonitorEnter | Insn::MonitorExit => {
				self.expect_reference(&value)?;
				TypedValue::Uninitialized
			},

			Insn::IReturn => { self.expect_int(&value)?; TypedValue::Uninitialized },
			Insn::LReturn => { self.expect(&TypedValue::Of(Type::J), &value)?; TypedValue::Uninitialized },
			Insn::FReturn => { self.expect(&TypedValue::Of(Type::F), &value)?; TypedValue::Uninitialized },
			Insn::DReturn => { self.expect(&TypedValue::Of(Type::D), &value)?; TypedValue::Uninitialized },
			Insn::AReturn => { self.expect_reference(&value)?; TypedValue::Uninitialized },

			Insn::GetField(field_ref) => {
				self.expect(&self.value_of_class_name(&field_ref.class)?, &value)?;
				TypedValue::Of(canonical(&field_ref.desc.parse()?.0))
			},
			Insn::PutStatic(field_ref) => {
				self.expect(&TypedValue::Of(canonical(&field_ref.desc.parse()?.0)), &value)?;
				TypedValue::Uninitialized
			},

			Insn::NewArray(element) => {
				self.expect_int(&value)?;
				TypedValue::Of(Type::Array(1, match element {
					code::ArrayType::Boolean => ArrayType::Z,
					code::ArrayType::Char => ArrayType::C,
					code::ArrayType::Float => ArrayType::F,
					code::ArrayType::Double => ArrayType::D,
					code::ArrayType::Byte => ArrayType::B,
					code::ArrayType::Short => ArrayType::S,
					code::ArrayType::Int => ArrayType::I,
					code::ArrayType::Long => ArrayType::J,
				}))
			},
			Insn::ANewArray(class) => {
				self.expect_int(&value)?;
				TypedValue::Of(Type::from_class_name(class)?.into_array())
			},
			Insn::ArrayLength => {
				match &value {
					TypedValue::Null | TypedValue::Of(Type::Array(..)) => {},
					other => return Err(self.verification_error("an array", other)),
				}
				TypedValue::Of(Type::I)
			},
			Insn::CheckCast(class) => {
				self.expect_reference(&value)?;
				self.value_of_class_name(class)?
			},
			Insn::InstanceOf(_) => {
				self.expect_reference(&value)?;
				TypedValue::Of(Type::I)
			},
			other => bail!("not a unary instruction: {other:?}"),
		})
	}

	fn binary_operation(&mut self, insn: InsnRef<'_>, value1: TypedValue, value2: TypedValue) -> Result<TypedValue> {
		Ok(match insn.insn {
			Insn::IALoad => {
				self.expect_array_of(&[ArrayType::I], &value1)?;
				self.expect_int(&value2)?;
				TypedValue::Of(Type::I)
			},
			Insn::BALoad => {
				self.expect_array_of(&[ArrayType::B, ArrayType::Z], &value1)?;
				self.expect_int(&value2)?;
				TypedValue::Of(Type::I)
			},
			Insn::CALoad => {
				self.expect_array_of(&[ArrayType::C], &value1)?;
				self.expect_int(&value2)?;
				TypedValue::Of(Type::I)
			},
			Insn::SALoad => {
				self.expect_array_of(&[ArrayType::S], &value1)?;
				self.expect_int(&value2)?;
				TypedValue::Of(Type::I)
			},
			Insn::LALoad => {
				self.expect_array_of(&[ArrayType::J], &value1)?;
				self.expect_int(&value2)?;
				TypedValue::Of(Type::J)
			},
			Insn::FALoad => {
				self.expect_array_of(&[ArrayType::F], &value1)?;
				self.expect_int(&value2)?;
				TypedValue::Of(Type::F)
			},
			Insn::DALoad => {
				self.expect_array_of(&[ArrayType::D], &value1)?;
				self.expect_int(&value2)?;
				TypedValue::Of(Type::D)
			},
			Insn::AALoad => {
				self.expect_reference_array(&value1)?;
				self.expect_int(&value2)?;
				match &value1 {
					TypedValue::Null => TypedValue::Null,
					TypedValue::Of(array) => match array.element_type() {
						Some(element) => TypedValue::Of(element),
						None => bail!("aaload of a non-array {value1}"),
					},
					_ => TypedValue::Null,
				}
			},

			Insn::IAdd | Insn::ISub | Insn::IMul | Insn::IDiv | Insn::IRem
			| Insn::IShl | Insn::IShr | Insn::IUShr
			| Insn::IAnd | Insn::IOr | Insn::IXor => {
				self.expect_int(&value1)?;
				self.expect_int(&value2)?;
				TypedValue::Of(Type::I)
			},
			Insn::FAdd | Insn::FSub | Insn::FMul | Insn::FDiv | Insn::FRem => {
				self.expect(&TypedValue::Of(Type::F), &value1)?;
				self.expect(&TypedValue::Of(Type::F), &value2)?;
				TypedValue::Of(Type::F)
			},
			Insn::LAdd | Insn::LSub | Insn::LMul | Insn::LDiv | Insn::LRem
			| Insn::LAnd | Insn::LOr | Insn::LXor => {
				self.expect(&TypedValue::Of(Type::J), &value1)?;
				self.expect(&TypedValue::Of(Type::J), &value2)?;
				TypedValue::Of(Type::J)
			},
			Insn::LShl | Insn::LShr | Insn::LUShr => {
				self.expect(&TypedValue::Of(Type::J), &value1)?;
				self.expect_int(&value2)?;
				TypedValue::Of(Type::J)
			},
			Insn::DAdd | Insn::DSub | Insn::DMul | Insn::DDiv | Insn::DRem => {
				self.expect(&TypedValue::Of(Type::D), &value1)?;
				self.expect(&TypedValue::Of(Type::D), &value2)?;
				TypedValue::Of(Type::D)
			},
			Insn::LCmp => {
				self.expect(&TypedValue::Of(Type::J), &value1)?;
				self.expect(&TypedValue::Of(Type::J), &value2)?;
				TypedValue::Of(Type::I)
			},
			Insn::FCmpL | Insn::FCmpG => {
				self.expect(&TypedValue::Of(Type::F), &value1)?;
				self.expect(&TypedValue::Of(Type::F), &value2)?;
				TypedValue::Of(Type::I)
			},
			Insn::DCmpL | Insn::DCmpG => {
				self.expect(&TypedValue::Of(Type::D), &value1)?;
				self.expect(&TypedValue::Of(Type::D), &value2)?;
				TypedValue::Of(Type::I)
			},

			Insn::IfICmpEq(_) | Insn::IfICmpNe(_)
			| Insn::IfICmpLt(_) | Insn::IfICmpGe(_) | Insn::IfICmpGt(_) | Insn::IfICmpLe(_) => {
				self.expect_int(&value1)?;
				self.expect_int(&value2)?;
				TypedValue::Uninitialized
			},
			Insn::IfACmpEq(_) | Insn::IfACmpNe(_) => {
				self.expect_reference(&value1)?;
				self.expect_reference(&value2)?;
				TypedValue::Uninitialized
			},
			Insn::PutField(field_ref) => {
				self.expect(&self.value_of_class_name(&field_ref.class)?, &value1)?;
				self.expect(&TypedValue::Of(canonical(&field_ref.desc.parse()?.0)), &value2)?;
				TypedValue::Uninitialized
			},
			other => bail!("not a binary instruction: {other:?}"),
		})
	}

	fn ternary_operation(&mut self, insn: InsnRef<'_>, value1: TypedValue, value2: TypedValue, value3: TypedValue) -> Result<TypedValue> {
		match insn.insn {
			Insn::IAStore => {
				self.expect_array_of(&[ArrayType::I], &value1)?;
				self.expect_int(&value3)?;
			},
			Insn::BAStore => {
				self.expect_array_of(&[ArrayType::B, ArrayType::Z], &value1)?;
				self.expect_int(&value3)?;
			},
			Insn::CAStore => {
				self.expect_array_of(&[ArrayType::C], &value1)?;
				self.expect_int(&value3)?;
			},
			Insn::SAStore => {
				self.expect_array_of(&[ArrayType::S], &value1)?;
				self.expect_int(&value3)?;
			},
			Insn::LAStore => {
				self.expect_array_of(&[ArrayType::J], &value1)?;
				self.expect(&TypedValue::Of(Type::J), &value3)?;
			},
			Insn::FAStore => {
				self.expect_array_of(&[ArrayType::F], &value1)?;
				self.expect(&TypedValue::Of(Type::F), &value3)?;
			},
			Insn::DAStore => {
				self.expect_array_of(&[ArrayType::D], &value1)?;
				self.expect(&TypedValue::Of(Type::D), &value3)?;
			},
			Insn::AAStore => {
				self.expect_reference_array(&value1)?;
				// element compatibility is a runtime check (ArrayStoreException)
				self.expect_reference(&value3)?;
			},
			other => bail!("not an array store: {other:?}"),
		}
		self.expect_int(&value2)?;
		Ok(TypedValue::Uninitialized)
	}

	fn nary_operation(&mut self, insn: InsnRef<'_>, values: Vec<TypedValue>) -> Result<TypedValue> {
		match insn.insn {
			Insn::MultiANewArray(class, _) => {
				for value in &values {
					self.expect_int(value)?;
				}
				self.value_of_class_name(class)
			},
			Insn::InvokeVirtual(method_ref)
			| Insn::InvokeSpecial(method_ref, _)
			| Insn::InvokeInterface(method_ref) => {
				self.check_invocation(&method_ref.desc, Some(&method_ref.class), &values)
			},
			Insn::InvokeStatic(method_ref, _) => {
				self.check_invocation(&method_ref.desc, None, &values)
			},
			Insn::InvokeDynamic(invoke_dynamic) => {
				self.check_invocation(&invoke_dynamic.descriptor, None, &values)
			},
			other => bail!("not an n-ary instruction: {other:?}"),
		}
	}

	fn return_operation(&mut self, _insn: InsnRef<'_>, value: TypedValue, expected: Option<&TypedValue>) -> Result<()> {
		match expected {
			Some(expected) => self.expect(expected, &value),
			None => Err(Error::Verification {
				expected: "void".to_string(),
				actual: value.to_string(),
			}.into()),
		}
	}

	fn merge(&mut self, value1: TypedValue, value2: TypedValue) -> TypedValue {
		if value1 == value2 {
			return value1;
		}
		match (&value1, &value2) {
			(TypedValue::Of(ty), TypedValue::Null) if ty.is_reference() => value1,
			(TypedValue::Null, TypedValue::Of(ty)) if ty.is_reference() => value2,
			(TypedValue::Of(a), TypedValue::Of(b)) if a.is_reference() && b.is_reference() =>
				TypedValue::Of(self.least_upper_bound(a, b)),
			_ => TypedValue::Uninitialized,
		}
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::analysis::interpreter::Interpreter;
	use crate::analysis::simple::{ObjectOracle, SimpleVerifier, TypedValue};
	use crate::tree::class::ClassName;
	use crate::tree::descriptor::{ArrayType, Type};

	fn object(name: &str) -> Type {
		Type::Object(ClassName::from(name))
	}

	fn object_array(dimension: u8, name: &str) -> Type {
		Type::Array(dimension, ArrayType::Object(ClassName::from(name)))
	}

	fn merge(a: Type, b: Type) -> TypedValue {
		SimpleVerifier::new(ObjectOracle).merge(TypedValue::Of(a), TypedValue::Of(b))
	}

	#[test]
	fn merging_unrelated_classes_gives_object() {
		assert_eq!(
			merge(object("java/lang/String"), object("java/lang/Integer")),
			TypedValue::Of(object("java/lang/Object")),
		);
	}

	#[test]
	fn merging_arrays_of_unrelated_classes() {
		// String[] and Integer[] merge componentwise to Object[]
		assert_eq!(
			merge(object_array(1, "java/lang/String"), object_array(1, "java/lang/Integer")),
			TypedValue::Of(object_array(1, "java/lang/Object")),
		);
	}

	#[test]
	fn merging_arrays_of_different_dimensions() {
		// String[][] and String[] degrade all the way to Object
		assert_eq!(
			merge(object_array(2, "java/lang/String"), object_array(1, "java/lang/String")),
			TypedValue::Of(object("java/lang/Object")),
		);
	}

	#[test]
	fn merging_primitive_arrays() {
		assert_eq!(
			merge(Type::Array(1, ArrayType::I), Type::Array(1, ArrayType::J)),
			TypedValue::Of(object("java/lang/Object")),
		);
		assert_eq!(
			merge(Type::Array(1, ArrayType::I), Type::Array(1, ArrayType::I)),
			TypedValue::Of(Type::Array(1, ArrayType::I)),
		);
	}

	#[test]
	fn null_merges_into_references() {
		let mut verifier = SimpleVerifier::new(ObjectOracle);
		assert_eq!(
			verifier.merge(TypedValue::Null, TypedValue::Of(object("java/lang/String"))),
			TypedValue::Of(object("java/lang/String")),
		);
		assert_eq!(
			verifier.merge(TypedValue::Of(object("java/lang/String")), TypedValue::Null),
			TypedValue::Of(object("java/lang/String")),
		);
	}

	#[test]
	fn mixing_categories_gives_uninitialized() {
		let mut verifier = SimpleVerifier::new(ObjectOracle);
		assert_eq!(
			verifier.merge(TypedValue::Of(Type::I), TypedValue::Of(object("java/lang/String"))),
			TypedValue::Uninitialized,
		);
		assert_eq!(
			verifier.merge(TypedValue::ReturnAddress, TypedValue::Of(Type::I)),
			TypedValue::Uninitialized,
		);
	}

	#[test]
	fn deep_arrays_are_object_arrays() {
		let verifier = SimpleVerifier::new(ObjectOracle);
		assert!(verifier.is_assignable_type(
			&object_array(1, "java/lang/Object"),
			&object_array(2, "java/lang/String"),
		));
		assert!(!verifier.is_assignable_type(
			&object_array(2, "java/lang/String"),
			&object_array(1, "java/lang/String"),
		));
	}
}
