use std::iter::Peekable;
use anyhow::{anyhow, Context, Result};
use java_string::{Chars, JavaString};
use crate::error::Error;
use crate::tree::class::{ClassName, ClassNameSlice};
use crate::tree::field::{FieldDescriptor, FieldDescriptorSlice};
use crate::tree::method::{MethodDescriptor, MethodDescriptorSlice};

/// Represents a type.
///
/// In case of an array, use the [`Type::Array`] variant, giving the dimension
/// and the element type:
/// ```
/// use jay::tree::descriptor::{ArrayType, Type};
///
/// // the type of a java `int`
/// let int_type = Type::I;
///
/// // the type of a java `int[][]`
/// let int_array_type = Type::Array(2, ArrayType::I);
///
/// assert_ne!(int_type, int_array_type);
/// ```
///
/// Note: never construct the [`Type::Array`] variant with a dimension of
/// zero; [`Type::Array`]`(0, ...)` and the plain element type would not
/// compare equal. Parsing never produces such a value.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Type {
	/// A `byte`. In rust, this is a `i8`.
	B,
	/// A `char`.
	C,
	/// A `double`. In rust, this is a `f64`.
	D,
	/// A `float`. In rust, this is a `f32`.
	F,
	/// An `int`. In rust, this is a `i32`.
	I,
	/// A `long`. In rust, this is a `i64`.
	J,
	/// A `short`. In rust, this is a `i16`.
	S,
	/// A `boolean`. In rust, this is a `bool`.
	Z,
	/// An instance of the class specified by [`ClassName`].
	Object(ClassName),
	/// An array type, represented by the dimension and the element [`ArrayType`].
	Array(u8, ArrayType),
}

/// The element type of an array: any [`Type`] except an array.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ArrayType {
	B,
	C,
	D,
	F,
	I,
	J,
	S,
	Z,
	Object(ClassName),
}

impl Type {
	/// The number of 32-bit variable slots a value of this type occupies:
	/// 2 for `long` and `double`, 1 for everything else.
	///
	/// (`void` has no [`Type`]; where it can occur it's an `Option<Type>`
	/// being `None`, and counts zero slots.)
	pub fn size(&self) -> u8 {
		match self {
			Type::D | Type::J => 2,
			_ => 1,
		}
	}

	/// Whether this is a class or array type.
	pub fn is_reference(&self) -> bool {
		matches!(self, Type::Object(_) | Type::Array(..))
	}

	/// The type of an element of this array type, i.e. this type with one
	/// array dimension stripped. `None` if this isn't an array type.
	pub fn element_type(&self) -> Option<Type> {
		match self {
			Type::Array(1, element) => Some(element.clone().into_type()),
			Type::Array(dimension, element) => Some(Type::Array(dimension - 1, element.clone())),
			_ => None,
		}
	}

	/// The type of an array of this type, i.e. this type with one array
	/// dimension added.
	pub fn into_array(self) -> Type {
		match self {
			Type::B => Type::Array(1, ArrayType::B),
			Type::C => Type::Array(1, ArrayType::C),
			Type::D => Type::Array(1, ArrayType::D),
			Type::F => Type::Array(1, ArrayType::F),
			Type::I => Type::Array(1, ArrayType::I),
			Type::J => Type::Array(1, ArrayType::J),
			Type::S => Type::Array(1, ArrayType::S),
			Type::Z => Type::Array(1, ArrayType::Z),
			Type::Object(class_name) => Type::Array(1, ArrayType::Object(class_name)),
			Type::Array(dimension, element) => Type::Array(dimension + 1, element),
		}
	}

	/// Parses a class name as the type it denotes.
	///
	/// Class names can both name classes (`java/lang/String`) and, in the
	/// contexts where instructions like `checkcast` or `anewarray` reference
	/// array classes, be field descriptors (`[[I`).
	pub fn from_class_name(class_name: &ClassNameSlice) -> Result<Type> {
		if class_name.as_inner().starts_with('[') {
			// SAFETY: an array class name is a valid field descriptor.
			let descriptor = unsafe { FieldDescriptorSlice::from_inner_unchecked(class_name.as_inner()) };
			Ok(descriptor.parse()?.0)
		} else {
			Ok(Type::Object(class_name.to_owned()))
		}
	}
}

impl ArrayType {
	/// This element type as a plain [`Type`].
	pub fn into_type(self) -> Type {
		match self {
			ArrayType::B => Type::B,
			ArrayType::C => Type::C,
			ArrayType::D => Type::D,
			ArrayType::F => Type::F,
			ArrayType::I => Type::I,
			ArrayType::J => Type::J,
			ArrayType::S => Type::S,
			ArrayType::Z => Type::Z,
			ArrayType::Object(class_name) => Type::Object(class_name),
		}
	}

	pub fn is_reference(&self) -> bool {
		matches!(self, ArrayType::Object(_))
	}
}

// The grammar for descriptors is:
//   FieldDescriptor:
//     FieldType
//
//   MethodDescriptor:
//     "(" FieldType* ")" ReturnDescriptor
//
//   ReturnDescriptor:
//     FieldType | "V"
//
//   FieldType:
//     "B" | "C" | "D" | "F" | "I" | "J" | "S" | "Z" |
//     "L" ClassName ";" |
//     "[" FieldType
fn read_field_type(chars: &mut Peekable<Chars>) -> Result<Type> {
	let mut dimension: u8 = 0;
	while chars.next_if_eq(&'[').is_some() {
		dimension = dimension.checked_add(1)
			.ok_or_else(|| Error::BadDescriptor("more than 255 array dimensions".into()))?;
	}

	let char = chars.next()
		.ok_or_else(|| Error::BadDescriptor("unexpected abrupt ending of descriptor".into()))?;

	let element = if char == 'B' { ArrayType::B }
		else if char == 'C' { ArrayType::C }
		else if char == 'D' { ArrayType::D }
		else if char == 'F' { ArrayType::F }
		else if char == 'I' { ArrayType::I }
		else if char == 'J' { ArrayType::J }
		else if char == 'S' { ArrayType::S }
		else if char == 'Z' { ArrayType::Z }
		else if char == 'L' {
			let mut s = JavaString::new();
			loop {
				let char = chars.next()
					.ok_or_else(|| Error::BadDescriptor("unterminated class name in descriptor".into()))?;
				if char == ';' {
					break;
				}
				s.push_java(char);
			}

			let class_name = ClassName::try_from_inner(s)
				.map_err(|e| Error::BadDescriptor(format!("invalid class name in descriptor: {e}")))?;
			ArrayType::Object(class_name)
		} else {
			return Err(Error::BadDescriptor(format!("unexpected char {char:?} in descriptor")).into());
		};

	Ok(if dimension == 0 {
		element.into_type()
	} else {
		Type::Array(dimension, element)
	})
}

fn write_field_type(t: &Type, string: &mut JavaString) {
	fn write_element(t: &ArrayType, string: &mut JavaString) {
		match t {
			ArrayType::B => string.push('B'),
			ArrayType::C => string.push('C'),
			ArrayType::D => string.push('D'),
			ArrayType::F => string.push('F'),
			ArrayType::I => string.push('I'),
			ArrayType::J => string.push('J'),
			ArrayType::S => string.push('S'),
			ArrayType::Z => string.push('Z'),
			ArrayType::Object(class_name) => {
				assert!(!class_name.as_inner().starts_with('['));
				string.push('L');
				string.push_java_str(class_name.as_inner());
				string.push(';');
			},
		}
	}

	match t {
		Type::Array(dimension, element) => {
			for _ in 0..*dimension {
				string.push('[');
			}
			write_element(element, string);
		},
		Type::B => string.push('B'),
		Type::C => string.push('C'),
		Type::D => string.push('D'),
		Type::F => string.push('F'),
		Type::I => string.push('I'),
		Type::J => string.push('J'),
		Type::S => string.push('S'),
		Type::Z => string.push('Z'),
		Type::Object(class_name) => {
			assert!(!class_name.as_inner().starts_with('['));
			string.push('L');
			string.push_java_str(class_name.as_inner());
			string.push(';');
		},
	}
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParsedFieldDescriptor(pub Type);

impl FieldDescriptorSlice {
	/// Attempts to parse a field descriptor.
	///
	/// A field descriptor is defined by the [grammar](https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html#jvms-4.3.2) in the
	/// Java Virtual Machine Specification.
	///
	/// The inverse of this function is [`ParsedFieldDescriptor::write`].
	pub fn parse(&self) -> Result<ParsedFieldDescriptor> {
		let mut chars = self.as_inner().chars().peekable();

		let descriptor = read_field_type(&mut chars)
			.with_context(|| anyhow!("failed to read field descriptor {self:?}"))?;

		if chars.peek().is_some() {
			return Err(Error::BadDescriptor(
				format!("expected end of field descriptor {self:?}, got {:?} remaining", JavaString::from_iter(chars))
			).into());
		}

		Ok(ParsedFieldDescriptor(descriptor))
	}
}

impl ParsedFieldDescriptor {
	/// Writes a field descriptor.
	///
	/// The inverse of this function is [`FieldDescriptorSlice::parse`].
	pub fn write(&self) -> FieldDescriptor {
		let mut s = JavaString::new();
		write_field_type(&self.0, &mut s);
		// SAFETY: `s` is a field descriptor by construction.
		unsafe { FieldDescriptor::from_inner_unchecked(s) }
	}
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParsedMethodDescriptor {
	pub parameter_descriptors: Vec<Type>,
	/// `None` here means the method returns `void`.
	pub return_descriptor: Option<Type>,
}

impl MethodDescriptorSlice {
	/// Attempts to parse a method descriptor.
	///
	/// A method descriptor is defined by the [grammar](https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html#jvms-4.3.3) in the
	/// Java Virtual Machine Specification.
	///
	/// The inverse of this function is [`ParsedMethodDescriptor::write`].
	pub fn parse(&self) -> Result<ParsedMethodDescriptor> {
		let mut chars = self.as_inner().chars().peekable();

		if chars.next_if_eq(&'(').is_none() {
			return Err(Error::BadDescriptor(format!("method descriptor {self:?} doesn't start with '('")).into());
		}

		let mut parameter_descriptors = Vec::new();
		loop {
			if chars.next_if_eq(&')').is_some() {
				break;
			}

			let descriptor = read_field_type(&mut chars)
				.with_context(|| anyhow!("failed to read parameter descriptor of {self:?}"))?;
			parameter_descriptors.push(descriptor);
		}

		let return_descriptor = if chars.next_if_eq(&'V').is_some() {
			None
		} else {
			let descriptor = read_field_type(&mut chars)
				.with_context(|| anyhow!("failed to read return descriptor of {self:?}"))?;

			Some(descriptor)
		};

		if chars.peek().is_some() {
			return Err(Error::BadDescriptor(
				format!("expected end of method descriptor {self:?}, got {:?} remaining", JavaString::from_iter(chars))
			).into());
		}

		Ok(ParsedMethodDescriptor {
			parameter_descriptors,
			return_descriptor,
		})
	}
}

impl ParsedMethodDescriptor {
	/// Writes a method descriptor.
	///
	/// The inverse of this function is [`MethodDescriptorSlice::parse`].
	pub fn write(&self) -> MethodDescriptor {
		let mut s = JavaString::new();
		s.push('(');
		for parameter_descriptor in &self.parameter_descriptors {
			write_field_type(parameter_descriptor, &mut s);
		}
		s.push(')');
		if let Some(return_descriptor) = &self.return_descriptor {
			write_field_type(return_descriptor, &mut s);
		} else {
			s.push('V');
		}
		// SAFETY: `s` is a method descriptor by construction.
		unsafe { MethodDescriptor::from_inner_unchecked(s) }
	}
}

impl FieldDescriptor {
	/// Creates the field descriptor denoting instances of the class name given.
	///
	/// For a plain class name this is `"L" + class_name + ";"`; an array class
	/// name already is a field descriptor and is taken as-is.
	pub fn from_class(class_name: &ClassNameSlice) -> FieldDescriptor {
		let class_name = class_name.as_inner();

		if class_name.starts_with('[') {
			let desc = class_name.to_owned();
			// SAFETY: an array class name is a valid field descriptor.
			unsafe { FieldDescriptor::from_inner_unchecked(desc) }
		} else {
			let desc = JavaString::with_capacity(2 + class_name.len())
				+ "L" + class_name + ";";

			// SAFETY: `desc` is valid by construction.
			unsafe { FieldDescriptor::from_inner_unchecked(desc) }
		}
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use anyhow::Result;
	use java_string::JavaStr;
	use crate::error::Error;
	use crate::tree::class::ClassNameSlice;
	use crate::tree::descriptor::{ArrayType, ParsedFieldDescriptor, ParsedMethodDescriptor, Type};
	use crate::tree::field::FieldDescriptorSlice;
	use crate::tree::method::MethodDescriptorSlice;

	// SAFETY: a valid class name.
	const JAVA_LANG_THREAD: &ClassNameSlice = unsafe { ClassNameSlice::from_inner_unchecked(JavaStr::from_str("java/lang/Thread")) };
	// SAFETY: a valid class name.
	const JAVA_LANG_OBJECT: &ClassNameSlice = unsafe { ClassNameSlice::from_inner_unchecked(JavaStr::from_str("java/lang/Object")) };

	fn field(s: &str) -> &FieldDescriptorSlice {
		// SAFETY: the tests feed invalid descriptors on purpose; nothing
		// here relies on the validity invariant.
		unsafe { FieldDescriptorSlice::from_inner_unchecked(s.into()) }
	}
	fn method(s: &str) -> &MethodDescriptorSlice {
		// SAFETY: see `field` above.
		unsafe { MethodDescriptorSlice::from_inner_unchecked(s.into()) }
	}

	#[test]
	fn field_parse() -> Result<()> {
		assert_eq!(field("I").parse()?, ParsedFieldDescriptor(Type::I));
		assert_eq!(ParsedFieldDescriptor(Type::I).write().as_inner(), "I");

		assert_eq!(field("D").parse()?, ParsedFieldDescriptor(Type::D));

		assert_eq!(
			field("Ljava/lang/Thread;").parse()?,
			ParsedFieldDescriptor(Type::Object(JAVA_LANG_THREAD.to_owned())),
		);
		assert_eq!(
			ParsedFieldDescriptor(Type::Object(JAVA_LANG_THREAD.to_owned())).write().as_inner(),
			"Ljava/lang/Thread;",
		);

		assert_eq!(field("[[[D").parse()?, ParsedFieldDescriptor(Type::Array(3, ArrayType::D)));
		assert_eq!(ParsedFieldDescriptor(Type::Array(3, ArrayType::D)).write().as_inner(), "[[[D");

		assert_eq!(
			field("[Ljava/lang/Object;").parse()?,
			ParsedFieldDescriptor(Type::Array(1, ArrayType::Object(JAVA_LANG_OBJECT.to_owned()))),
		);

		Ok(())
	}

	#[test]
	fn field_parse_err() {
		for s in ["", "V", "(", ")", "()", "[V", "()V", "(D)I", "L;DV", "L;", "La.b;", "II"] {
			assert!(field(s).parse().is_err(), "{s:?} is an invalid field desc");
		}
	}

	#[test]
	fn field_parse_err_is_bad_descriptor() {
		let err = field("[V").parse().unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::BadDescriptor(_))), "{err:?}");
	}

	#[test]
	fn method_parse() -> Result<()> {
		assert_eq!(
			method("(IDLjava/lang/Thread;)Ljava/lang/Object;").parse()?,
			ParsedMethodDescriptor {
				parameter_descriptors: vec![
					Type::I,
					Type::D,
					Type::Object(JAVA_LANG_THREAD.to_owned()),
				],
				return_descriptor: Some(Type::Object(JAVA_LANG_OBJECT.to_owned()))
			},
		);
		assert_eq!(
			ParsedMethodDescriptor {
				parameter_descriptors: vec![
					Type::I,
					Type::D,
					Type::Object(JAVA_LANG_THREAD.to_owned()),
				],
				return_descriptor: Some(Type::Object(JAVA_LANG_OBJECT.to_owned()))
			}.write().as_inner(),
			"(IDLjava/lang/Thread;)Ljava/lang/Object;",
		);

		assert_eq!(
			method("()V").parse()?,
			ParsedMethodDescriptor { parameter_descriptors: Vec::new(), return_descriptor: None },
		);

		Ok(())
	}

	#[test]
	fn method_parse_err() {
		for s in ["", "(", "(D", "(V", "()", "(I)", "(V)D", "(D)[", "(D)[V", "[(D)V", "(L;;)V", "()VV"] {
			assert!(method(s).parse().is_err(), "{s:?} is an invalid method desc");
		}
	}

	#[test]
	fn sizes() {
		assert_eq!(Type::I.size(), 1);
		assert_eq!(Type::Z.size(), 1);
		assert_eq!(Type::J.size(), 2);
		assert_eq!(Type::D.size(), 2);
		assert_eq!(Type::Object(JAVA_LANG_OBJECT.to_owned()).size(), 1);
		assert_eq!(Type::Array(2, ArrayType::D).size(), 1);
	}

	#[test]
	fn element_types() {
		assert_eq!(Type::Array(1, ArrayType::I).element_type(), Some(Type::I));
		assert_eq!(Type::Array(3, ArrayType::D).element_type(), Some(Type::Array(2, ArrayType::D)));
		assert_eq!(Type::I.element_type(), None);

		assert_eq!(Type::I.into_array(), Type::Array(1, ArrayType::I));
		assert_eq!(Type::Array(1, ArrayType::I).into_array(), Type::Array(2, ArrayType::I));
	}
}
