//! Reading and writing of generic signatures, as defined by the
//! [grammar](https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html#jvms-4.7.9.1) in
//! the Java Virtual Machine Specification:
//!
//! ```txt,ignore
//! ClassSignature     = [TypeParameters] SuperclassSignature SuperinterfaceSignature*
//! MethodSignature    = [TypeParameters] "(" JavaTypeSignature* ")" Result ThrowsSignature*
//! JavaTypeSignature  = BaseType | TypeVariableSignature | ArrayTypeSignature | ClassTypeSignature
//! TypeParameters     = "<" (Identifier ":" ReferenceTypeSignature? (":" ReferenceTypeSignature)*)+ ">"
//! ClassTypeSignature = "L" Name TypeArguments? ("." Name TypeArguments?)* ";"
//! TypeArguments      = "<" ("*" | ["+" | "-"] JavaTypeSignature)+ ">"
//! ```
//!
//! [`SignatureReader`] tokenizes a signature string and drives a
//! [`SignatureVisitor`]; [`SignatureWriter`] is the visitor that rebuilds the
//! textual form. Feeding a reader into a writer reproduces the input
//! byte-for-byte.

use anyhow::Result;
use java_string::{JavaStr, JavaString};
use crate::error::Error;

/// The variance marker of a bounded type argument.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Wildcard {
	/// `+`: an upper-bounded `? extends` argument.
	Extends,
	/// `-`: a lower-bounded `? super` argument.
	Super,
	/// An invariant argument, without a wildcard marker.
	Exact,
}

/// The events a signature decomposes into.
///
/// All methods default to doing nothing, and `()` is the visitor ignoring
/// everything (useful for validity checking: drive it and look at the
/// result).
///
/// The grammar constrains the order of events; for instance, every
/// `visit_class_type` is eventually closed by a `visit_end`, and type
/// arguments only occur between a `visit_class_type`/`visit_inner_class_type`
/// and the matching close.
pub trait SignatureVisitor {
	fn visit_formal_type_parameter(&mut self, name: &JavaStr) -> Result<()> {
		let _ = name;
		Ok(())
	}

	/// Called before the class bound of the last visited formal type
	/// parameter, if it has one.
	fn visit_class_bound(&mut self) -> Result<()> {
		Ok(())
	}

	/// Called before each interface bound of the last visited formal type
	/// parameter.
	fn visit_interface_bound(&mut self) -> Result<()> {
		Ok(())
	}

	fn visit_superclass(&mut self) -> Result<()> {
		Ok(())
	}

	fn visit_interface(&mut self) -> Result<()> {
		Ok(())
	}

	fn visit_parameter_type(&mut self) -> Result<()> {
		Ok(())
	}

	fn visit_return_type(&mut self) -> Result<()> {
		Ok(())
	}

	fn visit_exception_type(&mut self) -> Result<()> {
		Ok(())
	}

	/// A primitive type, or `V` in return type position.
	fn visit_base_type(&mut self, descriptor: char) -> Result<()> {
		let _ = descriptor;
		Ok(())
	}

	fn visit_type_variable(&mut self, name: &JavaStr) -> Result<()> {
		let _ = name;
		Ok(())
	}

	/// An array type; the following events give the element type.
	fn visit_array_type(&mut self) -> Result<()> {
		Ok(())
	}

	/// The start of a class type, with the (slash-separated) name of its
	/// outermost class.
	fn visit_class_type(&mut self, name: &JavaStr) -> Result<()> {
		let _ = name;
		Ok(())
	}

	/// A `.`-separated inner class segment of the current class type.
	fn visit_inner_class_type(&mut self, name: &JavaStr) -> Result<()> {
		let _ = name;
		Ok(())
	}

	/// An unbounded `*` type argument of the current class type segment.
	fn visit_type_argument(&mut self) -> Result<()> {
		Ok(())
	}

	/// A bounded type argument of the current class type segment; the
	/// following events give the argument type.
	fn visit_type_argument_bounded(&mut self, wildcard: Wildcard) -> Result<()> {
		let _ = wildcard;
		Ok(())
	}

	/// Closes the current class type.
	fn visit_end(&mut self) -> Result<()> {
		Ok(())
	}
}

/// Ignores everything.
impl SignatureVisitor for () {}

fn bad(offset: usize, reason: impl Into<String>) -> anyhow::Error {
	Error::BadSignature { offset, reason: reason.into() }.into()
}

/// A parser for signature strings, driving a [`SignatureVisitor`].
///
/// Errors are raised before any further event is emitted, with the byte
/// offset of the offending character; a visitor never sees events past the
/// point of an error.
#[derive(Debug, Copy, Clone)]
pub struct SignatureReader<'a> {
	signature: &'a JavaStr,
}

impl<'a> SignatureReader<'a> {
	pub fn new(signature: &'a JavaStr) -> SignatureReader<'a> {
		SignatureReader { signature }
	}

	fn at(&self, offset: usize) -> Option<u8> {
		self.signature.as_bytes().get(offset).copied()
	}

	/// Parses a class or method signature, telling the two apart by the `(`
	/// opening a method's parameter list.
	pub fn accept<V: SignatureVisitor>(&self, visitor: &mut V) -> Result<()> {
		let offset = self.parse_formals(visitor)?;
		if self.at(offset) == Some(b'(') {
			self.finish_method(offset, visitor)
		} else {
			self.finish_class(offset, visitor)
		}
	}

	/// Parses a class signature: optional formal type parameters, a
	/// superclass, then any number of interfaces.
	pub fn accept_class<V: SignatureVisitor>(&self, visitor: &mut V) -> Result<()> {
		let offset = self.parse_formals(visitor)?;
		self.finish_class(offset, visitor)
	}

	/// Parses a method signature: optional formal type parameters, the
	/// parameter list, the return type, then any number of thrown types.
	pub fn accept_method<V: SignatureVisitor>(&self, visitor: &mut V) -> Result<()> {
		let offset = self.parse_formals(visitor)?;
		self.finish_method(offset, visitor)
	}

	/// Parses a single type signature, as stored in a field signature or
	/// nested in larger signatures.
	pub fn accept_type<V: SignatureVisitor>(&self, visitor: &mut V) -> Result<()> {
		let offset = self.parse_type_at(0, visitor)?;
		if offset == self.signature.as_bytes().len() {
			Ok(())
		} else {
			Err(bad(offset, "trailing characters after the type signature"))
		}
	}

	/// Parses the optional `<...>` formal type parameter list, returning the
	/// offset after it (0 if there is none).
	fn parse_formals<V: SignatureVisitor>(&self, visitor: &mut V) -> Result<usize> {
		if self.at(0) != Some(b'<') {
			return Ok(0);
		}
		let mut offset = 1;
		loop {
			let start = offset;
			loop {
				match self.at(offset) {
					Some(b':') => break,
					Some(b'<' | b'>' | b';' | b'.' | b'/' | b'[') =>
						return Err(bad(offset, "expected `:` after a formal type parameter name")),
					Some(_) => offset += 1,
					None => return Err(bad(offset, "signature ends inside a formal type parameter")),
				}
			}
			if start == offset {
				return Err(bad(start, "empty formal type parameter name"));
			}
			visitor.visit_formal_type_parameter(&self.signature[start..offset])?;
			offset += 1;

			// the class bound may be missing (e.g. for interface-only bounds)
			if matches!(self.at(offset), Some(b'L' | b'[' | b'T')) {
				visitor.visit_class_bound()?;
				offset = self.parse_type_at(offset, visitor)?;
			}
			while self.at(offset) == Some(b':') {
				visitor.visit_interface_bound()?;
				offset = self.parse_type_at(offset + 1, visitor)?;
			}

			if self.at(offset) == Some(b'>') {
				return Ok(offset + 1);
			}
		}
	}

	fn finish_class<V: SignatureVisitor>(&self, mut offset: usize, visitor: &mut V) -> Result<()> {
		visitor.visit_superclass()?;
		offset = self.parse_reference_type_at(offset, visitor)?;
		while offset < self.signature.as_bytes().len() {
			visitor.visit_interface()?;
			offset = self.parse_reference_type_at(offset, visitor)?;
		}
		Ok(())
	}

	fn finish_method<V: SignatureVisitor>(&self, offset: usize, visitor: &mut V) -> Result<()> {
		if self.at(offset) != Some(b'(') {
			return Err(bad(offset, "expected `(` to open the parameter list"));
		}
		let mut offset = offset + 1;
		loop {
			match self.at(offset) {
				Some(b')') => break,
				Some(_) => {
					visitor.visit_parameter_type()?;
					offset = self.parse_type_at(offset, visitor)?;
				},
				None => return Err(bad(offset, "signature ends inside the parameter list")),
			}
		}
		offset += 1;

		visitor.visit_return_type()?;
		offset = if self.at(offset) == Some(b'V') {
			visitor.visit_base_type('V')?;
			offset + 1
		} else {
			self.parse_type_at(offset, visitor)?
		};

		while offset < self.signature.as_bytes().len() {
			if self.at(offset) != Some(b'^') {
				return Err(bad(offset, "expected `^` before a thrown type"));
			}
			visitor.visit_exception_type()?;
			offset = self.parse_reference_type_at(offset + 1, visitor)?;
		}
		Ok(())
	}

	/// Like [`parse_type_at`][Self::parse_type_at], but only accepting
	/// reference types (class types, type variables, arrays).
	fn parse_reference_type_at<V: SignatureVisitor>(&self, offset: usize, visitor: &mut V) -> Result<usize> {
		match self.at(offset) {
			Some(b'L' | b'[' | b'T') => self.parse_type_at(offset, visitor),
			Some(_) => Err(bad(offset, "expected a reference type")),
			None => Err(bad(offset, "signature ends where a reference type was expected")),
		}
	}

	/// Parses one type signature starting at `offset`, returning the offset
	/// after it.
	fn parse_type_at<V: SignatureVisitor>(&self, offset: usize, visitor: &mut V) -> Result<usize> {
		match self.at(offset) {
			Some(c @ (b'Z' | b'C' | b'B' | b'S' | b'I' | b'F' | b'J' | b'D')) => {
				visitor.visit_base_type(c as char)?;
				Ok(offset + 1)
			},
			Some(b'[') => {
				visitor.visit_array_type()?;
				self.parse_type_at(offset + 1, visitor)
			},
			Some(b'T') => {
				let mut end = offset + 1;
				loop {
					match self.at(end) {
						Some(b';') => break,
						Some(b'<' | b'>' | b':' | b'.' | b'/' | b'[') =>
							return Err(bad(end, "unexpected char in a type variable name")),
						Some(_) => end += 1,
						None => return Err(bad(end, "signature ends inside a type variable")),
					}
				}
				if end == offset + 1 {
					return Err(bad(end, "empty type variable name"));
				}
				visitor.visit_type_variable(&self.signature[offset + 1..end])?;
				Ok(end + 1)
			},
			Some(b'L') => self.parse_class_type_at(offset, visitor),
			Some(_) => Err(bad(offset, "expected a type")),
			None => Err(bad(offset, "signature ends where a type was expected")),
		}
	}

	fn parse_class_type_at<V: SignatureVisitor>(&self, offset: usize, visitor: &mut V) -> Result<usize> {
		// past the 'L'
		let mut offset = offset + 1;

		let start = offset;
		loop {
			match self.at(offset) {
				Some(b'<' | b'.' | b';') => break,
				Some(b'>' | b':' | b'[') => return Err(bad(offset, "unexpected char in a class name")),
				Some(_) => offset += 1,
				None => return Err(bad(offset, "signature ends inside a class type")),
			}
		}
		if start == offset {
			return Err(bad(start, "empty class name"));
		}
		visitor.visit_class_type(&self.signature[start..offset])?;

		loop {
			if self.at(offset) == Some(b'<') {
				offset = self.parse_type_arguments_at(offset, visitor)?;
			}
			match self.at(offset) {
				Some(b';') => {
					visitor.visit_end()?;
					return Ok(offset + 1);
				},
				Some(b'.') => {
					offset += 1;
					let start = offset;
					loop {
						match self.at(offset) {
							Some(b'<' | b'.' | b';') => break,
							Some(b'>' | b':' | b'[' | b'/') =>
								return Err(bad(offset, "unexpected char in an inner class name")),
							Some(_) => offset += 1,
							None => return Err(bad(offset, "signature ends inside a class type")),
						}
					}
					if start == offset {
						return Err(bad(start, "empty inner class name"));
					}
					visitor.visit_inner_class_type(&self.signature[start..offset])?;
				},
				Some(_) => return Err(bad(offset, "expected `.` or `;` after a class type segment")),
				None => return Err(bad(offset, "signature ends inside a class type")),
			}
		}
	}

	/// Parses a `<...>` type argument list, returning the offset after the
	/// closing `>`.
	fn parse_type_arguments_at<V: SignatureVisitor>(&self, offset: usize, visitor: &mut V) -> Result<usize> {
		// past the '<'
		let mut offset = offset + 1;
		if self.at(offset) == Some(b'>') {
			return Err(bad(offset, "empty type argument list"));
		}
		loop {
			match self.at(offset) {
				Some(b'>') => return Ok(offset + 1),
				Some(b'*') => {
					visitor.visit_type_argument()?;
					offset += 1;
				},
				Some(b'+') => {
					visitor.visit_type_argument_bounded(Wildcard::Extends)?;
					offset = self.parse_type_at(offset + 1, visitor)?;
				},
				Some(b'-') => {
					visitor.visit_type_argument_bounded(Wildcard::Super)?;
					offset = self.parse_type_at(offset + 1, visitor)?;
				},
				Some(b'Z' | b'C' | b'B' | b'S' | b'I' | b'F' | b'J' | b'D' | b'[' | b'T' | b'L') => {
					visitor.visit_type_argument_bounded(Wildcard::Exact)?;
					offset = self.parse_type_at(offset, visitor)?;
				},
				Some(_) => return Err(bad(offset, "expected a type argument")),
				None => return Err(bad(offset, "signature ends inside a type argument list")),
			}
		}
	}
}

/// A [`SignatureVisitor`] that rebuilds the textual form of the signature it
/// is driven with.
///
/// The only tricky part is deciding where the `<`…`>` around type argument
/// lists go, since the events don't delimit them explicitly: a one-bit-per-
/// nesting-level stack (an integer) tracks, for each open class type, whether
/// a `<` was emitted for its current segment. [`visit_class_type`] and
/// [`visit_inner_class_type`] push a 0 bit, the first type argument of a
/// segment flips the top bit and emits `<`, and closing a segment pops the
/// bit, emitting `>` iff it was set.
///
/// [`visit_class_type`]: SignatureVisitor::visit_class_type
/// [`visit_inner_class_type`]: SignatureVisitor::visit_inner_class_type
#[derive(Debug)]
pub struct SignatureWriter {
	buffer: JavaString,
	has_formals: bool,
	has_parameters: bool,
	argument_stack: u64,
}

impl Default for SignatureWriter {
	fn default() -> SignatureWriter {
		SignatureWriter::new()
	}
}

impl SignatureWriter {
	pub fn new() -> SignatureWriter {
		SignatureWriter {
			buffer: JavaString::new(),
			has_formals: false,
			has_parameters: false,
			argument_stack: 0,
		}
	}

	/// The signature written so far.
	pub fn into_signature(self) -> JavaString {
		self.buffer
	}

	/// Closes the formal type parameter list, if one is open.
	fn end_formals(&mut self) {
		if self.has_formals {
			self.has_formals = false;
			self.buffer.push('>');
		}
	}

	/// Pops one class type segment off the bracket stack, closing its type
	/// argument list if one was opened.
	fn end_arguments(&mut self) {
		if self.argument_stack & 1 == 1 {
			self.buffer.push('>');
		}
		self.argument_stack >>= 1;
	}
}

impl SignatureVisitor for SignatureWriter {
	fn visit_formal_type_parameter(&mut self, name: &JavaStr) -> Result<()> {
		if !self.has_formals {
			self.has_formals = true;
			self.buffer.push('<');
		}
		self.buffer.push_java_str(name);
		self.buffer.push(':');
		Ok(())
	}

	fn visit_class_bound(&mut self) -> Result<()> {
		Ok(())
	}

	fn visit_interface_bound(&mut self) -> Result<()> {
		self.buffer.push(':');
		Ok(())
	}

	fn visit_superclass(&mut self) -> Result<()> {
		self.end_formals();
		Ok(())
	}

	fn visit_interface(&mut self) -> Result<()> {
		Ok(())
	}

	fn visit_parameter_type(&mut self) -> Result<()> {
		self.end_formals();
		if !self.has_parameters {
			self.has_parameters = true;
			self.buffer.push('(');
		}
		Ok(())
	}

	fn visit_return_type(&mut self) -> Result<()> {
		self.end_formals();
		if !self.has_parameters {
			self.buffer.push('(');
		}
		self.buffer.push(')');
		Ok(())
	}

	fn visit_exception_type(&mut self) -> Result<()> {
		self.buffer.push('^');
		Ok(())
	}

	fn visit_base_type(&mut self, descriptor: char) -> Result<()> {
		self.buffer.push(descriptor);
		Ok(())
	}

	fn visit_type_variable(&mut self, name: &JavaStr) -> Result<()> {
		self.buffer.push('T');
		self.buffer.push_java_str(name);
		self.buffer.push(';');
		Ok(())
	}

	fn visit_array_type(&mut self) -> Result<()> {
		self.buffer.push('[');
		Ok(())
	}

	fn visit_class_type(&mut self, name: &JavaStr) -> Result<()> {
		self.buffer.push('L');
		self.buffer.push_java_str(name);
		self.argument_stack <<= 1;
		Ok(())
	}

	fn visit_inner_class_type(&mut self, name: &JavaStr) -> Result<()> {
		self.end_arguments();
		self.buffer.push('.');
		self.buffer.push_java_str(name);
		self.argument_stack <<= 1;
		Ok(())
	}

	fn visit_type_argument(&mut self) -> Result<()> {
		if self.argument_stack & 1 == 0 {
			self.argument_stack |= 1;
			self.buffer.push('<');
		}
		self.buffer.push('*');
		Ok(())
	}

	fn visit_type_argument_bounded(&mut self, wildcard: Wildcard) -> Result<()> {
		if self.argument_stack & 1 == 0 {
			self.argument_stack |= 1;
			self.buffer.push('<');
		}
		match wildcard {
			Wildcard::Extends => self.buffer.push('+'),
			Wildcard::Super => self.buffer.push('-'),
			Wildcard::Exact => {},
		}
		Ok(())
	}

	fn visit_end(&mut self) -> Result<()> {
		self.end_arguments();
		self.buffer.push(';');
		Ok(())
	}
}
