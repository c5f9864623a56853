pub mod code;

use std::fmt::{Debug, Formatter};
use anyhow::{bail, Result};
use java_string::{JavaStr, JavaString};
use crate::macros::{make_display, make_string_str_like};
use crate::signature::SignatureReader;
use crate::tree::class::ClassName;
use crate::tree::method::code::Code;
use crate::visitor::class::ClassVisitor;
use crate::visitor::method::MethodVisitor;

/// Represents a method of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
	pub access: MethodAccess,
	pub name: MethodName,
	pub descriptor: MethodDescriptor,

	pub code: Option<Code>,
	pub exceptions: Vec<ClassName>,
	pub signature: Option<MethodSignature>,
}

impl Method {
	pub fn new(access: MethodAccess, name: MethodName, descriptor: MethodDescriptor) -> Method {
		Method {
			access,
			name,
			descriptor,

			code: None,
			exceptions: Vec::new(),
			signature: None,
		}
	}

	/// Feeds this method to the method visitor the given class visitor opens
	/// for it, if any.
	pub fn accept<C: ClassVisitor>(&self, visitor: &mut C) -> Result<()> {
		if let Some(mut method_visitor) = visitor.visit_method(self.access, &self.name, &self.descriptor)? {
			if !self.exceptions.is_empty() {
				method_visitor.visit_exceptions(&self.exceptions)?;
			}
			if let Some(signature) = &self.signature {
				method_visitor.visit_signature(signature)?;
			}
			if let Some(code) = &self.code {
				code.accept(&mut method_visitor)?;
			}
			method_visitor.visit_end()?;

			visitor.finish_method(method_visitor)?;
		}
		Ok(())
	}

	pub fn as_name_and_desc(&self) -> MethodNameAndDesc {
		MethodNameAndDesc {
			name: self.name.clone(),
			desc: self.descriptor.clone(),
		}
	}
}

#[derive(Copy, Clone, Default, Hash, Eq, PartialEq)]
pub struct MethodAccess {
	pub is_public: bool,
	pub is_private: bool,
	pub is_protected: bool,
	pub is_static: bool,
	pub is_final: bool,
	pub is_synchronized: bool,
	pub is_bridge: bool,
	pub is_varargs: bool,
	pub is_native: bool,
	pub is_abstract: bool,
	pub is_strict: bool,
	pub is_synthetic: bool,
}

impl Debug for MethodAccess {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str("MethodAccess { ")?;
		if self.is_public       { f.write_str("public ")?; }
		if self.is_private      { f.write_str("private ")?; }
		if self.is_protected    { f.write_str("protected ")?; }
		if self.is_static       { f.write_str("static ")?; }
		if self.is_final        { f.write_str("final ")?; }
		if self.is_synchronized { f.write_str("synchronized ")?; }
		if self.is_bridge       { f.write_str("bridge ")?; }
		if self.is_varargs      { f.write_str("varargs ")?; }
		if self.is_native       { f.write_str("native ")?; }
		if self.is_abstract     { f.write_str("abstract ")?; }
		if self.is_strict       { f.write_str("strict ")?; }
		if self.is_synthetic    { f.write_str("synthetic ")?; }
		f.write_str("}")
	}
}

impl From<u16> for MethodAccess {
	fn from(value: u16) -> Self {
		MethodAccess {
			is_public:       value & 0x0001 != 0,
			is_private:      value & 0x0002 != 0,
			is_protected:    value & 0x0004 != 0,
			is_static:       value & 0x0008 != 0,
			is_final:        value & 0x0010 != 0,
			is_synchronized: value & 0x0020 != 0,
			is_bridge:       value & 0x0040 != 0,
			is_varargs:      value & 0x0080 != 0,
			is_native:       value & 0x0100 != 0,
			is_abstract:     value & 0x0400 != 0,
			is_strict:       value & 0x0800 != 0,
			is_synthetic:    value & 0x1000 != 0,
		}
	}
}

impl From<MethodAccess> for u16 {
	fn from(value: MethodAccess) -> Self {
		(if value.is_public       { 0x0001 } else { 0 }) |
		(if value.is_private      { 0x0002 } else { 0 }) |
		(if value.is_protected    { 0x0004 } else { 0 }) |
		(if value.is_static       { 0x0008 } else { 0 }) |
		(if value.is_final        { 0x0010 } else { 0 }) |
		(if value.is_synchronized { 0x0020 } else { 0 }) |
		(if value.is_bridge       { 0x0040 } else { 0 }) |
		(if value.is_varargs      { 0x0080 } else { 0 }) |
		(if value.is_native       { 0x0100 } else { 0 }) |
		(if value.is_abstract     { 0x0400 } else { 0 }) |
		(if value.is_strict       { 0x0800 } else { 0 }) |
		(if value.is_synthetic    { 0x1000 } else { 0 })
	}
}

/// A method reference, as the `invoke*` instructions carry it.
///
/// Note that the class can also be an array class: arrays have methods, such
/// as the `.clone()` method provided by `Object` and implemented by any array.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MethodRef {
	pub class: ClassName,
	pub name: MethodName,
	pub desc: MethodDescriptor,
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MethodNameAndDesc {
	pub name: MethodName,
	pub desc: MethodDescriptor,
}

impl MethodNameAndDesc {
	/// Add a [`ClassName`] to this [`MethodNameAndDesc`] to make a [`MethodRef`].
	pub fn with_class(self, class: ClassName) -> MethodRef {
		MethodRef { class, name: self.name, desc: self.desc }
	}
}

make_string_str_like!(
	pub MethodName(JavaString);
	/// A [`MethodName`] slice.
	pub MethodNameSlice(JavaStr);
	is_valid(s) = if crate::tree::names::is_valid_method_name(s) {
		Ok(())
	} else {
		bail!("invalid method name: must be either `<init>`, `<clinit>`, or non-empty and not contain any of `.`, `;`, `[`, `/`, `<`, and `>`");
	};
);
make_display!(MethodName, MethodNameSlice);

impl MethodName {
	pub const INIT: &'static MethodNameSlice = {
		// SAFETY: `<init>` is a valid method name.
		unsafe { MethodNameSlice::from_inner_unchecked(JavaStr::from_str("<init>")) }
	};
	pub const CLINIT: &'static MethodNameSlice = {
		// SAFETY: `<clinit>` is a valid method name.
		unsafe { MethodNameSlice::from_inner_unchecked(JavaStr::from_str("<clinit>")) }
	};
}

make_string_str_like!(
	pub MethodDescriptor(JavaString);
	/// A [`MethodDescriptor`] slice.
	pub MethodDescriptorSlice(JavaStr);
	is_valid(s) = {
		// SAFETY: the wrapped value only lives for the duration of the parse
		// that establishes (or refutes) exactly the invariant in question.
		unsafe { MethodDescriptorSlice::from_inner_unchecked(s) }.parse().map(|_| ())
	};
);
make_display!(MethodDescriptor, MethodDescriptorSlice);

make_string_str_like!(
	/// Represents a method signature, from a generic method declaration such as `<T> T foo(List<T> list)`.
	pub MethodSignature(JavaString);
	/// A [`MethodSignature`] slice.
	pub MethodSignatureSlice(JavaStr);
	is_valid(s) = SignatureReader::new(s).accept_method(&mut ());
);
