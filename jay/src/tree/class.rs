use std::fmt::{Debug, Formatter};
use anyhow::{bail, Result};
use java_string::{JavaStr, JavaString};
use crate::error::Error;
use crate::macros::{make_display, make_string_str_like};
use crate::signature::SignatureReader;
use crate::tree::field::Field;
use crate::tree::method::{Method, MethodNameAndDesc};
use crate::tree::version::Version;
use crate::visitor::class::ClassVisitor;

/// Represents a class file, as far as this crate models it.
///
/// This is the root of the tree model: it owns the [fields][Field] and
/// [methods][Method], and the class-level attributes the
/// [`ClassVisitor`] surfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
	pub version: Version,
	pub access: ClassAccess,
	pub name: ClassName,
	pub super_class: Option<ClassName>,
	pub interfaces: Vec<ClassName>,

	pub fields: Vec<Field>,
	pub methods: Vec<Method>,

	pub signature: Option<ClassSignature>,
	pub source_file: Option<JavaString>,

	pub module: Option<Module>,
	pub enclosing_method: Option<EnclosingMethod>,
	pub inner_classes: Vec<InnerClass>,

	pub nest_host_class: Option<ClassName>,
	pub nest_members: Vec<ClassName>,
}

impl ClassFile {
	pub fn new(version: Version, access: ClassAccess, name: ClassName, super_class: Option<ClassName>, interfaces: Vec<ClassName>) -> ClassFile {
		ClassFile {
			version,
			access,
			name,
			super_class,
			interfaces,

			fields: Vec::new(),
			methods: Vec::new(),

			signature: None,
			source_file: None,

			module: None,
			enclosing_method: None,
			inner_classes: Vec::new(),

			nest_host_class: None,
			nest_members: Vec::new(),
		}
	}

	/// Feeds this class to the given visitor, attribute by attribute, then
	/// field by field and method by method.
	///
	/// Fails with [`Error::UnsupportedFeature`] if the class version is newer
	/// than [`Version::LATEST_SUPPORTED`].
	pub fn accept<C: ClassVisitor>(&self, visitor: &mut C) -> Result<()> {
		if self.version > Version::LATEST_SUPPORTED {
			return Err(Error::UnsupportedFeature(
				format!("class file version {:?} is newer than {:?}", self.version, Version::LATEST_SUPPORTED)
			).into());
		}

		visitor.visit(
			self.version,
			self.access,
			&self.name,
			self.signature.as_deref(),
			self.super_class.as_deref(),
			&self.interfaces,
		)?;

		if let Some(source_file) = &self.source_file {
			visitor.visit_source(source_file)?;
		}
		if let Some(module) = &self.module {
			visitor.visit_module(module)?;
		}
		if let Some(enclosing_method) = &self.enclosing_method {
			visitor.visit_outer_class(enclosing_method)?;
		}
		if let Some(nest_host_class) = &self.nest_host_class {
			visitor.visit_nest_host(nest_host_class)?;
		}
		for nest_member in &self.nest_members {
			visitor.visit_nest_member(nest_member)?;
		}
		for inner_class in &self.inner_classes {
			visitor.visit_inner_class(inner_class)?;
		}

		for field in &self.fields {
			visitor.visit_field(field)?;
		}
		for method in &self.methods {
			method.accept(visitor)?;
		}

		visitor.visit_end()
	}
}

/// Represents the access flags a class can have.
///
/// Take a look at the [Java Virtual Machine Specification](https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html#jvms-4.1-200-E.1), for
/// the meanings of these fields, and what combinations are legal and which not.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct ClassAccess {
	pub is_public: bool,
	pub is_final: bool,
	pub is_super: bool,
	pub is_interface: bool,
	pub is_abstract: bool,
	pub is_synthetic: bool,
	pub is_annotation: bool,
	pub is_enum: bool,
	pub is_module: bool,
}

impl Debug for ClassAccess {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str("ClassAccess { ")?;
		if self.is_public     { f.write_str("public ")?; }
		if self.is_final      { f.write_str("final ")?; }
		if self.is_super      { f.write_str("super ")?; }
		if self.is_interface  { f.write_str("interface ")?; }
		if self.is_abstract   { f.write_str("abstract ")?; }
		if self.is_synthetic  { f.write_str("synthetic ")?; }
		if self.is_annotation { f.write_str("annotation ")?; }
		if self.is_enum       { f.write_str("enum ")?; }
		if self.is_module     { f.write_str("module ")?; }
		f.write_str("}")
	}
}

/// Interprets an `u16` as the `access_flags` item of the `ClassFile` structure of the Java Virtual Machine Specification.
impl From<u16> for ClassAccess {
	fn from(value: u16) -> Self {
		ClassAccess {
			is_public:     value & 0x0001 != 0,
			is_final:      value & 0x0010 != 0,
			is_super:      value & 0x0020 != 0,
			is_interface:  value & 0x0200 != 0,
			is_abstract:   value & 0x0400 != 0,
			is_synthetic:  value & 0x1000 != 0,
			is_annotation: value & 0x2000 != 0,
			is_enum:       value & 0x4000 != 0,
			is_module:     value & 0x8000 != 0,
		}
	}
}

/// Creates an `u16` according to the `access_flags` item of the `ClassFile` structure of the Java Virtual Machine Specification.
impl From<ClassAccess> for u16 {
	fn from(value: ClassAccess) -> Self {
		(if value.is_public     { 0x0001 } else { 0 }) |
		(if value.is_final      { 0x0010 } else { 0 }) |
		(if value.is_super      { 0x0020 } else { 0 }) |
		(if value.is_interface  { 0x0200 } else { 0 }) |
		(if value.is_abstract   { 0x0400 } else { 0 }) |
		(if value.is_synthetic  { 0x1000 } else { 0 }) |
		(if value.is_annotation { 0x2000 } else { 0 }) |
		(if value.is_enum       { 0x4000 } else { 0 }) |
		(if value.is_module     { 0x8000 } else { 0 })
	}
}

make_string_str_like!(
	/// Represents a class name. The class name uses [internal binary names](https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html#jvms-4.2.1),
	/// i.e. with complete path written out and using slashes.
	///
	/// # Examples
	/// The java class `java.lang.Thread` would get:
	/// ```
	/// use jay::tree::class::ClassName;
	/// let java_lang_thread = ClassName::from("java/lang/Thread");
	/// ```
	/// Note that there's an associated constant holding the name of the `java.lang.Object` class:
	/// ```
	/// use jay::tree::class::ClassName;
	/// let java_lang_object = ClassName::JAVA_LANG_OBJECT.to_owned();
	/// assert_eq!(java_lang_object, ClassName::from("java/lang/Object"));
	/// ```
	pub ClassName(JavaString);
	/// A [`ClassName`] slice.
	pub ClassNameSlice(JavaStr);
	is_valid(s) = if crate::tree::names::is_valid_class_name(s) {
		Ok(())
	} else {
		bail!("invalid class name: must be an array field descriptor, or consist of `/` separated non-empty parts not containing any of `.`, `;`, `[`")
	};
);
make_display!(ClassName, ClassNameSlice);

impl ClassName {
	/// A constant holding the class name of `Object`.
	pub const JAVA_LANG_OBJECT: &'static ClassNameSlice = {
		// SAFETY: `java/lang/Object` is a valid class name.
		unsafe { ClassNameSlice::from_inner_unchecked(JavaStr::from_str("java/lang/Object")) }
	};
	/// A constant holding the class name of `Throwable`, the default type of
	/// the value a catch-all exception handler receives.
	pub const JAVA_LANG_THROWABLE: &'static ClassNameSlice = {
		// SAFETY: `java/lang/Throwable` is a valid class name.
		unsafe { ClassNameSlice::from_inner_unchecked(JavaStr::from_str("java/lang/Throwable")) }
	};
}

make_string_str_like!(
	/// Represents a class signature, from a generic class declaration such as `Foo<T extends Bar>`.
	pub ClassSignature(JavaString);
	/// A [`ClassSignature`] slice.
	pub ClassSignatureSlice(JavaStr);
	is_valid(s) = SignatureReader::new(s).accept_class(&mut ());
);

#[derive(Debug, Clone, PartialEq)]
pub struct InnerClass {
	pub inner_class: ClassName,
	pub outer_class: Option<ClassName>,
	pub inner_name: Option<JavaString>,
	pub flags: InnerClassFlags,
}

#[derive(Copy, Clone, Default, PartialEq)]
pub struct InnerClassFlags {
	pub is_public: bool,
	pub is_private: bool,
	pub is_protected: bool,
	pub is_static: bool,
	pub is_final: bool,
	pub is_interface: bool,
	pub is_abstract: bool,
	pub is_synthetic: bool,
	pub is_annotation: bool,
	pub is_enum: bool,
}

impl Debug for InnerClassFlags {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str("InnerClassFlags { ")?;
		if self.is_public     { f.write_str("public ")?; }
		if self.is_private    { f.write_str("private ")?; }
		if self.is_protected  { f.write_str("protected ")?; }
		if self.is_static     { f.write_str("static ")?; }
		if self.is_final      { f.write_str("final ")?; }
		if self.is_interface  { f.write_str("interface ")?; }
		if self.is_abstract   { f.write_str("abstract ")?; }
		if self.is_synthetic  { f.write_str("synthetic ")?; }
		if self.is_annotation { f.write_str("annotation ")?; }
		if self.is_enum       { f.write_str("enum ")?; }
		f.write_str("}")
	}
}

impl From<u16> for InnerClassFlags {
	fn from(value: u16) -> Self {
		InnerClassFlags {
			is_public:     value & 0x0001 != 0,
			is_private:    value & 0x0002 != 0,
			is_protected:  value & 0x0004 != 0,
			is_static:     value & 0x0008 != 0,
			is_final:      value & 0x0010 != 0,
			is_interface:  value & 0x0200 != 0,
			is_abstract:   value & 0x0400 != 0,
			is_synthetic:  value & 0x1000 != 0,
			is_annotation: value & 0x2000 != 0,
			is_enum:       value & 0x4000 != 0,
		}
	}
}

impl From<InnerClassFlags> for u16 {
	fn from(value: InnerClassFlags) -> Self {
		(if value.is_public     { 0x0001 } else { 0 }) |
		(if value.is_private    { 0x0002 } else { 0 }) |
		(if value.is_protected  { 0x0004 } else { 0 }) |
		(if value.is_static     { 0x0008 } else { 0 }) |
		(if value.is_final      { 0x0010 } else { 0 }) |
		(if value.is_interface  { 0x0200 } else { 0 }) |
		(if value.is_abstract   { 0x0400 } else { 0 }) |
		(if value.is_synthetic  { 0x1000 } else { 0 }) |
		(if value.is_annotation { 0x2000 } else { 0 }) |
		(if value.is_enum       { 0x4000 } else { 0 })
	}
}

/// The `EnclosingMethod` attribute: the class (and, for classes immediately
/// enclosed by a method or constructor, the method) a local or anonymous
/// class sits in.
#[derive(Debug, Clone, PartialEq)]
pub struct EnclosingMethod {
	pub class: ClassName,
	pub method: Option<MethodNameAndDesc>,
}

/// The `Module` attribute, reduced to its header.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
	pub name: JavaString,
	pub flags: ModuleFlags,
	pub version: Option<JavaString>,
}

#[derive(Copy, Clone, Default, PartialEq)]
pub struct ModuleFlags {
	pub is_open: bool,
	pub is_synthetic: bool,
	pub is_mandated: bool,
}

impl Debug for ModuleFlags {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str("ModuleFlags { ")?;
		if self.is_open      { f.write_str("open ")?; }
		if self.is_synthetic { f.write_str("synthetic ")?; }
		if self.is_mandated  { f.write_str("mandated ")?; }
		f.write_str("}")
	}
}

impl From<u16> for ModuleFlags {
	fn from(value: u16) -> Self {
		ModuleFlags {
			is_open:      value & 0x0020 != 0,
			is_synthetic: value & 0x1000 != 0,
			is_mandated:  value & 0x8000 != 0,
		}
	}
}

impl From<ModuleFlags> for u16 {
	fn from(value: ModuleFlags) -> Self {
		(if value.is_open      { 0x0020 } else { 0 }) |
		(if value.is_synthetic { 0x1000 } else { 0 }) |
		(if value.is_mandated  { 0x8000 } else { 0 })
	}
}
