use anyhow::Result;
use java_string::JavaStr;
use crate::tree::class::{ClassAccess, ClassName, ClassNameSlice, ClassSignatureSlice, EnclosingMethod, InnerClass, Module};
use crate::tree::field::Field;
use crate::tree::method::{MethodAccess, MethodDescriptorSlice, MethodNameSlice};
use crate::tree::version::Version;
use crate::visitor::method::MethodVisitor;

/// A visitor for a class, in the order [`ClassFile::accept`] drives it:
/// `visit`, then the class-level attributes, then fields, then methods (each
/// opening a [`MethodVisitor`] via [`visit_method`]/[`finish_method`]), then
/// `visit_end`.
///
/// [`ClassFile::accept`]: crate::tree::class::ClassFile::accept
/// [`visit_method`]: ClassVisitor::visit_method
/// [`finish_method`]: ClassVisitor::finish_method
pub trait ClassVisitor {
	type MethodVisitor: MethodVisitor;

	fn visit(
		&mut self,
		version: Version,
		access: ClassAccess,
		name: &ClassNameSlice,
		signature: Option<&ClassSignatureSlice>,
		super_class: Option<&ClassNameSlice>,
		interfaces: &[ClassName],
	) -> Result<()> {
		let _ = (version, access, name, signature, super_class, interfaces);
		Ok(())
	}

	fn visit_source(&mut self, source_file: &JavaStr) -> Result<()> {
		let _ = source_file;
		Ok(())
	}

	fn visit_module(&mut self, module: &Module) -> Result<()> {
		let _ = module;
		Ok(())
	}

	fn visit_outer_class(&mut self, enclosing_method: &EnclosingMethod) -> Result<()> {
		let _ = enclosing_method;
		Ok(())
	}

	fn visit_nest_host(&mut self, host: &ClassNameSlice) -> Result<()> {
		let _ = host;
		Ok(())
	}

	fn visit_nest_member(&mut self, member: &ClassNameSlice) -> Result<()> {
		let _ = member;
		Ok(())
	}

	fn visit_inner_class(&mut self, inner_class: &InnerClass) -> Result<()> {
		let _ = inner_class;
		Ok(())
	}

	fn visit_field(&mut self, field: &Field) -> Result<()> {
		let _ = field;
		Ok(())
	}

	/// Opens a visitor for a method, or `None` to skip it.
	fn visit_method(
		&mut self,
		access: MethodAccess,
		name: &MethodNameSlice,
		descriptor: &MethodDescriptorSlice,
	) -> Result<Option<Self::MethodVisitor>> {
		let _ = (access, name, descriptor);
		Ok(None)
	}

	/// Takes the method visitor back after the method was fed to it.
	fn finish_method(&mut self, method_visitor: Self::MethodVisitor) -> Result<()> {
		let _ = method_visitor;
		Ok(())
	}

	fn visit_end(&mut self) -> Result<()> {
		Ok(())
	}
}

/// Does nothing; skips all methods.
impl ClassVisitor for () {
	type MethodVisitor = ();
}
