use anyhow::Result;
use crate::tree::class::{ClassName, ClassNameSlice};
use crate::tree::method::code::{Insn, InvokeDynamic, Label, Loadable, LocalVariable, LvIndex, StackMapData, TryCatchBlock};
use crate::tree::method::MethodSignatureSlice;

/// A visitor for a method, in the order [`Method::accept`] drives it:
/// exceptions and signature, then, if there is code, `visit_code`, the
/// instructions (one `visit_*` call per [`InsnList`] node, dispatched on the
/// instruction family), the try/catch blocks, the local variables,
/// `visit_maxs`, and finally `visit_end`.
///
/// [`Method::accept`]: crate::tree::method::Method::accept
/// [`InsnList`]: crate::tree::method::code::InsnList
pub trait MethodVisitor {
	fn visit_exceptions(&mut self, exceptions: &[ClassName]) -> Result<()> {
		let _ = exceptions;
		Ok(())
	}

	fn visit_signature(&mut self, signature: &MethodSignatureSlice) -> Result<()> {
		let _ = signature;
		Ok(())
	}

	/// Called before the first instruction, if the method has code.
	fn visit_code(&mut self) -> Result<()> {
		Ok(())
	}

	fn visit_frame(&mut self, frame: &StackMapData) -> Result<()> {
		let _ = frame;
		Ok(())
	}

	/// An instruction without operands.
	fn visit_insn(&mut self, insn: &Insn) -> Result<()> {
		let _ = insn;
		Ok(())
	}

	/// `bipush`, `sipush` or `newarray`.
	fn visit_int_insn(&mut self, insn: &Insn) -> Result<()> {
		let _ = insn;
		Ok(())
	}

	/// A load, a store, or `ret`.
	fn visit_var_insn(&mut self, insn: &Insn) -> Result<()> {
		let _ = insn;
		Ok(())
	}

	/// `new`, `anewarray`, `checkcast` or `instanceof`.
	fn visit_type_insn(&mut self, insn: &Insn) -> Result<()> {
		let _ = insn;
		Ok(())
	}

	fn visit_field_insn(&mut self, insn: &Insn) -> Result<()> {
		let _ = insn;
		Ok(())
	}

	fn visit_method_insn(&mut self, insn: &Insn) -> Result<()> {
		let _ = insn;
		Ok(())
	}

	fn visit_invoke_dynamic_insn(&mut self, invoke_dynamic: &InvokeDynamic) -> Result<()> {
		let _ = invoke_dynamic;
		Ok(())
	}

	fn visit_jump_insn(&mut self, insn: &Insn, target: Label) -> Result<()> {
		let _ = (insn, target);
		Ok(())
	}

	fn visit_label(&mut self, label: Label) -> Result<()> {
		let _ = label;
		Ok(())
	}

	fn visit_ldc_insn(&mut self, constant: &Loadable) -> Result<()> {
		let _ = constant;
		Ok(())
	}

	fn visit_iinc_insn(&mut self, var: LvIndex, delta: i16) -> Result<()> {
		let _ = (var, delta);
		Ok(())
	}

	fn visit_table_switch_insn(&mut self, insn: &Insn) -> Result<()> {
		let _ = insn;
		Ok(())
	}

	fn visit_lookup_switch_insn(&mut self, insn: &Insn) -> Result<()> {
		let _ = insn;
		Ok(())
	}

	fn visit_multi_anew_array_insn(&mut self, class: &ClassNameSlice, dimensions: u8) -> Result<()> {
		let _ = (class, dimensions);
		Ok(())
	}

	fn visit_line_number(&mut self, line: u16) -> Result<()> {
		let _ = line;
		Ok(())
	}

	fn visit_try_catch_block(&mut self, block: &TryCatchBlock) -> Result<()> {
		let _ = block;
		Ok(())
	}

	fn visit_local_variable(&mut self, local_variable: &LocalVariable) -> Result<()> {
		let _ = local_variable;
		Ok(())
	}

	fn visit_maxs(&mut self, max_stack: u16, max_locals: u16) -> Result<()> {
		let _ = (max_stack, max_locals);
		Ok(())
	}

	fn visit_end(&mut self) -> Result<()> {
		Ok(())
	}
}

/// Does nothing.
impl MethodVisitor for () {}
