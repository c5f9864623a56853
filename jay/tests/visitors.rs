use anyhow::Result;
use pretty_assertions::assert_eq;
use jay::error::Error;
use jay::tree::class::{ClassAccess, ClassFile, ClassName, ClassNameSlice, ClassSignatureSlice};
use jay::tree::method::code::{Code, Insn, InsnList, Label, Loadable, LvIndex, TryCatchBlock};
use jay::tree::method::{Method, MethodAccess, MethodDescriptor, MethodDescriptorSlice, MethodName, MethodNameSlice};
use jay::tree::version::Version;
use jay::visitor::class::ClassVisitor;
use jay::visitor::method::MethodVisitor;

/// Records the kind of every visit call, in order.
#[derive(Debug, Default)]
struct Recorder {
	events: Vec<String>,
}

impl MethodVisitor for Recorder {
	fn visit_code(&mut self) -> Result<()> {
		self.events.push("code".into());
		Ok(())
	}
	fn visit_insn(&mut self, insn: &Insn) -> Result<()> {
		self.events.push(format!("insn({insn:?})"));
		Ok(())
	}
	fn visit_var_insn(&mut self, insn: &Insn) -> Result<()> {
		self.events.push(format!("var({insn:?})"));
		Ok(())
	}
	fn visit_jump_insn(&mut self, _insn: &Insn, _target: Label) -> Result<()> {
		self.events.push("jump".into());
		Ok(())
	}
	fn visit_label(&mut self, _label: Label) -> Result<()> {
		self.events.push("label".into());
		Ok(())
	}
	fn visit_ldc_insn(&mut self, constant: &Loadable) -> Result<()> {
		self.events.push(format!("ldc({constant:?})"));
		Ok(())
	}
	fn visit_line_number(&mut self, line: u16) -> Result<()> {
		self.events.push(format!("line({line})"));
		Ok(())
	}
	fn visit_try_catch_block(&mut self, _block: &TryCatchBlock) -> Result<()> {
		self.events.push("try_catch".into());
		Ok(())
	}
	fn visit_maxs(&mut self, max_stack: u16, max_locals: u16) -> Result<()> {
		self.events.push(format!("maxs({max_stack},{max_locals})"));
		Ok(())
	}
	fn visit_end(&mut self) -> Result<()> {
		self.events.push("end".into());
		Ok(())
	}
}

#[test]
fn code_is_visited_in_list_order() -> Result<()> {
	let target = Label::new();
	let insns: InsnList = [
		Insn::Line(17),
		Insn::IConst0,
		Insn::IStore(LvIndex { index: 0 }),
		Insn::Goto(target),
		Insn::Label(target),
		Insn::Return,
	].into_iter().collect();
	let mut code = Code::new(2, 1, insns);
	code.exception_table.push(TryCatchBlock {
		start: target,
		end: target,
		handler: target,
		catch: None,
	});

	let mut recorder = Recorder::default();
	code.accept(&mut recorder)?;
	assert_eq!(recorder.events, vec![
		"code",
		"line(17)",
		"insn(IConst0)",
		"var(IStore(LvIndex { index: 0 }))",
		"jump",
		"label",
		"insn(Return)",
		"try_catch",
		"maxs(2,1)",
	]);
	Ok(())
}

/// Collects method names, skipping bodies.
#[derive(Debug, Default)]
struct MethodLister {
	names: Vec<String>,
	ends: usize,
}

impl ClassVisitor for MethodLister {
	type MethodVisitor = ();

	fn visit(
		&mut self,
		_version: Version,
		_access: ClassAccess,
		name: &ClassNameSlice,
		_signature: Option<&ClassSignatureSlice>,
		super_class: Option<&ClassNameSlice>,
		_interfaces: &[ClassName],
	) -> Result<()> {
		assert_eq!(name, ClassName::from("com/example/Main").as_slice());
		assert_eq!(super_class, Some(ClassName::JAVA_LANG_OBJECT));
		Ok(())
	}

	fn visit_method(
		&mut self,
		_access: MethodAccess,
		name: &MethodNameSlice,
		_descriptor: &MethodDescriptorSlice,
	) -> Result<Option<()>> {
		self.names.push(name.to_string());
		Ok(None)
	}

	fn visit_end(&mut self) -> Result<()> {
		self.ends += 1;
		Ok(())
	}
}

fn class_file() -> ClassFile {
	let mut class_file = ClassFile::new(
		Version::V17,
		ClassAccess { is_public: true, ..ClassAccess::default() },
		ClassName::from("com/example/Main"),
		Some(ClassName::JAVA_LANG_OBJECT.to_owned()),
		Vec::new(),
	);
	class_file.methods.push(Method::new(
		MethodAccess::default(),
		MethodName::from("run"),
		MethodDescriptor::from("()V"),
	));
	class_file.methods.push(Method::new(
		MethodAccess { is_static: true, ..MethodAccess::default() },
		MethodName::from("main"),
		MethodDescriptor::from("([Ljava/lang/String;)V"),
	));
	class_file
}

#[test]
fn methods_are_listed() -> Result<()> {
	let mut lister = MethodLister::default();
	class_file().accept(&mut lister)?;
	assert_eq!(lister.names, vec!["run", "main"]);
	assert_eq!(lister.ends, 1);
	Ok(())
}

#[test]
fn too_new_class_files_are_rejected() {
	let mut class_file = class_file();
	class_file.version = Version::new(Version::LATEST_SUPPORTED.major + 1, 0);

	let err = class_file.accept(&mut MethodLister::default()).unwrap_err();
	assert!(matches!(err.downcast_ref::<Error>(), Some(Error::UnsupportedFeature(_))), "{err:?}");
}
