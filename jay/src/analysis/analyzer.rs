use std::collections::HashMap;
use anyhow::{anyhow, Result};
use log::{debug, trace};
use crate::analysis::frame::Frame;
use crate::analysis::interpreter::{InsnRef, Interpreter};
use crate::analysis::subroutine::Subroutine;
use crate::error::Error;
use crate::tree::class::{ClassName, ClassNameSlice};
use crate::tree::descriptor::Type;
use crate::tree::method::code::{Insn, InsnKey, Label, TryCatchBlock};
use crate::tree::method::Method;

/// The dataflow analyzer: computes, for every instruction of a method, the
/// [`Frame`] of abstract values holding when control reaches it.
///
/// The value domain and all per-instruction semantics come from the
/// [`Interpreter`] the analyzer is built over.
pub struct Analyzer<I> {
	interpreter: I,
}

impl<I: Interpreter> Analyzer<I> {
	pub fn new(interpreter: I) -> Analyzer<I> {
		Analyzer { interpreter }
	}

	pub fn interpreter(&self) -> &I {
		&self.interpreter
	}

	pub fn into_interpreter(self) -> I {
		self.interpreter
	}

	/// Analyzes the given method of class `owner`.
	///
	/// Returns one entry per instruction list node: the frame holding just
	/// before that instruction executes, or `None` if the instruction is
	/// unreachable. Abstract and native methods get an empty result.
	///
	/// Any error raised while simulating an instruction comes back wrapped
	/// in [`Error::AnalysisFailed`] carrying the instruction's index.
	pub fn analyze(&mut self, owner: &ClassNameSlice, method: &Method) -> Result<Vec<Option<Frame<I::Value>>>> {
		if method.access.is_abstract || method.access.is_native {
			return Ok(Vec::new());
		}
		let code = method.code.as_ref()
			.ok_or_else(|| anyhow!("cannot analyze {}{}: the method has no code", method.name, method.descriptor))?;

		let insns = &code.instructions;
		let n = insns.len();
		if n == 0 {
			return Err(Error::FallOffEnd.into());
		}
		let max_locals = code.max_locals as usize;
		let max_stack = code.max_stack as usize;

		debug!("analyzing {owner}.{}{} ({n} instructions)", method.name, method.descriptor);

		// index the instruction list once
		let entries: Vec<(InsnKey, &Insn)> = insns.iter().collect();
		let mut key_index: HashMap<InsnKey, usize> = HashMap::with_capacity(n);
		let mut label_index: HashMap<Label, usize> = HashMap::new();
		for (i, (key, insn)) in entries.iter().enumerate() {
			key_index.insert(*key, i);
			if let Insn::Label(label) = insn {
				label_index.insert(*label, i);
			}
		}

		// per-instruction lists of the handlers covering it
		let mut handlers: Vec<Vec<&TryCatchBlock>> = vec![Vec::new(); n];
		for block in &code.exception_table {
			let start = resolve(&label_index, block.start)?;
			let end = resolve(&label_index, block.end)?;
			for handler_list in handlers.iter_mut().take(end).skip(start) {
				handler_list.push(block);
			}
		}

		// discover subroutines: walk the control flow graph, following jsr
		// calls only once their turn comes, so every instruction learns
		// which subroutine (if any) it belongs to
		let mut subroutines: Vec<Option<Subroutine>> = vec![None; n];
		let mut jsr_queue: Vec<usize> = Vec::new();

		let walk = |start: usize,
		            proto: &Subroutine,
		            subroutines: &mut Vec<Option<Subroutine>>,
		            jsr_queue: &mut Vec<usize>| -> Result<()> {
			let mut stack = vec![start];
			while let Some(i) = stack.pop() {
				if i >= n {
					return Err(Error::FallOffEnd.into());
				}
				if subroutines[i].is_some() {
					continue;
				}
				subroutines[i] = Some(proto.clone());

				let insn = entries[i].1;
				if let Some(target) = insn.jump_target() {
					if matches!(insn, Insn::Jsr(_)) {
						jsr_queue.push(i);
					} else {
						stack.push(resolve(&label_index, target)?);
					}
				}
				match insn {
					Insn::TableSwitch { default, table, .. } => {
						stack.push(resolve(&label_index, *default)?);
						for &label in table {
							stack.push(resolve(&label_index, label)?);
						}
					},
					Insn::LookupSwitch { default, pairs } => {
						stack.push(resolve(&label_index, *default)?);
						for &(_, label) in pairs {
							stack.push(resolve(&label_index, label)?);
						}
					},
					_ => {},
				}
				for block in &handlers[i] {
					stack.push(resolve(&label_index, block.handler)?);
				}
				if insn.falls_through() {
					stack.push(i + 1);
				}
			}
			Ok(())
		};

		let main = Subroutine::new(None, max_locals, None);
		walk(0, &main, &mut subroutines, &mut jsr_queue)?;

		let mut jsr_subroutines: HashMap<Label, Subroutine> = HashMap::new();
		let mut next_jsr = 0;
		while let Some(&jsr_index) = jsr_queue.get(next_jsr) {
			next_jsr += 1;
			let (jsr_key, jsr_insn) = entries[jsr_index];
			let target = match jsr_insn.jump_target() {
				Some(target) => target,
				None => return Err(anyhow!("queued jsr at {jsr_index} has no target")),
			};
			match jsr_subroutines.get_mut(&target) {
				Some(subroutine) => {
					subroutine.callers.insert(jsr_key);
				},
				None => {
					let subroutine = Subroutine::new(Some(target), max_locals, Some(jsr_key));
					jsr_subroutines.insert(target, subroutine.clone());
					walk(resolve(&label_index, target)?, &subroutine, &mut subroutines, &mut jsr_queue)?;
				},
			}
		}
		if !jsr_subroutines.is_empty() {
			debug!("found {} subroutines", jsr_subroutines.len());
		}

		// instructions only reachable outside of any jsr keep no subroutine
		for subroutine in subroutines.iter_mut() {
			if subroutine.as_ref().is_some_and(|subroutine| subroutine.start.is_none()) {
				*subroutine = None;
			}
		}

		// the frame on method entry: receiver and parameters in the first
		// locals, the rest uninitialized, the stack empty
		let interpreter = &mut self.interpreter;
		let parsed = method.descriptor.parse()?;
		let mut scratch = Frame::new(max_locals, max_stack, interpreter);
		let is_instance_method = !method.access.is_static;
		let mut local = 0;
		if is_instance_method {
			let owner_type = Type::Object(owner.to_owned());
			let value = interpreter.new_parameter_value(true, local, &owner_type);
			scratch.set_local(local, value)?;
			local += 1;
		}
		for ty in &parsed.parameter_descriptors {
			let value = interpreter.new_parameter_value(is_instance_method, local, ty);
			scratch.set_local(local, value)?;
			local += 1;
			if ty.size() == 2 {
				let empty = interpreter.new_empty_value(local);
				scratch.set_local(local, empty)?;
				local += 1;
			}
		}
		scratch.set_return_value(interpreter.new_return_type_value(parsed.return_descriptor.as_ref()));

		let mut pass = Pass {
			interpreter,
			frames: vec![None; n],
			subroutines,
			worklist: Vec::new(),
			in_worklist: vec![false; n],
			max_locals,
		};
		pass.merge_into(0, &scratch, None)?;

		while let Some(i) = pass.worklist.pop() {
			pass.in_worklist[i] = false;
			match &pass.frames[i] {
				Some(frame) => scratch.init(frame),
				None => continue,
			}
			let mut subroutine = pass.subroutines[i].clone();

			trace!("instruction {i}: {:?}", entries[i].1);
			if let Err(e) = pass.step(i, &entries, &handlers, &label_index, &key_index, &mut scratch, &mut subroutine) {
				return Err(Error::AnalysisFailed { index: i, source: e.into() }.into());
			}
		}

		debug!("analysis of {}{} reached its fixpoint", method.name, method.descriptor);
		Ok(pass.frames)
	}
}

fn resolve(labels: &HashMap<Label, usize>, label: Label) -> Result<usize> {
	labels.get(&label).copied()
		.ok_or_else(|| anyhow!("label {label:?} is not in the instruction list"))
}

fn record_local_use(subroutine: &mut Subroutine, index: usize) -> Result<()> {
	if index < subroutine.locals_used.len() {
		subroutine.locals_used.set(index);
		Ok(())
	} else {
		Err(Error::IllegalStack(format!("local variable index {index} out of bounds")).into())
	}
}

/// The mutable state of one fixpoint run.
struct Pass<'i, I: Interpreter> {
	interpreter: &'i mut I,
	frames: Vec<Option<Frame<I::Value>>>,
	subroutines: Vec<Option<Subroutine>>,
	worklist: Vec<usize>,
	in_worklist: Vec<bool>,
	max_locals: usize,
}

impl<I: Interpreter> Pass<'_, I> {
	/// Merges the given frame (and subroutine) into instruction `index`,
	/// queueing `index` if anything changed.
	fn merge_into(&mut self, index: usize, frame: &Frame<I::Value>, subroutine: Option<&Subroutine>) -> Result<()> {
		if index >= self.frames.len() {
			return Err(Error::FallOffEnd.into());
		}
		let mut changed = match &mut self.frames[index] {
			slot @ None => {
				*slot = Some(frame.clone());
				true
			},
			Some(old) => old.merge(frame, self.interpreter)?,
		};
		match (&mut self.subroutines[index], subroutine) {
			(slot @ None, Some(new)) => {
				*slot = Some(new.clone());
				changed = true;
			},
			(Some(old), Some(new)) => {
				changed |= old.merge(new);
			},
			_ => {},
		}
		if changed && !self.in_worklist[index] {
			self.in_worklist[index] = true;
			self.worklist.push(index);
		}
		Ok(())
	}

	/// Simulates instruction `i` on `current` and propagates the result to
	/// its successors, including exception edges.
	#[allow(clippy::too_many_arguments)]
	fn step(
		&mut self,
		i: usize,
		entries: &[(InsnKey, &Insn)],
		handlers: &[Vec<&TryCatchBlock>],
		label_index: &HashMap<Label, usize>,
		key_index: &HashMap<InsnKey, usize>,
		current: &mut Frame<I::Value>,
		subroutine: &mut Option<Subroutine>,
	) -> Result<()> {
		let (key, insn) = entries[i];
		let insn_ref = InsnRef { key, insn };

		if insn.is_pseudo() {
			self.merge_into(i + 1, current, subroutine.as_ref())?;
		} else {
			current.execute(insn_ref, self.interpreter)?;

			if let Some(target) = insn.jump_target() {
				let jump_index = resolve(label_index, target)?;
				if insn.is_conditional_jump() {
					self.merge_into(i + 1, current, subroutine.as_ref())?;
				}
				if matches!(insn, Insn::Jsr(_)) {
					// the callee starts out as a fresh subroutine with this
					// jsr as its (so far) only caller
					let called = Subroutine::new(Some(target), self.max_locals, Some(key));
					self.merge_into(jump_index, current, Some(&called))?;
				} else {
					self.merge_into(jump_index, current, subroutine.as_ref())?;
				}
			} else {
				match insn {
					Insn::TableSwitch { default, table, .. } => {
						self.merge_into(resolve(label_index, *default)?, current, subroutine.as_ref())?;
						for &label in table {
							self.merge_into(resolve(label_index, label)?, current, subroutine.as_ref())?;
						}
					},
					Insn::LookupSwitch { default, pairs } => {
						self.merge_into(resolve(label_index, *default)?, current, subroutine.as_ref())?;
						for &(_, label) in pairs {
							self.merge_into(resolve(label_index, label)?, current, subroutine.as_ref())?;
						}
					},
					Insn::Ret(_) => {
						// control resumes after every jsr that may have
						// called this subroutine, with the locals the
						// subroutine didn't touch restored from there
						let sub = subroutine.as_ref()
							.ok_or_else(|| anyhow!("RET instruction outside of a subroutine"))?;
						for &caller in &sub.callers {
							let caller_index = *key_index.get(&caller)
								.ok_or_else(|| anyhow!("jsr caller is not in the instruction list"))?;
							let before_jsr = self.frames[caller_index].clone();
							if let Some(before_jsr) = before_jsr {
								let mut after_ret = current.clone();
								after_ret.merge_after_ret(&before_jsr, &sub.locals_used);
								let caller_subroutine = self.subroutines[caller_index].clone();
								self.merge_into(caller_index + 1, &after_ret, caller_subroutine.as_ref())?;
							}
						}
					},
					_ if insn.is_return() || matches!(insn, Insn::AThrow) => {},
					_ => {
						if let Some(sub) = subroutine.as_mut() {
							match insn {
								Insn::ILoad(var) | Insn::FLoad(var) | Insn::ALoad(var)
								| Insn::IStore(var) | Insn::FStore(var) | Insn::AStore(var)
								| Insn::IInc(var, _) => {
									record_local_use(sub, var.index as usize)?;
								},
								Insn::LLoad(var) | Insn::DLoad(var)
								| Insn::LStore(var) | Insn::DStore(var) => {
									record_local_use(sub, var.index as usize)?;
									record_local_use(sub, var.index as usize + 1)?;
								},
								_ => {},
							}
						}
						self.merge_into(i + 1, current, subroutine.as_ref())?;
					},
				}
			}
		}

		// exception edges leave from the frame *before* this instruction,
		// with the stack reduced to the one caught value
		for block in &handlers[i] {
			let catch_type = match &block.catch {
				Some(class) => Type::Object(class.clone()),
				None => Type::Object(ClassName::JAVA_LANG_THROWABLE.to_owned()),
			};
			let mut handler_frame = match &self.frames[i] {
				Some(frame) => frame.clone(),
				None => continue,
			};
			handler_frame.clear_stack();
			let value = self.interpreter.new_exception_value(block, &catch_type);
			handler_frame.push(value)?;
			self.merge_into(resolve(label_index, block.handler)?, &handler_frame, subroutine.as_ref())?;
		}

		Ok(())
	}
}
