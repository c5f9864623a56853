use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use anyhow::{bail, Result};
use java_string::{JavaStr, JavaString};
use crate::macros::{make_display, make_string_str_like};
use crate::tree::class::ClassName;
use crate::tree::field::{FieldDescriptor, FieldName, FieldRef, FieldSignature};
use crate::tree::method::{MethodDescriptor, MethodName, MethodRef};
use crate::visitor::method::MethodVisitor;

/// Represents the code of a method.
///
/// The instructions, including the [pseudo-instructions][Insn::is_pseudo]
/// marking jump targets, line numbers and stack map frames, live in the
/// [`InsnList`]; the exception table and the local variable table reference
/// positions in it through [`Label`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Code {
	pub max_stack: u16,
	pub max_locals: u16,

	pub instructions: InsnList,
	pub exception_table: Vec<TryCatchBlock>,
	pub local_variables: Vec<LocalVariable>,
}

impl Code {
	pub fn new(max_stack: u16, max_locals: u16, instructions: InsnList) -> Code {
		Code {
			max_stack,
			max_locals,
			instructions,
			exception_table: Vec::new(),
			local_variables: Vec::new(),
		}
	}

	/// Feeds this code to the given visitor: instructions in list order, then
	/// the exception table, the local variable table, and the maximums.
	pub fn accept<M: MethodVisitor>(&self, visitor: &mut M) -> Result<()> {
		visitor.visit_code()?;
		self.instructions.accept(visitor)?;
		for block in &self.exception_table {
			visitor.visit_try_catch_block(block)?;
		}
		for local_variable in &self.local_variables {
			visitor.visit_local_variable(local_variable)?;
		}
		visitor.visit_maxs(self.max_stack, self.max_locals)
	}
}

make_string_str_like!(
	pub LocalVariableName(JavaString);
	/// A [`LocalVariableName`] slice.
	pub LocalVariableNameSlice(JavaStr);
	is_valid(s) = if crate::tree::names::is_valid_unqualified_name(s) {
		Ok(())
	} else {
		bail!("invalid local variable name: must be non-empty and not contain any of `.`, `;`, `[` and `/`")
	};
);
make_display!(LocalVariableName, LocalVariableNameSlice);

/// An exception handler: any exception of class `catch` (or any exception at
/// all, for `None`) raised in `[start, end)` transfers control to `handler`,
/// with the thrown value as the only operand stack entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TryCatchBlock {
	pub start: Label,
	pub end: Label,
	pub handler: Label,
	pub catch: Option<ClassName>,
}

/// Represents an index of a local variable.
///
/// If the local variable is of type `double` or `long`, it also occupies
/// the [`LvIndex`] with `index = index + 1`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LvIndex {
	pub index: u16,
}

/// An entry of the local variable table.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariable {
	pub range: LabelRange,
	pub name: LocalVariableName,
	pub descriptor: FieldDescriptor,
	pub signature: Option<FieldSignature>,
	pub index: LvIndex,
}

/// Represents a range of code positions.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRange {
	/// The start label, inclusive.
	pub start: Label,
	/// The end label, exclusive.
	pub end: Label,
}

static NEXT_LABEL_ID: AtomicU32 = AtomicU32::new(0);

/// An identity-only marker for a position in an [`InsnList`].
///
/// A label takes effect by sitting in an instruction list as an
/// [`Insn::Label`] node; jump instructions, switch tables, the exception
/// table and the local variable table all reference positions by label.
/// During analysis a label resolves to the index of its node.
///
/// Labels compare by identity: every call to [`Label::new`] returns a
/// distinct label, so two lists' labels never collide, and moving nodes
/// between lists keeps jump targets meaningful.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
	id: u32,
}

impl Label {
	pub fn new() -> Label {
		Label { id: NEXT_LABEL_ID.fetch_add(1, Ordering::Relaxed) }
	}
}

impl Default for Label {
	fn default() -> Label {
		Label::new()
	}
}

/// Represents an instruction of the JVM, or one of the three
/// pseudo-instructions ([`Insn::Label`], [`Insn::Line`], [`Insn::Frame`])
/// that occupy a position in an [`InsnList`] without having a runtime opcode.
///
/// Each instruction can either:
/// - hold no additional data, like [`Insn::Nop`],
/// - hold some immediate value, like [`Insn::BiPush`],
/// - hold a [local variable index][LvIndex], like [`Insn::ILoad`] (note that
///   this also represents the `iload_0` instruction for example),
/// - hold a [`Label`] for jumps, like [`Insn::IfEq`],
/// - or hold other data the instruction needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Insn {
	Nop,
	AConstNull,
	IConstM1, IConst0, IConst1, IConst2, IConst3, IConst4, IConst5,
	LConst0, LConst1,
	FConst0, FConst1, FConst2,
	DConst0, DConst1,
	BiPush(i8),
	SiPush(i16),
	Ldc(Loadable),
	ILoad(LvIndex), LLoad(LvIndex), FLoad(LvIndex), DLoad(LvIndex), ALoad(LvIndex),
	IALoad, LALoad, FALoad, DALoad, AALoad, BALoad, CALoad, SALoad,
	IStore(LvIndex), LStore(LvIndex), FStore(LvIndex), DStore(LvIndex), AStore(LvIndex),
	IAStore, LAStore, FAStore, DAStore, AAStore, BAStore, CAStore, SAStore,
	Pop, Pop2,
	Dup, DupX1, DupX2,
	Dup2, Dup2X1, Dup2X2,
	Swap,
	IAdd, LAdd, FAdd, DAdd,
	ISub, LSub, FSub, DSub,
	IMul, LMul, FMul, DMul,
	IDiv, LDiv, FDiv, DDiv,
	IRem, LRem, FRem, DRem,
	INeg, LNeg, FNeg, DNeg,
	IShl, LShl,
	IShr, LShr,
	IUShr, LUShr,
	IAnd, LAnd,
	IOr, LOr,
	IXor, LXor,
	IInc(LvIndex, i16),
	I2L, I2F, I2D,
	L2I, L2F, L2D,
	F2I, F2L, F2D,
	D2I, D2L, D2F,
	I2B, I2C, I2S,
	LCmp,
	FCmpL, FCmpG,
	DCmpL, DCmpG,
	IfEq(Label), IfNe(Label), IfLt(Label), IfGe(Label), IfGt(Label), IfLe(Label),
	IfICmpEq(Label), IfICmpNe(Label), IfICmpLt(Label), IfICmpGe(Label), IfICmpGt(Label), IfICmpLe(Label),
	IfACmpEq(Label), IfACmpNe(Label),
	Goto(Label),
	Jsr(Label),
	Ret(LvIndex),
	TableSwitch {
		default: Label,
		low: i32,
		high: i32,
		table: Vec<Label>,
	},
	LookupSwitch {
		default: Label,
		/// Note that these must be ordered by key.
		pairs: Vec<(i32, Label)>,
	},
	IReturn, LReturn, FReturn, DReturn, AReturn,
	Return,
	GetStatic(FieldRef),
	PutStatic(FieldRef),
	GetField(FieldRef),
	PutField(FieldRef),
	InvokeVirtual(MethodRef),
	/// The bool is `true` iff the target is on an interface, so if it referenced an `InterfaceMethodRef` constant pool entry.
	InvokeSpecial(MethodRef, bool),
	/// The bool is `true` iff the target is on an interface, so if it referenced an `InterfaceMethodRef` constant pool entry.
	InvokeStatic(MethodRef, bool),
	InvokeInterface(MethodRef),
	InvokeDynamic(InvokeDynamic),
	New(ClassName),
	NewArray(ArrayType),
	ANewArray(ClassName),
	ArrayLength,
	AThrow,
	CheckCast(ClassName),
	InstanceOf(ClassName),
	MonitorEnter, MonitorExit,
	MultiANewArray(ClassName, u8),
	IfNull(Label), IfNonNull(Label),

	/// Pseudo-instruction: the position of the [`Label`].
	Label(Label),
	/// Pseudo-instruction: the following instructions come from this source line.
	Line(u16),
	/// Pseudo-instruction: an explicit stack map frame for the position it
	/// sits at.
	Frame(StackMapData),
}

impl Insn {
	/// Whether this node is one of the pseudo-instructions (label, line
	/// number, stack map frame) that carry no runtime opcode.
	pub fn is_pseudo(&self) -> bool {
		matches!(self, Insn::Label(_) | Insn::Line(_) | Insn::Frame(_))
	}

	pub fn is_return(&self) -> bool {
		matches!(self, Insn::IReturn | Insn::LReturn | Insn::FReturn | Insn::DReturn | Insn::AReturn | Insn::Return)
	}

	/// The target of a jump instruction: the conditional branches, `goto` and
	/// `jsr`. Switch targets are not included.
	pub fn jump_target(&self) -> Option<Label> {
		match *self {
			Insn::IfEq(label) | Insn::IfNe(label)
			| Insn::IfLt(label) | Insn::IfGe(label) | Insn::IfGt(label) | Insn::IfLe(label)
			| Insn::IfICmpEq(label) | Insn::IfICmpNe(label)
			| Insn::IfICmpLt(label) | Insn::IfICmpGe(label) | Insn::IfICmpGt(label) | Insn::IfICmpLe(label)
			| Insn::IfACmpEq(label) | Insn::IfACmpNe(label)
			| Insn::IfNull(label) | Insn::IfNonNull(label)
			| Insn::Goto(label)
			| Insn::Jsr(label) => Some(label),
			_ => None,
		}
	}

	/// Whether this is a jump that may also continue at the next instruction.
	pub fn is_conditional_jump(&self) -> bool {
		self.jump_target().is_some() && !matches!(self, Insn::Goto(_) | Insn::Jsr(_))
	}

	/// Whether execution can continue at the instruction following this one.
	///
	/// Note that `jsr` falls through: the called subroutine eventually
	/// returns to the next instruction.
	pub fn falls_through(&self) -> bool {
		!matches!(self,
			Insn::Goto(_) | Insn::Ret(_) | Insn::AThrow
			| Insn::TableSwitch { .. } | Insn::LookupSwitch { .. }
		) && !self.is_return()
	}
}

/// A constant an `ldc` instruction (or a bootstrap method argument) can load.
#[derive(Debug, Clone, PartialEq)]
pub enum Loadable {
	Integer(i32),
	Float(f32),
	Long(i64),
	Double(f64),
	Class(ClassName),
	String(JavaString),
	MethodHandle(Handle),
	MethodType(MethodDescriptor),
	Dynamic(ConstantDynamic),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Handle {
	GetField(FieldRef),
	GetStatic(FieldRef),
	PutField(FieldRef),
	PutStatic(FieldRef),
	InvokeVirtual(MethodRef),
	InvokeStatic(MethodRef, bool),
	InvokeSpecial(MethodRef, bool),
	NewInvokeSpecial(MethodRef),
	InvokeInterface(MethodRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantDynamic {
	pub name: FieldName,
	pub descriptor: FieldDescriptor,
	pub handle: Handle,
	pub arguments: Vec<Loadable>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvokeDynamic {
	pub name: MethodName,
	pub descriptor: MethodDescriptor,
	pub handle: Handle,
	pub arguments: Vec<Loadable>,
}

/// The element type of a primitive array, as `newarray` carries it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ArrayType {
	Boolean,
	Char,
	Float,
	Double,
	Byte,
	Short,
	Int,
	Long,
}

/// A stack map frame, as the `StackMapTable` attribute stores it.
///
/// The `Same`/`Same1`/`Append`/`Chop`/`Full` variants mirror the compressed
/// forms of the attribute; `New` is an uncompressed frame giving all locals
/// and stack entries without delta-encoding against the previous frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StackMapData {
	Same,
	Same1(VerificationTypeInfo),
	Append(Vec<VerificationTypeInfo>),
	Chop(u8),
	Full {
		locals: Vec<VerificationTypeInfo>,
		stack: Vec<VerificationTypeInfo>,
	},
	New {
		locals: Vec<VerificationTypeInfo>,
		stack: Vec<VerificationTypeInfo>,
	},
}

/// A `verification_type_info` union entry of the `StackMapTable` attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationTypeInfo {
	Top,
	Integer,
	Float,
	Long,
	Double,
	Null,
	UninitializedThis,
	Object(ClassName),
	Uninitialized(Label),
}

/// A handle to a node of an [`InsnList`].
///
/// A key is only meaningful for the list that handed it out, and only until
/// that node is removed; using it with any other list, or after removal, is a
/// programming error and panics.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InsnKey {
	slot: u32,
}

#[derive(Debug, Clone)]
struct Node {
	insn: Insn,
	prev: Option<InsnKey>,
	next: Option<InsnKey>,
	/// Scratch space: the position of this node, valid while the index cache is.
	index: u32,
}

/// A doubly linked list of [`Insn`] nodes, the canonical representation of a
/// method's code.
///
/// Nodes are owned by exactly one list and addressed by [`InsnKey`]s. The
/// list keeps two lazily built caches: an index cache making [`get`][Self::get]
/// and [`index_of`][Self::index_of] amortized O(1), and a label cache backing
/// [`key_of_label`][Self::key_of_label]. Every structural mutation drops them.
#[derive(Debug, Clone)]
pub struct InsnList {
	slots: Vec<Option<Node>>,
	free: Vec<u32>,
	first: Option<InsnKey>,
	last: Option<InsnKey>,
	len: usize,
	index_cache: Option<Vec<InsnKey>>,
	label_cache: Option<HashMap<Label, InsnKey>>,
}

impl InsnList {
	pub fn new() -> InsnList {
		InsnList {
			slots: Vec::new(),
			free: Vec::new(),
			first: None,
			last: None,
			len: 0,
			index_cache: None,
			label_cache: None,
		}
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	pub fn first(&self) -> Option<InsnKey> {
		self.first
	}

	pub fn last(&self) -> Option<InsnKey> {
		self.last
	}

	fn node(&self, key: InsnKey) -> &Node {
		match self.slots.get(key.slot as usize) {
			Some(Some(node)) => node,
			_ => panic!("instruction key {key:?} does not belong to this list"),
		}
	}

	fn node_mut(&mut self, key: InsnKey) -> &mut Node {
		match self.slots.get_mut(key.slot as usize) {
			Some(Some(node)) => node,
			_ => panic!("instruction key {key:?} does not belong to this list"),
		}
	}

	/// The instruction behind the given key.
	pub fn insn(&self, key: InsnKey) -> &Insn {
		&self.node(key).insn
	}

	/// Mutable access to the instruction behind the given key.
	///
	/// This drops the label cache, as the mutation may move a label.
	pub fn insn_mut(&mut self, key: InsnKey) -> &mut Insn {
		self.label_cache = None;
		&mut self.node_mut(key).insn
	}

	pub fn next(&self, key: InsnKey) -> Option<InsnKey> {
		self.node(key).next
	}

	pub fn prev(&self, key: InsnKey) -> Option<InsnKey> {
		self.node(key).prev
	}

	/// Whether the given key addresses a node of this list. Always walks the
	/// list.
	pub fn contains(&self, key: InsnKey) -> bool {
		self.iter().any(|(k, _)| k == key)
	}

	/// The key of the node at the given position, or `None` if out of range.
	///
	/// Amortized O(1): builds the index cache if a structural mutation
	/// dropped it.
	pub fn get(&mut self, index: usize) -> Option<InsnKey> {
		self.ensure_index_cache();
		self.index_cache.as_ref().and_then(|cache| cache.get(index)).copied()
	}

	/// The position of the node with the given key.
	///
	/// Amortized O(1): builds the index cache if a structural mutation
	/// dropped it.
	pub fn index_of(&mut self, key: InsnKey) -> usize {
		self.ensure_index_cache();
		self.node(key).index as usize
	}

	/// The key of the [`Insn::Label`] node holding the given label, if any.
	///
	/// Amortized O(1): builds the label cache if it was dropped by a
	/// structural mutation or by [`reset_labels`][Self::reset_labels].
	pub fn key_of_label(&mut self, label: Label) -> Option<InsnKey> {
		self.ensure_label_cache();
		self.label_cache.as_ref().and_then(|cache| cache.get(&label)).copied()
	}

	/// Forgets any cached label resolution info.
	pub fn reset_labels(&mut self) {
		self.label_cache = None;
	}

	/// All keys, in list order.
	pub fn keys(&self) -> Vec<InsnKey> {
		self.iter().map(|(key, _)| key).collect()
	}

	pub fn iter(&self) -> Iter<'_> {
		Iter { list: self, cur: self.first }
	}

	fn invalidate_caches(&mut self) {
		self.index_cache = None;
		self.label_cache = None;
	}

	fn ensure_index_cache(&mut self) {
		if self.index_cache.is_none() {
			let mut cache = Vec::with_capacity(self.len);
			let mut cur = self.first;
			while let Some(key) = cur {
				self.node_mut(key).index = cache.len() as u32;
				cache.push(key);
				cur = self.node(key).next;
			}
			self.index_cache = Some(cache);
		}
	}

	fn ensure_label_cache(&mut self) {
		if self.label_cache.is_none() {
			let mut cache = HashMap::new();
			let mut cur = self.first;
			while let Some(key) = cur {
				let node = self.node(key);
				if let Insn::Label(label) = node.insn {
					cache.insert(label, key);
				}
				cur = node.next;
			}
			self.label_cache = Some(cache);
		}
	}

	fn alloc(&mut self, insn: Insn) -> InsnKey {
		let node = Node { insn, prev: None, next: None, index: 0 };
		let slot = match self.free.pop() {
			Some(slot) => {
				self.slots[slot as usize] = Some(node);
				slot
			},
			None => {
				self.slots.push(Some(node));
				(self.slots.len() - 1) as u32
			},
		};
		InsnKey { slot }
	}

	/// Appends the given instruction, returning its key.
	pub fn push_back(&mut self, insn: Insn) -> InsnKey {
		let key = self.alloc(insn);
		match self.last {
			Some(last) => {
				self.node_mut(last).next = Some(key);
				self.node_mut(key).prev = Some(last);
			},
			None => self.first = Some(key),
		}
		self.last = Some(key);
		self.len += 1;
		self.invalidate_caches();
		key
	}

	/// Prepends the given instruction, returning its key.
	pub fn push_front(&mut self, insn: Insn) -> InsnKey {
		let key = self.alloc(insn);
		match self.first {
			Some(first) => {
				self.node_mut(first).prev = Some(key);
				self.node_mut(key).next = Some(first);
			},
			None => self.last = Some(key),
		}
		self.first = Some(key);
		self.len += 1;
		self.invalidate_caches();
		key
	}

	/// Inserts the given instruction right after `pivot`, returning its key.
	pub fn insert_after(&mut self, pivot: InsnKey, insn: Insn) -> InsnKey {
		let next = self.node(pivot).next;
		let key = self.alloc(insn);
		{
			let node = self.node_mut(key);
			node.prev = Some(pivot);
			node.next = next;
		}
		self.node_mut(pivot).next = Some(key);
		match next {
			Some(next) => self.node_mut(next).prev = Some(key),
			None => self.last = Some(key),
		}
		self.len += 1;
		self.invalidate_caches();
		key
	}

	/// Inserts the given instruction right before `pivot`, returning its key.
	pub fn insert_before(&mut self, pivot: InsnKey, insn: Insn) -> InsnKey {
		let prev = self.node(pivot).prev;
		let key = self.alloc(insn);
		{
			let node = self.node_mut(key);
			node.prev = prev;
			node.next = Some(pivot);
		}
		self.node_mut(pivot).prev = Some(key);
		match prev {
			Some(prev) => self.node_mut(prev).next = Some(key),
			None => self.first = Some(key),
		}
		self.len += 1;
		self.invalidate_caches();
		key
	}

	/// Removes the node with the given key, returning its instruction. The
	/// key becomes invalid.
	pub fn remove(&mut self, key: InsnKey) -> Insn {
		let node = match self.slots.get_mut(key.slot as usize).and_then(Option::take) {
			Some(node) => node,
			None => panic!("instruction key {key:?} does not belong to this list"),
		};
		match node.prev {
			Some(prev) => self.node_mut(prev).next = node.next,
			None => self.first = node.next,
		}
		match node.next {
			Some(next) => self.node_mut(next).prev = node.prev,
			None => self.last = node.prev,
		}
		self.free.push(key.slot);
		self.len -= 1;
		self.invalidate_caches();
		node.insn
	}

	/// Replaces the instruction behind the given key in place, returning the
	/// old one. The key stays valid, as do the keys of all other nodes.
	pub fn set(&mut self, key: InsnKey, insn: Insn) -> Insn {
		self.label_cache = None;
		std::mem::replace(&mut self.node_mut(key).insn, insn)
	}

	/// Removes all nodes. All keys become invalid.
	pub fn clear(&mut self) {
		self.slots.clear();
		self.free.clear();
		self.first = None;
		self.last = None;
		self.len = 0;
		self.invalidate_caches();
	}

	/// Takes all instructions out, in order, leaving `self` empty.
	fn take_all(&mut self) -> Vec<Insn> {
		let mut insns = Vec::with_capacity(self.len);
		let mut cur = self.first;
		while let Some(key) = cur {
			let node = match self.slots.get_mut(key.slot as usize).and_then(Option::take) {
				Some(node) => node,
				None => panic!("inconsistent instruction list: dangling key {key:?}"),
			};
			cur = node.next;
			insns.push(node.insn);
		}
		self.clear();
		insns
	}

	/// Moves all nodes of `other` to the back of this list. `other` is left
	/// empty; its keys become invalid.
	pub fn append(&mut self, other: &mut InsnList) {
		for insn in other.take_all() {
			self.push_back(insn);
		}
	}

	/// Moves all nodes of `other` to the front of this list. `other` is left
	/// empty; its keys become invalid.
	pub fn prepend(&mut self, other: &mut InsnList) {
		let mut anchor = None;
		for insn in other.take_all() {
			anchor = Some(match anchor {
				None => self.push_front(insn),
				Some(anchor) => self.insert_after(anchor, insn),
			});
		}
	}

	/// Moves all nodes of `other` right after `pivot`, keeping their order.
	/// `other` is left empty; its keys become invalid.
	pub fn insert_list_after(&mut self, pivot: InsnKey, other: &mut InsnList) {
		let mut anchor = pivot;
		for insn in other.take_all() {
			anchor = self.insert_after(anchor, insn);
		}
	}

	/// Moves all nodes of `other` right before `pivot`, keeping their order.
	/// `other` is left empty; its keys become invalid.
	pub fn insert_list_before(&mut self, pivot: InsnKey, other: &mut InsnList) {
		for insn in other.take_all() {
			self.insert_before(pivot, insn);
		}
	}

	/// Feeds every instruction to the given visitor, dispatching on the
	/// instruction family.
	pub fn accept<M: MethodVisitor>(&self, visitor: &mut M) -> Result<()> {
		for (_, insn) in self.iter() {
			match insn {
				Insn::Label(label) => visitor.visit_label(*label)?,
				Insn::Line(line) => visitor.visit_line_number(*line)?,
				Insn::Frame(frame) => visitor.visit_frame(frame)?,

				Insn::BiPush(_) | Insn::SiPush(_) | Insn::NewArray(_) => visitor.visit_int_insn(insn)?,
				Insn::Ldc(constant) => visitor.visit_ldc_insn(constant)?,
				Insn::IInc(var, delta) => visitor.visit_iinc_insn(*var, *delta)?,

				Insn::ILoad(_) | Insn::LLoad(_) | Insn::FLoad(_) | Insn::DLoad(_) | Insn::ALoad(_)
				| Insn::IStore(_) | Insn::LStore(_) | Insn::FStore(_) | Insn::DStore(_) | Insn::AStore(_)
				| Insn::Ret(_) => visitor.visit_var_insn(insn)?,

				Insn::New(_) | Insn::ANewArray(_) | Insn::CheckCast(_) | Insn::InstanceOf(_) =>
					visitor.visit_type_insn(insn)?,

				Insn::GetStatic(_) | Insn::PutStatic(_) | Insn::GetField(_) | Insn::PutField(_) =>
					visitor.visit_field_insn(insn)?,

				Insn::InvokeVirtual(_) | Insn::InvokeSpecial(..) | Insn::InvokeStatic(..) | Insn::InvokeInterface(_) =>
					visitor.visit_method_insn(insn)?,
				Insn::InvokeDynamic(invoke_dynamic) => visitor.visit_invoke_dynamic_insn(invoke_dynamic)?,

				Insn::TableSwitch { .. } => visitor.visit_table_switch_insn(insn)?,
				Insn::LookupSwitch { .. } => visitor.visit_lookup_switch_insn(insn)?,

				Insn::MultiANewArray(class, dimensions) => visitor.visit_multi_anew_array_insn(class, *dimensions)?,

				_ => match insn.jump_target() {
					Some(target) => visitor.visit_jump_insn(insn, target)?,
					None => visitor.visit_insn(insn)?,
				},
			}
		}
		Ok(())
	}
}

impl Default for InsnList {
	fn default() -> InsnList {
		InsnList::new()
	}
}

/// Two lists are equal if they hold equal instructions in the same order,
/// regardless of how nodes are laid out in storage.
impl PartialEq for InsnList {
	fn eq(&self, other: &InsnList) -> bool {
		self.len == other.len
			&& self.iter().map(|(_, insn)| insn).eq(other.iter().map(|(_, insn)| insn))
	}
}

impl FromIterator<Insn> for InsnList {
	fn from_iter<T: IntoIterator<Item = Insn>>(iter: T) -> InsnList {
		let mut list = InsnList::new();
		for insn in iter {
			list.push_back(insn);
		}
		list
	}
}

pub struct Iter<'a> {
	list: &'a InsnList,
	cur: Option<InsnKey>,
}

impl<'a> Iterator for Iter<'a> {
	type Item = (InsnKey, &'a Insn);

	fn next(&mut self) -> Option<(InsnKey, &'a Insn)> {
		let key = self.cur?;
		let node = self.list.node(key);
		self.cur = node.next;
		Some((key, &node.insn))
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::tree::method::code::{Insn, InsnList, Label};

	/// Walks the chain both ways and checks it against `len` and the caches.
	fn assert_consistent(list: &InsnList) {
		let forward: Vec<_> = list.keys();
		assert_eq!(forward.len(), list.len());

		let mut backward = Vec::new();
		let mut cur = list.last();
		while let Some(key) = cur {
			backward.push(key);
			cur = list.prev(key);
		}
		backward.reverse();
		assert_eq!(forward, backward);

		for window in forward.windows(2) {
			assert_eq!(list.next(window[0]), Some(window[1]));
			assert_eq!(list.prev(window[1]), Some(window[0]));
		}
		if let Some(first) = list.first() {
			assert_eq!(list.prev(first), None);
		}
		if let Some(last) = list.last() {
			assert_eq!(list.next(last), None);
		}
		assert_eq!(list.first().is_none(), list.is_empty());
		assert_eq!(list.last().is_none(), list.is_empty());

		if let Some(cache) = &list.index_cache {
			assert_eq!(cache, &forward);
		}
	}

	fn insns(list: &InsnList) -> Vec<Insn> {
		list.iter().map(|(_, insn)| insn.clone()).collect()
	}

	#[test]
	fn push_insert_remove() {
		let mut list = InsnList::new();
		assert_consistent(&list);

		let a = list.push_back(Insn::IConst0);
		let c = list.push_back(Insn::IConst2);
		let b = list.insert_after(a, Insn::IConst1);
		let z = list.push_front(Insn::Nop);
		assert_consistent(&list);
		assert_eq!(insns(&list), vec![Insn::Nop, Insn::IConst0, Insn::IConst1, Insn::IConst2]);

		assert_eq!(list.index_of(b), 2);
		assert_eq!(list.get(3), Some(c));
		assert_eq!(list.get(4), None);
		assert_consistent(&list);

		assert_eq!(list.remove(b), Insn::IConst1);
		assert_consistent(&list);
		assert_eq!(insns(&list), vec![Insn::Nop, Insn::IConst0, Insn::IConst2]);
		assert!(!list.contains(b));
		assert!(list.contains(a));

		assert_eq!(list.remove(z), Insn::Nop);
		assert_eq!(list.remove(a), Insn::IConst0);
		assert_eq!(list.remove(c), Insn::IConst2);
		assert_consistent(&list);
		assert!(list.is_empty());
	}

	#[test]
	fn set_keeps_structure() {
		let mut list = InsnList::new();
		let a = list.push_back(Insn::IConst0);
		let b = list.push_back(Insn::IConst1);

		// warm the index cache, then check `set` doesn't drop it
		assert_eq!(list.index_of(b), 1);
		assert_eq!(list.set(a, Insn::IConst5), Insn::IConst0);
		assert_eq!(list.index_of(b), 1);
		assert_eq!(list.insn(a), &Insn::IConst5);
		assert_consistent(&list);
	}

	#[test]
	fn labels_resolve_and_reset() {
		let mut list = InsnList::new();
		let label = Label::new();
		list.push_back(Insn::Goto(label));
		let target = list.push_back(Insn::Label(label));

		assert_eq!(list.key_of_label(label), Some(target));
		assert_eq!(list.key_of_label(Label::new()), None);

		list.reset_labels();
		assert_eq!(list.key_of_label(label), Some(target));
	}

	#[test]
	fn splice_after() {
		let mut a = InsnList::new();
		a.push_back(Insn::IConst0);
		let kb = a.push_back(Insn::IConst1);
		a.push_back(Insn::IConst2);

		let mut b: InsnList = [Insn::IConst4, Insn::IConst5].into_iter().collect();

		a.insert_list_after(kb, &mut b);
		assert_consistent(&a);
		assert_consistent(&b);
		assert!(b.is_empty());
		assert_eq!(
			insns(&a),
			vec![Insn::IConst0, Insn::IConst1, Insn::IConst4, Insn::IConst5, Insn::IConst2],
		);
		// indices re-cache on demand
		assert_eq!(list_indices(&mut a), vec![0, 1, 2, 3, 4]);
	}

	fn list_indices(list: &mut InsnList) -> Vec<usize> {
		list.keys().into_iter().map(|key| list.index_of(key)).collect()
	}

	#[test]
	fn splice_before_and_append() {
		let mut a: InsnList = [Insn::IConst0, Insn::IConst1].into_iter().collect();
		let mut b: InsnList = [Insn::IConst4, Insn::IConst5].into_iter().collect();

		let pivot = a.first().expect("list isn't empty");
		a.insert_list_before(pivot, &mut b);
		assert_eq!(insns(&a), vec![Insn::IConst4, Insn::IConst5, Insn::IConst0, Insn::IConst1]);

		let mut c: InsnList = [Insn::Nop].into_iter().collect();
		a.append(&mut c);
		assert!(c.is_empty());
		let mut d: InsnList = [Insn::Swap].into_iter().collect();
		a.prepend(&mut d);
		assert_eq!(
			insns(&a),
			vec![Insn::Swap, Insn::IConst4, Insn::IConst5, Insn::IConst0, Insn::IConst1, Insn::Nop],
		);
		assert_consistent(&a);
	}

	#[test]
	fn slots_are_reused() {
		let mut list = InsnList::new();
		let a = list.push_back(Insn::IConst0);
		list.push_back(Insn::IConst1);
		list.remove(a);
		list.push_back(Insn::IConst2);
		// the freed slot got reused, no storage growth
		assert_eq!(list.slots.len(), 2);
		assert_consistent(&list);
	}

	#[test]
	#[should_panic(expected = "does not belong to this list")]
	fn stale_key_panics() {
		let mut list = InsnList::new();
		let a = list.push_back(Insn::IConst0);
		list.remove(a);
		list.insn(a);
	}
}
