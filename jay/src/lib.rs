//! A library for reading, representing, transforming and re-emitting the code
//! of JVM class files.
//!
//! The crate is organized around three things:
//! - a tree model of classes, methods and instructions ([`tree`]), where a
//!   method's code is a mutable [instruction list][tree::method::code::InsnList]
//!   of [instruction nodes][tree::method::code::Insn],
//! - a reader and writer for the generic signature grammar of JVMS §4.7.9.1
//!   ([`signature`]), speaking a common event-style [`signature::SignatureVisitor`],
//! - a symbolic [analyzer][analysis::analyzer::Analyzer] that computes, per
//!   instruction, the abstract frame of local variables and operand stack
//!   slots, parameterized by a pluggable [interpreter][analysis::interpreter::Interpreter]
//!   over an abstract value domain ([`analysis`]).
//!
//! Class file binary I/O is not part of this crate; producers and consumers
//! bind to the [`visitor`] traits instead.

pub mod error;
pub mod signature;
pub mod tree;
pub mod visitor;
pub mod analysis;

pub(crate) mod macros;
