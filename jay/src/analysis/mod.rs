//! Symbolic execution of method code.
//!
//! The [`Analyzer`](analyzer::Analyzer) runs a forward dataflow fixpoint over
//! the control flow graph of an instruction list, keeping one
//! [`Frame`](frame::Frame) of abstract values per instruction. What those
//! values mean is up to the [`Interpreter`](interpreter::Interpreter):
//!
//! - [`BasicInterpreter`](basic::BasicInterpreter) collapses everything to
//!   seven value kinds, enough to compute stack shapes,
//! - [`BasicVerifier`](verifier::BasicVerifier) additionally checks that each
//!   instruction gets operands of the kinds it expects,
//! - [`SimpleVerifier`](simple::SimpleVerifier) tracks exact types and checks
//!   assignability against a [`TypeOracle`](simple::TypeOracle),
//! - [`SourceInterpreter`](source::SourceInterpreter) tracks, per value, the
//!   set of instructions that may have produced it.

pub mod analyzer;
pub mod basic;
pub mod frame;
pub mod interpreter;
pub mod simple;
pub mod source;
pub mod subroutine;
pub mod verifier;
