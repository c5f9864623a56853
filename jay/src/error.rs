//! The structured error kinds of this crate.
//!
//! All fallible operations return [`anyhow::Result`]; the kinds below travel
//! inside the [`anyhow::Error`] and can be recovered with
//! [`downcast_ref`][anyhow::Error::downcast_ref].

/// An error raised by descriptor or signature parsing, by frame simulation,
/// or by the analyzer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// A field or method descriptor doesn't follow the grammar of JVMS §4.3.2-4.3.3.
	#[error("malformed descriptor: {0}")]
	BadDescriptor(String),

	/// A class, method or type signature doesn't follow the grammar of JVMS §4.7.9.1.
	///
	/// `offset` is the byte offset into the signature string at which parsing failed.
	#[error("malformed signature at offset {offset}: {reason}")]
	BadSignature { offset: usize, reason: String },

	/// An instruction underflowed or overflowed the operand stack, wrote past
	/// the last local variable slot, or mixed size-1 and size-2 values where
	/// it must not.
	#[error("illegal stack operation: {0}")]
	IllegalStack(String),

	/// A verifying interpreter rejected an operand.
	#[error("verification failed: expected {expected}, got {actual}")]
	Verification { expected: String, actual: String },

	/// Two frames with different operand stack heights were merged.
	#[error("cannot merge frames of stack heights {left} and {right}")]
	IncompatibleFrames { left: usize, right: usize },

	/// Control flow can reach past the last instruction of the code.
	#[error("execution can fall off the end of the code")]
	FallOffEnd,

	/// Wrapper for any error raised while simulating the instruction at `index`.
	#[error("analysis failed at instruction {index}")]
	AnalysisFailed {
		index: usize,
		#[source]
		source: Box<dyn std::error::Error + Send + Sync>,
	},

	/// A tree node carries a class file feature newer than the format profile
	/// this crate speaks.
	#[error("unsupported class file feature: {0}")]
	UnsupportedFeature(String),
}
