//! The error types of this crate.
//!
//! Each operation family has its own error type: [`DecodeError`] for parsing, [`EncodeError`] for serializing,
//! [`EditError`] for the [`CodeEditor`](crate::bytecode::editor::CodeEditor), [`VerifyError`] for the stack depth
//! analysis and [`PoolError`] for constant pool lookups. [`Error`] unifies all of them.

use thiserror::Error;

/// An error from looking up or adding a constant pool entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
	#[error("constant pool index {0} is invalid")]
	InvalidIndex(u16),
	#[error("constant pool entry {index} is {found}, expected {expected}")]
	WrongKind {
		index: u16,
		expected: &'static str,
		found: &'static str,
	},
	#[error("constant pool overflowed while adding {0}")]
	Overflow(&'static str),
	#[error("constant pool entry {0} does not hold a valid string")]
	InvalidUtf8(u16),
}

/// An error while parsing a class file, carrying the byte offset at which it occurred.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} (at byte offset {offset})")]
pub struct DecodeError {
	pub offset: usize,
	pub kind: DecodeErrorKind,
}

impl DecodeError {
	pub fn new(offset: usize, kind: DecodeErrorKind) -> DecodeError {
		DecodeError { offset, kind }
	}

	pub(crate) fn malformed(offset: usize, message: impl Into<String>) -> DecodeError {
		DecodeError::new(offset, DecodeErrorKind::Malformed(message.into()))
	}
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
	#[error("unexpected end of data, {needed} more bytes needed")]
	UnexpectedEnd { needed: usize },
	#[error("bad magic {0:#010x}")]
	BadMagic(u32),
	#[error("unknown constant pool tag {0}")]
	UnknownTag(u8),
	#[error("unknown opcode {0:#04x}")]
	UnknownOpcode(u8),
	#[error(transparent)]
	Pool(#[from] PoolError),
	#[error("{0}")]
	Malformed(String),
}

/// An error while serializing a class file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
	#[error("{what} has length {length}, which does not fit into {bits} bits")]
	TooLarge {
		what: &'static str,
		length: usize,
		bits: u8,
	},
	#[error(transparent)]
	Pool(#[from] PoolError),
}

/// An error while editing a code body. The code body is left as it was before the failed call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
	#[error("position {0} is not an instruction boundary")]
	NotInstructionBoundary(usize),
	#[error("position {position} is outside of the code of length {length}")]
	OutOfBounds { position: usize, length: usize },
	#[error("branch at {at} targets {target}, which is outside of the code of length {length}")]
	BranchOutOfBounds { at: usize, target: i64, length: usize },
	#[error("switch alignment for the gap of length {0} could not be resolved")]
	AlignmentUnresolved(usize),
	#[error("branch widening didn't settle after {0} rounds")]
	WideningDiverged(usize),
	#[error("code length {0} exceeds the maximum of 65535")]
	CodeTooLarge(usize),
	#[error("stack map frame at {0} can't be moved before the previous frame")]
	FrameOrder(usize),
	#[error(transparent)]
	Decode(#[from] DecodeError),
	#[error(transparent)]
	Pool(#[from] PoolError),
}

/// An error from the stack depth analysis.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
	#[error("stack underflow at {position}")]
	StackUnderflow { position: usize },
	#[error("inconsistent stack depth at {position}: got {found}, but {expected} was recorded before")]
	InconsistentDepth { position: usize, expected: i32, found: i32 },
	#[error("subroutine call at {position} with stack depth {found}, other calls have {expected}")]
	SubroutineDepthMismatch { position: usize, expected: i32, found: i32 },
	#[error("unsupported subroutine at {position}: {reason}")]
	UnsupportedSubroutine { position: usize, reason: &'static str },
	#[error("branch at {at} targets {target}, which is outside of the code")]
	BranchOutOfBounds { at: usize, target: i64 },
	#[error("bad descriptor {0:?}")]
	BadDescriptor(String),
	#[error("computed max stack {0} doesn't fit into an u16")]
	TooDeep(i32),
	#[error(transparent)]
	Decode(#[from] DecodeError),
	#[error(transparent)]
	Pool(#[from] PoolError),
}

/// Any error of this crate.
#[derive(Error, Debug)]
pub enum Error {
	#[error(transparent)]
	Decode(#[from] DecodeError),
	#[error(transparent)]
	Encode(#[from] EncodeError),
	#[error(transparent)]
	Edit(#[from] EditError),
	#[error(transparent)]
	Verify(#[from] VerifyError),
	#[error(transparent)]
	Pool(#[from] PoolError),
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error("class already has a {kind} named {name:?} with descriptor {descriptor:?}")]
	DuplicateMember {
		kind: &'static str,
		name: String,
		descriptor: String,
	},
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
