//! Working with the instructions of a `Code` attribute.
//!
//! Positions are byte offsets into the code array. An instruction boundary is a position at which an instruction
//! starts, or the end of the code.

use std::collections::BTreeMap;
use crate::class_map::ClassMap;
use crate::codec::{get_i32_at, get_u16_at, put_u16_at};
use crate::error::{DecodeError, DecodeErrorKind, EditError};
use crate::pool::ConstPool;

pub mod editor;
pub mod opcode;
pub(crate) mod relocate;
pub mod stack;

/// The number of padding bytes after a `tableswitch` or `lookupswitch` opcode at `position`, so that the operands
/// start at a multiple of four.
pub fn switch_padding(position: usize) -> usize {
	3 - (position & 3)
}

/// The length of the instruction at `position`, including operands and padding.
pub fn instruction_length(code: &[u8], position: usize) -> Result<usize, DecodeError> {
	let Some(&op) = code.get(position) else {
		return Err(DecodeError::new(position, DecodeErrorKind::UnexpectedEnd { needed: 1 }));
	};

	let length = match opcode::fixed_length(op) {
		None => return Err(DecodeError::new(position, DecodeErrorKind::UnknownOpcode(op))),
		Some(0) => variable_length(code, position, op)?,
		Some(length) => length,
	};

	if position + length > code.len() {
		return Err(DecodeError::new(position, DecodeErrorKind::UnexpectedEnd { needed: position + length - code.len() }));
	}
	Ok(length)
}

fn variable_length(code: &[u8], position: usize, op: u8) -> Result<usize, DecodeError> {
	let operands = position + 1 + switch_padding(position);
	let need = |bytes: usize| {
		if operands + bytes > code.len() {
			Err(DecodeError::new(position, DecodeErrorKind::UnexpectedEnd { needed: operands + bytes - code.len() }))
		} else {
			Ok(())
		}
	};

	match op {
		opcode::TABLESWITCH => {
			need(12)?;
			let low = get_i32_at(code, operands + 4);
			let high = get_i32_at(code, operands + 8);
			if high < low {
				return Err(DecodeError::malformed(position, format!("tableswitch with low {low} above high {high}")));
			}
			let count = (high as i64 - low as i64 + 1) as usize;
			Ok(operands + 12 + 4 * count - position)
		},
		opcode::LOOKUPSWITCH => {
			need(8)?;
			let pairs = get_i32_at(code, operands + 4);
			if pairs < 0 {
				return Err(DecodeError::malformed(position, format!("lookupswitch with {pairs} pairs")));
			}
			Ok(operands + 8 + 8 * pairs as usize - position)
		},
		opcode::WIDE => {
			let Some(&modified) = code.get(position + 1) else {
				return Err(DecodeError::new(position, DecodeErrorKind::UnexpectedEnd { needed: 1 }));
			};
			match modified {
				opcode::IINC => Ok(6),
				opcode::ILOAD..=opcode::ALOAD | opcode::ISTORE..=opcode::ASTORE | opcode::RET => Ok(4),
				other => Err(DecodeError::malformed(position, format!("wide can't modify opcode {other:#04x}"))),
			}
		},
		_ => Err(DecodeError::new(position, DecodeErrorKind::UnknownOpcode(op))),
	}
}

/// The position of the instruction following the one at `position`.
pub fn next_instruction_position(code: &[u8], position: usize) -> Result<usize, DecodeError> {
	Ok(position + instruction_length(code, position)?)
}

/// The start positions of all instructions, in order.
pub fn instruction_positions(code: &[u8]) -> Result<Vec<usize>, DecodeError> {
	let mut positions = Vec::new();
	let mut position = 0;
	while position < code.len() {
		positions.push(position);
		position = next_instruction_position(code, position)?;
	}
	Ok(positions)
}

/// If `position` is the start of an instruction or the end of the code.
pub(crate) fn is_instruction_boundary(code: &[u8], position: usize) -> Result<bool, DecodeError> {
	let mut current = 0;
	while current < position {
		current = next_instruction_position(code, current)?;
	}
	Ok(current == position)
}

/// The code, with all constant pool operands of the instructions replaced by indices into `dest`.
#[derive(Debug)]
pub(crate) struct CopiedCode {
	pub(crate) code: Vec<u8>,
	/// The `ldc` instructions whose new index doesn't fit into a byte, by position. They need to become `ldc_w`.
	pub(crate) wide_ldc: BTreeMap<usize, u16>,
}

/// Copies the instructions, moving the constant pool entries they use from `src` into `dest`.
pub(crate) fn copy_code(code: &[u8], src: &ConstPool, dest: &mut ConstPool, map: &ClassMap) -> Result<CopiedCode, EditError> {
	let mut copy = code.to_vec();
	let mut wide_ldc = BTreeMap::new();

	let mut position = 0;
	while position < code.len() {
		let length = instruction_length(code, position)?;
		match code[position] {
			opcode::LDC => {
				let index = src.copy(code[position + 1] as u16, dest, map)?;
				match u8::try_from(index) {
					Ok(index) => copy[position + 1] = index,
					Err(_) => {
						wide_ldc.insert(position, index);
					},
				}
			},
			opcode::LDC_W | opcode::LDC2_W |
			opcode::GETSTATIC..=opcode::INVOKEDYNAMIC |
			opcode::NEW | opcode::ANEWARRAY | opcode::CHECKCAST | opcode::INSTANCEOF |
			opcode::MULTIANEWARRAY => {
				let index = src.copy(get_u16_at(code, position + 1), dest, map)?;
				put_u16_at(&mut copy, position + 1, index);
			},
			_ => {},
		}
		position += length;
	}

	Ok(CopiedCode { code: copy, wide_ldc })
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::bytecode::{instruction_length, instruction_positions, is_instruction_boundary, next_instruction_position, opcode};
	use crate::error::DecodeErrorKind;

	#[test]
	fn fixed_lengths() {
		let code = [opcode::ICONST_0, opcode::ISTORE, 1, opcode::GOTO, 0xff, 0xfd, opcode::RETURN];
		assert_eq!(instruction_positions(&code), Ok(vec![0, 1, 3, 6]));
		assert_eq!(next_instruction_position(&code, 3), Ok(6));
		assert_eq!(is_instruction_boundary(&code, 2), Ok(false));
		assert_eq!(is_instruction_boundary(&code, 7), Ok(true));
	}

	#[test]
	fn switches() {
		// tableswitch at 1: two bytes of padding, default, low 0, high 1, two offsets
		let mut code = vec![opcode::NOP, opcode::TABLESWITCH, 0, 0];
		code.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0]);
		assert_eq!(instruction_length(&code, 1), Ok(23));

		// lookupswitch at 0: three bytes of padding, default, one pair
		let mut code = vec![opcode::LOOKUPSWITCH, 0, 0, 0];
		code.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 7, 0, 0, 0, 0]);
		assert_eq!(instruction_length(&code, 0), Ok(20));
	}

	#[test]
	fn wide() {
		let code = [opcode::WIDE, opcode::IINC, 1, 0, 0, 1, opcode::WIDE, opcode::ALOAD, 1, 0];
		assert_eq!(instruction_positions(&code), Ok(vec![0, 6]));
	}

	#[test]
	fn errors() {
		let error = instruction_length(&[opcode::NOP, 0xfe], 1).unwrap_err();
		assert_eq!(error.offset, 1);
		assert_eq!(error.kind, DecodeErrorKind::UnknownOpcode(0xfe));

		let error = instruction_length(&[opcode::SIPUSH, 0], 0).unwrap_err();
		assert_eq!(error.kind, DecodeErrorKind::UnexpectedEnd { needed: 1 });
	}
}
