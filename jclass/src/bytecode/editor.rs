//! A cursor over the instructions of a code body, able to insert bytes anywhere.

use log::trace;
use crate::attribute::code::{CodeAttribute, ExceptionEntry};
use crate::bytecode::relocate::{self, Insertion};
use crate::bytecode::{is_instruction_boundary, next_instruction_position, opcode};
use crate::codec::{get_i16_at, get_i32_at, get_u16_at, put_i32_at, put_u16_at};
use crate::error::EditError;
use crate::pool::ConstPool;

/// A gap inserted into the code, filled with `nop`s.
///
/// The length can be larger than requested, see [`CodeEditor::insert_gap_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
	pub position: usize,
	pub length: usize,
}

/// Edits the instructions of a [`CodeAttribute`].
///
/// The editor has a cursor, pointing at an instruction boundary, and a mark, a position that is kept up to date
/// across insertions like the positions in the exception table. All insertions keep every branch, switch, exception
/// range, line number, local variable range and stack map frame pointing at the same instruction as before.
///
/// If an insertion fails, the code is left as it was.
#[derive(Debug)]
pub struct CodeEditor<'a> {
	code: &'a mut CodeAttribute,
	cursor: usize,
	mark: usize,
}

impl<'a> CodeEditor<'a> {
	pub fn new(code: &'a mut CodeAttribute) -> CodeEditor<'a> {
		CodeEditor { code, cursor: 0, mark: 0 }
	}

	pub fn code(&self) -> &CodeAttribute {
		&*self.code
	}

	pub fn code_length(&self) -> usize {
		self.code.code.len()
	}

	/// Moves the cursor to the first instruction.
	pub fn begin(&mut self) {
		self.cursor = 0;
	}

	/// Moves the cursor. The position must be an instruction boundary for [`CodeEditor::next`] to make sense.
	pub fn move_to(&mut self, position: usize) {
		self.cursor = position;
	}

	pub fn has_next(&self) -> bool {
		self.cursor < self.code_length()
	}

	/// Returns the position of the instruction at the cursor, and moves the cursor to the one after it.
	pub fn next(&mut self) -> Result<usize, EditError> {
		let position = self.cursor;
		self.cursor = next_instruction_position(&self.code.code, position)?;
		Ok(position)
	}

	/// The position [`CodeEditor::next`] returns next.
	pub fn look_ahead(&self) -> usize {
		self.cursor
	}

	pub fn set_mark(&mut self, position: usize) {
		self.mark = position;
	}

	pub fn mark(&self) -> usize {
		self.mark
	}

	fn check(&self, position: usize, width: usize) -> Result<(), EditError> {
		if position + width > self.code_length() {
			Err(EditError::OutOfBounds { position, length: self.code_length() })
		} else {
			Ok(())
		}
	}

	pub fn byte_at(&self, position: usize) -> Result<u8, EditError> {
		self.check(position, 1)?;
		Ok(self.code.code[position])
	}

	pub fn u16_at(&self, position: usize) -> Result<u16, EditError> {
		self.check(position, 2)?;
		Ok(get_u16_at(&self.code.code, position))
	}

	pub fn s16_at(&self, position: usize) -> Result<i16, EditError> {
		self.check(position, 2)?;
		Ok(get_i16_at(&self.code.code, position))
	}

	pub fn s32_at(&self, position: usize) -> Result<i32, EditError> {
		self.check(position, 4)?;
		Ok(get_i32_at(&self.code.code, position))
	}

	/// Overwrites a byte. This doesn't move anything, replacing an instruction by one of another length breaks the
	/// code.
	pub fn write_u8(&mut self, position: usize, value: u8) -> Result<(), EditError> {
		self.check(position, 1)?;
		self.code.code[position] = value;
		Ok(())
	}

	pub fn write_u16(&mut self, position: usize, value: u16) -> Result<(), EditError> {
		self.check(position, 2)?;
		put_u16_at(&mut self.code.code, position, value);
		Ok(())
	}

	pub fn write_i16(&mut self, position: usize, value: i16) -> Result<(), EditError> {
		self.write_u16(position, value as u16)
	}

	pub fn write_i32(&mut self, position: usize, value: i32) -> Result<(), EditError> {
		self.check(position, 4)?;
		put_i32_at(&mut self.code.code, position, value);
		Ok(())
	}

	/// Inserts the bytes in front of the instruction at the cursor. Branches to that instruction now branch to the
	/// inserted bytes. Returns the position of the inserted bytes.
	pub fn insert(&mut self, bytes: &[u8]) -> Result<usize, EditError> {
		self.insert_bytes(self.cursor, bytes, false)
	}

	/// Like [`CodeEditor::insert`], but branches to the instruction at the cursor still branch to it.
	pub fn insert_ex(&mut self, bytes: &[u8]) -> Result<usize, EditError> {
		self.insert_bytes(self.cursor, bytes, true)
	}

	pub fn insert_at(&mut self, position: usize, bytes: &[u8]) -> Result<usize, EditError> {
		self.insert_bytes(position, bytes, false)
	}

	pub fn insert_ex_at(&mut self, position: usize, bytes: &[u8]) -> Result<usize, EditError> {
		self.insert_bytes(position, bytes, true)
	}

	fn insert_bytes(&mut self, position: usize, bytes: &[u8], exclusive: bool) -> Result<usize, EditError> {
		let gap = self.insert_gap_at(position, bytes.len(), exclusive)?;
		self.code.code[gap.position..gap.position + bytes.len()].copy_from_slice(bytes);
		Ok(gap.position)
	}

	/// Inserts a gap in front of the instruction at the cursor. Returns the position of the gap.
	pub fn insert_gap(&mut self, length: usize) -> Result<usize, EditError> {
		Ok(self.insert_gap_at(self.cursor, length, false)?.position)
	}

	pub fn insert_ex_gap(&mut self, length: usize) -> Result<usize, EditError> {
		Ok(self.insert_gap_at(self.cursor, length, true)?.position)
	}

	/// Inserts a gap of `nop`s in front of the instruction at `position`.
	///
	/// With `exclusive`, branches to `position` keep branching to the instruction there, otherwise they branch to the
	/// start of the gap. The same goes for the exception table, the debug tables, the stack map frames and the mark.
	/// The cursor moves behind the gap if it's at or behind `position`.
	///
	/// The gap can get longer than `length`: in small methods it's rounded up to a multiple of four if that saves
	/// changing the padding of a switch.
	pub fn insert_gap_at(&mut self, position: usize, length: usize, exclusive: bool) -> Result<Gap, EditError> {
		let code_length = self.code_length();
		if position > code_length {
			return Err(EditError::OutOfBounds { position, length: code_length });
		}
		if !is_instruction_boundary(&self.code.code, position)? {
			return Err(EditError::NotInstructionBoundary(position));
		}
		if length == 0 {
			return Ok(Gap { position, length: 0 });
		}

		let relocated = relocate::insert_gap(&self.code.code, Insertion { at: position, length, exclusive })?;
		let gap = Gap { position: relocated.map.gap_start(), length: relocated.map.gap_length() };
		let cursor = relocated.map.instruction(self.cursor);
		let mark = relocated.map.reference(self.mark);

		relocate::apply(self.code, relocated)?;
		self.cursor = cursor;
		self.mark = mark;

		trace!("inserted gap of {} bytes at {}", gap.length, gap.position);
		Ok(gap)
	}

	fn check_growth(&self, length: usize) -> Result<usize, EditError> {
		let position = self.code_length();
		if position + length > u16::MAX as usize {
			Err(EditError::CodeTooLarge(position + length))
		} else {
			Ok(position)
		}
	}

	/// Appends the bytes at the end of the code. Returns their position.
	pub fn append(&mut self, bytes: &[u8]) -> Result<usize, EditError> {
		let position = self.check_growth(bytes.len())?;
		self.code.code.extend_from_slice(bytes);
		Ok(position)
	}

	pub fn append_gap(&mut self, length: usize) -> Result<usize, EditError> {
		let position = self.check_growth(length)?;
		self.code.code.resize(position + length, opcode::NOP);
		Ok(position)
	}

	fn shifted(&self, table: &[ExceptionEntry], offset: usize) -> Result<Vec<ExceptionEntry>, EditError> {
		let code_length = self.code_length();
		let shift = |pc: u16| {
			let position = pc as usize + offset;
			if position > code_length {
				Err(EditError::OutOfBounds { position, length: code_length })
			} else {
				Ok(position as u16)
			}
		};
		table.iter()
			.map(|entry| Ok::<_, EditError>(ExceptionEntry {
				start_pc: shift(entry.start_pc)?,
				end_pc: shift(entry.end_pc)?,
				handler_pc: shift(entry.handler_pc)?,
				catch_type: entry.catch_type,
			}))
			.collect()
	}

	/// Puts the entries in front of the exception table, moving their positions by `offset`. Use this for the
	/// exception table of code inserted at `offset`.
	pub fn insert_exception_entries(&mut self, table: &[ExceptionEntry], offset: usize) -> Result<(), EditError> {
		let entries = self.shifted(table, offset)?;
		self.code.exception_table.splice(0..0, entries);
		Ok(())
	}

	pub fn append_exception_entries(&mut self, table: &[ExceptionEntry], offset: usize) -> Result<(), EditError> {
		let entries = self.shifted(table, offset)?;
		self.code.exception_table.extend(entries);
		Ok(())
	}

	/// Moves the cursor behind the first call of a constructor that isn't the construction of a new object, and
	/// returns the position of that `invokespecial`. In a constructor, this is the call to `super(..)` or `this(..)`.
	///
	/// Returns [`None`] and moves the cursor to the start if there's no such call.
	pub fn skip_constructor(&mut self, pool: &ConstPool) -> Result<Option<usize>, EditError> {
		self.skip_constructor_call(pool, |_| true)
	}

	/// Like [`CodeEditor::skip_constructor`], but only finds a call to a constructor of the super class.
	///
	/// The first such call must be the `super(..)` call, if it's a `this(..)` call [`None`] is returned.
	pub fn skip_super_constructor(&mut self, pool: &ConstPool, this_class: &str) -> Result<Option<usize>, EditError> {
		self.skip_constructor_call(pool, |class| class != this_class)
	}

	/// Like [`CodeEditor::skip_constructor`], but only finds a `this(..)` call.
	pub fn skip_this_constructor(&mut self, pool: &ConstPool, this_class: &str) -> Result<Option<usize>, EditError> {
		self.skip_constructor_call(pool, |class| class == this_class)
	}

	fn skip_constructor_call(&mut self, pool: &ConstPool, accept: impl Fn(&str) -> bool) -> Result<Option<usize>, EditError> {
		self.begin();
		// objects created by `new` that are not yet initialized
		let mut created = 0usize;
		while self.has_next() {
			let position = self.next()?;
			match self.code.code[position] {
				opcode::NEW => created += 1,
				opcode::INVOKESPECIAL => {
					let method = get_u16_at(&self.code.code, position + 1);
					if pool.get_member_name(method)? != "<init>" {
						continue;
					}
					if created > 0 {
						created -= 1;
						continue;
					}
					if accept(&pool.get_member_class_name(method)?) {
						return Ok(Some(position));
					}
					break;
				},
				_ => {},
			}
		}
		self.begin();
		Ok(None)
	}
}
