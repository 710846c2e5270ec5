//! The `Code` attribute.

use log::trace;
use crate::attribute::{self, Attribute, AttributeKind};
use crate::attribute::debug::{self, LineNumber, LocalVariable};
use crate::attribute::simple;
use crate::attribute::stack_map::StackMapFrame;
use crate::bytecode;
use crate::bytecode::editor::CodeEditor;
use crate::bytecode::relocate;
use crate::bytecode::stack;
use crate::class_map::ClassMap;
use crate::codec::{ByteReader, ClassWrite};
use crate::error::{DecodeError, EncodeError, PoolError, Result, VerifyError};
use crate::pool::ConstPool;

/// A range of code protected by an exception handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEntry {
	pub start_pc: u16,
	/// Exclusive.
	pub end_pc: u16,
	pub handler_pc: u16,
	/// The class entry of the caught exception, `0` catches everything.
	pub catch_type: u16,
}

/// The body of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
	pub max_stack: u16,
	pub max_locals: u16,
	pub code: Vec<u8>,
	pub exception_table: Vec<ExceptionEntry>,
	/// Usually the `LineNumberTable`, `LocalVariableTable`, `LocalVariableTypeTable` and `StackMapTable`.
	pub attributes: Vec<Attribute>,
}

impl CodeAttribute {
	pub fn new(max_stack: u16, max_locals: u16, code: Vec<u8>) -> CodeAttribute {
		CodeAttribute {
			max_stack,
			max_locals,
			code,
			exception_table: Vec::new(),
			attributes: Vec::new(),
		}
	}

	pub fn code_length(&self) -> usize {
		self.code.len()
	}

	/// Starts editing the instructions. The editor keeps all positions in this attribute up to date.
	pub fn editor(&mut self) -> CodeEditor<'_> {
		CodeEditor::new(self)
	}

	/// Computes the maximum depth of the operand stack, and stores it in [`CodeAttribute::max_stack`].
	pub fn compute_max_stack(&mut self, pool: &ConstPool) -> Result<u16, VerifyError> {
		let max_stack = stack::compute_max_stack(self, pool)?;
		self.max_stack = max_stack;
		Ok(max_stack)
	}

	pub fn line_numbers(&self) -> Option<&[LineNumber]> {
		self.attributes.iter().find_map(|attribute| match &attribute.kind {
			AttributeKind::LineNumberTable(table) => Some(table.as_slice()),
			_ => None,
		})
	}

	pub fn local_variables(&self) -> Option<&[LocalVariable]> {
		self.attributes.iter().find_map(|attribute| match &attribute.kind {
			AttributeKind::LocalVariableTable(table) => Some(table.as_slice()),
			_ => None,
		})
	}

	pub fn stack_map(&self) -> Option<&[StackMapFrame]> {
		self.attributes.iter().find_map(|attribute| match &attribute.kind {
			AttributeKind::StackMapTable(frames) => Some(frames.as_slice()),
			_ => None,
		})
	}

	/// The source line of the instruction at `pc`, if there's a line number table.
	pub fn line_at(&self, pc: u16) -> Option<u16> {
		debug::line_at(self.line_numbers()?, pc)
	}

	pub(crate) fn read(reader: &mut ByteReader, pool: &ConstPool) -> Result<CodeAttribute, DecodeError> {
		let max_stack = reader.read_u16()?;
		let max_locals = reader.read_u16()?;
		let code_length = reader.read_u32_as_usize()?;
		let code = reader.read_bytes(code_length)?.to_vec();
		let exception_table = reader.read_vec(|r| r.read_u16_as_usize(), |r| Ok(ExceptionEntry {
			start_pc: r.read_u16()?,
			end_pc: r.read_u16()?,
			handler_pc: r.read_u16()?,
			catch_type: r.read_u16()?,
		}))?;
		let attributes = attribute::read_attributes(reader, pool)?;

		Ok(CodeAttribute { max_stack, max_locals, code, exception_table, attributes })
	}

	pub(crate) fn write(&self, writer: &mut Vec<u8>) -> Result<(), EncodeError> {
		writer.write_u16(self.max_stack);
		writer.write_u16(self.max_locals);
		writer.write_usize_as_u32(self.code.len(), "code")?;
		writer.write_u8_slice(&self.code);
		writer.write_slice(&self.exception_table, |w, size| w.write_usize_as_u16(size, "exception table"), |w, entry| {
			w.write_u16(entry.start_pc);
			w.write_u16(entry.end_pc);
			w.write_u16(entry.handler_pc);
			w.write_u16(entry.catch_type);
			Ok(())
		})?;
		attribute::write_attributes(&self.attributes, writer)
	}

	/// Copies this code body so that all its indices point into `dest`, including those inside the instructions.
	///
	/// An `ldc` whose constant gets an index above 255 in `dest` is turned into an `ldc_w`, moving the following code.
	pub fn copy(&self, src: &ConstPool, dest: &mut ConstPool, map: &ClassMap) -> Result<CodeAttribute> {
		let copied = bytecode::copy_code(&self.code, src, dest, map)?;

		let exception_table = self.exception_table.iter()
			.map(|entry| Ok::<_, PoolError>(ExceptionEntry {
				catch_type: simple::copy_optional(entry.catch_type, src, dest, map)?,
				..*entry
			}))
			.collect::<Result<_, _>>()?;

		let mut code = CodeAttribute {
			max_stack: self.max_stack,
			max_locals: self.max_locals,
			code: copied.code,
			exception_table,
			attributes: attribute::copy_attributes(&self.attributes, src, dest, map)?,
		};

		if !copied.wide_ldc.is_empty() {
			trace!("widening {} ldc instructions of the copied code", copied.wide_ldc.len());
			let relocated = relocate::widen_ldc(&code.code, &copied.wide_ldc)?;
			relocate::apply(&mut code, relocated)?;
		}

		Ok(code)
	}

	pub(crate) fn rename_classes(&mut self, pool: &mut ConstPool, map: &ClassMap) -> Result<(), PoolError> {
		attribute::rename_attributes(&mut self.attributes, pool, map)
	}
}
