//! The `LineNumberTable`, `LocalVariableTable` and `LocalVariableTypeTable` attributes.

use crate::class_map::ClassMap;
use crate::codec::{ByteReader, ClassWrite};
use crate::descriptor;
use crate::error::{DecodeError, EncodeError, PoolError};
use crate::pool::ConstPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
	pub start_pc: u16,
	pub line_number: u16,
}

impl LineNumber {
	fn read(reader: &mut ByteReader) -> Result<LineNumber, DecodeError> {
		Ok(LineNumber {
			start_pc: reader.read_u16()?,
			line_number: reader.read_u16()?,
		})
	}
}

pub(crate) fn read_line_numbers(reader: &mut ByteReader) -> Result<Vec<LineNumber>, DecodeError> {
	reader.read_vec(|r| r.read_u16_as_usize(), LineNumber::read)
}

pub(crate) fn write_line_numbers(table: &[LineNumber], writer: &mut Vec<u8>) -> Result<(), EncodeError> {
	writer.write_slice(table, |w, size| w.write_usize_as_u16(size, "line number table"), |w, line| {
		w.write_u16(line.start_pc);
		w.write_u16(line.line_number);
		Ok(())
	})
}

/// The source line of the instruction at `pc`: the line of the entry with the largest start at or before `pc`.
pub fn line_at(table: &[LineNumber], pc: u16) -> Option<u16> {
	table.iter()
		.filter(|line| line.start_pc <= pc)
		.max_by_key(|line| line.start_pc)
		.map(|line| line.line_number)
}

/// The first position belonging to `line`, or to the nearest line after it if there's no entry for `line` itself.
pub fn pc_of_line(table: &[LineNumber], line: u16) -> Option<u16> {
	table.iter()
		.filter(|entry| entry.line_number >= line)
		.min_by_key(|entry| (entry.line_number, entry.start_pc))
		.map(|entry| entry.start_pc)
}

/// An entry of a `LocalVariableTable` or `LocalVariableTypeTable`. In the latter, `descriptor_index` points to a
/// generic signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariable {
	pub start_pc: u16,
	pub length: u16,
	pub name_index: u16,
	pub descriptor_index: u16,
	pub index: u16,
}

impl LocalVariable {
	fn read(reader: &mut ByteReader) -> Result<LocalVariable, DecodeError> {
		Ok(LocalVariable {
			start_pc: reader.read_u16()?,
			length: reader.read_u16()?,
			name_index: reader.read_u16()?,
			descriptor_index: reader.read_u16()?,
			index: reader.read_u16()?,
		})
	}
}

pub(crate) fn read_local_variables(reader: &mut ByteReader) -> Result<Vec<LocalVariable>, DecodeError> {
	reader.read_vec(|r| r.read_u16_as_usize(), LocalVariable::read)
}

pub(crate) fn write_local_variables(table: &[LocalVariable], writer: &mut Vec<u8>) -> Result<(), EncodeError> {
	writer.write_slice(table, |w, size| w.write_usize_as_u16(size, "local variable table"), |w, local| {
		w.write_u16(local.start_pc);
		w.write_u16(local.length);
		w.write_u16(local.name_index);
		w.write_u16(local.descriptor_index);
		w.write_u16(local.index);
		Ok(())
	})
}

/// Copies a local variable table. With `generic` set, the types are signatures instead of descriptors.
pub(crate) fn copy_local_variables(
	table: &[LocalVariable],
	generic: bool,
	src: &ConstPool,
	dest: &mut ConstPool,
	map: &ClassMap,
) -> Result<Vec<LocalVariable>, PoolError> {
	table.iter()
		.map(|local| Ok::<_, PoolError>(LocalVariable {
			name_index: src.copy(local.name_index, dest, map)?,
			descriptor_index: src.copy_renamed(local.descriptor_index, dest, |d| rename_type(d, generic, map))?,
			..*local
		}))
		.collect()
}

pub(crate) fn rename_local_variables(table: &mut [LocalVariable], generic: bool, pool: &mut ConstPool, map: &ClassMap) -> Result<(), PoolError> {
	for local in table {
		if let Some(index) = pool.renamed_utf8(local.descriptor_index, |d| rename_type(d, generic, map))? {
			local.descriptor_index = index;
		}
	}
	Ok(())
}

fn rename_type(string: &str, generic: bool, map: &ClassMap) -> Option<String> {
	if generic {
		descriptor::rename_signature(string, map)
	} else {
		descriptor::rename_descriptor(string, map)
	}
}
