//! The table entries of `InnerClasses`, `BootstrapMethods` and `MethodParameters`.

use crate::class_map::ClassMap;
use crate::codec::{ByteReader, ClassWrite};
use crate::error::{DecodeError, EncodeError, PoolError};
use crate::pool::ConstPool;

/// Copies an index that may be `0` for "absent".
pub(crate) fn copy_optional(index: u16, src: &ConstPool, dest: &mut ConstPool, map: &ClassMap) -> Result<u16, PoolError> {
	if index == 0 {
		Ok(0)
	} else {
		src.copy(index, dest, map)
	}
}

pub(crate) fn copy_indices(indices: &[u16], src: &ConstPool, dest: &mut ConstPool, map: &ClassMap) -> Result<Vec<u16>, PoolError> {
	indices.iter().map(|&index| src.copy(index, dest, map)).collect()
}

pub(crate) fn read_indices(reader: &mut ByteReader) -> Result<Vec<u16>, DecodeError> {
	reader.read_vec(|r| r.read_u16_as_usize(), |r| r.read_u16())
}

pub(crate) fn write_indices(indices: &[u16], writer: &mut Vec<u8>, what: &'static str) -> Result<(), EncodeError> {
	writer.write_slice(indices, |w, size| w.write_usize_as_u16(size, what), |w, &index| {
		w.write_u16(index);
		Ok(())
	})
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerClass {
	pub inner_class_info_index: u16,
	/// `0` for local and anonymous classes.
	pub outer_class_info_index: u16,
	/// `0` for anonymous classes.
	pub inner_name_index: u16,
	pub inner_class_access_flags: u16,
}

impl InnerClass {
	pub(crate) fn read_table(reader: &mut ByteReader) -> Result<Vec<InnerClass>, DecodeError> {
		reader.read_vec(|r| r.read_u16_as_usize(), |r| Ok(InnerClass {
			inner_class_info_index: r.read_u16()?,
			outer_class_info_index: r.read_u16()?,
			inner_name_index: r.read_u16()?,
			inner_class_access_flags: r.read_u16()?,
		}))
	}

	pub(crate) fn write_table(table: &[InnerClass], writer: &mut Vec<u8>) -> Result<(), EncodeError> {
		writer.write_slice(table, |w, size| w.write_usize_as_u16(size, "inner classes"), |w, inner| {
			w.write_u16(inner.inner_class_info_index);
			w.write_u16(inner.outer_class_info_index);
			w.write_u16(inner.inner_name_index);
			w.write_u16(inner.inner_class_access_flags);
			Ok(())
		})
	}

	pub(crate) fn copy(&self, src: &ConstPool, dest: &mut ConstPool, map: &ClassMap) -> Result<InnerClass, PoolError> {
		Ok(InnerClass {
			inner_class_info_index: src.copy(self.inner_class_info_index, dest, map)?,
			outer_class_info_index: copy_optional(self.outer_class_info_index, src, dest, map)?,
			inner_name_index: copy_optional(self.inner_name_index, src, dest, map)?,
			inner_class_access_flags: self.inner_class_access_flags,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapMethod {
	/// A method handle.
	pub bootstrap_method_ref: u16,
	pub bootstrap_arguments: Vec<u16>,
}

impl BootstrapMethod {
	pub(crate) fn read_table(reader: &mut ByteReader) -> Result<Vec<BootstrapMethod>, DecodeError> {
		reader.read_vec(|r| r.read_u16_as_usize(), |r| Ok(BootstrapMethod {
			bootstrap_method_ref: r.read_u16()?,
			bootstrap_arguments: read_indices(r)?,
		}))
	}

	pub(crate) fn write_table(table: &[BootstrapMethod], writer: &mut Vec<u8>) -> Result<(), EncodeError> {
		writer.write_slice(table, |w, size| w.write_usize_as_u16(size, "bootstrap methods"), |w, method| {
			w.write_u16(method.bootstrap_method_ref);
			write_indices(&method.bootstrap_arguments, w, "bootstrap arguments")
		})
	}

	pub(crate) fn copy(&self, src: &ConstPool, dest: &mut ConstPool, map: &ClassMap) -> Result<BootstrapMethod, PoolError> {
		Ok(BootstrapMethod {
			bootstrap_method_ref: src.copy(self.bootstrap_method_ref, dest, map)?,
			bootstrap_arguments: copy_indices(&self.bootstrap_arguments, src, dest, map)?,
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodParameter {
	/// `0` if the parameter has no name.
	pub name_index: u16,
	pub access_flags: u16,
}

impl MethodParameter {
	pub(crate) fn read_table(reader: &mut ByteReader) -> Result<Vec<MethodParameter>, DecodeError> {
		reader.read_vec(|r| r.read_u8_as_usize(), |r| Ok(MethodParameter {
			name_index: r.read_u16()?,
			access_flags: r.read_u16()?,
		}))
	}

	pub(crate) fn write_table(table: &[MethodParameter], writer: &mut Vec<u8>) -> Result<(), EncodeError> {
		writer.write_slice(table, |w, size| w.write_usize_as_u8(size, "method parameters"), |w, parameter| {
			w.write_u16(parameter.name_index);
			w.write_u16(parameter.access_flags);
			Ok(())
		})
	}

	pub(crate) fn copy(&self, src: &ConstPool, dest: &mut ConstPool, map: &ClassMap) -> Result<MethodParameter, PoolError> {
		Ok(MethodParameter {
			name_index: copy_optional(self.name_index, src, dest, map)?,
			access_flags: self.access_flags,
		})
	}
}
