//! Fields and methods.

use crate::attribute::{self, Attribute, AttributeKind};
use crate::attribute::code::CodeAttribute;
use crate::class_map::ClassMap;
use crate::codec::{ByteReader, ClassWrite};
use crate::descriptor;
use crate::error::{DecodeError, EncodeError, PoolError, Result};
use crate::pool::ConstPool;

/// A field or a method. Both have the same layout in a class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
	pub access_flags: u16,
	pub name_index: u16,
	pub descriptor_index: u16,
	pub attributes: Vec<Attribute>,
}

pub type FieldInfo = MemberInfo;
pub type MethodInfo = MemberInfo;

impl MemberInfo {
	pub fn new(pool: &mut ConstPool, access_flags: u16, name: &str, descriptor: &str) -> Result<MemberInfo, PoolError> {
		Ok(MemberInfo {
			access_flags,
			name_index: pool.add_utf8(name)?,
			descriptor_index: pool.add_utf8(descriptor)?,
			attributes: Vec::new(),
		})
	}

	pub fn name(&self, pool: &ConstPool) -> Result<String, PoolError> {
		pool.get_utf8(self.name_index)
	}

	pub fn descriptor(&self, pool: &ConstPool) -> Result<String, PoolError> {
		pool.get_utf8(self.descriptor_index)
	}

	/// If this member has the given name and descriptor.
	pub fn is(&self, pool: &ConstPool, name: &str, descriptor: &str) -> bool {
		self.name(pool).is_ok_and(|n| n == name) && self.descriptor(pool).is_ok_and(|d| d == descriptor)
	}

	pub fn is_constructor(&self, pool: &ConstPool) -> bool {
		self.name(pool).is_ok_and(|n| n == "<init>")
	}

	pub fn code(&self) -> Option<&CodeAttribute> {
		self.attributes.iter().find_map(|attribute| match &attribute.kind {
			AttributeKind::Code(code) => Some(code),
			_ => None,
		})
	}

	pub fn code_mut(&mut self) -> Option<&mut CodeAttribute> {
		self.attributes.iter_mut().find_map(|attribute| match &mut attribute.kind {
			AttributeKind::Code(code) => Some(code),
			_ => None,
		})
	}

	/// Replaces the code of this method, or adds it if there's none.
	pub fn set_code(&mut self, pool: &mut ConstPool, code: CodeAttribute) -> Result<(), PoolError> {
		match self.code_mut() {
			Some(existing) => *existing = code,
			None => self.attributes.push(Attribute::new(pool, crate::class_constants::attribute::CODE, AttributeKind::Code(code))?),
		}
		Ok(())
	}

	pub fn attribute(&self, pool: &ConstPool, attribute_name: &str) -> Option<&Attribute> {
		attribute::find(&self.attributes, pool, attribute_name)
	}

	pub fn remove_attribute(&mut self, pool: &ConstPool, attribute_name: &str) -> Option<Attribute> {
		attribute::remove(&mut self.attributes, pool, attribute_name)
	}

	pub(crate) fn read(reader: &mut ByteReader, pool: &ConstPool) -> Result<MemberInfo, DecodeError> {
		Ok(MemberInfo {
			access_flags: reader.read_u16()?,
			name_index: reader.read_u16()?,
			descriptor_index: reader.read_u16()?,
			attributes: attribute::read_attributes(reader, pool)?,
		})
	}

	pub(crate) fn write(&self, writer: &mut Vec<u8>) -> Result<(), EncodeError> {
		writer.write_u16(self.access_flags);
		writer.write_u16(self.name_index);
		writer.write_u16(self.descriptor_index);
		attribute::write_attributes(&self.attributes, writer)
	}

	/// Copies this member into the pool `dest`, renaming the classes of `map` in its descriptor and attributes.
	pub fn copy(&self, src: &ConstPool, dest: &mut ConstPool, map: &ClassMap) -> Result<MemberInfo> {
		Ok(MemberInfo {
			access_flags: self.access_flags,
			name_index: dest.add_utf8_bytes(src.get_utf8_bytes(self.name_index)?.to_vec())?,
			descriptor_index: src.copy_renamed(self.descriptor_index, dest, |d| descriptor::rename_descriptor(d, map))?,
			attributes: attribute::copy_attributes(&self.attributes, src, dest, map)?,
		})
	}

	pub(crate) fn rename_classes(&mut self, pool: &mut ConstPool, map: &ClassMap) -> Result<(), PoolError> {
		if let Some(renamed) = pool.renamed_utf8(self.descriptor_index, |d| descriptor::rename_descriptor(d, map))? {
			self.descriptor_index = renamed;
		}
		attribute::rename_attributes(&mut self.attributes, pool, map)
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::attribute::code::CodeAttribute;
	use crate::bytecode::opcode;
	use crate::class_constants::access;
	use crate::class_map::ClassMap;
	use crate::codec::ByteReader;
	use crate::member::MemberInfo;
	use crate::pool::ConstPool;

	#[test]
	fn read_write() -> anyhow::Result<()> {
		let mut pool = ConstPool::new();
		let mut method = MemberInfo::new(&mut pool, access::PUBLIC | access::STATIC, "run", "()V")?;
		method.set_code(&mut pool, CodeAttribute::new(0, 0, vec![opcode::RETURN]))?;

		let mut bytes = Vec::new();
		method.write(&mut bytes)?;
		let read = MemberInfo::read(&mut ByteReader::new(&bytes), &pool)?;
		assert_eq!(read, method);
		assert!(read.is(&pool, "run", "()V"));
		assert_eq!(read.code().map(|code| code.code.clone()), Some(vec![opcode::RETURN]));
		Ok(())
	}

	#[test]
	fn copy_renames_descriptor() -> anyhow::Result<()> {
		let mut src = ConstPool::new();
		let field = MemberInfo::new(&mut src, access::PRIVATE, "list", "La/B;")?;

		let mut dest = ConstPool::new();
		let copy = field.copy(&src, &mut dest, &ClassMap::single("a.B", "a.C"))?;
		assert_eq!(copy.name(&dest)?, "list");
		assert_eq!(copy.descriptor(&dest)?, "La/C;");
		assert_eq!(field.descriptor(&src)?, "La/B;");

		let mut renamed = field.clone();
		renamed.rename_classes(&mut src, &ClassMap::single("a.B", "x.Y"))?;
		assert_eq!(renamed.descriptor(&src)?, "Lx/Y;");
		Ok(())
	}
}
