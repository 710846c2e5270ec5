//! Attributes of classes, fields, methods and code bodies.
//!
//! An attribute is decoded by looking up its name in a static registry. Attributes with a name not in there are kept
//! as [`AttributeKind::Unknown`] and written back unchanged.

use log::debug;
use crate::class_constants::attribute as name;
use crate::class_map::ClassMap;
use crate::codec::{ByteReader, ClassWrite};
use crate::descriptor;
use crate::error::{DecodeError, EncodeError, PoolError, Result};
use crate::pool::ConstPool;

pub mod annotation;
pub mod code;
pub mod debug;
pub mod simple;
pub mod stack_map;

use annotation::{AnnotationDefault, Annotations, ParameterAnnotations};
use code::CodeAttribute;
use self::debug::{LineNumber, LocalVariable};
use simple::{BootstrapMethod, InnerClass, MethodParameter};
use stack_map::StackMapFrame;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
	pub name_index: u16,
	pub kind: AttributeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeKind {
	Code(CodeAttribute),
	ConstantValue(u16),
	/// The class entries of the checked exceptions a method declares.
	Exceptions(Vec<u16>),
	LineNumberTable(Vec<LineNumber>),
	LocalVariableTable(Vec<LocalVariable>),
	LocalVariableTypeTable(Vec<LocalVariable>),
	StackMapTable(Vec<StackMapFrame>),
	Signature(u16),
	SourceFile(u16),
	InnerClasses(Vec<InnerClass>),
	/// `method_index` is `0` if the class isn't enclosed by a method.
	EnclosingMethod { class_index: u16, method_index: u16 },
	NestHost(u16),
	NestMembers(Vec<u16>),
	PermittedSubclasses(Vec<u16>),
	BootstrapMethods(Vec<BootstrapMethod>),
	MethodParameters(Vec<MethodParameter>),
	Synthetic,
	Deprecated,
	RuntimeVisibleAnnotations(Annotations),
	RuntimeInvisibleAnnotations(Annotations),
	RuntimeVisibleParameterAnnotations(ParameterAnnotations),
	RuntimeInvisibleParameterAnnotations(ParameterAnnotations),
	AnnotationDefault(AnnotationDefault),
	/// The payload of an attribute with a name not in the registry.
	Unknown(Vec<u8>),
}

pub(crate) type Decoder = fn(&mut ByteReader, &ConstPool) -> Result<AttributeKind, DecodeError>;

static REGISTRY: [(&str, Decoder); 23] = [
	(name::CODE, decode_code),
	(name::CONSTANT_VALUE, decode_constant_value),
	(name::EXCEPTIONS, decode_exceptions),
	(name::LINE_NUMBER_TABLE, decode_line_number_table),
	(name::LOCAL_VARIABLE_TABLE, decode_local_variable_table),
	(name::LOCAL_VARIABLE_TYPE_TABLE, decode_local_variable_type_table),
	(name::STACK_MAP_TABLE, decode_stack_map_table),
	(name::SIGNATURE, decode_signature),
	(name::SOURCE_FILE, decode_source_file),
	(name::INNER_CLASSES, decode_inner_classes),
	(name::ENCLOSING_METHOD, decode_enclosing_method),
	(name::NEST_HOST, decode_nest_host),
	(name::NEST_MEMBERS, decode_nest_members),
	(name::PERMITTED_SUBCLASSES, decode_permitted_subclasses),
	(name::BOOTSTRAP_METHODS, decode_bootstrap_methods),
	(name::METHOD_PARAMETERS, decode_method_parameters),
	(name::SYNTHETIC, decode_synthetic),
	(name::DEPRECATED, decode_deprecated),
	(name::RUNTIME_VISIBLE_ANNOTATIONS, decode_runtime_visible_annotations),
	(name::RUNTIME_INVISIBLE_ANNOTATIONS, decode_runtime_invisible_annotations),
	(name::RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS, decode_runtime_visible_parameter_annotations),
	(name::RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS, decode_runtime_invisible_parameter_annotations),
	(name::ANNOTATION_DEFAULT, decode_annotation_default),
];

/// The table from attribute names to their decoders.
pub(crate) fn registry() -> &'static [(&'static str, Decoder)] {
	&REGISTRY
}

fn decoder(attribute_name: &str) -> Option<Decoder> {
	registry().iter()
		.find(|(registered, _)| *registered == attribute_name)
		.map(|&(_, decoder)| decoder)
}

/// If attributes with this name are decoded into a structured [`AttributeKind`].
pub fn is_registered(attribute_name: &str) -> bool {
	decoder(attribute_name).is_some()
}

fn decode_code(r: &mut ByteReader, pool: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::Code(CodeAttribute::read(r, pool)?))
}
fn decode_constant_value(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::ConstantValue(r.read_u16()?))
}
fn decode_exceptions(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::Exceptions(simple::read_indices(r)?))
}
fn decode_line_number_table(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::LineNumberTable(debug::read_line_numbers(r)?))
}
fn decode_local_variable_table(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::LocalVariableTable(debug::read_local_variables(r)?))
}
fn decode_local_variable_type_table(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::LocalVariableTypeTable(debug::read_local_variables(r)?))
}
fn decode_stack_map_table(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::StackMapTable(stack_map::read(r)?))
}
fn decode_signature(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::Signature(r.read_u16()?))
}
fn decode_source_file(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::SourceFile(r.read_u16()?))
}
fn decode_inner_classes(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::InnerClasses(InnerClass::read_table(r)?))
}
fn decode_enclosing_method(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::EnclosingMethod { class_index: r.read_u16()?, method_index: r.read_u16()? })
}
fn decode_nest_host(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::NestHost(r.read_u16()?))
}
fn decode_nest_members(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::NestMembers(simple::read_indices(r)?))
}
fn decode_permitted_subclasses(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::PermittedSubclasses(simple::read_indices(r)?))
}
fn decode_bootstrap_methods(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::BootstrapMethods(BootstrapMethod::read_table(r)?))
}
fn decode_method_parameters(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::MethodParameters(MethodParameter::read_table(r)?))
}
fn decode_synthetic(_: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::Synthetic)
}
fn decode_deprecated(_: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::Deprecated)
}
fn decode_runtime_visible_annotations(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::RuntimeVisibleAnnotations(Annotations::read(r)?))
}
fn decode_runtime_invisible_annotations(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::RuntimeInvisibleAnnotations(Annotations::read(r)?))
}
fn decode_runtime_visible_parameter_annotations(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::RuntimeVisibleParameterAnnotations(ParameterAnnotations::read(r)?))
}
fn decode_runtime_invisible_parameter_annotations(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::RuntimeInvisibleParameterAnnotations(ParameterAnnotations::read(r)?))
}
fn decode_annotation_default(r: &mut ByteReader, _: &ConstPool) -> Result<AttributeKind, DecodeError> {
	Ok(AttributeKind::AnnotationDefault(AnnotationDefault::read(r)?))
}

impl Attribute {
	/// Creates an attribute, adding its name to the pool.
	pub fn new(pool: &mut ConstPool, attribute_name: &str, kind: AttributeKind) -> Result<Attribute, PoolError> {
		Ok(Attribute {
			name_index: pool.add_utf8(attribute_name)?,
			kind,
		})
	}

	pub fn name(&self, pool: &ConstPool) -> Result<String, PoolError> {
		pool.get_utf8(self.name_index)
	}

	/// If this attribute has the given name.
	pub fn is(&self, pool: &ConstPool, attribute_name: &str) -> bool {
		self.name(pool).is_ok_and(|n| n == attribute_name)
	}

	pub(crate) fn read(reader: &mut ByteReader, pool: &ConstPool) -> Result<Attribute, DecodeError> {
		let offset = reader.offset();
		let name_index = reader.read_u16()?;
		let attribute_name = pool.get_utf8(name_index).map_err(|e| DecodeError::new(offset, e.into()))?;
		let length = reader.read_u32_as_usize()?;
		let mut payload = reader.sub_reader(length)?;

		let kind = match decoder(&attribute_name) {
			Some(decode) => {
				let kind = decode(&mut payload, pool)?;
				payload.expect_end(&attribute_name)?;
				kind
			},
			None => {
				debug!("keeping unknown attribute {attribute_name:?} of {length} bytes");
				AttributeKind::Unknown(payload.read_bytes(length)?.to_vec())
			},
		};

		Ok(Attribute { name_index, kind })
	}

	pub(crate) fn write(&self, writer: &mut Vec<u8>) -> Result<(), EncodeError> {
		writer.write_u16(self.name_index);

		let mut payload = Vec::new();
		match &self.kind {
			AttributeKind::Code(code) => code.write(&mut payload)?,
			AttributeKind::ConstantValue(index) |
			AttributeKind::Signature(index) |
			AttributeKind::SourceFile(index) |
			AttributeKind::NestHost(index) => payload.write_u16(*index),
			AttributeKind::Exceptions(indices) => simple::write_indices(indices, &mut payload, "exceptions")?,
			AttributeKind::LineNumberTable(table) => debug::write_line_numbers(table, &mut payload)?,
			AttributeKind::LocalVariableTable(table) |
			AttributeKind::LocalVariableTypeTable(table) => debug::write_local_variables(table, &mut payload)?,
			AttributeKind::StackMapTable(frames) => stack_map::write(frames, &mut payload)?,
			AttributeKind::InnerClasses(table) => InnerClass::write_table(table, &mut payload)?,
			AttributeKind::EnclosingMethod { class_index, method_index } => {
				payload.write_u16(*class_index);
				payload.write_u16(*method_index);
			},
			AttributeKind::NestMembers(indices) => simple::write_indices(indices, &mut payload, "nest members")?,
			AttributeKind::PermittedSubclasses(indices) => simple::write_indices(indices, &mut payload, "permitted subclasses")?,
			AttributeKind::BootstrapMethods(table) => BootstrapMethod::write_table(table, &mut payload)?,
			AttributeKind::MethodParameters(table) => MethodParameter::write_table(table, &mut payload)?,
			AttributeKind::Synthetic | AttributeKind::Deprecated => {},
			AttributeKind::RuntimeVisibleAnnotations(annotations) |
			AttributeKind::RuntimeInvisibleAnnotations(annotations) => annotations.write(&mut payload)?,
			AttributeKind::RuntimeVisibleParameterAnnotations(annotations) |
			AttributeKind::RuntimeInvisibleParameterAnnotations(annotations) => annotations.write(&mut payload)?,
			AttributeKind::AnnotationDefault(default) => default.write(&mut payload)?,
			AttributeKind::Unknown(bytes) => payload.write_u8_slice(bytes),
		}

		writer.write_usize_as_u32(payload.len(), "attribute")?;
		writer.write_u8_slice(&payload);
		Ok(())
	}

	/// Copies this attribute so that all its indices point into `dest`, renaming the classes of `map` on the way.
	///
	/// The payload of unknown attributes is copied as is, since it's not known which parts of it are indices.
	pub fn copy(&self, src: &ConstPool, dest: &mut ConstPool, map: &ClassMap) -> Result<Attribute> {
		let name_index = dest.add_utf8_bytes(src.get_utf8_bytes(self.name_index)?.to_vec())?;

		let kind = match &self.kind {
			AttributeKind::Code(code) => AttributeKind::Code(code.copy(src, dest, map)?),
			AttributeKind::ConstantValue(index) => AttributeKind::ConstantValue(src.copy(*index, dest, map)?),
			AttributeKind::Exceptions(indices) => AttributeKind::Exceptions(simple::copy_indices(indices, src, dest, map)?),
			AttributeKind::LineNumberTable(table) => AttributeKind::LineNumberTable(table.clone()),
			AttributeKind::LocalVariableTable(table) => {
				AttributeKind::LocalVariableTable(debug::copy_local_variables(table, false, src, dest, map)?)
			},
			AttributeKind::LocalVariableTypeTable(table) => {
				AttributeKind::LocalVariableTypeTable(debug::copy_local_variables(table, true, src, dest, map)?)
			},
			AttributeKind::StackMapTable(frames) => AttributeKind::StackMapTable(stack_map::copy(frames, src, dest, map)?),
			AttributeKind::Signature(index) => {
				AttributeKind::Signature(src.copy_renamed(*index, dest, |s| descriptor::rename_signature(s, map))?)
			},
			AttributeKind::SourceFile(index) => AttributeKind::SourceFile(src.copy(*index, dest, map)?),
			AttributeKind::InnerClasses(table) => AttributeKind::InnerClasses(
				table.iter().map(|inner| inner.copy(src, dest, map)).collect::<Result<_, _>>()?
			),
			AttributeKind::EnclosingMethod { class_index, method_index } => AttributeKind::EnclosingMethod {
				class_index: src.copy(*class_index, dest, map)?,
				method_index: simple::copy_optional(*method_index, src, dest, map)?,
			},
			AttributeKind::NestHost(index) => AttributeKind::NestHost(src.copy(*index, dest, map)?),
			AttributeKind::NestMembers(indices) => AttributeKind::NestMembers(simple::copy_indices(indices, src, dest, map)?),
			AttributeKind::PermittedSubclasses(indices) => {
				AttributeKind::PermittedSubclasses(simple::copy_indices(indices, src, dest, map)?)
			},
			AttributeKind::BootstrapMethods(table) => AttributeKind::BootstrapMethods(
				table.iter().map(|method| method.copy(src, dest, map)).collect::<Result<_, _>>()?
			),
			AttributeKind::MethodParameters(table) => AttributeKind::MethodParameters(
				table.iter().map(|parameter| parameter.copy(src, dest, map)).collect::<Result<_, _>>()?
			),
			AttributeKind::Synthetic => AttributeKind::Synthetic,
			AttributeKind::Deprecated => AttributeKind::Deprecated,
			AttributeKind::RuntimeVisibleAnnotations(annotations) => {
				AttributeKind::RuntimeVisibleAnnotations(annotations.copy(src, dest, map)?)
			},
			AttributeKind::RuntimeInvisibleAnnotations(annotations) => {
				AttributeKind::RuntimeInvisibleAnnotations(annotations.copy(src, dest, map)?)
			},
			AttributeKind::RuntimeVisibleParameterAnnotations(annotations) => {
				AttributeKind::RuntimeVisibleParameterAnnotations(annotations.copy(src, dest, map)?)
			},
			AttributeKind::RuntimeInvisibleParameterAnnotations(annotations) => {
				AttributeKind::RuntimeInvisibleParameterAnnotations(annotations.copy(src, dest, map)?)
			},
			AttributeKind::AnnotationDefault(default) => AttributeKind::AnnotationDefault(default.copy(src, dest, map)?),
			AttributeKind::Unknown(bytes) => {
				debug!("copying unknown attribute {:?} without translating its contents", self.name(src));
				AttributeKind::Unknown(bytes.clone())
			},
		};

		Ok(Attribute { name_index, kind })
	}

	/// Renames classes in the strings this attribute points to directly, like signatures and local variable types.
	///
	/// Class entries are renamed by [`ConstPool::rename_classes`], so this is only one half of renaming.
	pub fn rename_classes(&mut self, pool: &mut ConstPool, map: &ClassMap) -> Result<(), PoolError> {
		match &mut self.kind {
			AttributeKind::Code(code) => code.rename_classes(pool, map)?,
			AttributeKind::LocalVariableTable(table) => debug::rename_local_variables(table, false, pool, map)?,
			AttributeKind::LocalVariableTypeTable(table) => debug::rename_local_variables(table, true, pool, map)?,
			AttributeKind::Signature(index) => {
				if let Some(renamed) = pool.renamed_utf8(*index, |s| descriptor::rename_signature(s, map))? {
					*index = renamed;
				}
			},
			AttributeKind::RuntimeVisibleAnnotations(annotations) |
			AttributeKind::RuntimeInvisibleAnnotations(annotations) => annotations.rename_classes(pool, map)?,
			AttributeKind::RuntimeVisibleParameterAnnotations(annotations) |
			AttributeKind::RuntimeInvisibleParameterAnnotations(annotations) => annotations.rename_classes(pool, map)?,
			AttributeKind::AnnotationDefault(default) => default.rename_classes(pool, map)?,
			_ => {},
		}
		Ok(())
	}
}

pub(crate) fn read_attributes(reader: &mut ByteReader, pool: &ConstPool) -> Result<Vec<Attribute>, DecodeError> {
	reader.read_vec(|r| r.read_u16_as_usize(), |r| Attribute::read(r, pool))
}

pub(crate) fn write_attributes(attributes: &[Attribute], writer: &mut Vec<u8>) -> Result<(), EncodeError> {
	writer.write_slice(attributes, |w, size| w.write_usize_as_u16(size, "attributes"), |w, attribute| attribute.write(w))
}

pub(crate) fn copy_attributes(attributes: &[Attribute], src: &ConstPool, dest: &mut ConstPool, map: &ClassMap) -> Result<Vec<Attribute>> {
	attributes.iter().map(|attribute| attribute.copy(src, dest, map)).collect()
}

pub(crate) fn rename_attributes(attributes: &mut [Attribute], pool: &mut ConstPool, map: &ClassMap) -> Result<(), PoolError> {
	for attribute in attributes {
		attribute.rename_classes(pool, map)?;
	}
	Ok(())
}

/// The first attribute with the given name.
pub fn find<'a>(attributes: &'a [Attribute], pool: &ConstPool, attribute_name: &str) -> Option<&'a Attribute> {
	attributes.iter().find(|attribute| attribute.is(pool, attribute_name))
}

pub fn find_mut<'a>(attributes: &'a mut [Attribute], pool: &ConstPool, attribute_name: &str) -> Option<&'a mut Attribute> {
	attributes.iter_mut().find(|attribute| attribute.is(pool, attribute_name))
}

/// Removes all attributes with the given name, returning the first one.
pub fn remove(attributes: &mut Vec<Attribute>, pool: &ConstPool, attribute_name: &str) -> Option<Attribute> {
	let mut removed = None;
	let mut index = 0;
	while index < attributes.len() {
		if attributes[index].is(pool, attribute_name) {
			let attribute = attributes.remove(index);
			removed.get_or_insert(attribute);
		} else {
			index += 1;
		}
	}
	removed
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::attribute::{find, is_registered, read_attributes, registry, remove, write_attributes, Attribute, AttributeKind};
	use crate::class_constants::attribute as name;
	use crate::class_map::ClassMap;
	use crate::codec::ByteReader;
	use crate::pool::ConstPool;

	#[test]
	fn registered_names() {
		assert_eq!(registry().len(), 23);
		assert!(is_registered(name::STACK_MAP_TABLE));
		assert!(!is_registered("org.example.Custom"));
	}

	#[test]
	fn unknown_is_kept() -> anyhow::Result<()> {
		let mut pool = ConstPool::new();
		let custom = pool.add_utf8("org.example.Custom")?;
		let source = pool.add_utf8(name::SOURCE_FILE)?;
		let file = pool.add_utf8("A.java")?;
		let [c0, c1] = custom.to_be_bytes();
		let [s0, s1] = source.to_be_bytes();
		let [f0, f1] = file.to_be_bytes();
		let bytes = vec![
			0, 2,
			c0, c1, 0, 0, 0, 3, 1, 2, 3,
			s0, s1, 0, 0, 0, 2, f0, f1,
		];

		let attributes = read_attributes(&mut ByteReader::new(&bytes), &pool)?;
		assert_eq!(attributes, vec![
			Attribute { name_index: custom, kind: AttributeKind::Unknown(vec![1, 2, 3]) },
			Attribute { name_index: source, kind: AttributeKind::SourceFile(file) },
		]);

		let mut out = Vec::new();
		write_attributes(&attributes, &mut out)?;
		assert_eq!(out, bytes);
		Ok(())
	}

	#[test]
	fn trailing_bytes_are_an_error() -> anyhow::Result<()> {
		let mut pool = ConstPool::new();
		let source = pool.add_utf8(name::SOURCE_FILE)?;
		let [s0, s1] = source.to_be_bytes();
		let bytes = vec![0, 1, s0, s1, 0, 0, 0, 3, 0, 1, 0];
		let error = read_attributes(&mut ByteReader::new(&bytes), &pool).unwrap_err();
		assert_eq!(error.offset, 10);
		Ok(())
	}

	#[test]
	fn find_and_remove() -> anyhow::Result<()> {
		let mut pool = ConstPool::new();
		let mut attributes = vec![
			Attribute::new(&mut pool, name::SYNTHETIC, AttributeKind::Synthetic)?,
			Attribute::new(&mut pool, name::DEPRECATED, AttributeKind::Deprecated)?,
			Attribute::new(&mut pool, name::SYNTHETIC, AttributeKind::Synthetic)?,
		];
		assert!(find(&attributes, &pool, name::DEPRECATED).is_some());
		assert!(remove(&mut attributes, &pool, name::SYNTHETIC).is_some());
		assert_eq!(attributes.len(), 1);
		assert!(find(&attributes, &pool, name::SYNTHETIC).is_none());
		Ok(())
	}

	#[test]
	fn copy_signature() -> anyhow::Result<()> {
		let mut pool = ConstPool::new();
		let signature = pool.add_utf8("Ljava/util/List<La/B;>;")?;
		let attribute = Attribute::new(&mut pool, name::SIGNATURE, AttributeKind::Signature(signature))?;

		let mut dest = ConstPool::new();
		let copy = attribute.copy(&pool, &mut dest, &ClassMap::single("a.B", "x.Y"))?;
		let AttributeKind::Signature(index) = copy.kind else {
			panic!("expected a signature");
		};
		assert_eq!(dest.get_utf8(index)?, "Ljava/util/List<Lx/Y;>;");
		assert_eq!(copy.name(&dest)?, name::SIGNATURE);
		assert_eq!(pool.get_utf8(signature)?, "Ljava/util/List<La/B;>;");
		Ok(())
	}
}
