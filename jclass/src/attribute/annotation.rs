//! The annotation attributes.
//!
//! The nested annotation values are stored in an [`AnnotationTree`], an arena of nodes that refer to each other by
//! [`AnnotationId`] and [`ElementId`]. Copying and renaming work node by node, keeping all ids valid.

use crate::class_constants::element_value as tag;
use crate::class_map::ClassMap;
use crate::codec::{ByteReader, ClassWrite};
use crate::descriptor;
use crate::error::{DecodeError, EncodeError, PoolError};
use crate::pool::ConstPool;

/// How deep annotations and arrays may be nested in an element value.
const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnnotationId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
	/// The field descriptor of the annotation interface.
	pub type_index: u16,
	/// The element names, paired with their values.
	pub pairs: Vec<(u16, ElementId)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementValue {
	/// A primitive or string constant. The `tag` is one of `BCDFIJSZs`.
	Const { tag: u8, const_value_index: u16 },
	Enum { type_name_index: u16, const_name_index: u16 },
	/// `class_info_index` is a return descriptor, like `Ljava/lang/Object;` or `V`.
	Class { class_info_index: u16 },
	Annotation(AnnotationId),
	Array(Vec<ElementId>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationTree {
	annotations: Vec<Annotation>,
	elements: Vec<ElementValue>,
}

impl AnnotationTree {
	pub fn new() -> AnnotationTree {
		AnnotationTree::default()
	}

	pub fn annotation(&self, id: AnnotationId) -> &Annotation {
		&self.annotations[id.0]
	}

	pub fn element(&self, id: ElementId) -> &ElementValue {
		&self.elements[id.0]
	}

	pub fn add_annotation(&mut self, annotation: Annotation) -> AnnotationId {
		self.annotations.push(annotation);
		AnnotationId(self.annotations.len() - 1)
	}

	pub fn add_element(&mut self, element: ElementValue) -> ElementId {
		self.elements.push(element);
		ElementId(self.elements.len() - 1)
	}

	fn read_annotation(&mut self, reader: &mut ByteReader, nesting: usize) -> Result<AnnotationId, DecodeError> {
		let type_index = reader.read_u16()?;
		let pairs = reader.read_vec(|r| r.read_u16_as_usize(), |r| {
			let name_index = r.read_u16()?;
			Ok((name_index, self.read_element(r, nesting)?))
		})?;
		Ok(self.add_annotation(Annotation { type_index, pairs }))
	}

	fn read_element(&mut self, reader: &mut ByteReader, nesting: usize) -> Result<ElementId, DecodeError> {
		if nesting >= MAX_NESTING {
			return Err(reader.malformed(format!("element values nested deeper than {MAX_NESTING}")));
		}
		let element = match reader.read_u8()? {
			tag @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's') => {
				ElementValue::Const { tag, const_value_index: reader.read_u16()? }
			},
			tag::ENUM => ElementValue::Enum {
				type_name_index: reader.read_u16()?,
				const_name_index: reader.read_u16()?,
			},
			tag::CLASS => ElementValue::Class { class_info_index: reader.read_u16()? },
			tag::ANNOTATION => ElementValue::Annotation(self.read_annotation(reader, nesting + 1)?),
			tag::ARRAY => ElementValue::Array(reader.read_vec(|r| r.read_u16_as_usize(), |r| self.read_element(r, nesting + 1))?),
			other => return Err(reader.malformed(format!("unknown element value tag {other:#04x}"))),
		};
		Ok(self.add_element(element))
	}

	fn write_annotation(&self, id: AnnotationId, writer: &mut Vec<u8>) -> Result<(), EncodeError> {
		let annotation = self.annotation(id);
		writer.write_u16(annotation.type_index);
		writer.write_slice(&annotation.pairs, |w, size| w.write_usize_as_u16(size, "element value pairs"), |w, &(name_index, value)| {
			w.write_u16(name_index);
			self.write_element(value, w)
		})
	}

	fn write_element(&self, id: ElementId, writer: &mut Vec<u8>) -> Result<(), EncodeError> {
		match self.element(id) {
			ElementValue::Const { tag, const_value_index } => {
				writer.write_u8(*tag);
				writer.write_u16(*const_value_index);
			},
			ElementValue::Enum { type_name_index, const_name_index } => {
				writer.write_u8(tag::ENUM);
				writer.write_u16(*type_name_index);
				writer.write_u16(*const_name_index);
			},
			ElementValue::Class { class_info_index } => {
				writer.write_u8(tag::CLASS);
				writer.write_u16(*class_info_index);
			},
			ElementValue::Annotation(annotation) => {
				writer.write_u8(tag::ANNOTATION);
				self.write_annotation(*annotation, writer)?;
			},
			ElementValue::Array(values) => {
				writer.write_u8(tag::ARRAY);
				writer.write_slice(values, |w, size| w.write_usize_as_u16(size, "element value array"), |w, &value| {
					self.write_element(value, w)
				})?;
			},
		}
		Ok(())
	}

	/// A copy of the tree with all indices pointing into `dest`. Ids stay the same.
	fn copy(&self, src: &ConstPool, dest: &mut ConstPool, map: &ClassMap) -> Result<AnnotationTree, PoolError> {
		let rename = |d: &str| descriptor::rename_descriptor(d, map);

		let mut annotations = Vec::with_capacity(self.annotations.len());
		for annotation in &self.annotations {
			let type_index = src.copy_renamed(annotation.type_index, dest, rename)?;
			let pairs = annotation.pairs.iter()
				.map(|&(name_index, value)| Ok::<_, PoolError>((src.copy(name_index, dest, map)?, value)))
				.collect::<Result<_, _>>()?;
			annotations.push(Annotation { type_index, pairs });
		}

		let mut elements = Vec::with_capacity(self.elements.len());
		for element in &self.elements {
			elements.push(match *element {
				ElementValue::Const { tag, const_value_index } => ElementValue::Const {
					tag,
					const_value_index: src.copy(const_value_index, dest, map)?,
				},
				ElementValue::Enum { type_name_index, const_name_index } => ElementValue::Enum {
					type_name_index: src.copy_renamed(type_name_index, dest, rename)?,
					const_name_index: src.copy(const_name_index, dest, map)?,
				},
				ElementValue::Class { class_info_index } => ElementValue::Class {
					class_info_index: src.copy_renamed(class_info_index, dest, rename)?,
				},
				ref other => other.clone(),
			});
		}

		Ok(AnnotationTree { annotations, elements })
	}

	fn rename_classes(&mut self, pool: &mut ConstPool, map: &ClassMap) -> Result<(), PoolError> {
		let rename = |d: &str| descriptor::rename_descriptor(d, map);

		for annotation in &mut self.annotations {
			if let Some(index) = pool.renamed_utf8(annotation.type_index, rename)? {
				annotation.type_index = index;
			}
		}
		for element in &mut self.elements {
			match element {
				ElementValue::Enum { type_name_index: index, .. } | ElementValue::Class { class_info_index: index } => {
					if let Some(renamed) = pool.renamed_utf8(*index, rename)? {
						*index = renamed;
					}
				},
				_ => {},
			}
		}
		Ok(())
	}
}

/// The `RuntimeVisibleAnnotations` and `RuntimeInvisibleAnnotations` attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
	pub tree: AnnotationTree,
	pub annotations: Vec<AnnotationId>,
}

impl Annotations {
	/// Finds the annotation with the given type, as a field descriptor like `Ljava/lang/Deprecated;`.
	pub fn find(&self, pool: &ConstPool, type_descriptor: &str) -> Option<AnnotationId> {
		self.annotations.iter()
			.copied()
			.find(|&id| pool.get_utf8(self.tree.annotation(id).type_index).is_ok_and(|t| t == type_descriptor))
	}

	pub(crate) fn read(reader: &mut ByteReader) -> Result<Annotations, DecodeError> {
		let mut tree = AnnotationTree::new();
		let annotations = reader.read_vec(|r| r.read_u16_as_usize(), |r| tree.read_annotation(r, 0))?;
		Ok(Annotations { tree, annotations })
	}

	pub(crate) fn write(&self, writer: &mut Vec<u8>) -> Result<(), EncodeError> {
		writer.write_slice(&self.annotations, |w, size| w.write_usize_as_u16(size, "annotations"), |w, &id| {
			self.tree.write_annotation(id, w)
		})
	}

	pub(crate) fn copy(&self, src: &ConstPool, dest: &mut ConstPool, map: &ClassMap) -> Result<Annotations, PoolError> {
		Ok(Annotations {
			tree: self.tree.copy(src, dest, map)?,
			annotations: self.annotations.clone(),
		})
	}

	pub(crate) fn rename_classes(&mut self, pool: &mut ConstPool, map: &ClassMap) -> Result<(), PoolError> {
		self.tree.rename_classes(pool, map)
	}
}

/// The `RuntimeVisibleParameterAnnotations` and `RuntimeInvisibleParameterAnnotations` attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterAnnotations {
	pub tree: AnnotationTree,
	/// For each parameter its annotations.
	pub parameters: Vec<Vec<AnnotationId>>,
}

impl ParameterAnnotations {
	pub(crate) fn read(reader: &mut ByteReader) -> Result<ParameterAnnotations, DecodeError> {
		let mut tree = AnnotationTree::new();
		let parameters = reader.read_vec(|r| r.read_u8_as_usize(), |r| {
			r.read_vec(|r| r.read_u16_as_usize(), |r| tree.read_annotation(r, 0))
		})?;
		Ok(ParameterAnnotations { tree, parameters })
	}

	pub(crate) fn write(&self, writer: &mut Vec<u8>) -> Result<(), EncodeError> {
		writer.write_slice(&self.parameters, |w, size| w.write_usize_as_u8(size, "parameter annotations"), |w, annotations| {
			w.write_slice(annotations, |w, size| w.write_usize_as_u16(size, "annotations"), |w, &id| {
				self.tree.write_annotation(id, w)
			})
		})
	}

	pub(crate) fn copy(&self, src: &ConstPool, dest: &mut ConstPool, map: &ClassMap) -> Result<ParameterAnnotations, PoolError> {
		Ok(ParameterAnnotations {
			tree: self.tree.copy(src, dest, map)?,
			parameters: self.parameters.clone(),
		})
	}

	pub(crate) fn rename_classes(&mut self, pool: &mut ConstPool, map: &ClassMap) -> Result<(), PoolError> {
		self.tree.rename_classes(pool, map)
	}
}

/// The `AnnotationDefault` attribute of a method of an annotation interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationDefault {
	pub tree: AnnotationTree,
	pub value: ElementId,
}

impl AnnotationDefault {
	pub(crate) fn read(reader: &mut ByteReader) -> Result<AnnotationDefault, DecodeError> {
		let mut tree = AnnotationTree::new();
		let value = tree.read_element(reader, 0)?;
		Ok(AnnotationDefault { tree, value })
	}

	pub(crate) fn write(&self, writer: &mut Vec<u8>) -> Result<(), EncodeError> {
		self.tree.write_element(self.value, writer)
	}

	pub(crate) fn copy(&self, src: &ConstPool, dest: &mut ConstPool, map: &ClassMap) -> Result<AnnotationDefault, PoolError> {
		Ok(AnnotationDefault {
			tree: self.tree.copy(src, dest, map)?,
			value: self.value,
		})
	}

	pub(crate) fn rename_classes(&mut self, pool: &mut ConstPool, map: &ClassMap) -> Result<(), PoolError> {
		self.tree.rename_classes(pool, map)
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::attribute::annotation::{Annotations, ElementValue};
	use crate::class_map::ClassMap;
	use crate::codec::ByteReader;
	use crate::error::DecodeErrorKind;
	use crate::pool::ConstPool;

	/// `@a.B(value = {a.B.class, @a.B})`
	fn nested(pool: &mut ConstPool) -> anyhow::Result<Vec<u8>> {
		let type_index = pool.add_utf8("La/B;")?;
		let value = pool.add_utf8("value")?;
		let [t0, t1] = type_index.to_be_bytes();
		let [v0, v1] = value.to_be_bytes();
		Ok(vec![
			0, 1,
			t0, t1, 0, 1,
			v0, v1, b'[', 0, 2,
			b'c', t0, t1,
			b'@', t0, t1, 0, 0,
		])
	}

	#[test]
	fn read_write() -> anyhow::Result<()> {
		let mut pool = ConstPool::new();
		let bytes = nested(&mut pool)?;
		let annotations = Annotations::read(&mut ByteReader::new(&bytes))?;

		assert_eq!(annotations.annotations.len(), 1);
		let root = annotations.tree.annotation(annotations.annotations[0]);
		assert_eq!(pool.get_utf8(root.pairs[0].0)?, "value");
		let ElementValue::Array(values) = annotations.tree.element(root.pairs[0].1) else {
			panic!("expected an array");
		};
		assert_eq!(values.len(), 2);
		assert!(annotations.find(&pool, "La/B;").is_some());

		let mut out = Vec::new();
		annotations.write(&mut out)?;
		assert_eq!(out, bytes);
		Ok(())
	}

	#[test]
	fn copy_and_rename() -> anyhow::Result<()> {
		let mut pool = ConstPool::new();
		let bytes = nested(&mut pool)?;
		let annotations = Annotations::read(&mut ByteReader::new(&bytes))?;
		let map = ClassMap::single("a.B", "a.C");

		let mut dest = ConstPool::new();
		let copy = annotations.copy(&pool, &mut dest, &map)?;
		assert!(copy.find(&dest, "La/C;").is_some());
		assert_eq!(dest.find_utf8("La/B;"), None);

		let mut renamed = annotations.clone();
		renamed.rename_classes(&mut pool, &map)?;
		assert!(renamed.find(&pool, "La/C;").is_some());
		assert!(annotations.find(&pool, "La/B;").is_some());

		let root = renamed.tree.annotation(renamed.annotations[0]);
		let ElementValue::Array(values) = renamed.tree.element(root.pairs[0].1) else {
			panic!("expected an array");
		};
		let &ElementValue::Class { class_info_index } = renamed.tree.element(values[0]) else {
			panic!("expected a class");
		};
		assert_eq!(pool.get_utf8(class_info_index)?, "La/C;");
		Ok(())
	}

	#[test]
	fn deeply_nested_arrays() -> anyhow::Result<()> {
		let mut pool = ConstPool::new();
		let type_index = pool.add_utf8("La/B;")?;
		let value = pool.add_utf8("value")?;
		let [t0, t1] = type_index.to_be_bytes();
		let [v0, v1] = value.to_be_bytes();

		let mut bytes = vec![0, 1, t0, t1, 0, 1, v0, v1];
		for _ in 0..10_000 {
			bytes.extend_from_slice(&[b'[', 0, 1]);
		}
		bytes.extend_from_slice(&[b'c', t0, t1]);

		let error = Annotations::read(&mut ByteReader::new(&bytes)).err()
			.ok_or_else(|| anyhow::anyhow!("nesting is not limited"))?;
		assert!(matches!(error.kind, DecodeErrorKind::Malformed(_)));

		// arrays nested a few levels deep are fine
		let mut bytes = vec![0, 1, t0, t1, 0, 1, v0, v1];
		for _ in 0..16 {
			bytes.extend_from_slice(&[b'[', 0, 1]);
		}
		bytes.extend_from_slice(&[b'c', t0, t1]);
		assert_eq!(Annotations::read(&mut ByteReader::new(&bytes))?.annotations.len(), 1);
		Ok(())
	}
}
