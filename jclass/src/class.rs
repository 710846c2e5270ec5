//! The class file itself.

use std::cmp::Ordering;
use std::io::{Read, Write};
use log::{debug, trace};
use crate::attribute::{self, Attribute, AttributeKind};
use crate::class_constants::{access, attribute as name, MAGIC};
use crate::class_map::ClassMap;
use crate::codec::{ByteReader, ClassWrite};
use crate::error::{DecodeError, DecodeErrorKind, EncodeError, Error, PoolError, Result};
use crate::member::{FieldInfo, MemberInfo, MethodInfo};
use crate::pool::{ConstPool, PoolEntry};

/// A class file version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
	pub major: u16,
	pub minor: u16,
}

impl Version {
	pub const V1_1: Version = Version::new(45, 3);
	pub const V1_5: Version = Version::new(49, 0);
	pub const V1_6: Version = Version::new(50, 0);
	pub const V1_7: Version = Version::new(51, 0);
	pub const V1_8: Version = Version::new(52, 0);
	pub const V11: Version = Version::new(55, 0);
	pub const V17: Version = Version::new(61, 0);
	pub const V21: Version = Version::new(65, 0);

	/// The version of newly created classes.
	pub const DEFAULT: Version = Version::V1_8;

	pub const fn new(major: u16, minor: u16) -> Version {
		Version { major, minor }
	}

	/// If classes of this version must have stack map frames.
	pub fn requires_stack_map(&self) -> bool {
		*self >= Version::V1_7
	}
}

impl PartialOrd for Version {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Version {
	fn cmp(&self, other: &Self) -> Ordering {
		self.major.cmp(&other.major)
			.then_with(|| self.minor.cmp(&other.minor))
	}
}

/// A class file, with its constant pool.
///
/// All indices in here and in the members and attributes point into [`ClassFile::pool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
	pub version: Version,
	pub pool: ConstPool,
	pub access_flags: u16,
	pub this_class: u16,
	/// `0` only for `java.lang.Object`.
	pub super_class: u16,
	pub interfaces: Vec<u16>,
	pub fields: Vec<FieldInfo>,
	pub methods: Vec<MethodInfo>,
	pub attributes: Vec<Attribute>,
}

/// The `SourceFile` javac would write for a class: `a.B$C` becomes `B.java`.
fn source_file_name(class_name: &str) -> String {
	let outer = class_name.split('$').next().unwrap_or(class_name);
	let simple = outer.rsplit('.').next().unwrap_or(outer);
	format!("{simple}.java")
}

impl ClassFile {
	/// Creates an empty class. Without a `super_class`, the super class is `java.lang.Object`.
	///
	/// The class gets a `SourceFile` attribute derived from its name.
	pub fn new(is_interface: bool, class_name: &str, super_class: Option<&str>, version: Version) -> Result<ClassFile, PoolError> {
		let mut pool = ConstPool::new();
		let this_class = pool.add_class(class_name)?;
		let super_class = pool.add_class(super_class.unwrap_or("java.lang.Object"))?;
		let source_file = AttributeKind::SourceFile(pool.add_utf8(&source_file_name(class_name))?);
		let source_file = Attribute::new(&mut pool, name::SOURCE_FILE, source_file)?;

		Ok(ClassFile {
			version,
			pool,
			access_flags: if is_interface { access::INTERFACE | access::ABSTRACT } else { access::SUPER },
			this_class,
			super_class,
			interfaces: Vec::new(),
			fields: Vec::new(),
			methods: Vec::new(),
			attributes: vec![source_file],
		})
	}

	pub fn parse(bytes: &[u8]) -> Result<ClassFile, DecodeError> {
		let mut reader = ByteReader::new(bytes);

		let magic = reader.read_u32()?;
		if magic != MAGIC {
			return Err(DecodeError::new(0, DecodeErrorKind::BadMagic(magic)));
		}
		let minor = reader.read_u16()?;
		let major = reader.read_u16()?;
		let pool = ConstPool::read(&mut reader)?;

		let access_flags = reader.read_u16()?;
		let this_class = reader.read_u16()?;
		let super_class = reader.read_u16()?;
		let interfaces = reader.read_vec(|r| r.read_u16_as_usize(), |r| r.read_u16())?;
		let fields = reader.read_vec(|r| r.read_u16_as_usize(), |r| MemberInfo::read(r, &pool))?;
		let methods = reader.read_vec(|r| r.read_u16_as_usize(), |r| MemberInfo::read(r, &pool))?;
		let attributes = attribute::read_attributes(&mut reader, &pool)?;
		reader.expect_end("class file")?;

		trace!("parsed class with {} pool entries, {} fields and {} methods", pool.len(), fields.len(), methods.len());
		Ok(ClassFile {
			version: Version::new(major, minor),
			pool,
			access_flags,
			this_class,
			super_class,
			interfaces,
			fields,
			methods,
			attributes,
		})
	}

	pub fn serialize(&self) -> Result<Vec<u8>, EncodeError> {
		let mut writer = Vec::new();
		writer.write_u32(MAGIC);
		writer.write_u16(self.version.minor);
		writer.write_u16(self.version.major);
		self.pool.write(&mut writer)?;

		writer.write_u16(self.access_flags);
		writer.write_u16(self.this_class);
		writer.write_u16(self.super_class);
		writer.write_slice(&self.interfaces, |w, size| w.write_usize_as_u16(size, "interfaces"), |w, &index| {
			w.write_u16(index);
			Ok(())
		})?;
		writer.write_slice(&self.fields, |w, size| w.write_usize_as_u16(size, "fields"), |w, field| field.write(w))?;
		writer.write_slice(&self.methods, |w, size| w.write_usize_as_u16(size, "methods"), |w, method| method.write(w))?;
		attribute::write_attributes(&self.attributes, &mut writer)?;
		Ok(writer)
	}

	pub fn read_from(mut reader: impl Read) -> Result<ClassFile> {
		let mut bytes = Vec::new();
		reader.read_to_end(&mut bytes)?;
		Ok(ClassFile::parse(&bytes)?)
	}

	pub fn write_to(&self, mut writer: impl Write) -> Result<()> {
		writer.write_all(&self.serialize()?)?;
		Ok(())
	}

	/// The name of this class, like `java.lang.Object`.
	pub fn name(&self) -> Result<String, PoolError> {
		self.pool.get_class_name(self.this_class)
	}

	/// The name of the super class, [`None`] for `java.lang.Object`.
	pub fn super_name(&self) -> Result<Option<String>, PoolError> {
		if self.super_class == 0 {
			Ok(None)
		} else {
			self.pool.get_class_name(self.super_class).map(Some)
		}
	}

	pub fn interface_names(&self) -> Result<Vec<String>, PoolError> {
		self.interfaces.iter().map(|&index| self.pool.get_class_name(index)).collect()
	}

	pub fn is_interface(&self) -> bool {
		self.access_flags & access::INTERFACE != 0
	}

	pub fn is_final(&self) -> bool {
		self.access_flags & access::FINAL != 0
	}

	pub fn is_abstract(&self) -> bool {
		self.access_flags & access::ABSTRACT != 0
	}

	pub fn source_file(&self) -> Option<String> {
		self.attributes.iter().find_map(|attribute| match attribute.kind {
			AttributeKind::SourceFile(index) => self.pool.get_utf8(index).ok(),
			_ => None,
		})
	}

	/// Renames this class. All references to it are renamed too.
	pub fn set_name(&mut self, new: &str) -> Result<(), PoolError> {
		let old = self.name()?;
		self.rename_class(&old, new)
	}

	pub fn add_interface(&mut self, interface: &str) -> Result<(), PoolError> {
		let index = self.pool.add_class(interface)?;
		if !self.interfaces.contains(&index) {
			self.interfaces.push(index);
		}
		Ok(())
	}

	pub fn set_interfaces(&mut self, interfaces: &[&str]) -> Result<(), PoolError> {
		self.interfaces = interfaces.iter()
			.map(|interface| self.pool.add_class(interface))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(())
	}

	/// Changes the super class, also changing the `super(..)` calls of all constructors.
	pub fn set_superclass(&mut self, super_class: Option<&str>) -> Result<()> {
		let this_class = self.name()?;
		let super_class = super_class.unwrap_or("java.lang.Object");
		let super_index = self.pool.add_class(super_class)?;

		let ClassFile { pool, methods, .. } = self;
		for method in methods.iter_mut() {
			if !method.is_constructor(pool) {
				continue;
			}
			let Some(code) = method.code_mut() else { continue };

			let mut editor = code.editor();
			if let Some(position) = editor.skip_super_constructor(pool, &this_class)? {
				let (_, name_and_type_index) = pool.get_member_ref(editor.u16_at(position + 1)?)?;
				let method_ref = pool.put(PoolEntry::MethodRef { class_index: super_index, name_and_type_index })?;
				editor.write_u16(position + 1, method_ref)?;
				trace!("changed super constructor call at {position} to {super_class}");
			}
		}

		self.super_class = super_index;
		Ok(())
	}

	pub fn field(&self, field_name: &str) -> Option<&FieldInfo> {
		self.fields.iter().find(|field| field.name(&self.pool).is_ok_and(|n| n == field_name))
	}

	pub fn method(&self, method_name: &str, descriptor: &str) -> Option<&MethodInfo> {
		self.methods.iter().find(|method| method.is(&self.pool, method_name, descriptor))
	}

	pub fn method_mut(&mut self, method_name: &str, descriptor: &str) -> Option<&mut MethodInfo> {
		let pool = &self.pool;
		self.methods.iter_mut().find(|method| method.is(pool, method_name, descriptor))
	}

	/// All methods with the given name, regardless of their descriptor.
	pub fn methods_named<'a>(&'a self, method_name: &'a str) -> impl Iterator<Item=&'a MethodInfo> + 'a {
		self.methods.iter().filter(move |method| method.name(&self.pool).is_ok_and(|n| n == method_name))
	}

	/// Adds a field. There can only be one field with a name.
	pub fn add_field(&mut self, field: FieldInfo) -> Result<()> {
		let field_name = field.name(&self.pool)?;
		if self.field(&field_name).is_some() {
			return Err(Error::DuplicateMember { kind: "field", name: field_name, descriptor: field.descriptor(&self.pool)? });
		}
		self.fields.push(field);
		Ok(())
	}

	/// Adds a method. There can only be one method with a name and descriptor.
	pub fn add_method(&mut self, method: MethodInfo) -> Result<()> {
		let method_name = method.name(&self.pool)?;
		let descriptor = method.descriptor(&self.pool)?;
		if self.method(&method_name, &descriptor).is_some() {
			return Err(Error::DuplicateMember { kind: "method", name: method_name, descriptor });
		}
		self.methods.push(method);
		Ok(())
	}

	pub fn attribute(&self, attribute_name: &str) -> Option<&Attribute> {
		attribute::find(&self.attributes, &self.pool, attribute_name)
	}

	/// Adds an attribute, replacing all attributes of the same name.
	pub fn add_attribute(&mut self, attribute: Attribute) -> Result<(), PoolError> {
		let attribute_name = attribute.name(&self.pool)?;
		attribute::remove(&mut self.attributes, &self.pool, &attribute_name);
		self.attributes.push(attribute);
		Ok(())
	}

	pub fn remove_attribute(&mut self, attribute_name: &str) -> Option<Attribute> {
		attribute::remove(&mut self.attributes, &self.pool, attribute_name)
	}

	/// The names of all classes this class refers to, in the `a.b.C` form.
	pub fn referenced_classes(&self) -> Result<Vec<String>, PoolError> {
		Ok(self.pool.class_names()?.into_iter().collect())
	}

	pub fn rename_class(&mut self, old: &str, new: &str) -> Result<(), PoolError> {
		if old == new {
			return Ok(());
		}
		self.rename_classes(&ClassMap::single(old, new))
	}

	/// Renames classes everywhere: in the pool, in descriptors and in signatures.
	pub fn rename_classes(&mut self, map: &ClassMap) -> Result<(), PoolError> {
		if map.is_empty() {
			return Ok(());
		}
		self.pool.rename_classes(map)?;
		for member in self.fields.iter_mut().chain(self.methods.iter_mut()) {
			member.rename_classes(&mut self.pool, map)?;
		}
		attribute::rename_attributes(&mut self.attributes, &mut self.pool, map)
	}

	/// Rebuilds the constant pool, so that it only has the entries that are used.
	pub fn compact(&mut self) -> Result<()> {
		let before = self.pool.len();
		let mut pool = ConstPool::new();
		let src = &self.pool;
		let map = ClassMap::new();

		let this_class = src.copy(self.this_class, &mut pool, &map)?;
		let super_class = if self.super_class == 0 { 0 } else { src.copy(self.super_class, &mut pool, &map)? };
		let interfaces = self.interfaces.iter()
			.map(|&index| src.copy(index, &mut pool, &map))
			.collect::<Result<Vec<_>, _>>()?;
		let methods = self.methods.iter()
			.map(|method| method.copy(src, &mut pool, &map))
			.collect::<Result<Vec<_>, _>>()?;
		let fields = self.fields.iter()
			.map(|field| field.copy(src, &mut pool, &map))
			.collect::<Result<Vec<_>, _>>()?;
		let attributes = attribute::copy_attributes(&self.attributes, src, &mut pool, &map)?;

		debug!("compacted constant pool from {before} to {} entries", pool.len());
		*self = ClassFile {
			version: self.version,
			pool,
			access_flags: self.access_flags,
			this_class,
			super_class,
			interfaces,
			fields,
			methods,
			attributes,
		};
		Ok(())
	}

	/// Drops all attributes the JVM doesn't need to run the class, and then compacts the constant pool.
	///
	/// Kept are the attributes needed for linking, reflection and verification: for example `InnerClasses`,
	/// `Signature`, the annotations and the `StackMapTable`. Dropped are the debug tables and `SourceFile`.
	pub fn prune(&mut self) -> Result<()> {
		self.attributes.retain(|attribute| matches!(attribute.kind,
			AttributeKind::InnerClasses(_) |
			AttributeKind::Signature(_) |
			AttributeKind::EnclosingMethod { .. } |
			AttributeKind::BootstrapMethods(_) |
			AttributeKind::NestHost(_) |
			AttributeKind::NestMembers(_) |
			AttributeKind::PermittedSubclasses(_) |
			AttributeKind::RuntimeVisibleAnnotations(_) |
			AttributeKind::RuntimeInvisibleAnnotations(_)
		));

		for member in self.fields.iter_mut().chain(self.methods.iter_mut()) {
			member.attributes.retain(|attribute| matches!(attribute.kind,
				AttributeKind::Code(_) |
				AttributeKind::Exceptions(_) |
				AttributeKind::ConstantValue(_) |
				AttributeKind::Signature(_) |
				AttributeKind::AnnotationDefault(_) |
				AttributeKind::RuntimeVisibleAnnotations(_) |
				AttributeKind::RuntimeInvisibleAnnotations(_) |
				AttributeKind::RuntimeVisibleParameterAnnotations(_) |
				AttributeKind::RuntimeInvisibleParameterAnnotations(_) |
				AttributeKind::MethodParameters(_)
			));
			if let Some(code) = member.code_mut() {
				code.attributes.retain(|attribute| matches!(attribute.kind, AttributeKind::StackMapTable(_)));
			}
		}

		self.compact()
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::attribute::{Attribute, AttributeKind};
	use crate::attribute::code::CodeAttribute;
	use crate::attribute::debug::LineNumber;
	use crate::bytecode::opcode;
	use crate::class::{source_file_name, ClassFile, Version};
	use crate::class_constants::{access, attribute as name};
	use crate::error::{DecodeErrorKind, Error};
	use crate::member::MemberInfo;

	fn class_with_constructor() -> anyhow::Result<ClassFile> {
		let mut class = ClassFile::new(false, "org.example.Main", None, Version::DEFAULT)?;
		let init = class.pool.add_method_ref("java.lang.Object", "<init>", "()V")?;
		let [i0, i1] = init.to_be_bytes();

		let mut code = CodeAttribute::new(1, 1, vec![opcode::ALOAD_0, opcode::INVOKESPECIAL, i0, i1, opcode::RETURN]);
		code.attributes.push(Attribute::new(&mut class.pool, name::LINE_NUMBER_TABLE, AttributeKind::LineNumberTable(vec![
			LineNumber { start_pc: 0, line_number: 3 },
		]))?);

		let mut method = MemberInfo::new(&mut class.pool, access::PUBLIC, "<init>", "()V")?;
		method.set_code(&mut class.pool, code)?;
		class.add_method(method)?;
		Ok(class)
	}

	#[test]
	fn new_class() -> anyhow::Result<()> {
		let class = ClassFile::new(true, "a.b.Runner", None, Version::DEFAULT)?;
		assert_eq!(class.name()?, "a.b.Runner");
		assert_eq!(class.super_name()?, Some("java.lang.Object".to_owned()));
		assert!(class.is_interface());
		assert!(class.is_abstract());
		assert_eq!(class.version, Version::new(52, 0));
		assert_eq!(class.source_file(), Some("Runner.java".to_owned()));
		assert_eq!(source_file_name("a.B$C"), "B.java");
		Ok(())
	}

	#[test]
	fn round_trip() -> anyhow::Result<()> {
		let class = class_with_constructor()?;
		let bytes = class.serialize()?;
		assert_eq!(&bytes[..4], &[0xca, 0xfe, 0xba, 0xbe]);

		let parsed = ClassFile::parse(&bytes)?;
		assert_eq!(parsed, class);
		assert_eq!(parsed.serialize()?, bytes);
		Ok(())
	}

	#[test]
	fn bad_input() -> anyhow::Result<()> {
		let error = ClassFile::parse(&[0xca, 0xfe, 0xba, 0xbf, 0, 0, 0, 52]).unwrap_err();
		assert_eq!(error.kind, DecodeErrorKind::BadMagic(0xcafebabf));

		let mut bytes = class_with_constructor()?.serialize()?;
		bytes.push(0);
		assert!(ClassFile::parse(&bytes).is_err());
		bytes.truncate(bytes.len() - 3);
		assert!(matches!(ClassFile::parse(&bytes).unwrap_err().kind, DecodeErrorKind::UnexpectedEnd { .. }));
		Ok(())
	}

	#[test]
	fn duplicate_members() -> anyhow::Result<()> {
		let mut class = class_with_constructor()?;
		let method = MemberInfo::new(&mut class.pool, access::PUBLIC, "<init>", "()V")?;
		assert!(matches!(class.add_method(method), Err(Error::DuplicateMember { kind: "method", .. })));

		let other = MemberInfo::new(&mut class.pool, access::PUBLIC, "<init>", "(I)V")?;
		class.add_method(other)?;

		let field = MemberInfo::new(&mut class.pool, access::PRIVATE, "x", "I")?;
		class.add_field(field)?;
		let field = MemberInfo::new(&mut class.pool, access::PRIVATE, "x", "J")?;
		assert!(matches!(class.add_field(field), Err(Error::DuplicateMember { kind: "field", .. })));
		Ok(())
	}

	#[test]
	fn superclass_changes_constructor() -> anyhow::Result<()> {
		let mut class = class_with_constructor()?;
		class.set_superclass(Some("org.example.Base"))?;
		assert_eq!(class.super_name()?, Some("org.example.Base".to_owned()));

		let code = class.method("<init>", "()V").and_then(MemberInfo::code).map(|code| code.code.clone());
		let Some(code) = code else { anyhow::bail!("constructor lost its code") };
		let index = u16::from_be_bytes([code[2], code[3]]);
		assert_eq!(class.pool.get_member_class_name(index)?, "org.example.Base");
		assert_eq!(class.pool.get_member_name(index)?, "<init>");
		Ok(())
	}

	#[test]
	fn rename() -> anyhow::Result<()> {
		let mut class = class_with_constructor()?;
		let field = MemberInfo::new(&mut class.pool, access::PRIVATE, "self", "Lorg/example/Main;")?;
		class.add_field(field)?;

		class.set_name("org.other.Renamed")?;
		assert_eq!(class.name()?, "org.other.Renamed");
		assert_eq!(class.fields[0].descriptor(&class.pool)?, "Lorg/other/Renamed;");
		assert!(class.referenced_classes()?.contains(&"org.other.Renamed".to_owned()));
		assert!(!class.referenced_classes()?.contains(&"org.example.Main".to_owned()));
		Ok(())
	}

	#[test]
	fn compact_and_prune() -> anyhow::Result<()> {
		let mut class = class_with_constructor()?;
		class.pool.add_utf8("unused")?;
		class.pool.add_long(7)?;
		let before = class.pool.len();

		class.compact()?;
		assert!(class.pool.len() < before);
		assert_eq!(class.pool.find_utf8("unused"), None);
		assert_eq!(class.name()?, "org.example.Main");
		assert_eq!(class.source_file(), Some("Main.java".to_owned()));
		let compacted = ClassFile::parse(&class.serialize()?)?;
		assert_eq!(compacted, class);

		class.prune()?;
		assert_eq!(class.source_file(), None);
		assert_eq!(class.pool.find_utf8(name::LINE_NUMBER_TABLE), None);
		assert_eq!(class.pool.find_utf8(name::SOURCE_FILE), None);
		let code = class.method("<init>", "()V").and_then(MemberInfo::code);
		assert_eq!(code.map(|code| code.attributes.len()), Some(0));
		Ok(())
	}
}
