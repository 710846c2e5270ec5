//! The constant pool.
//!
//! A [`ConstPool`] is an indexed table of [`PoolEntry`]s. Index `0` is never valid, and `long` and `double` entries take
//! up two indices, the second one being [`PoolEntry::Padding`].
//!
//! All `add_*` methods intern: adding an entry with the same content as an existing one returns the existing index.

use std::collections::{BTreeSet, HashMap};
use java_string::{JavaStr, JavaString};
use log::trace;
use crate::class_constants::pool as tag;
use crate::class_map::ClassMap;
use crate::codec::{ByteReader, ClassWrite};
use crate::descriptor;
use crate::error::{DecodeError, DecodeErrorKind, EncodeError, PoolError};
use crate::jstring;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolEntry {
	/// Index `0`, and the upper half of [`PoolEntry::Long`] and [`PoolEntry::Double`].
	Padding,
	/// The raw modified UTF-8 bytes, kept as read so that they're written back unchanged.
	Utf8(Vec<u8>),
	Integer(i32),
	/// The bits of an `f32`, see [`f32::to_bits`].
	Float(u32),
	Long(i64),
	/// The bits of an `f64`, see [`f64::to_bits`].
	Double(u64),
	Class { name_index: u16 },
	String { string_index: u16 },
	FieldRef { class_index: u16, name_and_type_index: u16 },
	MethodRef { class_index: u16, name_and_type_index: u16 },
	InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
	NameAndType { name_index: u16, descriptor_index: u16 },
	MethodHandle { reference_kind: u8, reference_index: u16 },
	MethodType { descriptor_index: u16 },
	/// The first index points into the `BootstrapMethods` attribute, not into the pool.
	Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
	/// The first index points into the `BootstrapMethods` attribute, not into the pool.
	InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
	Module { name_index: u16 },
	Package { name_index: u16 },
}

impl PoolEntry {
	/// The tag byte of this entry, `0` for [`PoolEntry::Padding`].
	pub fn tag(&self) -> u8 {
		match self {
			PoolEntry::Padding => 0,
			PoolEntry::Utf8(_) => tag::UTF8,
			PoolEntry::Integer(_) => tag::INTEGER,
			PoolEntry::Float(_) => tag::FLOAT,
			PoolEntry::Long(_) => tag::LONG,
			PoolEntry::Double(_) => tag::DOUBLE,
			PoolEntry::Class { .. } => tag::CLASS,
			PoolEntry::String { .. } => tag::STRING,
			PoolEntry::FieldRef { .. } => tag::FIELD_REF,
			PoolEntry::MethodRef { .. } => tag::METHOD_REF,
			PoolEntry::InterfaceMethodRef { .. } => tag::INTERFACE_METHOD_REF,
			PoolEntry::NameAndType { .. } => tag::NAME_AND_TYPE,
			PoolEntry::MethodHandle { .. } => tag::METHOD_HANDLE,
			PoolEntry::MethodType { .. } => tag::METHOD_TYPE,
			PoolEntry::Dynamic { .. } => tag::DYNAMIC,
			PoolEntry::InvokeDynamic { .. } => tag::INVOKE_DYNAMIC,
			PoolEntry::Module { .. } => tag::MODULE,
			PoolEntry::Package { .. } => tag::PACKAGE,
		}
	}

	pub fn kind_name(&self) -> &'static str {
		match self {
			PoolEntry::Padding => "padding",
			PoolEntry::Utf8(_) => "an utf8",
			PoolEntry::Integer(_) => "an integer",
			PoolEntry::Float(_) => "a float",
			PoolEntry::Long(_) => "a long",
			PoolEntry::Double(_) => "a double",
			PoolEntry::Class { .. } => "a class",
			PoolEntry::String { .. } => "a string",
			PoolEntry::FieldRef { .. } => "a field ref",
			PoolEntry::MethodRef { .. } => "a method ref",
			PoolEntry::InterfaceMethodRef { .. } => "an interface method ref",
			PoolEntry::NameAndType { .. } => "a name and type",
			PoolEntry::MethodHandle { .. } => "a method handle",
			PoolEntry::MethodType { .. } => "a method type",
			PoolEntry::Dynamic { .. } => "a dynamic",
			PoolEntry::InvokeDynamic { .. } => "an invoke dynamic",
			PoolEntry::Module { .. } => "a module",
			PoolEntry::Package { .. } => "a package",
		}
	}

	/// If this entry takes up two pool indices.
	pub fn is_wide(&self) -> bool {
		matches!(self, PoolEntry::Long(_) | PoolEntry::Double(_))
	}
}

#[derive(Debug, Clone)]
pub struct ConstPool {
	/// The entries, with `entries[0]` being the reserved zeroth entry.
	entries: Vec<PoolEntry>,
	/// Maps an entry to the first index holding it, for interning.
	map: HashMap<PoolEntry, u16>,
}

impl PartialEq for ConstPool {
	fn eq(&self, other: &ConstPool) -> bool {
		self.entries == other.entries
	}
}

impl Eq for ConstPool {}

impl Default for ConstPool {
	fn default() -> ConstPool {
		ConstPool::new()
	}
}

macro_rules! wrong_kind {
	($index:expr, $entry:expr, $expected:literal) => {
		PoolError::WrongKind { index: $index, expected: $expected, found: $entry.kind_name() }
	};
}

impl ConstPool {
	pub fn new() -> ConstPool {
		ConstPool {
			entries: vec![PoolEntry::Padding],
			map: HashMap::new(),
		}
	}

	/// The value written as `constant_pool_count`: one more than the largest index.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.len() <= 1
	}

	/// Iterates over all entries except the padding ones, together with their index.
	pub fn entries(&self) -> impl Iterator<Item=(u16, &PoolEntry)> {
		self.entries.iter()
			.enumerate()
			.filter(|(_, entry)| **entry != PoolEntry::Padding)
			.map(|(index, entry)| (index as u16, entry))
	}

	pub fn get(&self, index: u16) -> Result<&PoolEntry, PoolError> {
		match self.entries.get(index as usize) {
			None | Some(PoolEntry::Padding) => Err(PoolError::InvalidIndex(index)),
			Some(entry) => Ok(entry),
		}
	}

	/// The tag of the entry at `index`, or [`None`] for invalid indices.
	pub fn tag_at(&self, index: u16) -> Option<u8> {
		self.get(index).ok().map(PoolEntry::tag)
	}

	/// Adds an entry, returning the index of an existing equal entry if there is one.
	pub fn put(&mut self, entry: PoolEntry) -> Result<u16, PoolError> {
		if entry == PoolEntry::Padding {
			return Err(PoolError::InvalidIndex(0));
		}
		if let Some(&index) = self.map.get(&entry) {
			return Ok(index);
		}
		self.push(entry)
	}

	/// Appends an entry without looking for an existing one.
	fn push(&mut self, entry: PoolEntry) -> Result<u16, PoolError> {
		let index = self.entries.len();
		let slots = if entry.is_wide() { 2 } else { 1 };
		if index + slots > u16::MAX as usize {
			return Err(PoolError::Overflow(entry.kind_name()));
		}
		let index = index as u16;

		self.entries.push(entry.clone());
		if slots == 2 {
			self.entries.push(PoolEntry::Padding);
		}
		self.map.entry(entry).or_insert(index);
		Ok(index)
	}

	fn rebuild_map(&mut self) {
		self.map.clear();
		for (index, entry) in self.entries.iter().enumerate().skip(1) {
			if *entry != PoolEntry::Padding {
				self.map.entry(entry.clone()).or_insert(index as u16);
			}
		}
	}

	pub fn add_utf8(&mut self, string: &str) -> Result<u16, PoolError> {
		self.put(PoolEntry::Utf8(jstring::encode(string)))
	}

	pub fn add_java_utf8(&mut self, string: &JavaStr) -> Result<u16, PoolError> {
		self.put(PoolEntry::Utf8(jstring::encode_java(string)))
	}

	/// Adds an utf8 entry from modified UTF-8 bytes.
	pub fn add_utf8_bytes(&mut self, bytes: Vec<u8>) -> Result<u16, PoolError> {
		self.put(PoolEntry::Utf8(bytes))
	}

	/// Adds a class entry. The name may be given as `a.b.C` or `a/b/C`, array classes use their descriptor `[La/b/C;`.
	pub fn add_class(&mut self, name: &str) -> Result<u16, PoolError> {
		let name_index = self.add_utf8(&descriptor::to_jvm_name(name))?;
		self.put(PoolEntry::Class { name_index })
	}

	pub fn add_string(&mut self, string: &str) -> Result<u16, PoolError> {
		let string_index = self.add_utf8(string)?;
		self.put(PoolEntry::String { string_index })
	}

	pub fn add_integer(&mut self, value: i32) -> Result<u16, PoolError> {
		self.put(PoolEntry::Integer(value))
	}

	pub fn add_float(&mut self, value: f32) -> Result<u16, PoolError> {
		self.put(PoolEntry::Float(value.to_bits()))
	}

	pub fn add_long(&mut self, value: i64) -> Result<u16, PoolError> {
		self.put(PoolEntry::Long(value))
	}

	pub fn add_double(&mut self, value: f64) -> Result<u16, PoolError> {
		self.put(PoolEntry::Double(value.to_bits()))
	}

	pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16, PoolError> {
		let name_index = self.add_utf8(name)?;
		let descriptor_index = self.add_utf8(descriptor)?;
		self.put(PoolEntry::NameAndType { name_index, descriptor_index })
	}

	pub fn add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> Result<u16, PoolError> {
		let class_index = self.add_class(class)?;
		let name_and_type_index = self.add_name_and_type(name, descriptor)?;
		self.put(PoolEntry::FieldRef { class_index, name_and_type_index })
	}

	pub fn add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> Result<u16, PoolError> {
		let class_index = self.add_class(class)?;
		let name_and_type_index = self.add_name_and_type(name, descriptor)?;
		self.put(PoolEntry::MethodRef { class_index, name_and_type_index })
	}

	pub fn add_interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> Result<u16, PoolError> {
		let class_index = self.add_class(class)?;
		let name_and_type_index = self.add_name_and_type(name, descriptor)?;
		self.put(PoolEntry::InterfaceMethodRef { class_index, name_and_type_index })
	}

	pub fn add_method_handle(&mut self, reference_kind: u8, reference_index: u16) -> Result<u16, PoolError> {
		self.put(PoolEntry::MethodHandle { reference_kind, reference_index })
	}

	pub fn add_method_type(&mut self, descriptor: &str) -> Result<u16, PoolError> {
		let descriptor_index = self.add_utf8(descriptor)?;
		self.put(PoolEntry::MethodType { descriptor_index })
	}

	pub fn add_dynamic(&mut self, bootstrap_method_attr_index: u16, name: &str, descriptor: &str) -> Result<u16, PoolError> {
		let name_and_type_index = self.add_name_and_type(name, descriptor)?;
		self.put(PoolEntry::Dynamic { bootstrap_method_attr_index, name_and_type_index })
	}

	pub fn add_invoke_dynamic(&mut self, bootstrap_method_attr_index: u16, name: &str, descriptor: &str) -> Result<u16, PoolError> {
		let name_and_type_index = self.add_name_and_type(name, descriptor)?;
		self.put(PoolEntry::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index })
	}

	pub fn add_module(&mut self, name: &str) -> Result<u16, PoolError> {
		let name_index = self.add_utf8(name)?;
		self.put(PoolEntry::Module { name_index })
	}

	pub fn add_package(&mut self, name: &str) -> Result<u16, PoolError> {
		let name_index = self.add_utf8(&descriptor::to_jvm_name(name))?;
		self.put(PoolEntry::Package { name_index })
	}

	pub fn get_utf8_bytes(&self, index: u16) -> Result<&[u8], PoolError> {
		match self.get(index)? {
			PoolEntry::Utf8(bytes) => Ok(bytes),
			entry => Err(wrong_kind!(index, entry, "an utf8")),
		}
	}

	pub fn get_java_utf8(&self, index: u16) -> Result<JavaString, PoolError> {
		jstring::decode(self.get_utf8_bytes(index)?).ok_or(PoolError::InvalidUtf8(index))
	}

	pub fn get_utf8(&self, index: u16) -> Result<String, PoolError> {
		jstring::decode_str(self.get_utf8_bytes(index)?).ok_or(PoolError::InvalidUtf8(index))
	}

	pub fn find_utf8(&self, string: &str) -> Option<u16> {
		self.map.get(&PoolEntry::Utf8(jstring::encode(string))).copied()
	}

	/// Looks up a class entry without adding one.
	pub fn find_class(&self, name: &str) -> Option<u16> {
		let name_index = self.find_utf8(&descriptor::to_jvm_name(name))?;
		self.map.get(&PoolEntry::Class { name_index }).copied()
	}

	/// The class name of a class entry, as stored: `a/b/C`.
	pub fn get_class_name_jvm(&self, index: u16) -> Result<String, PoolError> {
		match *self.get(index)? {
			PoolEntry::Class { name_index } => self.get_utf8(name_index),
			ref entry => Err(wrong_kind!(index, entry, "a class")),
		}
	}

	/// The class name of a class entry, in the `a.b.C` form.
	pub fn get_class_name(&self, index: u16) -> Result<String, PoolError> {
		self.get_class_name_jvm(index).map(|name| descriptor::to_java_name(&name))
	}

	/// Returns the name and descriptor indices of a name and type entry.
	pub fn get_name_and_type(&self, index: u16) -> Result<(u16, u16), PoolError> {
		match *self.get(index)? {
			PoolEntry::NameAndType { name_index, descriptor_index } => Ok((name_index, descriptor_index)),
			ref entry => Err(wrong_kind!(index, entry, "a name and type")),
		}
	}

	pub fn get_name_and_type_name(&self, index: u16) -> Result<String, PoolError> {
		self.get_utf8(self.get_name_and_type(index)?.0)
	}

	pub fn get_name_and_type_descriptor(&self, index: u16) -> Result<String, PoolError> {
		self.get_utf8(self.get_name_and_type(index)?.1)
	}

	/// Returns the class and name and type indices of a field, method or interface method ref.
	pub fn get_member_ref(&self, index: u16) -> Result<(u16, u16), PoolError> {
		match *self.get(index)? {
			PoolEntry::FieldRef { class_index, name_and_type_index } |
			PoolEntry::MethodRef { class_index, name_and_type_index } |
			PoolEntry::InterfaceMethodRef { class_index, name_and_type_index } => Ok((class_index, name_and_type_index)),
			ref entry => Err(wrong_kind!(index, entry, "a member ref")),
		}
	}

	pub fn get_member_class_name(&self, index: u16) -> Result<String, PoolError> {
		self.get_class_name(self.get_member_ref(index)?.0)
	}

	pub fn get_member_name(&self, index: u16) -> Result<String, PoolError> {
		self.get_name_and_type_name(self.get_member_ref(index)?.1)
	}

	/// The descriptor of a member ref.
	pub fn get_member_type(&self, index: u16) -> Result<String, PoolError> {
		self.get_name_and_type_descriptor(self.get_member_ref(index)?.1)
	}

	pub fn get_string(&self, index: u16) -> Result<String, PoolError> {
		match *self.get(index)? {
			PoolEntry::String { string_index } => self.get_utf8(string_index),
			ref entry => Err(wrong_kind!(index, entry, "a string")),
		}
	}

	pub fn get_integer(&self, index: u16) -> Result<i32, PoolError> {
		match *self.get(index)? {
			PoolEntry::Integer(value) => Ok(value),
			ref entry => Err(wrong_kind!(index, entry, "an integer")),
		}
	}

	pub fn get_float(&self, index: u16) -> Result<f32, PoolError> {
		match *self.get(index)? {
			PoolEntry::Float(bits) => Ok(f32::from_bits(bits)),
			ref entry => Err(wrong_kind!(index, entry, "a float")),
		}
	}

	pub fn get_long(&self, index: u16) -> Result<i64, PoolError> {
		match *self.get(index)? {
			PoolEntry::Long(value) => Ok(value),
			ref entry => Err(wrong_kind!(index, entry, "a long")),
		}
	}

	pub fn get_double(&self, index: u16) -> Result<f64, PoolError> {
		match *self.get(index)? {
			PoolEntry::Double(bits) => Ok(f64::from_bits(bits)),
			ref entry => Err(wrong_kind!(index, entry, "a double")),
		}
	}

	/// Returns the reference kind and reference index of a method handle.
	pub fn get_method_handle(&self, index: u16) -> Result<(u8, u16), PoolError> {
		match *self.get(index)? {
			PoolEntry::MethodHandle { reference_kind, reference_index } => Ok((reference_kind, reference_index)),
			ref entry => Err(wrong_kind!(index, entry, "a method handle")),
		}
	}

	/// The descriptor of a method type.
	pub fn get_method_type(&self, index: u16) -> Result<String, PoolError> {
		match *self.get(index)? {
			PoolEntry::MethodType { descriptor_index } => self.get_utf8(descriptor_index),
			ref entry => Err(wrong_kind!(index, entry, "a method type")),
		}
	}

	/// Returns the bootstrap method attribute index and the name and type index of a dynamic or invoke dynamic entry.
	pub fn get_dynamic(&self, index: u16) -> Result<(u16, u16), PoolError> {
		match *self.get(index)? {
			PoolEntry::Dynamic { bootstrap_method_attr_index, name_and_type_index } |
			PoolEntry::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index } => {
				Ok((bootstrap_method_attr_index, name_and_type_index))
			},
			ref entry => Err(wrong_kind!(index, entry, "a dynamic")),
		}
	}

	/// The names of all classes referenced by class entries, in the `a.b.C` form. Array classes contribute their
	/// element class.
	pub fn class_names(&self) -> Result<BTreeSet<String>, PoolError> {
		let mut names = BTreeSet::new();
		for (_, entry) in self.entries() {
			if let PoolEntry::Class { name_index } = *entry {
				let name = self.get_utf8(name_index)?;
				if let Some(element) = descriptor::element_class_name(&name) {
					names.insert(descriptor::to_java_name(element));
				}
			}
		}
		Ok(names)
	}

	/// Copies the entry at `index`, together with all entries it references, into `dest`.
	///
	/// Class names that are keys of `map` are replaced, also in descriptors. The source pool is not changed.
	/// Returns the index in `dest`.
	pub fn copy(&self, index: u16, dest: &mut ConstPool, map: &ClassMap) -> Result<u16, PoolError> {
		let entry = match *self.get(index)? {
			PoolEntry::Padding => return Err(PoolError::InvalidIndex(index)),
			PoolEntry::Utf8(ref bytes) => PoolEntry::Utf8(bytes.clone()),
			PoolEntry::Integer(value) => PoolEntry::Integer(value),
			PoolEntry::Float(bits) => PoolEntry::Float(bits),
			PoolEntry::Long(value) => PoolEntry::Long(value),
			PoolEntry::Double(bits) => PoolEntry::Double(bits),
			PoolEntry::Class { name_index } => {
				let name_index = self.copy_renamed(name_index, dest, |name| map.rename_class_name(name))?;
				PoolEntry::Class { name_index }
			},
			PoolEntry::String { string_index } => {
				PoolEntry::String { string_index: self.copy(string_index, dest, map)? }
			},
			PoolEntry::FieldRef { class_index, name_and_type_index } => PoolEntry::FieldRef {
				class_index: self.copy(class_index, dest, map)?,
				name_and_type_index: self.copy(name_and_type_index, dest, map)?,
			},
			PoolEntry::MethodRef { class_index, name_and_type_index } => PoolEntry::MethodRef {
				class_index: self.copy(class_index, dest, map)?,
				name_and_type_index: self.copy(name_and_type_index, dest, map)?,
			},
			PoolEntry::InterfaceMethodRef { class_index, name_and_type_index } => PoolEntry::InterfaceMethodRef {
				class_index: self.copy(class_index, dest, map)?,
				name_and_type_index: self.copy(name_and_type_index, dest, map)?,
			},
			PoolEntry::NameAndType { name_index, descriptor_index } => PoolEntry::NameAndType {
				name_index: self.copy(name_index, dest, map)?,
				descriptor_index: self.copy_renamed(descriptor_index, dest, |d| descriptor::rename_descriptor(d, map))?,
			},
			PoolEntry::MethodHandle { reference_kind, reference_index } => PoolEntry::MethodHandle {
				reference_kind,
				reference_index: self.copy(reference_index, dest, map)?,
			},
			PoolEntry::MethodType { descriptor_index } => PoolEntry::MethodType {
				descriptor_index: self.copy_renamed(descriptor_index, dest, |d| descriptor::rename_descriptor(d, map))?,
			},
			PoolEntry::Dynamic { bootstrap_method_attr_index, name_and_type_index } => PoolEntry::Dynamic {
				bootstrap_method_attr_index,
				name_and_type_index: self.copy(name_and_type_index, dest, map)?,
			},
			PoolEntry::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index } => PoolEntry::InvokeDynamic {
				bootstrap_method_attr_index,
				name_and_type_index: self.copy(name_and_type_index, dest, map)?,
			},
			PoolEntry::Module { name_index } => PoolEntry::Module { name_index: self.copy(name_index, dest, map)? },
			PoolEntry::Package { name_index } => PoolEntry::Package { name_index: self.copy(name_index, dest, map)? },
		};
		dest.put(entry)
	}

	/// Copies an utf8 entry, passing its string through `rename` first. Strings that can't be decoded are copied as is.
	pub(crate) fn copy_renamed(&self, index: u16, dest: &mut ConstPool, rename: impl FnOnce(&str) -> Option<String>) -> Result<u16, PoolError> {
		let bytes = self.get_utf8_bytes(index)?;
		match jstring::decode_str(bytes).and_then(|string| rename(&string)) {
			Some(renamed) => dest.add_utf8(&renamed),
			None => dest.add_utf8_bytes(bytes.to_vec()),
		}
	}

	/// Renames the class `old` to `new` in all class, name and type and method type entries.
	pub fn rename_class(&mut self, old: &str, new: &str) -> Result<(), PoolError> {
		self.rename_classes(&ClassMap::single(old, new))
	}

	/// Renames classes in all class, name and type and method type entries.
	///
	/// Renamed entries are pointed to new utf8 entries, so that other users of the old strings aren't affected.
	pub fn rename_classes(&mut self, map: &ClassMap) -> Result<(), PoolError> {
		if map.is_empty() {
			return Ok(());
		}

		let count = self.entries.len();
		let mut changed = 0;
		for index in 1..count {
			let replacement = match self.entries[index] {
				PoolEntry::Class { name_index } => Renamed::Class { name_index },
				PoolEntry::NameAndType { name_index, descriptor_index } => Renamed::NameAndType { name_index, descriptor_index },
				PoolEntry::MethodType { descriptor_index } => Renamed::MethodType { descriptor_index },
				_ => continue,
			};
			let replacement = match replacement {
				Renamed::Class { name_index } => {
					self.renamed_utf8(name_index, |name| map.rename_class_name(name))?
						.map(|name_index| PoolEntry::Class { name_index })
				},
				Renamed::NameAndType { name_index, descriptor_index } => {
					self.renamed_utf8(descriptor_index, |d| descriptor::rename_descriptor(d, map))?
						.map(|descriptor_index| PoolEntry::NameAndType { name_index, descriptor_index })
				},
				Renamed::MethodType { descriptor_index } => {
					self.renamed_utf8(descriptor_index, |d| descriptor::rename_descriptor(d, map))?
						.map(|descriptor_index| PoolEntry::MethodType { descriptor_index })
				},
			};
			if let Some(replacement) = replacement {
				self.entries[index] = replacement;
				changed += 1;
			}
		}

		// renaming can make entries equal that weren't before
		self.rebuild_map();

		trace!("renamed {changed} constant pool entries for {} class mappings", map.len());
		Ok(())
	}

	/// Interns the renamed string of an utf8 entry, returning [`None`] if `rename` doesn't change it.
	pub(crate) fn renamed_utf8(&mut self, index: u16, rename: impl FnOnce(&str) -> Option<String>) -> Result<Option<u16>, PoolError> {
		let Some(string) = jstring::decode_str(self.get_utf8_bytes(index)?) else {
			return Ok(None);
		};
		rename(&string).map(|renamed| self.add_utf8(&renamed)).transpose()
	}

	pub(crate) fn read(reader: &mut ByteReader) -> Result<ConstPool, DecodeError> {
		let count = reader.read_u16_as_usize()?;
		let mut pool = ConstPool {
			entries: Vec::with_capacity(count),
			map: HashMap::new(),
		};
		pool.entries.push(PoolEntry::Padding);

		while pool.entries.len() < count {
			let offset = reader.offset();
			let entry = read_entry(reader)?;
			if entry.is_wide() && pool.entries.len() + 1 == count {
				return Err(DecodeError::malformed(offset, format!("{} takes two slots, but is the last entry", entry.kind_name())));
			}
			pool.push(entry).map_err(|e| DecodeError::new(offset, e.into()))?;
		}

		if count == 0 {
			return Err(reader.malformed("constant pool count is zero"));
		}

		Ok(pool)
	}

	pub(crate) fn write(&self, writer: &mut Vec<u8>) -> Result<(), EncodeError> {
		writer.write_usize_as_u16(self.entries.len(), "constant pool")?;

		for entry in &self.entries[1..] {
			match *entry {
				PoolEntry::Padding => {},
				PoolEntry::Utf8(ref bytes) => {
					writer.write_u8(tag::UTF8);
					writer.write_usize_as_u16(bytes.len(), "utf8 constant")?;
					writer.write_u8_slice(bytes);
				},
				PoolEntry::Integer(value) => {
					writer.write_u8(tag::INTEGER);
					writer.write_i32(value);
				},
				PoolEntry::Float(bits) => {
					writer.write_u8(tag::FLOAT);
					writer.write_u32(bits);
				},
				PoolEntry::Long(value) => {
					writer.write_u8(tag::LONG);
					writer.write_i64(value);
				},
				PoolEntry::Double(bits) => {
					writer.write_u8(tag::DOUBLE);
					writer.write_u64(bits);
				},
				PoolEntry::Class { name_index } => {
					writer.write_u8(tag::CLASS);
					writer.write_u16(name_index);
				},
				PoolEntry::String { string_index } => {
					writer.write_u8(tag::STRING);
					writer.write_u16(string_index);
				},
				PoolEntry::FieldRef { class_index, name_and_type_index } => {
					writer.write_u8(tag::FIELD_REF);
					writer.write_u16(class_index);
					writer.write_u16(name_and_type_index);
				},
				PoolEntry::MethodRef { class_index, name_and_type_index } => {
					writer.write_u8(tag::METHOD_REF);
					writer.write_u16(class_index);
					writer.write_u16(name_and_type_index);
				},
				PoolEntry::InterfaceMethodRef { class_index, name_and_type_index } => {
					writer.write_u8(tag::INTERFACE_METHOD_REF);
					writer.write_u16(class_index);
					writer.write_u16(name_and_type_index);
				},
				PoolEntry::NameAndType { name_index, descriptor_index } => {
					writer.write_u8(tag::NAME_AND_TYPE);
					writer.write_u16(name_index);
					writer.write_u16(descriptor_index);
				},
				PoolEntry::MethodHandle { reference_kind, reference_index } => {
					writer.write_u8(tag::METHOD_HANDLE);
					writer.write_u8(reference_kind);
					writer.write_u16(reference_index);
				},
				PoolEntry::MethodType { descriptor_index } => {
					writer.write_u8(tag::METHOD_TYPE);
					writer.write_u16(descriptor_index);
				},
				PoolEntry::Dynamic { bootstrap_method_attr_index, name_and_type_index } => {
					writer.write_u8(tag::DYNAMIC);
					writer.write_u16(bootstrap_method_attr_index);
					writer.write_u16(name_and_type_index);
				},
				PoolEntry::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index } => {
					writer.write_u8(tag::INVOKE_DYNAMIC);
					writer.write_u16(bootstrap_method_attr_index);
					writer.write_u16(name_and_type_index);
				},
				PoolEntry::Module { name_index } => {
					writer.write_u8(tag::MODULE);
					writer.write_u16(name_index);
				},
				PoolEntry::Package { name_index } => {
					writer.write_u8(tag::PACKAGE);
					writer.write_u16(name_index);
				},
			}
		}

		Ok(())
	}
}

/// The entries [`ConstPool::rename_classes`] looks at.
enum Renamed {
	Class { name_index: u16 },
	NameAndType { name_index: u16, descriptor_index: u16 },
	MethodType { descriptor_index: u16 },
}

fn read_entry(reader: &mut ByteReader) -> Result<PoolEntry, DecodeError> {
	let offset = reader.offset();
	Ok(match reader.read_u8()? {
		tag::UTF8 => {
			let length = reader.read_u16_as_usize()?;
			PoolEntry::Utf8(reader.read_bytes(length)?.to_vec())
		},
		tag::INTEGER => PoolEntry::Integer(reader.read_i32()?),
		tag::FLOAT => PoolEntry::Float(reader.read_u32()?),
		tag::LONG => PoolEntry::Long(reader.read_i64()?),
		tag::DOUBLE => PoolEntry::Double(reader.read_u64()?),
		tag::CLASS => PoolEntry::Class { name_index: reader.read_u16()? },
		tag::STRING => PoolEntry::String { string_index: reader.read_u16()? },
		tag::FIELD_REF => PoolEntry::FieldRef {
			class_index: reader.read_u16()?,
			name_and_type_index: reader.read_u16()?,
		},
		tag::METHOD_REF => PoolEntry::MethodRef {
			class_index: reader.read_u16()?,
			name_and_type_index: reader.read_u16()?,
		},
		tag::INTERFACE_METHOD_REF => PoolEntry::InterfaceMethodRef {
			class_index: reader.read_u16()?,
			name_and_type_index: reader.read_u16()?,
		},
		tag::NAME_AND_TYPE => PoolEntry::NameAndType {
			name_index: reader.read_u16()?,
			descriptor_index: reader.read_u16()?,
		},
		tag::METHOD_HANDLE => PoolEntry::MethodHandle {
			reference_kind: reader.read_u8()?,
			reference_index: reader.read_u16()?,
		},
		tag::METHOD_TYPE => PoolEntry::MethodType { descriptor_index: reader.read_u16()? },
		tag::DYNAMIC => PoolEntry::Dynamic {
			bootstrap_method_attr_index: reader.read_u16()?,
			name_and_type_index: reader.read_u16()?,
		},
		tag::INVOKE_DYNAMIC => PoolEntry::InvokeDynamic {
			bootstrap_method_attr_index: reader.read_u16()?,
			name_and_type_index: reader.read_u16()?,
		},
		tag::MODULE => PoolEntry::Module { name_index: reader.read_u16()? },
		tag::PACKAGE => PoolEntry::Package { name_index: reader.read_u16()? },
		unknown => return Err(DecodeError::new(offset, DecodeErrorKind::UnknownTag(unknown))),
	})
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::class_map::ClassMap;
	use crate::codec::ByteReader;
	use crate::error::{DecodeErrorKind, PoolError};
	use crate::pool::{ConstPool, PoolEntry};

	#[test]
	fn interning() -> anyhow::Result<()> {
		let mut pool = ConstPool::new();
		let a = pool.add_utf8("foo")?;
		let b = pool.add_utf8("foo")?;
		assert_eq!(a, 1);
		assert_eq!(a, b);
		assert_eq!(pool.len(), 2);

		let class = pool.add_class("a.B")?;
		assert_eq!(pool.add_class("a/B")?, class);
		assert_eq!(pool.get_class_name(class)?, "a.B");
		assert_eq!(pool.get_class_name_jvm(class)?, "a/B");
		assert_eq!(pool.find_class("a.B"), Some(class));
		assert_eq!(pool.len(), 4);
		Ok(())
	}

	#[test]
	fn wide_entries() -> anyhow::Result<()> {
		let mut pool = ConstPool::new();
		let long = pool.add_long(7)?;
		let int = pool.add_integer(7)?;
		assert_eq!(long, 1);
		assert_eq!(int, 3);
		assert_eq!(pool.get(2), Err(PoolError::InvalidIndex(2)));
		assert_eq!(pool.get(0), Err(PoolError::InvalidIndex(0)));
		assert_eq!(pool.get_long(long), Ok(7));
		assert_eq!(pool.add_double(1.5)?, 4);
		assert_eq!(pool.get_double(4), Ok(1.5));
		assert_eq!(pool.len(), 6);
		Ok(())
	}

	#[test]
	fn wrong_kind() -> anyhow::Result<()> {
		let mut pool = ConstPool::new();
		let utf8 = pool.add_utf8("x")?;
		assert_eq!(
			pool.get_class_name(utf8),
			Err(PoolError::WrongKind { index: utf8, expected: "a class", found: "an utf8" })
		);
		Ok(())
	}

	#[test]
	fn member_accessors() -> anyhow::Result<()> {
		let mut pool = ConstPool::new();
		let method = pool.add_method_ref("java.lang.Object", "<init>", "()V")?;
		assert_eq!(pool.get_member_class_name(method)?, "java.lang.Object");
		assert_eq!(pool.get_member_name(method)?, "<init>");
		assert_eq!(pool.get_member_type(method)?, "()V");
		assert_eq!(pool.add_method_ref("java/lang/Object", "<init>", "()V")?, method);
		Ok(())
	}

	#[test]
	fn copy_with_rename() -> anyhow::Result<()> {
		let mut src = ConstPool::new();
		let field = src.add_field_ref("a.B", "x", "La/B;")?;
		let before = src.clone();

		let mut dest = ConstPool::new();
		let copied = src.copy(field, &mut dest, &ClassMap::single("a.B", "a.C"))?;

		assert_eq!(src, before);
		assert_eq!(dest.get_member_class_name(copied)?, "a.C");
		assert_eq!(dest.get_member_type(copied)?, "La/C;");
		assert_eq!(dest.find_utf8("a/B"), None);

		// copying again gives the same index
		assert_eq!(src.copy(field, &mut dest, &ClassMap::single("a.B", "a.C"))?, copied);
		Ok(())
	}

	#[test]
	fn rename_keeps_shared_strings() -> anyhow::Result<()> {
		let mut pool = ConstPool::new();
		let string = pool.add_string("a/B")?;
		let class = pool.add_class("a/B")?;
		let method = pool.add_method_ref("x/Y", "m", "(La/B;)V")?;

		pool.rename_class("a.B", "a.C")?;

		assert_eq!(pool.get_string(string)?, "a/B");
		assert_eq!(pool.get_class_name(class)?, "a.C");
		assert_eq!(pool.get_member_type(method)?, "(La/C;)V");
		assert_eq!(pool.add_class("a.C")?, class);
		Ok(())
	}

	#[test]
	fn class_names() -> anyhow::Result<()> {
		let mut pool = ConstPool::new();
		pool.add_class("a/B")?;
		pool.add_class("[[Lc/D;")?;
		pool.add_class("[I")?;
		let names: Vec<String> = pool.class_names()?.into_iter().collect();
		assert_eq!(names, vec!["a.B".to_owned(), "c.D".to_owned()]);
		Ok(())
	}

	#[test]
	fn read_write() -> anyhow::Result<()> {
		let mut pool = ConstPool::new();
		pool.add_method_ref("a/B", "m", "()V")?;
		pool.add_long(-1)?;
		pool.add_float(0.5)?;
		pool.add_invoke_dynamic(0, "run", "()Ljava/lang/Runnable;")?;
		pool.add_method_handle(6, 1)?;

		let mut bytes = Vec::new();
		pool.write(&mut bytes)?;
		let read = ConstPool::read(&mut ByteReader::new(&bytes))?;
		assert_eq!(read, pool);

		let mut again = Vec::new();
		read.write(&mut again)?;
		assert_eq!(again, bytes);
		Ok(())
	}

	#[test]
	fn read_keeps_duplicates() -> anyhow::Result<()> {
		// two equal utf8 entries
		let bytes = [0, 3, 1, 0, 1, b'a', 1, 0, 1, b'a'];
		let mut pool = ConstPool::read(&mut ByteReader::new(&bytes))?;
		assert_eq!(pool.get(2), Ok(&PoolEntry::Utf8(b"a".to_vec())));
		assert_eq!(pool.add_utf8("a")?, 1);
		Ok(())
	}

	#[test]
	fn unknown_tag() -> anyhow::Result<()> {
		let bytes = [0, 2, 2, 0, 0];
		let error = ConstPool::read(&mut ByteReader::new(&bytes)).err().ok_or_else(|| anyhow::anyhow!("read should fail"))?;
		assert_eq!(error.offset, 2);
		assert_eq!(error.kind, DecodeErrorKind::UnknownTag(2));
		Ok(())
	}

	#[test]
	fn long_as_last_entry() -> anyhow::Result<()> {
		let bytes = [0, 2, 5, 0, 0, 0, 0, 0, 0, 0, 1];
		assert!(ConstPool::read(&mut ByteReader::new(&bytes)).is_err());
		Ok(())
	}
}
