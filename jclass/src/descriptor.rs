//! Helpers for class names, descriptors and generic signatures.
//!
//! Class names come in two forms: the java form `java.lang.Object`, used by the public API of this crate, and the
//! form stored inside class files, `java/lang/Object`.

use crate::class_map::ClassMap;

/// Converts `a.b.C` into `a/b/C`. Names already in that form are returned unchanged.
pub fn to_jvm_name(name: &str) -> String {
	name.replace('.', "/")
}

/// Converts `a/b/C` into `a.b.C`.
pub fn to_java_name(name: &str) -> String {
	name.replace('/', ".")
}

/// Creates the field descriptor `La/b/C;` of a class name in either form.
pub fn of_class(name: &str) -> String {
	format!("L{};", to_jvm_name(name))
}

/// For a `CONSTANT_Class` name, returns the name of the class, resolving array classes to their element class.
///
/// Returns [`None`] for arrays of primitives.
pub fn element_class_name(name: &str) -> Option<&str> {
	let element = name.trim_start_matches('[');
	if element.len() == name.len() {
		Some(name)
	} else {
		element.strip_prefix('L')?.strip_suffix(';')
	}
}

/// Substitutes all class names in a field or method descriptor.
///
/// Returns [`None`] if nothing was renamed.
pub fn rename_descriptor(descriptor: &str, map: &ClassMap) -> Option<String> {
	if map.is_empty() {
		return None;
	}

	let bytes = descriptor.as_bytes();
	let mut out = String::with_capacity(descriptor.len());
	let mut flushed = 0;
	let mut changed = false;

	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b'L' {
			let end = i + descriptor[i..].find(';')?;
			let name = &descriptor[i + 1..end];
			if let Some(new) = map.get_jvm(name) {
				out.push_str(&descriptor[flushed..=i]);
				out.push_str(new);
				flushed = end;
				changed = true;
			}
			i = end + 1;
		} else {
			i += 1;
		}
	}

	changed.then(|| {
		out.push_str(&descriptor[flushed..]);
		out
	})
}

/// Substitutes all class names in a generic signature, as found in the `Signature` and
/// `LocalVariableTypeTable` attributes. Class, method and field signatures are supported.
///
/// Returns [`None`] if nothing was renamed, or if the signature could not be parsed.
pub fn rename_signature(signature: &str, map: &ClassMap) -> Option<String> {
	if map.is_empty() {
		return None;
	}

	let mut renamer = SignatureRenamer {
		signature,
		bytes: signature.as_bytes(),
		pos: 0,
		out: String::with_capacity(signature.len()),
		map,
		changed: false,
	};

	renamer.signature()?;

	(renamer.pos == renamer.bytes.len() && renamer.changed).then_some(renamer.out)
}

struct SignatureRenamer<'s, 'm> {
	signature: &'s str,
	bytes: &'s [u8],
	pos: usize,
	out: String,
	map: &'m ClassMap,
	changed: bool,
}

impl SignatureRenamer<'_, '_> {
	fn peek(&self) -> Option<u8> {
		self.bytes.get(self.pos).copied()
	}

	/// Copies the next byte to the output, if it's the one expected.
	fn expect(&mut self, expected: u8) -> Option<()> {
		if self.peek()? != expected {
			return None;
		}
		self.out.push(expected as char);
		self.pos += 1;
		Some(())
	}

	/// Reads until one of the delimiters, not copying anything.
	fn identifier(&mut self, delimiters: &[u8]) -> Option<&str> {
		let start = self.pos;
		while !delimiters.contains(&self.peek()?) {
			self.pos += 1;
		}
		if start == self.pos {
			return None;
		}
		Some(&self.signature[start..self.pos])
	}

	fn signature(&mut self) -> Option<()> {
		if self.peek()? == b'<' {
			self.type_parameters()?;
		}

		if self.peek()? == b'(' {
			self.expect(b'(')?;
			while self.peek()? != b')' {
				self.java_type()?;
			}
			self.expect(b')')?;
			if self.peek()? == b'V' {
				self.expect(b'V')?;
			} else {
				self.java_type()?;
			}
			while self.peek() == Some(b'^') {
				self.expect(b'^')?;
				self.reference_type()?;
			}
		} else {
			while self.peek().is_some() {
				self.reference_type()?;
			}
		}
		Some(())
	}

	fn type_parameters(&mut self) -> Option<()> {
		self.expect(b'<')?;
		while self.peek()? != b'>' {
			let name = self.identifier(b":")?;
			let name = name.to_owned();
			self.out.push_str(&name);
			self.expect(b':')?;
			// the class bound may be empty
			if self.peek()? != b':' {
				self.reference_type()?;
			}
			while self.peek()? == b':' {
				self.expect(b':')?;
				self.reference_type()?;
			}
		}
		self.expect(b'>')
	}

	fn java_type(&mut self) -> Option<()> {
		match self.peek()? {
			b @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => self.expect(b),
			_ => self.reference_type(),
		}
	}

	fn reference_type(&mut self) -> Option<()> {
		match self.peek()? {
			b'L' => self.class_type(),
			b'T' => {
				self.expect(b'T')?;
				let name = self.identifier(b";")?.to_owned();
				self.out.push_str(&name);
				self.expect(b';')
			},
			b'[' => {
				self.expect(b'[')?;
				self.java_type()
			},
			_ => None,
		}
	}

	fn class_type(&mut self) -> Option<()> {
		self.expect(b'L')?;

		let name = self.identifier(b"<.;")?.to_owned();
		if let Some(new) = self.map.get_jvm(&name) {
			self.out.push_str(new);
			self.changed = true;
		} else {
			self.out.push_str(&name);
		}
		if self.peek()? == b'<' {
			self.type_arguments()?;
		}

		// inner classes are named by their simple name only
		while self.peek()? == b'.' {
			self.expect(b'.')?;
			let simple = self.identifier(b"<.;")?.to_owned();
			self.out.push_str(&simple);
			if self.peek()? == b'<' {
				self.type_arguments()?;
			}
		}

		self.expect(b';')
	}

	fn type_arguments(&mut self) -> Option<()> {
		self.expect(b'<')?;
		while self.peek()? != b'>' {
			match self.peek()? {
				b'*' => self.expect(b'*')?,
				b @ (b'+' | b'-') => {
					self.expect(b)?;
					self.reference_type()?;
				},
				_ => self.reference_type()?,
			}
		}
		self.expect(b'>')
	}
}

/// Reads one field type starting at `*i`, returns the number of stack slots it takes.
fn field_type_size(bytes: &[u8], i: &mut usize, descriptor: &str) -> Option<i32> {
	let mut array = false;
	while *bytes.get(*i)? == b'[' {
		array = true;
		*i += 1;
	}
	let c = *bytes.get(*i)?;
	match c {
		b'L' => {
			*i += descriptor[*i..].find(';')? + 1;
		},
		b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => *i += 1,
		_ => return None,
	}
	Some(if !array && (c == b'J' || c == b'D') { 2 } else { 1 })
}

/// The change of the operand stack size caused by a value of the type.
///
/// For field descriptors, this is the size of the value: `2` for `long` and `double`, `0` for `void` and `1` otherwise.
/// For method descriptors, this is the size of the return value minus the size of the parameters.
pub fn data_size(descriptor: &str) -> Option<i32> {
	let bytes = descriptor.as_bytes();
	if bytes.first() == Some(&b'(') {
		let params = param_size(descriptor)?;
		let ret = &descriptor[descriptor.find(')')? + 1..];
		Some(return_size(ret)? - params as i32)
	} else {
		return_size(descriptor)
	}
}

fn return_size(descriptor: &str) -> Option<i32> {
	if descriptor == "V" {
		return Some(0);
	}
	let mut i = 0;
	let size = field_type_size(descriptor.as_bytes(), &mut i, descriptor)?;
	(i == descriptor.len()).then_some(size)
}

/// The number of local variable slots the parameters of a method descriptor take, not including `this`.
pub fn param_size(descriptor: &str) -> Option<u32> {
	let bytes = descriptor.as_bytes();
	if bytes.first() != Some(&b'(') {
		return None;
	}
	let mut i = 1;
	let mut size = 0;
	while *bytes.get(i)? != b')' {
		size += field_type_size(bytes, &mut i, descriptor)? as u32;
	}
	Some(size)
}
