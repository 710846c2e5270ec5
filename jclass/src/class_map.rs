use indexmap::IndexMap;
use crate::descriptor;

/// A map from old class names to new class names, used when renaming or copying between constant pools.
///
/// Names can be given in either the `a.b.C` or `a/b/C` form, they're stored in the latter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassMap {
	map: IndexMap<String, String>,
}

impl ClassMap {
	pub fn new() -> ClassMap {
		ClassMap::default()
	}

	/// A map containing only the single substitution from `old` to `new`.
	pub fn single(old: &str, new: &str) -> ClassMap {
		let mut map = ClassMap::new();
		map.put(old, new);
		map
	}

	/// Adds a substitution. Mapping a name to itself is ignored.
	pub fn put(&mut self, old: &str, new: &str) {
		let old = descriptor::to_jvm_name(old);
		let new = descriptor::to_jvm_name(new);
		if old != new {
			self.map.insert(old, new);
		}
	}

	/// Looks up a name in either form, returning the new name in the `a/b/C` form.
	pub fn get(&self, name: &str) -> Option<&str> {
		if name.contains('.') {
			self.get_jvm(&descriptor::to_jvm_name(name))
		} else {
			self.get_jvm(name)
		}
	}

	/// Looks up a name in the `a/b/C` form.
	pub fn get_jvm(&self, name: &str) -> Option<&str> {
		self.map.get(name).map(String::as_str)
	}

	pub fn is_empty(&self) -> bool {
		self.map.is_empty()
	}

	pub fn len(&self) -> usize {
		self.map.len()
	}

	pub fn iter(&self) -> impl Iterator<Item=(&str, &str)> {
		self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Renames the name of a `CONSTANT_Class` entry, which might also be an array descriptor like `[La/B;`.
	///
	/// Returns [`None`] if the name isn't changed.
	pub fn rename_class_name(&self, name: &str) -> Option<String> {
		if name.starts_with('[') {
			descriptor::rename_descriptor(name, self)
		} else {
			self.get_jvm(name).map(str::to_owned)
		}
	}
}

impl<S: AsRef<str>, T: AsRef<str>> FromIterator<(S, T)> for ClassMap {
	fn from_iter<I: IntoIterator<Item=(S, T)>>(iter: I) -> ClassMap {
		let mut map = ClassMap::new();
		for (old, new) in iter {
			map.put(old.as_ref(), new.as_ref());
		}
		map
	}
}
