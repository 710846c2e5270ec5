//! Reading, editing and writing of java class files.
//!
//! A class file is parsed into a [`ClassFile`], which owns its [`ConstPool`]. All members and attributes refer to
//! pool entries by index. Writing it back with [`serialize`] gives the same bytes as were read, as long as nothing
//! was changed.
//!
//! ```
//! # use pretty_assertions::assert_eq;
//! use jclass::{ClassFile, Version};
//! use jclass::bytecode::opcode;
//! use jclass::attribute::code::CodeAttribute;
//! use jclass::member::MemberInfo;
//!
//! let mut class = ClassFile::new(false, "org.example.Main", None, Version::DEFAULT)?;
//! let mut method = MemberInfo::new(&mut class.pool, 0x0009, "main", "([Ljava/lang/String;)V")?;
//! method.set_code(&mut class.pool, CodeAttribute::new(0, 1, vec![opcode::RETURN]))?;
//! class.add_method(method)?;
//!
//! let bytes = jclass::serialize(&class)?;
//! let parsed = jclass::parse(&bytes)?;
//! assert_eq!(parsed.name()?, "org.example.Main");
//! # Ok::<(), jclass::error::Error>(())
//! ```
//!
//! Instructions are edited through a [`CodeEditor`](bytecode::editor::CodeEditor), which keeps all branches, the
//! exception table and the debug and stack map tables pointing at the right instructions.

pub mod attribute;
pub mod bytecode;
pub mod class;
pub mod class_constants;
pub mod class_map;
mod codec;
pub mod descriptor;
pub mod error;
mod jstring;
pub mod member;
pub mod pool;

pub use attribute::code::CodeAttribute;
pub use bytecode::editor::CodeEditor;
pub use bytecode::stack::compute_max_stack;
pub use class::{ClassFile, Version};
pub use class_map::ClassMap;
pub use error::{DecodeError, EditError, EncodeError, Error, PoolError, VerifyError};
pub use pool::ConstPool;

/// Parses a class file.
pub fn parse(bytes: &[u8]) -> Result<ClassFile, DecodeError> {
	ClassFile::parse(bytes)
}

/// Writes a class file.
pub fn serialize(class: &ClassFile) -> Result<Vec<u8>, EncodeError> {
	class.serialize()
}
