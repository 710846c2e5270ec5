use pretty_assertions::assert_eq;
use jclass::attribute::AttributeKind;
use jclass::class_map::ClassMap;
use jclass::error::DecodeErrorKind;
use jclass::pool::ConstPool;
use jclass::{ClassFile, Version};

fn utf8(bytes: &mut Vec<u8>, string: &str) {
	bytes.push(1);
	bytes.extend_from_slice(&(string.len() as u16).to_be_bytes());
	bytes.extend_from_slice(string.as_bytes());
}

/// `public class A` compiled without any members, with an attribute called `Custom`.
fn minimal_class() -> Vec<u8> {
	let mut bytes = vec![0xca, 0xfe, 0xba, 0xbe, 0, 0, 0, 52];
	bytes.extend_from_slice(&[0, 6]);
	bytes.extend_from_slice(&[7, 0, 2]);
	utf8(&mut bytes, "A");
	bytes.extend_from_slice(&[7, 0, 4]);
	utf8(&mut bytes, "java/lang/Object");
	utf8(&mut bytes, "Custom");
	// access, this, super, no interfaces, fields or methods
	bytes.extend_from_slice(&[0x00, 0x21, 0, 1, 0, 3, 0, 0, 0, 0, 0, 0]);
	bytes.extend_from_slice(&[0, 1, 0, 5, 0, 0, 0, 3, 1, 2, 3]);
	bytes
}

#[test]
fn hand_written_class() -> anyhow::Result<()> {
	let bytes = minimal_class();
	let class = jclass::parse(&bytes)?;

	assert_eq!(class.version, Version::V1_8);
	assert_eq!(class.name()?, "A");
	assert_eq!(class.super_name()?, Some("java.lang.Object".to_owned()));
	assert_eq!(class.interface_names()?, Vec::<String>::new());
	assert!(!class.is_interface());

	let custom = class.attribute("Custom").map(|attribute| attribute.kind.clone());
	assert_eq!(custom, Some(AttributeKind::Unknown(vec![1, 2, 3])));

	assert_eq!(jclass::serialize(&class)?, bytes);
	Ok(())
}

#[test]
fn truncated_class() {
	let bytes = minimal_class();
	for length in [0, 3, 9, 20, bytes.len() - 1] {
		let error = jclass::parse(&bytes[..length]).unwrap_err();
		assert!(matches!(error.kind, DecodeErrorKind::UnexpectedEnd { .. }), "length {length}: {error}");
	}
}

#[test]
fn interning() -> anyhow::Result<()> {
	let mut pool = ConstPool::new();
	let before = pool.len();

	let foo = pool.add_utf8("foo")?;
	assert_eq!(pool.len(), before + 1);
	assert_eq!(pool.add_utf8("foo")?, foo);
	assert_eq!(pool.len(), before + 1);

	let class = pool.add_class("a.b.Foo")?;
	let length = pool.len();
	assert_eq!(pool.add_class("a.b.Foo")?, class);
	assert_eq!(pool.len(), length);
	assert_eq!(pool.find_class("a.b.Foo"), Some(class));
	Ok(())
}

#[test]
fn copy_with_rename() -> anyhow::Result<()> {
	let mut src = ConstPool::new();
	let field = src.add_field_ref("a.B", "next", "La/B;")?;

	let mut dest = ConstPool::new();
	let copy = src.copy(field, &mut dest, &ClassMap::single("a.B", "a.C"))?;
	assert_eq!(dest.get_member_class_name(copy)?, "a.C");
	assert_eq!(dest.get_member_name(copy)?, "next");
	assert_eq!(dest.get_member_type(copy)?, "La/C;");

	assert_eq!(src.get_member_class_name(field)?, "a.B");
	assert_eq!(src.get_member_type(field)?, "La/B;");
	Ok(())
}

#[test]
fn rename_and_compact() -> anyhow::Result<()> {
	let mut class = jclass::parse(&minimal_class())?;
	class.add_interface("java.lang.Runnable")?;
	class.rename_class("A", "org.example.A")?;
	class.compact()?;

	let parsed = ClassFile::parse(&class.serialize()?)?;
	assert_eq!(parsed.name()?, "org.example.A");
	assert_eq!(parsed.interface_names()?, vec!["java.lang.Runnable".to_owned()]);
	assert_eq!(parsed.pool.find_utf8("A"), None);
	assert!(parsed.attribute("Custom").is_some());
	Ok(())
}
