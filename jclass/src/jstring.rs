//! Conversion between the modified UTF-8 stored in `CONSTANT_Utf8` entries and rust strings.
//!
//! Modified UTF-8 stores `\0` using two bytes and characters outside of the basic multilingual plane as two
//! three byte surrogates. See <https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html#jvms-4.4.7>.

use java_string::{JavaStr, JavaString};

/// Decodes modified UTF-8. Unpaired surrogates are allowed here.
pub(crate) fn decode(bytes: &[u8]) -> Option<JavaString> {
	JavaString::from_modified_utf8(bytes.to_vec()).ok()
}

/// Decodes modified UTF-8 into a [`String`], failing for unpaired surrogates.
pub(crate) fn decode_str(bytes: &[u8]) -> Option<String> {
	// most names are plain ascii, where both encodings agree
	if bytes.iter().all(|&b| (0x01..0x80).contains(&b)) {
		return String::from_utf8(bytes.to_vec()).ok();
	}
	decode(bytes)?.into_string().ok()
}

pub(crate) fn encode(string: &str) -> Vec<u8> {
	encode_java(JavaStr::from_str(string))
}

pub(crate) fn encode_java(string: &JavaStr) -> Vec<u8> {
	string.to_modified_utf8().into_owned()
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::jstring::{decode_str, encode};

	#[test]
	fn ascii() {
		assert_eq!(encode("java/lang/Object"), b"java/lang/Object".to_vec());
		assert_eq!(decode_str(b"<init>"), Some("<init>".to_owned()));
	}

	#[test]
	fn nul_uses_two_bytes() {
		assert_eq!(encode("a\0b"), vec![b'a', 0xc0, 0x80, b'b']);
		assert_eq!(decode_str(&[b'a', 0xc0, 0x80, b'b']), Some("a\0b".to_owned()));
	}

	#[test]
	fn supplementary_characters_use_surrogates() {
		let raw = vec![0xed, 0xa0, 0xbd, 0xed, 0xb8, 0x80];
		assert_eq!(encode("\u{1f600}"), raw);
		assert_eq!(decode_str(&raw), Some("\u{1f600}".to_owned()));
	}
}
