//! Big endian reading and writing of the fixed width integers the class file format is built from.

use crate::error::{DecodeError, DecodeErrorKind, EncodeError};

/// A reader over a byte slice. Keeps track of the absolute offset, so that errors point into the whole class file,
/// even when reading the payload of a nested attribute.
#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
	data: &'a [u8],
	pos: usize,
	/// The absolute offset of `data[0]`.
	base: usize,
}

impl<'a> ByteReader<'a> {
	pub(crate) fn new(data: &'a [u8]) -> ByteReader<'a> {
		ByteReader { data, pos: 0, base: 0 }
	}

	/// The absolute offset of the next byte to be read.
	pub(crate) fn offset(&self) -> usize {
		self.base + self.pos
	}

	pub(crate) fn remaining(&self) -> usize {
		self.data.len() - self.pos
	}

	pub(crate) fn error(&self, kind: DecodeErrorKind) -> DecodeError {
		DecodeError::new(self.offset(), kind)
	}

	pub(crate) fn malformed(&self, message: impl Into<String>) -> DecodeError {
		DecodeError::malformed(self.offset(), message)
	}

	pub(crate) fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
		if self.remaining() < n {
			return Err(self.error(DecodeErrorKind::UnexpectedEnd { needed: n - self.remaining() }));
		}
		let slice = &self.data[self.pos..self.pos + n];
		self.pos += n;
		Ok(slice)
	}

	fn read_n<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
		let mut buf = [0u8; N];
		buf.copy_from_slice(self.read_bytes(N)?);
		Ok(buf)
	}

	pub(crate) fn read_u8(&mut self) -> Result<u8, DecodeError> {
		Ok(u8::from_be_bytes(self.read_n()?))
	}
	pub(crate) fn read_u16(&mut self) -> Result<u16, DecodeError> {
		Ok(u16::from_be_bytes(self.read_n()?))
	}
	pub(crate) fn read_u32(&mut self) -> Result<u32, DecodeError> {
		Ok(u32::from_be_bytes(self.read_n()?))
	}
	pub(crate) fn read_u64(&mut self) -> Result<u64, DecodeError> {
		Ok(u64::from_be_bytes(self.read_n()?))
	}
	pub(crate) fn read_i32(&mut self) -> Result<i32, DecodeError> {
		Ok(i32::from_be_bytes(self.read_n()?))
	}
	pub(crate) fn read_i64(&mut self) -> Result<i64, DecodeError> {
		Ok(i64::from_be_bytes(self.read_n()?))
	}

	pub(crate) fn read_u8_as_usize(&mut self) -> Result<usize, DecodeError> {
		Ok(self.read_u8()? as usize)
	}
	pub(crate) fn read_u16_as_usize(&mut self) -> Result<usize, DecodeError> {
		Ok(self.read_u16()? as usize)
	}
	pub(crate) fn read_u32_as_usize(&mut self) -> Result<usize, DecodeError> {
		Ok(self.read_u32()? as usize)
	}

	pub(crate) fn read_vec<T, S, E>(&mut self, get_size: S, mut get_element: E) -> Result<Vec<T>, DecodeError>
	where
		S: FnOnce(&mut Self) -> Result<usize, DecodeError>,
		E: FnMut(&mut Self) -> Result<T, DecodeError>,
	{
		let size = get_size(self)?;
		// don't trust the size for the allocation, the data might be truncated
		let mut vec = Vec::with_capacity(size.min(self.remaining()));
		for _ in 0..size {
			vec.push(get_element(self)?);
		}
		Ok(vec)
	}

	/// Splits off the next `n` bytes into a new reader that reports offsets relative to this one.
	pub(crate) fn sub_reader(&mut self, n: usize) -> Result<ByteReader<'a>, DecodeError> {
		let base = self.offset();
		let data = self.read_bytes(n)?;
		Ok(ByteReader { data, pos: 0, base })
	}

	/// Fails if there are unread bytes left.
	pub(crate) fn expect_end(&self, what: &str) -> Result<(), DecodeError> {
		if self.remaining() != 0 {
			Err(self.malformed(format!("{} trailing bytes after {what}", self.remaining())))
		} else {
			Ok(())
		}
	}
}

/// Writing of big endian values. Only implemented for [`Vec<u8>`], so the plain writes can't fail.
pub(crate) trait ClassWrite {
	fn write_u8_slice(&mut self, buf: &[u8]);

	fn write_u8(&mut self, value: u8) {
		self.write_u8_slice(&[value]);
	}
	fn write_u16(&mut self, value: u16) {
		self.write_u8_slice(&value.to_be_bytes());
	}
	fn write_u32(&mut self, value: u32) {
		self.write_u8_slice(&value.to_be_bytes());
	}
	fn write_u64(&mut self, value: u64) {
		self.write_u8_slice(&value.to_be_bytes());
	}
	fn write_i16(&mut self, value: i16) {
		self.write_u8_slice(&value.to_be_bytes());
	}
	fn write_i32(&mut self, value: i32) {
		self.write_u8_slice(&value.to_be_bytes());
	}
	fn write_i64(&mut self, value: i64) {
		self.write_u8_slice(&value.to_be_bytes());
	}

	fn write_usize_as_u8(&mut self, value: usize, what: &'static str) -> Result<(), EncodeError> {
		let value = u8::try_from(value).map_err(|_| EncodeError::TooLarge { what, length: value, bits: 8 })?;
		self.write_u8(value);
		Ok(())
	}
	fn write_usize_as_u16(&mut self, value: usize, what: &'static str) -> Result<(), EncodeError> {
		let value = u16::try_from(value).map_err(|_| EncodeError::TooLarge { what, length: value, bits: 16 })?;
		self.write_u16(value);
		Ok(())
	}
	fn write_usize_as_u32(&mut self, value: usize, what: &'static str) -> Result<(), EncodeError> {
		let value = u32::try_from(value).map_err(|_| EncodeError::TooLarge { what, length: value, bits: 32 })?;
		self.write_u32(value);
		Ok(())
	}

	fn write_slice<'t, T>(
		&mut self,
		slice: &'t [T],
		put_size: impl FnOnce(&mut Self, usize) -> Result<(), EncodeError>,
		mut put_element: impl FnMut(&mut Self, &'t T) -> Result<(), EncodeError>,
	) -> Result<(), EncodeError> {
		put_size(self, slice.len())?;
		for value in slice {
			put_element(self, value)?;
		}
		Ok(())
	}
}

impl ClassWrite for Vec<u8> {
	fn write_u8_slice(&mut self, buf: &[u8]) {
		self.extend_from_slice(buf);
	}
}

// The following read and patch values inside an instruction buffer. Callers check the bounds.

pub(crate) fn get_u16_at(code: &[u8], pos: usize) -> u16 {
	u16::from_be_bytes([code[pos], code[pos + 1]])
}

pub(crate) fn get_i16_at(code: &[u8], pos: usize) -> i16 {
	i16::from_be_bytes([code[pos], code[pos + 1]])
}

pub(crate) fn get_i32_at(code: &[u8], pos: usize) -> i32 {
	i32::from_be_bytes([code[pos], code[pos + 1], code[pos + 2], code[pos + 3]])
}

pub(crate) fn put_u16_at(code: &mut [u8], pos: usize, value: u16) {
	let [a, b] = value.to_be_bytes();
	code[pos] = a;
	code[pos + 1] = b;
}

pub(crate) fn put_i32_at(code: &mut [u8], pos: usize, value: i32) {
	let [a, b, c, d] = value.to_be_bytes();
	code[pos] = a;
	code[pos + 1] = b;
	code[pos + 2] = c;
	code[pos + 3] = d;
}
