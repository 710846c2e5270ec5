//! The `StackMapTable` attribute.

use crate::class_constants::stack_map_frame as frame;
use crate::class_constants::verification_type as tag;
use crate::class_map::ClassMap;
use crate::codec::{ByteReader, ClassWrite};
use crate::error::{DecodeError, EditError, EncodeError, PoolError};
use crate::pool::ConstPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationType {
	Top,
	Integer,
	Float,
	Double,
	Long,
	Null,
	UninitializedThis,
	Object { class_index: u16 },
	/// The `offset` is the position of the `new` instruction that created the object.
	Uninitialized { offset: u16 },
}

impl VerificationType {
	fn read(reader: &mut ByteReader) -> Result<VerificationType, DecodeError> {
		Ok(match reader.read_u8()? {
			tag::TOP => VerificationType::Top,
			tag::INTEGER => VerificationType::Integer,
			tag::FLOAT => VerificationType::Float,
			tag::DOUBLE => VerificationType::Double,
			tag::LONG => VerificationType::Long,
			tag::NULL => VerificationType::Null,
			tag::UNINITIALIZED_THIS => VerificationType::UninitializedThis,
			tag::OBJECT => VerificationType::Object { class_index: reader.read_u16()? },
			tag::UNINITIALIZED => VerificationType::Uninitialized { offset: reader.read_u16()? },
			other => return Err(reader.malformed(format!("unknown verification type tag {other}"))),
		})
	}

	fn write(&self, writer: &mut Vec<u8>) {
		match *self {
			VerificationType::Top => writer.write_u8(tag::TOP),
			VerificationType::Integer => writer.write_u8(tag::INTEGER),
			VerificationType::Float => writer.write_u8(tag::FLOAT),
			VerificationType::Double => writer.write_u8(tag::DOUBLE),
			VerificationType::Long => writer.write_u8(tag::LONG),
			VerificationType::Null => writer.write_u8(tag::NULL),
			VerificationType::UninitializedThis => writer.write_u8(tag::UNINITIALIZED_THIS),
			VerificationType::Object { class_index } => {
				writer.write_u8(tag::OBJECT);
				writer.write_u16(class_index);
			},
			VerificationType::Uninitialized { offset } => {
				writer.write_u8(tag::UNINITIALIZED);
				writer.write_u16(offset);
			},
		}
	}

	fn copy(&self, src: &ConstPool, dest: &mut ConstPool, map: &ClassMap) -> Result<VerificationType, PoolError> {
		Ok(match *self {
			VerificationType::Object { class_index } => VerificationType::Object { class_index: src.copy(class_index, dest, map)? },
			other => other,
		})
	}
}

/// A stack map frame. The short and extended encodings of the same frame are kept apart, so that frames are written
/// the way they were read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackMapFrame {
	Same { offset_delta: u16 },
	SameExtended { offset_delta: u16 },
	SameLocals1StackItem { offset_delta: u16, stack: VerificationType },
	SameLocals1StackItemExtended { offset_delta: u16, stack: VerificationType },
	/// Removes the last `k` locals, `k` is from `1` to `3`.
	Chop { offset_delta: u16, k: u8 },
	/// Adds from one to three locals.
	Append { offset_delta: u16, locals: Vec<VerificationType> },
	Full { offset_delta: u16, locals: Vec<VerificationType>, stack: Vec<VerificationType> },
}

impl StackMapFrame {
	pub fn offset_delta(&self) -> u16 {
		match *self {
			StackMapFrame::Same { offset_delta } |
			StackMapFrame::SameExtended { offset_delta } |
			StackMapFrame::SameLocals1StackItem { offset_delta, .. } |
			StackMapFrame::SameLocals1StackItemExtended { offset_delta, .. } |
			StackMapFrame::Chop { offset_delta, .. } |
			StackMapFrame::Append { offset_delta, .. } |
			StackMapFrame::Full { offset_delta, .. } => offset_delta,
		}
	}

	/// Changes the offset delta, switching to the extended encoding if the short one can't hold it.
	pub(crate) fn set_offset_delta(&mut self, delta: u16) {
		let short = delta <= frame::SAME_MAX as u16;
		match self {
			StackMapFrame::Same { .. } if !short => *self = StackMapFrame::SameExtended { offset_delta: delta },
			StackMapFrame::SameLocals1StackItem { stack, .. } if !short => {
				let stack = *stack;
				*self = StackMapFrame::SameLocals1StackItemExtended { offset_delta: delta, stack };
			},
			StackMapFrame::Same { offset_delta } |
			StackMapFrame::SameExtended { offset_delta } |
			StackMapFrame::SameLocals1StackItem { offset_delta, .. } |
			StackMapFrame::SameLocals1StackItemExtended { offset_delta, .. } |
			StackMapFrame::Chop { offset_delta, .. } |
			StackMapFrame::Append { offset_delta, .. } |
			StackMapFrame::Full { offset_delta, .. } => *offset_delta = delta,
		}
	}

	/// Calls `f` on every verification type of this frame.
	pub(crate) fn for_each_type_mut(&mut self, mut f: impl FnMut(&mut VerificationType)) {
		match self {
			StackMapFrame::Same { .. } | StackMapFrame::SameExtended { .. } | StackMapFrame::Chop { .. } => {},
			StackMapFrame::SameLocals1StackItem { stack, .. } |
			StackMapFrame::SameLocals1StackItemExtended { stack, .. } => f(stack),
			StackMapFrame::Append { locals, .. } => locals.iter_mut().for_each(f),
			StackMapFrame::Full { locals, stack, .. } => {
				locals.iter_mut().chain(stack.iter_mut()).for_each(f);
			},
		}
	}

	fn read(reader: &mut ByteReader) -> Result<StackMapFrame, DecodeError> {
		let frame_type = reader.read_u8()?;
		Ok(match frame_type {
			0..=frame::SAME_MAX => StackMapFrame::Same { offset_delta: frame_type as u16 },
			frame::SAME_LOCALS_1_STACK_ITEM_MIN..=frame::SAME_LOCALS_1_STACK_ITEM_MAX => StackMapFrame::SameLocals1StackItem {
				offset_delta: (frame_type - frame::SAME_LOCALS_1_STACK_ITEM_MIN) as u16,
				stack: VerificationType::read(reader)?,
			},
			frame::SAME_LOCALS_1_STACK_ITEM_EXTENDED => StackMapFrame::SameLocals1StackItemExtended {
				offset_delta: reader.read_u16()?,
				stack: VerificationType::read(reader)?,
			},
			frame::CHOP_MIN..=frame::CHOP_MAX => StackMapFrame::Chop {
				offset_delta: reader.read_u16()?,
				k: frame::SAME_EXTENDED - frame_type,
			},
			frame::SAME_EXTENDED => StackMapFrame::SameExtended { offset_delta: reader.read_u16()? },
			frame::APPEND_MIN..=frame::APPEND_MAX => {
				let offset_delta = reader.read_u16()?;
				let count = (frame_type - frame::SAME_EXTENDED) as usize;
				StackMapFrame::Append {
					offset_delta,
					locals: reader.read_vec(|_| Ok(count), VerificationType::read)?,
				}
			},
			frame::FULL => StackMapFrame::Full {
				offset_delta: reader.read_u16()?,
				locals: reader.read_vec(|r| r.read_u16_as_usize(), VerificationType::read)?,
				stack: reader.read_vec(|r| r.read_u16_as_usize(), VerificationType::read)?,
			},
			other => return Err(reader.malformed(format!("reserved stack map frame type {other}"))),
		})
	}

	fn write(&self, writer: &mut Vec<u8>) -> Result<(), EncodeError> {
		match self {
			StackMapFrame::Same { offset_delta } => writer.write_u8(*offset_delta as u8),
			StackMapFrame::SameExtended { offset_delta } => {
				writer.write_u8(frame::SAME_EXTENDED);
				writer.write_u16(*offset_delta);
			},
			StackMapFrame::SameLocals1StackItem { offset_delta, stack } => {
				writer.write_u8(frame::SAME_LOCALS_1_STACK_ITEM_MIN + *offset_delta as u8);
				stack.write(writer);
			},
			StackMapFrame::SameLocals1StackItemExtended { offset_delta, stack } => {
				writer.write_u8(frame::SAME_LOCALS_1_STACK_ITEM_EXTENDED);
				writer.write_u16(*offset_delta);
				stack.write(writer);
			},
			StackMapFrame::Chop { offset_delta, k } => {
				writer.write_u8(frame::SAME_EXTENDED - k);
				writer.write_u16(*offset_delta);
			},
			StackMapFrame::Append { offset_delta, locals } => {
				writer.write_u8(frame::SAME_EXTENDED + locals.len() as u8);
				writer.write_u16(*offset_delta);
				for local in locals {
					local.write(writer);
				}
			},
			StackMapFrame::Full { offset_delta, locals, stack } => {
				writer.write_u8(frame::FULL);
				writer.write_u16(*offset_delta);
				writer.write_slice(locals, |w, size| w.write_usize_as_u16(size, "full frame locals"), |w, t| {
					t.write(w);
					Ok(())
				})?;
				writer.write_slice(stack, |w, size| w.write_usize_as_u16(size, "full frame stack"), |w, t| {
					t.write(w);
					Ok(())
				})?;
			},
		}
		Ok(())
	}

	fn copy(&self, src: &ConstPool, dest: &mut ConstPool, map: &ClassMap) -> Result<StackMapFrame, PoolError> {
		let copy_all = |types: &[VerificationType], dest: &mut ConstPool| {
			types.iter().map(|t| t.copy(src, dest, map)).collect::<Result<Vec<_>, _>>()
		};
		Ok(match self {
			StackMapFrame::SameLocals1StackItem { offset_delta, stack } => StackMapFrame::SameLocals1StackItem {
				offset_delta: *offset_delta,
				stack: stack.copy(src, dest, map)?,
			},
			StackMapFrame::SameLocals1StackItemExtended { offset_delta, stack } => StackMapFrame::SameLocals1StackItemExtended {
				offset_delta: *offset_delta,
				stack: stack.copy(src, dest, map)?,
			},
			StackMapFrame::Append { offset_delta, locals } => StackMapFrame::Append {
				offset_delta: *offset_delta,
				locals: copy_all(locals, dest)?,
			},
			StackMapFrame::Full { offset_delta, locals, stack } => StackMapFrame::Full {
				offset_delta: *offset_delta,
				locals: copy_all(locals, dest)?,
				stack: copy_all(stack, dest)?,
			},
			other => other.clone(),
		})
	}
}

pub(crate) fn read(reader: &mut ByteReader) -> Result<Vec<StackMapFrame>, DecodeError> {
	reader.read_vec(|r| r.read_u16_as_usize(), StackMapFrame::read)
}

pub(crate) fn write(frames: &[StackMapFrame], writer: &mut Vec<u8>) -> Result<(), EncodeError> {
	writer.write_slice(frames, |w, size| w.write_usize_as_u16(size, "stack map table"), |w, frame| frame.write(w))
}

pub(crate) fn copy(frames: &[StackMapFrame], src: &ConstPool, dest: &mut ConstPool, map: &ClassMap) -> Result<Vec<StackMapFrame>, PoolError> {
	frames.iter().map(|frame| frame.copy(src, dest, map)).collect()
}

/// The code positions the frames apply to. The first frame is at its delta, every later one at
/// `previous + delta + 1`.
pub fn frame_positions(frames: &[StackMapFrame]) -> Vec<usize> {
	let mut positions = Vec::with_capacity(frames.len());
	let mut previous: Option<usize> = None;
	for frame in frames {
		let position = match previous {
			None => frame.offset_delta() as usize,
			Some(previous) => previous + frame.offset_delta() as usize + 1,
		};
		positions.push(position);
		previous = Some(position);
	}
	positions
}

/// Recomputes the offset deltas so that the frames apply to the given positions.
pub(crate) fn set_frame_positions(frames: &mut [StackMapFrame], positions: &[usize]) -> Result<(), EditError> {
	let mut previous: Option<usize> = None;
	for (frame, &position) in frames.iter_mut().zip(positions) {
		let delta = match previous {
			None => position,
			Some(previous) if position > previous => position - previous - 1,
			Some(_) => return Err(EditError::FrameOrder(position)),
		};
		let delta = u16::try_from(delta).map_err(|_| EditError::CodeTooLarge(position))?;
		frame.set_offset_delta(delta);
		previous = Some(position);
	}
	Ok(())
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::attribute::stack_map::{frame_positions, read, set_frame_positions, write, StackMapFrame, VerificationType};
	use crate::codec::ByteReader;

	#[test]
	fn read_write() -> anyhow::Result<()> {
		let bytes = [
			0, 6,
			3,
			64 + 2, 7, 0, 9,
			251, 0, 7,
			249, 0, 1,
			253, 0, 2, 1, 4,
			255, 0, 0, 0, 1, 8, 0, 12, 0, 0,
		];
		let frames = read(&mut ByteReader::new(&bytes))?;
		assert_eq!(frames, vec![
			StackMapFrame::Same { offset_delta: 3 },
			StackMapFrame::SameLocals1StackItem { offset_delta: 2, stack: VerificationType::Object { class_index: 9 } },
			StackMapFrame::SameExtended { offset_delta: 7 },
			StackMapFrame::Chop { offset_delta: 1, k: 2 },
			StackMapFrame::Append { offset_delta: 2, locals: vec![VerificationType::Integer, VerificationType::Long] },
			StackMapFrame::Full { offset_delta: 0, locals: vec![VerificationType::Uninitialized { offset: 12 }], stack: vec![] },
		]);

		let mut out = Vec::new();
		write(&frames, &mut out)?;
		assert_eq!(out, bytes.to_vec());
		Ok(())
	}

	#[test]
	fn positions() -> anyhow::Result<()> {
		let mut frames = vec![
			StackMapFrame::Same { offset_delta: 4 },
			StackMapFrame::Same { offset_delta: 0 },
			StackMapFrame::SameLocals1StackItem { offset_delta: 10, stack: VerificationType::Integer },
		];
		assert_eq!(frame_positions(&frames), vec![4, 5, 16]);

		set_frame_positions(&mut frames, &[4, 105, 200])?;
		assert_eq!(frames, vec![
			StackMapFrame::Same { offset_delta: 4 },
			StackMapFrame::SameExtended { offset_delta: 100 },
			StackMapFrame::SameLocals1StackItemExtended { offset_delta: 94, stack: VerificationType::Integer },
		]);

		assert!(set_frame_positions(&mut frames, &[4, 4, 10]).is_err());
		Ok(())
	}
}
