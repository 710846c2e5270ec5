//! Moving instructions around while keeping every position that refers to them correct.
//!
//! Every instruction whose encoding depends on its position is a [`Site`]: branches, switches (their padding), and
//! `ldc` instructions that have to become `ldc_w`. A layout pass computes how much each site grows, giving a
//! [`PositionMap`] from old to new positions. Branches whose offset no longer fits into an `i16` are widened and the
//! layout is repeated, until nothing changes anymore. Then the new code is written out in one go.

use std::collections::BTreeMap;
use log::{debug, trace, warn};
use crate::attribute::AttributeKind;
use crate::attribute::code::{CodeAttribute, ExceptionEntry};
use crate::attribute::stack_map::{self, VerificationType};
use crate::bytecode::{instruction_length, opcode, switch_padding};
use crate::codec::{get_i16_at, get_i32_at, ClassWrite};
use crate::error::EditError;

/// A gap of `length` bytes placed in front of the instruction at `at`.
///
/// With `exclusive` set, a reference to `at` (a branch target, the start of an exception range, ...) is moved behind
/// the gap. Otherwise it keeps pointing at the start of the gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Insertion {
	pub(crate) at: usize,
	pub(crate) length: usize,
	pub(crate) exclusive: bool,
}

#[derive(Debug, Clone)]
enum SiteKind {
	/// `goto`, `jsr` and the conditional branches.
	Branch16 { target: usize },
	/// `goto_w` and `jsr_w`.
	Branch32 { target: usize },
	TableSwitch { default: usize, low: i32, high: i32, targets: Vec<usize> },
	LookupSwitch { default: usize, pairs: Vec<(i32, usize)> },
	/// An `ldc` to be written as `ldc_w` using this index.
	Ldc { index: u16 },
}

#[derive(Debug, Clone)]
struct Site {
	position: usize,
	opcode: u8,
	kind: SiteKind,
	widened: bool,
}

impl Site {
	/// How much longer this site gets, when placed at `new_position`.
	fn growth(&self, new_position: usize) -> isize {
		match self.kind {
			SiteKind::Branch16 { .. } if self.widened => {
				if self.opcode == opcode::GOTO || self.opcode == opcode::JSR { 2 } else { 5 }
			},
			SiteKind::Ldc { .. } => 1,
			SiteKind::TableSwitch { .. } | SiteKind::LookupSwitch { .. } => {
				switch_padding(new_position) as isize - switch_padding(self.position) as isize
			},
			_ => 0,
		}
	}
}

/// The instructions of a code array, and those of them that are sites.
struct Scan {
	instructions: Vec<(usize, usize)>,
	sites: Vec<Site>,
}

fn scan(code: &[u8], wide_ldc: &BTreeMap<usize, u16>) -> Result<Scan, EditError> {
	let target = |at: usize, offset: i32| -> Result<usize, EditError> {
		let target = at as i64 + offset as i64;
		if target < 0 || target >= code.len() as i64 {
			Err(EditError::BranchOutOfBounds { at, target, length: code.len() })
		} else {
			Ok(target as usize)
		}
	};

	let mut instructions = Vec::new();
	let mut sites = Vec::new();

	let mut position = 0;
	while position < code.len() {
		let length = instruction_length(code, position)?;
		let op = code[position];

		let kind = match op {
			opcode::GOTO | opcode::JSR => Some(SiteKind::Branch16 { target: target(position, get_i16_at(code, position + 1) as i32)? }),
			op if opcode::is_conditional_branch(op) => {
				Some(SiteKind::Branch16 { target: target(position, get_i16_at(code, position + 1) as i32)? })
			},
			opcode::GOTO_W | opcode::JSR_W => Some(SiteKind::Branch32 { target: target(position, get_i32_at(code, position + 1))? }),
			opcode::TABLESWITCH => {
				let base = position + 1 + switch_padding(position);
				let default = target(position, get_i32_at(code, base))?;
				let low = get_i32_at(code, base + 4);
				let high = get_i32_at(code, base + 8);
				let count = (high as i64 - low as i64 + 1) as usize;
				let targets = (0..count)
					.map(|i| target(position, get_i32_at(code, base + 12 + 4 * i)))
					.collect::<Result<Vec<_>, _>>()?;
				Some(SiteKind::TableSwitch { default, low, high, targets })
			},
			opcode::LOOKUPSWITCH => {
				let base = position + 1 + switch_padding(position);
				let default = target(position, get_i32_at(code, base))?;
				let count = get_i32_at(code, base + 4) as usize;
				let pairs = (0..count)
					.map(|i| {
						let key = get_i32_at(code, base + 8 + 8 * i);
						Ok((key, target(position, get_i32_at(code, base + 12 + 8 * i))?))
					})
					.collect::<Result<Vec<_>, EditError>>()?;
				Some(SiteKind::LookupSwitch { default, pairs })
			},
			opcode::LDC => wide_ldc.get(&position).map(|&index| SiteKind::Ldc { index }),
			_ => None,
		};

		if let Some(kind) = kind {
			sites.push(Site { position, opcode: op, kind, widened: false });
		}
		instructions.push((position, length));
		position += length;
	}

	Ok(Scan { instructions, sites })
}

/// Maps positions of the old code to positions of the new code.
#[derive(Debug, Clone)]
pub(crate) struct PositionMap {
	insertion: Insertion,
	/// The old positions of all sites that change their length, with the total growth up to and including them.
	shifts: Vec<(usize, isize)>,
	new_length: usize,
}

impl PositionMap {
	fn layout(code_length: usize, sites: &[Site], insertion: Insertion) -> PositionMap {
		let mut shifts = Vec::new();
		let mut total = 0;
		for site in sites {
			let gap = if site.position >= insertion.at { insertion.length } else { 0 };
			let new_position = (site.position as isize + total) as usize + gap;
			let growth = site.growth(new_position);
			if growth != 0 {
				total += growth;
				shifts.push((site.position, total));
			}
		}
		PositionMap {
			insertion,
			shifts,
			new_length: (code_length as isize + total) as usize + insertion.length,
		}
	}

	/// The growth of all sites before `position`.
	fn shift_before(&self, position: usize) -> isize {
		match self.shifts.partition_point(|&(site, _)| site < position) {
			0 => 0,
			i => self.shifts[i - 1].1,
		}
	}

	fn moved(&self, position: usize, behind_gap: bool) -> usize {
		let gap = if behind_gap { self.insertion.length } else { 0 };
		(position as isize + self.shift_before(position)) as usize + gap
	}

	/// The new position of the instruction at `position`. Instructions at the insertion point end up behind the gap.
	pub(crate) fn instruction(&self, position: usize) -> usize {
		self.moved(position, position >= self.insertion.at)
	}

	/// The new value of a reference to `position`.
	pub(crate) fn reference(&self, position: usize) -> usize {
		let Insertion { at, exclusive, .. } = self.insertion;
		self.moved(position, position > at || (position == at && exclusive))
	}

	/// Like [`PositionMap::reference`], except that the start of the method never moves.
	pub(crate) fn local_start(&self, position: usize) -> usize {
		if position == 0 { 0 } else { self.reference(position) }
	}

	/// The new target of a branch at `source`. A branch at the insertion point to itself keeps targeting itself.
	fn branch_target(&self, source: usize, target: usize) -> usize {
		if source == self.insertion.at && target == source {
			self.instruction(target)
		} else {
			self.reference(target)
		}
	}

	pub(crate) fn gap_start(&self) -> usize {
		self.moved(self.insertion.at, false)
	}

	pub(crate) fn gap_length(&self) -> usize {
		self.insertion.length
	}
}

/// New code, together with the map describing how it was derived from the old one.
#[derive(Debug)]
pub(crate) struct Relocated {
	pub(crate) code: Vec<u8>,
	pub(crate) map: PositionMap,
	/// The new positions of conditional branches that were widened into an inverted branch over a `goto_w`.
	pub(crate) trampolines: Vec<usize>,
}

/// The largest code for which inserting a gap can't make any 16 bit offset overflow.
const NARROW_LIMIT: usize = i16::MAX as usize;

/// Inserts a gap into the code.
///
/// If the code stays small enough for all offsets to fit, only the switch padding can change. Then the gap is rounded
/// up to a multiple of four instead, so that all switches keep their padding. Otherwise the gap is kept as it is, and
/// branches are widened as needed.
pub(crate) fn insert_gap(code: &[u8], insertion: Insertion) -> Result<Relocated, EditError> {
	let Scan { instructions, mut sites } = scan(code, &BTreeMap::new())?;

	let map = if code.len() + insertion.length + 3 <= NARROW_LIMIT {
		trace!("inserting {} bytes at {} in narrow mode", insertion.length, insertion.at);
		fit_narrow(code.len(), &sites, insertion)?
	} else {
		debug!("inserting {} bytes at {} into {} bytes of code in wide mode", insertion.length, insertion.at, code.len());
		fit_wide(code.len(), &mut sites, insertion)?
	};

	finish(code, &instructions, &sites, map)
}

/// Rewrites the given `ldc` instructions as `ldc_w` with the new index.
pub(crate) fn widen_ldc(code: &[u8], wide_ldc: &BTreeMap<usize, u16>) -> Result<Relocated, EditError> {
	let Scan { instructions, mut sites } = scan(code, wide_ldc)?;
	let insertion = Insertion { at: code.len(), length: 0, exclusive: false };
	let map = fit_wide(code.len(), &mut sites, insertion)?;
	finish(code, &instructions, &sites, map)
}

fn fit_narrow(code_length: usize, sites: &[Site], mut insertion: Insertion) -> Result<PositionMap, EditError> {
	let requested = insertion.length;
	for _ in 0..2 {
		let map = PositionMap::layout(code_length, sites, insertion);
		if map.shifts.is_empty() {
			return Ok(map);
		}

		let rounded = insertion.length.next_multiple_of(4);
		if rounded == insertion.length {
			break;
		}
		debug!("rounding gap of {} bytes up to {rounded} to keep the switch padding", insertion.length);
		insertion.length = rounded;
	}
	Err(EditError::AlignmentUnresolved(requested))
}

fn fit_wide(code_length: usize, sites: &mut [Site], insertion: Insertion) -> Result<PositionMap, EditError> {
	// every round widens at least one branch, and each one at most once
	let limit = sites.len() + 2;

	for round in 1..=limit {
		let map = PositionMap::layout(code_length, sites, insertion);

		let mut widened = 0;
		for site in sites.iter_mut().filter(|site| !site.widened) {
			if let SiteKind::Branch16 { target } = site.kind {
				let offset = map.branch_target(site.position, target) as i64 - map.instruction(site.position) as i64;
				if i16::try_from(offset).is_err() {
					debug!("widening {} at {} with offset {offset}", opcode::mnemonic(site.opcode).unwrap_or("branch"), site.position);
					site.widened = true;
					widened += 1;
				}
			}
		}

		trace!("widening round {round} widened {widened} branches");
		if widened == 0 {
			return Ok(map);
		}
	}

	Err(EditError::WideningDiverged(limit))
}

fn finish(code: &[u8], instructions: &[(usize, usize)], sites: &[Site], map: PositionMap) -> Result<Relocated, EditError> {
	if map.new_length > u16::MAX as usize {
		return Err(EditError::CodeTooLarge(map.new_length));
	}

	let at = map.insertion.at;
	let mut out = Vec::with_capacity(map.new_length);
	let mut trampolines = Vec::new();
	let mut sites = sites.iter().peekable();

	for &(position, length) in instructions {
		if position == at {
			out.resize(out.len() + map.insertion.length, opcode::NOP);
		}
		match sites.next_if(|site| site.position == position) {
			Some(site) => emit(&mut out, site, &map, &mut trampolines),
			None => out.extend_from_slice(&code[position..position + length]),
		}
	}
	if at == code.len() {
		out.resize(out.len() + map.insertion.length, opcode::NOP);
	}

	debug_assert_eq!(out.len(), map.new_length);
	Ok(Relocated { code: out, map, trampolines })
}

/// Writes a site at the end of `out`. All offsets fit, the layout made sure of that.
fn emit(out: &mut Vec<u8>, site: &Site, map: &PositionMap, trampolines: &mut Vec<usize>) {
	let here = out.len();
	let offset = |target: usize| map.branch_target(site.position, target) as i64 - here as i64;

	match &site.kind {
		SiteKind::Branch16 { target } if !site.widened => {
			out.write_u8(site.opcode);
			out.write_i16(offset(*target) as i16);
		},
		SiteKind::Branch16 { target } => match site.opcode {
			opcode::GOTO | opcode::JSR => {
				out.write_u8(if site.opcode == opcode::GOTO { opcode::GOTO_W } else { opcode::JSR_W });
				out.write_i32(offset(*target) as i32);
			},
			conditional => {
				// skip over the goto_w if the condition doesn't hold
				out.write_u8(opcode::inverted_branch(conditional));
				out.write_i16(8);
				out.write_u8(opcode::GOTO_W);
				out.write_i32((offset(*target) - 3) as i32);
				trampolines.push(here);
			},
		},
		SiteKind::Branch32 { target } => {
			out.write_u8(site.opcode);
			out.write_i32(offset(*target) as i32);
		},
		SiteKind::TableSwitch { default, low, high, targets } => {
			out.write_u8(site.opcode);
			out.resize(out.len() + switch_padding(here), 0);
			out.write_i32(offset(*default) as i32);
			out.write_i32(*low);
			out.write_i32(*high);
			for &target in targets {
				out.write_i32(offset(target) as i32);
			}
		},
		SiteKind::LookupSwitch { default, pairs } => {
			out.write_u8(site.opcode);
			out.resize(out.len() + switch_padding(here), 0);
			out.write_i32(offset(*default) as i32);
			out.write_i32(pairs.len() as i32);
			for &(key, target) in pairs {
				out.write_i32(key);
				out.write_i32(offset(target) as i32);
			}
		},
		SiteKind::Ldc { index } => {
			out.write_u8(opcode::LDC_W);
			out.write_u16(*index);
		},
	}
}

/// Replaces the code with the relocated one, moving all positions in the exception table and in the nested
/// attributes. Nothing is changed if this fails.
pub(crate) fn apply(code: &mut CodeAttribute, relocated: Relocated) -> Result<(), EditError> {
	let Relocated { code: bytes, map, trampolines } = relocated;
	// all new positions are at most the new length, which fits
	let reference = |pc: u16| map.reference(pc as usize) as u16;

	let exception_table: Vec<ExceptionEntry> = code.exception_table.iter()
		.map(|entry| ExceptionEntry {
			start_pc: reference(entry.start_pc),
			end_pc: reference(entry.end_pc),
			handler_pc: reference(entry.handler_pc),
			catch_type: entry.catch_type,
		})
		.collect();

	let mut attributes = code.attributes.clone();
	let mut has_stack_map = false;
	for attribute in &mut attributes {
		match &mut attribute.kind {
			AttributeKind::LineNumberTable(table) => {
				for line in table {
					line.start_pc = reference(line.start_pc);
				}
			},
			AttributeKind::LocalVariableTable(table) | AttributeKind::LocalVariableTypeTable(table) => {
				for local in table {
					let start = map.local_start(local.start_pc as usize);
					let end = map.reference(local.start_pc as usize + local.length as usize);
					local.start_pc = start as u16;
					local.length = (end - start) as u16;
				}
			},
			AttributeKind::StackMapTable(frames) => {
				has_stack_map = true;
				let positions: Vec<usize> = stack_map::frame_positions(frames).into_iter()
					.map(|position| map.reference(position))
					.collect();
				stack_map::set_frame_positions(frames, &positions)?;
				for frame in frames.iter_mut() {
					frame.for_each_type_mut(|t| {
						if let VerificationType::Uninitialized { offset } = t {
							*offset = map.instruction(*offset as usize) as u16;
						}
					});
				}
			},
			AttributeKind::Unknown(_) => {
				debug!("attribute with name index {} inside the code can't have its positions moved", attribute.name_index);
			},
			_ => {},
		}
	}

	if has_stack_map {
		for position in &trampolines {
			warn!("widened conditional branch at {position} needs a stack map frame after it, which is not created");
		}
	}

	code.code = bytes;
	code.exception_table = exception_table;
	code.attributes = attributes;
	Ok(())
}

#[cfg(test)]
mod testing {
	use std::collections::BTreeMap;
	use pretty_assertions::assert_eq;
	use crate::bytecode::opcode;
	use crate::bytecode::relocate::{insert_gap, widen_ldc, Insertion};
	use crate::error::EditError;

	fn insertion(at: usize, length: usize, exclusive: bool) -> Insertion {
		Insertion { at, length, exclusive }
	}

	#[test]
	fn branches_keep_targets() -> anyhow::Result<()> {
		// 0: goto 6, 3: goto 0, 6: return
		let code = [opcode::GOTO, 0, 6, opcode::GOTO, 0xff, 0xfd, opcode::RETURN];
		let relocated = insert_gap(&code, insertion(3, 2, false))?;
		assert_eq!(relocated.code, vec![
			opcode::GOTO, 0, 8,
			opcode::NOP, opcode::NOP,
			opcode::GOTO, 0xff, 0xfb,
			opcode::RETURN,
		]);
		assert_eq!(relocated.map.gap_start(), 3);
		Ok(())
	}

	#[test]
	fn exclusive_moves_targets_at_the_gap() -> anyhow::Result<()> {
		// 0: goto 3, 3: return
		let code = [opcode::GOTO, 0, 3, opcode::RETURN];

		let inclusive = insert_gap(&code, insertion(3, 1, false))?;
		assert_eq!(inclusive.code, vec![opcode::GOTO, 0, 3, opcode::NOP, opcode::RETURN]);

		let exclusive = insert_gap(&code, insertion(3, 1, true))?;
		assert_eq!(exclusive.code, vec![opcode::GOTO, 0, 4, opcode::NOP, opcode::RETURN]);
		Ok(())
	}

	#[test]
	fn self_branch_at_the_gap() -> anyhow::Result<()> {
		// 0: goto 0
		let code = [opcode::GOTO, 0, 0];
		let relocated = insert_gap(&code, insertion(0, 2, false))?;
		assert_eq!(relocated.code, vec![opcode::NOP, opcode::NOP, opcode::GOTO, 0, 0]);
		Ok(())
	}

	#[test]
	fn narrow_rounds_gap_for_switches() -> anyhow::Result<()> {
		// 0: nop, 1: lookupswitch with only a default to 0
		let mut code = vec![opcode::NOP, opcode::LOOKUPSWITCH, 0, 0];
		code.extend_from_slice(&[0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0]);

		let relocated = insert_gap(&code, insertion(1, 1, false))?;
		assert_eq!(relocated.map.gap_length(), 4);
		assert_eq!(relocated.code.len(), code.len() + 4);
		// still two bytes of padding, default back to 0 from 5
		assert_eq!(&relocated.code[5..], &[opcode::LOOKUPSWITCH, 0, 0, 0xff, 0xff, 0xff, 0xfb, 0, 0, 0, 0]);
		Ok(())
	}

	#[test]
	fn wide_mode_widens_goto() -> anyhow::Result<()> {
		// 0: goto 3, 3: return, 4..: filler
		let mut code = vec![opcode::GOTO, 0, 3, opcode::RETURN];
		code.resize(20_000, opcode::NOP);

		let relocated = insert_gap(&code, insertion(3, 1000, false))?;
		// the target stays at the start of the gap
		assert_eq!(relocated.code.len(), 20_000 + 1000);
		assert_eq!(&relocated.code[..3], &[opcode::GOTO, 0, 3]);

		let relocated = insert_gap(&code, insertion(3, 1000, true))?;
		assert_eq!(&relocated.code[..3], &[opcode::GOTO, 0x03, 0xeb]);

		let relocated = insert_gap(&code, insertion(3, 40_000, true))?;
		assert_eq!(relocated.code.len(), 20_000 + 40_000 + 2);
		let offset = i32::from_be_bytes([relocated.code[1], relocated.code[2], relocated.code[3], relocated.code[4]]);
		assert_eq!(relocated.code[0], opcode::GOTO_W);
		assert_eq!(offset, 40_005);
		assert_eq!(relocated.code[offset as usize], opcode::RETURN);
		Ok(())
	}

	#[test]
	fn conditional_becomes_trampoline() -> anyhow::Result<()> {
		// 0: ifeq 3, 3: return
		let mut code = vec![opcode::IFEQ, 0, 3, opcode::RETURN];
		code.resize(100, opcode::NOP);

		let relocated = insert_gap(&code, insertion(3, 40_000, true))?;
		assert_eq!(relocated.trampolines, vec![0]);
		assert_eq!(&relocated.code[..8], &[opcode::IFNE, 0, 8, opcode::GOTO_W, 0, 0, 0x9c, 0x45]);
		assert_eq!(relocated.code[3 + 40_005], opcode::RETURN);
		Ok(())
	}

	#[test]
	fn wide_mode_moves_switch_padding() -> anyhow::Result<()> {
		// 0..8: nops, 8: tableswitch with three bytes of padding, low = high = 0, both targets to 0
		let mut code = vec![opcode::NOP; 8];
		code.extend_from_slice(&[opcode::TABLESWITCH, 0, 0, 0]);
		code.extend_from_slice(&[0xff, 0xff, 0xff, 0xf8, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0xf8]);
		code.resize(33_000, opcode::NOP);

		let relocated = insert_gap(&code, insertion(8, 1, false))?;
		assert_eq!(relocated.code.len(), 33_000 + 1 - 1);
		assert_eq!(relocated.code[9], opcode::TABLESWITCH);
		assert_eq!(&relocated.code[10..16], &[0, 0, 0xff, 0xff, 0xff, 0xf7]);
		Ok(())
	}

	#[test]
	fn ldc_widening() -> anyhow::Result<()> {
		let code = [opcode::LDC, 1, opcode::POP, opcode::GOTO, 0xff, 0xfd];
		let relocated = widen_ldc(&code, &BTreeMap::from([(0, 300)]))?;
		assert_eq!(relocated.code, vec![opcode::LDC_W, 0x01, 0x2c, opcode::POP, opcode::GOTO, 0xff, 0xfc]);
		Ok(())
	}

	#[test]
	fn errors() {
		let code = [opcode::GOTO, 0, 10];
		assert_eq!(
			insert_gap(&code, insertion(0, 1, false)).unwrap_err(),
			EditError::BranchOutOfBounds { at: 0, target: 10, length: 3 }
		);

		let code = vec![opcode::NOP; 65_000];
		assert_eq!(insert_gap(&code, insertion(0, 1000, false)).unwrap_err(), EditError::CodeTooLarge(66_000));
	}
}
