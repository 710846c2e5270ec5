//! Computing the maximum depth of the operand stack.

use log::trace;
use crate::attribute::code::CodeAttribute;
use crate::bytecode::{next_instruction_position, opcode, switch_padding};
use crate::codec::{get_i16_at, get_i32_at, get_u16_at};
use crate::descriptor;
use crate::error::VerifyError;
use crate::pool::ConstPool;

/// Computes the maximum number of operand stack slots the code needs.
///
/// All paths through the code are followed, starting from the first instruction and from every exception handler.
/// Paths that meet must do so with the same stack depth. For `jsr` and `ret`, every `jsr` on a path must be executed
/// with the same depth, and `ret` must be reached with one slot less than the subroutine was entered with.
pub fn compute_max_stack(code: &CodeAttribute, pool: &ConstPool) -> Result<u16, VerifyError> {
	let length = code.code.len();
	if length == 0 {
		return Ok(0);
	}

	let mut analyzer = Analyzer {
		code: &code.code,
		pool,
		depths: vec![0; length],
		subroutines: vec![None; length],
		subroutine: None,
	};
	analyzer.depths[0] = -1;
	for entry in &code.exception_table {
		let handler = entry.handler_pc as usize;
		if handler >= length {
			return Err(VerifyError::BranchOutOfBounds { at: entry.start_pc as usize, target: handler as i64 });
		}
		// the exception is on the stack
		analyzer.depths[handler] = -2;
	}

	let mut round = 0;
	loop {
		round += 1;
		let mut visited = 0;
		for position in 0..length {
			if analyzer.depths[position] < 0 {
				analyzer.visit_path(position)?;
				visited += 1;
			}
		}
		trace!("max stack round {round} followed {visited} paths");
		if visited == 0 {
			break;
		}
	}

	let max = analyzer.depths.iter().copied().max().unwrap_or(1).max(1) - 1;
	u16::try_from(max).map_err(|_| VerifyError::TooDeep(max))
}

struct Analyzer<'a> {
	code: &'a [u8],
	pool: &'a ConstPool,
	/// The stack depth before each instruction plus one. `0` for positions not reached yet, and negated for
	/// positions reached by a branch but not yet followed.
	depths: Vec<i32>,
	/// For positions reached by a branch, the depth at the start of the subroutine the branch is in, in the same
	/// encoding as `depths`. [`None`] outside of subroutines.
	subroutines: Vec<Option<i32>>,
	/// The subroutine of the path currently followed.
	subroutine: Option<i32>,
}

impl Analyzer<'_> {
	fn visit_path(&mut self, start: usize) -> Result<(), VerifyError> {
		let mut depth = -self.depths[start];
		self.subroutine = self.subroutines[start];
		// the depth after the jsr instructions of this path
		let mut jsr_depth = None;

		let mut position = start;
		while position < self.code.len() {
			let recorded = self.depths[position];
			if position != start && recorded != 0 {
				if recorded.abs() != depth {
					return Err(VerifyError::InconsistentDepth { position, expected: recorded.abs() - 1, found: depth - 1 });
				}
				if recorded > 0 {
					break;
				}
			}
			self.depths[position] = depth;

			let next = next_instruction_position(self.code, position)?;
			let op = self.code[position];
			depth = self.execute(op, position, depth)?;
			if depth < 1 {
				return Err(VerifyError::StackUnderflow { position });
			}

			let modified = if op == opcode::WIDE { self.code[position + 1] } else { op };
			if self.branch(modified, position, depth, &mut jsr_depth)? || opcode::is_end(modified) {
				break;
			}
			if op == opcode::JSR || op == opcode::JSR_W {
				// the subroutine pops the return address
				depth -= 1;
			}
			position = next;
		}
		Ok(())
	}

	fn execute(&self, op: u8, position: usize, depth: i32) -> Result<i32, VerifyError> {
		let index = || get_u16_at(self.code, position + 1);
		Ok(match op {
			opcode::GETFIELD => depth + self.size(self.pool.get_member_type(index())?)? - 1,
			opcode::PUTFIELD => depth - self.size(self.pool.get_member_type(index())?)? - 1,
			opcode::GETSTATIC => depth + self.size(self.pool.get_member_type(index())?)?,
			opcode::PUTSTATIC => depth - self.size(self.pool.get_member_type(index())?)?,
			opcode::INVOKEVIRTUAL | opcode::INVOKESPECIAL | opcode::INVOKEINTERFACE => {
				depth + self.size(self.pool.get_member_type(index())?)? - 1
			},
			opcode::INVOKESTATIC => depth + self.size(self.pool.get_member_type(index())?)?,
			opcode::INVOKEDYNAMIC => {
				let (_, name_and_type) = self.pool.get_dynamic(index())?;
				depth + self.size(self.pool.get_name_and_type_descriptor(name_and_type)?)?
			},
			// only the thrown exception stays
			opcode::ATHROW => 1,
			opcode::MULTIANEWARRAY => depth + 1 - self.code[position + 3] as i32,
			opcode::WIDE => depth + opcode::stack_growth(self.code[position + 1]),
			op => depth + opcode::stack_growth(op),
		})
	}

	fn size(&self, descriptor: String) -> Result<i32, VerifyError> {
		descriptor::data_size(&descriptor).ok_or(VerifyError::BadDescriptor(descriptor))
	}

	/// Records the depth at the targets of a branch. Returns if the path ends here.
	fn branch(&mut self, op: u8, position: usize, depth: i32, jsr_depth: &mut Option<i32>) -> Result<bool, VerifyError> {
		let code = self.code;
		let short = || position as i64 + get_i16_at(code, position + 1) as i64;
		let long = |at: usize| position as i64 + get_i32_at(code, at) as i64;

		match op {
			op if opcode::is_conditional_branch(op) => {
				self.target(position, short(), depth, false)?;
				Ok(false)
			},
			opcode::GOTO => {
				self.target(position, short(), depth, false)?;
				Ok(true)
			},
			opcode::GOTO_W => {
				self.target(position, long(position + 1), depth, false)?;
				Ok(true)
			},
			opcode::JSR | opcode::JSR_W => {
				let target = if op == opcode::JSR { short() } else { long(position + 1) };
				self.target(position, target, depth, true)?;
				match *jsr_depth {
					None => {
						*jsr_depth = Some(depth);
						Ok(false)
					},
					Some(expected) if expected == depth => Ok(false),
					Some(expected) => Err(VerifyError::SubroutineDepthMismatch { position, expected: expected - 1, found: depth - 1 }),
				}
			},
			opcode::RET => match self.subroutine {
				Some(entry) if depth + 1 != entry => Err(VerifyError::UnsupportedSubroutine {
					position,
					reason: "the stack depth at ret differs from the one before the jsr",
				}),
				_ => Ok(true),
			},
			opcode::TABLESWITCH => {
				let base = position + 1 + switch_padding(position);
				self.target(position, long(base), depth, false)?;
				let low = get_i32_at(code, base + 4) as i64;
				let high = get_i32_at(code, base + 8) as i64;
				for i in 0..(high - low + 1) as usize {
					self.target(position, long(base + 12 + 4 * i), depth, false)?;
				}
				Ok(true)
			},
			opcode::LOOKUPSWITCH => {
				let base = position + 1 + switch_padding(position);
				self.target(position, long(base), depth, false)?;
				let pairs = get_i32_at(code, base + 4) as usize;
				for i in 0..pairs {
					self.target(position, long(base + 12 + 8 * i), depth, false)?;
				}
				Ok(true)
			},
			_ => Ok(false),
		}
	}

	fn target(&mut self, at: usize, target: i64, depth: i32, jsr: bool) -> Result<(), VerifyError> {
		if target < 0 || target >= self.code.len() as i64 {
			return Err(VerifyError::BranchOutOfBounds { at, target });
		}
		let target = target as usize;

		let recorded = self.depths[target];
		if recorded == 0 {
			self.depths[target] = -depth;
			self.subroutines[target] = if jsr { Some(depth) } else { self.subroutine };
		} else if recorded.abs() != depth {
			let (expected, found) = (recorded.abs() - 1, depth - 1);
			return Err(if jsr {
				VerifyError::SubroutineDepthMismatch { position: at, expected, found }
			} else {
				VerifyError::InconsistentDepth { position: target, expected, found }
			});
		}
		Ok(())
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::attribute::code::{CodeAttribute, ExceptionEntry};
	use crate::bytecode::opcode;
	use crate::bytecode::stack::compute_max_stack;
	use crate::error::VerifyError;
	use crate::pool::ConstPool;

	fn max_stack(code: Vec<u8>, pool: &ConstPool) -> Result<u16, VerifyError> {
		compute_max_stack(&CodeAttribute::new(0, 2, code), pool)
	}

	#[test]
	fn straight_line() -> anyhow::Result<()> {
		let pool = ConstPool::new();
		assert_eq!(max_stack(vec![], &pool)?, 0);
		assert_eq!(max_stack(vec![opcode::RETURN], &pool)?, 0);
		assert_eq!(max_stack(vec![opcode::ICONST_1, opcode::ICONST_2, opcode::IADD, opcode::IRETURN], &pool)?, 2);
		assert_eq!(max_stack(vec![opcode::LCONST_0, opcode::LCONST_1, opcode::LADD, opcode::LRETURN], &pool)?, 4);
		Ok(())
	}

	#[test]
	fn members() -> anyhow::Result<()> {
		let mut pool = ConstPool::new();
		let [i0, i1] = pool.add_method_ref("java.lang.Object", "<init>", "()V")?.to_be_bytes();
		let [s0, s1] = pool.add_method_ref("a.B", "max", "(JJ)J")?.to_be_bytes();
		let [f0, f1] = pool.add_field_ref("a.B", "x", "D")?.to_be_bytes();
		let [d0, d1] = pool.add_invoke_dynamic(0, "run", "(II)Ljava/lang/Runnable;")?.to_be_bytes();

		assert_eq!(max_stack(vec![opcode::ALOAD_0, opcode::INVOKESPECIAL, i0, i1, opcode::RETURN], &pool)?, 1);
		assert_eq!(max_stack(vec![opcode::LCONST_0, opcode::LCONST_1, opcode::INVOKESTATIC, s0, s1, opcode::LRETURN], &pool)?, 4);
		assert_eq!(max_stack(vec![opcode::ALOAD_0, opcode::GETFIELD, f0, f1, opcode::DRETURN], &pool)?, 2);
		assert_eq!(max_stack(vec![opcode::ALOAD_0, opcode::DCONST_0, opcode::PUTFIELD, f0, f1, opcode::RETURN], &pool)?, 3);
		assert_eq!(max_stack(vec![opcode::ICONST_0, opcode::ICONST_1, opcode::INVOKEDYNAMIC, d0, d1, 0, 0, opcode::ARETURN], &pool)?, 2);
		Ok(())
	}

	#[test]
	fn branches() -> anyhow::Result<()> {
		let pool = ConstPool::new();
		// if (x == 0) return 0; else return 1;
		let code = vec![opcode::ILOAD_0, opcode::IFEQ, 0, 5, opcode::ICONST_1, opcode::IRETURN, opcode::ICONST_0, opcode::IRETURN];
		assert_eq!(max_stack(code, &pool)?, 1);

		// lookupswitch at 1 with default to 20 and one pair to 22
		let mut code = vec![opcode::ILOAD_0, opcode::LOOKUPSWITCH, 0, 0];
		code.extend_from_slice(&[0, 0, 0, 19, 0, 0, 0, 1, 0, 0, 0, 7, 0, 0, 0, 21]);
		code.extend_from_slice(&[opcode::ICONST_0, opcode::IRETURN, opcode::ICONST_1, opcode::IRETURN]);
		assert_eq!(max_stack(code, &pool)?, 1);
		Ok(())
	}

	#[test]
	fn exception_handlers() -> anyhow::Result<()> {
		let pool = ConstPool::new();
		let mut code = CodeAttribute::new(0, 1, vec![opcode::ICONST_0, opcode::IRETURN, opcode::ASTORE_0, opcode::ALOAD_0, opcode::ATHROW]);
		code.exception_table.push(ExceptionEntry { start_pc: 0, end_pc: 2, handler_pc: 2, catch_type: 0 });
		assert_eq!(code.compute_max_stack(&pool)?, 1);
		assert_eq!(code.max_stack, 1);
		Ok(())
	}

	#[test]
	fn subroutines() -> anyhow::Result<()> {
		let pool = ConstPool::new();
		// jsr to 4, return, then astore_1; ret 1
		let code = vec![opcode::JSR, 0, 4, opcode::RETURN, opcode::ASTORE_1, opcode::RET, 1];
		assert_eq!(max_stack(code, &pool)?, 1);

		// two calls of the same subroutine with different depths
		let code = vec![
			opcode::JSR, 0, 8,
			opcode::ICONST_0,
			opcode::JSR, 0, 4,
			opcode::RETURN,
			opcode::ASTORE_1,
			opcode::RET, 1,
		];
		assert_eq!(max_stack(code, &pool), Err(VerifyError::SubroutineDepthMismatch { position: 4, expected: 1, found: 2 }));
		Ok(())
	}

	#[test]
	fn subroutine_returns_with_entry_depth() -> anyhow::Result<()> {
		let pool = ConstPool::new();
		// the subroutine leaves a value behind
		let code = vec![opcode::JSR, 0, 4, opcode::RETURN, opcode::ASTORE_1, opcode::ICONST_0, opcode::RET, 1];
		assert!(matches!(max_stack(code, &pool), Err(VerifyError::UnsupportedSubroutine { position: 6, .. })));

		// a branch inside the subroutine, both ways return balanced
		let code = vec![
			opcode::ICONST_1,
			opcode::JSR, 0, 4,
			opcode::IRETURN,
			opcode::ASTORE_1,
			opcode::ILOAD_0,
			opcode::IFEQ, 0, 5,
			opcode::RET, 1,
			opcode::RET, 1,
		];
		assert_eq!(max_stack(code, &pool)?, 2);

		// the same, but one branch pushes before returning
		let code = vec![
			opcode::ICONST_1,
			opcode::JSR, 0, 4,
			opcode::IRETURN,
			opcode::ASTORE_1,
			opcode::ILOAD_0,
			opcode::IFEQ, 0, 5,
			opcode::RET, 1,
			opcode::ICONST_0,
			opcode::RET, 1,
		];
		assert!(matches!(max_stack(code, &pool), Err(VerifyError::UnsupportedSubroutine { position: 13, .. })));
		Ok(())
	}

	#[test]
	fn wide_ret_ends_the_path() -> anyhow::Result<()> {
		let pool = ConstPool::new();
		let mut code = vec![opcode::JSR, 0, 8, opcode::RETURN, opcode::NOP, opcode::NOP, opcode::NOP, opcode::NOP];
		code.extend_from_slice(&[opcode::WIDE, opcode::ASTORE, 0, 1, opcode::WIDE, opcode::RET, 0, 1]);
		// not reachable, and would underflow
		code.extend_from_slice(&[opcode::POP, opcode::RETURN]);
		assert_eq!(max_stack(code, &pool)?, 1);
		Ok(())
	}

	#[test]
	fn errors() {
		let pool = ConstPool::new();
		assert_eq!(max_stack(vec![opcode::POP, opcode::RETURN], &pool), Err(VerifyError::StackUnderflow { position: 0 }));
		assert_eq!(
			max_stack(vec![opcode::ICONST_0, opcode::ILOAD_0, opcode::IFEQ, 0, 4, opcode::ICONST_1, opcode::RETURN], &pool),
			Err(VerifyError::InconsistentDepth { position: 6, expected: 1, found: 2 })
		);
		assert_eq!(max_stack(vec![opcode::GOTO, 0, 10], &pool), Err(VerifyError::BranchOutOfBounds { at: 0, target: 10 }));
	}
}
