use pretty_assertions::assert_eq;
use jclass::attribute::{Attribute, AttributeKind};
use jclass::attribute::code::{CodeAttribute, ExceptionEntry};
use jclass::attribute::debug::{LineNumber, LocalVariable};
use jclass::attribute::stack_map::{frame_positions, StackMapFrame, VerificationType};
use jclass::bytecode::editor::Gap;
use jclass::bytecode::{instruction_positions, opcode};
use jclass::class_constants::{access, attribute as name};
use jclass::member::MemberInfo;
use jclass::pool::ConstPool;
use jclass::{ClassFile, Version};

/// A class with the constructor `aload_0, invokespecial Object.<init>, return`, with debug tables and an exception
/// handler around the `return`.
fn class_with_constructor() -> anyhow::Result<ClassFile> {
	let mut class = ClassFile::new(false, "org.example.Main", None, Version::DEFAULT)?;
	let init = class.pool.add_method_ref("java.lang.Object", "<init>", "()V")?;
	let [i0, i1] = init.to_be_bytes();

	let mut code = CodeAttribute::new(1, 1, vec![opcode::ALOAD_0, opcode::INVOKESPECIAL, i0, i1, opcode::RETURN]);
	code.exception_table.push(ExceptionEntry { start_pc: 4, end_pc: 5, handler_pc: 4, catch_type: 0 });
	code.attributes.push(Attribute::new(&mut class.pool, name::LINE_NUMBER_TABLE, AttributeKind::LineNumberTable(vec![
		LineNumber { start_pc: 0, line_number: 3 },
		LineNumber { start_pc: 4, line_number: 4 },
	]))?);
	let this_name = class.pool.add_utf8("this")?;
	let this_descriptor = class.pool.add_utf8("Lorg/example/Main;")?;
	code.attributes.push(Attribute::new(&mut class.pool, name::LOCAL_VARIABLE_TABLE, AttributeKind::LocalVariableTable(vec![
		LocalVariable { start_pc: 0, length: 5, name_index: this_name, descriptor_index: this_descriptor, index: 0 },
	]))?);

	let mut method = MemberInfo::new(&mut class.pool, access::PUBLIC, "<init>", "()V")?;
	method.set_code(&mut class.pool, code)?;
	class.add_method(method)?;
	Ok(class)
}

fn constructor_code(class: &mut ClassFile) -> anyhow::Result<&mut CodeAttribute> {
	class.method_mut("<init>", "()V")
		.and_then(MemberInfo::code_mut)
		.ok_or_else(|| anyhow::anyhow!("constructor has no code"))
}

#[test]
fn insert_before_return() -> anyhow::Result<()> {
	let mut class = class_with_constructor()?;
	let code = constructor_code(&mut class)?;
	code.editor().insert_at(4, &[opcode::NOP; 5])?;

	assert_eq!(code.code_length(), 10);
	assert_eq!(&code.code[4..], &[opcode::NOP, opcode::NOP, opcode::NOP, opcode::NOP, opcode::NOP, opcode::RETURN]);
	// references to the insertion point now cover the inserted code
	assert_eq!(code.exception_table, vec![ExceptionEntry { start_pc: 4, end_pc: 10, handler_pc: 4, catch_type: 0 }]);
	assert_eq!(code.line_numbers(), Some(&[
		LineNumber { start_pc: 0, line_number: 3 },
		LineNumber { start_pc: 4, line_number: 4 },
	][..]));
	assert_eq!(code.local_variables().map(|locals| (locals[0].start_pc, locals[0].length)), Some((0, 10)));

	let bytes = class.serialize()?;
	assert_eq!(jclass::serialize(&jclass::parse(&bytes)?)?, bytes);
	Ok(())
}

#[test]
fn insert_exclusive_before_return() -> anyhow::Result<()> {
	let mut class = class_with_constructor()?;
	let code = constructor_code(&mut class)?;
	code.editor().insert_ex_at(4, &[opcode::NOP; 5])?;

	assert_eq!(code.code[9], opcode::RETURN);
	assert_eq!(code.exception_table, vec![ExceptionEntry { start_pc: 9, end_pc: 10, handler_pc: 9, catch_type: 0 }]);
	assert_eq!(code.line_at(9), Some(4));
	assert_eq!(code.line_at(4), Some(3));
	assert_eq!(code.local_variables().map(|locals| (locals[0].start_pc, locals[0].length)), Some((0, 10)));
	Ok(())
}

#[test]
fn insert_at_method_start() -> anyhow::Result<()> {
	let mut class = class_with_constructor()?;
	let code = constructor_code(&mut class)?;
	code.editor().insert_at(0, &[opcode::NOP; 2])?;

	// locals starting at 0 keep starting there
	assert_eq!(code.local_variables().map(|locals| (locals[0].start_pc, locals[0].length)), Some((0, 7)));
	assert_eq!(code.line_at(0), Some(3));
	assert_eq!(code.exception_table, vec![ExceptionEntry { start_pc: 6, end_pc: 7, handler_pc: 6, catch_type: 0 }]);

	let mut class = class_with_constructor()?;
	let code = constructor_code(&mut class)?;
	code.editor().insert_ex_at(0, &[opcode::NOP; 2])?;

	assert_eq!(code.local_variables().map(|locals| (locals[0].start_pc, locals[0].length)), Some((0, 7)));
	assert_eq!(code.line_numbers(), Some(&[
		LineNumber { start_pc: 2, line_number: 3 },
		LineNumber { start_pc: 6, line_number: 4 },
	][..]));
	Ok(())
}

#[test]
fn insert_at_handler_start() -> anyhow::Result<()> {
	let mut class = class_with_constructor()?;
	let code = constructor_code(&mut class)?;
	// the call is protected, the handler is the return
	code.exception_table = vec![ExceptionEntry { start_pc: 0, end_pc: 4, handler_pc: 4, catch_type: 0 }];
	code.editor().insert_at(4, &[opcode::NOP; 2])?;
	// the inserted code runs first in the handler
	assert_eq!(code.exception_table, vec![ExceptionEntry { start_pc: 0, end_pc: 4, handler_pc: 4, catch_type: 0 }]);

	let mut class = class_with_constructor()?;
	let code = constructor_code(&mut class)?;
	code.exception_table = vec![ExceptionEntry { start_pc: 0, end_pc: 4, handler_pc: 4, catch_type: 0 }];
	code.editor().insert_ex_at(4, &[opcode::NOP; 2])?;
	// the inserted code ends the protected range, the handler still starts at the return
	assert_eq!(code.exception_table, vec![ExceptionEntry { start_pc: 0, end_pc: 6, handler_pc: 6, catch_type: 0 }]);
	assert_eq!(code.code[6], opcode::RETURN);
	Ok(())
}

#[test]
fn stack_map_frames_follow_inserts() -> anyhow::Result<()> {
	let mut pool = ConstPool::new();
	let mut bytes = vec![opcode::NOP; 11];
	bytes.push(opcode::RETURN);
	let mut code = CodeAttribute::new(1, 0, bytes);
	// frames at 8 and 10, the second one with an object created at 0
	code.attributes.push(Attribute::new(&mut pool, name::STACK_MAP_TABLE, AttributeKind::StackMapTable(vec![
		StackMapFrame::Same { offset_delta: 8 },
		StackMapFrame::SameLocals1StackItem { offset_delta: 1, stack: VerificationType::Uninitialized { offset: 0 } },
	]))?);

	let mut editor = code.editor();
	editor.insert_at(0, &[opcode::NOP; 2])?;
	editor.insert_ex_at(10, &[opcode::NOP])?;

	let frames = code.stack_map().ok_or_else(|| anyhow::anyhow!("no stack map"))?;
	assert_eq!(frame_positions(frames), vec![11, 13]);
	assert_eq!(frames[1], StackMapFrame::SameLocals1StackItem { offset_delta: 1, stack: VerificationType::Uninitialized { offset: 2 } });
	Ok(())
}

#[test]
fn widened_conditional_with_stack_map() -> anyhow::Result<()> {
	let mut pool = ConstPool::new();
	// 0: ifeq 3, 3: return, with a frame at the branch target
	let mut bytes = vec![opcode::IFEQ, 0, 3, opcode::RETURN];
	bytes.resize(100, opcode::NOP);
	let mut code = CodeAttribute::new(1, 0, bytes);
	code.attributes.push(Attribute::new(&mut pool, name::STACK_MAP_TABLE, AttributeKind::StackMapTable(vec![
		StackMapFrame::Same { offset_delta: 3 },
	]))?);

	code.editor().insert_gap_at(3, 40_000, true)?;
	assert_eq!(&code.code[..4], &[opcode::IFNE, 0, 8, opcode::GOTO_W]);
	assert_eq!(code.code[40_008], opcode::RETURN);
	// no frame is created behind the goto_w, the existing one moves along
	assert_eq!(code.stack_map(), Some(&[StackMapFrame::SameExtended { offset_delta: 40_008 }][..]));
	Ok(())
}

#[test]
fn empty_insert_changes_nothing() -> anyhow::Result<()> {
	let mut class = class_with_constructor()?;
	let before = class.clone();
	let code = constructor_code(&mut class)?;
	let gap = code.editor().insert_gap_at(4, 0, false)?;
	assert_eq!(gap, Gap { position: 4, length: 0 });
	assert_eq!(class, before);
	Ok(())
}

#[test]
fn goto_gets_widened_once() -> anyhow::Result<()> {
	// 0: goto 3, 3: return, then unreachable nops
	let mut bytes = vec![opcode::GOTO, 0, 3, opcode::RETURN];
	bytes.resize(20_000, opcode::NOP);
	let mut code = CodeAttribute::new(0, 0, bytes);

	let mut editor = code.editor();
	editor.insert_gap_at(3, 16_000, true)?;
	assert_eq!(editor.code().code[0], opcode::GOTO);
	assert_eq!(editor.s16_at(1)?, 16_003);

	editor.insert_gap_at(3, 20_000, true)?;
	assert_eq!(editor.code_length(), 20_000 + 36_000 + 2);
	assert_eq!(editor.byte_at(0)?, opcode::GOTO_W);
	assert_eq!(editor.s32_at(1)?, 36_005);
	assert_eq!(editor.byte_at(36_005)?, opcode::RETURN);

	let positions = instruction_positions(&code.code)?;
	assert_eq!(&positions[..2], &[0, 5]);
	assert_eq!(code.code.iter().filter(|&&op| op == opcode::GOTO_W).count(), 1);
	Ok(())
}

/// `nop`s up to 8, a `tableswitch` at 8 with both targets at the `return` at 28, then `nop`s up to `length`.
fn switch_code(length: usize) -> CodeAttribute {
	let mut bytes = vec![opcode::NOP; 8];
	bytes.extend_from_slice(&[opcode::TABLESWITCH, 0, 0, 0]);
	bytes.extend_from_slice(&[0, 0, 0, 20, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 20]);
	bytes.push(opcode::RETURN);
	bytes.resize(length, opcode::NOP);
	CodeAttribute::new(1, 0, bytes)
}

#[test]
fn switch_in_large_method() -> anyhow::Result<()> {
	let mut code = switch_code(33_000);
	let gap = code.editor().insert_gap_at(8, 1, false)?;
	assert_eq!(gap, Gap { position: 8, length: 1 });

	// one byte more in front, one byte less padding, so the return stays at 28
	assert_eq!(code.code_length(), 33_000);
	assert_eq!(&code.code[8..16], &[opcode::NOP, opcode::TABLESWITCH, 0, 0, 0, 0, 0, 19]);
	assert_eq!(&code.code[24..29], &[0, 0, 0, 19, opcode::RETURN]);
	Ok(())
}

#[test]
fn switch_in_small_method() -> anyhow::Result<()> {
	let mut code = switch_code(29);
	let gap = code.editor().insert_gap_at(8, 1, false)?;
	assert_eq!(gap, Gap { position: 8, length: 4 });

	assert_eq!(code.code_length(), 33);
	assert_eq!(&code.code[12..20], &[opcode::TABLESWITCH, 0, 0, 0, 0, 0, 0, 20]);
	assert_eq!(code.code[32], opcode::RETURN);
	Ok(())
}

#[test]
fn max_stack_after_editing() -> anyhow::Result<()> {
	let mut class = class_with_constructor()?;
	let pool_index = class.pool.add_long(1 << 40)?;
	let [p0, p1] = pool_index.to_be_bytes();

	let ClassFile { pool, methods, .. } = &mut class;
	let Some(code) = methods.first_mut().and_then(MemberInfo::code_mut) else { anyhow::bail!("no code") };
	// the handler is also reached by falling through, with a different depth
	code.exception_table.clear();
	assert_eq!(code.compute_max_stack(pool)?, 1);

	// load `this` and a long, and drop them again
	code.editor().insert_at(4, &[opcode::ALOAD_0, opcode::LDC2_W, p0, p1, opcode::POP2, opcode::POP])?;
	assert_eq!(code.compute_max_stack(pool)?, 3);
	assert_eq!(code.max_stack, 3);
	Ok(())
}
