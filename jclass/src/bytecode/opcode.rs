//! The opcodes of the instruction set, together with their length and their effect on the operand stack.

macro_rules! opcodes {
	($($name:ident = $value:literal, $mnemonic:literal, $length:literal, $stack:literal;)*) => {
		$(pub const $name: u8 = $value;)*

		/// The lower case name of an opcode, as used by `javap`.
		pub fn mnemonic(opcode: u8) -> Option<&'static str> {
			match opcode {
				$($value => Some($mnemonic),)*
				_ => None,
			}
		}

		/// The length of an instruction including its operands, `0` for the instructions of variable length
		/// (`tableswitch`, `lookupswitch` and `wide`), and [`None`] for invalid opcodes.
		pub fn fixed_length(opcode: u8) -> Option<usize> {
			match opcode {
				$($value => Some($length),)*
				_ => None,
			}
		}

		/// How much the instruction grows the operand stack, in slots.
		///
		/// Field access, method invocation, `multianewarray` and `athrow` depend on their operands, and have `0` here.
		pub(crate) fn stack_growth(opcode: u8) -> i32 {
			match opcode {
				$($value => $stack,)*
				_ => 0,
			}
		}
	};
}

opcodes! {
	NOP = 0x00, "nop", 1, 0;
	ACONST_NULL = 0x01, "aconst_null", 1, 1;
	ICONST_M1 = 0x02, "iconst_m1", 1, 1;
	ICONST_0 = 0x03, "iconst_0", 1, 1;
	ICONST_1 = 0x04, "iconst_1", 1, 1;
	ICONST_2 = 0x05, "iconst_2", 1, 1;
	ICONST_3 = 0x06, "iconst_3", 1, 1;
	ICONST_4 = 0x07, "iconst_4", 1, 1;
	ICONST_5 = 0x08, "iconst_5", 1, 1;
	LCONST_0 = 0x09, "lconst_0", 1, 2;
	LCONST_1 = 0x0a, "lconst_1", 1, 2;
	FCONST_0 = 0x0b, "fconst_0", 1, 1;
	FCONST_1 = 0x0c, "fconst_1", 1, 1;
	FCONST_2 = 0x0d, "fconst_2", 1, 1;
	DCONST_0 = 0x0e, "dconst_0", 1, 2;
	DCONST_1 = 0x0f, "dconst_1", 1, 2;
	BIPUSH = 0x10, "bipush", 2, 1;
	SIPUSH = 0x11, "sipush", 3, 1;
	LDC = 0x12, "ldc", 2, 1;
	LDC_W = 0x13, "ldc_w", 3, 1;
	LDC2_W = 0x14, "ldc2_w", 3, 2;
	ILOAD = 0x15, "iload", 2, 1;
	LLOAD = 0x16, "lload", 2, 2;
	FLOAD = 0x17, "fload", 2, 1;
	DLOAD = 0x18, "dload", 2, 2;
	ALOAD = 0x19, "aload", 2, 1;
	ILOAD_0 = 0x1a, "iload_0", 1, 1;
	ILOAD_1 = 0x1b, "iload_1", 1, 1;
	ILOAD_2 = 0x1c, "iload_2", 1, 1;
	ILOAD_3 = 0x1d, "iload_3", 1, 1;
	LLOAD_0 = 0x1e, "lload_0", 1, 2;
	LLOAD_1 = 0x1f, "lload_1", 1, 2;
	LLOAD_2 = 0x20, "lload_2", 1, 2;
	LLOAD_3 = 0x21, "lload_3", 1, 2;
	FLOAD_0 = 0x22, "fload_0", 1, 1;
	FLOAD_1 = 0x23, "fload_1", 1, 1;
	FLOAD_2 = 0x24, "fload_2", 1, 1;
	FLOAD_3 = 0x25, "fload_3", 1, 1;
	DLOAD_0 = 0x26, "dload_0", 1, 2;
	DLOAD_1 = 0x27, "dload_1", 1, 2;
	DLOAD_2 = 0x28, "dload_2", 1, 2;
	DLOAD_3 = 0x29, "dload_3", 1, 2;
	ALOAD_0 = 0x2a, "aload_0", 1, 1;
	ALOAD_1 = 0x2b, "aload_1", 1, 1;
	ALOAD_2 = 0x2c, "aload_2", 1, 1;
	ALOAD_3 = 0x2d, "aload_3", 1, 1;
	IALOAD = 0x2e, "iaload", 1, -1;
	LALOAD = 0x2f, "laload", 1, 0;
	FALOAD = 0x30, "faload", 1, -1;
	DALOAD = 0x31, "daload", 1, 0;
	AALOAD = 0x32, "aaload", 1, -1;
	BALOAD = 0x33, "baload", 1, -1;
	CALOAD = 0x34, "caload", 1, -1;
	SALOAD = 0x35, "saload", 1, -1;
	ISTORE = 0x36, "istore", 2, -1;
	LSTORE = 0x37, "lstore", 2, -2;
	FSTORE = 0x38, "fstore", 2, -1;
	DSTORE = 0x39, "dstore", 2, -2;
	ASTORE = 0x3a, "astore", 2, -1;
	ISTORE_0 = 0x3b, "istore_0", 1, -1;
	ISTORE_1 = 0x3c, "istore_1", 1, -1;
	ISTORE_2 = 0x3d, "istore_2", 1, -1;
	ISTORE_3 = 0x3e, "istore_3", 1, -1;
	LSTORE_0 = 0x3f, "lstore_0", 1, -2;
	LSTORE_1 = 0x40, "lstore_1", 1, -2;
	LSTORE_2 = 0x41, "lstore_2", 1, -2;
	LSTORE_3 = 0x42, "lstore_3", 1, -2;
	FSTORE_0 = 0x43, "fstore_0", 1, -1;
	FSTORE_1 = 0x44, "fstore_1", 1, -1;
	FSTORE_2 = 0x45, "fstore_2", 1, -1;
	FSTORE_3 = 0x46, "fstore_3", 1, -1;
	DSTORE_0 = 0x47, "dstore_0", 1, -2;
	DSTORE_1 = 0x48, "dstore_1", 1, -2;
	DSTORE_2 = 0x49, "dstore_2", 1, -2;
	DSTORE_3 = 0x4a, "dstore_3", 1, -2;
	ASTORE_0 = 0x4b, "astore_0", 1, -1;
	ASTORE_1 = 0x4c, "astore_1", 1, -1;
	ASTORE_2 = 0x4d, "astore_2", 1, -1;
	ASTORE_3 = 0x4e, "astore_3", 1, -1;
	IASTORE = 0x4f, "iastore", 1, -3;
	LASTORE = 0x50, "lastore", 1, -4;
	FASTORE = 0x51, "fastore", 1, -3;
	DASTORE = 0x52, "dastore", 1, -4;
	AASTORE = 0x53, "aastore", 1, -3;
	BASTORE = 0x54, "bastore", 1, -3;
	CASTORE = 0x55, "castore", 1, -3;
	SASTORE = 0x56, "sastore", 1, -3;
	POP = 0x57, "pop", 1, -1;
	POP2 = 0x58, "pop2", 1, -2;
	DUP = 0x59, "dup", 1, 1;
	DUP_X1 = 0x5a, "dup_x1", 1, 1;
	DUP_X2 = 0x5b, "dup_x2", 1, 1;
	DUP2 = 0x5c, "dup2", 1, 2;
	DUP2_X1 = 0x5d, "dup2_x1", 1, 2;
	DUP2_X2 = 0x5e, "dup2_x2", 1, 2;
	SWAP = 0x5f, "swap", 1, 0;
	IADD = 0x60, "iadd", 1, -1;
	LADD = 0x61, "ladd", 1, -2;
	FADD = 0x62, "fadd", 1, -1;
	DADD = 0x63, "dadd", 1, -2;
	ISUB = 0x64, "isub", 1, -1;
	LSUB = 0x65, "lsub", 1, -2;
	FSUB = 0x66, "fsub", 1, -1;
	DSUB = 0x67, "dsub", 1, -2;
	IMUL = 0x68, "imul", 1, -1;
	LMUL = 0x69, "lmul", 1, -2;
	FMUL = 0x6a, "fmul", 1, -1;
	DMUL = 0x6b, "dmul", 1, -2;
	IDIV = 0x6c, "idiv", 1, -1;
	LDIV = 0x6d, "ldiv", 1, -2;
	FDIV = 0x6e, "fdiv", 1, -1;
	DDIV = 0x6f, "ddiv", 1, -2;
	IREM = 0x70, "irem", 1, -1;
	LREM = 0x71, "lrem", 1, -2;
	FREM = 0x72, "frem", 1, -1;
	DREM = 0x73, "drem", 1, -2;
	INEG = 0x74, "ineg", 1, 0;
	LNEG = 0x75, "lneg", 1, 0;
	FNEG = 0x76, "fneg", 1, 0;
	DNEG = 0x77, "dneg", 1, 0;
	ISHL = 0x78, "ishl", 1, -1;
	LSHL = 0x79, "lshl", 1, -1;
	ISHR = 0x7a, "ishr", 1, -1;
	LSHR = 0x7b, "lshr", 1, -1;
	IUSHR = 0x7c, "iushr", 1, -1;
	LUSHR = 0x7d, "lushr", 1, -1;
	IAND = 0x7e, "iand", 1, -1;
	LAND = 0x7f, "land", 1, -2;
	IOR = 0x80, "ior", 1, -1;
	LOR = 0x81, "lor", 1, -2;
	IXOR = 0x82, "ixor", 1, -1;
	LXOR = 0x83, "lxor", 1, -2;
	IINC = 0x84, "iinc", 3, 0;
	I2L = 0x85, "i2l", 1, 1;
	I2F = 0x86, "i2f", 1, 0;
	I2D = 0x87, "i2d", 1, 1;
	L2I = 0x88, "l2i", 1, -1;
	L2F = 0x89, "l2f", 1, -1;
	L2D = 0x8a, "l2d", 1, 0;
	F2I = 0x8b, "f2i", 1, 0;
	F2L = 0x8c, "f2l", 1, 1;
	F2D = 0x8d, "f2d", 1, 1;
	D2I = 0x8e, "d2i", 1, -1;
	D2L = 0x8f, "d2l", 1, 0;
	D2F = 0x90, "d2f", 1, -1;
	I2B = 0x91, "i2b", 1, 0;
	I2C = 0x92, "i2c", 1, 0;
	I2S = 0x93, "i2s", 1, 0;
	LCMP = 0x94, "lcmp", 1, -3;
	FCMPL = 0x95, "fcmpl", 1, -1;
	FCMPG = 0x96, "fcmpg", 1, -1;
	DCMPL = 0x97, "dcmpl", 1, -3;
	DCMPG = 0x98, "dcmpg", 1, -3;
	IFEQ = 0x99, "ifeq", 3, -1;
	IFNE = 0x9a, "ifne", 3, -1;
	IFLT = 0x9b, "iflt", 3, -1;
	IFGE = 0x9c, "ifge", 3, -1;
	IFGT = 0x9d, "ifgt", 3, -1;
	IFLE = 0x9e, "ifle", 3, -1;
	IF_ICMPEQ = 0x9f, "if_icmpeq", 3, -2;
	IF_ICMPNE = 0xa0, "if_icmpne", 3, -2;
	IF_ICMPLT = 0xa1, "if_icmplt", 3, -2;
	IF_ICMPGE = 0xa2, "if_icmpge", 3, -2;
	IF_ICMPGT = 0xa3, "if_icmpgt", 3, -2;
	IF_ICMPLE = 0xa4, "if_icmple", 3, -2;
	IF_ACMPEQ = 0xa5, "if_acmpeq", 3, -2;
	IF_ACMPNE = 0xa6, "if_acmpne", 3, -2;
	GOTO = 0xa7, "goto", 3, 0;
	JSR = 0xa8, "jsr", 3, 1;
	RET = 0xa9, "ret", 2, 0;
	TABLESWITCH = 0xaa, "tableswitch", 0, -1;
	LOOKUPSWITCH = 0xab, "lookupswitch", 0, -1;
	IRETURN = 0xac, "ireturn", 1, -1;
	LRETURN = 0xad, "lreturn", 1, -2;
	FRETURN = 0xae, "freturn", 1, -1;
	DRETURN = 0xaf, "dreturn", 1, -2;
	ARETURN = 0xb0, "areturn", 1, -1;
	RETURN = 0xb1, "return", 1, 0;
	GETSTATIC = 0xb2, "getstatic", 3, 0;
	PUTSTATIC = 0xb3, "putstatic", 3, 0;
	GETFIELD = 0xb4, "getfield", 3, 0;
	PUTFIELD = 0xb5, "putfield", 3, 0;
	INVOKEVIRTUAL = 0xb6, "invokevirtual", 3, 0;
	INVOKESPECIAL = 0xb7, "invokespecial", 3, 0;
	INVOKESTATIC = 0xb8, "invokestatic", 3, 0;
	INVOKEINTERFACE = 0xb9, "invokeinterface", 5, 0;
	INVOKEDYNAMIC = 0xba, "invokedynamic", 5, 0;
	NEW = 0xbb, "new", 3, 1;
	NEWARRAY = 0xbc, "newarray", 2, 0;
	ANEWARRAY = 0xbd, "anewarray", 3, 0;
	ARRAYLENGTH = 0xbe, "arraylength", 1, 0;
	ATHROW = 0xbf, "athrow", 1, 0;
	CHECKCAST = 0xc0, "checkcast", 3, 0;
	INSTANCEOF = 0xc1, "instanceof", 3, 0;
	MONITORENTER = 0xc2, "monitorenter", 1, -1;
	MONITOREXIT = 0xc3, "monitorexit", 1, -1;
	WIDE = 0xc4, "wide", 0, 0;
	MULTIANEWARRAY = 0xc5, "multianewarray", 4, 0;
	IFNULL = 0xc6, "ifnull", 3, -1;
	IFNONNULL = 0xc7, "ifnonnull", 3, -1;
	GOTO_W = 0xc8, "goto_w", 5, 0;
	JSR_W = 0xc9, "jsr_w", 5, 1;
}

/// If the opcode is one of the `if*` instructions that branch with an [`i16`] offset.
pub fn is_conditional_branch(opcode: u8) -> bool {
	(IFEQ..=IF_ACMPNE).contains(&opcode) || opcode == IFNULL || opcode == IFNONNULL
}

/// The conditional branch with the condition negated, for example `ifne` for `ifeq`.
pub(crate) fn inverted_branch(opcode: u8) -> u8 {
	match opcode {
		// these come in pairs, starting with an odd opcode
		IFEQ..=IF_ACMPNE => if opcode % 2 == 1 { opcode + 1 } else { opcode - 1 },
		IFNULL => IFNONNULL,
		IFNONNULL => IFNULL,
		other => other,
	}
}

/// If the instruction ends the current path through the code: the return instructions and `athrow`.
pub fn is_end(opcode: u8) -> bool {
	(IRETURN..=RETURN).contains(&opcode) || opcode == ATHROW
}
