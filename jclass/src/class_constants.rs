//! Constants of the class file format.

pub(crate) const MAGIC: u32 = 0xCAFE_BABE;

pub(crate) mod pool {
	pub(crate) const UTF8: u8 = 1;
	pub(crate) const INTEGER: u8 = 3;
	pub(crate) const FLOAT: u8 = 4;
	pub(crate) const LONG: u8 = 5;
	pub(crate) const DOUBLE: u8 = 6;
	pub(crate) const CLASS: u8 = 7;
	pub(crate) const STRING: u8 = 8;
	pub(crate) const FIELD_REF: u8 = 9;
	pub(crate) const METHOD_REF: u8 = 10;
	pub(crate) const INTERFACE_METHOD_REF: u8 = 11;
	pub(crate) const NAME_AND_TYPE: u8 = 12;
	pub(crate) const METHOD_HANDLE: u8 = 15;
	pub(crate) const METHOD_TYPE: u8 = 16;
	pub(crate) const DYNAMIC: u8 = 17;
	pub(crate) const INVOKE_DYNAMIC: u8 = 18;
	pub(crate) const MODULE: u8 = 19;
	pub(crate) const PACKAGE: u8 = 20;
}

pub mod attribute {
	pub const CODE: &str = "Code";
	pub const CONSTANT_VALUE: &str = "ConstantValue";
	pub const EXCEPTIONS: &str = "Exceptions";
	pub const LINE_NUMBER_TABLE: &str = "LineNumberTable";
	pub const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
	pub const LOCAL_VARIABLE_TYPE_TABLE: &str = "LocalVariableTypeTable";
	pub const STACK_MAP_TABLE: &str = "StackMapTable";
	pub const SIGNATURE: &str = "Signature";
	pub const SOURCE_FILE: &str = "SourceFile";
	pub const INNER_CLASSES: &str = "InnerClasses";
	pub const ENCLOSING_METHOD: &str = "EnclosingMethod";
	pub const NEST_HOST: &str = "NestHost";
	pub const NEST_MEMBERS: &str = "NestMembers";
	pub const PERMITTED_SUBCLASSES: &str = "PermittedSubclasses";
	pub const BOOTSTRAP_METHODS: &str = "BootstrapMethods";
	pub const METHOD_PARAMETERS: &str = "MethodParameters";
	pub const SYNTHETIC: &str = "Synthetic";
	pub const DEPRECATED: &str = "Deprecated";
	pub const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
	pub const RUNTIME_INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";
	pub const RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS: &str = "RuntimeVisibleParameterAnnotations";
	pub const RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS: &str = "RuntimeInvisibleParameterAnnotations";
	pub const ANNOTATION_DEFAULT: &str = "AnnotationDefault";
}

pub(crate) mod stack_map_frame {
	pub(crate) const SAME_MAX: u8 = 63;
	pub(crate) const SAME_LOCALS_1_STACK_ITEM_MIN: u8 = 64;
	pub(crate) const SAME_LOCALS_1_STACK_ITEM_MAX: u8 = 127;
	pub(crate) const SAME_LOCALS_1_STACK_ITEM_EXTENDED: u8 = 247;
	pub(crate) const CHOP_MIN: u8 = 248;
	pub(crate) const CHOP_MAX: u8 = 250;
	pub(crate) const SAME_EXTENDED: u8 = 251;
	pub(crate) const APPEND_MIN: u8 = 252;
	pub(crate) const APPEND_MAX: u8 = 254;
	pub(crate) const FULL: u8 = 255;
}

pub(crate) mod verification_type {
	pub(crate) const TOP: u8 = 0;
	pub(crate) const INTEGER: u8 = 1;
	pub(crate) const FLOAT: u8 = 2;
	pub(crate) const DOUBLE: u8 = 3;
	pub(crate) const LONG: u8 = 4;
	pub(crate) const NULL: u8 = 5;
	pub(crate) const UNINITIALIZED_THIS: u8 = 6;
	pub(crate) const OBJECT: u8 = 7;
	pub(crate) const UNINITIALIZED: u8 = 8;
}

pub(crate) mod element_value {
	pub(crate) const ENUM: u8 = b'e';
	pub(crate) const CLASS: u8 = b'c';
	pub(crate) const ANNOTATION: u8 = b'@';
	pub(crate) const ARRAY: u8 = b'[';
}

/// The access flags of classes, fields, methods and inner classes. Some bits mean different things depending on
/// where they're used.
pub mod access {
	pub const PUBLIC: u16 = 0x0001;
	pub const PRIVATE: u16 = 0x0002;
	pub const PROTECTED: u16 = 0x0004;
	pub const STATIC: u16 = 0x0008;
	pub const FINAL: u16 = 0x0010;
	/// Classes only.
	pub const SUPER: u16 = 0x0020;
	/// Methods only.
	pub const SYNCHRONIZED: u16 = 0x0020;
	pub const VOLATILE: u16 = 0x0040;
	pub const BRIDGE: u16 = 0x0040;
	pub const TRANSIENT: u16 = 0x0080;
	pub const VARARGS: u16 = 0x0080;
	pub const NATIVE: u16 = 0x0100;
	pub const INTERFACE: u16 = 0x0200;
	pub const ABSTRACT: u16 = 0x0400;
	pub const STRICT: u16 = 0x0800;
	pub const SYNTHETIC: u16 = 0x1000;
	pub const ANNOTATION: u16 = 0x2000;
	pub const ENUM: u16 = 0x4000;
	pub const MODULE: u16 = 0x8000;
}
