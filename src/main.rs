use std::path::{Path, PathBuf};
use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::{debug, error, info, LevelFilter};
use serde::Serialize;
use walkdir::WalkDir;
use jclass::{ClassFile, ClassMap};
use jclass::member::MemberInfo;

#[derive(Debug, Parser)]
#[command(version, about = "Inspects and edits java class files")]
struct Cli {
	/// Be verbose. Given twice, even more verbose.
	#[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
	verbose: u8,

	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Prints the structure of a class file
	Dump {
		file: PathBuf,
		/// Print as json instead of text
		#[arg(long)]
		json: bool,
	},
	/// Checks that class files are written back exactly as they were read
	Roundtrip {
		/// Class files, or directories to search for class files
		#[arg(required = true)]
		paths: Vec<PathBuf>,
	},
	/// Computes the maximum stack depth of every method
	MaxStack {
		file: PathBuf,
		/// Store the computed values and write the class here
		#[arg(long)]
		write: Option<PathBuf>,
	},
	/// Inserts `nop`s into the code of a method
	Pad {
		file: PathBuf,
		#[arg(long)]
		method: String,
		/// Only needed if there are several methods with that name
		#[arg(long)]
		descriptor: Option<String>,
		/// The position of the instruction to insert in front of
		#[arg(long)]
		at: usize,
		#[arg(long)]
		count: usize,
		/// Keep branches to the instruction at the position pointing to it
		#[arg(long)]
		exclusive: bool,
		#[arg(short = 'o', long = "output")]
		output: PathBuf,
	},
	/// Removes unused constant pool entries
	Compact {
		file: PathBuf,
		/// Also drop the debug attributes and others not needed to run the class
		#[arg(long)]
		prune: bool,
		#[arg(short = 'o', long = "output")]
		output: PathBuf,
	},
	/// Renames classes
	Rename {
		file: PathBuf,
		/// A renaming like `a.b.Old=a.b.New`, can be given multiple times
		#[arg(long = "map", required = true, value_parser = parse_mapping)]
		mappings: Vec<(String, String)>,
		#[arg(short = 'o', long = "output")]
		output: PathBuf,
	},
}

fn parse_mapping(s: &str) -> Result<(String, String)> {
	let (old, new) = s.split_once('=')
		.with_context(|| anyhow!("mapping {s:?} isn't of the form `old=new`"))?;
	if old.is_empty() || new.is_empty() {
		bail!("mapping {s:?} has an empty class name");
	}
	Ok((old.to_owned(), new.to_owned()))
}

fn setup_logging(verbose: u8) -> Result<()> {
	let level = match verbose {
		0 => LevelFilter::Warn,
		1 => LevelFilter::Info,
		2 => LevelFilter::Debug,
		_ => LevelFilter::Trace,
	};

	fern::Dispatch::new()
		.format(|out, message, record| {
			out.finish(format_args!("[{} {}] {}", record.level(), record.target(), message))
		})
		.level(level)
		.chain(std::io::stderr())
		.apply()
		.context("failed to set up logging")
}

fn main() -> Result<()> {
	let Cli { verbose, command } = Cli::parse();
	setup_logging(verbose)?;

	match command {
		Command::Dump { file, json } => dump(&file, json),
		Command::Roundtrip { paths } => roundtrip(&paths),
		Command::MaxStack { file, write } => max_stack(&file, write.as_deref()),
		Command::Pad { file, method, descriptor, at, count, exclusive, output } => {
			let mut class = read_class(&file)?;
			pad(&mut class, &method, descriptor.as_deref(), at, count, exclusive)?;
			write_class(&class, &output)
		},
		Command::Compact { file, prune, output } => {
			let mut class = read_class(&file)?;
			let before = class.pool.len();
			if prune {
				class.prune()?;
			} else {
				class.compact()?;
			}
			info!("constant pool of {file:?} went from {before} to {} entries", class.pool.len());
			write_class(&class, &output)
		},
		Command::Rename { file, mappings, output } => {
			let mut class = read_class(&file)?;
			let mut map = ClassMap::new();
			for (old, new) in &mappings {
				map.put(old, new);
			}
			class.rename_classes(&map)
				.with_context(|| anyhow!("failed to rename classes in {file:?}"))?;
			write_class(&class, &output)
		},
	}
}

fn read_class(path: &Path) -> Result<ClassFile> {
	let bytes = std::fs::read(path)
		.with_context(|| anyhow!("failed to read {path:?}"))?;
	jclass::parse(&bytes)
		.with_context(|| anyhow!("failed to parse class file {path:?}"))
}

fn write_class(class: &ClassFile, path: &Path) -> Result<()> {
	let bytes = jclass::serialize(class)
		.with_context(|| anyhow!("failed to serialize class for {path:?}"))?;
	std::fs::write(path, bytes)
		.with_context(|| anyhow!("failed to write {path:?}"))?;
	debug!("wrote {path:?}");
	Ok(())
}

#[derive(Debug, Serialize)]
struct ClassSummary {
	name: String,
	super_class: Option<String>,
	interfaces: Vec<String>,
	version: String,
	access_flags: u16,
	pool_entries: usize,
	fields: Vec<MemberSummary>,
	methods: Vec<MemberSummary>,
	attributes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct MemberSummary {
	name: String,
	descriptor: String,
	access_flags: u16,
	#[serde(skip_serializing_if = "Option::is_none")]
	code: Option<CodeSummary>,
	attributes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CodeSummary {
	length: usize,
	max_stack: u16,
	max_locals: u16,
	exception_handlers: usize,
}

fn attribute_names(class: &ClassFile, attributes: &[jclass::attribute::Attribute]) -> Result<Vec<String>> {
	attributes.iter()
		.map(|attribute| attribute.name(&class.pool).map_err(anyhow::Error::from))
		.collect()
}

fn summarize_member(class: &ClassFile, member: &MemberInfo) -> Result<MemberSummary> {
	Ok(MemberSummary {
		name: member.name(&class.pool)?,
		descriptor: member.descriptor(&class.pool)?,
		access_flags: member.access_flags,
		code: member.code().map(|code| CodeSummary {
			length: code.code_length(),
			max_stack: code.max_stack,
			max_locals: code.max_locals,
			exception_handlers: code.exception_table.len(),
		}),
		attributes: attribute_names(class, &member.attributes)?,
	})
}

fn summarize(class: &ClassFile) -> Result<ClassSummary> {
	Ok(ClassSummary {
		name: class.name()?,
		super_class: class.super_name()?,
		interfaces: class.interface_names()?,
		version: format!("{}.{}", class.version.major, class.version.minor),
		access_flags: class.access_flags,
		pool_entries: class.pool.len(),
		fields: class.fields.iter().map(|field| summarize_member(class, field)).collect::<Result<_>>()?,
		methods: class.methods.iter().map(|method| summarize_member(class, method)).collect::<Result<_>>()?,
		attributes: attribute_names(class, &class.attributes)?,
	})
}

fn dump(file: &Path, json: bool) -> Result<()> {
	let class = read_class(file)?;
	let summary = summarize(&class)?;

	if json {
		println!("{}", serde_json::to_string_pretty(&summary)?);
		return Ok(());
	}

	println!("class {} (version {}, flags {:#06x})", summary.name, summary.version, summary.access_flags);
	if let Some(super_class) = &summary.super_class {
		println!("  extends {super_class}");
	}
	for interface in &summary.interfaces {
		println!("  implements {interface}");
	}
	println!("  {} constant pool entries, attributes {:?}", summary.pool_entries, summary.attributes);
	for field in &summary.fields {
		println!("  field {} {} (flags {:#06x})", field.name, field.descriptor, field.access_flags);
	}
	for method in &summary.methods {
		match &method.code {
			Some(code) => println!("  method {}{} (flags {:#06x}): {} bytes of code, max stack {}, max locals {}",
				method.name, method.descriptor, method.access_flags, code.length, code.max_stack, code.max_locals),
			None => println!("  method {}{} (flags {:#06x})", method.name, method.descriptor, method.access_flags),
		}
	}
	Ok(())
}

fn class_files(path: &Path) -> Result<Vec<PathBuf>> {
	if !path.is_dir() {
		return Ok(vec![path.to_owned()]);
	}
	WalkDir::new(path)
		.into_iter()
		.filter(|res| res.as_ref().is_ok_and(|entry| {
			entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "class")
		}))
		.map(|res| res.map(|entry| entry.into_path()))
		.collect::<Result<_, walkdir::Error>>()
		.with_context(|| anyhow!("failed to get class files (recursively) in {path:?}"))
}

fn roundtrip(paths: &[PathBuf]) -> Result<()> {
	let mut checked = 0;
	let mut failed = 0;
	for path in paths {
		for file in class_files(path)? {
			checked += 1;
			let result = std::fs::read(&file)
				.with_context(|| anyhow!("failed to read {file:?}"))
				.and_then(|bytes| {
					let class = jclass::parse(&bytes)?;
					Ok(jclass::serialize(&class)? == bytes)
				});
			match result {
				Ok(true) => debug!("{file:?} is written back unchanged"),
				Ok(false) => {
					error!("{file:?} is written back differently");
					failed += 1;
				},
				Err(e) => {
					error!("{file:?}: {e:#}");
					failed += 1;
				},
			}
		}
	}

	println!("{} of {checked} class files round trip", checked - failed);
	if failed > 0 {
		bail!("{failed} class files didn't round trip");
	}
	Ok(())
}

fn max_stack(file: &Path, write: Option<&Path>) -> Result<()> {
	let mut class = read_class(file)?;
	let ClassFile { pool, methods, .. } = &mut class;
	for method in methods.iter_mut() {
		let name = method.name(pool)?;
		let descriptor = method.descriptor(pool)?;
		let Some(code) = method.code_mut() else { continue };

		let stored = code.max_stack;
		let computed = code.compute_max_stack(pool)
			.with_context(|| anyhow!("failed to compute max stack of {name}{descriptor}"))?;
		if write.is_none() {
			code.max_stack = stored;
		}
		println!("{name}{descriptor}: stored {stored}, computed {computed}");
	}

	match write {
		Some(output) => write_class(&class, output),
		None => Ok(()),
	}
}

fn pad(class: &mut ClassFile, method_name: &str, descriptor: Option<&str>, at: usize, count: usize, exclusive: bool) -> Result<()> {
	let descriptor = match descriptor {
		Some(descriptor) => descriptor.to_owned(),
		None => {
			let candidates: Vec<_> = class.methods_named(method_name).collect();
			match candidates.as_slice() {
				[] => bail!("no method named {method_name:?}"),
				[method] => method.descriptor(&class.pool)?,
				_ => bail!("there are {} methods named {method_name:?}, pick one with --descriptor", candidates.len()),
			}
		},
	};

	let method = class.method_mut(method_name, &descriptor)
		.with_context(|| anyhow!("no method {method_name}{descriptor}"))?;
	let code = method.code_mut()
		.with_context(|| anyhow!("method {method_name}{descriptor} has no code"))?;

	let gap = code.editor().insert_gap_at(at, count, exclusive)
		.with_context(|| anyhow!("failed to insert {count} bytes at {at} into {method_name}{descriptor}"))?;
	info!("inserted {} nops at {} into {method_name}{descriptor}", gap.length, gap.position);
	Ok(())
}
