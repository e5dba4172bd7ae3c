//! Thin command-line dispatcher over the library's four entry points.
//! Argument parsing lives entirely here; the library never sees a
//! `std::env::Args`.

use std::{
  fs::File,
  io::Read,
  path::{Path, PathBuf},
};

use bigviv::{
  encode, extract, get_info, output_name, parse_directory, ArchiveFormat, Directory, DirectorySummary,
  EncodeInput, EncodeOptions, ExtractOptions, ParseOptions, Selector,
};

#[derive(Debug, Default)]
struct Flags {
  verbose: bool,
  dry_run: bool,
  filter_name: Option<String>,
  filter_index: Option<u32>,
  hex_escape: bool,
  fixed_stride: Option<u32>,
  format: Option<ArchiveFormat>,
  alignment: Option<u32>,
  overwrite: Option<bool>,
}

fn main() {
  env_logger::init();
  let args: Vec<String> = std::env::args().skip(1).collect();
  if args.is_empty() {
    print_usage();
    return;
  }
  std::process::exit(run(&args));
}

fn print_usage() {
  println!(
    "usage:\n  \
     bigviv d [OPTIONS] <archive> [<out_dir>]       decode\n  \
     bigviv e [OPTIONS] <archive> <file> [<file>...] encode\n  \
     bigviv <archive>                                info\n  \
     bigviv <file> [<file>...]                       encode to ./<basename>.viv\n\n\
     options:\n  \
     -v              verbose pretty-print of directory\n  \
     -p              dry-run (plan only, no writes)\n  \
     -fn NAME        (d) extract by name\n  \
     -id N           (d) extract by 1-based index\n  \
     -we             (d) hex-escape non-printable filenames\n  \
     -dnl N          (d, e) fixed entry stride\n  \
     -fmt FMT        (e) BIGF/BIGH/BIG4\n  \
     -aofs N         (e) payload alignment\n  \
     -ovr 0/1        (d, e) overwrite policy"
  );
}

fn run(args: &[String]) -> i32 {
  let (flags, positionals) = match parse_args(args) {
    Ok(parsed) => parsed,
    Err(message) => {
      eprintln!("{message}");
      return 1;
    }
  };

  match positionals.first().map(String::as_str) {
    Some("d") => decode_command(&positionals[1..], &flags),
    Some("e") => encode_command(&positionals[1..], &flags),
    Some(_) if positionals.len() == 1 => dispatch_single_positional(&positionals[0], &flags),
    Some(_) => encode_shortform(&positionals, &flags),
    None => {
      print_usage();
      0
    }
  }
}

fn parse_args(args: &[String]) -> Result<(Flags, Vec<String>), String> {
  let mut flags = Flags::default();
  let mut positionals = Vec::new();
  let mut i = 0;
  while i < args.len() {
    match args[i].as_str() {
      "-v" => {
        flags.verbose = true;
        i += 1;
      }
      "-p" => {
        flags.dry_run = true;
        i += 1;
      }
      "-we" => {
        flags.hex_escape = true;
        i += 1;
      }
      "-fn" => {
        flags.filter_name = Some(require_value(args, i, "-fn")?);
        i += 2;
      }
      "-id" => {
        let raw = require_value(args, i, "-id")?;
        flags.filter_index = Some(raw.parse().map_err(|_| format!("-id: not a number: {raw}"))?);
        i += 2;
      }
      "-dnl" => {
        let raw = require_value(args, i, "-dnl")?;
        flags.fixed_stride = Some(raw.parse().map_err(|_| format!("-dnl: not a number: {raw}"))?);
        i += 2;
      }
      "-fmt" => {
        let raw = require_value(args, i, "-fmt")?;
        flags.format = Some(raw.parse().map_err(|()| format!("-fmt: unrecognized format: {raw}"))?);
        i += 2;
      }
      "-aofs" => {
        let raw = require_value(args, i, "-aofs")?;
        flags.alignment = Some(raw.parse().map_err(|_| format!("-aofs: not a number: {raw}"))?);
        i += 2;
      }
      "-ovr" => {
        let raw = require_value(args, i, "-ovr")?;
        flags.overwrite = Some(match raw.as_str() {
          "0" => false,
          "1" => true,
          other => return Err(format!("-ovr: expected 0 or 1, got {other}")),
        });
        i += 2;
      }
      other => {
        positionals.push(other.to_string());
        i += 1;
      }
    }
  }
  Ok((flags, positionals))
}

fn require_value(args: &[String], at: usize, flag: &str) -> Result<String, String> {
  args.get(at + 1).cloned().ok_or_else(|| format!("{flag}: missing value"))
}

fn dispatch_single_positional(path: &str, flags: &Flags) -> i32 {
  if looks_like_archive(Path::new(path)) {
    info_command(path, flags)
  } else {
    encode_shortform(std::slice::from_ref(&path.to_string()), flags)
  }
}

fn looks_like_archive(path: &Path) -> bool {
  let Ok(mut file) = File::open(path) else { return false };
  let mut magic = [0u8; 4];
  file.read_exact(&mut magic).is_ok() && ArchiveFormat::detect(magic).is_some()
}

fn decode_command(args: &[String], flags: &Flags) -> i32 {
  let Some(archive_arg) = args.first() else {
    eprintln!("d: missing <archive>");
    return 1;
  };
  let archive_path = Path::new(archive_arg);
  let out_dir = args.get(1).map(Path::new).unwrap_or_else(|| Path::new("."));

  let parse_options = ParseOptions { fixed_entry_stride: flags.fixed_stride, ..ParseOptions::default() };
  let mut file = match File::open(archive_path) {
    Ok(file) => file,
    Err(e) => {
      eprintln!("{}: {e}", archive_path.display());
      return 1;
    }
  };
  let directory = match parse_directory(&mut file, &parse_options) {
    Ok(directory) => directory,
    Err(e) => {
      eprintln!("{e}");
      return 1;
    }
  };
  log::info!(
    "{}: format {}, {} entries, validity {:?}",
    archive_path.display(), directory.format.name(), directory.len(), directory.validity()
  );

  if flags.verbose || flags.dry_run {
    print_directory(&directory, flags.hex_escape);
  }
  if flags.dry_run {
    return 0;
  }

  let selector = if let Some(name) = &flags.filter_name {
    Selector::ByName(name.as_bytes().to_vec())
  } else if let Some(index) = flags.filter_index {
    Selector::ByIndex(index.saturating_sub(1))
  } else {
    Selector::All
  };

  let extract_options = ExtractOptions {
    overwrite: flags.overwrite.unwrap_or(false),
    force_hex_names: flags.hex_escape,
    ..ExtractOptions::default()
  };

  match extract(&mut file, &directory, &selector, out_dir, &extract_options) {
    Ok(report) => {
      println!("{} file(s) written", report.written_count());
      0
    }
    Err(e) => {
      eprintln!("{e}");
      1
    }
  }
}

fn encode_command(args: &[String], flags: &Flags) -> i32 {
  if args.len() < 2 {
    eprintln!("e: need <archive> and at least one <file>");
    return 1;
  }
  let archive_path = Path::new(&args[0]);
  let inputs: Vec<EncodeInput> = args[1..]
    .iter()
    .map(|raw_path| {
      let source_path = PathBuf::from(raw_path);
      let name = source_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
      EncodeInput { name, source_path }
    })
    .collect();

  let options = EncodeOptions {
    format: flags.format.unwrap_or_default(),
    fixed_entry_stride: flags.fixed_stride,
    payload_alignment: flags.alignment,
    dry_run: flags.dry_run,
    overwrite: flags.overwrite.unwrap_or(true),
  };

  match encode(&inputs, archive_path, &options) {
    Ok(report) => {
      for path in &report.skipped {
        eprintln!("{}: skipped (missing, not a regular file, or unreadable)", path.display());
      }
      let packed = inputs.len() - report.skipped.len();
      if flags.dry_run {
        println!(
          "would write {packed} entries, {} bytes to {}", report.archive_size, archive_path.display()
        );
        if flags.verbose {
          for input in &inputs {
            println!("  {}", input.name);
          }
        }
        return 0;
      }
      log::info!(
        "{}: format {}, {} entries, {} bytes",
        archive_path.display(), options.format.name(), packed, report.archive_size
      );
      if flags.verbose {
        println!("wrote {} bytes, {packed} entries", report.archive_size);
      }
      0
    }
    Err(e) => {
      eprintln!("{e}");
      1
    }
  }
}

fn encode_shortform(files: &[String], flags: &Flags) -> i32 {
  let first = Path::new(&files[0]);
  let stem = first.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "archive".to_string());
  let archive_path = format!("{stem}.viv");

  let mut full_args = Vec::with_capacity(files.len() + 1);
  full_args.push(archive_path);
  full_args.extend_from_slice(files);
  encode_command(&full_args, flags)
}

fn info_command(path: &str, flags: &Flags) -> i32 {
  let archive_path = Path::new(path);
  let parse_options = ParseOptions { fixed_entry_stride: flags.fixed_stride, ..ParseOptions::default() };
  match get_info(archive_path, &parse_options) {
    Ok((directory, summary)) => {
      print_summary(&summary);
      if flags.verbose {
        print_directory(&directory, flags.hex_escape);
      }
      0
    }
    Err(e) => {
      eprintln!("{e}");
      1
    }
  }
}

fn print_summary(summary: &DirectorySummary) {
  println!(
    "format {} | {} entries ({} valid, {} invalid, {} missing) | archive_size {} (declared {}) | {:?}",
    summary.format.name(), summary.entry_count, summary.valid_count, summary.invalid_count,
    summary.missing_count, summary.computed_archive_size, summary.declared_archive_size, summary.validity
  );
}

fn print_directory(directory: &Directory, force_hex: bool) {
  for (index, entry) in directory.entries.iter().enumerate() {
    println!(
      "  [{index:>4}] {:<10?} offset={:<10} size={:<10} name={}",
      entry.validity, entry.offset, entry.size, output_name(entry, force_hex)
    );
  }
}
