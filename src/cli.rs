// Command-line front end.
//
// One subcommand per pipeline: binary patch generation and reconstruction,
// source patch generation and application. Library errors are printed as
// `classpatch: <error>` and exit with 1; applying source patches with rejects
// exits with 2.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};

use crate::archive::{ArchiveError, ClassArchive};
use crate::binpatch::{
    ApplyError, Baseline, BinPatchGenerator, ContainerError, GenerateError, GenerateOptions,
    PatchContainer, Side, TransformChain, TransformError, patch_archive, transform_by_name,
};
use crate::mapping::{MappingError, MappingTable, MappingTableBuilder, Repackager};
use crate::selection::{DEFAULT_PATCH_SUFFIX, PatchSelector, SelectionError};
use crate::textpatch::{
    ApplyOptions, FailureMode, LayeredTree, MatchOptions, MemoryTree, PatchApplier,
    PatchGenOptions, PatchGenerator, PatchSource, PatchStage, TextPatchError,
};

const EXIT_REJECTS: i32 = 2;

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Binary class patches and unified source patches.
#[derive(Parser, Debug)]
#[command(
    name = "classpatch",
    version,
    about = "Binary class patches and unified source patches",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (errors only).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use twice for debug output).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Build runtime and dev binary patch containers.
    GenBinpatches(GenBinArgs),
    /// Rebuild a patched archive from a baseline and a container.
    ApplyBinpatches(ApplyBinArgs),
    /// Diff a changed source tree against the original into a patch directory.
    GenPatches(GenPatchArgs),
    /// Apply chained patch stages to a source tree.
    ApplyPatches(ApplyPatchArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StageArg {
    None,
    Lzma,
    Zlib,
}

impl StageArg {
    fn name(self) -> &'static str {
        match self {
            StageArg::None => "none",
            StageArg::Lzma => "lzma",
            StageArg::Zlib => "zlib",
        }
    }
}

#[derive(Args, Debug)]
struct TransformArgs {
    /// Packer stage applied to container archives.
    #[arg(long, value_enum, default_value_t = StageArg::None)]
    packer: StageArg,

    /// Compressor stage applied after the packer.
    #[arg(long, value_enum, default_value_t = StageArg::Lzma)]
    compressor: StageArg,
}

impl TransformArgs {
    fn chain(&self) -> Result<TransformChain, TransformError> {
        Ok(TransformChain::new(
            transform_by_name(self.packer.name())?,
            transform_by_name(self.compressor.name())?,
        ))
    }
}

#[derive(Args, Debug)]
struct GenBinArgs {
    /// SRG mapping file (repeatable; later files override earlier ones).
    #[arg(long = "srg", required = true, value_hint = ValueHint::FilePath)]
    srg: Vec<PathBuf>,

    /// CSV packaging table used to move classes out of the flat package.
    #[arg(long, value_hint = ValueHint::FilePath)]
    packaging: Option<PathBuf>,

    /// Source patch directory selecting the classes to patch (repeatable).
    #[arg(long = "patches", required = true, value_hint = ValueHint::DirPath)]
    patches: Vec<PathBuf>,

    /// Suffix of source patch files.
    #[arg(long = "patch-suffix", default_value = DEFAULT_PATCH_SUFFIX)]
    patch_suffix: String,

    /// Clean client archive.
    #[arg(long, value_hint = ValueHint::FilePath)]
    client: Option<PathBuf>,

    /// Clean server archive.
    #[arg(long, value_hint = ValueHint::FilePath)]
    server: Option<PathBuf>,

    /// Clean merged archive.
    #[arg(long, value_hint = ValueHint::FilePath)]
    merged: Option<PathBuf>,

    /// Recompiled archive holding the modified classes.
    #[arg(long, value_hint = ValueHint::FilePath)]
    dirty: PathBuf,

    /// Output container for client and server records.
    #[arg(long = "runtime-out", value_hint = ValueHint::FilePath)]
    runtime_out: PathBuf,

    /// Output container for merged records.
    #[arg(long = "dev-out", value_hint = ValueHint::FilePath)]
    dev_out: PathBuf,

    /// Skip touched classes missing from the dirty archive instead of failing.
    #[arg(long = "skip-missing")]
    skip_missing: bool,

    #[command(flatten)]
    transform: TransformArgs,
}

#[derive(Args, Debug)]
struct ApplyBinArgs {
    /// Patch container.
    #[arg(long = "patches", value_hint = ValueHint::FilePath)]
    patches: PathBuf,

    /// Clean archive to patch.
    #[arg(long, value_hint = ValueHint::FilePath)]
    baseline: PathBuf,

    /// Which baseline root the archive is.
    #[arg(long)]
    side: Side,

    /// Output archive.
    #[arg(long, short = 'o', value_hint = ValueHint::FilePath)]
    output: PathBuf,

    #[command(flatten)]
    transform: TransformArgs,
}

#[derive(Args, Debug)]
struct GenPatchArgs {
    /// Original sources, directory or zip (repeatable; earlier layers win).
    #[arg(long, required = true, value_hint = ValueHint::AnyPath)]
    original: Vec<PathBuf>,

    /// Changed sources, directory or zip.
    #[arg(long, value_hint = ValueHint::AnyPath)]
    changed: PathBuf,

    /// Patch directory to write.
    #[arg(long, short = 'o', value_hint = ValueHint::DirPath)]
    output: PathBuf,

    /// Context lines around each change.
    #[arg(long, default_value_t = 3)]
    context: usize,

    /// Label prefix of the original side.
    #[arg(long = "original-prefix", default_value = "a")]
    original_prefix: String,

    /// Label prefix of the changed side.
    #[arg(long = "changed-prefix", default_value = "b")]
    changed_prefix: String,

    /// Appended to each source path to name its patch.
    #[arg(long = "patch-suffix", default_value = ".patch")]
    patch_suffix: String,
}

#[derive(Args, Debug)]
struct ApplyPatchArgs {
    /// Sources to patch, directory or zip.
    #[arg(long, value_hint = ValueHint::AnyPath)]
    input: PathBuf,

    /// Patch set, directory or zip (repeatable; applied in order).
    #[arg(long = "patches", required = true, value_hint = ValueHint::AnyPath)]
    patches: Vec<PathBuf>,

    /// Files merged in before the first patch set (repeatable).
    #[arg(long, value_hint = ValueHint::AnyPath)]
    inject: Vec<PathBuf>,

    /// Output directory, or a `.zip`/`.jar` archive.
    #[arg(long, short = 'o', value_hint = ValueHint::AnyPath)]
    output: PathBuf,

    /// Context lines each hunk may ignore at either end.
    #[arg(long, default_value_t = 0)]
    fuzz: usize,

    /// Furthest a hunk may move from its expected line.
    #[arg(long = "max-offset")]
    max_offset: Option<usize>,

    /// Compare lines exactly (no whitespace or access modifier leniency).
    #[arg(long)]
    strict: bool,

    /// Write rejects for failed hunks instead of stopping.
    #[arg(long)]
    reject: bool,

    /// Directory for reject files.
    #[arg(long = "reject-dir", value_hint = ValueHint::DirPath)]
    reject_dir: Option<PathBuf>,

    /// Leading label components to strip to find each target.
    #[arg(long, short = 'p', default_value_t = 1)]
    strip: usize,

    /// Suffix of patch files.
    #[arg(long = "patch-suffix", default_value = ".patch")]
    patch_suffix: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    TextPatch(#[from] TextPatchError),
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("output file exists, use -f to overwrite: {}", .0.display())]
    OutputExists(PathBuf),
    #[error("no baseline archive given (use --client, --server or --merged)")]
    NoBaseline,
}

struct Globals {
    force: bool,
    json_output: bool,
}

impl Globals {
    fn check_output(&self, path: &Path) -> Result<(), CliError> {
        if path.exists() && !self.force {
            return Err(CliError::OutputExists(path.to_path_buf()));
        }
        Ok(())
    }

    fn emit_json(&self, json: serde_json::Value) {
        if self.json_output {
            match serde_json::to_string_pretty(&json) {
                Ok(text) => eprintln!("{text}"),
                Err(e) => log::warn!("cannot render JSON stats: {e}"),
            }
        }
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("classpatch".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = log_filter(&cli);
    }
}

fn log_filter(cli: &Cli) -> &'static str {
    if cli.quiet {
        return "error";
    }
    match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("classpatch version {version}");

    let lzma = cfg!(feature = "lzma") as u8;
    let zlib = cfg!(feature = "zlib") as u8;
    let adler32 = cfg!(feature = "adler32") as u8;
    let parallel = cfg!(feature = "parallel") as u8;

    eprintln!("TRANSFORM_LZMA={lzma}");
    eprintln!("TRANSFORM_ZLIB={zlib}");
    eprintln!("SIMD_ADLER32={adler32}");
    eprintln!("PARALLEL={parallel}");
    eprintln!("DELTA_BLOCK_SIZE={}", crate::delta::BLOCK_SIZE);
    eprintln!("PATCH_SUFFIX={DEFAULT_PATCH_SUFFIX}");

    0
}

// ---------------------------------------------------------------------------
// Binary patches
// ---------------------------------------------------------------------------

fn load_mapping(srg: &[PathBuf], packaging: Option<&Path>) -> Result<MappingTable, CliError> {
    let mut builder = MappingTableBuilder::new();
    let mut skipped = 0;
    for path in srg {
        skipped += builder.load_path(path)?.skipped;
    }
    if skipped > 0 {
        log::warn!("{skipped} malformed mapping lines skipped");
    }
    let table = builder.build();
    match packaging {
        Some(csv) => {
            let mut repackager = Repackager::new();
            repackager.load_csv_path(csv)?;
            Ok(table.repackaged(&repackager))
        }
        None => Ok(table),
    }
}

fn cmd_gen_binpatches(args: GenBinArgs, globals: &Globals) -> Result<i32, CliError> {
    let chain = args.transform.chain()?;
    globals.check_output(&args.runtime_out)?;
    globals.check_output(&args.dev_out)?;

    let mapping = Arc::new(load_mapping(&args.srg, args.packaging.as_deref())?);
    let selection = PatchSelector::new(Arc::clone(&mapping))
        .with_suffix(args.patch_suffix)
        .select(&args.patches)?;

    let mut baselines = Vec::new();
    for (side, path) in [
        (Side::Client, &args.client),
        (Side::Server, &args.server),
        (Side::Merged, &args.merged),
    ] {
        if let Some(path) = path {
            baselines.push(Baseline::open(side, path)?);
        }
    }
    if baselines.is_empty() {
        return Err(CliError::NoBaseline);
    }

    let mut dirty = ClassArchive::open(&args.dirty)?;
    let generator = BinPatchGenerator::with_options(
        mapping,
        GenerateOptions {
            skip_missing_dirty: args.skip_missing,
        },
    );
    let touched: &BTreeSet<String> = &selection.touched;
    let generated = generator.generate(&mut baselines, &mut dirty, touched)?;
    generated.write_containers(&args.runtime_out, &args.dev_out, &chain)?;

    globals.emit_json(serde_json::json!({
        "command": "gen-binpatches",
        "patches": selection.patches,
        "touched": selection.touched.len(),
        "unresolved": selection.unresolved,
        "runtime_records": generated.runtime.len(),
        "dev_records": generated.dev.len(),
    }));
    Ok(0)
}

fn cmd_apply_binpatches(args: ApplyBinArgs, globals: &Globals) -> Result<i32, CliError> {
    let chain = args.transform.chain()?;
    globals.check_output(&args.output)?;

    let container = PatchContainer::read_from(&args.patches, &chain)?;
    let mut baseline = ClassArchive::open(&args.baseline)?;
    let file = File::create(&args.output).map_err(|source| CliError::Io {
        path: args.output.clone(),
        source,
    })?;
    let (mut out, report) =
        patch_archive(&mut baseline, &container, args.side, BufWriter::new(file))?;
    out.flush().map_err(|source| CliError::Io {
        path: args.output.clone(),
        source,
    })?;

    globals.emit_json(serde_json::json!({
        "command": "apply-binpatches",
        "side": args.side.to_string(),
        "copied": report.copied,
        "patched": report.patched,
        "added": report.added,
    }));
    Ok(0)
}

// ---------------------------------------------------------------------------
// Source patches
// ---------------------------------------------------------------------------

fn open_tree(path: &Path) -> Result<LayeredTree, TextPatchError> {
    let mut tree = LayeredTree::new();
    tree.push_path(path)?;
    Ok(tree)
}

fn cmd_gen_patches(args: GenPatchArgs, globals: &Globals) -> Result<i32, CliError> {
    let mut original = LayeredTree::new();
    for path in &args.original {
        original.push_path(path)?;
    }
    let changed = open_tree(&args.changed)?;

    let generator = PatchGenerator::new(PatchGenOptions {
        context: args.context,
        original_prefix: args.original_prefix,
        changed_prefix: args.changed_prefix,
        patch_suffix: args.patch_suffix,
    });
    let report = generator.generate(&original, &changed, &args.output)?;

    globals.emit_json(serde_json::json!({
        "command": "gen-patches",
        "written": report.written,
        "unchanged": report.unchanged.len(),
        "removed": report.removed,
    }));
    Ok(0)
}

fn cmd_apply_patches(args: ApplyPatchArgs, globals: &Globals) -> Result<i32, CliError> {
    let as_zip = is_archive_path(&args.output);
    if as_zip {
        globals.check_output(&args.output)?;
    }

    let input = open_tree(&args.input)?;
    let mut tree = MemoryTree::load(&input)?;
    let mut stages: Vec<PatchStage> = args
        .patches
        .iter()
        .map(|p| PatchStage::new(PatchSource::from_path(p)))
        .collect();
    if let Some(first) = stages.first_mut() {
        first.injects = args.inject.clone();
    }

    let base = if args.strict {
        MatchOptions::strict()
    } else {
        MatchOptions::default()
    };
    let applier = PatchApplier::new(ApplyOptions {
        matching: MatchOptions {
            max_fuzz: args.fuzz,
            max_offset: args.max_offset,
            ..base
        },
        failure: if args.reject {
            FailureMode::Reject
        } else {
            FailureMode::Fail
        },
        reject_dir: args.reject_dir,
        patch_suffix: args.patch_suffix,
        strip: args.strip,
    });
    let summary = applier.apply_stages(&mut tree, &stages)?;

    if as_zip {
        let bytes = tree.to_zip(&args.output.display().to_string())?;
        std::fs::write(&args.output, bytes).map_err(|source| CliError::Io {
            path: args.output.clone(),
            source,
        })?;
    } else {
        tree.write_to_dir(&args.output)?;
    }

    globals.emit_json(serde_json::json!({
        "command": "apply-patches",
        "files": summary.files.len(),
        "injected": summary.injected,
        "fuzzed_hunks": summary.fuzzed,
        "failed_hunks": summary.failed_hunks,
        "rejects": summary.rejects,
    }));
    if summary.is_clean() {
        Ok(0)
    } else {
        log::warn!("{} hunks rejected", summary.failed_hunks);
        Ok(EXIT_REJECTS)
    }
}

fn is_archive_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip") || e.eq_ignore_ascii_case("jar"))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(&cli)))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let globals = Globals {
        force: cli.force,
        json_output: cli.json_output,
    };
    let result = match cli.command {
        Cmd::GenBinpatches(args) => cmd_gen_binpatches(args, &globals),
        Cmd::ApplyBinpatches(args) => cmd_apply_binpatches(args, &globals),
        Cmd::GenPatches(args) => cmd_gen_patches(args, &globals),
        Cmd::ApplyPatches(args) => cmd_apply_patches(args, &globals),
        Cmd::Config => Ok(cmd_config()),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("classpatch: {e}");
            1
        }
    };
    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let argv: Vec<String> = std::iter::once("classpatch".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        Cli::try_parse_from(argv).expect("cli parse failed")
    }

    #[test]
    fn gen_binpatches_maps_correctly() {
        let cli = parse(&[
            "gen-binpatches",
            "--srg",
            "a.srg",
            "--srg",
            "b.srg",
            "--patches",
            "patches",
            "--client",
            "client.jar",
            "--dirty",
            "dirty.jar",
            "--runtime-out",
            "runtime.lzma",
            "--dev-out",
            "dev.lzma",
            "--compressor",
            "zlib",
        ]);
        let Cmd::GenBinpatches(args) = cli.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(args.srg, [PathBuf::from("a.srg"), PathBuf::from("b.srg")]);
        assert_eq!(args.client, Some(PathBuf::from("client.jar")));
        assert!(args.server.is_none());
        assert_eq!(args.patch_suffix, DEFAULT_PATCH_SUFFIX);
        assert_eq!(args.transform.packer, StageArg::None);
        assert_eq!(args.transform.compressor, StageArg::Zlib);
        assert!(!args.skip_missing);
    }

    #[test]
    fn apply_binpatches_parses_side() {
        let cli = parse(&[
            "apply-binpatches",
            "--patches",
            "p.lzma",
            "--baseline",
            "server.jar",
            "--side",
            "server",
            "-o",
            "out.jar",
        ]);
        let Cmd::ApplyBinpatches(args) = cli.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(args.side, Side::Server);
        assert_eq!(args.transform.compressor, StageArg::Lzma);
    }

    #[test]
    fn apply_patches_defaults() {
        let cli = parse(&[
            "apply-patches",
            "--input",
            "src",
            "--patches",
            "one",
            "--patches",
            "two.zip",
            "-o",
            "out",
        ]);
        let Cmd::ApplyPatches(args) = cli.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(args.patches.len(), 2);
        assert_eq!(args.fuzz, 0);
        assert_eq!(args.strip, 1);
        assert!(!args.reject && !args.strict);
        assert!(args.max_offset.is_none());
    }

    #[test]
    fn gen_patches_defaults() {
        let cli = parse(&[
            "gen-patches",
            "--original",
            "clean",
            "--changed",
            "dirty",
            "-o",
            "patches",
        ]);
        let Cmd::GenPatches(args) = cli.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(args.context, 3);
        assert_eq!((args.original_prefix.as_str(), args.changed_prefix.as_str()), ("a", "b"));
    }

    #[test]
    fn verbosity_selects_log_filter() {
        assert_eq!(log_filter(&parse(&["config"])), "warn");
        assert_eq!(log_filter(&parse(&["-v", "config"])), "info");
        assert_eq!(log_filter(&parse(&["-vvv", "config"])), "debug");
        assert_eq!(log_filter(&parse(&["--quiet", "config"])), "error");
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let argv = ["classpatch", "-q", "-v", "config"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn stage_names_resolve() {
        let args = TransformArgs {
            packer: StageArg::None,
            compressor: StageArg::None,
        };
        assert!(args.chain().is_ok());
        assert!(is_archive_path(Path::new("out.JAR")));
        assert!(!is_archive_path(Path::new("out")));
    }
}
