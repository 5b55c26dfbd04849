mod config;

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};

use precomp_codecs::default_registry;
use precomp_core::{
    BatchOptions, BatchResult, BatchStatistics, CodecDescriptor, CodecId, DataSource,
    DurableWriter, Engine, Item, ItemResult, ItemStatus, OverwritePolicy, WriteOptions,
    WriteStatus,
};

use config::Config;

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "precomp",
    about = "Precompress files into per-codec variants and pick between them by Accept-Encoding",
    version
)]
struct Cli {
    /// More log output: -v for debug, -vv for trace (RUST_LOG also works)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// JSON file with codec levels, batch and write options, preference order
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress files with several codecs and write `<name>.<suffix>` variants
    Compress(CompressArgs),
    /// Decode a single variant back to raw bytes
    Decompress {
        /// Compressed file ("-" reads stdin, which requires --codec)
        input: PathBuf,
        /// Destination ("-" writes to stdout; default: input without suffix)
        output: Option<PathBuf>,
        /// Codec to decode with (default: inferred from the file suffix)
        #[arg(short, long)]
        codec: Option<CodecId>,
        /// Replace an existing destination file
        #[arg(short, long)]
        force: bool,
    },
    /// Choose a variant for an Accept-Encoding header value
    Negotiate {
        /// Header value, e.g. "br;q=1.0, gzip;q=0.8, *;q=0.1"
        header: String,
        /// Variants on offer, comma separated (default: every available codec)
        #[arg(short, long, value_delimiter = ',')]
        available: Vec<CodecId>,
        /// Wildcard fallback order, comma separated (default: br,zstd,gzip,lz4)
        #[arg(long, value_delimiter = ',')]
        prefer: Vec<CodecId>,
    },
    /// List known codecs, their level ranges and availability
    Codecs {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct CompressArgs {
    /// Files to compress
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Directory for the variants (default: next to each input)
    #[arg(short, long)]
    out_dir: Option<PathBuf>,
    /// Codecs to run, comma separated: gzip, br, zstd, lz4 (default: all available)
    #[arg(short, long, value_delimiter = ',')]
    codecs: Vec<CodecId>,
    /// Level override as codec=level, repeatable (e.g. -l br=9)
    #[arg(short, long = "level", value_parser = parse_level_assignment)]
    levels: Vec<(CodecId, i32)>,
    /// What to do with existing variants: fail | replace | skip
    #[arg(long)]
    policy: Option<OverwritePolicy>,
    /// Reject inputs larger than this many bytes
    #[arg(long)]
    max_bytes: Option<u64>,
    /// Stop at the first input that fails
    #[arg(long)]
    fail_fast: bool,
    /// Compress inputs in parallel
    #[arg(short, long)]
    parallel: bool,
    /// Decode every variant and compare with the input before writing
    #[arg(long)]
    verify: bool,
    /// Octal mode bits for written variants, e.g. 644
    #[arg(long, value_parser = parse_mode)]
    mode: Option<u32>,
    /// Skip fsync of variants and directories
    #[arg(long)]
    no_sync: bool,
    /// Compress and report, but write nothing
    #[arg(long)]
    dry_run: bool,
    /// Print batch statistics as JSON on stdout
    #[arg(long)]
    json: bool,
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn parse_level_assignment(s: &str) -> Result<(CodecId, i32), String> {
    let (name, level) = s
        .split_once('=')
        .ok_or_else(|| format!("expected codec=level, got '{}'", s))?;
    let codec: CodecId = name.trim().parse().map_err(|e: precomp_core::Error| e.to_string())?;
    let level: i32 = level
        .trim()
        .parse()
        .map_err(|_| format!("level '{}' is not an integer", level.trim()))?;
    Ok((codec, level))
}

fn parse_mode(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0o");
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|m| *m <= 0o7777)
        .ok_or_else(|| format!("'{}' is not an octal file mode", s))
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    if verbose > 0 {
        builder.parse_filters(level);
    }
    builder.format_timestamp(None).init();
}

fn print_item(result: &ItemResult) {
    eprintln!("  {} ({})", result.id(), human_bytes(result.original_size()));
    if let Some(fatal) = result.fatal_error() {
        eprintln!("    failed ({}): {}", fatal.kind, fatal.message);
        return;
    }
    for (codec, outcome) in result.outcomes() {
        match outcome.failure() {
            Some(f) => eprintln!("    {:<6}: failed ({}): {}", codec, f.kind, f.message),
            None => eprintln!(
                "    {:<6}: {} ({:.1}% saved) in {:.3}ms",
                codec,
                human_bytes(result.compressed_size(codec).unwrap_or(0)),
                result.saved_percent(codec).unwrap_or(0.0),
                result.elapsed_ms(codec).unwrap_or(0.0)
            ),
        }
    }
}

fn print_summary(stats: &BatchStatistics, elapsed_secs: f64) {
    eprintln!();
    eprintln!(
        "  items       : {} ({} ok, {} partial, {} failed)",
        stats.total_items, stats.ok_items, stats.partial_items, stats.failed_items
    );
    eprintln!("  success     : {:.1}%", stats.success_rate * 100.0);
    eprintln!("  raw size    : {}", human_bytes(stats.total_original_bytes));
    for c in &stats.codecs {
        eprintln!(
            "  {:<6}      : {}/{} ok, ratio mean {:.3} p50 {:.3} p95 {:.3}, time p95 {:.3}ms",
            c.codec,
            c.successes,
            c.attempts,
            c.ratio.mean,
            c.ratio.median,
            c.ratio.p95,
            c.time_ms.p95
        );
    }
    eprintln!("  elapsed     : {:.3}s", elapsed_secs);
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(args: CompressArgs, config: &Config) -> anyhow::Result<()> {
    let registry = Arc::new(default_registry());
    let fallback: Vec<CodecId> = registry.available_codecs().iter().map(|d| d.id).collect();
    let set = config.algorithm_set(&args.codecs, &args.levels, &fallback)?;
    for codec in set.codecs() {
        if !registry.is_available(codec) {
            log::warn!("{} is not available in this build; it will be reported as failed", codec);
        }
    }

    let options = BatchOptions {
        fail_fast: args.fail_fast || config.batch.fail_fast,
        max_bytes: args.max_bytes.or(config.batch.max_bytes),
        parallel: args.parallel || config.batch.parallel,
        verify: args.verify || config.batch.verify,
    };
    let items = args
        .inputs
        .iter()
        .map(|path| {
            Item::new(
                path.display().to_string(),
                DataSource::File(path.clone()),
                set.clone(),
            )
        })
        .collect();

    let t0 = Instant::now();
    let batch: BatchResult = Engine::with_options(registry, options)
        .compress_batch(items)
        .context("compressing inputs")?;
    for result in &batch {
        print_item(result);
    }

    if !args.dry_run {
        let writer = DurableWriter::new(WriteOptions {
            policy: args.policy.unwrap_or(config.write.policy),
            permissions: args.mode.or(config.write.permissions),
            sync: config.write.sync && !args.no_sync,
            ..config.write.clone()
        });
        write_variants(&writer, &args.inputs, args.out_dir.as_deref(), &batch)?;
    }

    let stats = batch.summary();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_summary(&stats, t0.elapsed().as_secs_f64());
    }

    if stats.failed_items > 0 {
        anyhow::bail!("{} of {} input(s) failed", stats.failed_items, stats.total_items);
    }
    Ok(())
}

fn write_variants(
    writer: &DurableWriter,
    inputs: &[PathBuf],
    out_dir: Option<&Path>,
    batch: &BatchResult,
) -> anyhow::Result<()> {
    let (mut written, mut skipped) = (0, 0);
    for input in inputs {
        let Some(result) = batch.get(&input.display().to_string()) else {
            continue;
        };
        if result.status() == ItemStatus::Failed {
            continue;
        }
        let basename = input
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("input {:?} has no usable file name", input))?;
        let dir = match (out_dir, input.parent()) {
            (Some(dir), _) => dir,
            (None, Some(parent)) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let report = writer
            .write_item(dir, basename, result)
            .with_context(|| format!("writing variants of {:?}", input))?;
        written += report.written.len();
        skipped += report.skipped.len();
    }
    eprintln!("  written     : {} file(s), {} skipped", written, skipped);
    Ok(())
}

fn run_decompress(
    input: PathBuf,
    output: Option<PathBuf>,
    codec: Option<CodecId>,
    force: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let is_stdin = input.to_str() == Some("-");
    let suffix_codec = input
        .extension()
        .and_then(|e| e.to_str())
        .and_then(CodecId::from_suffix);
    let id = codec.or(suffix_codec).with_context(|| {
        format!("cannot infer codec from {:?}; pass --codec", input)
    })?;

    let registry = default_registry();
    let codec = registry
        .codec(id)
        .with_context(|| format!("{} is not available in this build", id))?;

    let compressed = if is_stdin {
        let mut buf = Vec::new();
        io::stdin().lock().read_to_end(&mut buf)?;
        buf
    } else {
        fs::read(&input).with_context(|| format!("opening input file {:?}", input))?
    };

    let t0 = Instant::now();
    let raw = codec
        .decode(&compressed)
        .with_context(|| format!("decoding {:?} as {}", input, id))?;
    let elapsed = t0.elapsed();

    let output = match output {
        Some(path) => path,
        None if !is_stdin && suffix_codec.is_some() => input.with_extension(""),
        None => PathBuf::from("-"),
    };
    if output.to_str() == Some("-") {
        io::stdout().lock().write_all(&raw)?;
    } else {
        let writer = DurableWriter::new(WriteOptions {
            policy: if force {
                OverwritePolicy::Replace
            } else {
                config.write.policy
            },
            ..config.write.clone()
        });
        if writer.write_one(&output, &raw)? == WriteStatus::Skipped {
            eprintln!("  skipped     : {:?} exists", output);
        }
    }

    eprintln!("  codec       : {}", id);
    eprintln!("  compressed  : {}", human_bytes(compressed.len() as u64));
    eprintln!("  raw size    : {}", human_bytes(raw.len() as u64));
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_negotiate(
    header: &str,
    available: Vec<CodecId>,
    prefer: Vec<CodecId>,
    config: &Config,
) -> anyhow::Result<()> {
    let offered: Vec<CodecDescriptor> = if available.is_empty() {
        default_registry().available_codecs()
    } else {
        available.into_iter().map(CodecId::descriptor).collect()
    };
    log::debug!(
        "parsed preferences: {:?}",
        precomp_core::parse_accept_encoding(header)
    );

    let negotiator = config.negotiator(&prefer)?;
    match negotiator.negotiate(header, &offered) {
        Some(d) => println!("{}", d.wire_token),
        None => println!("identity"),
    }
    Ok(())
}

fn run_codecs(json: bool) -> anyhow::Result<()> {
    let registry = default_registry();
    if json {
        println!("{}", serde_json::to_string_pretty(registry.all_codecs())?);
        return Ok(());
    }
    println!(
        "  {:<8}  {:<6}  {:<6}  {:>7}  {:>7}  {:<5}  {:<9}",
        "codec", "suffix", "token", "levels", "default", "heavy", "available"
    );
    println!("  {}", "-".repeat(62));
    for d in registry.all_codecs() {
        println!(
            "  {:<8}  {:<6}  {:<6}  {:>7}  {:>7}  {:<5}  {:<9}",
            d.id.as_str(),
            d.file_suffix,
            d.wire_token,
            format!("{}-{}", d.min_level, d.max_level),
            d.default_level,
            if d.cpu_intensive { "yes" } else { "no" },
            if d.available { "yes" } else { "no" }
        );
    }
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Compress(args) => run_compress(args, &config),
        Commands::Decompress {
            input,
            output,
            codec,
            force,
        } => run_decompress(input, output, codec, force, &config),
        Commands::Negotiate {
            header,
            available,
            prefer,
        } => run_negotiate(&header, available, prefer, &config),
        Commands::Codecs { json } => run_codecs(json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use precomp_core::Codec;
    use std::ffi::OsString;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_compress_flags() {
        let cli = Cli::try_parse_from([
            "precomp", "-v", "compress", "a.css", "b.js", "-c", "br,gzip", "-l", "br=9",
            "--policy", "skip", "--mode", "644", "-p",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Commands::Compress(args) = cli.command else {
            panic!("expected compress");
        };
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.codecs, vec![CodecId::Brotli, CodecId::Gzip]);
        assert_eq!(args.levels, vec![(CodecId::Brotli, 9)]);
        assert_eq!(args.policy, Some(OverwritePolicy::Skip));
        assert_eq!(args.mode, Some(0o644));
        assert!(args.parallel);
    }

    #[test]
    fn level_assignments() {
        assert_eq!(parse_level_assignment("zstd=19"), Ok((CodecId::Zstd, 19)));
        assert_eq!(parse_level_assignment(" br = 4 "), Ok((CodecId::Brotli, 4)));
        assert!(parse_level_assignment("br").is_err());
        assert!(parse_level_assignment("br=high").is_err());
        assert!(parse_level_assignment("deflate=1").is_err());
    }

    #[test]
    fn file_modes() {
        assert_eq!(parse_mode("644"), Ok(0o644));
        assert_eq!(parse_mode("0o600"), Ok(0o600));
        assert!(parse_mode("999").is_err());
        assert!(parse_mode("17777").is_err());
    }

    #[test]
    fn human_readable_sizes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.00 KB");
        assert_eq!(human_bytes(3 * 1024 * 1024 / 2), "1.50 MB");
    }

    #[test]
    fn compress_writes_variants_next_to_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("site.css");
        fs::write(&input, b"body { margin: 0; padding: 0; }\n".repeat(64)).unwrap();

        let argv: Vec<OsString> = vec![
            "precomp".into(),
            "compress".into(),
            input.clone().into_os_string(),
            "-c".into(),
            "gzip".into(),
            "--no-sync".into(),
        ];
        let cli = Cli::try_parse_from(argv).unwrap();
        let Commands::Compress(args) = cli.command else {
            panic!("expected compress");
        };
        run_compress(args, &Config::default()).unwrap();

        let variant = fs::read(dir.path().join("site.css.gz")).unwrap();
        let raw = precomp_codecs::GzipCodec.decode(&variant).unwrap();
        assert_eq!(raw, fs::read(&input).unwrap());
    }
}
