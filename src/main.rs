use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use pileup_engine::genomics::{
    parse_cigar, write_coverage, write_pileup, AlignedRead, AlignmentCategory, CategoryFilter,
};
use pileup_engine::store::InMemoryStore;
use pileup_engine::{BoundsPolicy, PileupConfig, PileupEngine};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "pileup-engine",
    about = "Per-position pileups with deferred indel annotation"
)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print `sra-pileup -s -n` style pileup lines.
    Pileup(InputArgs),
    /// Print per-position mismatch, insertion and deletion counts.
    Coverage {
        #[command(flatten)]
        input: InputArgs,
        /// Run name printed in the first column (default: alignments file stem).
        #[arg(long)]
        run: Option<String>,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Reference FASTA; headers are `>name [canonical-name]`.
    #[arg(long)]
    reference: PathBuf,
    /// Alignments TSV:
    /// `id  reference  position(1-based)  mapq  cigar  sequence  strand  [category]`.
    #[arg(long)]
    alignments: PathBuf,
    /// Region `name` or `name:start-end` (1-based, inclusive). Default: every reference.
    #[arg(long)]
    region: Option<String>,
    /// Alignment category: primary, secondary or all.
    #[arg(long, default_value = "all")]
    category: CategoryFilter,
    /// Shrink out-of-range regions to the reference instead of failing.
    #[arg(long)]
    clamp: bool,
    /// Build one extra position so the last line of a region gets indel annotations.
    #[arg(long)]
    lookahead: bool,
}

impl InputArgs {
    fn config(&self) -> PileupConfig {
        let bounds = if self.clamp {
            BoundsPolicy::Clamp
        } else {
            BoundsPolicy::Strict
        };
        PileupConfig::new()
            .with_category(self.category)
            .with_bounds(bounds)
            .with_trailing_lookahead(self.lookahead)
    }
}

/// A reference name with an optional 0-based `(start, length)` slice.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Region {
    name: String,
    slice: Option<(u64, u64)>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("pileup_engine=debug,info")
        } else {
            EnvFilter::new("pileup_engine=warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        Commands::Pileup(input) => run_pileup(&input)?,
        Commands::Coverage { input, run } => {
            let run = run.unwrap_or_else(|| file_stem(&input.alignments));
            run_coverage(&input, &run)?
        }
    }

    Ok(())
}

fn run_pileup(input: &InputArgs) -> Result<()> {
    let engine = open_engine(input)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    for region in regions(input, engine.store())? {
        let mut pileup = open_region(&engine, &region)?;
        let lines = write_pileup(&mut out, &mut pileup)
            .with_context(|| format!("pileup failed on {}", region.name))?;
        info!(reference = %region.name, lines, "pileup written");
    }
    out.flush()?;
    Ok(())
}

fn run_coverage(input: &InputArgs, run: &str) -> Result<()> {
    let engine = open_engine(input)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    for region in regions(input, engine.store())? {
        let mut pileup = open_region(&engine, &region)?;
        let lines = write_coverage(&mut out, run, &mut pileup)
            .with_context(|| format!("coverage failed on {}", region.name))?;
        info!(reference = %region.name, lines, "coverage written");
    }
    out.flush()?;
    Ok(())
}

fn open_engine(input: &InputArgs) -> Result<PileupEngine<InMemoryStore>> {
    let references = read_fasta(&input.reference).with_context(|| {
        format!("failed to read reference from {}", input.reference.display())
    })?;
    let reads = read_alignment_file(&input.alignments).with_context(|| {
        format!("failed to read alignments from {}", input.alignments.display())
    })?;
    debug!(
        references = references.len(),
        alignments = reads.len(),
        "loaded inputs"
    );

    let store = references
        .iter()
        .fold(InMemoryStore::builder(), |builder, (name, canonical, bases)| {
            builder.named_reference(name, canonical, bases)
        })
        .alignments(reads)
        .build()
        .context("alignment refers to a reference missing from the FASTA")?;

    Ok(PileupEngine::new(store, input.config()))
}

fn regions(input: &InputArgs, store: &InMemoryStore) -> Result<Vec<Region>> {
    match &input.region {
        Some(text) => Ok(vec![parse_region(text)?]),
        None => Ok(store
            .references()
            .map(|r| Region {
                name: r.common_name.to_string(),
                slice: None,
            })
            .collect()),
    }
}

fn open_region<'e>(
    engine: &'e PileupEngine<InMemoryStore>,
    region: &Region,
) -> Result<pileup_engine::PileupIterator<'e, InMemoryStore>> {
    let pileup = match region.slice {
        Some((start, length)) => engine.pileup_slice(&region.name, start, length),
        None => engine.pileups(&region.name),
    };
    pileup.with_context(|| format!("failed to open pileup on {}", region.name))
}

/// Parse `name` or `name:start-end` (1-based, inclusive).
///
/// Reference names may contain `:`; only a trailing `start-end` suffix is
/// treated as coordinates.
fn parse_region(text: &str) -> Result<Region> {
    let whole = || Region {
        name: text.to_string(),
        slice: None,
    };
    let Some((name, range)) = text.rsplit_once(':') else {
        return Ok(whole());
    };
    let Some((start, end)) = range.split_once('-') else {
        return Ok(whole());
    };
    let (Ok(start), Ok(end)) = (start.parse::<u64>(), end.parse::<u64>()) else {
        return Ok(whole());
    };
    if name.is_empty() {
        bail!("region '{text}' has no reference name");
    }
    if start == 0 || end < start {
        bail!("invalid region '{text}': coordinates are 1-based and inclusive");
    }
    Ok(Region {
        name: name.to_string(),
        slice: Some((start - 1, end - start + 1)),
    })
}

/// Read a multi-record FASTA into `(name, canonical name, bases)` triples.
fn read_fasta(path: &Path) -> Result<Vec<(String, String, Vec<u8>)>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records: Vec<(String, String, Vec<u8>)> = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            let mut fields = header.split_whitespace();
            let name = fields
                .next()
                .ok_or_else(|| anyhow!("empty FASTA header on line {}", line_no + 1))?;
            let canonical = fields.next().unwrap_or(name);
            records.push((name.to_string(), canonical.to_string(), Vec::new()));
            continue;
        }
        let (_, _, bases) = records
            .last_mut()
            .ok_or_else(|| anyhow!("sequence before first FASTA header on line {}", line_no + 1))?;
        bases.extend(line.bytes().map(|b| b.to_ascii_uppercase()));
    }

    Ok(records)
}

fn read_alignment_file(path: &Path) -> Result<Vec<AlignedRead>> {
    let reader = BufReader::new(File::open(path)?);
    let mut reads = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let read = parse_alignment_line(&line).with_context(|| format!("line {}", line_no + 1))?;
        reads.push(read);
    }

    Ok(reads)
}

fn parse_alignment_line(line: &str) -> Result<AlignedRead> {
    let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
    if fields.len() < 7 {
        bail!("expected at least 7 tab-separated fields, found {}", fields.len());
    }

    let position: u64 = fields[2]
        .parse()
        .with_context(|| format!("invalid position '{}'", fields[2]))?;
    if position == 0 {
        bail!("positions are 1-based");
    }
    let mapq: u8 = fields[3]
        .parse()
        .with_context(|| format!("invalid mapping quality '{}'", fields[3]))?;
    let cigar = parse_cigar(fields[4])?;
    let is_reverse = match fields[6] {
        "+" => false,
        "-" => true,
        other => bail!("invalid strand '{other}' (expected + or -)"),
    };
    let category = match fields.get(7).copied().unwrap_or("primary") {
        "primary" => AlignmentCategory::Primary,
        "secondary" => AlignmentCategory::Secondary,
        other => bail!("invalid category '{other}' (expected primary or secondary)"),
    };

    Ok(AlignedRead::new(
        fields[0],
        fields[1],
        position - 1,
        mapq,
        cigar,
        fields[5].to_ascii_uppercase().into_bytes(),
        is_reverse,
    )
    .with_category(category))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "run".to_string())
}
