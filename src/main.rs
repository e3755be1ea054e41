use clap::{Args, Parser, Subcommand};
use peak_alloc::PeakAlloc;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracktable::options::{Separators, TrackOptions, TrackType};
use tracktable::TrackTable;

#[global_allocator]
static PEAK_ALLOC: PeakAlloc = PeakAlloc;

#[derive(Debug, Parser)]
#[command(
    name = "tracktable",
    version,
    about = "Decode column-name-encoded genome track tables"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Parse a track table and report the decoded metadata
    Parse(ParseArgs),
    /// Parse a track table and split it into sub-tables
    Split(SplitArgs),
}

#[derive(Debug, Args)]
struct InputArgs {
    /// Input tab-separated file, optionally gzip compressed
    #[arg(short, long)]
    input: PathBuf,

    /// Separator between the track name and its type tag or parameter name
    #[arg(long, default_value = "&")]
    parameter_separator: String,

    /// Separator between feature descriptor segments
    #[arg(long, default_value = "$")]
    subtype_separator: String,

    /// Separator introducing the attachment suffix
    #[arg(long, default_value = "@")]
    attachment_separator: String,

    /// Track type assigned to tracks without a resolvable type
    /// (marker, plot, window or hist)
    #[arg(long)]
    default_tracktype: Option<String>,
}

#[derive(Debug, Args)]
struct ParseArgs {
    #[command(flatten)]
    input: InputArgs,
}

#[derive(Debug, Args)]
struct SplitArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Split by scaffold id instead of by track
    #[arg(long, conflicts_with = "flat")]
    by_scaffold: bool,

    /// Ignore attachments and emit one table per track name
    #[arg(long)]
    flat: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Parse(args) => run_parse(args)?,
        Commands::Split(args) => run_split(args)?,
    }

    debug!("peak memory usage was {} GB", PEAK_ALLOC.peak_usage_as_gb());
    Ok(())
}

fn load(args: &InputArgs) -> anyhow::Result<TrackTable> {
    let default_tracktype = match &args.default_tracktype {
        Some(name) => Some(name.parse::<TrackType>()?),
        None => None,
    };
    let options = TrackOptions::new(
        Separators::new(
            &args.parameter_separator,
            &args.subtype_separator,
            &args.attachment_separator,
        ),
        default_tracktype,
    );
    Ok(TrackTable::from_tsv(&args.input, options)?.parse()?)
}

fn run_parse(args: ParseArgs) -> anyhow::Result<()> {
    let table = load(&args.input)?;

    println!("{}", table.metadata()?.to_df()?);

    for (track, groups) in table.features() {
        for (group, entries) in groups {
            for (key, value) in entries {
                println!("{}\t{}\t{}\t{}", track, group, key, value);
            }
        }
    }

    println!("{}", table.df().head(Some(5)));
    Ok(())
}

fn run_split(args: SplitArgs) -> anyhow::Result<()> {
    let table = load(&args.input)?;

    if args.by_scaffold {
        for sub in table.split_by_scaffolds()? {
            println!(
                "scaffold block: {} rows x {} columns",
                sub.df().height(),
                sub.df().width()
            );
        }
        return Ok(());
    }

    for sub in table.split_tracks(!args.flat)? {
        let name = sub.metadata()?.track_names().join(",");
        println!(
            "track {}: {} rows, {} columns, {} attached",
            name,
            sub.df().height(),
            sub.df().width(),
            sub.attached().len()
        );
        for (child, child_table) in sub.attached() {
            println!("  attached {}: {} columns", child, child_table.df().width());
        }
    }
    Ok(())
}
