use anyhow::Context;
use clap::{Parser, ValueEnum};
use redb_polymap::{PartitionedReader, PolymorphicMap, Record, Value};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "polymap-lookup",
    about = "Print the record stored under one key of a partitioned shard set",
    version
)]
struct Cli {
    /// Directory holding the part-NNNNN.redb shard files
    #[arg(long)]
    store: PathBuf,

    /// Shard count the set was written with; discovered from file names when omitted
    #[arg(long)]
    shards: Option<u16>,

    /// How KEY is interpreted
    #[arg(long, value_enum, default_value = "text")]
    key_type: KeyType,

    #[arg(short, long)]
    verbose: bool,

    /// Key to look up
    key: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KeyType {
    Text,
    Int,
    Long,
}

fn parse_key(raw: &str, key_type: KeyType) -> anyhow::Result<Value> {
    Ok(match key_type {
        KeyType::Text => Value::from(raw),
        KeyType::Int => Value::from(
            raw.parse::<i32>()
                .with_context(|| format!("`{}` is not a 32-bit integer", raw))?,
        ),
        KeyType::Long => Value::from(
            raw.parse::<i64>()
                .with_context(|| format!("`{}` is not a 64-bit integer", raw))?,
        ),
    })
}

fn print_record(out: &mut impl Write, record: &Record) -> io::Result<()> {
    writeln!(out, "{}:", record.key)?;
    match record.value.downcast_ref::<PolymorphicMap>() {
        Some(fields) => {
            let mut lines: Vec<(String, String)> = fields
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect();
            lines.sort();
            for (name, value) in lines {
                writeln!(out, "  {}: {}", name, value)?;
            }
        }
        None => writeln!(out, "  {}", record.value)?,
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let key = parse_key(&cli.key, cli.key_type)?;

    let reader = match cli.shards {
        Some(shard_count) => PartitionedReader::open(&cli.store, shard_count),
        None => PartitionedReader::open_dir(&cli.store),
    }
    .with_context(|| format!("failed to open shard set {}", cli.store.display()))?;

    let record = reader
        .lookup(&key)
        .with_context(|| format!("lookup of `{}` failed", key))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match record {
        Some(record) => print_record(&mut out, &record)?,
        None => writeln!(out, "{}: not found", key)?,
    }

    reader.close();
    Ok(())
}
