use clap::Parser;
use color_eyre::eyre::{self, WrapErr};
use console::style;
use dramsim::{trace, Config, Memory};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Parser)]
#[command(author, version, about = "cycle accurate DRAM simulator", long_about = None)]
struct Options {
    /// DRAM trace with one `<address> <R|W>` request per line
    trace: PathBuf,

    /// YAML config, overrides the device options below
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "WideIO")]
    standard: String,
    #[arg(long, default_value = "WideIO_1Gb")]
    org: String,
    #[arg(long, default_value = "WideIO_200")]
    speed: String,
    #[arg(long, default_value_t = 1)]
    channels: usize,
    #[arg(long, default_value_t = 1)]
    ranks: usize,

    /// Write statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Write per-rank command counts as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Include zero command counts in the CSV
    #[arg(long)]
    full: bool,
}

fn main() -> eyre::Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let options = Options::parse();
    let config = match &options.config {
        Some(path) => Config::from_path(path)?,
        None => Config {
            standard: options.standard.clone(),
            org: options.org.clone(),
            speed: options.speed.clone(),
            channels: options.channels,
            ranks: options.ranks,
            ..Config::default()
        },
    };

    let mut memory = Memory::new(config)?;
    let file = std::fs::File::open(&options.trace)
        .wrap_err_with(|| format!("failed to open trace {}", options.trace.display()))?;
    let reader = trace::Reader::new(std::io::BufReader::new(file));

    let start = Instant::now();
    let summary = trace::run(&mut memory, reader)?;
    let stats = memory.stats();

    eprintln!(
        "{}: {} reads, {} writes in {} cycles ({} stalled) [{:?}]",
        style("done").green(),
        summary.reads,
        summary.writes,
        stats.sim.cycles,
        summary.stalls,
        start.elapsed()
    );
    if let Some(latency) = stats.dram.mean_read_latency() {
        eprintln!("mean read latency: {latency:.2} cycles");
    }

    if let Some(path) = &options.stats {
        let writer = std::io::BufWriter::new(std::fs::File::create(path)?);
        serde_json::to_writer_pretty(writer, &stats)?;
    }
    if let Some(path) = &options.csv {
        let mut writer = csv::WriterBuilder::new().flexible(false).from_path(path)?;
        for row in stats.dram.command_counts_csv(options.full) {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    Ok(())
}
