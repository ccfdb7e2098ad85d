use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use zss::framing::Framing;
use zss::writer::WriterOptions;

#[derive(Parser)]
#[command(name = "zss", version = "1.0.0", about = "A write-once, read-many sorted-string container")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a .zss file from newline-separated records read on stdin
    Write {
        output: PathBuf,
        #[arg(long, default_value = "deflate")]
        codec: String,
        #[arg(long, default_value = "64")]
        branching_factor: usize,
        #[arg(long, default_value = "1048576")]
        approx_block_size: usize,
        #[arg(long)]
        parallelism: Option<usize>,
        #[arg(long, default_value = "{}")]
        metadata: String,
    },
    /// Validate a .zss file's structural invariants
    Validate {
        input: PathBuf,
    },
    /// Dump every record in a .zss file to stdout, one per line
    Dump {
        input: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Write {
            output,
            codec,
            branching_factor,
            approx_block_size,
            parallelism,
            metadata,
        } => run_write(output, codec, branching_factor, approx_block_size, parallelism, metadata),
        Commands::Validate { input } => run_validate(input),
        Commands::Dump { input } => run_dump(input),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run_write(
    output: PathBuf,
    codec: String,
    branching_factor: usize,
    approx_block_size: usize,
    parallelism: Option<usize>,
    metadata: String,
) -> Result<(), zss::Error> {
    let options = WriterOptions {
        metadata_json: metadata,
        branching_factor,
        approx_block_size,
        parallelism: parallelism.unwrap_or_else(|| num_cpus::get().max(1)),
        codec,
        uuid: None,
    };
    let mut writer = zss::Writer::create(&output, options)?;
    writer.add_file_contents(std::io::stdin(), Framing::Terminator(b'\n'))?;
    writer.finish()?;
    Ok(())
}

fn run_validate(input: PathBuf) -> Result<(), zss::Error> {
    let file = File::open(&input).map_err(zss::Error::from_io)?;
    let report = zss::validate(file)?;
    println!(
        "ok: {} records, {} blocks, root level {}",
        report.record_count, report.block_count, report.root_level
    );
    Ok(())
}

fn run_dump(input: PathBuf) -> Result<(), zss::Error> {
    use std::io::Write;
    let file = File::open(&input).map_err(zss::Error::from_io)?;
    let mut reader = zss::Reader::open(file)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for record in reader.records()? {
        let record = record?;
        out.write_all(&record).map_err(zss::Error::from_io)?;
        out.write_all(b"\n").map_err(zss::Error::from_io)?;
    }
    Ok(())
}
