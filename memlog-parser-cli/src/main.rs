use std::io;
use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::info;

use memlog_parser_lib::memlog_parser::{
    self, DEFAULT_LOG_PATH, ID_LEN, RECORD_LEN, RecordOrder, ScanConfig, display,
};

/// Dump the records of a memory logger RAM image
#[derive(Parser, Debug)]
#[command(name = "memlog-parser", version)]
struct Cli {
    /// RAM dump to parse
    #[arg(default_value = DEFAULT_LOG_PATH)]
    file: PathBuf,
    /// print header, summary and escaped text
    #[arg(short, long, conflicts_with = "csv")]
    all: bool,
    /// print CSV
    #[arg(short, long)]
    csv: bool,
    /// order records by sequence number instead of file position
    #[arg(long)]
    sort: bool,
    /// fail on a truncated trailing record
    #[arg(long)]
    strict: bool,
    /// record size in bytes, id included
    #[arg(long, default_value_t = RECORD_LEN, value_parser = parse_record_len)]
    record_len: usize,
}

fn parse_record_len(s: &str) -> Result<usize, String> {
    let len: usize = s.parse().map_err(|e| format!("{}", e))?;
    if len <= ID_LEN {
        return Err(format!("must be greater than {}", ID_LEN));
    }
    Ok(len)
}

fn init_logger() {
    // RUST_LOG=debug shows per-slot scan details
    Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        if let Some(io_error) = e.downcast_ref::<io::Error>() {
            // exit silently for broken pipe errors (common with less/head)
            if io_error.kind() == io::ErrorKind::BrokenPipe {
                process::exit(0);
            }
        }
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = ScanConfig {
        record_len: cli.record_len,
        strict: cli.strict,
        order: if cli.sort {
            RecordOrder::Sequence
        } else {
            RecordOrder::File
        },
    };

    let log_file = memlog_parser::parse_file(&cli.file, &config).map_err(|e| {
        let what = match e.kind() {
            io::ErrorKind::InvalidData => "Malformed log",
            _ => "File not found",
        };
        anyhow::Error::new(e).context(format!("{}: {}", what, cli.file.display()))
    })?;
    info!(
        "{}: {} records in {} slots",
        cli.file.display(),
        log_file.records.len(),
        log_file.slots
    );

    if cli.all {
        display::print_all(&log_file)?;
    } else if cli.csv {
        let file_name = cli
            .file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        display::print_csv(&log_file, &file_name)?;
    } else {
        display::print_raw(&log_file)?;
    }

    Ok(())
}
