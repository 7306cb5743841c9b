//! Top-100 long words of a text read from stdin
//!
//! Input is cut into chunks of whole lines and counted by a pool of workers.
//!
//! Usage: cargo run --example top_words --release -- [LINES_PER_CHUNK] [WORKERS] [SHARDS] < corpus.txt
//!        RUST_LOG=top_words=debug for progress output

use std::io::{self, BufRead, Write};
use top_words::{Chunk, JobBuilder, JobConfig};
use tracing_subscriber::EnvFilter;

fn arg(position: usize, default: usize) -> Result<usize, Box<dyn std::error::Error>> {
    match std::env::args().nth(position) {
        Some(value) => Ok(value.parse()?),
        None => Ok(default),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("top_words=info")),
        )
        .with_writer(io::stderr)
        .init();

    let lines_per_chunk = arg(1, 10_000)?.max(1);
    let defaults = JobConfig::default();
    let running = JobBuilder::new()
        .workers(arg(2, defaults.workers)?)
        .shards(arg(3, defaults.shards)?)
        .build()?
        .start()?;

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut buffer = Vec::new();
    let mut line = Vec::new();
    let mut lines = 0;
    let mut next_id = 0;

    loop {
        line.clear();
        // raw bytes, so invalid UTF-8 reaches the tokenizer instead of failing here
        let read = reader.read_until(b'\n', &mut line)?;
        if read > 0 {
            buffer.extend_from_slice(&line);
            lines += 1;
        }
        if (read == 0 || lines == lines_per_chunk) && !buffer.is_empty() {
            running.submit(Chunk::new(next_id, std::mem::take(&mut buffer)))?;
            next_id += 1;
            lines = 0;
        }
        if read == 0 {
            break;
        }
    }

    let report = running.finish()?;
    if !report.failed_chunks.is_empty() {
        eprintln!("skipped {} unreadable chunks", report.failed_chunks.len());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    out.write_all(report.top.to_lines().as_bytes())?;
    Ok(())
}
