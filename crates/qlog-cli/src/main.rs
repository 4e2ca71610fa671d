use std::path::PathBuf;

use clap::Parser;

use qlog_tail::{Cursor, ReadRequest, ReadResult, TailReader, DEFAULT_CHUNK_CAPACITY};

#[derive(Parser)]
#[command(name = "qlog")]
#[command(about = "Query the tail of a log file", long_about = None)]
struct Cli {
    /// File to read.
    path: PathBuf,
    /// Maximum number of lines to print.
    #[arg(short = 'n', long, default_value_t = 10)]
    count: usize,
    /// Keep only lines containing this substring.
    #[arg(short, long)]
    filter: Option<String>,
    /// Lines to skip from the tail before collecting.
    #[arg(long, default_value_t = 0)]
    skip: u64,
    /// Continuation token from a previous run; takes precedence over --skip.
    #[arg(long)]
    cursor: Option<String>,
    /// Chunk size for backward reads, in bytes.
    #[arg(long, default_value_t = DEFAULT_CHUNK_CAPACITY)]
    chunk_capacity: usize,
    /// Print the raw result as JSON (newest line first) instead of text.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    json: bool,
}

#[cfg(not(test))]
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let result = execute(&cli)?;
    render(&cli, &result);
    Ok(())
}

fn execute(cli: &Cli) -> anyhow::Result<ReadResult> {
    let cursor = cli.cursor.as_deref().map(Cursor::decode).transpose()?;

    let mut request = ReadRequest::new(&cli.path, cli.count);
    request.filter = cli.filter.clone();
    request.cursor = cursor;
    request.skip = cli.skip;

    Ok(TailReader::new(cli.chunk_capacity).read(&request)?)
}

fn render(cli: &Cli, result: &ReadResult) {
    if cli.json {
        let payload = serde_json::json!({
            "lines": result.lines,
            "nextCursor": result.next_cursor.map(Cursor::encode),
        });
        println!("{payload:#}");
        return;
    }

    // Oldest first on a terminal, so the newest line ends up at the bottom.
    for line in result.lines.iter().rev() {
        println!("{line}");
    }
    if let Some(cursor) = result.next_cursor {
        eprintln!("more history upstream; resume with --cursor {}", cursor.encode());
    }
}
