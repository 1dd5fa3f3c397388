//! romdb CLI Client
//!
//! Command-line interface for querying romdb and building dataset files.

use std::io::{BufReader, BufWriter, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use romdb::loader::sstable::SSTableBuilder;
use romdb::loader::{JsonLoader, Loader};
use romdb::protocol::{read_values, write_request, Verb};

/// romdb CLI
#[derive(Parser, Debug)]
#[command(name = "romdb-cli")]
#[command(about = "CLI for the romdb read-only key-value server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:11211")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get values by key
    Get {
        /// Keys to fetch
        #[arg(required = true)]
        keys: Vec<String>,

        /// Send `gets` instead of `get`
        #[arg(long)]
        gets: bool,
    },

    /// Convert a flat JSON dataset into an SSTable file
    Build {
        /// JSON file mapping string keys to string values
        #[arg(short, long)]
        input: PathBuf,

        /// SSTable file to write
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    let args = Args::parse();

    let outcome = match args.command {
        Commands::Get { keys, gets } => get(&args.server, &keys, gets),
        Commands::Build { input, output } => build(&input, &output),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    }
}

/// Fetch keys and print `key<TAB>value` per hit. Returns whether anything was found.
fn get(server: &str, keys: &[String], gets: bool) -> romdb::Result<bool> {
    let stream = TcpStream::connect(server)?;
    let mut writer = BufWriter::new(stream.try_clone()?);
    let mut reader = BufReader::new(stream);

    let verb = if gets { Verb::Gets } else { Verb::Get };
    write_request(&mut writer, verb, keys)?;
    let records = read_values(&mut reader)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for record in &records {
        out.write_all(&record.key)?;
        out.write_all(b"\t")?;
        out.write_all(&record.data)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    Ok(!records.is_empty())
}

/// Load `input` as JSON and write it out in sorted order as an SSTable
fn build(input: &PathBuf, output: &PathBuf) -> romdb::Result<bool> {
    let snapshot = JsonLoader.load(input)?;

    let mut entries: Vec<_> = snapshot.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut builder = SSTableBuilder::new(output)?;
    for (key, value) in entries {
        builder.add(key, value)?;
    }
    let table = builder.finish()?;

    println!(
        "wrote {} entries ({} bytes) to {}",
        table.entry_count(),
        table.file_size,
        output.display()
    );
    Ok(true)
}
