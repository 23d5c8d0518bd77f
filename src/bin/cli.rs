//! poolvfs CLI Client
//!
//! Sends one operation to a running worker and prints the response.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use poolvfs::protocol::{read_response, write_request, Request, Response};
use poolvfs::Result;

/// poolvfs CLI
#[derive(Parser, Debug)]
#[command(name = "poolvfs-cli")]
#[command(about = "CLI for a poolvfs worker")]
struct Args {
    /// Worker address
    #[arg(short, long, default_value = "127.0.0.1:7461")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show capacity and bound-file count
    Capacity,

    /// Create more slots
    AddCapacity {
        /// Number of slots to add
        count: usize,
    },

    /// Grow capacity to at least a minimum
    Reserve {
        /// Minimum capacity
        minimum: usize,
    },

    /// List bound paths
    Ls,

    /// Export a file
    Read {
        filename: String,

        /// Write the bytes here instead of printing them
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Replace a file with the contents of a local file
    Write { filename: String, input: PathBuf },

    /// Import a SQLite database image
    Import { filename: String, input: PathBuf },

    /// Delete a file
    Rm { filename: String },

    /// Check whether a file exists
    Exists { filename: String },

    /// Show dirty pages of a file
    Dirty { filename: String },

    /// Release every slot handle held by the worker
    Cleanup,

    /// Re-initialize the pool with every slot cleared
    Wipe,

    /// Change the worker's log level
    LogLevel { level: String },

    /// Send an arbitrary operation with JSON arguments
    Raw {
        operation: String,

        #[arg(default_value = "null")]
        args: String,
    },
}

fn main() {
    let args = Args::parse();

    match run(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    }
}

/// Returns whether the worker reported success
fn run(args: Args) -> Result<bool> {
    let mut out_path = None;

    let (operation, op_args) = match args.command {
        Commands::Capacity => ("getCapacity".to_string(), Value::Null),
        Commands::AddCapacity { count } => ("addCapacity".to_string(), json!({ "count": count })),
        Commands::Reserve { minimum } => (
            "reserveMinimumCapacity".to_string(),
            json!({ "minimum": minimum }),
        ),
        Commands::Ls => ("getFileList".to_string(), Value::Null),
        Commands::Read { filename, out } => {
            out_path = out;
            ("readFile".to_string(), json!({ "filename": filename }))
        }
        Commands::Write { filename, input } => {
            let data = std::fs::read(input)?;
            ("writeFile".to_string(), json!({ "filename": filename, "data": data }))
        }
        Commands::Import { filename, input } => {
            let data = std::fs::read(input)?;
            ("importDatabase".to_string(), json!({ "filename": filename, "data": data }))
        }
        Commands::Rm { filename } => ("deleteFile".to_string(), json!({ "filename": filename })),
        Commands::Exists { filename } => ("fileExists".to_string(), json!({ "filename": filename })),
        Commands::Dirty { filename } => {
            ("getDirtyPages".to_string(), json!({ "filename": filename }))
        }
        Commands::Cleanup => ("cleanup".to_string(), Value::Null),
        Commands::Wipe => ("wipeFiles".to_string(), Value::Null),
        Commands::LogLevel { level } => ("setLogLevel".to_string(), json!({ "level": level })),
        Commands::Raw { operation, args } => (operation, serde_json::from_str(&args)?),
    };

    let stream = TcpStream::connect(&args.server)?;
    let mut writer = BufWriter::new(stream.try_clone()?);
    let mut reader = BufReader::new(stream);

    write_request(&mut writer, &Request::new(1, operation, op_args))?;
    let response = read_response(&mut reader)?;

    print_response(response, out_path)
}

fn print_response(response: Response, out_path: Option<PathBuf>) -> Result<bool> {
    if !response.success {
        eprintln!("error: {}", response.error.unwrap_or_default());
        return Ok(false);
    }

    let result = response.result.unwrap_or(Value::Null);
    if let Some(path) = out_path {
        let data: Vec<u8> = serde_json::from_value(result["data"].clone())?;
        std::fs::write(&path, &data)?;
        println!("wrote {} bytes to {}", data.len(), path.display());
    } else {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(true)
}
