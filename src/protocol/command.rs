//! Command definitions
//!
//! Typed form of a [`Request`](super::Request): the operation name
//! selects a variant and `args` is decoded into that variant's fields.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{PoolError, Result};
use crate::vfs::DirtyPage;

/// A parsed operation
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Capacity and bound-file count
    GetCapacity,

    /// Create `count` new slots
    AddCapacity { count: usize },

    /// Grow capacity to at least `minimum`
    ReserveMinimumCapacity { minimum: usize },

    /// Number of bound paths
    GetFileCount,

    /// Sorted bound paths
    GetFileList,

    /// Whole-file read
    ReadFile { filename: String },

    /// Whole-file replace
    WriteFile { filename: String, data: Vec<u8> },

    /// Validated whole-file replace with a SQLite image
    ImportDatabase { filename: String, data: Vec<u8> },

    /// Write only the listed pages
    PersistDirtyPages {
        filename: String,
        pages: Vec<DirtyPage>,
        page_size: Option<usize>,
    },

    /// Unbind a path
    DeleteFile { filename: String },

    /// Whether a path is bound
    FileExists { filename: String },

    /// Pages touched since the last reset
    GetDirtyPages { filename: String },

    /// Mark every page clean
    ResetDirtyPages { filename: String },

    /// Re-acquire every slot with cleared headers
    WipeFiles,

    /// Release all live handles
    Cleanup,

    /// Change the live log filter
    SetLogLevel { level: String },
}

#[derive(Deserialize)]
struct FileArgs {
    filename: String,
}

#[derive(Deserialize)]
struct DataArgs {
    filename: String,
    data: Vec<u8>,
}

#[derive(Deserialize)]
struct CountArgs {
    count: usize,
}

#[derive(Deserialize)]
struct MinimumArgs {
    minimum: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistArgs {
    filename: String,
    pages: Vec<DirtyPage>,
    #[serde(default)]
    page_size: Option<usize>,
}

#[derive(Deserialize)]
struct LevelArgs {
    level: String,
}

impl Command {
    /// Parse an operation name and its arguments
    pub fn parse(operation: &str, args: &Value) -> Result<Self> {
        let command = match operation {
            "getCapacity" => Command::GetCapacity,
            "addCapacity" => {
                let CountArgs { count } = decode_args(operation, args)?;
                Command::AddCapacity { count }
            }
            "reserveMinimumCapacity" => {
                let MinimumArgs { minimum } = decode_args(operation, args)?;
                Command::ReserveMinimumCapacity { minimum }
            }
            "getFileCount" => Command::GetFileCount,
            "getFileList" => Command::GetFileList,
            "readFile" => {
                let FileArgs { filename } = decode_args(operation, args)?;
                Command::ReadFile { filename }
            }
            "writeFile" => {
                let DataArgs { filename, data } = decode_args(operation, args)?;
                Command::WriteFile { filename, data }
            }
            "importDatabase" => {
                let DataArgs { filename, data } = decode_args(operation, args)?;
                Command::ImportDatabase { filename, data }
            }
            "persistDirtyPages" => {
                let PersistArgs {
                    filename,
                    pages,
                    page_size,
                } = decode_args(operation, args)?;
                Command::PersistDirtyPages {
                    filename,
                    pages,
                    page_size,
                }
            }
            "deleteFile" => {
                let FileArgs { filename } = decode_args(operation, args)?;
                Command::DeleteFile { filename }
            }
            "fileExists" => {
                let FileArgs { filename } = decode_args(operation, args)?;
                Command::FileExists { filename }
            }
            "getDirtyPages" => {
                let FileArgs { filename } = decode_args(operation, args)?;
                Command::GetDirtyPages { filename }
            }
            "resetDirtyPages" => {
                let FileArgs { filename } = decode_args(operation, args)?;
                Command::ResetDirtyPages { filename }
            }
            "wipeFiles" => Command::WipeFiles,
            "cleanup" => Command::Cleanup,
            "setLogLevel" => {
                let LevelArgs { level } = decode_args(operation, args)?;
                Command::SetLogLevel { level }
            }
            _ => return Err(PoolError::UnknownOperation(operation.to_string())),
        };
        Ok(command)
    }

    /// Operation name on the wire
    pub fn operation(&self) -> &'static str {
        match self {
            Command::GetCapacity => "getCapacity",
            Command::AddCapacity { .. } => "addCapacity",
            Command::ReserveMinimumCapacity { .. } => "reserveMinimumCapacity",
            Command::GetFileCount => "getFileCount",
            Command::GetFileList => "getFileList",
            Command::ReadFile { .. } => "readFile",
            Command::WriteFile { .. } => "writeFile",
            Command::ImportDatabase { .. } => "importDatabase",
            Command::PersistDirtyPages { .. } => "persistDirtyPages",
            Command::DeleteFile { .. } => "deleteFile",
            Command::FileExists { .. } => "fileExists",
            Command::GetDirtyPages { .. } => "getDirtyPages",
            Command::ResetDirtyPages { .. } => "resetDirtyPages",
            Command::WipeFiles => "wipeFiles",
            Command::Cleanup => "cleanup",
            Command::SetLogLevel { .. } => "setLogLevel",
        }
    }

    /// Whether the command needs acquired slot handles
    pub fn needs_pool(&self) -> bool {
        !matches!(self, Command::Cleanup | Command::SetLogLevel { .. })
    }
}

fn decode_args<T: DeserializeOwned>(operation: &str, args: &Value) -> Result<T> {
    T::deserialize(args)
        .map_err(|e| PoolError::Protocol(format!("{}: invalid arguments: {}", operation, e)))
}
