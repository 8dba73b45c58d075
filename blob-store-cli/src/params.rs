use std::path::PathBuf;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[clap(name = "blobctl", about = "Store and fetch blobs in a local directory")]
pub struct Args {
    /// Directory holding one file per blob; created if missing.
    #[clap(long, env = "BLOB_STORE_PATH")]
    pub(crate) base_path: PathBuf,
    #[clap(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a blob read from --file, or stdin when no file is given.
    Put {
        key: String,
        #[clap(long)]
        file: Option<PathBuf>,
        /// Replace the blob if the key is already taken.
        #[clap(long)]
        overwrite: bool,
    },
    /// Write a blob's content to stdout.
    Get { key: String },
    /// Print whether a blob exists.
    Exists { key: String },
    Delete { key: String },
}
