mod errors;
mod params;

use std::fs::File;
use std::io::{self, Read, Write};
use std::process::ExitCode;
use blob_store::{BlobResult, BlobStoreError, BlobStores, CancellationToken, ContentProducer, FileBlobStore};
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;
use crate::errors::BlobCliErr;
use crate::params::{Args, Command};

const COPY_BUF_SIZE: usize = 64 * 1024;

enum Outcome {
    Done,
    /// The key was absent, or taken when creating without --overwrite.
    Declined,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match run(args, &cancel).await {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::Declined) => ExitCode::from(2),
        Err(e) => {
            eprintln!("blobctl: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, cancel: &CancellationToken) -> Result<Outcome, BlobCliErr> {
    let stores = BlobStores::Local(FileBlobStore::get_or_create(&args.base_path)?);
    let store = stores.as_trait();

    match args.command {
        Command::Put { key, file, overwrite } => {
            let input: Box<dyn Read + Send> = match file {
                Some(path) => Box::new(File::open(path)?),
                None => Box::new(io::stdin()),
            };
            if store.write(&key, overwrite, cancel, input_producer(input)).await? {
                tracing::info!(key = %key, "stored blob");
                Ok(Outcome::Done)
            } else {
                eprintln!("blobctl: key {key:?} already exists (use --overwrite to replace it)");
                Ok(Outcome::Declined)
            }
        }
        Command::Get { key } => {
            let Some(mut reader) = store.try_read(&key, cancel).await? else {
                eprintln!("blobctl: no blob stored under {key:?}");
                return Ok(Outcome::Declined);
            };
            let mut stdout = tokio::io::stdout();
            let copied = tokio::io::copy(&mut reader, &mut stdout).await?;
            stdout.flush().await?;
            tracing::debug!(key = %key, bytes = copied, "read blob");
            Ok(Outcome::Done)
        }
        Command::Exists { key } => {
            println!("{}", store.exists(&key, cancel).await?);
            Ok(Outcome::Done)
        }
        Command::Delete { key } => {
            if store.delete(&key, cancel).await? {
                Ok(Outcome::Done)
            } else {
                eprintln!("blobctl: no blob stored under {key:?}");
                Ok(Outcome::Declined)
            }
        }
    }
}

fn input_producer(mut input: Box<dyn Read + Send>) -> ContentProducer {
    Box::new(move |sink: &mut dyn Write, cancel: &CancellationToken| -> BlobResult<()> {
        let copied = copy_cancellable(&mut input, sink, cancel)?;
        tracing::debug!(bytes = copied, "produced blob content");
        Ok(())
    })
}

/// Copies `reader` into `sink`, stopping between chunks once `cancel` fires.
fn copy_cancellable(
    reader: &mut dyn Read,
    sink: &mut dyn Write,
    cancel: &CancellationToken,
) -> BlobResult<u64> {
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut total = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(BlobStoreError::Cancelled);
        }
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        sink.write_all(&buf[..n])?;
        total += n as u64;
    }
}
