mod commands;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use commands::Commands;
use subtok::SubtokError;

/// subtok: train and apply BPE subword models.
#[derive(clap::Parser, Debug)]
#[command(name = "subtok")]
pub struct Args {
    /// Subcommand to run.
    #[clap(subcommand)]
    pub command: Commands,
}

/// One distinct exit code per error kind.
fn exit_code(err: &SubtokError) -> u8 {
    match err {
        SubtokError::InvalidArgument(_) => 2,
        SubtokError::IoFailure(_) => 3,
        SubtokError::EmptyCorpus => 4,
        SubtokError::VocabTooLarge { .. } => 5,
        SubtokError::ReservedIdCollision(_) => 6,
        SubtokError::ModelMagicMismatch => 7,
        SubtokError::ModelVersionUnsupported { .. } => 8,
        SubtokError::ModelCorrupt(_) => 9,
        SubtokError::UnknownToken(_) => 10,
        SubtokError::InvalidUtf8 { .. } => 11,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    match args.command.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(exit_code(&err))
        }
    }
}
