use subtok::SubtokResult;

pub mod bpe;
pub mod decode;
pub mod encode;
pub mod vocab;

/// Subcommands for the subtok CLI.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Train a BPE model.
    Bpe(bpe::BpeArgs),

    /// Encode stdin text to ids or subwords on stdout.
    Encode(encode::EncodeArgs),

    /// Decode whitespace-separated ids from stdin to text on stdout.
    Decode(decode::DecodeArgs),

    /// Print the learned vocabulary.
    Vocab(vocab::VocabArgs),
}

impl Commands {
    /// Run the subcommand.
    pub fn run(&self) -> SubtokResult<()> {
        match self {
            Commands::Bpe(cmd) => cmd.run(),
            Commands::Encode(cmd) => cmd.run(),
            Commands::Decode(cmd) => cmd.run(),
            Commands::Vocab(cmd) => cmd.run(),
        }
    }
}
