use std::path::PathBuf;

use subtok::{SpecialIds, SubtokResult, TrainOptions};

use crate::logging::LogArgs;

/// Args for the bpe (train) command.
#[derive(clap::Args, Debug)]
pub struct BpeArgs {
    #[clap(flatten)]
    logging: LogArgs,

    /// Training data file path.
    #[arg(long)]
    data: PathBuf,

    /// Output model file path.
    #[arg(long)]
    model: PathBuf,

    /// Number of tokens in the final vocabulary.
    #[arg(long = "vocab_size")]
    vocab_size: usize,

    /// Fraction of characters covered by the model.
    #[arg(long, default_value_t = 1.0)]
    coverage: f64,

    /// Number of threads (-1 = all cores).
    #[arg(long = "n_threads", default_value_t = -1, allow_hyphen_values = true)]
    n_threads: i32,

    /// Padding token id.
    #[arg(long = "pad_id", default_value_t = 0)]
    pad_id: u32,

    /// Unknown token id.
    #[arg(long = "unk_id", default_value_t = 1)]
    unk_id: u32,

    /// Begin-of-sentence token id.
    #[arg(long = "bos_id", default_value_t = 2)]
    bos_id: u32,

    /// End-of-sentence token id.
    #[arg(long = "eos_id", default_value_t = 3)]
    eos_id: u32,
}

impl BpeArgs {
    /// Run the train command.
    pub fn run(&self) -> SubtokResult<()> {
        self.logging.setup_logging(3)?;

        let options = TrainOptions::new(&self.data, &self.model, self.vocab_size)
            .with_coverage(self.coverage)
            .with_n_threads(self.n_threads)
            .with_specials(SpecialIds {
                pad: self.pad_id,
                unk: self.unk_id,
                bos: self.bos_id,
                eos: self.eos_id,
            });

        let bpe = subtok::train(options)?;
        log::info!("model ready: {} tokens", bpe.vocab_size());
        Ok(())
    }
}
