use std::io::Write;
use std::path::PathBuf;

use subtok::{Bpe, SubtokResult};

/// Args for the vocab command.
#[derive(clap::Args, Debug)]
pub struct VocabArgs {
    /// Path to file with learned model.
    #[arg(long)]
    model: PathBuf,

    /// Also print the merge rule components of non-leaf tokens.
    #[arg(long)]
    verbose: bool,
}

impl VocabArgs {
    /// Run the vocab command.
    pub fn run(&self) -> SubtokResult<()> {
        let bpe = Bpe::load(&self.model, 1)?;
        let model = bpe.model();

        let stdout = std::io::stdout();
        let mut writer = stdout.lock();

        for (id, subword) in model.vocab_strings().iter().enumerate() {
            write!(writer, "{id}\t{subword}")?;
            if self.verbose {
                if let Some(rule) = model.rule_for(id as u32) {
                    write!(writer, "\t{} {}", rule.left, rule.right)?;
                }
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }
}
