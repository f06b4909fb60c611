use std::io::{BufRead, Write};
use std::path::PathBuf;

use subtok::{
    Bpe, EncodeOptions, EncodedBatch, OutputType, SubtokError, SubtokResult, write_token_line,
};

use crate::logging::LogArgs;

/// Output token rendering.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputTypeArg {
    /// Numeric token ids.
    Id,
    /// Canonical subword strings.
    Subword,
}

impl From<OutputTypeArg> for OutputType {
    fn from(arg: OutputTypeArg) -> Self {
        match arg {
            OutputTypeArg::Id => OutputType::Id,
            OutputTypeArg::Subword => OutputType::Subword,
        }
    }
}

/// Args for the encode command.
#[derive(clap::Args, Debug)]
pub struct EncodeArgs {
    #[clap(flatten)]
    logging: LogArgs,

    /// Path to file with learned model.
    #[arg(long)]
    model: PathBuf,

    /// Output token rendering.
    #[arg(long = "output_type", value_enum)]
    output_type: OutputTypeArg,

    /// Number of threads (-1 = all cores).
    #[arg(long = "n_threads", default_value_t = -1, allow_hyphen_values = true)]
    n_threads: i32,

    /// Prepend the begin-of-sentence token.
    #[arg(long)]
    bos: bool,

    /// Append the end-of-sentence token.
    #[arg(long)]
    eos: bool,

    /// Reverse the output token sequence.
    #[arg(long)]
    reverse: bool,

    /// Process each line before reading the next one.
    #[arg(long)]
    stream: bool,

    /// BPE-dropout probability (of a merge being dropped).
    #[arg(long = "dropout_prob", default_value_t = 0.0)]
    dropout_prob: f64,
}

impl EncodeArgs {
    /// Run the encode command.
    pub fn run(&self) -> SubtokResult<()> {
        self.logging.setup_logging(2)?;

        // Argument errors surface before the model file is touched.
        subtok::threads::resolve_thread_count(self.n_threads)?;

        let options = EncodeOptions {
            output_type: self.output_type.into(),
            bos: self.bos,
            eos: self.eos,
            reverse: self.reverse,
            dropout_prob: self.dropout_prob,
        };

        let bpe = Bpe::load(&self.model, self.n_threads)?;

        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let mut reader = stdin.lock();
        let mut writer = stdout.lock();

        if self.stream {
            return bpe.encode_stream(&mut reader, &mut writer, &options);
        }

        let lines = read_all_lines(&mut reader)?;
        match bpe.encode(&lines, &options)? {
            EncodedBatch::Ids(batch) => {
                for ids in batch {
                    write_token_line(&mut writer, ids.iter())?;
                }
            }
            EncodedBatch::Subwords(batch) => {
                for pieces in batch {
                    write_token_line(&mut writer, pieces.iter())?;
                }
            }
        }
        writer.flush()?;
        Ok(())
    }
}

fn read_all_lines<R: BufRead>(reader: &mut R) -> SubtokResult<Vec<String>> {
    let mut lines = vec![];
    let mut buf: Vec<u8> = vec![];
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        while buf.last().is_some_and(|&b| b == b'\n' || b == b'\r') {
            buf.pop();
        }
        let line = std::str::from_utf8(&buf).map_err(|e| SubtokError::InvalidUtf8 {
            offset: e.valid_up_to(),
        })?;
        lines.push(line.to_string());
    }
    Ok(lines)
}
