use std::io::{BufRead, Write};
use std::path::PathBuf;

use subtok::{Bpe, SubtokError, SubtokResult};

use crate::logging::LogArgs;

/// Args for the decode command.
#[derive(clap::Args, Debug)]
pub struct DecodeArgs {
    #[clap(flatten)]
    logging: LogArgs,

    /// Path to file with learned model.
    #[arg(long)]
    model: PathBuf,

    /// Comma-separated ids to skip while decoding, e.g. 1,2,3.
    #[arg(long = "ignore_ids")]
    ignore_ids: Option<String>,
}

fn parse_ignore_ids(csv: &str) -> SubtokResult<Vec<u32>> {
    csv.split(',')
        .map(|part| {
            part.trim().parse::<u32>().map_err(|_| {
                SubtokError::InvalidArgument(format!(
                    "ignore_ids: expected comma-separated integers, got {csv:?}"
                ))
            })
        })
        .collect()
}

impl DecodeArgs {
    /// Run the decode command.
    pub fn run(&self) -> SubtokResult<()> {
        self.logging.setup_logging(2)?;

        let ignore_ids = self
            .ignore_ids
            .as_deref()
            .map(parse_ignore_ids)
            .transpose()?;

        let bpe = Bpe::load(&self.model, 1)?;

        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let mut writer = stdout.lock();

        for line in stdin.lock().lines() {
            let line = line?;
            let ids = line
                .split_whitespace()
                .map(|part| {
                    part.parse::<u32>().map_err(|_| {
                        SubtokError::InvalidArgument(format!("not a token id: {part:?}"))
                    })
                })
                .collect::<SubtokResult<Vec<u32>>>()?;

            let text = bpe.decode(&ids, ignore_ids.as_deref())?;
            writeln!(writer, "{text}")?;
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ignore_ids() {
        assert_eq!(parse_ignore_ids("1,2,3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_ignore_ids("7").unwrap(), vec![7]);
        assert!(parse_ignore_ids("1,x").is_err());
        assert!(parse_ignore_ids("").is_err());
    }
}
