use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Args;

use crate::fileformat::FlagstatReport;

///////////////////////////////
/// Command line: turn a default-format flagstat artifact into JSON
#[derive(Args)]
pub struct SummarizeCMD {
    #[arg(short = 'i', value_parser = clap::value_parser!(PathBuf))]
    /// .stat file written by the flagstat command
    pub path_in: PathBuf,
}

impl SummarizeCMD {
    pub fn try_execute(&mut self) -> Result<()> {
        let f = File::open(&self.path_in)
            .with_context(|| format!("Could not open {}", self.path_in.display()))?;
        let report = FlagstatReport::parse(f)
            .with_context(|| format!("Could not parse {}", self.path_in.display()))?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}
