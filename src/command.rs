use clap::Subcommand;

pub mod flagstat;
pub mod summarize;

pub use flagstat::{
    ExecutableDescriptor, Flagstat, FlagstatCMD, FlagstatConfig, FlagstatFormat, FlagstatOutput,
};
pub use summarize::SummarizeCMD;

///////////////////////////////
/// Possible subcommands to parse
#[derive(Subcommand)]
pub enum Commands {
    /// Collect samtools flagstat statistics for one sample into an output bundle
    Flagstat(FlagstatCMD),
    /// Print a flagstat artifact as JSON
    Summarize(SummarizeCMD),
}
