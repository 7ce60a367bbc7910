use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use anyhow::Result;
use clap::{Args, ValueEnum};
use log::{debug, info, warn};
use serde::Serialize;

use crate::bundle::{check_output_name, LocalBundle, OutputContext};
use crate::fileformat::{Cardinality, FlagstatReport, Schema, Table};
use crate::stage::{apply, PipelineStage, StageError, StageOutput};
use crate::utils::{check_samtools_version, command_to_string, find_executable};

pub const INPUT_SAMPLE_KEY: &str = "sample_key";
pub const INPUT_BAM_KEY: &str = "bam";

pub const OUTPUT_SAMPLE_KEY: &str = "sample_key";
pub const OUTPUT_STAT_KEY: &str = "stats";

pub const DEFAULT_SAMTOOLS: &str = "samtools";

/// samtools gained -O in 1.10
const SAMTOOLS_VERSION_FOR_FORMAT: &str = ">=1.10";

const INPUT_SCHEMA: Schema = Schema {
    fields: &[INPUT_SAMPLE_KEY, INPUT_BAM_KEY],
    cardinality: Cardinality::ExactlyOne,
};

///////////////////////////////
/// Output format asked of samtools flagstat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum FlagstatFormat {
    #[default]
    Default,
    Json,
    Tsv,
}

///////////////////////////////
/// How to build the flagstat invocation
#[derive(Debug, Clone)]
pub struct FlagstatConfig {
    pub program: String,
    pub subcommand_args: Vec<String>,
    pub threads: Option<usize>,
    pub format: FlagstatFormat,
    /// Directories to look for the program in; PATH format
    pub search_path: Option<OsString>,
}

impl Default for FlagstatConfig {
    fn default() -> Self {
        FlagstatConfig {
            program: DEFAULT_SAMTOOLS.to_string(),
            subcommand_args: vec!["flagstat".to_string()],
            threads: None,
            format: FlagstatFormat::Default,
            search_path: std::env::var_os("PATH"),
        }
    }
}

impl FlagstatConfig {
    /// All arguments that precede the input file
    pub fn fixed_args(&self) -> Vec<String> {
        let mut args = self.subcommand_args.clone();
        if let Some(threads) = self.threads {
            args.push("-@".to_string());
            args.push(threads.to_string());
        }
        match self.format {
            FlagstatFormat::Default => {}
            FlagstatFormat::Json => args.extend(["-O".to_string(), "json".to_string()]),
            FlagstatFormat::Tsv => args.extend(["-O".to_string(), "tsv".to_string()]),
        }
        args
    }
}

///////////////////////////////
/// Resolved program plus the flags that go before the input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableDescriptor {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ExecutableDescriptor {
    pub fn resolve(
        program: &str,
        args: Vec<String>,
        search_path: Option<&std::ffi::OsStr>,
    ) -> Result<ExecutableDescriptor, StageError> {
        let resolved = find_executable(program, search_path).ok_or_else(|| StageError::DependencyMissing {
            program: program.to_string(),
        })?;
        Ok(ExecutableDescriptor {
            program: resolved,
            args,
        })
    }

    /// The full invocation, with the input file as sole positional argument
    pub fn command(&self, input_file: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(input_file);
        cmd
    }
}

///////////////////////////////
/// What one flagstat run hands back. Single-element columns, matching the one-row convention
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagstatOutput {
    pub sample_key: Vec<String>,
    pub stats: Vec<PathBuf>,
}

impl StageOutput for FlagstatOutput {
    fn to_table(&self) -> Table {
        let mut table = Table::new(vec![OUTPUT_SAMPLE_KEY.to_string(), OUTPUT_STAT_KEY.to_string()]);
        for (key, stat) in self.sample_key.iter().zip(&self.stats) {
            table
                .rows
                .push(vec![key.clone(), stat.to_string_lossy().to_string()]);
        }
        table
    }

    fn sample_key(&self) -> Option<&str> {
        self.sample_key.first().map(|k| k.as_str())
    }
}

///////////////////////////////
/// Basic alignment statistics for one sequenced sample, using samtools flagstat.
/// Takes a one-row input with the sample key and the BAM/SAM file, and creates
/// <sample key>.stat in the output bundle
#[derive(Debug, Clone)]
pub struct Flagstat {
    descriptor: ExecutableDescriptor,
}

impl Flagstat {
    /// Fails right away if the program cannot be found, before any input is looked at
    pub fn new(config: &FlagstatConfig) -> Result<Flagstat, StageError> {
        let descriptor = ExecutableDescriptor::resolve(
            &config.program,
            config.fixed_args(),
            config.search_path.as_deref(),
        )?;

        let is_samtools = descriptor
            .program
            .file_name()
            .is_some_and(|n| n == DEFAULT_SAMTOOLS);
        if is_samtools {
            let required = if config.format == FlagstatFormat::Default {
                None
            } else {
                Some(SAMTOOLS_VERSION_FOR_FORMAT)
            };
            check_samtools_version(&descriptor.program, required);
        }

        Ok(Flagstat { descriptor })
    }

    pub fn descriptor(&self) -> &ExecutableDescriptor {
        &self.descriptor
    }

    pub fn target_filename(sample_key: &str) -> String {
        format!("{}.stat", sample_key)
    }

    /// Validate and pull (sample key, bam) out of the only row
    fn read_input(input: Option<&Table>) -> Result<(String, String), StageError> {
        INPUT_SCHEMA.validate(input)?;
        let row = input
            .and_then(|t| t.row(0))
            .ok_or_else(|| StageError::invalid_input("Missing pipeline input bundle"))?;
        debug!("Input is {:?}", row.values());

        let sample_key = row.get(INPUT_SAMPLE_KEY).unwrap_or_default();
        let bam = row.get(INPUT_BAM_KEY).unwrap_or_default();

        if sample_key.is_empty() {
            return Err(StageError::invalid_input("Empty sample key"));
        }
        if bam.is_empty() {
            return Err(StageError::invalid_input(format!("Empty {} for sample {}", INPUT_BAM_KEY, sample_key)));
        }
        check_output_name(&Self::target_filename(sample_key)).map_err(|_| {
            StageError::invalid_input(format!("Sample key '{}' cannot be used as a file name", sample_key))
        })?;
        Ok((sample_key.to_string(), bam.to_string()))
    }
}

impl PipelineStage for Flagstat {
    type Output = FlagstatOutput;

    fn name(&self) -> &str {
        "flagstat"
    }

    fn validate(&self, input: Option<&Table>) -> Result<(), StageError> {
        Self::read_input(input).map(|_| ())
    }

    fn run(
        &self,
        input: Option<&Table>,
        outputs: &mut dyn OutputContext,
    ) -> Result<FlagstatOutput, StageError> {
        let (sample_key, bam) = Self::read_input(input)?;

        //Create an output file in the bundle to hold what flagstat prints
        let target_filename = Self::target_filename(&sample_key);
        let target = outputs
            .create_output_file(&target_filename)
            .map_err(|e| match e.kind() {
                io::ErrorKind::InvalidInput => StageError::invalid_input(e.to_string()),
                _ => StageError::io(&sample_key, &target_filename, e),
            })?;

        let mut command = self.descriptor.command(&bam);
        let command_string = command_to_string(&command);
        info!("Calling '{}' on sample {}", command_string, sample_key);

        //stdout into the artifact, stderr stays with us. Blocks until samtools exits
        let stdout = target
            .as_stdio()
            .map_err(|e| StageError::io(&sample_key, target.path(), e))?;
        let status = command
            .stdout(stdout)
            .status()
            .map_err(|source| StageError::Spawn {
                command: command_string.clone(),
                sample_key: sample_key.clone(),
                source,
            })?;
        drop(command);

        //Leaving here drops the target, which discards the partial file
        if !status.success() {
            return Err(StageError::ProcessFailure {
                command: command_string,
                sample_key,
                status: status.to_string(),
            });
        }

        let path_target = target.path().to_path_buf();
        let stats = target
            .commit()
            .map_err(|e| StageError::io(&sample_key, path_target, e))?;
        debug!("Wrote {}", stats.display());

        Ok(FlagstatOutput {
            sample_key: vec![sample_key],
            stats: vec![stats],
        })
    }
}

///////////////////////////////
/// Command line: run flagstat on the sample listed in a one-row table
#[derive(Args)]
pub struct FlagstatCMD {
    #[arg(short = 'i', value_parser = clap::value_parser!(PathBuf))]
    /// CSV or TSV with columns sample_key and bam, one row
    pub path_in: PathBuf,

    #[arg(short = 'o', value_parser = clap::value_parser!(PathBuf))]
    /// Output bundle directory
    pub path_out: PathBuf,

    #[arg(long = "samtools", default_value = DEFAULT_SAMTOOLS)]
    /// samtools executable, name or path
    pub samtools: String,

    //Thread settings
    #[arg(short = '@', value_parser = clap::value_parser!(usize))]
    /// Extra threads for samtools
    pub num_threads: Option<usize>,

    #[arg(long = "format", value_enum, default_value_t = FlagstatFormat::Default)]
    /// samtools flagstat output format
    pub format: FlagstatFormat,
}

impl FlagstatCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let config = FlagstatConfig {
            program: self.samtools.clone(),
            threads: self.num_threads,
            format: self.format,
            ..FlagstatConfig::default()
        };
        let output = self.execute_with(&config)?;

        println!("{}", serde_json::to_string_pretty(&output)?);
        info!("Flagstat has finished succesfully");
        Ok(())
    }

    /// Build the stage from config, apply it to the input table and persist into the bundle
    pub fn execute_with(&self, config: &FlagstatConfig) -> Result<FlagstatOutput> {
        let stage = Flagstat::new(config)?;

        let input = Table::from_path(&self.path_in)?;
        let mut bundle = LocalBundle::create(&self.path_out)?;

        let output = apply(&stage, Some(&input), &mut bundle)?;

        //The record is already persisted; a summary that cannot be made is not a failure
        if config.format == FlagstatFormat::Default {
            for stat in &output.stats {
                if let Err(e) = log_summary(stat) {
                    warn!("Could not summarize {}: {:#}", stat.display(), e);
                }
            }
        }
        Ok(output)
    }
}

fn log_summary(p: &Path) -> Result<()> {
    let f = File::open(p).with_context(|| format!("Could not open {}", p.display()))?;
    let report = FlagstatReport::parse(f).with_context(|| format!("Could not parse {}", p.display()))?;
    match report.mapped_fraction() {
        Some(frac) => info!(
            "{}: {} reads, {} mapped ({:.2}%)",
            p.display(),
            report.total.passed,
            report.mapped.passed,
            100.0 * frac
        ),
        None => info!("{}: no QC-passed reads", p.display()),
    }
    Ok(())
}
