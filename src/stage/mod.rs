//! The contract a pipeline stage satisfies to compose with a workflow manager.
//!
//! A stage receives a row-shaped input, may allocate output files through an
//! [`OutputContext`], and returns a record. The manager (here [`apply`]) checks
//! the input, runs the stage and persists whatever record comes back.

mod error;

pub use error::{ErrorKind, StageError};

use log::info;

use crate::bundle::{LocalBundle, OutputContext};
use crate::fileformat::Table;

///////////////////////////////
/// A record a stage hands back for persisting
pub trait StageOutput {
    fn to_table(&self) -> Table;

    /// Sample the record describes, for error messages
    fn sample_key(&self) -> Option<&str> {
        None
    }
}

///////////////////////////////
/// One unit of work in a pipeline
///
/// Implementations hold no state across runs, so a caller can re-run a failed invocation with the same input.
pub trait PipelineStage {
    type Output: StageOutput;

    fn name(&self) -> &str;

    /// Check the input before anything is allocated or spawned
    fn validate(&self, _input: Option<&Table>) -> Result<(), StageError> {
        Ok(())
    }

    fn run(
        &self,
        input: Option<&Table>,
        outputs: &mut dyn OutputContext,
    ) -> Result<Self::Output, StageError>;
}

///////////////////////////////
/// Validate, run and persist one stage invocation. No record is persisted if any step fails,
/// but artifacts the stage already committed are left in the bundle
pub fn apply<S: PipelineStage>(
    stage: &S,
    input: Option<&Table>,
    bundle: &mut LocalBundle,
) -> Result<S::Output, StageError> {
    stage.validate(input)?;
    let output = stage.run(input, bundle)?;

    let record = output.to_table();
    let record_path = bundle.record_path();
    bundle
        .persist(&record)
        .map_err(|e| {
            StageError::io(
                output.sample_key().unwrap_or("-"),
                record_path,
                std::io::Error::other(format!("{:#}", e)),
            )
        })?;

    info!("{} wrote record to bundle {}", stage.name(), bundle.dir().display());
    Ok(output)
}
