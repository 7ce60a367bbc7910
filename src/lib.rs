pub mod bundle;
pub mod command;
pub mod fileformat;
pub mod stage;
pub mod utils;

pub use command::{Flagstat, FlagstatConfig, FlagstatOutput};
pub use stage::{apply, ErrorKind, PipelineStage, StageError, StageOutput};
