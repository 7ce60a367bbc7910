mod command_to_string;
mod detect_software;
mod path_utils;

pub use detect_software::check_samtools_version;
pub use detect_software::find_executable;
pub use detect_software::get_samtools_version;
pub use detect_software::parse_lenient_version;

pub use path_utils::to_absolute_path;

pub use command_to_string::command_to_string;
