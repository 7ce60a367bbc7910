pub mod flagstat_report;
pub mod table;

pub use flagstat_report::{FlagstatReport, QcCounts};
pub use table::{Cardinality, Row, Schema, Table};
