use std::io::{BufRead, BufReader, Read};
use std::sync::LazyLock;

use anyhow::bail;
use regex::Regex;
use serde::Serialize;

static FLAGSTAT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+) \+ (\d+) (.+)$").expect("flagstat line pattern"));

const LABEL_MATE_DIFF_CHR_MAPQ5: &str = "with mate mapped to a different chr (mapQ>=5)";

/// QC-passed and QC-failed read counts of one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QcCounts {
    pub passed: u64,
    pub failed: u64,
}

///////////////////////////////
/// Parsed default-format output of samtools flagstat
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlagstatReport {
    pub total: QcCounts,
    pub primary: QcCounts,
    pub secondary: QcCounts,
    pub supplementary: QcCounts,
    pub duplicates: QcCounts,
    pub primary_duplicates: QcCounts,
    pub mapped: QcCounts,
    pub primary_mapped: QcCounts,
    pub paired_in_sequencing: QcCounts,
    pub read1: QcCounts,
    pub read2: QcCounts,
    pub properly_paired: QcCounts,
    pub with_itself_and_mate_mapped: QcCounts,
    pub singletons: QcCounts,
    pub mate_mapped_to_different_chr: QcCounts,
    pub mate_mapped_to_different_chr_mapq5: QcCounts,
}

impl FlagstatReport {
    /// Parse a report. Lines that are not recognised are skipped; older samtools lack some categories
    pub fn parse(src: impl Read) -> anyhow::Result<FlagstatReport> {
        let mut report = FlagstatReport::default();
        let mut seen_total = false;

        for line in BufReader::new(src).lines() {
            let line = line?;
            let Some(caps) = FLAGSTAT_LINE.captures(line.trim_end()) else {
                continue;
            };
            let counts = QcCounts {
                passed: caps[1].parse()?,
                failed: caps[2].parse()?,
            };

            //Drop trailing "(95.00% : N/A)" style annotations, except where the parenthesis is part of the label
            let rest = &caps[3];
            let label = if rest == LABEL_MATE_DIFF_CHR_MAPQ5 {
                rest
            } else {
                rest.split(" (").next().unwrap_or(rest)
            };

            let slot = match label {
                "in total" => {
                    seen_total = true;
                    &mut report.total
                }
                "primary" => &mut report.primary,
                "secondary" => &mut report.secondary,
                "supplementary" => &mut report.supplementary,
                "duplicates" => &mut report.duplicates,
                "primary duplicates" => &mut report.primary_duplicates,
                "mapped" => &mut report.mapped,
                "primary mapped" => &mut report.primary_mapped,
                "paired in sequencing" => &mut report.paired_in_sequencing,
                "read1" => &mut report.read1,
                "read2" => &mut report.read2,
                "properly paired" => &mut report.properly_paired,
                "with itself and mate mapped" => &mut report.with_itself_and_mate_mapped,
                "singletons" => &mut report.singletons,
                "with mate mapped to a different chr" => &mut report.mate_mapped_to_different_chr,
                LABEL_MATE_DIFF_CHR_MAPQ5 => &mut report.mate_mapped_to_different_chr_mapq5,
                _ => {
                    log::debug!("Skipping unknown flagstat line: {}", line);
                    continue;
                }
            };
            *slot = counts;
        }

        if !seen_total {
            bail!("Not a samtools flagstat report: no 'in total' line");
        }
        Ok(report)
    }

    /// Fraction of QC-passed reads that are mapped
    pub fn mapped_fraction(&self) -> Option<f64> {
        if self.total.passed == 0 {
            None
        } else {
            Some(self.mapped.passed as f64 / self.total.passed as f64)
        }
    }
}
