#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};

use bamstat::bundle::LocalBundle;
use bamstat::command::flagstat::{INPUT_BAM_KEY, INPUT_SAMPLE_KEY};
use bamstat::fileformat::{FlagstatReport, Table};
use bamstat::{apply, ErrorKind, Flagstat, FlagstatConfig, PipelineStage, StageError};

/// Stand-in for samtools: a sh -c script. $0 is "samtools", $1 "flagstat", $2 the input file.
/// Every invocation touches the marker file, so tests can tell whether anything was spawned
fn fake_samtools(script: &str, marker: &Path) -> FlagstatConfig {
    let script = format!("touch '{}'\n{}", marker.display(), script);
    FlagstatConfig {
        program: "sh".to_string(),
        subcommand_args: vec![
            "-c".to_string(),
            script,
            "samtools".to_string(),
            "flagstat".to_string(),
        ],
        ..FlagstatConfig::default()
    }
}

const WORKING_TOOL: &str = r#"
echo "10 + 0 in total (QC-passed reads + QC-failed reads)"
echo "8 + 0 mapped (80.00% : N/A)"
echo "invoked: $0 $*"
"#;

const FAILING_TOOL: &str = r#"
echo "5 + 0 in total (QC-passed reads + QC-failed reads)"
echo "samtools flagstat: failed to open $2" >&2
exit 3
"#;

fn input_rows(rows: &[(&str, &str)]) -> Table {
    let mut t = Table::new(vec![INPUT_SAMPLE_KEY.to_string(), INPUT_BAM_KEY.to_string()]);
    for (key, bam) in rows {
        t.push_row(vec![key.to_string(), bam.to_string()]).unwrap();
    }
    t
}

struct Setup {
    _tmp: tempfile::TempDir,
    marker: PathBuf,
    bundle: LocalBundle,
}

fn setup() -> Setup {
    let tmp = tempfile::tempdir().unwrap();
    let marker = tmp.path().join("spawned");
    let bundle = LocalBundle::create(tmp.path().join("bundle")).unwrap();
    Setup {
        _tmp: tmp,
        marker,
        bundle,
    }
}

fn bundle_entries(bundle: &LocalBundle) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(bundle.dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn single_row_produces_stat_artifact() {
    let mut s = setup();
    let stage = Flagstat::new(&fake_samtools(WORKING_TOOL, &s.marker)).unwrap();

    let input = input_rows(&[("S1", "/data/s1.bam")]);
    let out = stage.run(Some(&input), &mut s.bundle).unwrap();

    assert_eq!(out.sample_key, vec!["S1".to_string()]);
    assert_eq!(out.stats, vec![s.bundle.dir().join("S1.stat")]);

    let content = fs::read_to_string(&out.stats[0]).unwrap();
    assert!(content.contains("invoked: samtools flagstat /data/s1.bam"));

    let report = FlagstatReport::parse(content.as_bytes()).unwrap();
    assert_eq!(report.total.passed, 10);
    assert_eq!(report.mapped.passed, 8);

    //Nothing but the artifact; no partial files left behind
    assert_eq!(bundle_entries(&s.bundle), vec!["S1.stat".to_string()]);
}

#[test]
fn two_rows_rejected_before_spawn() {
    let mut s = setup();
    let stage = Flagstat::new(&fake_samtools(WORKING_TOOL, &s.marker)).unwrap();

    let input = input_rows(&[("S1", "/data/s1.bam"), ("S2", "/data/s2.bam")]);
    let err = stage.run(Some(&input), &mut s.bundle).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(!s.marker.exists(), "no process should have been spawned");
    assert!(bundle_entries(&s.bundle).is_empty());
}

#[test]
fn zero_rows_rejected() {
    let mut s = setup();
    let stage = Flagstat::new(&fake_samtools(WORKING_TOOL, &s.marker)).unwrap();

    let err = stage.run(Some(&input_rows(&[])), &mut s.bundle).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(!s.marker.exists());
    assert!(bundle_entries(&s.bundle).is_empty());
}

#[test]
fn absent_input_rejected() {
    let mut s = setup();
    let stage = Flagstat::new(&fake_samtools(WORKING_TOOL, &s.marker)).unwrap();

    let err = stage.run(None, &mut s.bundle).unwrap_err();
    assert!(matches!(err, StageError::InvalidInput(_)));
    assert!(!s.marker.exists());
}

#[test]
fn missing_bam_field_rejected() {
    let mut s = setup();
    let stage = Flagstat::new(&fake_samtools(WORKING_TOOL, &s.marker)).unwrap();

    let mut input = Table::new(vec![INPUT_SAMPLE_KEY.to_string(), "cram".to_string()]);
    input.push_row(vec!["S1".to_string(), "/data/s1.cram".to_string()]).unwrap();

    let err = stage.run(Some(&input), &mut s.bundle).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(!s.marker.exists());
}

#[test]
fn missing_program_fails_at_construction() {
    let config = FlagstatConfig {
        program: "bamstat-no-such-tool".to_string(),
        ..FlagstatConfig::default()
    };
    let err = Flagstat::new(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyMissing);
    assert!(err.to_string().contains("bamstat-no-such-tool"));
}

#[test]
fn non_zero_exit_is_process_failure() {
    let mut s = setup();
    let stage = Flagstat::new(&fake_samtools(FAILING_TOOL, &s.marker)).unwrap();

    let input = input_rows(&[("S1", "/data/missing.bam")]);
    let err = stage.run(Some(&input), &mut s.bundle).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProcessFailure);
    let msg = err.to_string();
    assert!(msg.contains("S1"));
    assert!(msg.contains("/data/missing.bam"));

    //The tool did run, but its partial output was discarded
    assert!(s.marker.exists());
    assert!(bundle_entries(&s.bundle).is_empty());
}

#[test]
fn repeated_runs_give_same_artifact() {
    let mut first = setup();
    let mut second = setup();
    let input = input_rows(&[("S1", "/data/s1.bam")]);

    let out1 = Flagstat::new(&fake_samtools(WORKING_TOOL, &first.marker))
        .unwrap()
        .run(Some(&input), &mut first.bundle)
        .unwrap();
    let out2 = Flagstat::new(&fake_samtools(WORKING_TOOL, &second.marker))
        .unwrap()
        .run(Some(&input), &mut second.bundle)
        .unwrap();

    assert_eq!(out1.stats[0].file_name(), out2.stats[0].file_name());
    assert_eq!(
        fs::read_to_string(&out1.stats[0]).unwrap(),
        fs::read_to_string(&out2.stats[0]).unwrap()
    );
}

#[test]
fn rerun_into_same_bundle_replaces_artifact() {
    let mut s = setup();
    let stage = Flagstat::new(&fake_samtools(WORKING_TOOL, &s.marker)).unwrap();
    let input = input_rows(&[("S1", "/data/s1.bam")]);

    let out1 = stage.run(Some(&input), &mut s.bundle).unwrap();
    let out2 = stage.run(Some(&input), &mut s.bundle).unwrap();

    assert_eq!(out1, out2);
    assert_eq!(bundle_entries(&s.bundle), vec!["S1.stat".to_string()]);
}

#[test]
fn apply_persists_record_from_tsv_input() {
    let mut s = setup();
    let stage = Flagstat::new(&fake_samtools(WORKING_TOOL, &s.marker)).unwrap();

    let path_in = s.bundle.dir().parent().unwrap().join("input.tsv");
    fs::write(&path_in, "sample_key\tbam\nS1\t/data/s1.bam\n").unwrap();
    let input = Table::from_path(&path_in).unwrap();

    let out = apply(&stage, Some(&input), &mut s.bundle).unwrap();

    let record = s.bundle.read_record().unwrap();
    assert_eq!(record.columns, vec!["sample_key", "stats"]);
    assert_eq!(record.num_rows(), 1);
    let row = record.row(0).unwrap();
    assert_eq!(row.get("sample_key"), Some("S1"));
    assert_eq!(row.get("stats"), Some(out.stats[0].to_str().unwrap()));
    assert_eq!(
        bundle_entries(&s.bundle),
        vec!["S1.stat".to_string(), "bundle.csv".to_string()]
    );
}

#[test]
fn apply_persists_nothing_on_failure() {
    let mut s = setup();
    let stage = Flagstat::new(&fake_samtools(FAILING_TOOL, &s.marker)).unwrap();

    let input = input_rows(&[("S1", "/data/s1.bam")]);
    assert!(apply(&stage, Some(&input), &mut s.bundle).is_err());
    assert!(bundle_entries(&s.bundle).is_empty());
}

#[test]
fn program_removed_after_construction_is_process_failure() {
    use std::os::unix::fs::PermissionsExt;

    let mut s = setup();
    let tool = s.bundle.dir().parent().unwrap().join("flagstat-tool");
    fs::write(&tool, "#!/bin/sh\nexit 0\n").unwrap();
    fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

    let config = FlagstatConfig {
        program: tool.to_str().unwrap().to_string(),
        ..FlagstatConfig::default()
    };
    let stage = Flagstat::new(&config).unwrap();
    fs::remove_file(&tool).unwrap();

    let input = input_rows(&[("S1", "/data/s1.bam")]);
    let err = stage.run(Some(&input), &mut s.bundle).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProcessFailure);
    assert!(matches!(err, StageError::Spawn { ref sample_key, .. } if sample_key == "S1"));
    assert!(err.to_string().contains("flagstat-tool"));
    assert!(bundle_entries(&s.bundle).is_empty());
}

#[test]
fn missing_bundle_dir_is_io_error() {
    let mut s = setup();
    let stage = Flagstat::new(&fake_samtools(WORKING_TOOL, &s.marker)).unwrap();
    fs::remove_dir_all(s.bundle.dir()).unwrap();

    let input = input_rows(&[("S1", "/data/s1.bam")]);
    let err = stage.run(Some(&input), &mut s.bundle).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(matches!(err, StageError::Io { ref sample_key, .. } if sample_key == "S1"));
    assert!(err.to_string().contains("S1.stat"));
    assert!(!s.marker.exists());
}
