use log::debug;
use log::info;
use log::warn;
use semver::{Version, VersionReq};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

///////////////////////////////
/// Locate an executable. A program given with a path separator is checked as-is,
/// a bare name is looked up along the given search path (same format as PATH)
pub fn find_executable(program: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    debug!("Checking for {}", program);
    if program.is_empty() {
        return None;
    }

    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        let p = PathBuf::from(program);
        return if is_executable(&p) { Some(p) } else { None };
    }

    let search_path = search_path?;
    for dir in std::env::split_paths(search_path) {
        //Empty entries in PATH are not searched
        if dir.as_os_str().is_empty() {
            continue;
        }
        let candidate = dir.join(program);
        if is_executable(&candidate) {
            info!("Found {} at {}", program, candidate.display());
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(p: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(p) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable(p: &Path) -> bool {
    p.is_file()
}

///////////////////////////////
/// Ask samtools for its version. Output is "samtools 1.18" on the first line, possibly followed by build info
pub fn get_samtools_version(samtools: &Path) -> anyhow::Result<Version> {
    let output = Command::new(samtools).arg("version").output()?;
    if !output.status.success() {
        anyhow::bail!("{} version exited with {}", samtools.display(), output.status);
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next().unwrap_or_default();
    let token = first_line.split_whitespace().last().unwrap_or_default();
    parse_lenient_version(token)
}

/// samtools reports "1.18" or "1.17-2-g1234"; semver wants three numeric parts
pub fn parse_lenient_version(s: &str) -> anyhow::Result<Version> {
    let numeric = s.split(['-', '+']).next().unwrap_or_default();
    let mut parts: Vec<&str> = numeric.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        anyhow::bail!("Could not parse version from '{}'", s);
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    Ok(Version::parse(&parts.join("."))?)
}

///////////////////////////////
/// Log the samtools version, and warn if it is older than what a feature needs. Never fails
pub fn check_samtools_version(samtools: &Path, required: Option<&str>) {
    match get_samtools_version(samtools) {
        Ok(version) => {
            info!("Using samtools {}", version);
            if let Some(required) = required {
                match VersionReq::parse(required) {
                    Ok(req) if !req.matches(&version) => {
                        warn!("samtools {} found, but {} is needed for the requested options", version, required);
                    }
                    Ok(_) => debug!("Samtools version is recent enough"),
                    Err(e) => warn!("Bad version requirement {}: {}", required, e),
                }
            }
        }
        Err(e) => warn!("Could not determine samtools version: {}", e),
    }
}
