//! Repair for reports cut short by an interrupted scan.
//!
//! nmap writes `</nmaprun>` last, so a killed scan leaves a report that is
//! complete up to its last host but cannot be tokenized. Recovery appends the
//! missing tag to a copy under a sibling `recovered/` directory. The result
//! decodes, but is not guaranteed to pass schema validation.

use crate::{Result, ScanError};
use log::{debug, info};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const CLOSE_TAG: &str = "</nmaprun>";
pub const RECOVERY_DIR: &str = "recovered";

/// Bytes read at a time from the end of a report.
const TAIL_WINDOW: u64 = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// The report already ends with the closing tag.
    NotNeeded,
    /// Path of the repaired copy.
    Recovered(PathBuf),
}

impl Recovery {
    pub fn is_recovered(&self) -> bool {
        matches!(self, Recovery::Recovered(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Recovery::Recovered(path) => Some(path),
            Recovery::NotNeeded => None,
        }
    }
}

/// True unless the report already ends (ignoring trailing whitespace) with
/// the closing root tag.
pub fn needs_recovery<P: AsRef<Path>>(path: P) -> Result<bool> {
    let tail = read_tail(path.as_ref())?;
    Ok(!tail.ends_with(CLOSE_TAG))
}

/// Where [`recover`] writes the repaired copy of `path`.
pub fn recovered_path<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .ok_or_else(|| ScanError::InvalidInput(format!("not a file path: {}", path.display())))?;
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    Ok(parent.join(RECOVERY_DIR).join(file_name))
}

/// Copies the report into `recovered/` and appends the closing tag to the
/// copy. The original file is never modified.
pub fn recover<P: AsRef<Path>>(path: P) -> Result<Recovery> {
    let path = path.as_ref();
    if !needs_recovery(path)? {
        debug!("{} is complete, no recovery needed", path.display());
        return Ok(Recovery::NotNeeded);
    }

    let target = recovered_path(path)?;
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::copy(path, &target)?;

    let mut copy = OpenOptions::new().append(true).open(&target)?;
    copy.write_all(CLOSE_TAG.as_bytes())?;
    copy.flush()?;

    info!("Recovered {} into {}", path.display(), target.display());
    Ok(Recovery::Recovered(target))
}

/// Last bytes of the file before any trailing whitespace, however long that
/// whitespace run is.
fn read_tail(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut end = file.metadata()?.len();
    let mut buf = vec![0u8; TAIL_WINDOW as usize];

    loop {
        let start = end.saturating_sub(TAIL_WINDOW);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;

        match chunk.iter().rposition(|b| !b.is_ascii_whitespace()) {
            Some(last) => {
                end = start + last as u64 + 1;
                break;
            }
            None if start == 0 => return Ok(String::new()),
            None => end = start,
        }
    }

    let start = end.saturating_sub(TAIL_WINDOW);
    let chunk = &mut buf[..(end - start) as usize];
    file.seek(SeekFrom::Start(start))?;
    file.read_exact(chunk)?;
    Ok(String::from_utf8_lossy(chunk).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const INTERRUPTED: &str = "<?xml version=\"1.0\"?>\n<nmaprun>\n<host><status state=\"up\"/></host>\n";

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_needs_recovery() {
        let dir = TempDir::new().unwrap();
        let interrupted = write(&dir, "interrupted.xml", INTERRUPTED);
        let complete = write(&dir, "complete.xml", &format!("{}{}\n\n", INTERRUPTED, CLOSE_TAG));

        assert!(needs_recovery(&interrupted).unwrap());
        assert!(!needs_recovery(&complete).unwrap());
    }

    #[test]
    fn test_recover_writes_sibling_copy() {
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "scan.xml", INTERRUPTED);

        let recovery = recover(&input).unwrap();
        let output = recovery.path().unwrap().to_path_buf();

        assert_eq!(output, dir.path().join(RECOVERY_DIR).join("scan.xml"));
        let recovered = fs::read_to_string(&output).unwrap();
        assert!(recovered.ends_with(CLOSE_TAG));
        assert!(recovered.len() > INTERRUPTED.len());
        assert_eq!(fs::read_to_string(&input).unwrap(), INTERRUPTED);
        assert!(!needs_recovery(&output).unwrap());
    }

    #[test]
    fn test_recover_complete_report_is_noop() {
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "done.xml", &format!("{}{}", INTERRUPTED, CLOSE_TAG));

        assert_eq!(recover(&input).unwrap(), Recovery::NotNeeded);
        assert!(!dir.path().join(RECOVERY_DIR).exists());
    }

    #[test]
    fn test_recover_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = recover(dir.path().join("missing.xml"));
        assert!(matches!(result, Err(ScanError::Io(_))));
    }

    #[test]
    fn test_long_report_only_tail_matters() {
        let dir = TempDir::new().unwrap();
        let padding = "<!-- padding -->\n".repeat(1000);
        let input = write(&dir, "long.xml", &format!("{}{}{}", INTERRUPTED, padding, CLOSE_TAG));
        assert!(!needs_recovery(&input).unwrap());
    }

    #[test]
    fn test_long_trailing_whitespace_is_ignored() {
        let dir = TempDir::new().unwrap();
        let trailing = " \n\t".repeat(5000);
        let input = write(&dir, "padded.xml", &format!("{}{}{}", INTERRUPTED, CLOSE_TAG, trailing));

        assert!(!needs_recovery(&input).unwrap());
        assert_eq!(recover(&input).unwrap(), Recovery::NotNeeded);

        let interrupted = write(&dir, "padded-interrupted.xml", &format!("{}{}", INTERRUPTED, trailing));
        assert!(needs_recovery(&interrupted).unwrap());
    }

    #[test]
    fn test_empty_and_blank_reports_need_recovery() {
        let dir = TempDir::new().unwrap();
        assert!(needs_recovery(write(&dir, "empty.xml", "")).unwrap());
        assert!(needs_recovery(write(&dir, "blank.xml", "\n\n")).unwrap());
    }
}
