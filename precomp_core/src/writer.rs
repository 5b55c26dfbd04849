use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tempfile::{NamedTempFile, TempPath};

use crate::error::{Error, Result, WriteDiagnostics};
use crate::registry::CodecId;
use crate::result::ItemResult;

/// What to do when a target file already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    #[default]
    Fail,
    Replace,
    Skip,
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OverwritePolicy::Fail => "fail",
            OverwritePolicy::Replace => "replace",
            OverwritePolicy::Skip => "skip",
        })
    }
}

impl FromStr for OverwritePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(OverwritePolicy::Fail),
            "replace" => Ok(OverwritePolicy::Replace),
            "skip" => Ok(OverwritePolicy::Skip),
            other => Err(format!(
                "unknown overwrite policy '{other}' (expected fail, replace or skip)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    pub policy: OverwritePolicy,
    /// Create the target directory (and parents) when missing.
    pub create_dirs: bool,
    /// Undo every rename made during a call when a later one fails,
    /// putting replaced files back.
    pub atomic_all: bool,
    /// Unix mode bits applied after the rename, e.g. `0o644`.
    pub permissions: Option<u32>,
    /// fsync staged files before the rename and the directory after.
    pub sync: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            policy: OverwritePolicy::Fail,
            create_dirs: true,
            atomic_all: true,
            permissions: None,
            sync: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Written,
    Skipped,
}

/// One output of a write group: written to `<basename>.<codec suffix>`.
#[derive(Debug, Clone, Copy)]
pub struct WriteEntry<'a> {
    pub codec: CodecId,
    pub data: &'a [u8],
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

struct Planned<'a> {
    target: PathBuf,
    data: &'a [u8],
}

/// Writes compressed variants next to each other without ever exposing a
/// partially written file.
///
/// # Write contract
/// ```text
/// validate basename             ← before any I/O
/// prepare directory             ← create or check writability
/// apply overwrite policy        ← every target, before staging
/// stage   .precomp.XXXXXX.tmp   ← O_EXCL, in parallel
/// move existing target aside    ← Replace only, .precomp.XXXXXX.bak
/// rename  tmp → target          ← serially; rollback on failure
/// drop set-aside files, chmod, fsync directory
/// ```
///
/// Temp and set-aside names do not embed the target name, so any target
/// name the filesystem accepts can be staged.
#[derive(Debug, Clone, Default)]
pub struct DurableWriter {
    options: WriteOptions,
    /// Target whose staging is made to fail.
    #[cfg(test)]
    stage_fault: Option<PathBuf>,
}

/// A target renamed into place during a call, with the file it replaced.
struct Renamed {
    target: PathBuf,
    previous: Option<TempPath>,
}

impl DurableWriter {
    pub fn new(options: WriteOptions) -> Self {
        Self {
            options,
            #[cfg(test)]
            stage_fault: None,
        }
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// Write a single file at `path`.
    pub fn write_one(&self, path: impl AsRef<Path>, data: &[u8]) -> Result<WriteStatus> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidBasename(path.display().to_string()))?;
        validate_basename(name)?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let report = self.write_planned(
            dir,
            vec![Planned {
                target: dir.join(name),
                data,
            }],
        )?;
        Ok(if report.written.is_empty() {
            WriteStatus::Skipped
        } else {
            WriteStatus::Written
        })
    }

    /// Write every entry as `<dir>/<basename>.<suffix>` as one group.
    pub fn write_all(
        &self,
        dir: impl AsRef<Path>,
        basename: &str,
        entries: &[WriteEntry<'_>],
    ) -> Result<WriteReport> {
        validate_basename(basename)?;
        let dir = dir.as_ref();
        let plan = entries
            .iter()
            .map(|e| Planned {
                target: dir.join(format!("{}.{}", basename, e.codec.descriptor().file_suffix)),
                data: e.data,
            })
            .collect();
        self.write_planned(dir, plan)
    }

    /// Write every successful output of `result`; failed codecs are left out.
    pub fn write_item(
        &self,
        dir: impl AsRef<Path>,
        basename: &str,
        result: &ItemResult,
    ) -> Result<WriteReport> {
        let entries: Vec<WriteEntry<'_>> = result
            .successful()
            .map(|(codec, data)| WriteEntry { codec, data })
            .collect();
        if entries.is_empty() {
            validate_basename(basename)?;
            log::debug!("item '{}' has no output to write", result.id());
            return Ok(WriteReport::default());
        }
        self.write_all(dir, basename, &entries)
    }

    fn write_planned(&self, dir: &Path, plan: Vec<Planned<'_>>) -> Result<WriteReport> {
        let total: u64 = plan.iter().map(|p| p.data.len() as u64).sum();
        self.prepare_dir(dir, total)?;

        // ── Overwrite policy, for every target before anything is staged ──
        let mut report = WriteReport::default();
        let mut pending = Vec::with_capacity(plan.len());
        for p in plan {
            if p.target.symlink_metadata().is_ok() {
                match self.options.policy {
                    OverwritePolicy::Fail => {
                        return Err(Error::TargetExists(diagnostics(&p.target, p.data.len())))
                    }
                    OverwritePolicy::Skip => {
                        log::debug!("skipping existing {}", p.target.display());
                        report.skipped.push(p.target);
                        continue;
                    }
                    OverwritePolicy::Replace => {}
                }
            }
            pending.push(p);
        }
        if pending.is_empty() {
            return Ok(report);
        }

        // ── Stage ──────────────────────────────────────────────────────────
        // Dropping a NamedTempFile unlinks it, so an early return anywhere
        // below cleans up whatever is still staged.
        let staged: Vec<(PathBuf, NamedTempFile)> = pending
            .par_iter()
            .map(|p| {
                self.stage(dir, &p.target, p.data)
                    .map(|tmp| (p.target.clone(), tmp))
            })
            .collect::<Result<_>>()?;

        // ── Rename ─────────────────────────────────────────────────────────
        let mut renamed: Vec<Renamed> = Vec::with_capacity(staged.len());
        for (target, tmp) in staged {
            let previous = match self.options.policy {
                OverwritePolicy::Replace => match move_aside(dir, &target) {
                    Ok(previous) => previous,
                    Err(source) => {
                        let diag = diagnostics(&target, 0);
                        self.rollback(renamed);
                        return Err(Error::RenameFailed { diag, source });
                    }
                },
                _ => None,
            };
            let persisted = match self.options.policy {
                OverwritePolicy::Fail => tmp.persist_noclobber(&target),
                _ => tmp.persist(&target),
            };
            if let Err(tempfile::PersistError { error, file }) = persisted {
                let bytes = file.as_file().metadata().map(|m| m.len()).unwrap_or(0);
                drop(file);
                if let Some(previous) = previous {
                    restore(&target, previous);
                }
                let diag = diagnostics(&target, bytes as usize);
                let error = if error.kind() == std::io::ErrorKind::AlreadyExists {
                    Error::TargetExists(diag)
                } else {
                    Error::RenameFailed { diag, source: error }
                };
                self.rollback(renamed);
                return Err(error);
            }
            renamed.push(Renamed { target, previous });
        }

        let mut written = Vec::with_capacity(renamed.len());
        for Renamed { target, previous } in renamed {
            if let Some(previous) = previous {
                if let Err(err) = previous.close() {
                    log::warn!("could not remove replaced {}: {}", target.display(), err);
                }
            }
            self.apply_permissions(&target);
            written.push(target);
        }
        if self.options.sync {
            sync_dir(dir);
        }

        log::info!(
            "wrote {} file(s), {} bytes, into {}",
            written.len(),
            total,
            dir.display()
        );
        report.written = written;
        Ok(report)
    }

    fn prepare_dir(&self, dir: &Path, bytes: u64) -> Result<()> {
        let diag = || WriteDiagnostics {
            path: dir.to_path_buf(),
            bytes_to_write: Some(bytes),
            directory_writable: dir_writable(dir),
            disk_free_space: free_space(dir),
        };

        match fs::metadata(dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(Error::DirectoryNotWritable {
                    diag: diag(),
                    reason: "not a directory".to_string(),
                })
            }
            Err(_) if self.options.create_dirs => {
                fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreateFailed {
                    diag: diag(),
                    source,
                })?;
                log::debug!("created {}", dir.display());
            }
            Err(err) => {
                return Err(Error::DirectoryNotWritable {
                    diag: diag(),
                    reason: err.to_string(),
                })
            }
        }

        if dir_writable(dir) == Some(false) {
            return Err(Error::DirectoryNotWritable {
                diag: diag(),
                reason: "permission denied".to_string(),
            });
        }
        Ok(())
    }

    fn stage(&self, dir: &Path, target: &Path, data: &[u8]) -> Result<NamedTempFile> {
        let fail = |source| Error::TempWriteFailed {
            diag: diagnostics(target, data.len()),
            source,
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(fail)?;
        tmp.write_all(data).map_err(fail)?;
        self.check_stage_fault(target).map_err(fail)?;
        if self.options.sync {
            tmp.as_file().sync_all().map_err(fail)?;
        }
        log::debug!(
            "staged {} bytes for {} in {}",
            data.len(),
            target.display(),
            tmp.path().display()
        );
        Ok(tmp)
    }

    #[cfg(test)]
    fn check_stage_fault(&self, target: &Path) -> std::io::Result<()> {
        if self.stage_fault.as_deref() == Some(target) {
            return Err(std::io::Error::other("staging fault"));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_stage_fault(&self, _target: &Path) -> std::io::Result<()> {
        Ok(())
    }

    /// Undo the renames of a failed call, newest first. Without `atomic_all`
    /// the new files stay and the files they replaced are dropped.
    fn rollback(&self, renamed: Vec<Renamed>) {
        if !self.options.atomic_all || renamed.is_empty() {
            return;
        }
        log::warn!("rolling back {} renamed file(s)", renamed.len());
        for Renamed { target, previous } in renamed.into_iter().rev() {
            if let Err(err) = fs::remove_file(&target) {
                log::warn!("rollback could not remove {}: {}", target.display(), err);
            }
            if let Some(previous) = previous {
                restore(&target, previous);
            }
        }
    }

    fn apply_permissions(&self, target: &Path) {
        let Some(mode) = self.options.permissions else {
            return;
        };
        if let Err(err) = set_mode(target, mode) {
            log::warn!(
                "could not set mode {:o} on {}: {}",
                mode,
                target.display(),
                err
            );
        }
    }
}

const SCRATCH_PREFIX: &str = ".precomp.";

/// Rename an existing file at `target` to a unique name in `dir`. The
/// returned path deletes the old contents when dropped.
fn move_aside(dir: &Path, target: &Path) -> std::io::Result<Option<TempPath>> {
    match target.symlink_metadata() {
        Ok(meta) if !meta.is_dir() => {}
        _ => return Ok(None),
    }
    let previous = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .suffix(".bak")
        .tempfile_in(dir)?
        .into_temp_path();
    fs::rename(target, &previous)?;
    log::debug!("moved {} aside to {}", target.display(), previous.display());
    Ok(Some(previous))
}

/// Put a set-aside file back at `target`. If that fails the file is kept
/// under its scratch name rather than deleted.
fn restore(target: &Path, previous: TempPath) {
    if let Err(err) = fs::rename(&previous, target) {
        match previous.keep() {
            Ok(kept) => log::warn!(
                "could not restore {}: {}; previous contents left at {}",
                target.display(),
                err,
                kept.display()
            ),
            Err(keep_err) => log::warn!(
                "could not restore {}: {}; {}",
                target.display(),
                err,
                keep_err
            ),
        }
    }
}

/// Reject names that would escape the target directory or be unusable.
pub fn validate_basename(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(Error::InvalidBasename(name.to_string()));
    }
    Ok(())
}

fn diagnostics(target: &Path, bytes: usize) -> WriteDiagnostics {
    let dir = target.parent().unwrap_or(Path::new("."));
    WriteDiagnostics {
        path: target.to_path_buf(),
        bytes_to_write: Some(bytes as u64),
        directory_writable: dir_writable(dir),
        disk_free_space: free_space(dir),
    }
}

#[cfg(unix)]
fn c_path(path: &Path) -> Option<std::ffi::CString> {
    use std::os::unix::ffi::OsStrExt;
    std::ffi::CString::new(path.as_os_str().as_bytes()).ok()
}

#[cfg(unix)]
fn dir_writable(dir: &Path) -> Option<bool> {
    if !dir.is_dir() {
        return None;
    }
    let path = c_path(dir)?;
    // SAFETY: `path` is a valid NUL-terminated string for the call's duration.
    let rc = unsafe { libc::access(path.as_ptr(), libc::W_OK) };
    Some(rc == 0)
}

#[cfg(not(unix))]
fn dir_writable(dir: &Path) -> Option<bool> {
    fs::metadata(dir).ok().map(|m| !m.permissions().readonly())
}

#[cfg(unix)]
fn free_space(dir: &Path) -> Option<u64> {
    let path = c_path(dir)?;
    // SAFETY: statvfs only writes into `st`, which is plain old data.
    let mut st: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(path.as_ptr(), &mut st) };
    if rc != 0 {
        return None;
    }
    Some((st.f_bavail as u64).saturating_mul(st.f_frsize as u64))
}

#[cfg(not(unix))]
fn free_space(_dir: &Path) -> Option<u64> {
    None
}

#[cfg(unix)]
fn set_mode(target: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(target, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_target: &Path, _mode: u32) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "mode bits are only supported on unix",
    ))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(err) = File::open(dir).and_then(|d| d.sync_all()) {
        log::warn!("could not fsync {}: {}", dir.display(), err);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::result::{Failure, ItemResult, Outcome};
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn listing(dir: &Path) -> BTreeSet<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    fn writer(policy: OverwritePolicy) -> DurableWriter {
        DurableWriter::new(WriteOptions {
            policy,
            ..WriteOptions::default()
        })
    }

    fn entries() -> [WriteEntry<'static>; 2] {
        [
            WriteEntry {
                codec: CodecId::Gzip,
                data: b"gzip bytes",
            },
            WriteEntry {
                codec: CodecId::Brotli,
                data: b"brotli bytes",
            },
        ]
    }

    #[test]
    fn writes_every_variant_and_nothing_else() {
        let dir = tempfile::tempdir().unwrap();
        let report = writer(OverwritePolicy::Fail)
            .write_all(dir.path(), "app.js", &entries())
            .unwrap();

        assert_eq!(report.written.len(), 2);
        assert!(report.skipped.is_empty());
        assert_eq!(fs::read(dir.path().join("app.js.gz")).unwrap(), b"gzip bytes");
        assert_eq!(fs::read(dir.path().join("app.js.br")).unwrap(), b"brotli bytes");
        assert_eq!(
            listing(dir.path()),
            BTreeSet::from(["app.js.br".to_string(), "app.js.gz".to_string()])
        );
    }

    #[test]
    fn fail_policy_checks_all_targets_before_staging() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.js.br"), b"old").unwrap();

        let err = writer(OverwritePolicy::Fail)
            .write_all(dir.path(), "app.js", &entries())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TargetExists);
        assert_eq!(err.diagnostics().unwrap().path, dir.path().join("app.js.br"));
        // the gzip variant, which did not exist, was never written
        assert_eq!(listing(dir.path()), BTreeSet::from(["app.js.br".to_string()]));
        assert_eq!(fs::read(dir.path().join("app.js.br")).unwrap(), b"old");
    }

    #[test]
    fn skip_policy_leaves_existing_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("app.js.gz");
        fs::write(&existing, b"keep me").unwrap();

        let report = writer(OverwritePolicy::Skip)
            .write_all(dir.path(), "app.js", &entries())
            .unwrap();
        assert_eq!(report.skipped, vec![existing.clone()]);
        assert_eq!(report.written, vec![dir.path().join("app.js.br")]);
        assert_eq!(fs::read(&existing).unwrap(), b"keep me");

        let status = writer(OverwritePolicy::Skip).write_one(&existing, b"new").unwrap();
        assert_eq!(status, WriteStatus::Skipped);
        assert_eq!(fs::read(&existing).unwrap(), b"keep me");
    }

    #[test]
    fn replace_policy_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.html.gz");
        fs::write(&path, b"stale").unwrap();

        let status = writer(OverwritePolicy::Replace).write_one(&path, b"fresh").unwrap();
        assert_eq!(status, WriteStatus::Written);
        assert_eq!(fs::read(&path).unwrap(), b"fresh");
        assert_eq!(listing(dir.path()).len(), 1);
    }

    #[test]
    fn invalid_basenames_are_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("never-created");
        let w = writer(OverwritePolicy::Replace);
        for name in ["", ".", "..", "a/b", "a\\b", "nul\0byte"] {
            let err = w.write_all(&missing, name, &entries()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidBasename, "name {name:?}");
        }
        assert!(!missing.exists());
        assert_eq!(
            w.write_one(dir.path().join(".."), b"x").unwrap_err().kind(),
            ErrorKind::InvalidBasename
        );
    }

    #[test]
    fn failed_rename_rolls_back_the_whole_group() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("unrelated.txt"), b"untouched").unwrap();
        // a non-empty directory cannot be replaced by a file
        let blocker = dir.path().join("app.js.br");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("inner"), b"x").unwrap();

        let err = writer(OverwritePolicy::Replace)
            .write_all(dir.path(), "app.js", &entries())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RenameFailed);
        assert_eq!(err.diagnostics().unwrap().path, blocker);

        assert_eq!(
            listing(dir.path()),
            BTreeSet::from(["app.js.br".to_string(), "unrelated.txt".to_string()])
        );
        assert_eq!(
            fs::read(dir.path().join("unrelated.txt")).unwrap(),
            b"untouched"
        );
    }

    #[test]
    fn failed_group_puts_replaced_files_back() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.js.gz"), b"previous gzip").unwrap();
        let blocker = dir.path().join("app.js.br");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("inner"), b"x").unwrap();

        let err = writer(OverwritePolicy::Replace)
            .write_all(dir.path(), "app.js", &entries())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RenameFailed);

        assert_eq!(
            fs::read(dir.path().join("app.js.gz")).unwrap(),
            b"previous gzip"
        );
        assert_eq!(
            listing(dir.path()),
            BTreeSet::from(["app.js.br".to_string(), "app.js.gz".to_string()])
        );
    }

    #[test]
    fn replaced_files_are_dropped_after_success() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.js.gz"), b"previous gzip").unwrap();
        fs::write(dir.path().join("app.js.br"), b"previous brotli").unwrap();

        let report = writer(OverwritePolicy::Replace)
            .write_all(dir.path(), "app.js", &entries())
            .unwrap();
        assert_eq!(report.written.len(), 2);
        assert_eq!(fs::read(dir.path().join("app.js.gz")).unwrap(), b"gzip bytes");
        assert_eq!(fs::read(dir.path().join("app.js.br")).unwrap(), b"brotli bytes");
        assert_eq!(
            listing(dir.path()),
            BTreeSet::from(["app.js.br".to_string(), "app.js.gz".to_string()])
        );
    }

    #[test]
    fn staging_failure_of_second_output_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("unrelated.txt"), b"untouched").unwrap();
        let mut w = writer(OverwritePolicy::Fail);
        w.stage_fault = Some(dir.path().join("app.js.br"));

        let err = w.write_all(dir.path(), "app.js", &entries()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TempWriteFailed);
        assert_eq!(err.diagnostics().unwrap().path, dir.path().join("app.js.br"));

        assert_eq!(listing(dir.path()), BTreeSet::from(["unrelated.txt".to_string()]));
        assert_eq!(
            fs::read(dir.path().join("unrelated.txt")).unwrap(),
            b"untouched"
        );
    }

    #[test]
    fn long_target_names_can_be_staged() {
        let dir = tempfile::tempdir().unwrap();
        let basename = "a".repeat(250);
        let gzip = [WriteEntry {
            codec: CodecId::Gzip,
            data: b"gzip bytes",
        }];

        let report = writer(OverwritePolicy::Replace)
            .write_all(dir.path(), &basename, &gzip)
            .unwrap();
        let target = dir.path().join(format!("{basename}.gz"));
        assert_eq!(report.written, vec![target.clone()]);

        // again, so the existing file is set aside under a short name too
        writer(OverwritePolicy::Replace)
            .write_all(dir.path(), &basename, &gzip)
            .unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"gzip bytes");
        assert_eq!(listing(dir.path()).len(), 1);
    }

    #[test]
    fn without_atomic_all_earlier_renames_survive() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("app.js.br");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("inner"), b"x").unwrap();

        let w = DurableWriter::new(WriteOptions {
            policy: OverwritePolicy::Replace,
            atomic_all: false,
            ..WriteOptions::default()
        });
        assert!(w.write_all(dir.path(), "app.js", &entries()).is_err());
        assert_eq!(fs::read(dir.path().join("app.js.gz")).unwrap(), b"gzip bytes");
        assert!(!listing(dir.path()).iter().any(|n| n.ends_with(".tmp")));
    }

    #[test]
    fn missing_directory_handling() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let err = DurableWriter::new(WriteOptions {
            create_dirs: false,
            ..WriteOptions::default()
        })
        .write_one(nested.join("x.gz"), b"x")
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DirectoryNotWritable);
        assert_eq!(err.diagnostics().unwrap().bytes_to_write, Some(1));

        let status = DurableWriter::default()
            .write_one(nested.join("x.gz"), b"x")
            .unwrap();
        assert_eq!(status, WriteStatus::Written);
        assert_eq!(fs::read(nested.join("x.gz")).unwrap(), b"x");
    }

    #[test]
    fn file_in_place_of_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, b"").unwrap();
        let err = DurableWriter::default()
            .write_all(&file, "app.js", &entries())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DirectoryNotWritable);
    }

    #[cfg(unix)]
    #[test]
    fn applies_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("styles.css.zst");
        DurableWriter::new(WriteOptions {
            permissions: Some(0o640),
            ..WriteOptions::default()
        })
        .write_one(&path, b"zstd")
        .unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn write_item_plans_only_successful_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let result = ItemResult::new(
            "logo".into(),
            100,
            vec![
                (
                    CodecId::Zstd,
                    Outcome::Success {
                        bytes: b"zstd".to_vec(),
                        elapsed: Duration::from_millis(1),
                    },
                ),
                (
                    CodecId::Brotli,
                    Outcome::Failure(Failure::new(ErrorKind::AlgorithmUnavailable, "nope")),
                ),
            ],
        );
        let report = DurableWriter::default()
            .write_item(dir.path(), "logo.svg", &result)
            .unwrap();
        assert_eq!(report.written, vec![dir.path().join("logo.svg.zst")]);
        assert_eq!(listing(dir.path()), BTreeSet::from(["logo.svg.zst".to_string()]));
    }

    #[test]
    fn write_item_without_output_does_no_io() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-yet");
        let result = ItemResult::new(
            "logo".into(),
            100,
            vec![(
                CodecId::Brotli,
                Outcome::Failure(Failure::new(ErrorKind::AlgorithmUnavailable, "nope")),
            )],
        );

        let report = DurableWriter::default()
            .write_item(&missing, "logo.svg", &result)
            .unwrap();
        assert_eq!(report, WriteReport::default());
        assert!(!missing.exists());

        let err = DurableWriter::default()
            .write_item(&missing, "../logo.svg", &result)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidBasename);
    }

    #[test]
    fn policy_parses_and_serializes_lowercase() {
        assert_eq!("Skip".parse::<OverwritePolicy>().unwrap(), OverwritePolicy::Skip);
        assert!("clobber".parse::<OverwritePolicy>().is_err());
        let opts: WriteOptions = serde_json::from_str(r#"{"policy":"replace"}"#).unwrap();
        assert_eq!(opts.policy, OverwritePolicy::Replace);
        assert!(opts.create_dirs && opts.atomic_all && opts.sync);
        assert_eq!(opts.permissions, None);
    }
}
