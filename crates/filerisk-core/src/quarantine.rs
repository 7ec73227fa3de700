//! Quarantine: move flagged files into a flat directory without opening them.
//!
//! Destination is `dir/<basename>`, or `dir/<basename>.qN` with the smallest
//! free N >= 1. Existing files are never overwritten: each candidate name is
//! claimed with a hard link (or a `create_new` copy across devices), which
//! the filesystem refuses when the name is taken, so concurrent movers in
//! other processes cannot clobber each other either. Within the process,
//! movers targeting the same directory are also serialized by a lock keyed on
//! its canonical path.
//!
//! A symlink is moved as the link itself; the file it points to stays where
//! it is.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

use crate::error::QuarantineError;

static DIR_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn lock_for(dir: &Path) -> Arc<Mutex<()>> {
    // Canonical form so "q", "./q" and "sub/../q" share a lock.
    let key = fs::canonicalize(dir)
        .or_else(|_| std::path::absolute(dir))
        .unwrap_or_else(|_| dir.to_path_buf());
    let mut locks = DIR_LOCKS.lock().unwrap_or_else(|e| e.into_inner());
    Arc::clone(locks.entry(key).or_default())
}

#[derive(Debug, Clone)]
pub struct Quarantine {
    dir: PathBuf,
}

impl Quarantine {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Move `path` into the quarantine directory and return where it landed.
    /// On error the file is left where it was.
    pub fn move_file(&self, path: &Path) -> Result<PathBuf, QuarantineError> {
        let meta = fs::symlink_metadata(path).map_err(|source| QuarantineError::Source {
            path: path.to_path_buf(),
            source,
        })?;
        if meta.is_dir() {
            return Err(QuarantineError::NotAFile(path.to_path_buf()));
        }
        let Some(base) = path.file_name() else {
            return Err(QuarantineError::NotAFile(path.to_path_buf()));
        };

        fs::create_dir_all(&self.dir).map_err(|source| QuarantineError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let lock = lock_for(&self.dir);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        for target in candidate_names(&self.dir, base) {
            match place(path, &target) {
                Ok(()) => {
                    info!(from = %path.display(), to = %target.display(), "quarantined file");
                    return Ok(target);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(source) => {
                    return Err(QuarantineError::MoveFailed {
                        from: path.to_path_buf(),
                        to: target,
                        source,
                    })
                }
            }
        }

        Err(QuarantineError::MoveFailed {
            from: path.to_path_buf(),
            to: self.dir.join(base),
            source: io::Error::new(io::ErrorKind::AlreadyExists, "no free quarantine name"),
        })
    }
}

/// Move `path` into `quarantine_dir`, creating the directory if needed.
pub fn quarantine_file(path: &Path, quarantine_dir: &Path) -> Result<PathBuf, QuarantineError> {
    Quarantine::new(quarantine_dir).move_file(path)
}

/// Name for the N-th collision on `base`: `base.qN`.
pub fn collision_name(base: &OsStr, n: u32) -> OsString {
    let mut name = base.to_os_string();
    name.push(format!(".q{n}"));
    name
}

/// `dir/base`, then `dir/base.q1`, `dir/base.q2`, ...
fn candidate_names<'a>(dir: &'a Path, base: &'a OsStr) -> impl Iterator<Item = PathBuf> + 'a {
    std::iter::once(dir.join(base))
        .chain((1..=u32::MAX).map(move |n| dir.join(collision_name(base, n))))
}

/// Move `from` to `to` only if `to` does not exist; fails with
/// `AlreadyExists` otherwise and leaves both untouched.
fn place(from: &Path, to: &Path) -> io::Result<()> {
    match fs::hard_link(from, to) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(from) {
                let _ = fs::remove_file(to);
                return Err(e);
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(e),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            warn!(from = %from.display(), to = %to.display(), "cross-device quarantine, copying");
            copy_then_remove(from, to)
        }
        Err(e) => {
            debug!(error = %e, "hard link refused, copying instead");
            copy_then_remove(from, to)
        }
    }
}

fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    let mut src = fs::File::open(from)?;
    // create_new refuses to clobber anything that appeared in the meantime.
    let mut dst = OpenOptions::new().write(true).create_new(true).open(to)?;

    let copied = io::copy(&mut src, &mut dst).and_then(|_| dst.sync_all());
    if let Err(e) = copied {
        let _ = fs::remove_file(to);
        return Err(e);
    }
    if let Ok(meta) = src.metadata() {
        let _ = fs::set_permissions(to, meta.permissions());
    }
    drop(src);

    if let Err(e) = fs::remove_file(from) {
        let _ = fs::remove_file(to);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_directory_and_keeps_basename() {
        let base = tempfile::tempdir().unwrap();
        let src = base.path().join("evil.exe");
        fs::write(&src, b"MZ payload").unwrap();
        let qdir = base.path().join("nested").join("quarantine");

        let dest = quarantine_file(&src, &qdir).unwrap();
        assert_eq!(dest, qdir.join("evil.exe"));
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"MZ payload");
    }

    #[test]
    fn collisions_get_increasing_suffixes() {
        let base = tempfile::tempdir().unwrap();
        let qdir = base.path().join("q");
        let quarantine = Quarantine::new(&qdir);

        let mut landed = Vec::new();
        for i in 0..3 {
            let src_dir = base.path().join(format!("src{i}"));
            fs::create_dir(&src_dir).unwrap();
            let src = src_dir.join("evil.exe");
            fs::write(&src, format!("sample {i}")).unwrap();
            landed.push(quarantine.move_file(&src).unwrap());
        }

        assert_eq!(
            landed,
            vec![
                qdir.join("evil.exe"),
                qdir.join("evil.exe.q1"),
                qdir.join("evil.exe.q2"),
            ]
        );
        for (i, dest) in landed.iter().enumerate() {
            assert_eq!(fs::read_to_string(dest).unwrap(), format!("sample {i}"));
        }
    }

    #[test]
    fn smallest_free_suffix_is_reused() {
        let base = tempfile::tempdir().unwrap();
        let qdir = base.path().join("q");
        fs::create_dir(&qdir).unwrap();
        fs::write(qdir.join("a.bin"), b"0").unwrap();
        fs::write(qdir.join("a.bin.q2"), b"2").unwrap();

        let src = base.path().join("a.bin");
        fs::write(&src, b"new").unwrap();
        let dest = quarantine_file(&src, &qdir).unwrap();

        assert_eq!(dest, qdir.join("a.bin.q1"));
        assert_eq!(fs::read(qdir.join("a.bin.q2")).unwrap(), b"2");
    }

    #[test]
    fn missing_source_is_an_error() {
        let base = tempfile::tempdir().unwrap();
        let err = quarantine_file(&base.path().join("gone.exe"), &base.path().join("q")).unwrap_err();
        assert!(matches!(err, QuarantineError::Source { .. }));
    }

    #[test]
    fn directories_are_refused_and_left_in_place() {
        let base = tempfile::tempdir().unwrap();
        let victim = base.path().join("folder");
        fs::create_dir(&victim).unwrap();

        let err = quarantine_file(&victim, &base.path().join("q")).unwrap_err();
        assert!(matches!(err, QuarantineError::NotAFile(_)));
        assert!(victim.is_dir());
    }

    #[test]
    fn collision_name_appends_suffix() {
        assert_eq!(collision_name(OsStr::new("evil.exe"), 3), OsString::from("evil.exe.q3"));
    }

    #[test]
    fn copy_fallback_moves_content_and_refuses_existing_target() {
        let base = tempfile::tempdir().unwrap();
        let src = base.path().join("s.bin");
        let dst = base.path().join("d.bin");
        fs::write(&src, b"bytes").unwrap();

        copy_then_remove(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dst).unwrap(), b"bytes");

        fs::write(&src, b"other").unwrap();
        assert!(copy_then_remove(&src, &dst).is_err());
        assert_eq!(fs::read(&src).unwrap(), b"other");
        assert_eq!(fs::read(&dst).unwrap(), b"bytes");
    }

    #[test]
    fn taken_name_is_never_replaced() {
        let base = tempfile::tempdir().unwrap();
        let src = base.path().join("new.bin");
        let taken = base.path().join("old.bin");
        fs::write(&src, b"new").unwrap();
        fs::write(&taken, b"old").unwrap();

        let err = place(&src, &taken).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&src).unwrap(), b"new");
        assert_eq!(fs::read(&taken).unwrap(), b"old");
    }

    #[test]
    fn candidate_names_start_with_basename() {
        let dir = Path::new("/q");
        let names: Vec<_> = candidate_names(dir, OsStr::new("x.bin")).take(3).collect();
        assert_eq!(
            names,
            vec![dir.join("x.bin"), dir.join("x.bin.q1"), dir.join("x.bin.q2")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn read_only_quarantine_dir_leaves_source_in_place() {
        use std::os::unix::fs::PermissionsExt;

        let base = tempfile::tempdir().unwrap();
        let qdir = base.path().join("q");
        fs::create_dir(&qdir).unwrap();
        fs::set_permissions(&qdir, fs::Permissions::from_mode(0o500)).unwrap();

        // Permission bits do not bind a privileged user.
        let canary = qdir.join(".canary");
        if fs::File::create(&canary).is_ok() {
            let _ = fs::remove_file(&canary);
            fs::set_permissions(&qdir, fs::Permissions::from_mode(0o700)).unwrap();
            return;
        }

        let src = base.path().join("evil.exe");
        fs::write(&src, b"MZ payload").unwrap();
        let err = quarantine_file(&src, &qdir).unwrap_err();

        fs::set_permissions(&qdir, fs::Permissions::from_mode(0o700)).unwrap();
        assert!(matches!(err, QuarantineError::MoveFailed { .. }), "{err}");
        assert_eq!(fs::read(&src).unwrap(), b"MZ payload");
        assert_eq!(fs::read_dir(&qdir).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_is_moved_as_a_link() {
        let base = tempfile::tempdir().unwrap();
        let target = base.path().join("payload.bin");
        fs::write(&target, b"payload").unwrap();
        let link = base.path().join("link.bin");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let dest = quarantine_file(&link, &base.path().join("q")).unwrap();
        assert!(fs::symlink_metadata(&dest).unwrap().file_type().is_symlink());
        assert!(fs::symlink_metadata(&link).is_err());
        assert_eq!(fs::read(&target).unwrap(), b"payload");
    }
}
