//! Finding the directory the running executable lives in.
//!
//! Where the OS offers a self link (`/proc/self/exe` and friends) we read that. Elsewhere
//! the caller has to hand us a path to the executable at start-up, which we canonicalize.
//! Either way, the result is chopped after the last separator so it names the directory,
//! trailing `/` included.

use std::{
    ffi::{CStr, CString},
    os::unix::ffi::{OsStrExt, OsStringExt},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::BootstrapError;

pub const MAX_PATH_LENGTH: usize = libc::PATH_MAX as usize;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub const SELF_LINK: Option<&str> = Some("/proc/self/exe");
#[cfg(any(target_os = "solaris", target_os = "illumos"))]
pub const SELF_LINK: Option<&str> = Some("/proc/self/path/a.out");
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "solaris",
    target_os = "illumos"
)))]
pub const SELF_LINK: Option<&str> = None;

/// The directory holding the executable, in both Rust and C form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutableDir {
    path: PathBuf,
    c_path: CString,
}

impl ExecutableDir {
    /// Take the directory part of a path to the executable.
    pub fn from_executable(exe: &Path) -> Result<Self, BootstrapError> {
        let bytes = exe.as_os_str().as_bytes();
        if bytes.len() > MAX_PATH_LENGTH {
            return Err(BootstrapError::PathTooLong {
                len: bytes.len(),
                max: MAX_PATH_LENGTH,
            });
        }
        let dir = containing_dir(bytes).to_vec();
        let c_path = CString::new(dir.clone()).map_err(|e| BootstrapError::ExecutablePath {
            link: exe.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        Ok(Self {
            path: PathBuf::from(std::ffi::OsString::from_vec(dir)),
            c_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn as_c_str(&self) -> &CStr {
        &self.c_path
    }
}

/// Everything up to and including the last `/`. Empty if there is no separator.
pub fn containing_dir(path: &[u8]) -> &[u8] {
    match path.iter().rposition(|&b| b == b'/') {
        Some(idx) => &path[..=idx],
        None => &[],
    }
}

/// Resolve the executable directory for this platform. `hint` is the executable path
/// captured at start, and is only consulted where there is no self link.
pub fn resolve_executable_dir(hint: Option<&Path>) -> Result<ExecutableDir, BootstrapError> {
    let dir = match SELF_LINK {
        Some(link) => resolve_from_link(Path::new(link))?,
        None => resolve_from_hint(hint)?,
    };
    debug!("executable directory: {}", dir.path().display());
    Ok(dir)
}

/// Read a symbolic link naming the executable.
pub fn resolve_from_link(link: &Path) -> Result<ExecutableDir, BootstrapError> {
    let exe = std::fs::read_link(link).map_err(|source| BootstrapError::ExecutablePath {
        link: link.to_path_buf(),
        source,
    })?;
    ExecutableDir::from_executable(&exe)
}

/// Canonicalize an explicitly supplied executable path.
pub fn resolve_from_hint(hint: Option<&Path>) -> Result<ExecutableDir, BootstrapError> {
    let hint = hint.ok_or(BootstrapError::MissingExecutablePath)?;
    let exe = std::fs::canonicalize(hint).map_err(|source| BootstrapError::ExecutablePath {
        link: hint.to_path_buf(),
        source,
    })?;
    ExecutableDir::from_executable(&exe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chops_after_last_separator() {
        assert_eq!(containing_dir(b"/usr/local/bin/vm"), b"/usr/local/bin/");
        assert_eq!(containing_dir(b"/vm"), b"/");
        assert_eq!(containing_dir(b"/opt/vm/"), b"/opt/vm/");
        assert_eq!(containing_dir(b"vm"), b"");
    }

    #[test]
    fn dir_keeps_trailing_separator() {
        let dir = ExecutableDir::from_executable(Path::new("/opt/vm/bin/launcher")).unwrap();
        assert_eq!(dir.path(), Path::new("/opt/vm/bin/"));
        assert_eq!(dir.as_c_str().to_bytes(), b"/opt/vm/bin/");
        assert_eq!(dir.path().join("boot.vmi"), Path::new("/opt/vm/bin/boot.vmi"));
    }

    #[test]
    fn too_long() {
        let long = format!("/{}", "a".repeat(MAX_PATH_LENGTH + 1));
        let err = ExecutableDir::from_executable(Path::new(&long)).unwrap_err();
        assert!(matches!(err, BootstrapError::PathTooLong { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn from_link() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("bin").join("launcher");
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, b"").unwrap();
        let link = tmp.path().join("self");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let dir = resolve_from_link(&link).unwrap();
        assert_eq!(dir.path(), tmp.path().join("bin").as_path());
        assert!(dir.as_c_str().to_bytes().ends_with(b"/bin/"));
    }

    #[test]
    fn missing_link_is_fatal() {
        let err = resolve_from_link(Path::new("/nonexistent/self/link")).unwrap_err();
        assert!(matches!(err, BootstrapError::ExecutablePath { .. }));
    }

    #[test]
    fn from_hint() {
        let tmp = tempfile::tempdir().unwrap();
        let exe = tmp.path().join("launcher");
        std::fs::write(&exe, b"").unwrap();

        let dir = resolve_from_hint(Some(&exe)).unwrap();
        let canonical = std::fs::canonicalize(tmp.path()).unwrap();
        assert_eq!(dir.path(), canonical.as_path());

        assert!(matches!(
            resolve_from_hint(None),
            Err(BootstrapError::MissingExecutablePath)
        ));
        assert!(matches!(
            resolve_from_hint(Some(Path::new("/nonexistent/launcher"))),
            Err(BootstrapError::ExecutablePath { .. })
        ));
    }

    #[test]
    fn platform_resolution_is_idempotent() {
        let hint = std::env::current_exe().unwrap();
        let first = resolve_executable_dir(Some(&hint)).unwrap();
        let second = resolve_executable_dir(Some(&hint)).unwrap();
        assert_eq!(first, second);
        assert!(first.as_c_str().to_bytes().ends_with(b"/"));
    }
}
