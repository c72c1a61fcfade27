use std::{
    ffi::CStr,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use tracing::debug;

use crate::{
    config::{BootConfig, IMAGE_FILE_NAME},
    path::{resolve_executable_dir, ExecutableDir},
    BootstrapError,
};

static INSTALLED: OnceLock<BootstrapContext> = OnceLock::new();

/// Process facts resolved once at start-up and shared with the native hooks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapContext {
    executable_dir: ExecutableDir,
}

impl BootstrapContext {
    /// Resolve the executable directory. `executable_hint` is only needed on platforms
    /// without a self link.
    pub fn resolve(executable_hint: Option<&Path>) -> Result<Self, BootstrapError> {
        Ok(Self::new(resolve_executable_dir(executable_hint)?))
    }

    pub fn new(executable_dir: ExecutableDir) -> Self {
        Self { executable_dir }
    }

    pub fn executable_dir(&self) -> &Path {
        self.executable_dir.path()
    }

    pub fn executable_dir_c(&self) -> &CStr {
        self.executable_dir.as_c_str()
    }

    /// Where to find the boot image.
    pub fn image_path(&self, config: &BootConfig) -> PathBuf {
        match &config.image_path {
            Some(path) => path.clone(),
            None => self.executable_dir().join(IMAGE_FILE_NAME),
        }
    }

    /// Make this the context the native hooks see. The first install wins. Later calls leave
    /// it in place and return it.
    pub fn install(self) -> &'static BootstrapContext {
        if INSTALLED.get().is_some() {
            debug!(
                "bootstrap context already installed, ignoring {}",
                self.executable_dir().display()
            );
        }
        INSTALLED.get_or_init(move || self)
    }

    pub fn installed() -> Option<&'static BootstrapContext> {
        INSTALLED.get()
    }

    /// The installed context, resolving and installing one if bootstrap never did.
    pub(crate) fn installed_or_resolve() -> Result<&'static BootstrapContext, BootstrapError> {
        if let Some(ctx) = INSTALLED.get() {
            return Ok(ctx);
        }
        let hint = std::env::current_exe().ok();
        Ok(Self::resolve(hint.as_deref())?.install())
    }
}
