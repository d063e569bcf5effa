//! Starting the installed application

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::info;

use crate::app::sync::Handoff;
use crate::errors::{LaunchError, LaunchResult};

use super::paths::InstallLayout;

/// Spawns the application binary and leaves it running
#[derive(Debug, Clone)]
pub struct ProcessHandoff {
    binary: PathBuf,
    working_dir: PathBuf,
    args: Vec<String>,
}

impl ProcessHandoff {
    /// Start `layout`'s binary from its app folder with `args`
    pub fn new(layout: &InstallLayout, args: Vec<String>) -> Self {
        Self {
            binary: layout.binary().to_path_buf(),
            working_dir: layout.app_dir().to_path_buf(),
            args,
        }
    }
}

impl Handoff for ProcessHandoff {
    fn installed(&self) -> bool {
        self.binary.exists()
    }

    fn hand_off(&self) -> LaunchResult<()> {
        if !self.binary.exists() {
            return Err(LaunchError::BinaryMissing {
                path: self.binary.clone(),
            });
        }

        #[cfg(unix)]
        ensure_executable(&self.binary).map_err(|source| LaunchError::Spawn {
            path: self.binary.clone(),
            source,
        })?;

        let child = Command::new(&self.binary)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                path: self.binary.clone(),
                source,
            })?;

        info!("Started {} (pid {})", self.binary.display(), child.id());
        Ok(())
    }
}

/// Downloaded files carry no execute bits; grant them where read is granted
#[cfg(unix)]
fn ensure_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)?.permissions();
    let mode = permissions.mode();
    if mode & 0o111 == 0 {
        permissions.set_mode(mode | ((mode & 0o444) >> 2));
        std::fs::set_permissions(path, permissions)?;
    }
    Ok(())
}
