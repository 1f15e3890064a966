//! Shell script runner

use super::command::run;
use super::{Script, ScriptRunner};
use crate::error::{ReconcileError, Result};
use crate::policy::ScriptPaths;
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info, warn};

/// Runs the operator scripts with `bash`
#[derive(Debug, Clone)]
pub struct BashScriptRunner {
    paths: ScriptPaths,
}

impl BashScriptRunner {
    pub fn new(paths: ScriptPaths) -> Self {
        Self { paths }
    }

    pub fn path(&self, script: Script) -> &Path {
        match script {
            Script::CreateContainers => &self.paths.create_containers,
            Script::CleanContainers => &self.paths.clean_containers,
            Script::LoadKernelModules => &self.paths.kernel_modules,
        }
    }

    /// Container scripts run inside the scripts directory; the kernel module
    /// loader runs next to itself.
    fn working_dir(&self, script: Script) -> &Path {
        match script {
            Script::LoadKernelModules => self
                .paths
                .kernel_modules
                .parent()
                .unwrap_or(self.paths.scripts_dir.as_path()),
            _ => &self.paths.scripts_dir,
        }
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl ScriptRunner for BashScriptRunner {
    fn validate(&self) -> Result<()> {
        for script in self.paths.required() {
            if !script.exists() {
                return Err(ReconcileError::ScriptMissing(script.to_path_buf()));
            }

            if let Err(e) = make_executable(script) {
                warn!(script = %script.display(), error = %e, "Could not make script executable");
            }
        }

        debug!("Required scripts present");
        Ok(())
    }

    fn is_present(&self, script: Script) -> bool {
        self.path(script).exists()
    }

    async fn run(&self, script: Script) -> Result<String> {
        let path = self.path(script);
        info!(script = %script, path = %path.display(), "Running script");

        let path_arg = path.to_string_lossy();
        let output = run("bash", &[&*path_arg], Some(self.working_dir(script))).await?;
        let combined = output.combined();

        debug!(script = %script, output = %combined, "Script finished");
        Ok(combined)
    }
}
