//! In-memory fakes for the external capabilities

use super::{ContainerRuntime, CreationTrigger, Script, ScriptRunner};
use crate::error::{ReconcileError, Result};
use crate::policy::DashboardSpec;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct RuntimeState {
    containers: Vec<(String, u32)>,
    named_running: HashSet<String>,
    images: HashSet<String>,
    calls: Vec<String>,
    fail_compose: bool,
    fail_list: bool,
    fail_inspect: HashSet<String>,
    fail_build: HashSet<String>,
    fail_stop: HashSet<String>,
}

/// Container runtime that tracks running containers in memory
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<RuntimeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_containers(containers: &[(&str, u32)]) -> Self {
        let runtime = Self::new();
        for (id, pid) in containers {
            runtime.add_container(id, *pid);
        }
        runtime
    }

    pub fn add_container(&self, id: &str, pid: u32) {
        self.state
            .lock()
            .unwrap()
            .containers
            .push((id.to_string(), pid));
    }

    pub fn set_named_running(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .named_running
            .insert(name.to_string());
    }

    pub fn add_image(&self, image: &str) {
        self.state.lock().unwrap().images.insert(image.to_string());
    }

    pub fn fail_compose(&self) {
        self.state.lock().unwrap().fail_compose = true;
    }

    pub fn fail_list(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn fail_inspect(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_inspect
            .insert(id.to_string());
    }

    pub fn fail_build(&self, image: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_build
            .insert(image.to_string());
    }

    pub fn fail_stop(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_stop
            .insert(id.to_string());
    }

    pub fn running_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .containers
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn log(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_running(&self) -> Result<Vec<String>> {
        self.log("list".to_string());
        let state = self.state.lock().unwrap();
        if state.fail_list {
            return Err(ReconcileError::external("docker ps", "daemon unreachable"));
        }
        Ok(state.containers.iter().map(|(id, _)| id.clone()).collect())
    }

    async fn root_pid(&self, id: &str) -> Result<u32> {
        self.log(format!("inspect {}", id));
        let state = self.state.lock().unwrap();
        if state.fail_inspect.contains(id) {
            return Err(ReconcileError::external("docker inspect", "no such container"));
        }
        state
            .containers
            .iter()
            .find(|(cid, _)| cid == id)
            .map(|(_, pid)| *pid)
            .ok_or_else(|| ReconcileError::external("docker inspect", "no such container"))
    }

    async fn stop(&self, id: &str) -> Result<()> {
        self.log(format!("stop {}", id));
        if self.state.lock().unwrap().fail_stop.contains(id) {
            return Err(ReconcileError::external("docker stop", "no such container"));
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.log(format!("rm {}", id));
        self.state
            .lock()
            .unwrap()
            .containers
            .retain(|(cid, _)| cid != id);
        Ok(())
    }

    async fn is_running_named(&self, name: &str) -> Result<bool> {
        self.log(format!("ps {}", name));
        Ok(self.state.lock().unwrap().named_running.contains(name))
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        self.log(format!("images {}", image));
        Ok(self.state.lock().unwrap().images.contains(image))
    }

    async fn build_image(&self, image: &str, _context_dir: &Path) -> Result<()> {
        self.log(format!("build {}", image));
        let mut state = self.state.lock().unwrap();
        if state.fail_build.contains(image) {
            return Err(ReconcileError::external("docker build", "missing Dockerfile"));
        }
        state.images.insert(image.to_string());
        Ok(())
    }

    async fn compose_up(&self, service: &str, _project_dir: &Path) -> Result<()> {
        self.log(format!("compose {}", service));
        if self.state.lock().unwrap().fail_compose {
            return Err(ReconcileError::external("docker compose", "no compose file"));
        }
        Ok(())
    }

    async fn run_detached(&self, spec: &DashboardSpec) -> Result<String> {
        self.log(format!("run {}", spec.container_name));
        self.set_named_running(&spec.container_name);
        Ok("f00dfeed".to_string())
    }
}

/// Script runner that records invocations
#[derive(Default)]
pub struct FakeScripts {
    runs: Mutex<Vec<Script>>,
    missing: Mutex<HashSet<Script>>,
    failing: Mutex<HashSet<Script>>,
}

impl FakeScripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_missing(&self, script: Script) {
        self.missing.lock().unwrap().insert(script);
    }

    pub fn set_failing(&self, script: Script) {
        self.failing.lock().unwrap().insert(script);
    }

    pub fn runs(&self) -> Vec<Script> {
        self.runs.lock().unwrap().clone()
    }

    pub fn run_count(&self, script: Script) -> usize {
        self.runs().iter().filter(|s| **s == script).count()
    }
}

#[async_trait]
impl ScriptRunner for FakeScripts {
    fn validate(&self) -> Result<()> {
        let missing = self.missing.lock().unwrap();
        for script in [Script::CreateContainers, Script::CleanContainers] {
            if missing.contains(&script) {
                return Err(ReconcileError::ScriptMissing(PathBuf::from(format!(
                    "{}.sh",
                    script
                ))));
            }
        }
        Ok(())
    }

    fn is_present(&self, script: Script) -> bool {
        !self.missing.lock().unwrap().contains(&script)
    }

    async fn run(&self, script: Script) -> Result<String> {
        self.runs.lock().unwrap().push(script);
        if self.failing.lock().unwrap().contains(&script) {
            return Err(ReconcileError::external(
                format!("bash {}.sh", script),
                "exit code 1",
            ));
        }
        Ok(format!("{} ok", script))
    }
}

/// Trigger that only flips a flag
#[derive(Default)]
pub struct FakeTrigger {
    installed: AtomicBool,
    install_calls: AtomicUsize,
    remove_calls: AtomicUsize,
    fail_install: AtomicBool,
}

impl FakeTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let trigger = Self::default();
        trigger.fail_install.store(true, Ordering::SeqCst);
        trigger
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    pub fn install_calls(&self) -> usize {
        self.install_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CreationTrigger for FakeTrigger {
    async fn install(&self) -> Result<()> {
        self.install_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_install.load(Ordering::SeqCst) {
            return Err(ReconcileError::external("crontab -", "crontab not installed"));
        }
        self.installed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        self.installed.store(false, Ordering::SeqCst);
        Ok(())
    }
}
