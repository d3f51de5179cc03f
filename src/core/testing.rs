//! Recording `CommandRunner` double and a fixed `DeviceInventory`.
//!
//! Nothing is spawned. Every call is recorded in order. Scripted responses
//! are matched against the full argv first, then the program name.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::disk_ops::{CommandRunner, DeviceInventory};
use super::{BlockDevice, DiskError};
use super::executor::{CommandOutput, Credential};

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub argv: Vec<String>,
    pub privileged: bool,
}

impl Invocation {
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }
}

#[derive(Default)]
struct RecordingState {
    invocations: Vec<Invocation>,
    responses: HashMap<String, CommandOutput>,
    rejected: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct RecordingRunner {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies to every call of `program` with `stdout` and exit status 0
    pub fn respond(&self, program: &str, stdout: &str) {
        self.script(
            program,
            CommandOutput {
                stdout: stdout.to_string(),
                ..CommandOutput::default()
            },
        );
    }

    /// Replies to exactly `argv` with `stdout` and exit status 0
    pub fn respond_to(&self, argv: &[&str], stdout: &str) {
        self.script(
            &argv.join(" "),
            CommandOutput {
                stdout: stdout.to_string(),
                ..CommandOutput::default()
            },
        );
    }

    /// Makes every call of `program` exit with `exit_code` and `stderr`
    pub fn fail(&self, program: &str, exit_code: i32, stderr: &str) {
        self.script(
            program,
            CommandOutput {
                stdout: String::new(),
                stderr: stderr.to_string(),
                exit_code,
            },
        );
    }

    /// Makes privileged calls of `program` fail as if sudo refused the password
    pub fn reject_credential(&self, program: &str) {
        self.state.lock().unwrap().rejected.insert(program.to_string());
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.state.lock().unwrap().invocations.clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.state.lock().unwrap().invocations.len()
    }

    fn script(&self, key: &str, output: CommandOutput) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(key.to_string(), output);
    }

    fn record(&self, argv: &[String], privileged: bool) -> Result<CommandOutput, DiskError> {
        let mut state = self.state.lock().unwrap();
        state.invocations.push(Invocation {
            argv: argv.to_vec(),
            privileged,
        });

        let program = argv.first().cloned().unwrap_or_default();
        if privileged && state.rejected.contains(&program) {
            return Err(DiskError::Authentication(
                "sudo rejected the password".to_string(),
            ));
        }
        let output = state
            .responses
            .get(&argv.join(" "))
            .or_else(|| state.responses.get(&program))
            .cloned()
            .unwrap_or_default();
        output.check(&program)
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, argv: &[String]) -> Result<CommandOutput, DiskError> {
        self.record(argv, false)
    }

    async fn run_privileged(
        &self,
        argv: &[String],
        _credential: &Credential,
    ) -> Result<CommandOutput, DiskError> {
        self.record(argv, true)
    }
}

pub fn credential() -> Credential {
    Credential::new("x".to_string()).unwrap()
}

/// Inventory that always reports the same disks
pub struct StaticInventory(pub Vec<BlockDevice>);

#[async_trait]
impl DeviceInventory for StaticInventory {
    async fn list_removable_devices(&self) -> Result<Vec<BlockDevice>, DiskError> {
        Ok(self.0.clone())
    }
}

pub fn usb(path: &str) -> BlockDevice {
    BlockDevice {
        path: path.to_string(),
        size_label: "16G".to_string(),
        model: "Kingston".to_string(),
        mountpoint: None,
        is_removable: true,
    }
}
