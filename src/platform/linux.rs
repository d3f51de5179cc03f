use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::core::disk_ops::{CommandRunner, DeviceInventory};
use crate::core::executor::{CommandOutput, Credential};
use crate::core::{BlockDevice, DiskError, FileSystemType};
use crate::utils::is_root;

pub const DEV_DIR: &str = "/dev";
pub const BY_ID_DIR: &str = "/dev/disk/by-id";

const LSBLK_COLUMNS: &str = "NAME,SIZE,TYPE,MOUNTPOINT,MODEL";
const DEFAULT_MODEL: &str = "USB Disk";

/// Admin binaries live here but are often missing from a regular user's PATH
const SBIN_DIRS: &str = "/usr/local/sbin:/usr/sbin:/sbin";

/// Finds `program` on PATH, then in the sbin directories
pub fn locate(program: &str) -> Option<PathBuf> {
    which::which(program)
        .or_else(|_| which::which_in(program, Some(SBIN_DIRS), "/"))
        .ok()
}

/// Filesystems whose mkfs tool is not installed
pub fn missing_tools() -> Vec<FileSystemType> {
    FileSystemType::ALL
        .into_iter()
        .filter(|fs| locate(fs.required_tool()).is_none())
        .collect()
}

/// Runs commands directly, or through sudo when elevated
pub struct SudoRunner;

impl SudoRunner {
    pub fn new() -> Self {
        Self
    }
}

fn resolve(program: &str) -> Result<PathBuf, DiskError> {
    locate(program).ok_or_else(|| DiskError::NotFound(program.to_string()))
}

fn spawn_error(program: &str, e: std::io::Error) -> DiskError {
    if e.kind() == std::io::ErrorKind::NotFound {
        DiskError::NotFound(program.to_string())
    } else {
        DiskError::IoError(e)
    }
}

fn to_output(output: std::process::Output) -> CommandOutput {
    CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
    }
}

/// sudo's complaints when the password on stdin is wrong or missing
fn is_auth_rejection(stderr: &str) -> bool {
    stderr.contains("incorrect password")
        || stderr.contains("Sorry, try again")
        || stderr.contains("no password was provided")
        || stderr.contains("a password is required")
}

#[async_trait]
impl CommandRunner for SudoRunner {
    async fn run(&self, argv: &[String]) -> Result<CommandOutput, DiskError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| DiskError::NotFound("empty command".to_string()))?;
        let path = resolve(program)?;

        debug!(command = %argv.join(" "), "running");
        let output = Command::new(&path)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(program, e))?;

        to_output(output).check(program)
    }

    async fn run_privileged(
        &self,
        argv: &[String],
        credential: &Credential,
    ) -> Result<CommandOutput, DiskError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| DiskError::NotFound("empty command".to_string()))?;
        let path = resolve(program)?;
        let elevation = if is_root() {
            Elevation::Direct
        } else {
            probe_sudo(resolve("sudo")?).await
        };

        let command = elevation.argv(&path, args);
        debug!(command = %argv.join(" "), mode = elevation.label(), "running elevated");
        let (binary, rest) = command
            .split_first()
            .ok_or_else(|| DiskError::NotFound("empty command".to_string()))?;

        let mut child = Command::new(binary)
            .args(rest)
            .stdin(if elevation.feeds_credential() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(binary, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            let mut line = String::with_capacity(credential.expose().len() + 1);
            line.push_str(credential.expose());
            line.push('\n');
            let written = stdin.write_all(line.as_bytes()).await;
            line.zeroize();
            if let Err(e) = written {
                // sudo may exit before reading, its status tells the story
                debug!(error = %e, "could not write credential to sudo");
            }
        }

        let output = to_output(child.wait_with_output().await?);
        if !output.success() && is_auth_rejection(&output.stderr) {
            return Err(DiskError::Authentication(
                "sudo rejected the password".to_string(),
            ));
        }
        output.check(program)
    }
}

/// How a privileged command gets its rights
#[derive(Debug, Clone, PartialEq, Eq)]
enum Elevation {
    /// Already root, the tool runs as is
    Direct,
    /// sudo lets this user through without asking
    Passwordless(PathBuf),
    /// sudo reads the password from its stdin
    Password(PathBuf),
}

impl Elevation {
    /// Only sudo's own prompt gets the password. Otherwise it would be left
    /// on the stdin of umount or mkfs.
    fn feeds_credential(&self) -> bool {
        matches!(self, Elevation::Password(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Elevation::Direct => "root",
            Elevation::Passwordless(_) => "sudo-nopasswd",
            Elevation::Password(_) => "sudo",
        }
    }

    fn argv(&self, tool: &Path, args: &[String]) -> Vec<String> {
        let mut argv = match self {
            Elevation::Direct => Vec::new(),
            Elevation::Passwordless(sudo) => vec![
                sudo.to_string_lossy().into_owned(),
                "-n".to_string(),
                "--".to_string(),
            ],
            // -k: check the password we pass even if a sudo session is cached
            Elevation::Password(sudo) => vec![
                sudo.to_string_lossy().into_owned(),
                "-S".to_string(),
                "-k".to_string(),
                "-p".to_string(),
                String::new(),
                "--".to_string(),
            ],
        };
        argv.push(tool.to_string_lossy().into_owned());
        argv.extend(args.iter().cloned());
        argv
    }
}

/// Asks sudo, without a password and ignoring any cached session, whether
/// it would run a command at all
async fn probe_sudo(sudo: PathBuf) -> Elevation {
    let status = Command::new(&sudo)
        .args(["-k", "-n", "true"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => Elevation::Passwordless(sudo),
        _ => Elevation::Password(sudo),
    }
}

/// Finds USB disks with `lsblk` and the by-id symlink namespace
pub struct LinuxInventory {
    runner: Arc<dyn CommandRunner>,
    dev_dir: PathBuf,
    by_id_dir: PathBuf,
}

impl LinuxInventory {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_paths(runner, DEV_DIR, BY_ID_DIR)
    }

    pub fn with_paths(
        runner: Arc<dyn CommandRunner>,
        dev_dir: impl Into<PathBuf>,
        by_id_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            dev_dir: dev_dir.into(),
            by_id_dir: by_id_dir.into(),
        }
    }

    /// Parse lsblk JSON output into whole disks, optical drives excluded
    fn parse_lsblk_output(&self, output: &str) -> Result<Vec<BlockDevice>, DiskError> {
        let lsblk: LsblkOutput =
            serde_json::from_str(output).map_err(|e| DiskError::Inventory(e.to_string()))?;

        let devices = lsblk
            .blockdevices
            .into_iter()
            .filter(|block| block.device_type == "disk" && !block.name.starts_with("sr"))
            .map(|block| {
                let mountpoint = block.mountpoint.clone().or_else(|| {
                    block
                        .children
                        .iter()
                        .find_map(|child| child.mountpoint.clone())
                });
                let model = block
                    .model
                    .as_deref()
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .unwrap_or(DEFAULT_MODEL)
                    .to_string();

                BlockDevice {
                    path: self.dev_dir.join(&block.name).to_string_lossy().into_owned(),
                    size_label: block.size.unwrap_or_default(),
                    model,
                    mountpoint,
                    is_removable: false,
                }
            })
            .collect();

        Ok(devices)
    }

    /// Real device nodes behind the `usb-*` whole-disk links
    fn usb_nodes(&self) -> HashSet<PathBuf> {
        let entries = match fs::read_dir(&self.by_id_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.by_id_dir.display(), error = %e, "no by-id namespace");
                return HashSet::new();
            }
        };

        entries
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.contains("usb-") && !is_partition_link(name))
            })
            .filter_map(|entry| fs::canonicalize(entry.path()).ok())
            .collect()
    }
}

/// `usb-Kingston_DT_1234-0:0-part1` names a partition, not the disk
fn is_partition_link(name: &str) -> bool {
    name.rsplit_once("-part")
        .is_some_and(|(_, n)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Structures for parsing lsblk JSON output
#[derive(Debug, Deserialize)]
struct LsblkOutput {
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Debug, Deserialize)]
struct LsblkDevice {
    name: String,
    size: Option<String>,
    #[serde(rename = "type")]
    device_type: String,
    mountpoint: Option<String>,
    model: Option<String>,
    #[serde(default)]
    children: Vec<LsblkDevice>,
}

#[async_trait]
impl DeviceInventory for LinuxInventory {
    async fn list_removable_devices(&self) -> Result<Vec<BlockDevice>, DiskError> {
        let argv: Vec<String> = ["lsblk", "-J", "-o", LSBLK_COLUMNS]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let output = self
            .runner
            .run(&argv)
            .await
            .map_err(|e| DiskError::Inventory(e.to_string()))?;

        let disks = self.parse_lsblk_output(&output.stdout)?;
        let usb = self.usb_nodes();

        let devices: Vec<BlockDevice> = disks
            .into_iter()
            .filter(|disk| usb.contains(&canonical(Path::new(&disk.path))))
            .map(|disk| BlockDevice {
                is_removable: true,
                ..disk
            })
            .collect();

        info!(count = devices.len(), "removable devices found");
        Ok(devices)
    }
}

/// Whole disk backing `/`, following parents up from the mount source
pub async fn root_disk(runner: &dyn CommandRunner) -> Option<String> {
    let argv: Vec<String> = ["findmnt", "-n", "-o", "SOURCE", "/"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let output = runner.run(&argv).await.ok()?;

    // btrfs reports `/dev/sda2[/@]`
    let source = output.stdout.trim();
    let mut current = source.split('[').next().unwrap_or(source).to_string();
    if !current.starts_with("/dev/") {
        warn!(source = %source, "root is not backed by a block device");
        return None;
    }

    // partition -> disk, or dm -> partition -> disk
    for _ in 0..4 {
        let argv: Vec<String> = ["lsblk", "-d", "-n", "-o", "PKNAME", current.as_str()]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let output = runner.run(&argv).await.ok()?;
        let parent = output.stdout.lines().next().unwrap_or_default().trim();
        if parent.is_empty() {
            break;
        }
        current = format!("/dev/{parent}");
    }

    Some(current)
}
