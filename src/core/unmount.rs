use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::DiskError;
use super::disk_ops::CommandRunner;
use super::executor::Credential;

/// Unmounts every node of a disk before it gets reformatted
pub struct UnmountCoordinator {
    runner: Arc<dyn CommandRunner>,
    dev_dir: PathBuf,
}

impl UnmountCoordinator {
    pub fn new(runner: Arc<dyn CommandRunner>, dev_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            dev_dir: dev_dir.into(),
        }
    }

    /// The whole-disk node plus each of its numbered partitions, sorted
    pub fn device_nodes(&self, device_path: &str) -> Vec<PathBuf> {
        let Some(base) = Path::new(device_path).file_name().and_then(|n| n.to_str()) else {
            return Vec::new();
        };

        let entries = match fs::read_dir(&self.dev_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dev_dir.display(), error = %e, "cannot list device directory");
                return Vec::new();
            }
        };

        let mut nodes: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| belongs_to_disk(base, name))
            })
            .map(|entry| self.dev_dir.join(entry.file_name()))
            .collect();
        nodes.sort();
        nodes
    }

    /// Best-effort: failures are logged, never returned. A rejected
    /// password stops the loop so sudo is not retried once per partition.
    pub async fn unmount_all(&self, device_path: &str, credential: &Credential) {
        for node in self.device_nodes(device_path) {
            let node = node.to_string_lossy().into_owned();
            let argv = vec!["umount".to_string(), node.clone()];

            match self.runner.run_privileged(&argv, credential).await {
                Ok(_) => info!(node = %node, "unmounted"),
                Err(DiskError::Execution { ref stderr, .. }) if stderr.contains("not mounted") => {
                    debug!(node = %node, "already unmounted");
                }
                Err(DiskError::Authentication(reason)) => {
                    warn!(node = %node, reason = %reason, "password rejected, skipping remaining unmounts");
                    return;
                }
                Err(e) => warn!(node = %node, error = %e, "unmount failed, continuing"),
            }
        }
    }
}

/// `sdb` owns `sdb` and `sdb1`; `nvme0n1` owns `nvme0n1` and `nvme0n1p2`.
/// A sibling such as `sdba` or `nvme0n12` is a different disk.
fn belongs_to_disk(base: &str, name: &str) -> bool {
    let Some(rest) = name.strip_prefix(base) else {
        return false;
    };
    if rest.is_empty() {
        return true;
    }

    let digits = if base.ends_with(|c: char| c.is_ascii_digit()) {
        match rest.strip_prefix('p') {
            Some(digits) => digits,
            None => return false,
        }
    } else {
        rest
    };

    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{RecordingRunner, credential};

    fn fake_dev(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        dir
    }

    #[test]
    fn test_belongs_to_disk() {
        assert!(belongs_to_disk("sdb", "sdb"));
        assert!(belongs_to_disk("sdb", "sdb1"));
        assert!(belongs_to_disk("sdb", "sdb12"));
        assert!(!belongs_to_disk("sdb", "sdba"));
        assert!(!belongs_to_disk("sdb", "sda1"));

        assert!(belongs_to_disk("nvme0n1", "nvme0n1"));
        assert!(belongs_to_disk("nvme0n1", "nvme0n1p2"));
        assert!(!belongs_to_disk("nvme0n1", "nvme0n12"));
        assert!(!belongs_to_disk("nvme0n1", "nvme0n1p"));
    }

    #[test]
    fn test_device_nodes() {
        let dev = fake_dev(&["sda", "sda1", "sdb", "sdb1", "sdb2", "sdba", "null"]);
        let runner = Arc::new(RecordingRunner::new());
        let coordinator = UnmountCoordinator::new(runner, dev.path());

        let nodes = coordinator.device_nodes("/dev/sdb");
        assert_eq!(
            nodes,
            vec![
                dev.path().join("sdb"),
                dev.path().join("sdb1"),
                dev.path().join("sdb2"),
            ]
        );
    }

    #[tokio::test]
    async fn test_unmount_all_swallows_failures() {
        let dev = fake_dev(&["sdb", "sdb1"]);
        let runner = RecordingRunner::new();
        runner.fail("umount", 32, "umount: target is busy.");
        let coordinator = UnmountCoordinator::new(Arc::new(runner.clone()), dev.path());

        coordinator.unmount_all("/dev/sdb", &credential()).await;

        let calls = runner.invocations();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.privileged && c.program() == "umount"));
    }

    #[tokio::test]
    async fn test_rejected_password_stops_after_first_node() {
        let dev = fake_dev(&["sdb", "sdb1", "sdb2"]);
        let runner = RecordingRunner::new();
        runner.reject_credential("umount");
        let coordinator = UnmountCoordinator::new(Arc::new(runner.clone()), dev.path());

        coordinator.unmount_all("/dev/sdb", &credential()).await;

        let calls = runner.invocations();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].argv[1], dev.path().join("sdb").to_string_lossy());
    }

    #[tokio::test]
    async fn test_missing_device_dir_is_tolerated() {
        let runner = RecordingRunner::new();
        let coordinator =
            UnmountCoordinator::new(Arc::new(runner.clone()), "/nonexistent/data-killer-dev");

        coordinator.unmount_all("/dev/sdb", &credential()).await;
        assert_eq!(runner.invocation_count(), 0);
    }
}
