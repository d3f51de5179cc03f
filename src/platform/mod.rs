#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(not(target_os = "linux"))]
compile_error!("data-killer relies on lsblk and /dev/disk/by-id and only builds on Linux");

use std::sync::Arc;

use tracing::{info, warn};

use crate::core::disk_ops::{CommandRunner, DeviceInventory};
use crate::core::canonical_device;
use crate::core::formatter::DEFAULT_SYSTEM_DISK;

/// Process runner for the current platform
pub fn get_runner() -> Arc<dyn CommandRunner> {
    Arc::new(linux::SudoRunner::new())
}

/// Device inventory for the current platform
pub fn get_inventory(runner: Arc<dyn CommandRunner>) -> Arc<dyn DeviceInventory> {
    Arc::new(linux::LinuxInventory::new(runner))
}

/// Disks the formatter must never touch: the historical system disk,
/// whatever disk currently backs `/`, and anything passed on the command line.
/// Entries are resolved to their real device nodes.
pub async fn protected_disks(runner: &dyn CommandRunner, extra: &[String]) -> Vec<String> {
    let mut protected = vec![DEFAULT_SYSTEM_DISK.to_string()];

    match linux::root_disk(runner).await {
        Some(root) => {
            info!(disk = %root, "root filesystem disk protected");
            protected.push(root);
        }
        None => warn!("could not resolve the root disk, only static protections apply"),
    }

    protected.extend(extra.iter().cloned());
    let mut protected: Vec<String> = protected.iter().map(|p| canonical_device(p)).collect();
    protected.sort();
    protected.dedup();
    protected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::RecordingRunner;

    #[tokio::test]
    async fn test_protected_disks_merge_sources() {
        let runner = RecordingRunner::new();
        runner.respond_to(&["findmnt", "-n", "-o", "SOURCE", "/"], "/dev/sda2\n");
        runner.respond_to(&["lsblk", "-d", "-n", "-o", "PKNAME", "/dev/sda2"], "sda\n");

        let protected = protected_disks(&runner, &["/dev/sdz".to_string()]).await;
        assert_eq!(protected, vec!["/dev/sda", "/dev/sdz"]);
    }

    #[tokio::test]
    async fn test_protected_aliases_resolve_to_real_node() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nvme0n1"), b"").unwrap();
        std::os::unix::fs::symlink(dir.path().join("nvme0n1"), dir.path().join("nvme-Samsung_980"))
            .unwrap();
        let alias = dir.path().join("nvme-Samsung_980").to_string_lossy().into_owned();
        let real = canonical_device(&dir.path().join("nvme0n1").to_string_lossy());

        let protected = protected_disks(&RecordingRunner::new(), &[alias]).await;
        assert!(protected.contains(&real));
    }
}
