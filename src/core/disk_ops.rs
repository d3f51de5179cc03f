use async_trait::async_trait;

use super::executor::{CommandOutput, Credential};
use super::{BlockDevice, DiskError};

/// Runs external commands, optionally elevated
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `argv` as the current user and waits for it to exit
    async fn run(&self, argv: &[String]) -> Result<CommandOutput, DiskError>;

    /// Runs `argv` elevated, feeding `credential` to the elevation tool on stdin
    async fn run_privileged(
        &self,
        argv: &[String],
        credential: &Credential,
    ) -> Result<CommandOutput, DiskError>;
}

/// Source of formattable devices
#[async_trait]
pub trait DeviceInventory: Send + Sync {
    /// Scans the system for removable whole-disk devices
    async fn list_removable_devices(&self) -> Result<Vec<BlockDevice>, DiskError>;
}
