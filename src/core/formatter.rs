use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::disk_ops::CommandRunner;
use super::executor::{Credential, CredentialPrompt};
use super::state::OperationState;
use super::unmount::UnmountCoordinator;
use super::{DiskError, FileSystemType, canonical_device};

/// Disk assumed to hold the running system when nothing better is known
pub const DEFAULT_SYSTEM_DISK: &str = "/dev/sda";

/// One operator-initiated format, consumed by `Formatter::format`
#[derive(Debug)]
pub struct FormatRequest {
    pub device: String,
    pub filesystem: FileSystemType,
    pub credential: Credential,
}

impl FormatRequest {
    pub fn new(device: impl Into<String>, filesystem: FileSystemType, credential: Credential) -> Self {
        Self {
            device: device.into(),
            filesystem,
            credential,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormatSuccess {
    pub device: String,
    pub filesystem: FileSystemType,
}

impl FormatSuccess {
    pub fn message(&self) -> String {
        format!("{} formatted as {}", self.device, self.filesystem)
    }
}

/// Runs the unmount → mkfs sequence against a single disk.
///
/// There is no abort once mkfs is dispatched. A failure part way through
/// leaves the disk with an undefined filesystem.
pub struct Formatter {
    runner: Arc<dyn CommandRunner>,
    unmounter: UnmountCoordinator,
    state: Arc<OperationState>,
    protected: Vec<String>,
}

impl Formatter {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        unmounter: UnmountCoordinator,
        state: Arc<OperationState>,
        protected: Vec<String>,
    ) -> Self {
        let protected = protected.iter().map(|p| canonical_device(p)).collect();
        Self {
            runner,
            unmounter,
            state,
            protected,
        }
    }

    pub fn state(&self) -> &Arc<OperationState> {
        &self.state
    }

    /// Compares resolved nodes, so `/dev/./sda` or a by-id link to a
    /// protected disk is protected too
    pub fn is_protected(&self, device: &str) -> bool {
        let device = canonical_device(device);
        self.protected.iter().any(|p| *p == device)
    }

    /// Entry point fed by the credential prompt. A cancelled prompt spawns
    /// nothing and leaves the operation state alone.
    pub async fn format_prompted(
        &self,
        device: &str,
        filesystem: FileSystemType,
        prompt: CredentialPrompt,
    ) -> Result<FormatSuccess, DiskError> {
        match prompt {
            CredentialPrompt::Provided(credential) => {
                self.format(FormatRequest::new(device, filesystem, credential))
                    .await
            }
            CredentialPrompt::Cancelled => {
                info!(device = %device, "credential prompt cancelled");
                Err(DiskError::Cancelled)
            }
        }
    }

    pub async fn format(&self, request: FormatRequest) -> Result<FormatSuccess, DiskError> {
        let FormatRequest {
            device,
            filesystem,
            credential,
        } = request;

        let requested = device;
        let device = canonical_device(&requested);
        if requested != device {
            debug!(requested = %requested, device = %device, "resolved device alias");
        }

        if self.protected.contains(&device) {
            warn!(device = %device, "refusing to format protected disk");
            return Err(DiskError::SafetyRejection(requested));
        }

        if let Err(e) = self.state.try_begin() {
            warn!(device = %device, "format requested while another is running");
            return Err(e);
        }

        info!(device = %device, filesystem = %filesystem, "format started");

        self.unmounter.unmount_all(&device, &credential).await;

        let argv = filesystem.format_command(&device);
        let result = self.runner.run_privileged(&argv, &credential).await;
        drop(credential);

        match result {
            Ok(_) => {
                self.state.complete();
                info!(device = %device, filesystem = %filesystem, "format finished");
                Ok(FormatSuccess { device, filesystem })
            }
            Err(e) => {
                self.state.reset();
                error!(device = %device, filesystem = %filesystem, error = %e, "format failed");
                Err(e)
            }
        }
    }
}
