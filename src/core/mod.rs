pub mod disk_ops;
pub mod executor;
pub mod formatter;
pub mod progress;
pub mod state;
pub mod unmount;

#[cfg(test)]
pub mod testing;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Volume label applied to exFAT volumes
pub const VOLUME_LABEL: &str = "DATA_KILLER";

/// A whole-disk block device eligible for formatting
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDevice {
    pub path: String,
    pub size_label: String,
    pub model: String,
    pub mountpoint: Option<String>,
    pub is_removable: bool,
}

/// Resolves `.`, doubled slashes and symlinks such as by-id aliases to the
/// real device node. A path that cannot be resolved is returned unchanged.
pub fn canonical_device(path: &str) -> String {
    std::fs::canonicalize(path)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| path.to_string())
}

impl BlockDevice {
    /// One-line summary in the form `path | size | model`
    pub fn describe(&self) -> String {
        format!("{} | {} | {}", self.path, self.size_label, self.model)
    }
}

/// Snapshot of a running format shown by the UI
#[derive(Debug, Clone, PartialEq)]
pub struct FormatProgress {
    pub device: String,
    pub filesystem: FileSystemType,
    pub percent: u8,
}

/// Application state machine
#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Idle,
    DeviceSelected(usize),
    FormattingMenu,
    ConfirmDestructive(String),
    PasswordEntry(String),
    Formatting(FormatProgress),
    Error(String),
    Success(String),
}

/// Supported filesystem types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSystemType {
    Fat32,
    ExFat,
}

impl FileSystemType {
    pub const ALL: [FileSystemType; 2] = [FileSystemType::Fat32, FileSystemType::ExFat];

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            FileSystemType::Fat32 => "FAT32",
            FileSystemType::ExFat => "exFAT",
        }
    }

    /// The mkfs binary that creates this filesystem
    pub fn required_tool(&self) -> &'static str {
        match self {
            FileSystemType::Fat32 => "mkfs.fat",
            FileSystemType::ExFat => "mkfs.exfat",
        }
    }

    /// Distribution package that ships `required_tool`
    pub fn package(&self) -> &'static str {
        match self {
            FileSystemType::Fat32 => "dosfstools",
            FileSystemType::ExFat => "exfatprogs",
        }
    }

    /// Full argv that formats the whole-disk node `device`.
    /// No partition table is written first.
    pub fn format_command(&self, device: &str) -> Vec<String> {
        let args: &[&str] = match self {
            FileSystemType::Fat32 => &["-F", "32"],
            FileSystemType::ExFat => &["-n", VOLUME_LABEL],
        };

        std::iter::once(self.required_tool())
            .chain(args.iter().copied())
            .chain(std::iter::once(device))
            .map(str::to_string)
            .collect()
    }
}

impl fmt::Display for FileSystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for FileSystemType {
    type Err = DiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fat32" | "vfat" => Ok(FileSystemType::Fat32),
            "exfat" => Ok(FileSystemType::ExFat),
            other => Err(DiskError::UnsupportedFilesystem(other.to_string())),
        }
    }
}

/// Errors that can occur during disk operations
#[derive(Error, Debug)]
pub enum DiskError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Required tool not found: {0}")]
    NotFound(String),

    #[error("{program} exited with status {exit_code}: {stderr}")]
    Execution {
        program: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Refusing to format protected system disk {0}")]
    SafetyRejection(String),

    #[error("Another format operation is already running")]
    Busy,

    #[error("Device inventory failed: {0}")]
    Inventory(String),

    #[error("Unsupported filesystem: {0}")]
    UnsupportedFilesystem(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_commands_target_whole_disk() {
        assert_eq!(
            FileSystemType::Fat32.format_command("/dev/sdb"),
            vec!["mkfs.fat", "-F", "32", "/dev/sdb"]
        );
        assert_eq!(
            FileSystemType::ExFat.format_command("/dev/sdc"),
            vec!["mkfs.exfat", "-n", "DATA_KILLER", "/dev/sdc"]
        );
    }

    #[test]
    fn test_parse_filesystem() {
        assert_eq!("FAT32".parse::<FileSystemType>().unwrap(), FileSystemType::Fat32);
        assert_eq!("exfat".parse::<FileSystemType>().unwrap(), FileSystemType::ExFat);

        let err = "ntfs".parse::<FileSystemType>().unwrap_err();
        assert!(matches!(err, DiskError::UnsupportedFilesystem(ref fs) if fs == "ntfs"));
    }

    #[test]
    fn test_execution_error_carries_stderr() {
        let err = DiskError::Execution {
            program: "mkfs.fat".to_string(),
            exit_code: 1,
            stderr: "unable to open /dev/sdb".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "mkfs.fat exited with status 1: unable to open /dev/sdb"
        );
    }

    #[test]
    fn test_canonical_device_follows_aliases() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sdb"), b"").unwrap();
        std::os::unix::fs::symlink(dir.path().join("sdb"), dir.path().join("usb-Stick")).unwrap();
        let real = std::fs::canonicalize(dir.path().join("sdb")).unwrap();
        let real = real.to_string_lossy();

        let dotted = format!("{}/./sdb", dir.path().display());
        let doubled = format!("{}//sdb", dir.path().display());
        let alias = dir.path().join("usb-Stick").to_string_lossy().into_owned();
        assert_eq!(canonical_device(&dotted), real);
        assert_eq!(canonical_device(&doubled), real);
        assert_eq!(canonical_device(&alias), real);
        assert_eq!(canonical_device("/nonexistent/sdq"), "/nonexistent/sdq");
    }

    #[test]
    fn test_describe() {
        let device = BlockDevice {
            path: "/dev/sdb".to_string(),
            size_label: "16G".to_string(),
            model: "Kingston".to_string(),
            mountpoint: None,
            is_removable: true,
        };
        assert_eq!(device.describe(), "/dev/sdb | 16G | Kingston");
    }
}
