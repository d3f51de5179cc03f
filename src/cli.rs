use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::info;

use crate::core::disk_ops::DeviceInventory;
use crate::core::executor::CredentialPrompt;
use crate::core::formatter::{FormatSuccess, Formatter};
use crate::core::progress::{ProgressReporter, TICK_INTERVAL};
use crate::core::{DiskError, FileSystemType, canonical_device};
use crate::platform::linux::missing_tools;

#[derive(Parser, Debug)]
#[command(
    name = "data-killer",
    version,
    about = "Reformat USB drives to FAT32 or exFAT without touching internal disks",
    long_about = "Lists disks attached over USB and reformats one of them.\n\
                  Without a subcommand an interactive terminal UI starts."
)]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Additional disk that must never be formatted (repeatable)
    #[arg(long = "protect", value_name = "PATH", global = true)]
    pub protect: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List USB disks as `path | size | model`
    List,

    /// Report missing mkfs tools
    Check,

    /// Format a disk without the interactive UI
    Format(FormatArgs),
}

#[derive(Args, Debug)]
pub struct FormatArgs {
    /// Whole-disk device node, e.g. /dev/sdb
    pub device: String,

    /// fat32 or exfat
    #[arg(short, long, value_parser = parse_filesystem)]
    pub filesystem: FileSystemType,

    /// Confirm that all data on the device will be erased
    #[arg(long)]
    pub yes: bool,

    /// Read the sudo password from the first line of stdin
    #[arg(long)]
    pub password_stdin: bool,
}

fn parse_filesystem(s: &str) -> Result<FileSystemType, String> {
    s.parse().map_err(|e: DiskError| e.to_string())
}

pub async fn list(inventory: &dyn DeviceInventory) -> anyhow::Result<()> {
    let devices = inventory.list_removable_devices().await?;
    if devices.is_empty() {
        println!("No removable USB devices found");
        return Ok(());
    }
    for device in devices {
        println!("{}", device.describe());
    }
    Ok(())
}

pub fn check() -> anyhow::Result<()> {
    let missing = missing_tools();
    if missing.is_empty() {
        println!("All format tools are installed");
        return Ok(());
    }

    let names: Vec<String> = missing
        .iter()
        .map(|fs| format!("{} (package {})", fs.required_tool(), fs.package()))
        .collect();
    bail!("Missing tools: {}", names.join(", "))
}

pub async fn format<R>(
    formatter: Arc<Formatter>,
    inventory: &dyn DeviceInventory,
    args: FormatArgs,
    input: R,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let outcome = run_format(formatter, inventory, args, input).await?;
    println!("Success: {}", outcome.message());
    Ok(())
}

/// Only disks the USB inventory reports can be formatted headless, the
/// same set the interactive UI offers
async fn run_format<R>(
    formatter: Arc<Formatter>,
    inventory: &dyn DeviceInventory,
    args: FormatArgs,
    input: R,
) -> anyhow::Result<FormatSuccess>
where
    R: AsyncBufRead + Unpin,
{
    if !args.yes {
        bail!(
            "Refusing to erase {} without --yes. All data on it will be lost.",
            args.device
        );
    }
    if !args.password_stdin {
        bail!("--password-stdin is required; the password is never taken from arguments");
    }

    let target = canonical_device(&args.device);
    let devices = inventory.list_removable_devices().await?;
    if !devices.iter().any(|d| canonical_device(&d.path) == target) {
        bail!(
            "{} is not a USB disk. Run `data-killer list` to see the disks that can be formatted.",
            args.device
        );
    }

    let prompt = read_credential(input).await?;
    info!(device = %args.device, filesystem = %args.filesystem, "headless format requested");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let reporter = ProgressReporter::new(formatter.state().clone());
    let progress = tokio::spawn(reporter.run(TICK_INTERVAL, tx, |update| update));

    let filesystem = args.filesystem;
    let device = args.device;
    let task = tokio::spawn(async move {
        formatter
            .format_prompted(&device, filesystem, prompt)
            .await
    });

    while let Some(update) = rx.recv().await {
        eprint!("\rFormatting... {:>3}%", update.percent());
    }
    eprintln!();
    progress.await.context("progress reporter stopped unexpectedly")?;

    match task.await.context("format task stopped unexpectedly")? {
        Ok(outcome) => Ok(outcome),
        Err(e) => bail!("Failed to format: {e}"),
    }
}

/// One line of input. An empty line means the operator backed out.
async fn read_credential<R>(mut input: R) -> anyhow::Result<CredentialPrompt>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    input
        .read_line(&mut line)
        .await
        .context("failed to read password from stdin")?;

    let len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(len);
    Ok(CredentialPrompt::from_input(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::disk_ops::CommandRunner;
    use crate::core::state::{OperationSnapshot, OperationState};
    use crate::core::testing::{RecordingRunner, StaticInventory, usb};
    use crate::core::unmount::UnmountCoordinator;

    fn formatter_with(runner: &RecordingRunner) -> Arc<Formatter> {
        let shared: Arc<dyn CommandRunner> = Arc::new(runner.clone());
        Arc::new(Formatter::new(
            shared.clone(),
            UnmountCoordinator::new(shared, "/nonexistent/data-killer-dev"),
            Arc::new(OperationState::new()),
            vec!["/dev/sda".to_string()],
        ))
    }

    fn args(device: &str) -> FormatArgs {
        FormatArgs {
            device: device.to_string(),
            filesystem: FileSystemType::ExFat,
            yes: true,
            password_stdin: true,
        }
    }

    #[tokio::test]
    async fn test_device_outside_inventory_is_refused() {
        let runner = RecordingRunner::new();
        let inventory = StaticInventory(vec![usb("/dev/sdb")]);

        let err = run_format(
            formatter_with(&runner),
            &inventory,
            args("/dev/nvme1n1"),
            &b"hunter2\n"[..],
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("not a USB disk"), "{err}");
        assert_eq!(runner.invocation_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_flags_are_refused() {
        let runner = RecordingRunner::new();
        let inventory = StaticInventory(vec![usb("/dev/sdb")]);

        let without_yes = FormatArgs {
            yes: false,
            ..args("/dev/sdb")
        };
        let err = run_format(formatter_with(&runner), &inventory, without_yes, &b"x\n"[..])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--yes"));

        let without_stdin = FormatArgs {
            password_stdin: false,
            ..args("/dev/sdb")
        };
        let err = run_format(formatter_with(&runner), &inventory, without_stdin, &b"x\n"[..])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--password-stdin"));

        assert_eq!(runner.invocation_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_password_line_cancels() {
        let runner = RecordingRunner::new();
        let formatter = formatter_with(&runner);
        let inventory = StaticInventory(vec![usb("/dev/sdb")]);

        let err = run_format(formatter.clone(), &inventory, args("/dev/sdb"), &b"\n"[..])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Operation cancelled"), "{err}");
        assert_eq!(runner.invocation_count(), 0);
        assert_eq!(formatter.state().snapshot(), OperationSnapshot::default());
    }

    #[tokio::test]
    async fn test_inventory_device_is_formatted() {
        let runner = RecordingRunner::new();
        let formatter = formatter_with(&runner);
        let inventory = StaticInventory(vec![usb("/dev/sdb")]);

        let outcome = run_format(formatter.clone(), &inventory, args("/dev/sdb"), &b"hunter2\n"[..])
            .await
            .unwrap();

        assert_eq!(outcome.filesystem, FileSystemType::ExFat);
        let calls = runner.invocations();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program(), "mkfs.exfat");
        assert!(calls[0].privileged);
        assert_eq!(formatter.state().snapshot().percent, 100);
    }

    #[tokio::test]
    async fn test_read_credential_strips_line_ending() {
        match read_credential(&b"hunter2\r\nignored\n"[..]).await.unwrap() {
            CredentialPrompt::Provided(credential) => assert_eq!(credential.expose(), "hunter2"),
            CredentialPrompt::Cancelled => panic!("password was dropped"),
        }
        assert!(matches!(
            read_credential(&b""[..]).await.unwrap(),
            CredentialPrompt::Cancelled
        ));
    }

    #[test]
    fn test_parse_format_command() {
        let cli = Cli::parse_from([
            "data-killer",
            "--protect",
            "/dev/sdz",
            "format",
            "/dev/sdb",
            "--filesystem",
            "exfat",
            "--yes",
            "--password-stdin",
        ]);

        assert_eq!(cli.protect, vec!["/dev/sdz"]);
        match cli.command {
            Some(Commands::Format(args)) => {
                assert_eq!(args.device, "/dev/sdb");
                assert_eq!(args.filesystem, FileSystemType::ExFat);
                assert!(args.yes);
                assert!(args.password_stdin);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_filesystem_is_rejected() {
        let result = Cli::try_parse_from(["data-killer", "format", "/dev/sdb", "-f", "ntfs"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_no_subcommand_starts_ui() {
        let cli = Cli::parse_from(["data-killer"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
    }
}
