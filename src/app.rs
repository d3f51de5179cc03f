use std::sync::Arc;

use tracing::{info, warn};
use zeroize::Zeroize;

use crate::core::disk_ops::DeviceInventory;
use crate::core::executor::CredentialPrompt;
use crate::core::formatter::{FormatRequest, Formatter};
use crate::core::progress::{ProgressReporter, TICK_INTERVAL};
use crate::core::{AppState, BlockDevice, FileSystemType, FormatProgress};

/// Room reserved for a typed password. Keys past this are ignored so the
/// buffer never reallocates and leaves a copy behind.
pub const PASSWORD_CAPACITY: usize = 256;

/// Main application state
pub struct App {
    pub devices: Vec<BlockDevice>,
    pub selected_index: usize,
    pub state: AppState,
    pub input_buffer: String,
    pub inventory: Arc<dyn DeviceInventory>,
    pub formatter: Arc<Formatter>,
    pub fs_options: Vec<FileSystemType>,
    pub selected_fs_index: usize,
    pub missing_tools: Vec<FileSystemType>,
    pub should_quit: bool,
    pub tick: u64,
    pub operation_tx: tokio::sync::mpsc::UnboundedSender<AppState>,
    pub operation_rx: tokio::sync::mpsc::UnboundedReceiver<AppState>,
}

impl App {
    pub fn new(inventory: Arc<dyn DeviceInventory>, formatter: Arc<Formatter>) -> Self {
        let (operation_tx, operation_rx) = tokio::sync::mpsc::unbounded_channel();
        Self {
            devices: Vec::new(),
            selected_index: 0,
            state: AppState::Idle,
            input_buffer: String::new(),
            inventory,
            formatter,
            fs_options: FileSystemType::ALL.to_vec(),
            selected_fs_index: 0,
            missing_tools: Vec::new(),
            should_quit: false,
            tick: 0,
            operation_tx,
            operation_rx,
        }
    }

    pub async fn refresh_devices(&mut self) -> Result<(), String> {
        match self.inventory.list_removable_devices().await {
            Ok(devices) => {
                self.devices = devices;
                if self.selected_index >= self.devices.len() {
                    self.selected_index = self.devices.len().saturating_sub(1);
                }
                Ok(())
            }
            Err(e) => {
                self.state = AppState::Error(e.to_string());
                Err(e.to_string())
            }
        }
    }

    /// Applies a message from a background task. Progress estimates that
    /// arrive after the outcome are dropped.
    pub fn apply_update(&mut self, update: AppState) {
        if matches!(update, AppState::Formatting(_))
            && !matches!(self.state, AppState::Formatting(_))
        {
            return;
        }
        self.state = update;
    }

    pub fn is_formatting(&self) -> bool {
        matches!(self.state, AppState::Formatting(_))
    }

    pub fn select_next(&mut self) {
        if !self.devices.is_empty() {
            self.selected_index = (self.selected_index + 1) % self.devices.len();
        }
    }

    pub fn select_previous(&mut self) {
        if !self.devices.is_empty() {
            if self.selected_index == 0 {
                self.selected_index = self.devices.len() - 1;
            } else {
                self.selected_index -= 1;
            }
        }
    }

    pub fn select_next_fs(&mut self) {
        if !self.fs_options.is_empty() {
            self.selected_fs_index = (self.selected_fs_index + 1) % self.fs_options.len();
        }
    }

    pub fn select_previous_fs(&mut self) {
        if !self.fs_options.is_empty() {
            if self.selected_fs_index == 0 {
                self.selected_fs_index = self.fs_options.len() - 1;
            } else {
                self.selected_fs_index -= 1;
            }
        }
    }

    pub fn selected_device(&self) -> Option<&BlockDevice> {
        self.devices.get(self.selected_index)
    }

    pub fn selected_fs(&self) -> Option<FileSystemType> {
        self.fs_options.get(self.selected_fs_index).copied()
    }

    pub fn enter_select_mode(&mut self) {
        if !self.devices.is_empty() {
            self.state = AppState::DeviceSelected(self.selected_index);
        }
    }

    pub fn enter_format_menu(&mut self) {
        self.state = AppState::FormattingMenu;
        self.selected_fs_index = 0;
        self.clear_input();
    }

    pub fn enter_confirm_mode(&mut self) {
        let Some(fs_type) = self.selected_fs() else {
            return;
        };
        if self.missing_tools.contains(&fs_type) {
            self.state = AppState::Error(format!(
                "{} is not installed. Install the {} package first.",
                fs_type.required_tool(),
                fs_type.package()
            ));
            return;
        }
        if let Some(device) = self.selected_device() {
            self.state = AppState::ConfirmDestructive(device.path.clone());
            self.clear_input();
        }
    }

    pub fn cancel(&mut self) {
        self.state = AppState::Idle;
        self.clear_input();
    }

    /// Checks the typed confirmation, then asks for the password
    pub fn confirm_format(&mut self) {
        let AppState::ConfirmDestructive(path) = &self.state else {
            return;
        };
        let path = path.clone();

        if self.formatter.is_protected(&path) {
            self.state = AppState::Error("Cannot format protected system drive".to_string());
            return;
        }

        // Verify confirmation input matches device path
        if self.input_buffer != path {
            self.state = AppState::Error(format!(
                "Confirmation mismatch. Expected '{}', got '{}'",
                path, self.input_buffer
            ));
            self.clear_input();
            return;
        }

        self.clear_input();
        self.input_buffer = String::with_capacity(PASSWORD_CAPACITY);
        self.state = AppState::PasswordEntry(path);
    }

    /// Hands the typed password to a background format task
    pub fn submit_password(&mut self) {
        let AppState::PasswordEntry(path) = &self.state else {
            return;
        };
        let path = path.clone();
        let Some(fs_type) = self.selected_fs() else {
            return;
        };

        let credential =
            match CredentialPrompt::from_input(std::mem::take(&mut self.input_buffer)) {
                CredentialPrompt::Provided(credential) => credential,
                CredentialPrompt::Cancelled => {
                    info!(device = %path, "no password entered");
                    self.state =
                        AppState::Error("Cancelled: no password entered, nothing was changed".to_string());
                    return;
                }
            };

        self.state = AppState::Formatting(FormatProgress {
            device: path.clone(),
            filesystem: fs_type,
            percent: 0,
        });

        let tx = self.operation_tx.clone();
        let formatter = self.formatter.clone();
        let request = FormatRequest::new(path.clone(), fs_type, credential);

        tokio::spawn(async move {
            match formatter.format(request).await {
                Ok(outcome) => {
                    let _ = tx.send(AppState::Success(format!("Success: {}", outcome.message())));
                }
                Err(e) => {
                    warn!(error = %e, "format did not complete");
                    let _ = tx.send(AppState::Error(format!("Failed to format: {e}")));
                }
            }
        });

        let reporter = ProgressReporter::new(self.formatter.state().clone());
        let progress_tx = self.operation_tx.clone();
        tokio::spawn(reporter.run(TICK_INTERVAL, progress_tx, move |update| {
            AppState::Formatting(FormatProgress {
                device: path.clone(),
                filesystem: fs_type,
                percent: update.percent(),
            })
        }));
    }

    pub fn push_input(&mut self, c: char) {
        let secret = matches!(self.state, AppState::PasswordEntry(_));
        if secret && self.input_buffer.len() + c.len_utf8() > self.input_buffer.capacity() {
            return;
        }
        self.input_buffer.push(c);
    }

    /// Removes the last character and zeroes the bytes it occupied
    pub fn pop_input(&mut self) {
        let Some(c) = self.input_buffer.pop() else {
            return;
        };
        let len = self.input_buffer.len();
        let mut bytes = std::mem::take(&mut self.input_buffer).into_bytes();
        bytes.resize(len + c.len_utf8(), 0);
        bytes[len..].zeroize();
        bytes.truncate(len);
        self.input_buffer = String::from_utf8(bytes).unwrap_or_default();
    }

    /// Zeroes whatever was typed (it may have been a password)
    pub fn clear_input(&mut self) {
        self.input_buffer.zeroize();
    }
}
