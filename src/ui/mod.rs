pub mod dashboard;
pub mod prompt;

use ratatui::Frame;

use crate::app::App;
use crate::core::AppState;

/// Main draw function that dispatches to appropriate view
pub fn draw(frame: &mut Frame, app: &App) {
    dashboard::draw_dashboard(frame, app);

    match &app.state {
        AppState::Idle | AppState::DeviceSelected(_) => {}
        AppState::FormattingMenu => {
            prompt::draw_format_menu(frame, app);
        }
        AppState::ConfirmDestructive(path) => {
            prompt::draw_confirm_dialog(frame, path, &app.input_buffer);
        }
        AppState::PasswordEntry(_) => {
            prompt::draw_password_dialog(frame, &app.input_buffer);
        }
        AppState::Formatting(progress) => {
            prompt::draw_format_progress(frame, app, progress);
        }
        AppState::Error(msg) => {
            prompt::draw_status_message(frame, msg, prompt::MessageType::Error);
        }
        AppState::Success(msg) => {
            prompt::draw_status_message(frame, msg, prompt::MessageType::Success);
        }
    }
}
