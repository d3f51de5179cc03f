mod app;
mod cli;
mod core;
mod logging;
mod platform;
mod ui;
mod utils;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use tracing::{error, info};

use crate::app::App;
use crate::cli::{Cli, Commands};
use crate::core::AppState;
use crate::core::disk_ops::DeviceInventory;
use crate::core::formatter::Formatter;
use crate::core::state::OperationState;
use crate::core::unmount::UnmountCoordinator;
use crate::platform::linux::{DEV_DIR, missing_tools};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "data-killer starting");

    let runner = platform::get_runner();
    let inventory = platform::get_inventory(runner.clone());
    let protected = platform::protected_disks(runner.as_ref(), &cli.protect).await;
    let formatter = Arc::new(Formatter::new(
        runner.clone(),
        UnmountCoordinator::new(runner, DEV_DIR),
        Arc::new(OperationState::new()),
        protected,
    ));

    match cli.command {
        Some(Commands::List) => cli::list(inventory.as_ref()).await,
        Some(Commands::Check) => cli::check(),
        Some(Commands::Format(args)) => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            cli::format(formatter, inventory.as_ref(), args, stdin).await
        }
        None => run_interactive(inventory, formatter).await,
    }
}

async fn run_interactive(
    inventory: Arc<dyn DeviceInventory>,
    formatter: Arc<Formatter>,
) -> anyhow::Result<()> {
    // Safety check: Validate terminal size BEFORE entering raw mode or alternate screen.
    let (cols, rows) = crossterm::terminal::size()?;
    if cols == 0 || rows == 0 || cols > 1000 || rows > 1000 {
        anyhow::bail!(
            "Invalid terminal size detected ({}x{}). Please ensure you're running in a valid terminal.",
            cols,
            rows
        );
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(inventory, formatter);

    app.missing_tools = missing_tools();
    if !app.missing_tools.is_empty() {
        let names: Vec<String> = app
            .missing_tools
            .iter()
            .map(|fs| format!("{} ({})", fs.required_tool(), fs.package()))
            .collect();
        app.state = AppState::Error(format!(
            "Missing tools: {}. Install them to format with that filesystem.",
            names.join(", ")
        ));
    }

    let _ = app.refresh_devices().await;

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        error!(error = %e, "terminal UI stopped");
    }
    result
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> anyhow::Result<()> {
    loop {
        app.tick = app.tick.wrapping_add(1);

        // Drain results and progress from background tasks
        while let Ok(update) = app.operation_rx.try_recv() {
            let succeeded = matches!(update, AppState::Success(_));
            app.apply_update(update);
            if succeeded {
                let _ = app.refresh_devices().await;
            }
        }

        terminal.draw(|f| ui::draw(f, app))?;

        // Poll for events with timeout for tick
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                match &app.state {
                    AppState::Idle => handle_idle_input(app, key.code).await,
                    AppState::DeviceSelected(_) => handle_selected_input(app, key.code),
                    AppState::FormattingMenu => handle_format_menu_input(app, key.code),
                    AppState::ConfirmDestructive(_) => handle_confirm_input(app, key.code),
                    AppState::PasswordEntry(_) => handle_password_input(app, key.code),
                    // No abort once mkfs runs
                    AppState::Formatting(_) => {}
                    AppState::Error(_) | AppState::Success(_) => {
                        handle_message_input(app, key.code)
                    }
                }

                if app.should_quit {
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_idle_input(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Up => app.select_previous(),
        KeyCode::Down => app.select_next(),
        KeyCode::Enter => app.enter_select_mode(),
        KeyCode::Char('r') => {
            let _ = app.refresh_devices().await;
        }
        _ => {}
    }
}

fn handle_selected_input(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Esc => app.cancel(),
        KeyCode::Up => app.select_previous(),
        KeyCode::Down => app.select_next(),
        KeyCode::Char('f') => app.enter_format_menu(),
        _ => {}
    }
}

fn handle_format_menu_input(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Esc => app.cancel(),
        KeyCode::Up => app.select_previous_fs(),
        KeyCode::Down => app.select_next_fs(),
        KeyCode::Enter => app.enter_confirm_mode(),
        _ => {}
    }
}

fn handle_confirm_input(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Esc => app.cancel(),
        KeyCode::Enter => app.confirm_format(),
        KeyCode::Backspace => app.pop_input(),
        KeyCode::Char(c) => app.push_input(c),
        _ => {}
    }
}

fn handle_password_input(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Esc => app.cancel(),
        KeyCode::Enter => app.submit_password(),
        KeyCode::Backspace => app.pop_input(),
        KeyCode::Char(c) => app.push_input(c),
        _ => {}
    }
}

fn handle_message_input(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Esc | KeyCode::Enter => app.cancel(),
        _ => {}
    }
}
