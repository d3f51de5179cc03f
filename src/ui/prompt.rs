use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
};

use crate::app::App;
use crate::core::FormatProgress;
use crate::utils::mask;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub enum MessageType {
    Success,
    Error,
}

/// Draw the filesystem selection menu
pub fn draw_format_menu(frame: &mut Frame, app: &App) {
    let area = centered_rect(40, 30, frame.area());

    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Select Filesystem ")
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let items: Vec<ListItem> = app
        .fs_options
        .iter()
        .enumerate()
        .map(|(i, fs)| {
            let style = if i == app.selected_fs_index {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD | Modifier::REVERSED)
            } else if app.missing_tools.contains(fs) {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            ListItem::new(fs.display_name()).style(style)
        })
        .collect();

    frame.render_widget(List::new(items), inner);
}

/// Draw confirmation dialog for the destructive format
pub fn draw_confirm_dialog(frame: &mut Frame, device_path: &str, input: &str) {
    let area = centered_rect(60, 40, frame.area());

    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" ⚠️  CONFIRM FORMAT ")
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Red));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(2),
        Constraint::Length(3),
        Constraint::Min(1),
    ])
    .split(inner);

    let warning = Paragraph::new(Line::from(vec![
        Span::styled(
            "WARNING: ",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        Span::raw("This will PERMANENTLY ERASE all data!"),
    ]));
    frame.render_widget(warning, chunks[0]);

    let instruction = Paragraph::new(format!("Type '{}' to confirm:", device_path))
        .style(Style::default().fg(Color::Yellow));
    frame.render_widget(instruction, chunks[1]);

    let input_display = Paragraph::new(input).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Input ")
            .style(Style::default().fg(Color::White)),
    );
    frame.render_widget(input_display, chunks[2]);
}

/// Draw the sudo password prompt, input masked
pub fn draw_password_dialog(frame: &mut Frame, input: &str) {
    let area = centered_rect(50, 30, frame.area());

    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Authentication ")
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(3),
        Constraint::Min(1),
    ])
    .split(inner);

    frame.render_widget(Paragraph::new("Enter your sudo password:"), chunks[0]);

    let input_display = Paragraph::new(mask(input)).block(
        Block::default()
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::White)),
    );
    frame.render_widget(input_display, chunks[1]);

    let footer = Paragraph::new("Enter to format, Esc to cancel")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[2]);
}

pub fn draw_format_progress(frame: &mut Frame, app: &App, progress: &FormatProgress) {
    let area = centered_rect(60, 25, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Formatting... ")
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .split(inner);

    let spinner = SPINNER_FRAMES[app.tick as usize % SPINNER_FRAMES.len()];
    let info = Paragraph::new(format!(
        "{} {} → {}",
        spinner, progress.device, progress.filesystem
    ))
    .alignment(Alignment::Center);
    frame.render_widget(info, chunks[0]);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::NONE))
        .gauge_style(Style::default().fg(Color::Green))
        .percent(u16::from(progress.percent.min(100)))
        .label(format!("{}%", progress.percent));
    frame.render_widget(gauge, chunks[1]);

    let note = Paragraph::new("Do not unplug the device")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(note, chunks[2]);
}

/// Draw status messages
pub fn draw_status_message(frame: &mut Frame, message: &str, msg_type: MessageType) {
    let area = centered_rect(60, 40, frame.area());

    frame.render_widget(Clear, area);

    let (title, color) = match msg_type {
        MessageType::Success => (" Success ", Color::Green),
        MessageType::Error => (" Error ", Color::Red),
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .style(Style::default().fg(color));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(inner);

    let text = Paragraph::new(message)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(color));
    frame.render_widget(text, chunks[0]);

    let footer = Paragraph::new("Press Esc/Enter to dismiss")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[1]);
}

/// Helper to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(r);
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    area
}
