//! Terminal chat state and rendering.

use agentforce_core::{LifecycleState, ThemeConfig};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

/// Results of background widget calls.
#[derive(Debug)]
pub enum UiEvent {
    /// The interactive flow needs the user to visit this URL.
    ConsentRequested(String),
    Connected(Result<String, String>),
    Reply(Result<String, String>),
    SessionEnded,
}

/// A line typed into the input box.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Code(String),
    Cancel,
    End,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        let Some(rest) = input.strip_prefix('/') else {
            return Some(Self::Send(input.to_string()));
        };
        let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
        Some(match name {
            "code" => Self::Code(arg.trim().to_string()),
            "cancel" => Self::Cancel,
            "end" => Self::End,
            "quit" | "exit" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Agent,
    System,
}

pub struct App {
    pub transcript: Vec<(Speaker, String)>,
    pub input: String,
    pub scroll: u16,
    pub busy: bool,
    pub minimized: bool,
    pub lifecycle: LifecycleState,
    pub theme: ThemeConfig,
}

impl App {
    pub fn new(theme: ThemeConfig) -> Self {
        Self {
            transcript: vec![(Speaker::System, "Connecting...".to_string())],
            input: String::new(),
            scroll: 0,
            busy: true,
            minimized: false,
            lifecycle: LifecycleState::Unauthenticated,
            theme,
        }
    }

    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.transcript.push((speaker, text.into()));
        // Keep the newest lines in view.
        let visible = 20u16;
        let len = u16::try_from(self.transcript.len()).unwrap_or(u16::MAX);
        self.scroll = len.saturating_sub(visible);
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.scroll = self.scroll.saturating_add(1);
    }

    fn status(&self) -> (&'static str, Color) {
        match self.lifecycle {
            LifecycleState::Unauthenticated => ("Not signed in", Color::Yellow),
            LifecycleState::Authenticating => ("Signing in...", Color::Yellow),
            LifecycleState::Authenticated => ("Signed in", Color::Cyan),
            LifecycleState::SessionActive => ("Connected", Color::Green),
            LifecycleState::Ended => ("Ended", Color::Red),
        }
    }
}

pub fn ui(f: &mut Frame, app: &App) {
    if app.minimized {
        let bar = Paragraph::new(Line::from(vec![
            Span::styled(
                format!(" {} ", app.theme.header_title),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("| "),
            Span::styled("F2", Style::default().fg(Color::Yellow)),
            Span::raw(" open "),
        ]));
        f.render_widget(bar, f.area());
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    let lines: Vec<Line> = app
        .transcript
        .iter()
        .map(|(speaker, text)| {
            let (label, color) = match speaker {
                Speaker::User => ("you", Color::Yellow),
                Speaker::Agent => ("agent", Color::Green),
                Speaker::System => ("*", Color::DarkGray),
            };
            Line::from(vec![
                Span::styled(format!("{label}: "), Style::default().fg(color)),
                Span::raw(text.as_str()),
            ])
        })
        .collect();

    let transcript = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(app.theme.header_title.as_str()),
        )
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));
    f.render_widget(transcript, chunks[0]);

    let title = if app.busy { "Message (waiting...)" } else { "Message" };
    let input = Paragraph::new(app.input.as_str())
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(input, chunks[1]);

    let cursor = u16::try_from(app.input.chars().count()).unwrap_or(u16::MAX);
    f.set_cursor_position((
        chunks[1].x.saturating_add(cursor).saturating_add(1),
        chunks[1].y + 1,
    ));

    let (status, color) = app.status();
    let bar = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(status, Style::default().fg(color)),
        Span::raw(" | "),
        Span::styled("Ctrl+C", Style::default().fg(Color::Yellow)),
        Span::raw(" quit | "),
        Span::styled("F2", Style::default().fg(Color::Yellow)),
        Span::raw(" minimize | "),
        Span::styled("/code /cancel /end", Style::default().fg(Color::Yellow)),
        Span::raw(" "),
    ]));
    f.render_widget(bar, chunks[2]);
}
