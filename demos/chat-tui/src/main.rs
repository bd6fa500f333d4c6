//! Terminal chat client for an Agentforce agent.
//!
//! Run the broker first, then: cargo run -p chat-tui
//!
//! Configuration is loaded from the broker's `/api/config`. Pass
//! `--host-bridge 127.0.0.1:4000` to stream widget events over a
//! WebSocket at `/host`.

mod app;
mod consent;
mod logging;

use std::{io, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use agentforce_auth::{
    BackendClient,
    backend::{CONFIG_ATTEMPTS, CONFIG_RETRY_DELAY},
    store::{DEFAULT_NAMESPACE, FileCredentialStore},
};
use agentforce_core::{
    DetachedFrame, FrameOutbox, HostFrame, InboundMessage, SEND_FAILURE_REPLY,
    config::OAUTH_CALLBACK_PATH,
};
use agentforce_session::{ChatWidget, MessageError};
use anyhow::Context;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;

use crate::{
    app::{App, Command, Speaker, UiEvent, ui},
    consent::TerminalConsent,
    logging::LogLevel,
};

#[derive(Debug, Parser)]
#[command(name = "chat-tui", about = "Chat with an Agentforce agent from a terminal")]
struct Args {
    /// Base URL of the credential broker.
    #[arg(long, env = "AGENTFORCE_BROKER_URL", default_value = "http://localhost:3000")]
    broker_url: String,

    /// Redirect URI registered with the identity provider.
    #[arg(long, env = "AGENTFORCE_REDIRECT_URI")]
    redirect_uri: Option<String>,

    /// Serve the host bridge on this address.
    #[arg(long)]
    host_bridge: Option<SocketAddr>,

    /// Where credentials persist between runs.
    #[arg(long)]
    store_dir: Option<PathBuf>,

    #[arg(long, default_value = "chat-tui.log")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut log_level = LogLevel::init(&args.log_file)?;

    eprintln!("Loading configuration from {}...", args.broker_url);
    let backend = Arc::new(BackendClient::new(args.broker_url.clone()));
    let remote = backend
        .load_config(CONFIG_ATTEMPTS, CONFIG_RETRY_DELAY)
        .await
        .context("broker did not provide a configuration")?;
    let redirect_uri = args.redirect_uri.clone().unwrap_or_else(|| {
        format!(
            "{}{OAUTH_CALLBACK_PATH}",
            args.broker_url.trim_end_matches('/')
        )
    });
    let config = remote
        .into_widget_config(redirect_uri)
        .context("incomplete widget configuration")?;
    log_level.set_debug(config.debug);
    let theme = config.theme.clone();

    let (ui_tx, ui_rx) = mpsc::unbounded_channel();
    let consent = Arc::new(TerminalConsent::new(ui_tx.clone()));
    let store_dir = args
        .store_dir
        .clone()
        .unwrap_or_else(FileCredentialStore::default_dir);

    let (host_tx, host_rx) = mpsc::unbounded_channel::<InboundMessage>();
    let frame: Arc<dyn HostFrame> = match args.host_bridge {
        Some(addr) => {
            let outbox = Arc::new(FrameOutbox::new());
            let bridge = agentforce_transport::host_bridge_router(outbox.clone(), host_tx);
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind host bridge on {addr}"))?;
            tracing::info!("host bridge listening on ws://{addr}/host");
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, bridge).await {
                    tracing::error!("host bridge stopped: {e}");
                }
            });
            outbox
        }
        None => Arc::new(DetachedFrame),
    };

    let widget = Arc::new(
        ChatWidget::builder(config)
            .store(Arc::new(FileCredentialStore::new(store_dir, DEFAULT_NAMESPACE)))
            .broker(backend)
            .launcher(consent.clone())
            .frame(frame)
            .build()?,
    );

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(
        &mut terminal,
        App::new(theme),
        &widget,
        &consent,
        &mut log_level,
        ui_tx,
        Inbox {
            ui: ui_rx,
            host: host_rx,
        },
    )
    .await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    consent.cancel();
    widget.cleanup().await;

    result
}

/// Background results and host-page messages feeding the UI loop.
struct Inbox {
    ui: mpsc::UnboundedReceiver<UiEvent>,
    host: mpsc::UnboundedReceiver<InboundMessage>,
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    widget: &Arc<ChatWidget>,
    consent: &TerminalConsent,
    log_level: &mut LogLevel,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
    mut inbox: Inbox,
) -> anyhow::Result<()> {
    spawn_connect(widget, &ui_tx);

    loop {
        while let Ok(event) = inbox.ui.try_recv() {
            handle_ui_event(&mut app, event);
        }
        while let Ok(message) = inbox.host.try_recv() {
            let config = widget.handle_host_message(message);
            log_level.set_debug(config.debug);
            app.theme = config.theme.clone();
        }
        app.lifecycle = widget.lifecycle();

        terminal.draw(|f| ui(f, &app))?;

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        match key {
            KeyEvent {
                code: KeyCode::Char('c'),
                modifiers: KeyModifiers::CONTROL,
                ..
            } => return Ok(()),
            KeyEvent {
                code: KeyCode::F(2),
                ..
            } => {
                app.minimized = !app.minimized;
                widget.set_minimized(app.minimized);
            }
            _ if app.minimized => {}
            KeyEvent {
                code: KeyCode::Char(c),
                modifiers: KeyModifiers::NONE | KeyModifiers::SHIFT,
                ..
            } => app.input.push(c),
            KeyEvent {
                code: KeyCode::Backspace,
                ..
            } => {
                app.input.pop();
            }
            KeyEvent {
                code: KeyCode::Up, ..
            } => app.scroll_up(),
            KeyEvent {
                code: KeyCode::Down,
                ..
            } => app.scroll_down(),
            KeyEvent {
                code: KeyCode::Enter,
                ..
            } => {
                let input = std::mem::take(&mut app.input);
                match Command::parse(&input) {
                    Some(Command::Quit) => return Ok(()),
                    Some(command) => run_command(&mut app, command, widget, consent, &ui_tx),
                    None => {}
                }
            }
            _ => {}
        }
    }
}

fn run_command(
    app: &mut App,
    command: Command,
    widget: &Arc<ChatWidget>,
    consent: &TerminalConsent,
    ui_tx: &mpsc::UnboundedSender<UiEvent>,
) {
    match command {
        Command::Send(text) => {
            if app.busy {
                app.push(Speaker::System, "Still waiting for the agent.");
                return;
            }
            app.push(Speaker::User, text.clone());
            app.busy = true;
            let widget = Arc::clone(widget);
            let tx = ui_tx.clone();
            tokio::spawn(async move {
                let reply = match widget.send(&text).await {
                    Ok(reply) => Ok(reply.display_text().to_string()),
                    Err(MessageError::InvalidInput(reason)) => Err(reason),
                    Err(e) => {
                        tracing::warn!("send failed: {e}");
                        Err(SEND_FAILURE_REPLY.to_string())
                    }
                };
                let _ = tx.send(UiEvent::Reply(reply));
            });
        }
        Command::Code(url) => match consent.complete(&url) {
            Ok(()) => app.push(Speaker::System, "Authorization received."),
            Err(e) => app.push(Speaker::System, format!("Cannot use that URL: {e}")),
        },
        Command::Cancel => {
            if consent.cancel() {
                app.push(Speaker::System, "Authorization cancelled.");
            } else {
                app.push(Speaker::System, "No authorization in progress.");
            }
        }
        Command::End => {
            let widget = Arc::clone(widget);
            let tx = ui_tx.clone();
            tokio::spawn(async move {
                widget.end_session().await;
                let _ = tx.send(UiEvent::SessionEnded);
            });
        }
        Command::Unknown(name) => app.push(Speaker::System, format!("Unknown command /{name}")),
        Command::Quit => {}
    }
}

fn spawn_connect(widget: &Arc<ChatWidget>, ui_tx: &mpsc::UnboundedSender<UiEvent>) {
    let widget = Arc::clone(widget);
    let tx = ui_tx.clone();
    tokio::spawn(async move {
        let result = widget.connect().await.map_err(|e| e.to_string());
        let _ = tx.send(UiEvent::Connected(result));
    });
}

fn handle_ui_event(app: &mut App, event: UiEvent) {
    match event {
        UiEvent::ConsentRequested(url) => {
            app.push(Speaker::System, "Sign-in required. Open this URL in a browser:");
            app.push(Speaker::System, url);
            app.push(
                Speaker::System,
                "Then paste the URL you were redirected to as /code <url>, or /cancel.",
            );
        }
        UiEvent::Connected(Ok(greeting)) => {
            app.busy = false;
            app.push(Speaker::Agent, greeting);
        }
        UiEvent::Connected(Err(e)) => {
            app.busy = false;
            app.push(Speaker::System, format!("Could not connect: {e}"));
            app.push(Speaker::System, "Send a message to try again.");
        }
        UiEvent::Reply(Ok(text)) => {
            app.busy = false;
            app.push(Speaker::Agent, text);
        }
        UiEvent::Reply(Err(text)) => {
            app.busy = false;
            app.push(Speaker::System, text);
        }
        UiEvent::SessionEnded => app.push(Speaker::System, "Session ended."),
    }
}
