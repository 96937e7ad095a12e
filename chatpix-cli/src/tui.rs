//! Full-screen terminal chat window

use anyhow::Result;
use chatpix_agent::{DisplayEvent, DisplayKind, Router, Turn};
use chatpix_core::Conversation;
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use std::io;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Work handed from the window to the conversation worker
enum Request {
    Submit(String),
    NewConversation,
}

/// Results handed back from the worker
enum Update {
    Turn(Turn),
    ConversationReset,
}

struct ChatApp {
    input: String,
    timeline: Vec<DisplayEvent>,
    /// Submissions sent to the worker and not answered yet
    pending: usize,
    should_quit: bool,
    /// Lines scrolled back from the newest line; 0 follows the conversation
    scroll_back: usize,
    model: String,
}

/// Lines moved by PageUp/PageDown
const PAGE_LINES: usize = 10;

impl ChatApp {
    fn new(model: String) -> Self {
        Self {
            input: String::new(),
            timeline: vec![DisplayEvent::new(
                DisplayKind::Notice,
                "Welcome to chatpix. Enter to send. /new /clear /quit",
            )],
            pending: 0,
            should_quit: false,
            scroll_back: 0,
            model,
        }
    }

    fn push(&mut self, event: DisplayEvent) {
        self.timeline.push(event);
        self.scroll_back = 0;
    }

    /// Timeline wrapped to `width` columns, one entry per screen row
    fn timeline_lines(&self, width: usize) -> Vec<Line<'static>> {
        self.timeline
            .iter()
            .flat_map(|event| {
                let style = Style::default().fg(color_for(event.kind));
                wrap_text(&event.text, width)
                    .into_iter()
                    .map(move |row| Line::styled(row, style))
            })
            .collect()
    }

    /// Take the input line; returns work for the worker, if any
    fn submit(&mut self) -> Option<Request> {
        let content = self.input.trim().to_string();
        self.input.clear();
        if content.is_empty() {
            return None;
        }

        match content.as_str() {
            "/quit" => {
                self.should_quit = true;
                None
            }
            "/clear" => {
                self.timeline.clear();
                self.scroll_back = 0;
                None
            }
            "/new" => Some(Request::NewConversation),
            _ => {
                // The echo goes up right away; the reply follows from the worker.
                self.push(DisplayEvent::user(&content));
                self.pending += 1;
                Some(Request::Submit(content))
            }
        }
    }

    fn apply_update(&mut self, update: Update) {
        match update {
            Update::Turn(turn) => {
                self.pending = self.pending.saturating_sub(1);
                for event in turn.reply_events() {
                    self.push(event);
                }
            }
            Update::ConversationReset => {
                self.push(DisplayEvent::new(
                    DisplayKind::Notice,
                    "Started a new conversation.",
                ));
            }
        }
    }
}

/// Run turns strictly one after another against a single conversation
fn spawn_worker(
    router: Router,
    system_prompt: String,
    mut requests: mpsc::UnboundedReceiver<Request>,
    updates: mpsc::UnboundedSender<Update>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut conversation = Conversation::new(system_prompt.clone());
        while let Some(request) = requests.recv().await {
            let update = match request {
                Request::Submit(text) => match router.route(&mut conversation, &text).await {
                    Some(turn) => Update::Turn(turn),
                    None => continue,
                },
                Request::NewConversation => {
                    debug!(
                        "Dropping conversation with {} messages",
                        conversation.len()
                    );
                    conversation = Conversation::new(system_prompt.clone());
                    Update::ConversationReset
                }
            };
            if updates.send(update).is_err() {
                break;
            }
        }
        debug!("Conversation worker stopped");
    })
}

/// Hard-wrap text at `width` characters, keeping explicit line breaks
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut rows = Vec::new();
    for line in text.split('\n') {
        let chars: Vec<char> = line.chars().collect();
        if width == 0 || chars.is_empty() {
            rows.push(line.to_string());
            continue;
        }
        rows.extend(chars.chunks(width).map(|chunk| chunk.iter().collect::<String>()));
    }
    rows
}

/// Tail of the input that fits a box `width` cells wide, plus the cursor column
///
/// One cell stays free for the cursor after the last character.
fn input_view(input: &str, width: u16) -> (String, u16) {
    let inner = width.saturating_sub(2) as usize;
    let room = inner.saturating_sub(1);
    let count = input.chars().count();
    let skip = count.saturating_sub(room);
    let shown: String = input.chars().skip(skip).collect();
    let cursor = (count - skip).min(room) as u16;
    (shown, cursor)
}

fn color_for(kind: DisplayKind) -> Color {
    match kind {
        DisplayKind::User => Color::Cyan,
        DisplayKind::Assistant => Color::Green,
        DisplayKind::Image => Color::Magenta,
        DisplayKind::Notice => Color::Yellow,
        DisplayKind::Error => Color::Red,
    }
}

/// Open the chat window and block until the user quits
pub async fn run(router: Router, system_prompt: String) -> Result<()> {
    let model = router.settings().chat_model.clone();
    let (request_tx, request_rx) = mpsc::unbounded_channel::<Request>();
    let (update_tx, update_rx) = mpsc::unbounded_channel::<Update>();
    let worker = spawn_worker(router, system_prompt, request_rx, update_tx);

    let mut stdout = io::stdout();
    enable_raw_mode()?;
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, ChatApp::new(model), request_tx, update_rx);

    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // An in-flight request is abandoned on quit.
    worker.abort();
    info!("Chat window closed");
    result
}

fn draw(frame: &mut Frame, app: &mut ChatApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let status = if app.pending > 0 {
        "waiting for reply"
    } else {
        "idle"
    };
    frame.render_widget(
        Paragraph::new(format!("model: {} | status: {}", app.model, status))
            .block(Block::default().borders(Borders::ALL).title("chatpix")),
        chunks[0],
    );

    // The newest line sits at the bottom unless the user scrolled back.
    let inner_width = chunks[1].width.saturating_sub(2) as usize;
    let inner_height = chunks[1].height.saturating_sub(2) as usize;
    let lines = app.timeline_lines(inner_width);
    let bottom = lines.len().saturating_sub(inner_height);
    app.scroll_back = app.scroll_back.min(bottom);
    let visible: Vec<Line> = lines
        .into_iter()
        .skip(bottom - app.scroll_back)
        .take(inner_height)
        .collect();
    frame.render_widget(
        Paragraph::new(visible)
            .block(Block::default().borders(Borders::ALL).title("conversation")),
        chunks[1],
    );

    let (shown, cursor) = input_view(&app.input, chunks[2].width);
    frame.render_widget(
        Paragraph::new(shown).block(Block::default().borders(Borders::ALL).title("message")),
        chunks[2],
    );
    frame.set_cursor_position((chunks[2].x + 1 + cursor, chunks[2].y + 1));
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: ChatApp,
    request_tx: mpsc::UnboundedSender<Request>,
    mut update_rx: mpsc::UnboundedReceiver<Update>,
) -> Result<()> {
    loop {
        while let Ok(update) = update_rx.try_recv() {
            app.apply_update(update);
        }

        terminal.draw(|frame| draw(frame, &mut app))?;

        if event::poll(std::time::Duration::from_millis(60))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        app.should_quit = true;
                    }
                    KeyCode::Esc => app.should_quit = true,
                    KeyCode::Up => app.scroll_back = app.scroll_back.saturating_add(1),
                    KeyCode::PageUp => {
                        app.scroll_back = app.scroll_back.saturating_add(PAGE_LINES);
                    }
                    KeyCode::Down => app.scroll_back = app.scroll_back.saturating_sub(1),
                    KeyCode::PageDown => {
                        app.scroll_back = app.scroll_back.saturating_sub(PAGE_LINES);
                    }
                    KeyCode::Enter => {
                        if let Some(request) = app.submit() {
                            if request_tx.send(request).is_err() {
                                app.pending = 0;
                                app.push(DisplayEvent::new(
                                    DisplayKind::Error,
                                    "Conversation worker is gone; restart chatpix.",
                                ));
                            }
                        }
                    }
                    KeyCode::Backspace => {
                        app.input.pop();
                    }
                    KeyCode::Char(ch) => {
                        app.input.push(ch);
                    }
                    _ => {}
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
