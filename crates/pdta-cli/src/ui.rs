//! TUI implementation for pdta-assist

use std::time::Instant;

use crossterm::event::{Event, EventStream, MouseEventKind};
use futures::StreamExt;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};

use pdta_agent::AgentSession;
use pdta_runtime::{Message, Role};
use pdta_tui::{
    Theme,
    input::{Action, key_to_action},
    widgets::{ChatMessage, InputBox, MessageList, Spinner, calculate_message_height},
};

/// Display-only greeting, shown above the conversation. Never part of
/// the transcript sent to the runtime.
pub const WELCOME_MESSAGE: &str = "Ciao 👋

Sono qui per aiutarti a interpretare il PDTA sulle lesioni polmonari.

Per iniziare, potresti fornirmi alcune informazioni sul contesto clinico del paziente? Ad esempio:

- Qual è la sintomatologia attuale del paziente?
- Ha una storia di fattori di rischio per il carcinoma polmonare (fumo, esposizione a sostanze nocive, ecc.)?
- Quali indagini diagnostiche sono state già effettuate?
- Quali sono i risultati delle indagini finora condotte?

Queste informazioni mi aiuteranno a comprendere meglio il caso e a fornire un'interpretazione adeguata dell'estratto del PDTA.";

/// What the idle event loop should do after an action
#[derive(Debug, PartialEq, Eq)]
pub enum UiCommand {
    None,
    /// Submit a user turn
    Submit(String),
    /// Clear the conversation
    Clear,
    /// Flip blocking/streaming mode
    ToggleStreaming,
    /// Leave the application
    Quit,
}

/// TUI application state: a read-only view over the session transcript
/// plus display-only chrome (welcome banner, transient apologies)
pub struct TuiState {
    /// Rendered chat messages
    messages: Vec<ChatMessage>,
    /// Input box
    input: InputBox,
    /// Current scroll position
    scroll: usize,
    /// Whether an exchange is in flight
    is_processing: bool,
    /// Whether replies are streamed
    streaming: bool,
    /// Current status message
    status: String,
    /// Theme
    theme: Theme,
    /// Model label for the title and status bar
    model_label: String,
    /// Spinner start time for animation
    spinner_start: Instant,
}

impl TuiState {
    pub fn new(theme: Theme, streaming: bool, model_label: impl Into<String>) -> Self {
        let mut input = InputBox::new().with_placeholder("Scrivi un messaggio...");
        input.set_focused(true);

        Self {
            messages: vec![ChatMessage::assistant(WELCOME_MESSAGE)],
            input,
            scroll: 0,
            is_processing: false,
            streaming,
            status: "Pronto".to_string(),
            theme,
            model_label: model_label.into(),
            spinner_start: Instant::now(),
        }
    }

    /// Rebuild the display from the session transcript. The welcome
    /// banner is re-added on top; it lives only in the view.
    pub fn sync_from_transcript(&mut self, transcript: &[Message]) {
        self.messages.clear();
        self.messages.push(ChatMessage::assistant(WELCOME_MESSAGE));
        for msg in transcript {
            let rendered = match msg.role {
                Role::User => ChatMessage::user(&msg.content),
                Role::Assistant => ChatMessage::assistant(&msg.content),
            };
            self.messages.push(rendered);
        }
        self.scroll_to_bottom();
    }

    /// Record a user turn and an empty streaming placeholder in the view
    pub fn begin_exchange(&mut self, user_text: &str) {
        self.is_processing = true;
        self.spinner_start = Instant::now();
        self.status = "In attesa della risposta...".to_string();
        self.messages.push(ChatMessage::user(user_text));
        self.messages.push(ChatMessage::assistant_streaming(""));
        self.scroll_to_bottom();
    }

    /// Append a streamed fragment to the in-progress message
    pub fn push_fragment(&mut self, delta: &str) {
        if let Some(last) = self.messages.last_mut() {
            if last.is_streaming {
                last.content.push_str(delta);
            }
        }
        self.scroll_to_bottom();
    }

    /// Show a transient apology that is not part of the transcript
    pub fn show_apology(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::apology(content));
        self.scroll_to_bottom();
    }

    pub fn end_exchange(&mut self) {
        self.is_processing = false;
        self.status = "Pronto".to_string();
    }

    pub fn streaming(&self) -> bool {
        self.streaming
    }

    fn scroll_to_bottom(&mut self) {
        // Resolved against content height during render
        self.scroll = usize::MAX;
    }

    /// Handle a keyboard action while idle
    pub fn handle_action(&mut self, action: Action, width: u16) -> UiCommand {
        match action {
            Action::Submit => {
                let content = self.input.take();
                if content.trim().is_empty() || self.is_processing {
                    UiCommand::None
                } else {
                    UiCommand::Submit(content)
                }
            }
            Action::Quit | Action::Interrupt | Action::Eof => UiCommand::Quit,
            // Esc only cancels an in-flight exchange; while idle a
            // reflexive press must not drop the session
            Action::Escape => UiCommand::None,
            Action::Clear => UiCommand::Clear,
            Action::ToggleStreaming => UiCommand::ToggleStreaming,
            Action::ScrollUp => {
                self.scroll = self.scroll.saturating_sub(1);
                UiCommand::None
            }
            Action::ScrollDown => {
                self.scroll = self.scroll.saturating_add(1);
                UiCommand::None
            }
            Action::PageUp => {
                self.scroll = self.scroll.saturating_sub(10);
                UiCommand::None
            }
            Action::PageDown => {
                self.scroll = self.scroll.saturating_add(10);
                UiCommand::None
            }
            action => {
                self.input.handle_action(&action, width);
                UiCommand::None
            }
        }
    }

    /// Flip streaming mode and surface it in the status line
    pub fn toggle_streaming(&mut self) {
        self.streaming = !self.streaming;
        self.status = if self.streaming {
            "Streaming attivo".to_string()
        } else {
            "Streaming disattivato".to_string()
        };
    }

    /// Reset the view after the conversation was cleared
    pub fn clear_display(&mut self) {
        self.messages.clear();
        self.messages.push(ChatMessage::assistant(WELCOME_MESSAGE));
        self.scroll = 0;
        self.status = "Cronologia cancellata".to_string();
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Render the UI
    pub fn render(&mut self, frame: &mut Frame) {
        let size = frame.area();

        // Layout: messages (flex), status bar (1), input (3)
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(3),
            ])
            .split(size);

        self.render_messages(frame, chunks[0]);
        self.render_status(frame, chunks[1]);
        self.input.render(chunks[2], frame.buffer_mut(), &self.theme);
    }

    fn render_messages(&mut self, frame: &mut Frame, area: Rect) {
        let title = format!(" Assistente PDTA │ {} ", self.model_label);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style())
            .title(title);

        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.height == 0 || inner.width == 0 {
            return;
        }

        let content_height = calculate_message_height(&self.messages, inner.width as usize);

        if self.scroll == usize::MAX {
            // Auto-scroll to bottom
            self.scroll = content_height.saturating_sub(inner.height as usize);
        } else {
            self.scroll = self
                .scroll
                .min(content_height.saturating_sub(inner.height as usize));
        }

        let message_list = MessageList::new(&self.messages, &self.theme).scroll(self.scroll);
        frame.render_widget(message_list, inner);

        if content_height > inner.height as usize {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .track_symbol(Some("│"))
                .thumb_symbol("█");

            let mut scrollbar_state = ScrollbarState::new(content_height)
                .position(self.scroll)
                .viewport_content_length(inner.height as usize);

            frame.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
        }
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        if self.is_processing {
            let spinner =
                Spinner::new(&self.status, &self.theme).with_start_time(self.spinner_start);
            frame.render_widget(spinner, area);
            return;
        }

        let mode = if self.streaming { "on" } else { "off" };
        let left_content = format!("{} │ {} │ streaming: {}", self.model_label, self.status, mode);
        let right_content = "Ctrl+T: streaming │ Ctrl+L: pulisci │ Ctrl+C: esci";

        let left_width = left_content.chars().count();
        let right_width = right_content.chars().count();
        let available = area.width as usize;

        let line = if left_width + right_width + 2 <= available {
            let spacing = available - left_width - right_width;
            Line::from(vec![
                Span::styled(&left_content, self.theme.dim_style()),
                Span::raw(" ".repeat(spacing)),
                Span::styled(right_content, Style::default().fg(Color::DarkGray)),
            ])
        } else {
            Line::from(Span::styled(&left_content, self.theme.dim_style()))
        };

        frame.render_widget(Paragraph::new(line), area);
    }
}

/// Run the TUI application
pub async fn run_tui(
    session: &mut AgentSession,
    streaming: bool,
    theme: Theme,
) -> anyhow::Result<()> {
    use crossterm::{
        execute,
        terminal::{EnterAlternateScreen, enable_raw_mode},
    };
    use ratatui::{Terminal, backend::CrosstermBackend};
    use std::io;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let model_label = session.definition().model.clone();
    let mut state = TuiState::new(theme, streaming, model_label);

    let mut event_stream = EventStream::new();

    // Tick for smooth spinner animation
    let mut tick_interval = tokio::time::interval(std::time::Duration::from_millis(80));

    // Queued user turn, processed at the top of the next iteration so the
    // submission future can borrow the session for its whole lifetime
    let mut pending_prompt: Option<String> = None;

    let result = loop {
        if let Some(content) = pending_prompt.take() {
            state.begin_exchange(&content);

            // Taken before submitting so cancel does not need the session
            let cancel_handle = session.cancel_handle();
            let turns_before = session.transcript().len();

            let mut quit = false;
            let mut last_chunk: Option<String> = None;

            if state.streaming() {
                let reply = session.submit_streaming(&content);
                tokio::pin!(reply);

                loop {
                    terminal.draw(|frame| state.render(frame))?;
                    let area_width = terminal.size()?.width;

                    tokio::select! {
                        biased;

                        chunk = reply.next() => {
                            match chunk {
                                Some(delta) => {
                                    state.push_fragment(&delta);
                                    last_chunk = Some(delta);
                                }
                                None => break,
                            }
                        }

                        event = event_stream.next() => {
                            if handle_busy_event(event, &mut state, &cancel_handle, area_width) {
                                quit = true;
                                break;
                            }
                        }

                        _ = tick_interval.tick() => {}
                    }
                }
            } else {
                let call = session.submit_blocking(&content);
                tokio::pin!(call);

                loop {
                    terminal.draw(|frame| state.render(frame))?;
                    let area_width = terminal.size()?.width;

                    tokio::select! {
                        biased;

                        _reply = &mut call => break,

                        event = event_stream.next() => {
                            if handle_busy_event(event, &mut state, &cancel_handle, area_width) {
                                quit = true;
                                break;
                            }
                        }

                        _ = tick_interval.tick() => {}
                    }
                }
            }

            if quit {
                break Ok(());
            }

            // A streaming failure or cancellation leaves only the user
            // turn recorded; keep the apology visible in the view
            let failed = session.transcript().len() == turns_before + 1;
            state.sync_from_transcript(session.transcript());
            if failed {
                if let Some(apology) = last_chunk.filter(|c| c.starts_with("Sorry")) {
                    state.show_apology(apology);
                }
            }
            state.end_exchange();

            terminal.draw(|frame| state.render(frame))?;
            continue;
        }

        terminal.draw(|frame| state.render(frame))?;
        let area_width = terminal.size()?.width;

        tokio::select! {
            event = event_stream.next() => {
                match event {
                    Some(Ok(Event::Key(key))) => {
                        match state.handle_action(key_to_action(key), area_width) {
                            UiCommand::Submit(content) => {
                                pending_prompt = Some(content);
                            }
                            UiCommand::Clear => {
                                session.reset();
                                state.clear_display();
                            }
                            UiCommand::ToggleStreaming => {
                                state.toggle_streaming();
                            }
                            UiCommand::Quit => break Ok(()),
                            UiCommand::None => {}
                        }
                    }
                    Some(Ok(Event::Paste(text))) => {
                        state.handle_action(Action::Paste(text), area_width);
                    }
                    Some(Ok(Event::Mouse(mouse))) => {
                        match mouse.kind {
                            MouseEventKind::ScrollUp => {
                                state.scroll = state.scroll.saturating_sub(3);
                            }
                            MouseEventKind::ScrollDown => {
                                state.scroll = state.scroll.saturating_add(3);
                            }
                            _ => {}
                        }
                    }
                    Some(Ok(Event::Resize(_, _))) => {}
                    Some(Err(e)) => {
                        break Err(anyhow::anyhow!("Event error: {}", e));
                    }
                    None => break Ok(()),
                    _ => {}
                }
            }

            _ = tick_interval.tick() => {}
        }
    };

    restore_terminal(&mut terminal)?;
    result
}

/// Handle a terminal event while an exchange is in flight. Returns true
/// when the user asked to quit.
fn handle_busy_event(
    event: Option<std::io::Result<Event>>,
    state: &mut TuiState,
    cancel_handle: &tokio_util::sync::CancellationToken,
    area_width: u16,
) -> bool {
    match event {
        Some(Ok(Event::Key(key))) => {
            match key_to_action(key) {
                Action::Interrupt | Action::Escape => {
                    cancel_handle.cancel();
                    state.set_status("Annullamento...");
                }
                Action::Quit => return true,
                // Typing stays responsive during processing
                action => {
                    state.input.handle_action(&action, area_width);
                }
            }
            false
        }
        Some(Ok(Event::Paste(text))) => {
            state.input.handle_action(&Action::Paste(text), area_width);
            false
        }
        Some(Err(_)) | None => true,
        _ => false,
    }
}

fn restore_terminal(
    terminal: &mut ratatui::Terminal<ratatui::backend::CrosstermBackend<std::io::Stdout>>,
) -> anyhow::Result<()> {
    use crossterm::{
        execute,
        terminal::{LeaveAlternateScreen, disable_raw_mode},
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_keeps_welcome_on_top() {
        let mut state = TuiState::new(Theme::dark(), true, "gpt-4o-mini");
        let transcript = vec![
            Message::user("domanda"),
            Message::assistant("risposta"),
        ];
        state.sync_from_transcript(&transcript);

        assert_eq!(state.messages.len(), 3);
        assert_eq!(state.messages[0].content, WELCOME_MESSAGE);
        assert_eq!(state.messages[1].content, "domanda");
        assert_eq!(state.messages[2].content, "risposta");
    }

    #[test]
    fn test_clear_display_restores_welcome_only() {
        let mut state = TuiState::new(Theme::dark(), true, "gpt-4o-mini");
        state.sync_from_transcript(&[Message::user("domanda")]);
        state.clear_display();

        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].content, WELCOME_MESSAGE);
    }

    #[test]
    fn test_toggle_streaming_flips_mode() {
        let mut state = TuiState::new(Theme::dark(), true, "gpt-4o-mini");
        state.toggle_streaming();
        assert!(!state.streaming());
        state.toggle_streaming();
        assert!(state.streaming());
    }

    #[test]
    fn test_fragments_accumulate_in_streaming_placeholder() {
        let mut state = TuiState::new(Theme::dark(), true, "gpt-4o-mini");
        state.begin_exchange("domanda");
        state.push_fragment("ri");
        state.push_fragment("sposta");

        let last = state.messages.last().unwrap();
        assert!(last.is_streaming);
        assert_eq!(last.content, "risposta");
    }

    #[test]
    fn test_idle_escape_does_not_quit() {
        let mut state = TuiState::new(Theme::dark(), true, "gpt-4o-mini");
        for c in "bozza".chars() {
            state.handle_action(Action::Char(c), 80);
        }
        assert_eq!(state.handle_action(Action::Escape, 80), UiCommand::None);
    }

    #[test]
    fn test_submit_blocked_while_processing() {
        let mut state = TuiState::new(Theme::dark(), true, "gpt-4o-mini");
        state.begin_exchange("prima");
        for c in "seconda".chars() {
            state.handle_action(Action::Char(c), 80);
        }
        assert_eq!(state.handle_action(Action::Submit, 80), UiCommand::None);
    }
}
