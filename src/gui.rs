use crate::{
    alert::{Alert, Notifier, Severity},
    api::Backend,
    control::{ButtonState, Command, Controller, FormField, Outcome, WithdrawForm},
    display::Display,
    snapshot::StatusSnapshot,
    stream::{ReadyState, StatusStream, StreamEvent},
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self, disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::{
    io,
    sync::mpsc::{self, Receiver, Sender},
    thread,
    time::{Duration, Instant},
};
use tui::{
    backend::{Backend as TuiBackend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame, Terminal,
};

const MAX_LOG_LINES: usize = 100;
const REDRAW_INTERVAL: Duration = Duration::from_millis(250);

/// Smallest terminal that fits the hashrate, balance and status regions.
pub const MIN_WIDTH: u16 = 60;
pub const MIN_HEIGHT: u16 = 20;

/// Refuse to start on a terminal that cannot host the required regions.
///
/// Call this before log output is routed into the dashboard, so the refusal
/// still reaches stderr.
pub fn check_terminal_size() -> io::Result<()> {
    let (width, height) = terminal::size()?;
    ensure_fits(width, height)
}

fn ensure_fits(width: u16, height: u16) -> io::Result<()> {
    if width < MIN_WIDTH || height < MIN_HEIGHT {
        return Err(io::Error::other(format!(
            "terminal is {}x{}, dashboard needs at least {}x{}",
            width, height, MIN_WIDTH, MIN_HEIGHT
        )));
    }
    Ok(())
}

enum Flow {
    Continue,
    Quit,
}

pub struct Gui {
    log_rx: Receiver<String>,
    log_messages: Vec<String>,
    stream: StatusStream,
    controller: Controller<dyn Backend>,
    outcome_tx: Sender<(Command, Outcome)>,
    outcome_rx: Receiver<(Command, Outcome)>,
    snapshot: StatusSnapshot,
    running: bool,
    last_update: Option<String>,
    notifier: Notifier,
    start_button: ButtonState,
    stop_button: ButtonState,
    submit_button: ButtonState,
    form: WithdrawForm,
    focus: Option<FormField>,
    backend_url: String,
}

impl Gui {
    pub fn new(
        log_rx: Receiver<String>,
        stream: StatusStream,
        controller: Controller<dyn Backend>,
        notifier: Notifier,
        seed: Option<StatusSnapshot>,
        backend_url: String,
    ) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::channel();
        let snapshot = seed.unwrap_or_default();
        Self {
            log_rx,
            log_messages: Vec::new(),
            stream,
            controller,
            outcome_tx,
            outcome_rx,
            running: snapshot.running,
            last_update: snapshot.ts.map(Display::format_timestamp),
            snapshot,
            notifier,
            start_button: ButtonState::start(),
            stop_button: ButtonState::stop(),
            submit_button: ButtonState::submit(),
            form: WithdrawForm::default(),
            focus: None,
            backend_url,
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_app(&mut terminal);

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn run_app(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
        let mut last_update = Instant::now();
        terminal.draw(|f| self.ui(f))?;

        loop {
            while let Ok(msg) = self.log_rx.try_recv() {
                self.add_log_message(msg);
            }

            if self.stream.try_reconnect_signal().is_ok() {
                self.stream.reconnect();
            }
            while let Ok(event) = self.stream.try_recv_event() {
                self.apply_stream_event(event);
            }

            while let Ok((command, outcome)) = self.outcome_rx.try_recv() {
                self.apply_outcome(&command, outcome);
            }

            let now = Instant::now();
            self.notifier.expire(now);

            let mut dirty = now.duration_since(last_update) >= REDRAW_INTERVAL;
            if event::poll(Duration::from_millis(10))? {
                if let Event::Key(key) = event::read()? {
                    if let Flow::Quit = self.handle_key(key) {
                        self.stream.close();
                        return Ok(());
                    }
                }
                dirty = true;
            }

            if dirty {
                terminal.draw(|f| self.ui(f))?;
                last_update = now;
            }
        }
    }

    fn apply_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Opened => self.add_log_message("Status stream connected.".into()),
            StreamEvent::Snapshot(snapshot) => {
                self.running = snapshot.running;
                self.last_update = Some(match snapshot.ts {
                    Some(ts) => Display::format_timestamp(ts),
                    None => chrono::Local::now().format("%H:%M:%S").to_string(),
                });
                self.snapshot = snapshot;
            }
            StreamEvent::Error(reason) => {
                self.add_log_message(format!("Connection lost: {}. Reconnecting shortly...", reason));
            }
        }
    }

    fn apply_outcome(&mut self, command: &Command, outcome: Outcome) {
        self.button_mut(command).finish();
        if let Some(running) = outcome.running {
            self.running = running;
        }
        if outcome.clear_form {
            self.form.reset();
            self.focus = None;
        }
        if let Some(alert) = outcome.alert {
            self.notifier.show(alert);
        }
    }

    fn button_mut(&mut self, command: &Command) -> &mut ButtonState {
        match command {
            Command::Start => &mut self.start_button,
            Command::Stop => &mut self.stop_button,
            Command::Withdraw(_) => &mut self.submit_button,
        }
    }

    /// Run a command off the draw thread. Ignored while the same control is
    /// still waiting on a previous call.
    fn dispatch(&mut self, command: Command) {
        if !self.button_mut(&command).begin() {
            return;
        }
        let controller = self.controller.clone();
        let outcome_tx = self.outcome_tx.clone();
        thread::spawn(move || {
            let outcome = controller.run(&command);
            let _ = outcome_tx.send((command, outcome));
        });
    }

    fn handle_key(&mut self, key: KeyEvent) -> Flow {
        if key.kind != KeyEventKind::Press {
            return Flow::Continue;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        if let Some(field) = self.focus {
            match key.code {
                KeyCode::Esc => self.focus = None,
                KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                    self.focus = Some(match field {
                        FormField::Address => FormField::Amount,
                        FormField::Amount => FormField::Address,
                    });
                }
                KeyCode::Backspace => {
                    self.form.field_mut(field).pop();
                }
                KeyCode::Enter => self.dispatch(Command::Withdraw(self.form.clone())),
                KeyCode::Char(c) => self.form.field_mut(field).push(c),
                _ => {}
            }
            return Flow::Continue;
        }

        match key.code {
            KeyCode::Char('q') => return Flow::Quit,
            KeyCode::Char('s') => self.dispatch(Command::Start),
            KeyCode::Char('x') => self.dispatch(Command::Stop),
            KeyCode::Char('w') | KeyCode::Tab => self.focus = Some(FormField::Address),
            KeyCode::Char('d') | KeyCode::Esc => self.notifier.dismiss(),
            _ => {}
        }
        Flow::Continue
    }

    fn ui<B: TuiBackend>(&self, f: &mut Frame<B>) {
        let area = f.size();
        if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
            let placeholder = Paragraph::new("Terminal too small for the dashboard, please enlarge it.")
                .style(Style::default().fg(Color::Yellow))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });
            f.render_widget(placeholder, area);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints(
                [
                    Constraint::Length(2),      // Banner
                    Constraint::Min(10),        // Main content
                    Constraint::Percentage(30), // Log output
                    Constraint::Length(1),      // Footer
                ]
                .as_ref(),
            )
            .split(area);

        let banner = Paragraph::new(format!("MineDash v0.1.0 - {}", self.backend_url))
            .style(Style::default().fg(Color::Cyan))
            .alignment(Alignment::Center);
        f.render_widget(banner, chunks[0]);

        let alert_height = if self.notifier.current().is_some() { 3 } else { 0 };
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(alert_height), Constraint::Min(0)].as_ref())
            .split(chunks[1]);

        if let Some(alert) = self.notifier.current() {
            f.render_widget(alert_widget(alert), main_chunks[0]);
        }

        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
            .split(main_chunks[1]);

        f.render_widget(self.stats_widget(), panes[0]);
        f.render_widget(self.controls_widget(), panes[1]);

        let log_spans: Vec<Spans> = self
            .log_messages
            .iter()
            .rev()
            .take(MAX_LOG_LINES)
            .map(|s| {
                let span = if s.contains("ERROR") || s.contains("WARN") {
                    Span::styled(s.as_str(), Style::default().fg(Color::Red))
                } else {
                    Span::raw(s.as_str())
                };
                Spans::from(span)
            })
            .collect();
        let log_widget = Paragraph::new(log_spans)
            .block(Block::default().title("Log").borders(Borders::ALL))
            .wrap(Wrap { trim: true });
        f.render_widget(log_widget, chunks[2]);

        let footer = Paragraph::new(
            "[s] start  [x] stop  [w] withdraw  [Tab] next field  [Enter] submit  [Esc] dismiss  [q] quit",
        )
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
        f.render_widget(footer, chunks[3]);
    }

    fn stats_widget(&self) -> Table<'_> {
        let status = if self.running {
            Span::styled(
                format!("● {}", Display::status_label(true)),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(format!("○ {}", Display::status_label(false)), Style::default().fg(Color::Red))
        };
        let stream = match self.stream.ready_state() {
            ReadyState::Open => Span::styled("connected", Style::default().fg(Color::Green)),
            ReadyState::Connecting => Span::styled("connecting...", Style::default().fg(Color::Yellow)),
            ReadyState::Closed => Span::styled("disconnected", Style::default().fg(Color::Red)),
        };

        let rows = vec![
            Row::new(vec![
                Cell::from("Hash Rate"),
                Cell::from(Display::format_hash_rate(self.snapshot.hashrate)),
            ]),
            Row::new(vec![
                Cell::from("Balance"),
                Cell::from(format!("{} BTC", Display::format_balance(self.snapshot.balance))),
            ]),
            Row::new(vec![Cell::from("Status"), Cell::from(status)]),
            Row::new(vec![Cell::from("Stream"), Cell::from(stream)]),
            Row::new(vec![
                Cell::from("Last Update"),
                Cell::from(self.last_update.clone().unwrap_or_else(|| "--:--:--".into())),
            ]),
        ];

        Table::new(rows)
            .header(Row::new(vec!["Metric", "Value"]).style(Style::default().fg(Color::Yellow)))
            .block(Block::default().title("Mining Stats").borders(Borders::ALL))
            .widths(&[Constraint::Percentage(40), Constraint::Percentage(60)])
    }

    fn controls_widget(&self) -> Paragraph<'_> {
        let button = |key: &'static str, state: &ButtonState| {
            let style = if state.is_enabled() {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Spans::from(vec![Span::raw(format!("[{}] ", key)), Span::styled(state.label(), style)])
        };
        let field = |name: &'static str, value: &str, focused: bool| {
            let style = if focused {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default()
            };
            let cursor = if focused { "▏" } else { "" };
            Spans::from(vec![
                Span::raw(format!("{:<9}", name)),
                Span::styled(format!("{}{}", value, cursor), style),
            ])
        };

        let lines = vec![
            button("s", &self.start_button),
            button("x", &self.stop_button),
            Spans::from(""),
            Spans::from(Span::styled("Withdraw", Style::default().add_modifier(Modifier::UNDERLINED))),
            field("Address:", &self.form.to_address, self.focus == Some(FormField::Address)),
            field("Amount:", &self.form.amount, self.focus == Some(FormField::Amount)),
            button("Enter", &self.submit_button),
        ];

        Paragraph::new(lines)
            .block(Block::default().title("Controls").borders(Borders::ALL))
            .wrap(Wrap { trim: false })
    }

    fn add_log_message(&mut self, msg: String) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        for line in msg.lines() {
            if !line.trim().is_empty() {
                self.log_messages.push(format!("{} {}", stamp, line));
            }
        }
        if self.log_messages.len() > MAX_LOG_LINES {
            let drain = self.log_messages.len() - MAX_LOG_LINES;
            self.log_messages.drain(0..drain);
        }
    }
}

fn alert_widget(alert: &Alert) -> Paragraph<'_> {
    let color = match alert.severity {
        Severity::Success => Color::Green,
        Severity::Error => Color::Red,
        Severity::Warning => Color::Yellow,
        Severity::Info => Color::Cyan,
    };
    Paragraph::new(Spans::from(vec![
        Span::raw(format!("{} ", alert.severity.icon())),
        Span::styled(alert.message.as_str(), Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled("   [Esc] ×", Style::default().fg(Color::DarkGray)),
    ]))
    .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(color)))
}
