use crate::{
    abi::{
        self,
        Word,
    },
    app::{
        AppView,
        Notice,
    },
    decoder::ActionOutcome,
    format::{
        PPM_DENOMINATOR,
        explorer_tx_url,
        format_ether,
        format_ppm_percent,
        parse_ether,
    },
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::event::{
    self,
    Event,
    KeyCode,
    KeyEventKind,
};
use crossterm::terminal::{
    disable_raw_mode,
    enable_raw_mode,
};
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::io::stdout;
use tokio::sync::mpsc;

pub type InputEventReceiver = mpsc::UnboundedReceiver<std::io::Result<Event>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Redraw,
    Connect,
    Disconnect,
    Refresh,
    Play {
        salt: Word,
    },
    Claim,
    Fund {
        amount_wei: u128,
    },
    Withdraw {
        amount_wei: u128,
    },
    SetParams {
        prize_wei: u128,
        entry_fee_wei: u128,
        win_chance_ppm: u32,
    },
}

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    is_owner: bool,
    can_play: bool,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AmountKind {
    Fund,
    Withdraw,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    QuitModal,
    PlayModal {
        salt: String,
        random: Option<Word>,
        error: Option<String>,
    },
    AmountModal {
        kind: AmountKind,
        input: String,
        error: Option<String>,
    },
    ParamsModal {
        fields: [String; 3],
        focus: usize,
        error: Option<String>,
    },
}

impl Mode {
    fn amount(kind: AmountKind) -> Self {
        Mode::AmountModal {
            kind,
            input: String::new(),
            error: None,
        }
    }
}

const PARAM_LABELS: [&str; 3] = ["Prize (ETH)", "Entry fee (ETH)", "Win chance (ppm)"];

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, view: &AppView) -> Result<()> {
    state.is_owner = view.connection.as_ref().is_some_and(|c| c.is_owner);
    state.can_play = view.can_play;
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, view))?;
        state.terminal = Some(term);
    }
    Ok(())
}

/// Reads terminal events on a dedicated thread so the async loop never
/// blocks on `event::read`.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            let ev = event::read();
            let failed = ev.is_err();
            if tx.send(ev).is_err() || failed {
                break;
            }
        }
    });
    rx
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.recv().await {
        Some(ev) => Ok(ev?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn interpret_event(state: &mut UiState, ev: Event) -> Option<UserEvent> {
    let k = match ev {
        Event::Key(k) if k.kind == KeyEventKind::Press => k,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    match &mut state.mode {
        Mode::QuitModal => match k.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::PlayModal {
            salt,
            random,
            error,
        } => match k.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('r') => {
                salt.clear();
                *random = Some(rand::random::<Word>());
                *error = None;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) if c.is_ascii_digit() => {
                *random = None;
                salt.push(c);
                *error = None;
                Some(UserEvent::Redraw)
            }
            KeyCode::Backspace => {
                salt.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let parsed = match random {
                    Some(word) => Some(*word),
                    None if salt.is_empty() => Some(rand::random::<Word>()),
                    None => abi::parse_decimal_word(salt),
                };
                match parsed {
                    Some(word) => {
                        state.mode = Mode::Normal;
                        Some(UserEvent::Play { salt: word })
                    }
                    None => {
                        *error = Some("Salt must fit in 256 bits".to_string());
                        Some(UserEvent::Redraw)
                    }
                }
            }
            _ => None,
        },
        Mode::AmountModal { kind, input, error } => match k.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => {
                input.push(c);
                *error = None;
                Some(UserEvent::Redraw)
            }
            KeyCode::Backspace => {
                input.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => match parse_ether(input) {
                Some(amount_wei) => {
                    let ev = match kind {
                        AmountKind::Fund => UserEvent::Fund { amount_wei },
                        AmountKind::Withdraw => UserEvent::Withdraw { amount_wei },
                    };
                    state.mode = Mode::Normal;
                    Some(ev)
                }
                None => {
                    *error = Some(format!("Invalid ETH amount {input:?}"));
                    Some(UserEvent::Redraw)
                }
            },
            _ => None,
        },
        Mode::ParamsModal {
            fields,
            focus,
            error,
        } => match k.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Tab | KeyCode::Down => {
                *focus = (*focus + 1) % fields.len();
                Some(UserEvent::Redraw)
            }
            KeyCode::BackTab | KeyCode::Up => {
                *focus = (*focus + fields.len() - 1) % fields.len();
                Some(UserEvent::Redraw)
            }
            // the ppm field is an integer
            KeyCode::Char(c) if c.is_ascii_digit() || (c == '.' && *focus < 2) => {
                fields[*focus].push(c);
                *error = None;
                Some(UserEvent::Redraw)
            }
            KeyCode::Backspace => {
                fields[*focus].pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => match parse_params(fields) {
                Ok((prize_wei, entry_fee_wei, win_chance_ppm)) => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::SetParams {
                        prize_wei,
                        entry_fee_wei,
                        win_chance_ppm,
                    })
                }
                Err(msg) => {
                    *error = Some(msg);
                    Some(UserEvent::Redraw)
                }
            },
            _ => None,
        },
        Mode::Normal => match k.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('n') => Some(UserEvent::Connect),
            KeyCode::Char('x') => Some(UserEvent::Disconnect),
            KeyCode::Char('u') => Some(UserEvent::Refresh),
            KeyCode::Char('c') => Some(UserEvent::Claim),
            KeyCode::Char('p') if state.can_play => {
                state.mode = Mode::PlayModal {
                    salt: String::new(),
                    random: None,
                    error: None,
                };
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('f') => {
                state.mode = Mode::amount(AmountKind::Fund);
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('w') if state.is_owner => {
                state.mode = Mode::amount(AmountKind::Withdraw);
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('s') if state.is_owner => {
                state.mode = Mode::ParamsModal {
                    fields: Default::default(),
                    focus: 0,
                    error: None,
                };
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
    }
}

fn parse_params(fields: &[String; 3]) -> std::result::Result<(u128, u128, u32), String> {
    let prize =
        parse_ether(&fields[0]).ok_or_else(|| format!("Invalid prize {:?}", fields[0]))?;
    let fee =
        parse_ether(&fields[1]).ok_or_else(|| format!("Invalid entry fee {:?}", fields[1]))?;
    let ppm: u32 = fields[2]
        .parse()
        .map_err(|_| format!("Invalid win chance {:?}", fields[2]))?;
    if ppm > PPM_DENOMINATOR {
        return Err(format!("Win chance cannot exceed {PPM_DENOMINATOR} ppm"));
    }
    Ok((prize, fee, ppm))
}

fn ui(f: &mut Frame, state: &UiState, view: &AppView) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // wallet
            Constraint::Length(8), // lottery + outcome
            Constraint::Min(6),    // activity
            Constraint::Length(4), // status
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_wallet(f, chunks[0], view);
    draw_lottery(f, chunks[1], view);
    draw_activity(f, chunks[2], view);
    draw_status(f, chunks[3], view);
    draw_help(f, chunks[4], view);
    draw_modals(f, state, view);
}

fn panel(title: &str) -> Block<'_> {
    Block::default().borders(Borders::ALL).title(title)
}

fn dim() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn draw_wallet(f: &mut Frame, area: Rect, view: &AppView) {
    let lines = match &view.connection {
        Some(c) => {
            let role = if c.is_owner { " (owner)" } else { "" };
            let polling = if c.polling { "polling" } else { "not polling" };
            vec![
                Line::from(format!(
                    "Account: {}{} | Chain: {} | {}",
                    c.account, role, c.chain_id, polling
                )),
                Line::from(format!("Contract: {}", view.contract)),
            ]
        }
        None => vec![
            Line::styled("Not connected (n to connect)", dim()),
            Line::from(format!("Contract: {}", view.contract)),
        ],
    };
    f.render_widget(Paragraph::new(lines).block(panel("Wallet")), area);
}

fn draw_lottery(f: &mut Frame, area: Rect, view: &AppView) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let mut lines = Vec::new();
    match &view.snapshot {
        None => lines.push(Line::styled("Loading contract state...", dim())),
        Some(s) => {
            lines.push(Line::from(format!(
                "Prize: {} | Entry fee: {}",
                format_ether(s.prize_wei),
                format_ether(s.entry_fee_wei)
            )));
            lines.push(Line::from(format!(
                "Win chance: {} | Contract balance: {}",
                format_ppm_percent(s.win_chance_ppm),
                format_ether(s.contract_balance)
            )));
            lines.push(Line::from(format!(
                "Your pending prize: {}",
                format_ether(s.pending_prize)
            )));
            lines.push(Line::from(format!(
                "Last played block: {} | Current block: {}",
                s.last_played_block, s.current_block
            )));
            let eligibility = if view.can_play {
                Line::styled("You can play now", Style::default().fg(Color::Green))
            } else {
                Line::styled(
                    "Already played this block, wait for the next one",
                    Style::default().fg(Color::Yellow),
                )
            };
            lines.push(eligibility);
            if let Some(at) = view.snapshot_updated_at {
                lines.push(Line::styled(
                    format!("Updated {}", at.format("%H:%M:%S")),
                    dim(),
                ));
            }
        }
    }
    f.render_widget(Paragraph::new(lines).block(panel("Lottery")), cols[0]);

    let outcome = match view.last_outcome {
        None => Line::styled("No play yet", dim()),
        Some(ActionOutcome::Won(amount)) => Line::styled(
            format!("WON {}", format_ether(amount)),
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Some(ActionOutcome::Lost) => Line::from("Lost"),
        Some(ActionOutcome::PendingEvent(amount)) => Line::styled(
            format!("Won {} (pending, press c to claim)", format_ether(amount)),
            Style::default().fg(Color::Yellow),
        ),
        Some(ActionOutcome::Unknown) => Line::styled("Outcome unknown", dim()),
    };
    let outcome = Paragraph::new(outcome)
        .wrap(Wrap { trim: true })
        .block(panel("Last Outcome"));
    f.render_widget(outcome, cols[1]);
}

fn draw_activity(f: &mut Frame, area: Rect, view: &AppView) {
    let mut lines = Vec::new();
    if view.activity.is_empty() {
        lines.push(Line::from("None"));
    }
    for entry in &view.activity {
        let style = if entry.text.starts_with("Error:") {
            Style::default().fg(Color::Red)
        } else {
            Style::default()
        };
        lines.push(Line::styled(
            format!("{} {}", entry.at.format("%H:%M:%S"), entry.text),
            style,
        ));
        if let Some(hash) = &entry.tx_hash {
            lines.push(Line::styled(
                format!("    {}", explorer_tx_url(&view.explorer_url, hash)),
                Style::default().fg(Color::Blue),
            ));
        }
    }
    f.render_widget(Paragraph::new(lines).block(panel("Activity")), area);
}

fn draw_status(f: &mut Frame, area: Rect, view: &AppView) {
    let headline = view.busy.clone().unwrap_or_else(|| view.status.clone());
    let (notice, color) = match &view.notice {
        None => (String::from("No errors"), Color::DarkGray),
        Some(Notice::UserRejected { action }) => {
            (format!("{action} was rejected in the wallet"), Color::Yellow)
        }
        Some(Notice::Warning(msg)) => (msg.clone(), Color::Yellow),
        Some(Notice::Error(msg)) => (msg.clone(), Color::Red),
    };
    let lines = vec![
        Line::from(headline),
        Line::styled(notice, Style::default().fg(color)),
    ];
    f.render_widget(Paragraph::new(lines).block(panel("Status")), area);
}

fn help_text(view: &AppView) -> String {
    let mut keys = Vec::new();
    if view.can_play {
        keys.push("p play");
    }
    keys.extend(["c claim", "f fund", "u refresh", "n connect", "x disconnect"]);
    if view.connection.as_ref().is_some_and(|c| c.is_owner) {
        keys.extend(["w withdraw", "s set params"]);
    }
    keys.push("q/Esc quit");
    keys.join(" | ")
}

fn draw_help(f: &mut Frame, area: Rect, view: &AppView) {
    f.render_widget(Paragraph::new(help_text(view)).block(panel("Help")), area);
}

fn modal_error(lines: &mut Vec<Line<'static>>, error: Option<&str>) {
    if let Some(err) = error {
        lines.push(Line::styled(err.to_string(), Style::default().fg(Color::Red)));
    }
}

fn draw_modals(f: &mut Frame, state: &UiState, view: &AppView) {
    let (title, lines, w, h) = match &state.mode {
        Mode::Normal => return,
        Mode::QuitModal => (
            "Quit",
            vec![Line::from("Quit the lottery client? (y/n)")],
            40,
            20,
        ),
        Mode::PlayModal {
            salt,
            random,
            error,
        } => {
            let fee = view
                .snapshot
                .as_ref()
                .map(|s| format_ether(s.entry_fee_wei))
                .unwrap_or_else(|| "unknown".to_string());
            let shown = match random {
                Some(word) => abi::encode_hex(word),
                None if salt.is_empty() => String::from("(random on submit)"),
                None => salt.clone(),
            };
            let mut lines = vec![
                Line::from(format!("Entry fee: {fee}")),
                Line::from(format!("Salt: {shown}")),
                Line::from("digits to edit | r random | Enter=play Esc=cancel"),
            ];
            modal_error(&mut lines, error.as_deref());
            ("Play", lines, 50, 30)
        }
        Mode::AmountModal { kind, input, error } => {
            let title = match kind {
                AmountKind::Fund => "Fund Contract",
                AmountKind::Withdraw => "Owner Withdraw",
            };
            let mut lines = vec![
                Line::from(format!("Amount (ETH): {input}")),
                Line::from("Enter=confirm Esc=cancel"),
            ];
            modal_error(&mut lines, error.as_deref());
            (title, lines, 40, 25)
        }
        Mode::ParamsModal {
            fields,
            focus,
            error,
        } => {
            let mut lines = Vec::new();
            for (i, (label, value)) in PARAM_LABELS.iter().zip(fields.iter()).enumerate() {
                let cur = if i == *focus { ">" } else { " " };
                lines.push(Line::from(format!("{cur} {label}: {value}")));
            }
            lines.push(Line::from("Tab/↑/↓ field | Enter=submit Esc=cancel"));
            modal_error(&mut lines, error.as_deref());
            ("Set Params", lines, 50, 35)
        }
    };
    let area = centered_rect(w, h, f.area());
    let block = panel(title);
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(Paragraph::new(lines), block.inner(area));
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}
