use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;
use ratatui::Terminal;
use tokio::runtime::Runtime;

use crate::api::{ActionKind, ApiClient};
use crate::config::AppConfig;
use crate::model::Section;
use crate::session::Session;
use crate::ui;

pub mod actions;
pub mod state;

use self::actions::{failure_notification, ActionDispatcher, RecordAction};
use self::state::{fetch_all, OverlayState, PreparedAction};

pub use state::{DashboardState, FocusPane};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    SelectFirst,
    SelectLast,
    NextSection,
    PreviousSection,
    JumpSection(usize),
    ToggleFocus,
    Refresh,
    StartFilter,
    CycleCategory,
    ClearFilter,
    Record(ActionKind),
    ShowReviewed,
    ShowProfile,
    ShowHelp,
}

pub struct App {
    pub config: Arc<AppConfig>,
    api: ApiClient,
    session: Session,
    runtime: Runtime,
    state: DashboardState,
    table_state: TableState,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: Arc<AppConfig>, api: ApiClient, session: Session) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("starting async runtime")?;
        let active = match session.active_section() {
            Ok(Some(section)) => section,
            Ok(None) => config.dashboard.default_section,
            Err(err) => {
                tracing::warn!(?err, "could not read remembered section");
                config.dashboard.default_section
            }
        };
        let mut state = DashboardState::new(active);
        state.signed_in = session.is_authenticated();
        state.profile = session.profile().cloned();
        if !state.signed_in {
            state.set_status_message(Some(
                "Not signed in: protected sections need `estatedesk login <token>`",
            ));
        }

        let mut app = Self {
            config,
            api,
            session,
            runtime,
            state,
            table_state: TableState::default(),
            should_quit: false,
            tick_rate: Duration::from_millis(250),
        };
        if app.config.dashboard.refresh_on_start {
            app.refresh();
        }
        Ok(app)
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| {
                    if self.state.rows().is_empty() {
                        self.table_state.select(None);
                    } else {
                        self.table_state.select(Some(self.state.selected));
                    }
                    ui::draw_app(frame, &self.state, &mut self.table_state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key(key);
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }

        if self.state.is_filter_active() {
            match key.code {
                KeyCode::Esc => self.state.cancel_filter(),
                KeyCode::Enter => self.state.commit_filter(),
                KeyCode::Backspace => self.state.pop_filter_char(),
                KeyCode::Char(ch) if !has_command_modifier(key) => self.state.push_filter_char(ch),
                _ => {}
            }
            return;
        }

        if let Some(action) = action_for_key(key) {
            self.handle_action(action);
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        match &self.state.overlay {
            Some(OverlayState::Confirm(prepared)) => {
                let prepared = prepared.clone();
                match key.code {
                    KeyCode::Esc | KeyCode::Char('n') => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Action canceled"));
                    }
                    KeyCode::Enter | KeyCode::Char('y') => {
                        self.state.close_overlay();
                        self.run_action(prepared);
                    }
                    _ => {}
                }
                true
            }
            Some(overlay) => {
                let toggle = match overlay {
                    OverlayState::Reviewed => 'v',
                    OverlayState::Profile => 'p',
                    _ => '?',
                };
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('q'))
                    || key.code == KeyCode::Char(toggle)
                {
                    self.state.close_overlay();
                }
                true
            }
            None => false,
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectNext => self.state.move_selection(1),
            Action::SelectPrevious => self.state.move_selection(-1),
            Action::SelectFirst => self.state.selected = 0,
            Action::SelectLast => self.state.select_last(),
            Action::NextSection => {
                let section = self.state.step_section(1);
                self.remember_section(section);
            }
            Action::PreviousSection => {
                let section = self.state.step_section(-1);
                self.remember_section(section);
            }
            Action::JumpSection(index) => {
                if let Some(section) = self.state.sections().get(index).copied() {
                    self.state.set_section(section);
                    self.remember_section(section);
                }
            }
            Action::ToggleFocus => self.state.toggle_focus(),
            Action::Refresh => self.refresh(),
            Action::StartFilter => self.state.begin_filter(),
            Action::CycleCategory => self.state.cycle_category(),
            Action::ClearFilter => {
                self.state.clear_filter();
                self.state.set_status_message(Some("Filter cleared"));
            }
            Action::Record(kind) => self.handle_record_action(kind),
            Action::ShowReviewed => self.state.overlay = Some(OverlayState::Reviewed),
            Action::ShowProfile => self.state.overlay = Some(OverlayState::Profile),
            Action::ShowHelp => self.state.overlay = Some(OverlayState::Help),
        }
    }

    fn refresh(&mut self) {
        self.state.set_status_message(Some("Refreshing…"));
        let report = self.runtime.block_on(fetch_all(&self.api));
        self.state.apply_fetch(report);
    }

    fn remember_section(&self, section: Section) {
        if let Err(err) = self.session.remember_section(section) {
            tracing::error!(?err, %section, "failed to persist active section");
        }
    }

    fn handle_record_action(&mut self, kind: ActionKind) {
        match self.state.prepare_action(kind) {
            Ok(prepared) if prepared.action.is_destructive() => self.state.open_confirm(prepared),
            Ok(prepared) => self.run_action(prepared),
            Err(err) => {
                let action = RecordAction::new(self.state.active, kind);
                self.state.push_notification(failure_notification(action, &err));
            }
        }
    }

    fn run_action(&mut self, prepared: PreparedAction) {
        self.state.set_status_message(Some(format!("Sending {}…", prepared.action)));
        let dispatcher = ActionDispatcher::new(&self.api);
        let notification = self
            .runtime
            .block_on(self.state.perform(&dispatcher, &prepared));
        if notification.is_error() {
            tracing::warn!(action = %prepared.action, id = %prepared.id, text = %notification.text, "action not applied");
        }
    }
}

fn has_command_modifier(key: KeyEvent) -> bool {
    key.modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
}

fn action_for_key(key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Action::Quit),
            KeyCode::Char('r') => Some(Action::Refresh),
            _ => None,
        };
    }
    if has_command_modifier(key) {
        return None;
    }
    match key.code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
        KeyCode::Char('g') | KeyCode::Home => Some(Action::SelectFirst),
        KeyCode::Char('G') | KeyCode::End => Some(Action::SelectLast),
        KeyCode::Tab | KeyCode::Char('l') | KeyCode::Right => Some(Action::NextSection),
        KeyCode::BackTab | KeyCode::Char('h') | KeyCode::Left => Some(Action::PreviousSection),
        KeyCode::Char(digit @ '1'..='9') => {
            Some(Action::JumpSection(digit as usize - '1' as usize))
        }
        KeyCode::Enter => Some(Action::ToggleFocus),
        KeyCode::Char('/') => Some(Action::StartFilter),
        KeyCode::Char('t') => Some(Action::CycleCategory),
        KeyCode::Char('c') => Some(Action::ClearFilter),
        KeyCode::Char('a') => Some(Action::Record(ActionKind::Accept)),
        KeyCode::Char('x') => Some(Action::Record(ActionKind::Reject)),
        KeyCode::Char('d') => Some(Action::Record(ActionKind::Delete)),
        KeyCode::Char('v') => Some(Action::ShowReviewed),
        KeyCode::Char('p') => Some(Action::ShowProfile),
        KeyCode::Char('?') => Some(Action::ShowHelp),
        _ => None,
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("restoring screen state")?;
    Ok(())
}
