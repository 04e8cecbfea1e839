// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use leadbook_app::{
    Completion, EMAILS_PATH, Effect, FormField, FormPhase, Lead, LeadForm, LeadStatus,
    LeadsView, ListDisplay, SortDirection, SortField, StatusEditor, ViewCommand, email_value_path,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use time::macros::format_description;
use tracing::warn;

const POLL_INTERVAL: Duration = Duration::from_millis(120);
const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(4);
const EMPTY_LIST_TEXT: &str = "no leads";

/// Executes view effects away from the event loop.
pub trait AppRuntime {
    fn perform(&mut self, effect: Effect) -> Completion;

    fn spawn_effect(&mut self, effect: Effect, tx: Sender<InternalEvent>) -> Result<()> {
        let completion = self.perform(effect);
        tx.send(InternalEvent::Completed(completion))
            .map_err(|_| anyhow::anyhow!("completion channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    Completed(Completion),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum InputFocus {
    #[default]
    Table,
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    focus: InputFocus,
    selected_row: usize,
    form_field: usize,
    status_token: u64,
    shown_status: Option<String>,
}

pub fn run_app<R: AppRuntime>(view: &mut LeadsView, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    let effects = view.dispatch(ViewCommand::Mount);
    spawn_effects(runtime, &internal_tx, effects);

    let mut result = Ok(());
    loop {
        process_internal_events(view, runtime, &mut view_data, &internal_tx, &internal_rx);
        process_tick(view, runtime, &mut view_data, &internal_tx, Instant::now());

        if let Err(error) = terminal.draw(|frame| render(frame, view, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(poll_timeout(view, Instant::now())).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(view, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    view.dispatch(ViewCommand::Unmount);
    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

// Wake early when debounced search text is due.
fn poll_timeout(view: &LeadsView, now: Instant) -> Duration {
    view.search_deadline()
        .map(|deadline| deadline.saturating_duration_since(now))
        .map_or(POLL_INTERVAL, |until| until.min(POLL_INTERVAL))
}

fn process_internal_events<R: AppRuntime>(
    view: &mut LeadsView,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                view.dispatch(ViewCommand::ClearStatus);
                view_data.shown_status = None;
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Completed(completion) => {
                let effects = view.apply(completion);
                spawn_effects(runtime, tx, effects);
                sync_view_data(view, view_data, tx);
            }
        }
    }
}

fn process_tick<R: AppRuntime>(
    view: &mut LeadsView,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    now: Instant,
) {
    let effects = view.dispatch(ViewCommand::Tick(now));
    if !effects.is_empty() {
        view_data.selected_row = 0;
    }
    spawn_effects(runtime, tx, effects);
}

fn spawn_effects<R: AppRuntime>(runtime: &mut R, tx: &Sender<InternalEvent>, effects: Vec<Effect>) {
    for effect in effects {
        if let Err(error) = runtime.spawn_effect(effect, tx.clone()) {
            warn!(%error, "could not start request");
        }
    }
}

/// Keeps cursor positions in range and schedules clearing of new status
/// messages.
fn sync_view_data(view: &LeadsView, view_data: &mut ViewData, tx: &Sender<InternalEvent>) {
    let rows = match view.display() {
        ListDisplay::Rows(rows) => rows.len(),
        _ => 0,
    };
    view_data.selected_row = view_data.selected_row.min(rows.saturating_sub(1));

    if let Some(form) = view.form() {
        let fields = form.draft().fields().len();
        view_data.form_field = view_data.form_field.min(fields.saturating_sub(1));
    } else {
        view_data.form_field = 0;
    }

    let current = view.status_line().map(str::to_owned);
    if current.is_some() && current != view_data.shown_status {
        view_data.status_token = view_data.status_token.saturating_add(1);
        schedule_status_clear(tx, view_data.status_token);
    }
    view_data.shown_status = current;
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_AFTER);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn handle_key_event<R: AppRuntime>(
    view: &mut LeadsView,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    let effects = if view.form().is_some() {
        handle_form_key(view, view_data, key)
    } else if view.editor().editing().is_some() {
        handle_status_key(view, view_data, key)
    } else if view_data.focus == InputFocus::Search {
        handle_search_key(view, view_data, key)
    } else {
        handle_table_key(view, view_data, key)
    };
    spawn_effects(runtime, internal_tx, effects);
    sync_view_data(view, view_data, internal_tx);
    false
}

fn handle_table_key(view: &mut LeadsView, view_data: &mut ViewData, key: KeyEvent) -> Vec<Effect> {
    match key.code {
        KeyCode::Char('/') => {
            view_data.focus = InputFocus::Search;
            Vec::new()
        }
        KeyCode::Char('f') => {
            view_data.selected_row = 0;
            view.dispatch(ViewCommand::CycleStatusFilter)
        }
        KeyCode::Char(digit @ '1'..='4') => {
            let index = usize::from(digit as u8 - b'1');
            view.dispatch(ViewCommand::SortBy(SortField::ALL[index]))
        }
        KeyCode::Char('[') => {
            view_data.selected_row = 0;
            view.dispatch(ViewCommand::PrevPage)
        }
        KeyCode::Char(']') => {
            view_data.selected_row = 0;
            view.dispatch(ViewCommand::NextPage)
        }
        KeyCode::Char('j') | KeyCode::Down => {
            view_data.selected_row = view_data.selected_row.saturating_add(1);
            Vec::new()
        }
        KeyCode::Char('k') | KeyCode::Up => {
            view_data.selected_row = view_data.selected_row.saturating_sub(1);
            Vec::new()
        }
        KeyCode::Char('s') => match selected_lead(view, view_data).map(|lead| lead.id) {
            Some(lead_id) => view.dispatch(ViewCommand::BeginStatusEdit(lead_id)),
            None => Vec::new(),
        },
        KeyCode::Char('a') => {
            view_data.form_field = 0;
            view.dispatch(ViewCommand::OpenForm)
        }
        KeyCode::Char('r') => view.dispatch(ViewCommand::Retry),
        _ => Vec::new(),
    }
}

fn handle_search_key(view: &mut LeadsView, view_data: &mut ViewData, key: KeyEvent) -> Vec<Effect> {
    let mut text = view.search_input().to_owned();
    match key.code {
        KeyCode::Esc | KeyCode::Enter => {
            view_data.focus = InputFocus::Table;
            return Vec::new();
        }
        KeyCode::Backspace => {
            text.pop();
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => text.push(ch),
        _ => return Vec::new(),
    }
    view.dispatch(ViewCommand::SearchTyped {
        text,
        at: Instant::now(),
    })
}

fn handle_status_key(view: &mut LeadsView, view_data: &mut ViewData, key: KeyEvent) -> Vec<Effect> {
    match key.code {
        KeyCode::Char(digit @ '1'..='3') => {
            let index = usize::from(digit as u8 - b'1');
            view.dispatch(ViewCommand::SelectStatus(LeadStatus::ALL[index]))
        }
        KeyCode::Esc => view.dispatch(ViewCommand::CancelStatusEdit),
        KeyCode::Char('j') | KeyCode::Down | KeyCode::Char('k') | KeyCode::Up => {
            let effects = view.dispatch(ViewCommand::BlurStatusEdit);
            if view.editor().editing().is_none() {
                handle_table_key(view, view_data, key);
            }
            effects
        }
        _ => Vec::new(),
    }
}

fn handle_form_key(view: &mut LeadsView, view_data: &mut ViewData, key: KeyEvent) -> Vec<Effect> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => return view.dispatch(ViewCommand::CloseForm),
        KeyCode::Enter => return view.dispatch(ViewCommand::SubmitForm),
        _ => {}
    }

    let Some(draft) = view.form_mut().and_then(LeadForm::edit) else {
        return Vec::new();
    };
    let fields = draft.fields();
    let field = fields
        .get(view_data.form_field)
        .copied()
        .unwrap_or(FormField::Name);

    match key.code {
        KeyCode::Tab | KeyCode::Down => {
            view_data.form_field = (view_data.form_field + 1) % fields.len();
        }
        KeyCode::BackTab | KeyCode::Up => {
            view_data.form_field = (view_data.form_field + fields.len() - 1) % fields.len();
        }
        KeyCode::Char('n') if ctrl => {
            let row = draft.add_email();
            if let Some(index) = draft
                .fields()
                .iter()
                .position(|field| *field == FormField::Email(row))
            {
                view_data.form_field = index;
            }
        }
        KeyCode::Char('d') if ctrl => {
            if let FormField::Email(row) = field {
                draft.remove_email(row);
            }
        }
        KeyCode::Char('p') if ctrl => {
            if let FormField::Email(row) = field {
                draft.mark_primary(row);
            }
        }
        KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right if field == FormField::Status => {
            draft.cycle_status();
        }
        KeyCode::Backspace => {
            let mut text = draft.text(field).to_owned();
            text.pop();
            draft.set_text(field, &text);
        }
        KeyCode::Char(ch) if !ctrl => {
            let mut text = draft.text(field).to_owned();
            text.push(ch);
            draft.set_text(field, &text);
        }
        _ => {}
    }
    Vec::new()
}

fn selected_lead<'a>(view: &'a LeadsView, view_data: &ViewData) -> Option<&'a Lead> {
    match view.display() {
        ListDisplay::Rows(rows) => rows.get(view_data.selected_row).copied(),
        _ => None,
    }
}

fn render(frame: &mut ratatui::Frame<'_>, view: &LeadsView, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(header_text(view, view_data))
        .block(Block::default().title("leadbook").borders(Borders::ALL));
    frame.render_widget(header, layout[0]);

    render_list(frame, layout[1], view, view_data);

    let status = Paragraph::new(status_text(view, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if let Some(form) = view.form() {
        let area = centered_rect(70, 70, frame.area());
        frame.render_widget(Clear, area);
        let overlay = Paragraph::new(form_overlay_text(form, view_data.form_field)).block(
            Block::default()
                .title("new lead")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(overlay, area);
    }
}

fn render_list(frame: &mut ratatui::Frame<'_>, area: Rect, view: &LeadsView, view_data: &ViewData) {
    let title = view.window().label();
    let rows = match view.display() {
        ListDisplay::Rows(rows) => rows,
        other => {
            let message = list_message(&other).unwrap_or_default();
            let placeholder = Paragraph::new(message)
                .block(Block::default().borders(Borders::ALL).title(title));
            frame.render_widget(placeholder, area);
            return;
        }
    };

    let header = Row::new(header_labels(view).into_iter().map(|label| {
        Cell::from(label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let table_rows = rows.iter().enumerate().map(|(index, lead)| {
        let mut style = Style::default();
        if view.editor().is_editing(lead.id) {
            style = style.fg(Color::Cyan);
        }
        if index == view_data.selected_row {
            style = style.bg(Color::DarkGray);
        }
        Row::new(row_cells(lead, view.editor()).map(Cell::from)).style(style)
    });

    let widths = [
        Constraint::Percentage(22),
        Constraint::Percentage(16),
        Constraint::Percentage(22),
        Constraint::Percentage(26),
        Constraint::Percentage(14),
    ];
    let table = Table::new(table_rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(table, area);
}

fn header_text(view: &LeadsView, view_data: &ViewData) -> String {
    let cursor = if view_data.focus == InputFocus::Search {
        "_"
    } else {
        ""
    };
    let sort = view.sort();
    format!(
        "search: {}{cursor} | status: {} | sort: {} {}",
        view.search_input(),
        view.status_filter().label(),
        sort.field.label(),
        sort.direction.as_str()
    )
}

fn header_labels(view: &LeadsView) -> Vec<String> {
    let sort = view.sort();
    let arrow = match sort.direction {
        SortDirection::Asc => "▲",
        SortDirection::Desc => "▼",
    };
    let mut labels: Vec<String> = SortField::ALL
        .iter()
        .map(|field| {
            if *field == sort.field {
                format!("{} {arrow}", field.label())
            } else {
                field.label().to_owned()
            }
        })
        .collect();
    labels.push("created".to_owned());
    labels
}

fn row_cells(lead: &Lead, editor: &StatusEditor) -> [String; 5] {
    let status = match editor.editing().filter(|edit| edit.lead_id == lead.id) {
        Some(edit) if edit.pending => {
            format!("{} ...", edit.selection.unwrap_or(edit.current).as_str())
        }
        Some(edit) => {
            let choices = LeadStatus::ALL
                .iter()
                .enumerate()
                .map(|(index, status)| {
                    let mark = if edit.selection == Some(*status) { "*" } else { "" };
                    format!("{}:{}{mark}", index + 1, status.as_str())
                })
                .collect::<Vec<_>>()
                .join(" ");
            if edit.error.is_some() {
                format!("{choices} !")
            } else {
                choices
            }
        }
        None => lead.status.as_str().to_owned(),
    };
    let created = lead
        .created_at
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_default();
    [
        lead.name.clone(),
        lead.domain.clone().unwrap_or_else(|| "-".to_owned()),
        status,
        lead.contact_label(),
        created,
    ]
}

fn list_message(display: &ListDisplay<'_>) -> Option<String> {
    match display {
        ListDisplay::Loading => Some("loading...".to_owned()),
        ListDisplay::Failed(error) => Some(format!("{error} -- press r to retry")),
        ListDisplay::Empty => Some(EMPTY_LIST_TEXT.to_owned()),
        ListDisplay::Rows(_) => None,
    }
}

fn status_text(view: &LeadsView, view_data: &ViewData) -> String {
    let hints = if view.form().is_some() {
        "tab/shift+tab field | space status | ctrl+n add email | ctrl+d remove | ctrl+p primary | enter save | esc close"
    } else if view.editor().editing().is_some() {
        "1 new | 2 qualified | 3 lost | esc cancel"
    } else if view_data.focus == InputFocus::Search {
        "type to search | enter/esc done"
    } else {
        "/ search | f status | 1-4 sort | [ ] page | j/k | s status | a add | r retry | ctrl+q"
    };
    let window = view.window();
    let paging = format!(
        "{}{}",
        if window.has_prev() { "[" } else { " " },
        if window.has_next() { "]" } else { " " }
    );
    match view.status_line() {
        Some(status) => format!("{status} | {paging} | {hints}"),
        None => format!("{paging} | {hints}"),
    }
}

fn form_overlay_text(form: &LeadForm, field_index: usize) -> String {
    let draft = form.draft();
    let errors = form.errors();
    let mut lines = Vec::new();

    for (index, field) in draft.fields().into_iter().enumerate() {
        let cursor = if index == field_index { ">" } else { " " };
        let marker = match field {
            FormField::Email(row) if draft.emails()[row].is_primary => " (primary)",
            _ => "",
        };
        lines.push(format!(
            "{cursor} {:<11} {}{marker}",
            field.label(),
            draft.text(field)
        ));

        let path = match field {
            FormField::Name => Some("name".to_owned()),
            FormField::Domain => Some("domain".to_owned()),
            FormField::Status => Some("status".to_owned()),
            FormField::FirstName | FormField::LastName => None,
            FormField::Email(row) => draft.assembled_email_index(row).map(email_value_path),
        };
        if let Some(path) = path
            && !errors.get(&path).is_empty()
        {
            lines.push(format!("    ! {}", errors.messages(&path)));
        }
    }
    if !errors.get(EMAILS_PATH).is_empty() {
        lines.push(format!("  ! emails: {}", errors.messages(EMAILS_PATH)));
    }

    lines.push(String::new());
    if form.phase() == FormPhase::Submitting {
        lines.push("saving...".to_owned());
    }
    if let Some(error) = form.submit_error() {
        lines.push(format!("! {error}"));
    }
    lines.join("\n")
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
