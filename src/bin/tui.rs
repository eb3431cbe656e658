use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind}, execute, terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen}};
use ratatui::{backend::CrosstermBackend, Terminal, widgets::{Block, Borders, List, ListItem, ListState, Paragraph}, layout::{Constraint, Direction, Layout}, style::{Color, Modifier, Style}};
use tracing_subscriber::EnvFilter;

use todo_store::{application::todo_store::TodoStore, domain::{remote::TodoApi, task::{Filter, TaskId}}, infrastructure::http_api::HttpTodoApi};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    // Logs go to stderr and only on request; stdout belongs to the terminal UI.
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }
    let base_url = std::env::var("TODO_API_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
    let store = TodoStore::new(HttpTodoApi::new(&base_url));

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, store, &base_url).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    res
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode { View, Create, Edit, ConfirmDelete(TaskId), ConfirmClear }

struct App<A: TodoApi> {
    store: TodoStore<A>,
    selected: usize,
    list_state: ListState,
    mode: Mode,
    draft: String,
}

impl<A: TodoApi> App<A> {
    // Keep the highlighted row inside the filtered view.
    fn clamp_selection(&mut self, len: usize) {
        if len == 0 { self.selected = 0; self.list_state.select(None); }
        else { if self.selected >= len { self.selected = len - 1; } self.list_state.select(Some(self.selected)); }
    }

    fn selected_id(&self) -> Option<TaskId> {
        self.store.visible_tasks().get(self.selected).map(|t| t.id)
    }
}

fn filter_label(filter: Filter) -> &'static str {
    match filter { Filter::All => "All", Filter::Active => "Active", Filter::Completed => "Completed" }
}

fn next_filter(filter: Filter) -> Filter {
    match filter { Filter::All => Filter::Active, Filter::Active => Filter::Completed, Filter::Completed => Filter::All }
}

async fn run_app<A: TodoApi>(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, store: TodoStore<A>, base_url: &str) -> Result<()> {
    let tick_rate = Duration::from_millis(200);
    let mut app = App { store, selected: 0, list_state: ListState::default(), mode: Mode::View, draft: String::new() };
    let mut last_tick = Instant::now();
    app.store.load().await;

    loop {
        let visible = app.store.visible_tasks();
        let counts = app.store.counts();
        let filter = app.store.filter();
        let error = app.store.error();
        let editing = app.store.editing();
        app.clamp_selection(visible.len());

        let (footer_title, footer_text) = match app.mode {
            Mode::View => {
                let mut flags = String::new();
                if app.store.is_loading() { flags.push_str("  [loading]"); }
                if app.store.is_saving() { flags.push_str("  [saving]"); }
                ("info", format!("TODO_API_URL={}  |  Filter=[{}]  |  {} total / {} active / {} done{}", base_url, filter_label(filter), counts.total, counts.active, counts.completed, flags))
            }
            Mode::Create => ("create", format!("Title: {}_  |  (Enter to save, Esc to cancel)", app.draft)),
            Mode::Edit => ("edit", format!("Title: {}_  |  (Enter to save, Esc to cancel)", editing.as_ref().map(|e| e.title.as_str()).unwrap_or(""))),
            Mode::ConfirmDelete(id) => {
                let title = app.store.tasks().iter().find(|t| t.id == id).map(|t| t.title.clone()).unwrap_or_default();
                ("confirm", format!("Delete \"{}\"? (y/n)", title))
            }
            Mode::ConfirmClear => ("confirm", format!("Delete all {} completed tasks? (y/n)", counts.completed)),
        };

        terminal.draw(|f| {
            let mut constraints = vec![Constraint::Length(3), Constraint::Min(1)];
            if error.is_some() { constraints.push(Constraint::Length(3)); }
            constraints.push(Constraint::Length(3));
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints(constraints)
                .split(f.size());

            let header = Paragraph::new("Todos (Enter: toggle, n: new, e: edit, d: delete, c: clear done, f: filter, x: dismiss error, q: quit)")
                .block(Block::default().borders(Borders::ALL).title("todo-store"));
            f.render_widget(header, chunks[0]);

            let middle = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[1]);

            let list_items: Vec<ListItem> = visible.iter().map(|t| {
                let mark = if t.completed { "[x]" } else { "[ ]" };
                ListItem::new(format!("{} {}", mark, t.title))
            }).collect();
            let list = List::new(list_items)
                .block(Block::default().borders(Borders::ALL).title(format!("items [{}]", filter_label(filter))))
                .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD | Modifier::REVERSED))
                .highlight_symbol(">> ");
            f.render_stateful_widget(list, middle[0], &mut app.list_state);

            // Details pane for the selected item; timestamps come from the server.
            let detail = match visible.get(app.selected) {
                Some(t) => format!(
                    "Title:\n{}\n\nStatus: {}\n\nCreated: {}\nUpdated: {}",
                    t.title,
                    if t.completed { "Done" } else { "Active" },
                    t.created_at.to_rfc3339(),
                    t.updated_at.to_rfc3339(),
                ),
                None => String::new(),
            };
            let details = Paragraph::new(detail)
                .block(Block::default().borders(Borders::ALL).title("details"));
            f.render_widget(details, middle[1]);

            if let Some(message) = error.as_deref() {
                let alert = Paragraph::new(format!("{}  (x to dismiss)", message))
                    .style(Style::default().fg(Color::Red))
                    .block(Block::default().borders(Borders::ALL).title("error"));
                f.render_widget(alert, chunks[2]);
            }

            let footer = Paragraph::new(footer_text.clone())
                .block(Block::default().borders(Borders::ALL).title(footer_title));
            f.render_widget(footer, chunks[chunks.len() - 1]);
        })?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                // Only act on key presses; ignore repeats and releases to prevent duplicate input
                if key.kind != KeyEventKind::Press { continue; }
                match app.mode {
                    Mode::View => match key.code {
                        KeyCode::Char('q') => break,
                        KeyCode::Up => { if app.selected > 0 { app.selected -= 1; } }
                        KeyCode::Down => { let len = app.store.visible_tasks().len(); if app.selected + 1 < len { app.selected += 1; } }
                        KeyCode::Enter => {
                            if let Some(id) = app.selected_id() {
                                app.store.toggle_completion(id).await;
                            }
                        }
                        KeyCode::Char('n') => {
                            app.mode = Mode::Create;
                            app.draft.clear();
                        }
                        KeyCode::Char('e') => {
                            if let Some(id) = app.selected_id() {
                                app.store.begin_edit(id);
                                app.mode = Mode::Edit;
                            }
                        }
                        KeyCode::Char('d') => {
                            if let Some(id) = app.selected_id() {
                                app.mode = Mode::ConfirmDelete(id);
                            }
                        }
                        KeyCode::Char('c') => {
                            if app.store.counts().completed > 0 {
                                app.mode = Mode::ConfirmClear;
                            }
                        }
                        KeyCode::Char('f') => {
                            app.store.set_filter(next_filter(app.store.filter()));
                        }
                        KeyCode::Char('x') => { app.store.dismiss_error(); }
                        _ => {}
                    },
                    Mode::Create => match key.code {
                        KeyCode::Esc => { app.mode = Mode::View; app.draft.clear(); }
                        KeyCode::Enter => {
                            app.store.create(&app.draft).await;
                            app.mode = Mode::View;
                            app.draft.clear();
                        }
                        KeyCode::Backspace => { app.draft.pop(); }
                        KeyCode::Char(c) => { app.draft.push(c); }
                        _ => {}
                    },
                    Mode::Edit => match key.code {
                        KeyCode::Esc => { app.store.cancel_edit(); app.mode = Mode::View; }
                        KeyCode::Enter => {
                            app.store.save_edit().await;
                            // A failed or blank save keeps edit mode so the typed text survives.
                            if app.store.editing().is_none() { app.mode = Mode::View; }
                        }
                        KeyCode::Backspace => {
                            if let Some(edit) = app.store.editing() {
                                let mut title = edit.title;
                                title.pop();
                                app.store.set_edit_title(title);
                            }
                        }
                        KeyCode::Char(c) => {
                            if let Some(edit) = app.store.editing() {
                                let mut title = edit.title;
                                title.push(c);
                                app.store.set_edit_title(title);
                            }
                        }
                        _ => {}
                    },
                    Mode::ConfirmDelete(id) => match key.code {
                        KeyCode::Char('y') | KeyCode::Enter => {
                            app.store.delete(id).await;
                            if app.selected > 0 { app.selected -= 1; }
                            app.mode = Mode::View;
                        }
                        _ => { app.mode = Mode::View; }
                    },
                    Mode::ConfirmClear => match key.code {
                        KeyCode::Char('y') | KeyCode::Enter => {
                            app.store.clear_completed().await;
                            app.mode = Mode::View;
                        }
                        _ => { app.mode = Mode::View; }
                    },
                }
            }
        }
        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }
    Ok(())
}
