use crate::exec::{CommandRunner, TaskEvent, TaskExecutor};
use crate::queue::{Task, TaskQueue, TaskStatus};
use crate::sessions;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::warn;

/// Full-screen queue management: list pending tasks across every session,
/// approve or reject them, and watch approved tasks execute. Status changes
/// arrive over the executor's event channel; nothing here polls the queue.
pub async fn run_queue_tui(queues: Vec<Arc<TaskQueue>>) -> Result<()> {
    let handle = Handle::current();
    tokio::task::spawn_blocking(move || run_blocking(&handle, queues)).await?
}

fn run_blocking(handle: &Handle, queues: Vec<Arc<TaskQueue>>) -> Result<()> {
    let (sender, mut receiver) = unbounded_channel();

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = QueueApp::new(queues);
    let result = main_loop(&mut terminal, &mut app, handle, &sender, &mut receiver);

    terminal::disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn main_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut QueueApp,
    handle: &Handle,
    sender: &UnboundedSender<TaskEvent>,
    receiver: &mut UnboundedReceiver<TaskEvent>,
) -> Result<()> {
    loop {
        // Drain execution events before redrawing.
        while let Ok(event) = receiver.try_recv() {
            app.apply_event(&event);
        }

        terminal.draw(|frame| draw_ui(frame, app))?;

        if app.should_quit {
            return Ok(());
        }

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                handle_key(app, key, handle, sender);
            }
        }
    }
}

struct QueueApp {
    queues: Vec<Arc<TaskQueue>>,
    rows: Vec<Task>,
    list_state: ListState,
    status_line: String,
    should_quit: bool,
}

impl QueueApp {
    fn new(queues: Vec<Arc<TaskQueue>>) -> Self {
        let mut rows: Vec<Task> = queues.iter().flat_map(|q| q.pending_tasks()).collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut list_state = ListState::default();
        if !rows.is_empty() {
            list_state.select(Some(0));
        }

        Self {
            queues,
            rows,
            list_state,
            status_line: String::new(),
            should_quit: false,
        }
    }

    fn selected_row(&self) -> Option<&Task> {
        self.list_state.selected().and_then(|i| self.rows.get(i))
    }

    fn move_cursor(&mut self, delta: isize) {
        if self.rows.is_empty() {
            return;
        }
        let current = self.list_state.selected().unwrap_or(0) as isize;
        let last = self.rows.len() as isize - 1;
        let next = (current + delta).clamp(0, last) as usize;
        self.list_state.select(Some(next));
    }

    /// Update a row from an executor event.
    fn apply_event(&mut self, event: &TaskEvent) {
        if let Some(row) = self.rows.iter_mut().find(|t| t.id == event.task_id) {
            row.status = event.status;
        }
    }

    fn approve_selected(&mut self, handle: &Handle, sender: &UnboundedSender<TaskEvent>) {
        let Some(task) = self.selected_row().cloned() else {
            return;
        };
        if task.status != TaskStatus::Pending {
            self.status_line = format!("task {} is already {}", short_id(&task.id), task.status);
            return;
        }
        let Some(queue) = sessions::find_queue_for_task(&self.queues, &task.id) else {
            self.status_line = format!("no queue owns task {}", short_id(&task.id));
            return;
        };

        if let Err(err) = queue.approve_task(&task.id) {
            self.status_line = format!("approve failed: {err}");
            return;
        }
        self.apply_event(&TaskEvent {
            task_id: task.id.clone(),
            status: TaskStatus::Approved,
        });
        self.status_line = format!("approved {}", short_id(&task.id));

        // Execute in the background; progress comes back as events.
        let executor = TaskExecutor::new(queue, Arc::new(CommandRunner::default_timeout()))
            .with_events(sender.clone());
        let task_id = task.id;
        handle.spawn(async move {
            if let Err(err) = executor.execute_task(&task_id).await {
                warn!(task_id = %task_id, error = %err, "background execution failed");
            }
        });
    }

    fn reject_selected(&mut self) {
        let Some(task) = self.selected_row().cloned() else {
            return;
        };
        if task.status != TaskStatus::Pending {
            self.status_line = format!("task {} is already {}", short_id(&task.id), task.status);
            return;
        }
        let Some(queue) = sessions::find_queue_for_task(&self.queues, &task.id) else {
            self.status_line = format!("no queue owns task {}", short_id(&task.id));
            return;
        };

        match queue.reject_task(&task.id) {
            Ok(()) => {
                self.apply_event(&TaskEvent {
                    task_id: task.id.clone(),
                    status: TaskStatus::Rejected,
                });
                self.status_line = format!("rejected {}", short_id(&task.id));
            }
            Err(err) => self.status_line = format!("reject failed: {err}"),
        }
    }
}

fn handle_key(
    app: &mut QueueApp,
    key: KeyEvent,
    handle: &Handle,
    sender: &UnboundedSender<TaskEvent>,
) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Up | KeyCode::Char('k') => app.move_cursor(-1),
        KeyCode::Down | KeyCode::Char('j') => app.move_cursor(1),
        KeyCode::Char('a') | KeyCode::Enter => app.approve_selected(handle, sender),
        KeyCode::Char('r') => app.reject_selected(),
        _ => {}
    }
}

fn draw_ui(frame: &mut ratatui::Frame<'_>, app: &mut QueueApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let title = Paragraph::new("magpie — pending authorizations")
        .style(Style::default().add_modifier(Modifier::BOLD));
    frame.render_widget(title, chunks[0]);

    if app.rows.is_empty() {
        let empty = Paragraph::new("No pending tasks. Press q to quit.")
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(empty, chunks[1]);
    } else {
        let items: Vec<ListItem<'_>> = app
            .rows
            .iter()
            .map(|task| ListItem::new(Line::styled(row_text(task), status_style(task.status))))
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, chunks[1], &mut app.list_state);
    }

    let footer = Paragraph::new(format!(
        "[a] approve  [r] reject  [↑/↓] move  [q] quit\n{}",
        app.status_line
    ));
    frame.render_widget(footer, chunks[2]);
}

fn row_text(task: &Task) -> String {
    format!(
        "{:<8}  {:<9}  {}",
        short_id(&task.id),
        task.status.to_string(),
        task.command.command_line()
    )
}

fn status_style(status: TaskStatus) -> Style {
    let color = match status {
        TaskStatus::Pending => Color::Yellow,
        TaskStatus::Approved | TaskStatus::Executing => Color::Cyan,
        TaskStatus::Completed => Color::Green,
        TaskStatus::Rejected | TaskStatus::Failed => Color::Red,
    };
    Style::default().fg(color)
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::CommandSpec;
    use crate::security::CheckResult;
    use tempfile::TempDir;

    fn seeded_queue(dir: &TempDir, session: &str, commands: &[&str]) -> Arc<TaskQueue> {
        let queue = Arc::new(
            TaskQueue::new(
                dir.path().join(session).join("queue.json"),
                session,
            )
            .expect("open queue"),
        );
        for program in commands {
            queue
                .add_task(CommandSpec::new(*program, vec![]), CheckResult::pass())
                .unwrap();
        }
        queue
    }

    #[test]
    fn app_collects_pending_tasks_across_queues() {
        let dir = TempDir::new().unwrap();
        let a = seeded_queue(&dir, "session-a", &["echo"]);
        let b = seeded_queue(&dir, "session-b", &["pwd", "ls"]);

        let app = QueueApp::new(vec![a, b]);
        assert_eq!(app.rows.len(), 3);
        assert_eq!(app.list_state.selected(), Some(0));
    }

    #[test]
    fn cursor_clamps_at_both_ends() {
        let dir = TempDir::new().unwrap();
        let queue = seeded_queue(&dir, "session-a", &["echo", "pwd"]);
        let mut app = QueueApp::new(vec![queue]);

        app.move_cursor(-5);
        assert_eq!(app.list_state.selected(), Some(0));
        app.move_cursor(5);
        assert_eq!(app.list_state.selected(), Some(1));
    }

    #[test]
    fn apply_event_updates_the_matching_row() {
        let dir = TempDir::new().unwrap();
        let queue = seeded_queue(&dir, "session-a", &["echo"]);
        let mut app = QueueApp::new(vec![queue]);
        let id = app.rows[0].id.clone();

        app.apply_event(&TaskEvent {
            task_id: id,
            status: TaskStatus::Executing,
        });
        assert_eq!(app.rows[0].status, TaskStatus::Executing);
    }

    #[test]
    fn reject_persists_through_the_owning_queue() {
        let dir = TempDir::new().unwrap();
        let queue = seeded_queue(&dir, "session-a", &["echo"]);
        let mut app = QueueApp::new(vec![Arc::clone(&queue)]);
        let id = app.rows[0].id.clone();

        app.reject_selected();
        assert_eq!(app.rows[0].status, TaskStatus::Rejected);
        assert_eq!(queue.task(&id).unwrap().status, TaskStatus::Rejected);

        // A second attempt finds a non-pending row and changes nothing.
        app.reject_selected();
        assert!(app.status_line.contains("already"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn approve_executes_in_the_background_and_reports_events() {
        let dir = TempDir::new().unwrap();
        let queue = seeded_queue(&dir, "session-a", &["pwd"]);
        let mut app = QueueApp::new(vec![Arc::clone(&queue)]);
        let (sender, mut receiver) = unbounded_channel();

        app.approve_selected(&Handle::current(), &sender);
        assert_eq!(app.rows[0].status, TaskStatus::Approved);

        let first = receiver.recv().await.unwrap();
        assert_eq!(first.status, TaskStatus::Executing);
        let second = receiver.recv().await.unwrap();
        assert_eq!(second.status, TaskStatus::Completed);

        app.apply_event(&second);
        assert_eq!(app.rows[0].status, TaskStatus::Completed);
    }

    #[test]
    fn row_text_shows_id_status_and_command() {
        let dir = TempDir::new().unwrap();
        let queue = seeded_queue(&dir, "session-a", &["echo"]);
        let app = QueueApp::new(vec![queue]);

        let text = row_text(&app.rows[0]);
        assert!(text.contains("pending"));
        assert!(text.contains("echo"));
    }
}
