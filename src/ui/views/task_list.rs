use crate::api::types::{Exchange, NewTask, Task, TaskPriority, TaskStatus, TaskUpdate};
use crate::context::AppContext;
use crate::stores::{matches_term, TasksStore};
use crate::ui::components::{Confirm, FilterTabs, Form, FormEvent, KeyResult, SearchInput};
use crate::ui::renderfns::{deadline_label, priority_color, task_status_color, truncate};
use crate::ui::view::{Notice, ShortcutInfo, View, ViewAction};
use crate::ui::{
  ensure_valid_selection, highlight_style, list_title, navigate_list, poll_mutation,
  render_placeholder, titled_block, today, Mutation,
};
use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState};

enum Modal {
  Create(Form),
  Edit { form: Form, id: String },
  Delete { confirm: Confirm, id: String, title: String },
}

/// Tasks across all exchanges, or one exchange's tasks when opened from
/// its detail view.
pub struct TaskListView {
  store: TasksStore,
  exchange: Option<(String, String)>,
  tabs: FilterTabs<TaskStatus>,
  search: SearchInput,
  list_state: ListState,
  modal: Option<Modal>,
  mutation: Option<Mutation>,
}

impl TaskListView {
  pub fn new(ctx: AppContext) -> Self {
    Self::build(ctx, None)
  }

  pub fn for_exchange(ctx: AppContext, exchange: &Exchange) -> Self {
    Self::build(ctx, Some((exchange.id.clone(), exchange.name.clone())))
  }

  fn build(ctx: AppContext, exchange: Option<(String, String)>) -> Self {
    let store = TasksStore::new(
      ctx.api.clone(),
      &ctx.caches,
      exchange.as_ref().map(|(id, _)| id.clone()),
    );
    Self {
      store,
      exchange,
      tabs: FilterTabs::new("status", TaskStatus::ALL.to_vec()),
      search: SearchInput::new(),
      list_state: ListState::default(),
      modal: None,
      mutation: None,
    }
  }

  fn tasks(&self) -> Vec<&Task> {
    let term = self.search.query();
    let rows = match self.tabs.selected() {
      Some(status) => self.store.by_status(*status),
      None => self.store.tasks().iter().collect(),
    };
    rows
      .into_iter()
      .filter(|t| {
        matches_term(
          term,
          &[
            Some(t.title.as_str()),
            t.description.as_deref(),
            t.assigned_to.as_deref(),
          ],
        )
      })
      .collect()
  }

  fn selected(&self) -> Option<&Task> {
    self
      .list_state
      .selected()
      .and_then(|i| self.tasks().get(i).copied())
  }

  fn create_form() -> Form {
    Form::new("New task")
      .field("Title")
      .field("Description")
      .field_with("Priority", TaskPriority::default().label())
      .field("Due (YYYY-MM-DD)")
  }

  fn edit_form(task: &Task) -> Form {
    let due = task.due_date.map(|d| d.to_string()).unwrap_or_default();
    Form::new("Edit task")
      .field_with("Title", &task.title)
      .field_with("Description", task.description.as_deref().unwrap_or_default())
      .field_with("Priority", task.priority.label())
      .field_with("Due (YYYY-MM-DD)", &due)
  }

  fn submit_create(&mut self, values: Vec<String>) -> ViewAction {
    let [title, description, priority, due] = <[String; 4]>::try_from(values).unwrap_or_default();
    let (priority, due_date) = match parse_schedule(&priority, &due) {
      Ok(parsed) => parsed,
      Err(notice) => return ViewAction::Notify(notice),
    };

    let task = NewTask {
      title,
      description: Some(description).filter(|d| !d.is_empty()),
      priority,
      assigned_to: None,
      exchange_id: self.exchange.as_ref().map(|(id, _)| id.clone()),
      due_date,
    };
    self.mutation = Some(Mutation::start(self.store.create(task), |t| {
      format!("Created task {}", t.title)
    }));
    ViewAction::None
  }

  fn submit_edit(&mut self, id: String, values: Vec<String>) -> ViewAction {
    let [title, description, priority, due] = <[String; 4]>::try_from(values).unwrap_or_default();
    if title.is_empty() {
      return ViewAction::Notify(Notice::error("Please fill in all fields"));
    }
    let (priority, due_date) = match parse_schedule(&priority, &due) {
      Ok(parsed) => parsed,
      Err(notice) => return ViewAction::Notify(notice),
    };

    let update = TaskUpdate {
      title: Some(title),
      description: Some(description),
      priority: Some(priority),
      due_date,
      ..Default::default()
    };
    self.mutation = Some(Mutation::start(self.store.update(id, update), |t| {
      format!("Updated task {}", t.title)
    }));
    ViewAction::None
  }

  fn handle_modal(&mut self, key: KeyEvent) -> ViewAction {
    let Some(modal) = &mut self.modal else {
      return ViewAction::None;
    };
    match modal {
      Modal::Create(form) => match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted(values)) => {
          self.modal = None;
          return self.submit_create(values);
        }
        KeyResult::Event(FormEvent::Cancelled) => self.modal = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      },
      Modal::Edit { form, id } => match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted(values)) => {
          let id = id.clone();
          self.modal = None;
          return self.submit_edit(id, values);
        }
        KeyResult::Event(FormEvent::Cancelled) => self.modal = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      },
      Modal::Delete { confirm, id, title } => match confirm.handle_key(key) {
        KeyResult::Event(true) => {
          let title = title.clone();
          let future = self.store.delete(id.clone());
          self.mutation = Some(Mutation::start(future, move |_| format!("Deleted {}", title)));
          self.modal = None;
        }
        KeyResult::Event(false) => self.modal = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      },
    }
    ViewAction::None
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let today = today();
    let tasks = self.tasks();
    let len = tasks.len();
    let name = match &self.exchange {
      Some((_, name)) => format!("Tasks [{}]", name),
      None => "Tasks".to_string(),
    };
    let title = list_title(&name, self.store.is_loading(), self.store.error(), len);
    let title = format!("{}{}", title, self.search.title_suffix());
    let block = titled_block(title, Color::Blue);

    if tasks.is_empty() && !self.store.is_loading() {
      render_placeholder(frame, area, block, "No tasks found.");
      return;
    }

    let items: Vec<ListItem> = tasks
      .iter()
      .map(|task| {
        let (due, due_color) = deadline_label(task.due_date, today);
        let due_style = if task.is_overdue(today) {
          Style::default().fg(Color::Red).bold()
        } else {
          Style::default().fg(due_color)
        };
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<12}", task.status.label()),
            Style::default().fg(task_status_color(task.status)),
          ),
          Span::styled(
            format!("{:<8}", task.priority.label()),
            Style::default().fg(priority_color(task.priority)),
          ),
          Span::styled(format!("{:<20}", due), due_style),
          Span::raw(truncate(&task.title, 60)),
        ]))
      })
      .collect();

    ensure_valid_selection(&mut self.list_state, len);
    let list = List::new(items)
      .block(block)
      .highlight_style(highlight_style())
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for TaskListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.modal.is_some() {
      return self.handle_modal(key);
    }

    match self.search.handle_key(key) {
      KeyResult::Event(_) => {
        self.list_state.select(Some(0));
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    if let KeyResult::Event(_) = self.tabs.handle_key(key) {
      self.list_state.select(Some(0));
      return ViewAction::None;
    }

    let len = self.tasks().len();
    if navigate_list(&mut self.list_state, key, len) {
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('r') => self.store.refresh(),
      KeyCode::Char('s') => {
        if let Some(task) = self.selected() {
          let next = task.status.next();
          let title = task.title.clone();
          let future = self.store.update_status(task.id.clone(), next);
          self.mutation = Some(Mutation::start(future, move |_| {
            format!("{} → {}", title, next.label())
          }));
        }
      }
      KeyCode::Char('n') => self.modal = Some(Modal::Create(Self::create_form())),
      KeyCode::Char('e') => {
        if let Some(task) = self.selected() {
          let (form, id) = (Self::edit_form(task), task.id.clone());
          self.modal = Some(Modal::Edit { form, id });
        }
      }
      KeyCode::Char('x') => {
        if let Some(task) = self.selected() {
          let (id, title) = (task.id.clone(), task.title.clone());
          self.modal = Some(Modal::Delete {
            confirm: Confirm::new(format!("Delete task \"{}\"?", truncate(&title, 40))),
            id,
            title,
          });
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let [tabs, list] =
      Layout::vertical([Constraint::Length(1), Constraint::Min(1)]).areas(area);
    self.tabs.render(frame, tabs);
    self.render_list(frame, list);
    self.search.render_overlay(frame, area);

    match &self.modal {
      Some(Modal::Create(form)) | Some(Modal::Edit { form, .. }) => form.render(frame, area),
      Some(Modal::Delete { confirm, .. }) => confirm.render(frame, area),
      None => {}
    }
  }

  fn breadcrumb_label(&self) -> String {
    match &self.exchange {
      Some(_) => "Tasks".to_string(),
      None => "All tasks".to_string(),
    }
  }

  fn tick(&mut self) -> ViewAction {
    self.store.poll();
    match poll_mutation(&mut self.mutation) {
      Some(outcome) => {
        if outcome.is_ok() {
          self.store.refresh();
        }
        ViewAction::Notify(outcome.into())
      }
      None => ViewAction::None,
    }
  }

  fn is_capturing_input(&self) -> bool {
    self.search.is_active() || self.modal.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(12),
      ShortcutInfo::new("[ ]", "status").with_priority(14),
      ShortcutInfo::new("s", "advance").with_priority(16),
      ShortcutInfo::new("n", "new").with_priority(18),
      ShortcutInfo::new("e", "edit").with_priority(19),
      ShortcutInfo::new("x", "delete").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}

/// Priority label and optional `YYYY-MM-DD` due date from form input.
fn parse_schedule(priority: &str, due: &str) -> Result<(TaskPriority, Option<NaiveDate>), Notice> {
  let priority = TaskPriority::parse(priority)
    .ok_or_else(|| Notice::error(format!("Unknown priority: {}", priority)))?;
  if due.is_empty() {
    return Ok((priority, None));
  }
  NaiveDate::parse_from_str(due, "%Y-%m-%d")
    .map(|date| (priority, Some(date)))
    .map_err(|_| Notice::error("Due date must be YYYY-MM-DD"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::tests::context_for;
  use crate::ui::view::NoticeLevel;
  use crate::ui::views::tests::{code, key, render_text, tick_until, type_text};
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn server_with_tasks() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/tasks"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "tasks": [
          { "id": "t1", "title": "Order title report", "status": "pending", "priority": "high" },
          { "id": "t2", "title": "Wire funds", "status": "in_progress" },
          { "id": "t3", "title": "Close file", "status": "completed" }
        ]
      })))
      .mount(&server)
      .await;
    server
  }

  fn titles(view: &TaskListView) -> Vec<String> {
    view.tasks().iter().map(|t| t.title.clone()).collect()
  }

  #[tokio::test]
  async fn test_status_tabs_filter() {
    let server = server_with_tasks().await;
    let mut view = TaskListView::new(context_for(&server));
    tick_until(&mut view, |v| !v.store.is_loading()).await;
    assert_eq!(titles(&view).len(), 3);

    view.handle_key(key(']'));
    assert_eq!(titles(&view), vec!["Order title report"]);
    view.handle_key(key(']'));
    assert_eq!(titles(&view), vec!["Wire funds"]);

    let screen = render_text(&mut view);
    assert!(screen.contains("In Progress"));
  }

  #[tokio::test]
  async fn test_advance_status_refreshes() {
    let server = server_with_tasks().await;
    Mock::given(method("PUT"))
      .and(path("/tasks/t1"))
      .and(body_partial_json(json!({ "status": "in_progress" })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "task": { "id": "t1", "title": "Order title report", "status": "in_progress" }
      })))
      .expect(1)
      .mount(&server)
      .await;

    let mut view = TaskListView::new(context_for(&server));
    tick_until(&mut view, |v| !v.store.is_loading()).await;
    render_text(&mut view);

    view.handle_key(key('s'));
    let actions = tick_until(&mut view, |v| v.mutation.is_none()).await;
    assert!(matches!(
      actions.as_slice(),
      [ViewAction::Notify(n)] if n.text == "Order title report → In Progress"
    ));
    assert!(view.store.is_loading());
  }

  #[tokio::test]
  async fn test_create_rejects_bad_input() {
    let server = server_with_tasks().await;
    let mut view = TaskListView::new(context_for(&server));

    view.handle_key(key('n'));
    assert!(view.is_capturing_input());
    type_text(&mut view, "Call QI");
    view.handle_key(code(KeyCode::Enter));
    view.handle_key(code(KeyCode::Enter));
    view.handle_key(code(KeyCode::Enter));
    type_text(&mut view, "next week");
    match view.handle_key(code(KeyCode::Enter)) {
      ViewAction::Notify(n) => {
        assert_eq!(n.level, NoticeLevel::Error);
        assert_eq!(n.text, "Due date must be YYYY-MM-DD");
      }
      other => panic!("expected notice, got {:?}", other),
    }
    assert!(view.mutation.is_none());
  }

  #[tokio::test]
  async fn test_create_without_title_fails_validation() {
    let server = server_with_tasks().await;
    let mut view = TaskListView::new(context_for(&server));

    view.handle_key(key('n'));
    for _ in 0..4 {
      view.handle_key(code(KeyCode::Enter));
    }
    let actions = tick_until(&mut view, |v| v.mutation.is_none()).await;
    assert!(matches!(
      actions.as_slice(),
      [ViewAction::Notify(n)] if n.text == "Please fill in all fields"
    ));
  }

  #[tokio::test]
  async fn test_edit_sends_task_update() {
    let server = server_with_tasks().await;
    Mock::given(method("PUT"))
      .and(path("/tasks/t1"))
      .and(body_partial_json(json!({
        "title": "Order title report",
        "priority": "urgent",
        "due_date": "2026-11-02"
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "task": { "id": "t1", "title": "Order title report", "priority": "urgent" }
      })))
      .expect(1)
      .mount(&server)
      .await;

    let mut view = TaskListView::new(context_for(&server));
    tick_until(&mut view, |v| !v.store.is_loading()).await;
    render_text(&mut view);

    view.handle_key(key('e'));
    assert!(render_text(&mut view).contains("Edit task"));
    view.handle_key(code(KeyCode::Enter));
    view.handle_key(code(KeyCode::Enter));
    for _ in 0.."high".len() {
      view.handle_key(code(KeyCode::Backspace));
    }
    type_text(&mut view, "urgent");
    view.handle_key(code(KeyCode::Enter));
    type_text(&mut view, "2026-11-02");
    view.handle_key(code(KeyCode::Enter));

    let actions = tick_until(&mut view, |v| v.mutation.is_none()).await;
    assert!(matches!(
      actions.as_slice(),
      [ViewAction::Notify(n)] if n.text == "Updated task Order title report"
    ));
  }
}
