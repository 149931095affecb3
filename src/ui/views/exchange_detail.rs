use crate::api::envelope::decode_list;
use crate::api::types::{
  Exchange, ExchangeParticipant, ExchangeStatus, ExchangeUpdate, Message, NewMessage,
};
use crate::api::ApiService;
use crate::cache::QueryKey;
use crate::context::AppContext;
use crate::query::{CacheBinding, CachedQuery, Query, QueryOptions};
use crate::stores::{format_currency, TasksStore};
use crate::ui::components::{Form, FormEvent, KeyResult};
use crate::ui::renderfns::{
  deadline_label, exchange_status_color, format_timestamp, priority_color, task_status_color,
  truncate,
};
use crate::ui::view::{Notice, ShortcutInfo, View, ViewAction};
use crate::ui::views::{DocumentListView, TaskListView};
use crate::ui::{
  ensure_valid_selection, highlight_style, list_title, navigate_list, poll_mutation, titled_block,
  today, Mutation,
};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState, Paragraph};
use std::sync::Arc;
use std::time::Duration;

/// Participant lists change rarely but matter when they do.
const PARTICIPANTS_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
  Tasks,
  Participants,
  Messages,
}

impl Pane {
  fn next(self) -> Self {
    match self {
      Pane::Tasks => Pane::Participants,
      Pane::Participants => Pane::Messages,
      Pane::Messages => Pane::Tasks,
    }
  }
}

enum Modal {
  Compose(Form),
  Status(Form),
}

/// What a running mutation touches, so only that data is reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
  Task,
  Message,
  Status,
}

/// One exchange: summary, its tasks, participants and message thread.
pub struct ExchangeDetailView {
  ctx: AppContext,
  exchange: Exchange,
  /// Re-read of the exchange row after a status change or refresh
  reload: Option<Query<Exchange>>,
  tasks: TasksStore,
  participants: CachedQuery<Vec<ExchangeParticipant>>,
  messages: CachedQuery<Vec<Message>>,
  focus: Pane,
  task_state: ListState,
  participant_state: ListState,
  message_state: ListState,
  modal: Option<Modal>,
  mutation: Option<Mutation>,
  change: Change,
}

impl ExchangeDetailView {
  pub fn new(ctx: AppContext, exchange: Exchange) -> Self {
    let tasks = TasksStore::new(ctx.api.clone(), &ctx.caches, Some(exchange.id.clone()));

    let participants = {
      let api = ctx.api.clone();
      let path = ApiService::participants_path(&exchange.id);
      CachedQuery::new(
        CacheBinding::new(
          Arc::clone(&ctx.caches.exchanges),
          QueryKey::ExchangeParticipants {
            exchange_id: exchange.id.clone(),
          },
        )
        .with_ttl(PARTICIPANTS_TTL),
        QueryOptions::default(),
        move || {
          let api = api.clone();
          let path = path.clone();
          async move { api.get(&path).await }
        },
        |raw| decode_list::<ExchangeParticipant>(raw, "participants"),
      )
    };

    let messages = {
      let api = ctx.api.clone();
      let exchange_id = exchange.id.clone();
      CachedQuery::new(
        CacheBinding::new(
          Arc::clone(&ctx.caches.general),
          QueryKey::Messages {
            exchange_id: exchange.id.clone(),
          },
        ),
        QueryOptions::default(),
        move || {
          let api = api.clone();
          let exchange_id = exchange_id.clone();
          async move { api.get_messages_raw(&exchange_id).await }
        },
        |raw| decode_list::<Message>(raw, "messages"),
      )
    };

    Self {
      ctx,
      exchange,
      reload: None,
      tasks,
      participants,
      messages,
      focus: Pane::Tasks,
      task_state: ListState::default(),
      participant_state: ListState::default(),
      message_state: ListState::default(),
      modal: None,
      mutation: None,
      change: Change::Task,
    }
  }

  fn start(&mut self, mutation: Mutation, change: Change) {
    self.mutation = Some(mutation);
    self.change = change;
  }

  fn reload_exchange(&mut self) {
    let api = self.ctx.api.clone();
    let id = self.exchange.id.clone();
    self.reload = Some(Query::once(async move { api.get_exchange(&id).await }));
  }

  fn participants(&self) -> &[ExchangeParticipant] {
    self.participants.data().map(Vec::as_slice).unwrap_or(&[])
  }

  fn messages(&self) -> &[Message] {
    self.messages.data().map(Vec::as_slice).unwrap_or(&[])
  }

  fn refresh(&mut self) {
    self.reload_exchange();
    self.tasks.refresh();
    self.participants.refetch();
    self.messages.refetch();
  }

  fn focused_len(&self) -> usize {
    match self.focus {
      Pane::Tasks => self.tasks.tasks().len(),
      Pane::Participants => self.participants().len(),
      Pane::Messages => self.messages().len(),
    }
  }

  fn focused_state(&mut self) -> &mut ListState {
    match self.focus {
      Pane::Tasks => &mut self.task_state,
      Pane::Participants => &mut self.participant_state,
      Pane::Messages => &mut self.message_state,
    }
  }

  fn border(&self, pane: Pane) -> Color {
    if self.focus == pane {
      Color::Cyan
    } else {
      Color::Blue
    }
  }

  fn advance_selected_task(&mut self) -> ViewAction {
    let Some(task) = self
      .task_state
      .selected()
      .and_then(|i| self.tasks.tasks().get(i))
    else {
      return ViewAction::None;
    };
    let next = task.status.next();
    let title = task.title.clone();
    let mutation = Mutation::start(self.tasks.update_status(task.id.clone(), next), move |_| {
      format!("{} → {}", title, next.label())
    });
    self.start(mutation, Change::Task);
    ViewAction::None
  }

  fn status_form(&self) -> Form {
    Form::new("Status: Pending, 45-Day, 180-Day, On Hold, Completed, Terminated")
      .field_with("Status", self.exchange.status.label())
  }

  fn submit_status(&mut self, values: Vec<String>) -> ViewAction {
    let input = values.into_iter().next().unwrap_or_default();
    let Some(status) = ExchangeStatus::parse(&input) else {
      return ViewAction::Notify(Notice::error(format!("Unknown status: {}", input)));
    };
    if status == self.exchange.status {
      return ViewAction::None;
    }

    let api = self.ctx.api.clone();
    let exchanges = Arc::clone(&self.ctx.caches.exchanges);
    let id = self.exchange.id.clone();
    let update = ExchangeUpdate {
      status: Some(status),
      ..Default::default()
    };
    let future = async move {
      let updated = api.update_exchange(&id, &update).await?;
      exchanges.delete(&QueryKey::Exchanges.cache_key());
      Ok::<_, crate::api::ApiError>(updated)
    };
    let mutation = Mutation::start(future, |e: Exchange| {
      format!("{} → {}", e.name, e.status.label())
    });
    self.start(mutation, Change::Status);
    ViewAction::None
  }

  fn send_message(&mut self, content: String) {
    let api = self.ctx.api.clone();
    let message = NewMessage {
      exchange_id: self.exchange.id.clone(),
      sender_id: self.ctx.session.user().ok().flatten().map(|u| u.id),
      content,
    };
    let mutation = Mutation::start(async move { api.send_message(&message).await }, |_| {
      "Message sent".to_string()
    });
    self.start(mutation, Change::Message);
  }

  fn render_summary(&self, frame: &mut Frame, area: Rect) {
    let today = today();
    let e = &self.exchange;
    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::DarkGray));
    let (id_deadline, id_color) = deadline_label(e.identification_deadline, today);
    let (close_deadline, close_color) = deadline_label(e.completion_deadline, today);

    let lines = vec![
      Line::from(vec![
        label("Status:      "),
        Span::styled(
          e.status.label(),
          Style::default().fg(exchange_status_color(e.status)).bold(),
        ),
        label("    Value: "),
        Span::raw(e.exchange_value.map(format_currency).unwrap_or_else(|| "-".into())),
      ]),
      Line::from(vec![
        label("Client:      "),
        Span::raw(e.client_name.clone().unwrap_or_else(|| "-".into())),
      ]),
      Line::from(vec![
        label("Property:    "),
        Span::raw(
          e.relinquished_property_address
            .clone()
            .unwrap_or_else(|| "-".into()),
        ),
      ]),
      Line::from(vec![
        label("45-day:      "),
        Span::styled(id_deadline, Style::default().fg(id_color)),
        label("    180-day: "),
        Span::styled(close_deadline, Style::default().fg(close_color)),
      ]),
    ];

    let block = titled_block(format!(" {} ", e.name), Color::Blue);
    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn render_tasks(&mut self, frame: &mut Frame, area: Rect) {
    let today = today();
    let items: Vec<ListItem> = self
      .tasks
      .tasks()
      .iter()
      .map(|task| {
        let (due, due_color) = deadline_label(task.due_date, today);
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<12}", task.status.label()),
            Style::default().fg(task_status_color(task.status)),
          ),
          Span::styled(
            format!("{:<8}", task.priority.label()),
            Style::default().fg(priority_color(task.priority)),
          ),
          Span::raw(format!("{:<30} ", truncate(&task.title, 29))),
          Span::styled(due, Style::default().fg(due_color)),
        ]))
      })
      .collect();

    let title = list_title(
      "Tasks",
      self.tasks.is_loading(),
      self.tasks.error(),
      items.len(),
    );
    ensure_valid_selection(&mut self.task_state, items.len());
    let list = List::new(items)
      .block(titled_block(title, self.border(Pane::Tasks)))
      .highlight_style(highlight_style())
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.task_state);
  }

  fn render_participants(&mut self, frame: &mut Frame, area: Rect) {
    let items: Vec<ListItem> = self
      .participants()
      .iter()
      .map(|p| {
        let who = p
          .name
          .as_deref()
          .or(p.email.as_deref())
          .unwrap_or("(unknown)");
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<14}", truncate(&p.role, 13)), Style::default().fg(Color::Yellow)),
          Span::raw(truncate(who, 30)),
        ]))
      })
      .collect();

    let title = list_title(
      "Participants",
      self.participants.is_loading(),
      self.participants.error(),
      items.len(),
    );
    ensure_valid_selection(&mut self.participant_state, items.len());
    let list = List::new(items)
      .block(titled_block(title, self.border(Pane::Participants)))
      .highlight_style(highlight_style())
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.participant_state);
  }

  fn render_messages(&mut self, frame: &mut Frame, area: Rect) {
    let items: Vec<ListItem> = self
      .messages()
      .iter()
      .map(|m| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{}  ", format_timestamp(m.created_at)),
            Style::default().fg(Color::DarkGray),
          ),
          Span::raw(m.content.clone()),
        ]))
      })
      .collect();

    let title = list_title(
      "Messages",
      self.messages.is_loading(),
      self.messages.error(),
      items.len(),
    );
    ensure_valid_selection(&mut self.message_state, items.len());
    let list = List::new(items)
      .block(titled_block(title, self.border(Pane::Messages)))
      .highlight_style(highlight_style())
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.message_state);
  }
}

impl View for ExchangeDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(modal) = &mut self.modal {
      let form = match modal {
        Modal::Compose(form) | Modal::Status(form) => form,
      };
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted(values)) => {
          if let Some(Modal::Status(_)) = self.modal.take() {
            return self.submit_status(values);
          }
          let content = values.into_iter().next().unwrap_or_default();
          self.send_message(content);
        }
        KeyResult::Event(FormEvent::Cancelled) => self.modal = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      }
      return ViewAction::None;
    }

    let len = self.focused_len();
    if navigate_list(self.focused_state(), key, len) {
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Tab => self.focus = self.focus.next(),
      KeyCode::Char('r') => self.refresh(),
      KeyCode::Char('s') if self.focus == Pane::Tasks => return self.advance_selected_task(),
      KeyCode::Char('m') => {
        self.modal = Some(Modal::Compose(Form::new("Send message").field("Message")));
      }
      KeyCode::Char('e') => self.modal = Some(Modal::Status(self.status_form())),
      KeyCode::Char('t') => {
        return ViewAction::Push(Box::new(TaskListView::for_exchange(
          self.ctx.clone(),
          &self.exchange,
        )));
      }
      KeyCode::Char('d') => {
        return ViewAction::Push(Box::new(DocumentListView::for_exchange(
          self.ctx.clone(),
          &self.exchange,
        )));
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let [summary, body, messages] = Layout::vertical([
      Constraint::Length(6),
      Constraint::Min(5),
      Constraint::Percentage(30),
    ])
    .areas(area);
    let [tasks, participants] =
      Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(body);

    self.render_summary(frame, summary);
    self.render_tasks(frame, tasks);
    self.render_participants(frame, participants);
    self.render_messages(frame, messages);

    if let Some(Modal::Compose(form) | Modal::Status(form)) = &self.modal {
      form.render(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    if self.exchange.name.is_empty() {
      self.exchange.id.clone()
    } else {
      self.exchange.name.clone()
    }
  }

  fn tick(&mut self) -> ViewAction {
    self.tasks.poll();
    self.participants.poll();
    self.messages.poll();
    if let Some(reload) = &mut self.reload {
      if reload.poll() {
        if let Some(exchange) = reload.data() {
          self.exchange = exchange.clone();
        }
        self.reload = None;
      }
    }

    match poll_mutation(&mut self.mutation) {
      Some(outcome) => {
        if outcome.is_ok() {
          match self.change {
            Change::Task => self.tasks.refresh(),
            Change::Message => self.messages.invalidate(),
            Change::Status => self.reload_exchange(),
          }
        }
        ViewAction::Notify(outcome.into())
      }
      None => ViewAction::None,
    }
  }

  fn is_capturing_input(&self) -> bool {
    self.modal.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("tab", "pane").with_priority(15),
      ShortcutInfo::new("s", "advance task").with_priority(20),
      ShortcutInfo::new("e", "status").with_priority(21),
      ShortcutInfo::new("m", "message").with_priority(22),
      ShortcutInfo::new("t/d", "tasks/docs").with_priority(24),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}
