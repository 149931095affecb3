use crate::api::types::{PracticePantherStatus, PracticePantherSyncLog};
use crate::api::ApiService;
use crate::context::AppContext;
use crate::query::Query;
use crate::ui::components::{Confirm, KeyResult};
use crate::ui::renderfns::{format_timestamp, truncate};
use crate::ui::view::{Notice, ShortcutInfo, View, ViewAction};
use crate::ui::{
  ensure_valid_selection, highlight_style, navigate_list, poll_mutation, render_placeholder,
  titled_block, Mutation,
};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState, Paragraph};

const SYNC_TYPES: [&str; 3] = ["full", "contacts", "matters"];

fn sync_status_color(status: &str) -> Color {
  match status {
    "completed" | "success" => Color::Green,
    "failed" | "error" => Color::Red,
    "running" | "in_progress" | "pending" => Color::Yellow,
    _ => Color::Gray,
  }
}

/// PracticePanther connection status, sync history and sync controls.
pub struct PracticePantherView {
  api: ApiService,
  status: Query<PracticePantherStatus>,
  logs: Query<Vec<PracticePantherSyncLog>>,
  list_state: ListState,
  sync_type: usize,
  confirm: Option<Confirm>,
  mutation: Option<Mutation>,
}

impl PracticePantherView {
  pub fn new(ctx: AppContext) -> Self {
    let api = ctx.api.clone();

    let status_api = api.clone();
    let mut status = Query::new(move || {
      let api = status_api.clone();
      async move { api.get_pp_status().await }
    });
    status.fetch();

    let logs_api = api.clone();
    let mut logs = Query::new(move || {
      let api = logs_api.clone();
      async move { api.get_pp_sync_logs().await }
    });
    logs.fetch();

    Self {
      api,
      status,
      logs,
      list_state: ListState::default(),
      sync_type: 0,
      confirm: None,
      mutation: None,
    }
  }

  fn logs(&self) -> &[PracticePantherSyncLog] {
    self.logs.data().map(Vec::as_slice).unwrap_or(&[])
  }

  fn is_connected(&self) -> bool {
    self.status.data().is_some_and(|s| s.connected)
  }

  fn refresh(&mut self) {
    self.status.refetch();
    self.logs.refetch();
  }

  fn sync(&mut self) {
    let api = self.api.clone();
    let sync_type = SYNC_TYPES[self.sync_type];
    let future = async move { api.trigger_pp_sync(sync_type).await };
    self.mutation = Some(Mutation::start(future, move |log| match log {
      Some(log) if !log.status.is_empty() => format!("{} sync {}", sync_type, log.status),
      _ => format!("{} sync started", sync_type),
    }));
  }

  fn disconnect(&mut self) {
    let api = self.api.clone();
    let future = async move { api.disconnect_pp().await };
    self.mutation = Some(Mutation::start(future, |_| {
      "Disconnected from PracticePanther".to_string()
    }));
  }

  fn status_lines(&self) -> Vec<Line<'static>> {
    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::DarkGray));
    let status = match (self.status.data(), self.status.error()) {
      (Some(status), _) => status,
      (None, Some(e)) => {
        return vec![Line::styled(
          format!("Status unavailable: {}", e),
          Style::default().fg(Color::Red),
        )]
      }
      (None, None) => return vec![Line::raw("Loading...")],
    };

    let connection = if status.connected {
      Span::styled("connected", Style::default().fg(Color::Green).bold())
    } else {
      Span::styled("not connected", Style::default().fg(Color::Red).bold())
    };
    let mut first = vec![label("Connection: "), connection];
    if let Some(account) = &status.account_name {
      first.push(Span::raw(format!("  ({})", account)));
    }

    vec![
      Line::from(first),
      Line::from(vec![
        label("Last sync:  "),
        Span::raw(format_timestamp(status.last_sync_at)),
        label("   Token expires: "),
        Span::raw(format_timestamp(status.token_expires_at)),
      ]),
      Line::from(vec![
        label("Synced:     "),
        Span::raw(format!(
          "{} contacts, {} matters",
          status.contacts_synced, status.matters_synced
        )),
      ]),
      Line::from(vec![
        label("Sync type:  "),
        Span::styled(
          SYNC_TYPES[self.sync_type].to_string(),
          Style::default().fg(Color::Yellow),
        ),
        label("  (t to change)"),
      ]),
    ]
  }

  fn render_logs(&mut self, frame: &mut Frame, area: Rect) {
    let title = if let Some(e) = self.logs.error() {
      format!(" Sync history (error: {}) ", e)
    } else if self.logs.is_loading() {
      " Sync history (loading...) ".to_string()
    } else {
      format!(" Sync history ({}) ", self.logs().len())
    };
    let block = titled_block(title, Color::Blue);
    if self.logs().is_empty() && !self.logs.is_loading() {
      render_placeholder(frame, area, block, "No sync runs yet.");
      return;
    }

    let items: Vec<ListItem> = self
      .logs()
      .iter()
      .map(|log| {
        let mut spans = vec![
          Span::styled(
            format!("{:<18}", format_timestamp(log.started_at)),
            Style::default().fg(Color::DarkGray),
          ),
          Span::raw(format!("{:<10}", truncate(&log.sync_type, 9))),
          Span::styled(
            format!("{:<12}", truncate(&log.status, 11)),
            Style::default().fg(sync_status_color(&log.status)),
          ),
          Span::raw(format!("{:>6} records", log.records_processed)),
        ];
        if let Some(error) = &log.error_message {
          spans.push(Span::styled(
            format!("  {}", truncate(error, 50)),
            Style::default().fg(Color::Red),
          ));
        }
        ListItem::new(Line::from(spans))
      })
      .collect();

    let len = items.len();
    ensure_valid_selection(&mut self.list_state, len);
    let list = List::new(items)
      .block(block)
      .highlight_style(highlight_style())
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for PracticePantherView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(confirm) = &mut self.confirm {
      match confirm.handle_key(key) {
        KeyResult::Event(true) => {
          self.confirm = None;
          self.disconnect();
        }
        KeyResult::Event(false) => self.confirm = None,
        _ => {}
      }
      return ViewAction::None;
    }

    let len = self.logs().len();
    if navigate_list(&mut self.list_state, key, len) {
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('s') if self.mutation.is_none() => {
        if self.is_connected() {
          self.sync();
        } else {
          return ViewAction::Notify(Notice::error("PracticePanther is not connected"));
        }
      }
      KeyCode::Char('t') => self.sync_type = (self.sync_type + 1) % SYNC_TYPES.len(),
      KeyCode::Char('D') if self.is_connected() => {
        self.confirm = Some(Confirm::new("Disconnect PracticePanther?"));
      }
      KeyCode::Char('r') => self.refresh(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let [status, logs] =
      Layout::vertical([Constraint::Length(6), Constraint::Min(3)]).areas(area);
    let title = if self.mutation.is_some() {
      " PracticePanther (working...) ".to_string()
    } else {
      " PracticePanther ".to_string()
    };
    frame.render_widget(
      Paragraph::new(self.status_lines()).block(titled_block(title, Color::Blue)),
      status,
    );
    self.render_logs(frame, logs);
    if let Some(confirm) = &self.confirm {
      confirm.render(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    "PracticePanther".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    self.status.poll();
    self.logs.poll();
    match poll_mutation(&mut self.mutation) {
      Some(outcome) => {
        if outcome.is_ok() {
          self.refresh();
        }
        ViewAction::Notify(outcome.into())
      }
      None => ViewAction::None,
    }
  }

  fn is_capturing_input(&self) -> bool {
    self.confirm.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("s", "sync").with_priority(12),
      ShortcutInfo::new("t", "sync type").with_priority(14),
      ShortcutInfo::new("D", "disconnect").with_priority(16),
      ShortcutInfo::new("r", "refresh").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::tests::context_for;
  use crate::ui::view::NoticeLevel;
  use crate::ui::views::tests::{key, render_text, tick_until};
  use serde_json::json;
  use wiremock::matchers::{body_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn server_with(connected: bool) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/integrations/practicepanther/status"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "status": { "connected": connected, "account_name": "Acme Law",
                    "contacts_synced": 42, "matters_synced": 7 }
      })))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/integrations/practicepanther/sync-logs"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "logs": [
          { "id": "l1", "sync_type": "full", "status": "failed", "records_processed": 3,
            "error_message": "token expired" }
        ]
      })))
      .mount(&server)
      .await;
    server
  }

  fn loaded(v: &PracticePantherView) -> bool {
    !v.status.is_loading() && !v.logs.is_loading()
  }

  #[tokio::test]
  async fn test_renders_status_and_history() {
    let server = server_with(true).await;
    let mut view = PracticePantherView::new(context_for(&server));
    tick_until(&mut view, loaded).await;

    let screen = render_text(&mut view);
    assert!(screen.contains("Acme Law"));
    assert!(screen.contains("42 contacts, 7 matters"));
    assert!(screen.contains("token expired"));
  }

  #[tokio::test]
  async fn test_sync_posts_selected_type() {
    let server = server_with(true).await;
    Mock::given(method("POST"))
      .and(path("/integrations/practicepanther/sync"))
      .and(body_json(json!({ "syncType": "contacts" })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
      .expect(1)
      .mount(&server)
      .await;

    let mut view = PracticePantherView::new(context_for(&server));
    tick_until(&mut view, loaded).await;

    view.handle_key(key('t'));
    view.handle_key(key('s'));
    let actions = tick_until(&mut view, |v| v.mutation.is_none()).await;
    assert!(matches!(
      actions.as_slice(),
      [ViewAction::Notify(n)] if n.text == "contacts sync started"
    ));
  }

  #[tokio::test]
  async fn test_sync_refused_when_disconnected() {
    let server = server_with(false).await;
    let mut view = PracticePantherView::new(context_for(&server));
    tick_until(&mut view, loaded).await;

    let action = view.handle_key(key('s'));
    assert!(matches!(action, ViewAction::Notify(n) if n.level == NoticeLevel::Error));
    assert!(view.mutation.is_none());

    view.handle_key(key('D'));
    assert!(view.confirm.is_none());
  }

  #[tokio::test]
  async fn test_disconnect_requires_confirmation() {
    let server = server_with(true).await;
    Mock::given(method("POST"))
      .and(path("/integrations/practicepanther/disconnect"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
      .expect(1)
      .mount(&server)
      .await;

    let mut view = PracticePantherView::new(context_for(&server));
    tick_until(&mut view, loaded).await;

    view.handle_key(key('D'));
    assert!(view.is_capturing_input());
    view.handle_key(key('y'));
    let actions = tick_until(&mut view, |v| v.mutation.is_none()).await;
    assert!(matches!(
      actions.as_slice(),
      [ViewAction::Notify(n)] if n.text == "Disconnected from PracticePanther"
    ));
  }
}
