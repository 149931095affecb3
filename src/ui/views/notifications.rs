use crate::api::types::{NotificationPreferences, NotificationSetting};
use crate::api::ApiService;
use crate::context::AppContext;
use crate::query::Query;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::{
  ensure_valid_selection, highlight_style, navigate_list, poll_mutation, titled_block, Mutation,
};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState};

/// Notification preference toggles. Changes apply immediately and are
/// rolled back by a refetch if the save fails.
pub struct NotificationsView {
  api: ApiService,
  query: Query<NotificationPreferences>,
  list_state: ListState,
  mutation: Option<Mutation>,
}

impl NotificationsView {
  pub fn new(ctx: AppContext) -> Self {
    let api = ctx.api.clone();
    let fetch_api = api.clone();
    let mut query = Query::new(move || {
      let api = fetch_api.clone();
      async move { api.get_notification_preferences().await }
    });
    query.fetch();

    Self {
      api,
      query,
      list_state: ListState::default(),
      mutation: None,
    }
  }

  fn toggle(&mut self, setting: NotificationSetting) {
    let Some(prefs) = self.query.data().copied() else {
      return;
    };
    let updated = prefs.toggled(setting);
    self.query.set_data(updated);

    let api = self.api.clone();
    let future = async move { api.update_notification_preferences(&updated).await };
    self.mutation = Some(Mutation::start(future, move |saved: NotificationPreferences| {
      let state = if saved.get(setting) { "on" } else { "off" };
      format!("Saved: {} {}", setting.label(), state)
    }));
  }
}

impl View for NotificationsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if navigate_list(&mut self.list_state, key, NotificationSetting::ALL.len()) {
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Enter | KeyCode::Char(' ') => {
        let selected = self
          .list_state
          .selected()
          .and_then(|i| NotificationSetting::ALL.get(i).copied());
        if let Some(setting) = selected {
          self.toggle(setting);
        }
      }
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let title = if let Some(e) = self.query.error() {
      format!(" Notifications (error: {}) ", e)
    } else if self.query.is_loading() {
      " Notifications (loading...) ".to_string()
    } else if self.mutation.is_some() {
      " Notifications (saving...) ".to_string()
    } else {
      " Notifications ".to_string()
    };

    let prefs = self.query.data().copied();
    let items: Vec<ListItem> = NotificationSetting::ALL
      .iter()
      .map(|setting| {
        let (mark, color) = match prefs.map(|p| p.get(*setting)) {
          Some(true) => ("[x]", Color::Green),
          Some(false) => ("[ ]", Color::DarkGray),
          None => ("[?]", Color::DarkGray),
        };
        ListItem::new(Line::from(vec![
          Span::styled(format!("{} ", mark), Style::default().fg(color)),
          Span::raw(setting.label()),
        ]))
      })
      .collect();

    ensure_valid_selection(&mut self.list_state, items.len());
    let list = List::new(items)
      .block(titled_block(title, Color::Blue))
      .highlight_style(highlight_style())
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn breadcrumb_label(&self) -> String {
    "Notifications".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    self.query.poll();
    match poll_mutation(&mut self.mutation) {
      Some(outcome) => {
        if outcome.is_err() {
          self.query.refetch();
        }
        ViewAction::Notify(outcome.into())
      }
      None => ViewAction::None,
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("space", "toggle").with_priority(12),
      ShortcutInfo::new("r", "reload").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::tests::context_for;
  use crate::ui::view::NoticeLevel;
  use crate::ui::views::tests::{code, key, render_text, tick_until};
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn server_with_prefs() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/notifications/preferences"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "preferences": { "email_enabled": true, "sms_enabled": false }
      })))
      .mount(&server)
      .await;
    server
  }

  #[tokio::test]
  async fn test_toggle_saves_preferences() {
    let server = server_with_prefs().await;
    Mock::given(method("PUT"))
      .and(path("/notifications/preferences"))
      .and(body_partial_json(json!({ "sms_enabled": true })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "preferences": { "email_enabled": true, "sms_enabled": true }
      })))
      .expect(1)
      .mount(&server)
      .await;

    let mut view = NotificationsView::new(context_for(&server));
    tick_until(&mut view, |v| !v.query.is_loading()).await;
    render_text(&mut view);

    view.handle_key(key('j'));
    view.handle_key(code(KeyCode::Enter));
    assert_eq!(view.query.data().map(|p| p.sms_enabled), Some(true));

    let actions = tick_until(&mut view, |v| v.mutation.is_none()).await;
    assert!(matches!(
      actions.as_slice(),
      [ViewAction::Notify(n)] if n.text == "Saved: SMS notifications on"
    ));
    assert!(render_text(&mut view).contains("[x] SMS notifications"));
  }

  #[tokio::test]
  async fn test_failed_save_reverts_by_refetching() {
    let server = server_with_prefs().await;
    Mock::given(method("PUT"))
      .and(path("/notifications/preferences"))
      .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "boom" })))
      .mount(&server)
      .await;

    let mut view = NotificationsView::new(context_for(&server));
    tick_until(&mut view, |v| !v.query.is_loading()).await;
    render_text(&mut view);

    view.handle_key(code(KeyCode::Enter));
    assert_eq!(view.query.data().map(|p| p.email_enabled), Some(false));

    let actions = tick_until(&mut view, |v| v.mutation.is_none()).await;
    assert!(matches!(
      actions.as_slice(),
      [ViewAction::Notify(n)] if n.level == NoticeLevel::Error
    ));
    tick_until(&mut view, |v| !v.query.is_loading()).await;
    assert_eq!(view.query.data().map(|p| p.email_enabled), Some(true));
  }
}
