use crate::api::types::{User, UserRole};
use crate::context::AppContext;
use crate::stores::UsersStore;
use crate::ui::components::{Confirm, FilterTabs, KeyResult, SearchInput};
use crate::ui::renderfns::{format_timestamp, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::{
  ensure_valid_selection, highlight_style, list_title, navigate_list, poll_mutation,
  render_placeholder, titled_block, Mutation,
};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState};

/// The role after `role` when cycling with `R`.
fn next_role(role: UserRole) -> UserRole {
  let idx = UserRole::ALL.iter().position(|r| *r == role).unwrap_or(0);
  UserRole::ALL[(idx + 1) % UserRole::ALL.len()]
}

/// Admin user management.
pub struct UserListView {
  store: UsersStore,
  tabs: FilterTabs<UserRole>,
  search: SearchInput,
  list_state: ListState,
  confirm: Option<(Confirm, String)>,
  mutation: Option<Mutation>,
}

impl UserListView {
  pub fn new(ctx: AppContext) -> Self {
    Self {
      store: UsersStore::new(ctx.api.clone(), &ctx.caches),
      tabs: FilterTabs::new("role", UserRole::ALL.to_vec()),
      search: SearchInput::new(),
      list_state: ListState::default(),
      confirm: None,
      mutation: None,
    }
  }

  fn users(&self) -> Vec<&User> {
    let role = self.tabs.selected().copied();
    self
      .store
      .search(self.search.query())
      .into_iter()
      .filter(|u| role.map_or(true, |r| u.role == r))
      .collect()
  }

  fn selected(&self) -> Option<&User> {
    self
      .list_state
      .selected()
      .and_then(|i| self.users().get(i).copied())
  }

  fn set_active(&mut self, id: String, active: bool) {
    let verb = if active { "Activated" } else { "Deactivated" };
    self.mutation = Some(Mutation::start(self.store.set_active(id, active), move |u| {
      format!("{} {}", verb, u.display_name())
    }));
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let users = self.users();
    let len = users.len();
    let title = list_title("Users", self.store.is_loading(), self.store.error(), len);
    let active = self.store.active().len();
    let title = format!("{}[{} active]{} ", title, active, self.search.title_suffix());
    let block = titled_block(title, Color::Blue);

    if users.is_empty() && !self.store.is_loading() {
      render_placeholder(frame, area, block, "No users found.");
      return;
    }

    let items: Vec<ListItem> = users
      .iter()
      .map(|u| {
        let (state, state_color) = if u.is_active {
          ("active  ", Color::Green)
        } else {
          ("inactive", Color::DarkGray)
        };
        ListItem::new(Line::from(vec![
          Span::raw(format!("{:<26}", truncate(&u.display_name(), 25))),
          Span::styled(
            format!("{:<32}", truncate(&u.email, 31)),
            Style::default().fg(Color::Cyan),
          ),
          Span::styled(
            format!("{:<13}", u.role.label()),
            Style::default().fg(Color::Yellow),
          ),
          Span::styled(format!("{}  ", state), Style::default().fg(state_color)),
          Span::raw(if u.two_fa_enabled { "2FA  " } else { "     " }),
          Span::styled(format_timestamp(u.last_login), Style::default().fg(Color::DarkGray)),
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

impl View for UserListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some((confirm, id)) = &mut self.confirm {
      match confirm.handle_key(key) {
        KeyResult::Event(true) => {
          let id = id.clone();
          self.confirm = None;
          self.set_active(id, false);
        }
        KeyResult::Event(false) => self.confirm = None,
        _ => {}
      }
      return ViewAction::None;
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

    let len = self.users().len();
    if navigate_list(&mut self.list_state, key, len) {
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('r') => self.store.refresh(),
      KeyCode::Char('a') => {
        if let Some(user) = self.selected() {
          let id = user.id.clone();
          if user.is_active {
            let prompt = format!("Deactivate {}?", user.display_name());
            self.confirm = Some((Confirm::new(prompt), id));
          } else {
            self.set_active(id, true);
          }
        }
      }
      KeyCode::Char('R') => {
        if let Some(user) = self.selected() {
          let role = next_role(user.role);
          let future = self.store.update_role(user.id.clone(), role);
          self.mutation = Some(Mutation::start(future, move |u| {
            format!("{} is now {}", u.display_name(), role.label())
          }));
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
    if let Some((confirm, _)) = &self.confirm {
      confirm.render(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    "Users".to_string()
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
    self.search.is_active() || self.confirm.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(12),
      ShortcutInfo::new("[ ]", "role").with_priority(14),
      ShortcutInfo::new("a", "toggle active").with_priority(16),
      ShortcutInfo::new("R", "cycle role").with_priority(18),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::tests::context_for;
  use crate::ui::views::tests::{key, render_text, tick_until};
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn server_with_users() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/rest/v1/users"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        { "id": "u1", "email": "ada@x.io", "first_name": "Ada", "role": "admin" },
        { "id": "u2", "email": "cal@x.io", "first_name": "Cal", "role": "client",
          "is_active": false }
      ])))
      .mount(&server)
      .await;
    server
  }

  #[test]
  fn test_next_role_wraps() {
    assert_eq!(next_role(UserRole::Admin), UserRole::Coordinator);
    assert_eq!(next_role(UserRole::ThirdParty), UserRole::Admin);
  }

  #[tokio::test]
  async fn test_deactivate_asks_first() {
    let server = server_with_users().await;
    Mock::given(method("PATCH"))
      .and(path("/rest/v1/users"))
      .and(query_param("id", "eq.u1"))
      .and(body_partial_json(json!({ "is_active": false })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        { "id": "u1", "email": "ada@x.io", "first_name": "Ada", "role": "admin",
          "is_active": false }
      ])))
      .expect(1)
      .mount(&server)
      .await;

    let mut view = UserListView::new(context_for(&server));
    tick_until(&mut view, |v| !v.store.is_loading()).await;
    let screen = render_text(&mut view);
    assert!(screen.contains("inactive"));
    assert!(screen.contains("[1 active]"));

    view.handle_key(key('a'));
    assert!(view.is_capturing_input());
    view.handle_key(key('y'));
    let actions = tick_until(&mut view, |v| v.mutation.is_none()).await;
    assert!(matches!(
      actions.as_slice(),
      [ViewAction::Notify(n)] if n.text == "Deactivated Ada"
    ));
  }

  #[tokio::test]
  async fn test_activate_inactive_user_directly() {
    let server = server_with_users().await;
    Mock::given(method("PATCH"))
      .and(path("/rest/v1/users"))
      .and(query_param("id", "eq.u2"))
      .and(body_partial_json(json!({ "is_active": true })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        { "id": "u2", "email": "cal@x.io", "first_name": "Cal", "role": "client" }
      ])))
      .expect(1)
      .mount(&server)
      .await;

    let mut view = UserListView::new(context_for(&server));
    tick_until(&mut view, |v| !v.store.is_loading()).await;
    render_text(&mut view);

    view.handle_key(key('j'));
    view.handle_key(key('a'));
    assert!(!view.is_capturing_input());
    let actions = tick_until(&mut view, |v| v.mutation.is_none()).await;
    assert!(matches!(
      actions.as_slice(),
      [ViewAction::Notify(n)] if n.text == "Activated Cal"
    ));
  }
}
