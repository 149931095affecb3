use crate::api::types::User;
use crate::api::AuthEvent;
use crate::commands::{self, CommandId};
use crate::context::AppContext;
use crate::event::{Event, EventHandler};
use crate::query::Query;
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{Notice, ShortcutInfo, View, ViewAction};
use crate::ui::views;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::convert::Infallible;
use std::io::stdout;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const TICK_RATE: Duration = Duration::from_millis(250);
const NOTICE_TTL: Duration = Duration::from_secs(5);
const PROBE_INTERVAL: Duration = Duration::from_secs(15);

/// Main application state
pub struct App {
  ctx: AppContext,

  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  command: CommandInput,

  notice: Option<(Notice, Instant)>,

  online: bool,
  auth: AuthEvent,

  /// Reachability check while offline
  probe: Option<Query<bool>>,
  last_probe: Instant,

  /// Re-read of the signed-in user's row, so role changes show up
  profile: Option<Query<User>>,

  should_quit: bool,
}

impl App {
  pub fn new(ctx: AppContext) -> Self {
    let start = ctx
      .config
      .default_view
      .as_deref()
      .and_then(commands::lookup)
      .unwrap_or(CommandId::Exchanges);
    let root = views::root_view(start, &ctx).unwrap_or_else(|| views::root_exchanges(&ctx));
    let auth = *ctx.auth_events().borrow();
    let online = ctx.smart.is_online();
    let profile = Self::load_profile(&ctx);

    Self {
      ctx,
      view_stack: vec![root],
      command: CommandInput::new(),
      notice: None,
      online,
      auth,
      probe: None,
      last_probe: Instant::now(),
      profile,
      should_quit: false,
    }
  }

  fn load_profile(ctx: &AppContext) -> Option<Query<User>> {
    let id = ctx.session.user().ok().flatten()?.id;
    let api = ctx.api.clone();
    Some(Query::once(async move { api.get_user(&id).await }))
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let result = self.event_loop().await;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    result
  }

  async fn event_loop(&mut self) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(TICK_RATE);
    events.forward(self.ctx.auth_events(), Event::Auth);
    events.forward(self.ctx.smart.subscribe(), Event::Online);

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.tick(),
      Event::Resize => {}
      Event::Auth(auth) => {
        info!(?auth, "auth state changed");
        self.auth = auth;
      }
      Event::Online(online) => {
        self.online = online;
        self.notify(if online {
          Notice::info("Back online")
        } else {
          Notice::error("Backend unreachable, showing cached data")
        });
      }
    }
  }

  fn tick(&mut self) {
    if let Some(view) = self.view_stack.last_mut() {
      let action = view.tick();
      self.apply(action);
    }

    if self
      .notice
      .as_ref()
      .is_some_and(|(_, at)| at.elapsed() > NOTICE_TTL)
    {
      self.notice = None;
    }

    self.tick_probe();
    self.tick_profile();
  }

  fn tick_profile(&mut self) {
    let Some(profile) = &mut self.profile else {
      return;
    };
    if !profile.poll() {
      return;
    }
    match (profile.data(), profile.error()) {
      (Some(user), _) => {
        if let Err(e) = self.ctx.session.store_user(user) {
          warn!(error = %e, "failed to store refreshed profile");
        }
      }
      (None, Some(e)) => warn!(error = e, "profile refresh failed"),
      (None, None) => {}
    }
    self.profile = None;
  }

  /// While offline, periodically check whether the backend is back.
  fn tick_probe(&mut self) {
    if let Some(probe) = &mut self.probe {
      if probe.poll() {
        self.probe = None;
      }
      return;
    }
    if !self.online && self.last_probe.elapsed() > PROBE_INTERVAL {
      let smart = self.ctx.smart.clone();
      self.probe = Some(Query::once(async move {
        Ok::<_, Infallible>(smart.probe().await)
      }));
      self.last_probe = Instant::now();
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let capturing = self
      .view_stack
      .last()
      .is_some_and(|view| view.is_capturing_input());
    if self.command.is_active() || !capturing {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Run(id)) => return self.execute_command(id),
        KeyResult::Event(CommandEvent::Unknown(text)) => {
          return self.notify(Notice::error(format!("Unknown command: {}", text)));
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    if let Some(view) = self.view_stack.last_mut() {
      let action = view.handle_key(key);
      self.apply(action);
    }
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::Notify(notice) => self.notify(notice),
    }
  }

  fn notify(&mut self, notice: Notice) {
    self.notice = Some((notice, Instant::now()));
  }

  fn execute_command(&mut self, id: CommandId) {
    match id {
      CommandId::Quit => self.should_quit = true,
      CommandId::ClearCache => {
        self.ctx.caches.clear_all();
        self.notify(Notice::info("Cache cleared"));
      }
      CommandId::Logout => match self.ctx.api.backend().logout() {
        Ok(()) => self.notify(Notice::info("Signed out")),
        Err(e) => {
          warn!(error = %e, "logout failed");
          self.notify(Notice::error(e.to_string()));
        }
      },
      other => {
        if let Some(view) = views::root_view(other, &self.ctx) {
          self.view_stack.clear();
          self.view_stack.push(view);
        }
      }
    }
  }

  // Accessors for UI rendering

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command
  }

  pub fn title(&self) -> String {
    self.ctx.title()
  }

  pub fn user_label(&self) -> Option<String> {
    self
      .ctx
      .session
      .user()
      .ok()
      .flatten()
      .map(|u| format!("{} ({})", u.display_name(), u.role.label()))
  }

  pub fn is_online(&self) -> bool {
    self.online
  }

  pub fn login_required(&self) -> bool {
    self.auth == AuthEvent::LoginRequired || !self.ctx.session.is_signed_in()
  }

  pub fn notice(&self) -> Option<&Notice> {
    self.notice.as_ref().map(|(n, _)| n)
  }

  pub fn shortcuts(&self) -> Vec<ShortcutInfo> {
    self
      .view_stack
      .last()
      .map(|view| view.shortcuts())
      .unwrap_or_default()
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::tests::context_for;
  use serde_json::json;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  #[tokio::test]
  async fn test_profile_refresh_updates_stored_user() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/rest/v1/users"))
      .and(query_param("id", "eq.u1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "id": "u1", "email": "ada@x.io", "first_name": "Ada", "role": "admin"
      })))
      .expect(1)
      .mount(&server)
      .await;

    let ctx = context_for(&server);
    let stale: User = serde_json::from_value(json!({
      "id": "u1", "email": "ada@x.io", "first_name": "Ada", "role": "client"
    }))
    .unwrap();
    ctx.session.store_user(&stale).unwrap();

    let mut app = App::new(ctx);
    assert_eq!(app.user_label().as_deref(), Some("Ada (client)"));
    for _ in 0..200 {
      app.tick();
      if app.profile.is_none() {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(app.profile.is_none());
    assert_eq!(app.user_label().as_deref(), Some("Ada (admin)"));
  }

  #[tokio::test]
  async fn test_no_profile_refresh_when_signed_out() {
    let server = MockServer::start().await;
    let app = App::new(context_for(&server));
    assert!(app.profile.is_none());
  }
}
