use crate::api::types::{Contact, ContactUpdate, NewContact};
use crate::context::AppContext;
use crate::stores::ContactsStore;
use crate::ui::components::{Confirm, Form, FormEvent, KeyResult, SearchInput};
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::{
  ensure_valid_selection, highlight_style, list_title, navigate_list, poll_mutation,
  render_placeholder, titled_block, Mutation,
};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState};

enum Modal {
  Create(Form),
  Edit { form: Form, id: String },
  Delete { confirm: Confirm, id: String, name: String },
}

fn optional(value: String) -> Option<String> {
  Some(value).filter(|v| !v.is_empty())
}

pub struct ContactListView {
  store: ContactsStore,
  search: SearchInput,
  list_state: ListState,
  modal: Option<Modal>,
  mutation: Option<Mutation>,
}

impl ContactListView {
  pub fn new(ctx: AppContext) -> Self {
    Self {
      store: ContactsStore::new(ctx.api.clone(), &ctx.caches),
      search: SearchInput::new(),
      list_state: ListState::default(),
      modal: None,
      mutation: None,
    }
  }

  fn contacts(&self) -> Vec<&Contact> {
    self.store.search(self.search.query())
  }

  fn selected(&self) -> Option<&Contact> {
    self
      .list_state
      .selected()
      .and_then(|i| self.contacts().get(i).copied())
  }

  fn edit_form(contact: &Contact) -> Form {
    Form::new("Edit contact")
      .field_with("First name", &contact.first_name)
      .field_with("Last name", &contact.last_name)
      .field_with("Email", &contact.email)
      .field_with("Phone", contact.phone.as_deref().unwrap_or(""))
      .field_with("Company", contact.company.as_deref().unwrap_or(""))
      .field_with("Type", contact.contact_type.as_deref().unwrap_or(""))
  }

  fn submit(&mut self, id: Option<String>, values: Vec<String>) {
    let [first_name, last_name, email, phone, company, contact_type] =
      <[String; 6]>::try_from(values).unwrap_or_default();

    self.mutation = Some(match id {
      None => Mutation::start(
        self.store.create(NewContact {
          first_name,
          last_name,
          email,
          phone: optional(phone),
          company: optional(company),
          contact_type: optional(contact_type),
        }),
        |c| format!("Created contact {}", c.display_name()),
      ),
      Some(id) => Mutation::start(
        self.store.update(
          id,
          ContactUpdate {
            first_name: optional(first_name),
            last_name: optional(last_name),
            email: optional(email),
            phone: optional(phone),
            company: optional(company),
            contact_type: optional(contact_type),
          },
        ),
        |c| format!("Updated {}", c.display_name()),
      ),
    });
  }

  fn handle_modal(&mut self, key: KeyEvent) {
    let Some(modal) = &mut self.modal else {
      return;
    };
    match modal {
      Modal::Create(form) => match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted(values)) => {
          self.modal = None;
          self.submit(None, values);
        }
        KeyResult::Event(FormEvent::Cancelled) => self.modal = None,
        _ => {}
      },
      Modal::Edit { form, id } => match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted(values)) => {
          let id = id.clone();
          self.modal = None;
          self.submit(Some(id), values);
        }
        KeyResult::Event(FormEvent::Cancelled) => self.modal = None,
        _ => {}
      },
      Modal::Delete { confirm, id, name } => match confirm.handle_key(key) {
        KeyResult::Event(true) => {
          let name = name.clone();
          let future = self.store.delete(id.clone());
          self.mutation = Some(Mutation::start(future, move |_| format!("Deleted {}", name)));
          self.modal = None;
        }
        KeyResult::Event(false) => self.modal = None,
        _ => {}
      },
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let contacts = self.contacts();
    let len = contacts.len();
    let title = list_title("Contacts", self.store.is_loading(), self.store.error(), len);
    let block = titled_block(format!("{}{}", title, self.search.title_suffix()), Color::Blue);

    if contacts.is_empty() && !self.store.is_loading() {
      render_placeholder(frame, area, block, "No contacts found. Press 'n' to add one.");
      return;
    }

    let items: Vec<ListItem> = contacts
      .iter()
      .map(|c| {
        ListItem::new(Line::from(vec![
          Span::raw(format!("{:<28}", truncate(&c.display_name(), 27))),
          Span::styled(
            format!("{:<32}", truncate(&c.email, 31)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(format!("{:<24}", truncate(c.company.as_deref().unwrap_or("-"), 23))),
          Span::styled(
            c.contact_type.clone().unwrap_or_default(),
            Style::default().fg(Color::Yellow),
          ),
          Span::styled(
            if c.pp_contact_id.is_some() { "  ⟳ PP" } else { "" },
            Style::default().fg(Color::DarkGray),
          ),
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

impl View for ContactListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.modal.is_some() {
      self.handle_modal(key);
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

    let len = self.contacts().len();
    if navigate_list(&mut self.list_state, key, len) {
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('r') => self.store.refresh(),
      KeyCode::Char('n') => {
        self.modal = Some(Modal::Create(
          Form::new("New contact")
            .field("First name")
            .field("Last name")
            .field("Email")
            .field("Phone")
            .field("Company")
            .field_with("Type", "client"),
        ));
      }
      KeyCode::Char('e') | KeyCode::Enter => {
        if let Some(contact) = self.selected() {
          let modal = Modal::Edit {
            form: Self::edit_form(contact),
            id: contact.id.clone(),
          };
          self.modal = Some(modal);
        }
      }
      KeyCode::Char('x') => {
        if let Some(contact) = self.selected() {
          let name = contact.display_name();
          let modal = Modal::Delete {
            confirm: Confirm::new(format!("Delete contact {}?", name)),
            id: contact.id.clone(),
            name,
          };
          self.modal = Some(modal);
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    self.search.render_overlay(frame, area);
    match &self.modal {
      Some(Modal::Create(form)) | Some(Modal::Edit { form, .. }) => form.render(frame, area),
      Some(Modal::Delete { confirm, .. }) => confirm.render(frame, area),
      None => {}
    }
  }

  fn breadcrumb_label(&self) -> String {
    "Contacts".to_string()
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
      ShortcutInfo::new("n", "new").with_priority(14),
      ShortcutInfo::new("e", "edit").with_priority(16),
      ShortcutInfo::new("x", "delete").with_priority(18),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ui::view::NoticeLevel;
  use crate::context::tests::context_for;
  use crate::ui::views::tests::{code, key, render_text, tick_until, type_text};
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn server_with_contacts() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/contacts"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "contacts": [
          { "id": "c1", "first_name": "Ada", "last_name": "Lovelace", "email": "ada@x.io",
            "company": "Engines Ltd" },
          { "id": "c2", "first_name": "Alan", "last_name": "Turing", "email": "alan@x.io" }
        ]
      })))
      .mount(&server)
      .await;
    server
  }

  #[tokio::test]
  async fn test_search_by_company() {
    let server = server_with_contacts().await;
    let mut view = ContactListView::new(context_for(&server));
    tick_until(&mut view, |v| !v.store.is_loading()).await;

    view.handle_key(key('/'));
    type_text(&mut view, "engines");
    view.handle_key(code(KeyCode::Esc));
    assert_eq!(view.contacts().len(), 2);

    view.handle_key(key('/'));
    type_text(&mut view, "engines");
    view.handle_key(code(KeyCode::Enter));
    assert_eq!(view.contacts().len(), 1);
    assert!(render_text(&mut view).contains("Ada Lovelace"));
  }

  #[tokio::test]
  async fn test_edit_sends_changed_fields() {
    let server = server_with_contacts().await;
    Mock::given(method("PUT"))
      .and(path("/contacts/c1"))
      .and(body_partial_json(json!({ "email": "ada@engines.io" })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "contact": { "id": "c1", "first_name": "Ada", "last_name": "Lovelace",
                     "email": "ada@engines.io" }
      })))
      .expect(1)
      .mount(&server)
      .await;

    let mut view = ContactListView::new(context_for(&server));
    tick_until(&mut view, |v| !v.store.is_loading()).await;
    render_text(&mut view);

    view.handle_key(key('e'));
    view.handle_key(code(KeyCode::Down));
    view.handle_key(code(KeyCode::Down));
    for _ in 0.."ada@x.io".len() {
      view.handle_key(code(KeyCode::Backspace));
    }
    type_text(&mut view, "ada@engines.io");
    view.handle_key(code(KeyCode::Down));
    view.handle_key(code(KeyCode::Down));
    view.handle_key(code(KeyCode::Down));
    view.handle_key(code(KeyCode::Enter));

    let actions = tick_until(&mut view, |v| v.mutation.is_none()).await;
    match actions.as_slice() {
      [ViewAction::Notify(n)] => {
        assert_eq!(n.level, NoticeLevel::Info);
        assert_eq!(n.text, "Updated Ada Lovelace");
      }
      other => panic!("unexpected actions {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_delete_requires_confirmation() {
    let server = server_with_contacts().await;
    Mock::given(method("DELETE"))
      .and(path("/contacts/c1"))
      .respond_with(ResponseTemplate::new(204))
      .expect(1)
      .mount(&server)
      .await;

    let mut view = ContactListView::new(context_for(&server));
    tick_until(&mut view, |v| !v.store.is_loading()).await;
    render_text(&mut view);

    view.handle_key(key('x'));
    view.handle_key(key('n'));
    assert!(view.modal.is_none());
    assert!(view.mutation.is_none());

    view.handle_key(key('x'));
    view.handle_key(key('y'));
    let actions = tick_until(&mut view, |v| v.mutation.is_none()).await;
    assert!(matches!(
      actions.as_slice(),
      [ViewAction::Notify(n)] if n.text == "Deleted Ada Lovelace"
    ));
  }
}
