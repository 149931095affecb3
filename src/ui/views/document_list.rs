use crate::api::types::{Document, DocumentUpload, Exchange};
use crate::context::AppContext;
use crate::stores::{format_size, matches_term, DocumentsStore};
use crate::ui::components::{Confirm, FilterTabs, Form, FormEvent, KeyResult, SearchInput};
use crate::ui::renderfns::{format_timestamp, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::{
  ensure_valid_selection, highlight_style, list_title, navigate_list, poll_mutation,
  render_placeholder, titled_block, Mutation,
};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState};
use std::path::{Path, PathBuf};

enum Modal {
  Upload(Form),
  Delete { confirm: Confirm, document: Document },
}

/// Content type sent with an upload, from the file extension.
fn mime_type(path: &Path) -> &'static str {
  let ext = path
    .extension()
    .and_then(|e| e.to_str())
    .map(str::to_ascii_lowercase)
    .unwrap_or_default();
  match ext.as_str() {
    "pdf" => "application/pdf",
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "txt" => "text/plain",
    "csv" => "text/csv",
    "doc" => "application/msword",
    "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "xls" => "application/vnd.ms-excel",
    "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    _ => "application/octet-stream",
  }
}

/// Where downloads land: the user's download directory, else the working
/// directory.
fn download_target(filename: &str) -> PathBuf {
  let name = Path::new(filename)
    .file_name()
    .map(|n| n.to_os_string())
    .unwrap_or_else(|| "document".into());
  dirs::download_dir().unwrap_or_default().join(name)
}

pub struct DocumentListView {
  store: DocumentsStore,
  exchange: Option<(String, String)>,
  tabs: FilterTabs<String>,
  search: SearchInput,
  list_state: ListState,
  modal: Option<Modal>,
  mutation: Option<Mutation>,
}

impl DocumentListView {
  pub fn new(ctx: AppContext) -> Self {
    Self::build(ctx, None)
  }

  pub fn for_exchange(ctx: AppContext, exchange: &Exchange) -> Self {
    Self::build(ctx, Some((exchange.id.clone(), exchange.name.clone())))
  }

  fn build(ctx: AppContext, exchange: Option<(String, String)>) -> Self {
    let store = DocumentsStore::new(
      ctx.api.clone(),
      &ctx.caches,
      exchange.as_ref().map(|(id, _)| id.clone()),
    );
    Self {
      store,
      exchange,
      tabs: FilterTabs::new("category", Vec::new()),
      search: SearchInput::new(),
      list_state: ListState::default(),
      modal: None,
      mutation: None,
    }
  }

  fn documents(&self) -> Vec<&Document> {
    let term = self.search.query();
    let rows = match self.tabs.selected() {
      Some(category) => self.store.by_category(category),
      None => self.store.documents().iter().collect(),
    };
    rows
      .into_iter()
      .filter(|d| {
        matches_term(
          term,
          &[Some(d.original_filename.as_str()), Some(d.category.as_str())],
        )
      })
      .collect()
  }

  fn selected(&self) -> Option<&Document> {
    self
      .list_state
      .selected()
      .and_then(|i| self.documents().get(i).copied())
  }

  fn download(&mut self, document: Document) {
    let target = download_target(&document.original_filename);
    let download = self.store.download(document);
    self.mutation = Some(Mutation::start(
      async move {
        let bytes = download.await.map_err(|e| e.to_string())?;
        tokio::fs::write(&target, bytes)
          .await
          .map_err(|e| format!("Failed to write {}: {}", target.display(), e))?;
        Ok::<_, String>(target)
      },
      |path| format!("Saved {}", path.display()),
    ));
  }

  fn upload(&mut self, values: Vec<String>) {
    let [file, category, pin] = <[String; 3]>::try_from(values).unwrap_or_default();
    let path = PathBuf::from(file);
    let upload = DocumentUpload {
      exchange_id: self.exchange.as_ref().map(|(id, _)| id.clone()),
      filename: path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default(),
      mime_type: mime_type(&path).to_string(),
      category,
      bytes: Vec::new(),
      pin: Some(pin).filter(|p| !p.is_empty()),
    };
    self.mutation = Some(Mutation::start(
      self.store.upload_file(path, upload),
      |d| format!("Uploaded {}", d.original_filename),
    ));
  }

  fn handle_modal(&mut self, key: KeyEvent) {
    let Some(modal) = &mut self.modal else {
      return;
    };
    match modal {
      Modal::Upload(form) => match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted(values)) => {
          self.modal = None;
          self.upload(values);
        }
        KeyResult::Event(FormEvent::Cancelled) => self.modal = None,
        _ => {}
      },
      Modal::Delete { confirm, document } => match confirm.handle_key(key) {
        KeyResult::Event(true) => {
          let name = document.original_filename.clone();
          let future = self.store.delete(document.clone());
          self.mutation = Some(Mutation::start(future, move |_| format!("Deleted {}", name)));
          self.modal = None;
        }
        KeyResult::Event(false) => self.modal = None,
        _ => {}
      },
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let documents = self.documents();
    let len = documents.len();
    let name = match &self.exchange {
      Some((_, name)) => format!("Documents [{}]", name),
      None => "Documents".to_string(),
    };
    let title = list_title(&name, self.store.is_loading(), self.store.error(), len);
    let title = format!(
      "{}{}· {} ",
      title,
      self.search.title_suffix(),
      format_size(self.store.total_size())
    );
    let block = titled_block(title, Color::Blue);

    if documents.is_empty() && !self.store.is_loading() {
      render_placeholder(frame, area, block, "No documents. Press 'u' to upload.");
      return;
    }

    let items: Vec<ListItem> = documents
      .iter()
      .map(|d| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<14}", truncate(&d.category, 13)),
            Style::default().fg(Color::Yellow),
          ),
          Span::styled(
            if d.pin_required { "🔒 " } else { "   " },
            Style::default().fg(Color::Red),
          ),
          Span::raw(format!("{:<44}", truncate(&d.original_filename, 43))),
          Span::raw(format!("{:>10}  ", format_size(d.file_size))),
          Span::styled(format_timestamp(d.created_at), Style::default().fg(Color::DarkGray)),
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

impl View for DocumentListView {
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

    if let KeyResult::Event(_) = self.tabs.handle_key(key) {
      self.list_state.select(Some(0));
      return ViewAction::None;
    }

    let len = self.documents().len();
    if navigate_list(&mut self.list_state, key, len) {
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('r') => self.store.refresh(),
      KeyCode::Char('d') => {
        if let Some(document) = self.selected().cloned() {
          self.download(document);
        }
      }
      KeyCode::Char('u') => {
        self.modal = Some(Modal::Upload(
          Form::new("Upload document")
            .field("File path")
            .field_with("Category", "general")
            .secret("PIN (optional)"),
        ));
      }
      KeyCode::Char('x') => {
        if let Some(document) = self.selected().cloned() {
          self.modal = Some(Modal::Delete {
            confirm: Confirm::new(format!("Delete {}?", document.original_filename)),
            document,
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
      Some(Modal::Upload(form)) => form.render(frame, area),
      Some(Modal::Delete { confirm, .. }) => confirm.render(frame, area),
      None => {}
    }
  }

  fn breadcrumb_label(&self) -> String {
    "Documents".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    self.store.poll();
    let categories = self.store.categories().into_iter().map(String::from).collect();
    self.tabs.set_options(categories);
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
      ShortcutInfo::new("[ ]", "category").with_priority(14),
      ShortcutInfo::new("d", "download").with_priority(16),
      ShortcutInfo::new("u", "upload").with_priority(18),
      ShortcutInfo::new("x", "delete").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::tests::context_for;
  use crate::ui::view::NoticeLevel;
  use crate::ui::views::tests::{code, key, render_text, tick_until, type_text};
  use serde_json::json;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn server_with_documents() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/rest/v1/documents"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        { "id": "d1", "original_filename": "deed.pdf", "file_path": "ex-1/1_deed.pdf",
          "file_size": 2048, "category": "legal", "pin_required": true },
        { "id": "d2", "original_filename": "photo.jpg", "file_path": "general/2_photo.jpg",
          "file_size": 512, "category": "general" }
      ])))
      .mount(&server)
      .await;
    server
  }

  #[test]
  fn test_mime_type_from_extension() {
    assert_eq!(mime_type(Path::new("/tmp/Deed.PDF")), "application/pdf");
    assert_eq!(mime_type(Path::new("scan.jpeg")), "image/jpeg");
    assert_eq!(mime_type(Path::new("notes")), "application/octet-stream");
  }

  #[test]
  fn test_download_target_strips_directories() {
    let target = download_target("../../etc/passwd");
    assert_eq!(target.file_name().unwrap(), "passwd");
  }

  #[tokio::test]
  async fn test_category_tabs_follow_loaded_rows() {
    let server = server_with_documents().await;
    let mut view = DocumentListView::new(context_for(&server));
    tick_until(&mut view, |v| !v.store.is_loading()).await;
    assert_eq!(view.documents().len(), 2);

    view.handle_key(key(']'));
    let names: Vec<_> = view.documents().iter().map(|d| d.original_filename.clone()).collect();
    assert_eq!(names, vec!["photo.jpg"]);

    view.handle_key(key(']'));
    let screen = render_text(&mut view);
    assert!(screen.contains("deed.pdf"));
    assert!(screen.contains("2.0 KB"));
  }

  #[tokio::test]
  async fn test_upload_without_file_is_rejected() {
    let server = server_with_documents().await;
    let mut view = DocumentListView::new(context_for(&server));

    view.handle_key(key('u'));
    assert!(view.is_capturing_input());
    for _ in 0..3 {
      view.handle_key(code(KeyCode::Enter));
    }
    let actions = tick_until(&mut view, |v| v.mutation.is_none()).await;
    match actions.as_slice() {
      [ViewAction::Notify(n)] => {
        assert_eq!(n.level, NoticeLevel::Error);
        assert_eq!(n.text, "Please select a file to upload");
      }
      other => panic!("unexpected actions {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_search_by_filename() {
    let server = server_with_documents().await;
    let mut view = DocumentListView::new(context_for(&server));
    tick_until(&mut view, |v| !v.store.is_loading()).await;

    view.handle_key(key('/'));
    type_text(&mut view, "deed");
    view.handle_key(code(KeyCode::Enter));
    assert_eq!(view.documents().len(), 1);
  }
}
