mod command_input;
mod filter_tabs;
mod form;
mod input;
mod key_result;
pub mod overlay;
mod search_input;

pub use command_input::{CommandEvent, CommandInput};
pub use filter_tabs::FilterTabs;
pub use form::{Confirm, Form, FormEvent};
pub use key_result::KeyResult;
pub use search_input::{SearchEvent, SearchInput};
