pub mod footer;
pub mod header;
pub mod utils;

pub use footer::draw_footer;
pub use header::{draw_header, HeaderInfo};
pub use utils::{
  deadline_label, exchange_status_color, format_timestamp, priority_color, source_color,
  task_status_color, truncate,
};
