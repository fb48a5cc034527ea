pub mod footer;
pub mod header;
pub mod utils;

pub use footer::draw_footer;
pub use header::{draw_header, extract_domain, HeaderContext};
pub use utils::{centered_rect, list_title, status_color, time_ago, truncate};
