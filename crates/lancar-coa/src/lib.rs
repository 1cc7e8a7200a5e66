pub mod notice;
pub mod session;
pub mod view;

pub use notice::{Notice, NoticeLevel};
pub use session::TreeSession;
pub use view::TreeView;
