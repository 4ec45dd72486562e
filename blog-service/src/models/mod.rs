pub mod forms;
pub mod post;
pub mod user;

pub use forms::{LoginForm, PostForm, SearchForm};
pub use post::Post;
pub use user::CurrentUser;
