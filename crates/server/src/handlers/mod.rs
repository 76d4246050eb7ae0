//! HTTP request handlers.

pub mod booklists;
pub mod books;
pub mod comments;
pub mod common;
pub mod requests;
pub mod reviews;
pub mod tokens;
pub mod users;

pub use booklists::{
    create_booklist, delete_booklist, get_booklist, update_booklist,
};
pub use books::{create_book, delete_book, get_book, list_books, update_book};
pub use comments::{create_comment, delete_comment, get_comment, update_comment};
pub use common::health_check;
pub use requests::{create_request, get_request, update_request};
pub use reviews::{create_review, delete_review, get_review, update_review};
pub use tokens::{create_authentication_token, create_password_reset_token};
pub use users::{activate_user, register_user, reset_password};
