//! User directory and password login for the bundled services.

mod users;
mod login;

pub use users::{NewUser, User, UserDirectory, UserUpdate};
pub use login::{AuthService, LoginReply, LoginRequest};
