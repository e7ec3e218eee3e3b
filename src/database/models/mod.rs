pub mod user;

pub use user::{User, UserTransformer, USER_RESOURCE};
