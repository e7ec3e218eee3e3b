// handlers/user/mod.rs - User resource handlers

pub mod create; // POST /user
pub mod delete; // DELETE /user/:uuid
pub mod list;   // GET /user
pub mod show;   // GET /user/:uuid
pub mod update; // PUT/PATCH /user/:uuid

pub use create::user_create;
pub use delete::user_delete;
pub use list::user_list;
pub use show::user_show;
pub use update::user_update;

#[cfg(test)]
mod tests;
