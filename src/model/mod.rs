pub mod attendance;
pub mod page;
pub mod project;
pub mod role;
pub mod user;
pub mod validation;
