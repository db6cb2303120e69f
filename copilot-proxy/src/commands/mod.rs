//! One handler per CLI subcommand (§10.L).

mod auth;
mod check_usage;
mod debug;
mod logout;
mod patcher;
mod start;

pub use auth::run as auth;
pub use check_usage::run as check_usage;
pub use debug::run as debug;
pub use logout::run as logout;
pub use patcher::run as patcher;
pub use start::run as start;
