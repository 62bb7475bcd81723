pub mod attendance;
pub mod cache;
pub mod overview;
