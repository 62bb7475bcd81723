pub mod attendance;
pub mod class;
pub mod role;
pub mod stats;
