pub mod config;
pub mod events;
pub mod gesture;
pub mod macros;
pub mod scene;
pub mod store;
pub mod sys;
