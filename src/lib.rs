pub mod api;
pub mod board;
pub mod client;
pub mod credentials;
pub mod draft;
pub mod forms;
pub mod odds;
pub mod session;
pub mod settings;
pub mod submission;
