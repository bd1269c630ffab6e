pub mod actions;
pub mod auth;
pub mod client;
pub mod reader;
pub mod relocation;
pub mod session;
pub mod status;
pub mod transfer;
pub mod withdraw;
