pub mod events;
pub mod hub;
pub mod registry;
pub mod rooms;
pub mod server;
pub mod session;
