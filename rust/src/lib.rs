pub mod backend;
pub mod config_store;
pub mod controller;
pub mod logging;
pub mod main_ui_html;
pub mod messages;
pub mod path_utils;
pub mod proposal;
pub mod renderer;
pub mod server;
pub mod session;
