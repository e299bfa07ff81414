pub mod config;
pub mod gateway;
pub mod locks;
pub mod panels;
pub mod quiz;
pub mod render;
pub mod state;
