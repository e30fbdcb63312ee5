pub extern crate actix_web;

pub mod bus;
pub mod canvas;
pub mod config;
pub mod connection;
pub mod handlers;
pub mod manager;
mod registry;
pub mod session;
