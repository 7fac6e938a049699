pub mod bridge_service;
pub mod ports;
