// Adapters for the source API and the downstream consumer

pub mod field_explorer;
pub mod kismet_client;
pub mod rate_limiter;
pub mod transport;
