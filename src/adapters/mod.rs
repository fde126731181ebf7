// Adapters layer: concrete implementations for external systems (http transport, object stores).

pub mod http;
pub mod storage;
