//! Book Gateway Adapters - 远端持久化实现

mod http_book_gateway;
mod in_memory;

pub use http_book_gateway::{HttpBookGateway, HttpBookGatewayConfig};
pub use in_memory::{InMemoryBookGateway, InjectedFailure};
