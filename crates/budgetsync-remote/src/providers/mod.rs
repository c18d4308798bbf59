//! Gateway implementations

pub mod http;
pub mod memory;

pub use http::HttpGateway;
pub use memory::MemoryGateway;

use super::gateway::{BudgetGateway, GatewayConfig};
use anyhow::Result;

/// Factory function to create budget gateways
pub fn create_gateway(kind: &str, config: GatewayConfig) -> Result<Box<dyn BudgetGateway>> {
    match kind {
        "http" => {
            if config.endpoints.is_empty() {
                anyhow::bail!("The http gateway needs at least one endpoint");
            }
            Ok(Box::new(HttpGateway::new(config)))
        }
        "memory" => Ok(Box::new(MemoryGateway::empty())),
        _ => anyhow::bail!("Unknown budget gateway: {}", kind),
    }
}
