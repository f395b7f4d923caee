//! Plugin instance trait

use anyhow::Result;
use async_trait::async_trait;
use dp_core::Address;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::RwLock;

/// An installable unit of capability attached to a DAO.
///
/// The processor only touches an instance through these hooks; everything
/// else about the plugin is its own business.
#[async_trait]
pub trait PluginInstance: Send + Sync {
    /// Address the plugin is deployed at
    fn address(&self) -> Address;

    /// Human-readable name for logs
    fn name(&self) -> &str;

    /// Address of the logic currently backing this instance
    fn implementation(&self) -> Address;

    /// Whether the instance can switch to a new implementation
    fn is_upgradeable(&self) -> bool {
        false
    }

    /// Called once when the installation is applied
    async fn initialize(&mut self, _dao: Address) -> Result<()> {
        Ok(())
    }

    /// Switch to `implementation`, running `init_data` against it
    async fn upgrade(&mut self, implementation: Address, _init_data: &[u8]) -> Result<()> {
        Err(anyhow::anyhow!(
            "plugin '{}' cannot upgrade to {}",
            self.name(),
            implementation
        ))
    }

    /// Called when the uninstallation is applied
    async fn uninstall(&mut self, _dao: Address) -> Result<()> {
        Ok(())
    }

    /// Convert to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Boxed plugin type
pub type BoxedPlugin = Box<dyn PluginInstance>;

/// Plugin shared between the DAO and in-flight apply calls
pub type SharedPlugin = Arc<RwLock<BoxedPlugin>>;
