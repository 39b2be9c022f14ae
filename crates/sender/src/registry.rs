//! HandlerRegistry - channel type to vendor handler lookup
//!
//! Built once while wiring the gateway and shared read-only by every
//! worker afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use contracts::{ChannelHandler, ChannelType, ContractError};
use tracing::{debug, instrument};

/// Registered channel handlers, one per channel type
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<ChannelType, Arc<dyn ChannelHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own channel type
    ///
    /// A second handler for the same channel type is rejected.
    #[instrument(name = "handler_registry_register", skip(self, handler))]
    pub fn register(&mut self, handler: Arc<dyn ChannelHandler>) -> Result<(), ContractError> {
        let channel_type = handler.channel_type();
        if self.handlers.contains_key(&channel_type) {
            return Err(ContractError::DuplicateHandler { channel_type });
        }
        debug!(channel_type = %channel_type, "registered channel handler");
        self.handlers.insert(channel_type, handler);
        Ok(())
    }

    pub fn get(&self, channel_type: &ChannelType) -> Option<Arc<dyn ChannelHandler>> {
        self.handlers.get(channel_type).cloned()
    }

    /// Registered channel types, sorted
    pub fn channel_types(&self) -> Vec<ChannelType> {
        let mut types: Vec<_> = self.handlers.keys().cloned().collect();
        types.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("channel_types", &self.channel_types())
            .finish()
    }
}
