use std::collections::HashMap;
use std::sync::Arc;

use crate::delivery::Channel;

use super::NotificationProvider;

/// Static mapping from channel to the single provider that sends for it.
///
/// Built once at startup and read-only afterwards. Registration is
/// last-wins: registering a second provider for a channel replaces the
/// first, with a warning logged.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<Channel, Arc<dyn NotificationProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register a provider under the channel it reports.
    pub fn register(&mut self, provider: Arc<dyn NotificationProvider>) {
        let channel = provider.channel();
        if self.providers.insert(channel, provider).is_some() {
            tracing::warn!(
                channel = %channel,
                "Replacing previously registered provider"
            );
        }
    }

    /// Resolve the provider for a channel, if one is registered.
    pub fn resolve(&self, channel: Channel) -> Option<Arc<dyn NotificationProvider>> {
        self.providers.get(&channel).cloned()
    }

    /// Channels with a registered provider.
    pub fn channels(&self) -> Vec<Channel> {
        self.providers.keys().copied().collect()
    }
}
