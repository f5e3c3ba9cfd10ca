use std::sync::Arc;

use crate::config::Settings;
use crate::delivery::{DeliveryStore, Dispatcher, StatusQuery};
use crate::provider::ProviderRegistry;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub dispatcher: Arc<Dispatcher>,
    pub query: Arc<StatusQuery>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: Arc<dyn DeliveryStore>,
        registry: Arc<ProviderRegistry>,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            registry,
            settings.dispatch.clone(),
        ));
        let query = Arc::new(StatusQuery::new(store));

        Self {
            settings: Arc::new(settings),
            dispatcher,
            query,
        }
    }
}
