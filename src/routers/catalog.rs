use crate::adapters::CatalogAdapter;
use crate::data::Locator;
use crate::messages::{CatalogMessage, Message};
use crate::switchboard::{Dispatcher, EffectRouter, State};

use std::sync::Arc;

/// Bridges the catalog message category to the catalog adapter.
///
/// Renames never touch local state: the follow-up scan re-anchors
/// `recordings` to whatever the catalog now holds.
pub struct CatalogRouter {
    adapter: Arc<dyn CatalogAdapter>,
}

impl CatalogRouter {
    pub fn new(adapter: Arc<dyn CatalogAdapter>) -> Self {
        Self { adapter }
    }

    fn scan(&self, dispatcher: &Dispatcher) {
        let adapter = self.adapter.clone();
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            match adapter.scan().await {
                Ok(files) => {
                    dispatcher.dispatch(Message::Catalog(CatalogMessage::ScanComplete(files)));
                }
                // Keep the last completed scan; the UI stays consistent.
                Err(e) => tracing::warn!("Catalog scan failed: {e}"),
            }
        });
    }

    fn rename(&self, locator: Locator, name: String, dispatcher: &Dispatcher) {
        let adapter = self.adapter.clone();
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                tracing::debug!("Blank rename for {locator}, skipping");
            } else if let Err(e) = adapter.rename(&locator, trimmed).await {
                tracing::warn!("Rename of {locator} failed: {e}");
            }
            // Always re-scan so state reflects the catalog's truth.
            dispatcher.dispatch(Message::Catalog(CatalogMessage::Scan));
        });
    }
}

impl EffectRouter for CatalogRouter {
    fn can_handle(&self, message: &Message) -> bool {
        matches!(message, Message::Catalog(_))
    }

    fn handle(&mut self, _state: &State, message: &Message, dispatcher: &Dispatcher) {
        let Message::Catalog(msg) = message else {
            return;
        };

        match msg {
            CatalogMessage::Scan => self.scan(dispatcher),
            CatalogMessage::Rename { locator, name } => {
                self.rename(locator.clone(), name.clone(), dispatcher)
            }
            CatalogMessage::ScanComplete(_) => {}
        }
    }
}
