// Application state module
// Read-only state shared by all connections

use std::sync::atomic::AtomicUsize;

use super::types::Config;
use crate::http::{HashEtag, RequestFreshness, ResponseKind};
use crate::send::{PayloadSender, SendOptions};

/// Application state
pub struct AppState {
    pub config: Config,
    pub sender: PayloadSender<HashEtag, RequestFreshness>,
    /// Open connections, checked against `performance.max_connections`
    pub active_connections: AtomicUsize,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let etags = if config.delivery.weak_etags {
            HashEtag::weak()
        } else {
            HashEtag::strong()
        };

        Self {
            config: config.clone(),
            sender: PayloadSender::new(etags, RequestFreshness),
            active_connections: AtomicUsize::new(0),
        }
    }

    /// Delivery options for a page of the given kind
    pub const fn send_options(&self, kind: ResponseKind) -> SendOptions {
        SendOptions {
            kind,
            generate_etags: self.config.delivery.generate_etags,
            powered_by_header: self.config.delivery.powered_by_header,
            payload: self.config.delivery.cache,
        }
    }
}
