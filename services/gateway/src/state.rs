use std::sync::Arc;

use market_feed::FeedOrchestrator;

use crate::distribution::DistributionGateway;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<DistributionGateway>,
    pub feed: FeedOrchestrator,
}

impl AppState {
    pub fn new(gateway: Arc<DistributionGateway>, feed: FeedOrchestrator) -> Self {
        Self { gateway, feed }
    }
}
