//! Distribution gateway
//!
//! Authenticates connections, authorizes per-symbol subscriptions and fans
//! feed output out to topic subscribers. Broadcast is fire-and-forget: a
//! failed publish is logged and dropped so the feed scheduler never stalls.

use std::sync::Arc;

use dashmap::DashMap;
use market_feed::bars::Bar;
use market_feed::quotes::Quote;
use market_feed::sink::MarketDataSink;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{Principal, SymbolAuthorizer, TokenDecoder, bearer_token};
use crate::broker::{Transport, bars_topic, market_data_symbol, quotes_topic};
use crate::error::{GatewayError, TransientBroadcastError};

/// An authenticated connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: Uuid,
    pub principal: Principal,
}

pub struct DistributionGateway {
    decoder: Arc<dyn TokenDecoder>,
    authorizer: Arc<dyn SymbolAuthorizer>,
    transport: Arc<dyn Transport>,
    connections: DashMap<Uuid, Principal>,
}

impl DistributionGateway {
    pub fn new(
        decoder: Arc<dyn TokenDecoder>,
        authorizer: Arc<dyn SymbolAuthorizer>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            decoder,
            authorizer,
            transport,
            connections: DashMap::new(),
        }
    }

    /// CONNECT: authenticate the `Authorization` header value.
    pub async fn connect(&self, authorization: Option<&str>) -> Result<Connection, GatewayError> {
        let token = bearer_token(authorization).inspect_err(|e| {
            warn!(error = %e, "CONNECT rejected");
        })?;
        let claims = self.decoder.decode(token).await.inspect_err(|e| {
            warn!(error = %e, "CONNECT rejected");
        })?;

        let connection = Connection {
            id: Uuid::now_v7(),
            principal: Principal::from_claims(claims),
        };
        self.connections
            .insert(connection.id, connection.principal.clone());
        info!(
            connection = %connection.id,
            subject = %connection.principal.subject,
            "Connection authenticated"
        );
        Ok(connection)
    }

    pub fn disconnect(&self, id: &Uuid) {
        if self.connections.remove(id).is_some() {
            debug!(connection = %id, "Connection closed");
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// SUBSCRIBE: per-symbol market-data destinations require the principal
    /// to be authorized for that symbol; other destinations only require an
    /// authenticated principal.
    pub fn subscribe(
        &self,
        principal: Option<&Principal>,
        destination: &str,
    ) -> Result<broadcast::Receiver<String>, GatewayError> {
        let principal = principal.ok_or_else(|| {
            GatewayError::AccessDenied("Subscription requires an authenticated principal".into())
        })?;

        let destination = destination.trim();
        if destination.is_empty() {
            return Err(GatewayError::Protocol("Missing destination".into()));
        }

        if let Some(symbol) = market_data_symbol(destination) {
            if !self.authorizer.is_symbol_authorized(principal, &symbol) {
                warn!(
                    subject = %principal.subject,
                    destination = %destination,
                    "Subscription denied"
                );
                return Err(GatewayError::AccessDenied(format!(
                    "{} may not subscribe to {}",
                    principal.subject, symbol
                )));
            }
        }

        debug!(subject = %principal.subject, destination = %destination, "Subscribed");
        Ok(self.transport.subscribe(destination))
    }

    /// Drop topics with no remaining subscribers.
    pub fn release_idle_topics(&self) -> usize {
        let released = self.transport.release_idle();
        if released > 0 {
            debug!(released, "Released idle topics");
        }
        released
    }

    /// Encode and publish `payload` to `destination`.
    pub fn publish<T: Serialize>(
        &self,
        destination: &str,
        payload: &T,
    ) -> Result<usize, TransientBroadcastError> {
        let json = serde_json::to_string(payload).map_err(|e| TransientBroadcastError::Encode {
            destination: destination.to_string(),
            reason: e.to_string(),
        })?;
        self.transport.publish(destination, json)
    }

    fn publish_logged<T: Serialize>(&self, destination: String, payload: &T) {
        if let Err(e) = self.publish(&destination, payload) {
            warn!(destination = %destination, error = %e, "Broadcast failed");
        }
    }
}

impl MarketDataSink for DistributionGateway {
    fn broadcast_quote(&self, quote: &Quote) {
        self.publish_logged(quotes_topic(&quote.symbol), quote);
    }

    fn broadcast_bar(&self, bar: &Bar) {
        self.publish_logged(bars_topic(&bar.symbol), bar);
    }
}
