//! Server-Sent Events relay for analytics updates
//!
//! Each connected client gets its own analytics subscription. Idle periods
//! longer than the keepalive interval produce a `keepalive` event, so a quiet
//! stream never looks dead to proxies.

use crate::analytics::{AnalyticsEvent, AnalyticsService};
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One SSE frame: `event: <type>\ndata: <json>\n\n`
fn to_sse_event(event: &AnalyticsEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(data) => Some(Event::default().event(event.event_type()).data(data)),
        Err(e) => {
            warn!(error = %e, "Failed to serialize analytics event for SSE");
            None
        }
    }
}

/// Removes the subscription when the client goes away
struct SubscriptionGuard {
    analytics: Arc<AnalyticsService>,
    id: Uuid,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let analytics = Arc::clone(&self.analytics);
        let id = self.id;
        // Without a runtime the closed queue is pruned by the next broadcast
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { analytics.unsubscribe(id).await });
        }
        debug!(subscriber_id = %id, "SSE client disconnected");
    }
}

/// Live stream of analytics events for one client
pub async fn metric_event_stream(
    analytics: Arc<AnalyticsService>,
    keepalive: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut subscription = analytics.subscribe().await;
    let guard = SubscriptionGuard {
        analytics,
        id: subscription.id(),
    };
    info!(subscriber_id = %guard.id, "New SSE client connected to metric stream");

    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(event) = subscription.next_event(keepalive).await {
            if let Some(sse_event) = to_sse_event(&event) {
                yield Ok(sse_event);
            }
        }
    };

    Sse::new(stream)
}
