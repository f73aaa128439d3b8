//! Realtime channel stand-in.
//!
//! Keeps the `channel(name).on(event, callback).subscribe()` shape so callers
//! that register change listeners work unchanged, but never delivers an
//! event. Consumers that need fresh data must re-query.

use domain::Value;
use tracing::debug;

type ChangeCallback = Box<dyn Fn(Value) + Send + Sync>;

/// A named channel, as returned by `LocalBackend::channel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    name: String,
}

impl Channel {
    pub(crate) fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach a callback for `event` (e.g. `postgres_changes`).
    pub fn on<E, F>(self, event: E, callback: F) -> ChannelHandler
    where
        E: Into<String>,
        F: Fn(Value) + Send + Sync + 'static,
    {
        ChannelHandler {
            channel: self,
            event: event.into(),
            _callback: Box::new(callback),
        }
    }
}

/// A channel with a registered callback, waiting for `subscribe`.
pub struct ChannelHandler {
    channel: Channel,
    event: String,
    _callback: ChangeCallback,
}

impl ChannelHandler {
    pub fn subscribe(self) -> RealtimeSubscription {
        debug!(channel = %self.channel.name, event = %self.event, "realtime: subscription accepted, no events are delivered locally");
        RealtimeSubscription {
            channel: self.channel.name,
            event: self.event,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeSubscription {
    channel: String,
    event: String,
}

impl RealtimeSubscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// No-op: nothing was ever scheduled.
    pub fn unsubscribe(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn subscription_never_fires() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let sub = Channel::new("indications")
            .on("postgres_changes", move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .subscribe();
        assert_eq!(sub.channel(), "indications");
        assert_eq!(sub.event(), "postgres_changes");

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        sub.unsubscribe();
    }
}
