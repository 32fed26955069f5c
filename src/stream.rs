//! The vehicle event stream.
//!
//! The stream task keeps a push channel to the backend open and forwards
//! everything that happens on it to the engine. It doesn’t look at the
//! events themselves. When the channel closes, it waits a bit and opens a
//! new one, doubling the wait for every attempt that doesn’t even get the
//! channel open.

use std::cmp;
use std::time::Duration;
use tracing::debug;
use crate::cancel::TaskHandle;
use crate::client::ApiClient;
use crate::engine::{Payload, UpdateSender};
use crate::notify::ChannelEvent;


//------------ Configurable Constants ----------------------------------------

/// The path of the vehicle event stream relative to the API base.
pub const VEHICLES_PATH: &str = "/vehicles";

/// The default delay before reconnecting.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// The default upper bound for the reconnect delay.
pub const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// The shortest delay before reconnecting, whatever the server asks for.
pub const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(10);


//------------ StreamConfig --------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StreamConfig {
    /// The delay before reconnecting after the channel has closed.
    pub reconnect_delay: Duration,

    /// The longest delay between failed attempts.
    pub max_reconnect_delay: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_delay: DEFAULT_MAX_RECONNECT_DELAY,
        }
    }
}


//------------ Backoff -------------------------------------------------------

/// The delay between connection attempts.
#[derive(Clone, Copy, Debug)]
struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(config: StreamConfig) -> Self {
        let base = cmp::max(config.reconnect_delay, MIN_RECONNECT_DELAY);
        Backoff {
            base,
            max: cmp::max(config.max_reconnect_delay, base),
            current: base,
        }
    }

    /// Changes the base delay to what the server asked for.
    fn set_base(&mut self, base: Duration) {
        self.base = cmp::max(base, MIN_RECONNECT_DELAY);
        self.max = cmp::max(self.max, self.base);
    }

    /// Starts over after a successful connection.
    fn reset(&mut self) {
        self.current = self.base;
    }

    /// Returns the next delay.
    fn next(&mut self) -> Duration {
        let res = self.current;
        self.current = cmp::min(self.current.saturating_mul(2), self.max);
        res
    }
}


//------------ VehicleStream -------------------------------------------------

pub struct VehicleStream {
    client: ApiClient,
    config: StreamConfig,
}

impl VehicleStream {
    pub fn new(client: ApiClient, config: StreamConfig) -> Self {
        VehicleStream { client, config }
    }

    /// Spawns the stream task.
    pub fn spawn(self, queue: UpdateSender) -> TaskHandle {
        let token = queue.token().clone();
        TaskHandle::spawn(token, self.run(queue))
    }

    async fn run(self, queue: UpdateSender) {
        let mut backoff = Backoff::new(self.config);
        loop {
            if !queue.send(Payload::Channel(ChannelEvent::Connecting)).await {
                return
            }
            match self.client.open_stream(VEHICLES_PATH).await {
                Ok(mut stream) => {
                    if !queue.send(Payload::Channel(ChannelEvent::Opened)).await {
                        return
                    }
                    backoff.reset();
                    let reason = loop {
                        match stream.next_event().await {
                            Ok(Some(event)) => {
                                let payload = Payload::Channel(
                                    ChannelEvent::Message(event)
                                );
                                if !queue.send(payload).await {
                                    return
                                }
                            }
                            Ok(None) => break None,
                            Err(err) => break Some(err.to_string()),
                        }
                    };
                    if let Some(retry) = stream.retry() {
                        backoff.set_base(retry);
                        backoff.reset();
                    }
                    let closed = Payload::Channel(ChannelEvent::Closed(reason));
                    if !queue.send(closed).await {
                        return
                    }
                }
                Err(err) => {
                    let closed = Payload::Channel(
                        ChannelEvent::Closed(Some(err.to_string()))
                    );
                    if !queue.send(closed).await {
                        return
                    }
                }
            }
            let delay = backoff.next();
            debug!("reconnecting vehicle stream in {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }
}


//============ Tests =========================================================
