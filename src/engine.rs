//! The synchronization engine.
//!
//! The engine is the only owner of the store. Everything that wants to
//! change the store sends an [`Update`] into a single queue which the engine
//! drains in order, applying each update completely before looking at the
//! next one. After every change, the engine publishes a fresh [`MapState`]
//! for readers.
//!
//! A [`Session`] wires up the engine with the snapshot loader and the
//! vehicle stream and tears all of it down again.

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use crate::cancel::{CancelToken, TaskHandle};
use crate::client::{ApiClient, FetchError};
use crate::config::Config;
use crate::entity::{Route, Stop};
use crate::loader::SnapshotLoader;
use crate::notify::{ChannelEvent, ChannelState, Reconciler, ReconcilerStats};
use crate::projection::Viewport;
use crate::store::{Snapshot, Store};
use crate::stream::VehicleStream;


//------------ Configurable Constants ----------------------------------------

/// The number of updates that can be queued before senders have to wait.
const QUEUE_SIZE: usize = 256;


//------------ Update --------------------------------------------------------

/// A change for the engine to apply.
#[derive(Debug)]
pub struct Update {
    /// The token of the task that produced the update.
    source: CancelToken,
    payload: Payload,
}

impl Update {
    pub fn new(source: CancelToken, payload: Payload) -> Self {
        Update { source, payload }
    }
}

#[derive(Debug)]
pub enum Payload {
    Routes(Result<Vec<Route>, FetchError>),
    Stops(Result<Vec<Stop>, FetchError>),
    Channel(ChannelEvent),
}


//------------ UpdateSender --------------------------------------------------

/// The sending end of the update queue for a single task.
#[derive(Clone, Debug)]
pub struct UpdateSender {
    tx: mpsc::Sender<Update>,
    token: CancelToken,
}

impl UpdateSender {
    /// Returns a sender for the same queue with a different token.
    pub fn with_token(&self, token: CancelToken) -> Self {
        UpdateSender { tx: self.tx.clone(), token }
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Queues a payload.
    ///
    /// Returns `false` if the engine is gone.
    pub async fn send(&self, payload: Payload) -> bool {
        self.tx.send(Update::new(self.token.clone(), payload)).await.is_ok()
    }
}

/// Creates an update queue.
pub fn queue() -> (UpdateSender, mpsc::Receiver<Update>) {
    let (tx, rx) = mpsc::channel(QUEUE_SIZE);
    (UpdateSender { tx, token: CancelToken::new() }, rx)
}


//------------ MapState ------------------------------------------------------

/// What readers get to see.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MapState {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    pub status: SyncStatus,
}

/// How synchronization is going.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SyncStatus {
    pub routes: LoadState,
    pub stops: LoadState,
    pub channel: Option<ChannelState>,
    pub notifications: ReconcilerStats,
}

/// The state of a reference snapshot.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "detail")]
pub enum LoadState {
    #[default]
    Pending,
    Loaded(usize),
    Failed(String),
}


//------------ Engine --------------------------------------------------------

pub struct Engine {
    store: Store,
    reconciler: Reconciler,
    status: SyncStatus,
    publish: watch::Sender<MapState>,
}

impl Engine {
    pub fn new(viewport: Viewport) -> (Self, watch::Receiver<MapState>) {
        let (publish, state) = watch::channel(MapState::default());
        (
            Engine {
                store: Store::new(),
                reconciler: Reconciler::new(viewport),
                status: Default::default(),
                publish,
            },
            state
        )
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Applies a single update and publishes the result.
    ///
    /// Updates from cancelled tasks are ignored.
    pub fn apply(&mut self, update: Update) {
        if update.source.is_cancelled() {
            return
        }
        match update.payload {
            Payload::Routes(Ok(routes)) => {
                info!("loaded {} routes", routes.len());
                self.status.routes = LoadState::Loaded(routes.len());
                self.store.replace_routes(routes);
            }
            Payload::Routes(Err(err)) => {
                warn!("failed to load routes: {}", err);
                self.status.routes = LoadState::Failed(err.to_string());
            }
            Payload::Stops(Ok(stops)) => {
                info!("loaded {} stops", stops.len());
                self.status.stops = LoadState::Loaded(stops.len());
                self.store.replace_stops(stops);
            }
            Payload::Stops(Err(err)) => {
                warn!("failed to load stops: {}", err);
                self.status.stops = LoadState::Failed(err.to_string());
            }
            Payload::Channel(event) => {
                self.reconciler.handle(&mut self.store, event);
                self.status.channel = Some(self.reconciler.state());
                self.status.notifications = self.reconciler.stats();
            }
        }
        self.publish();
    }

    /// Drains the queue until all senders are gone.
    pub async fn run(mut self, mut updates: mpsc::Receiver<Update>) {
        while let Some(update) = updates.recv().await {
            self.apply(update)
        }
    }

    fn publish(&self) {
        self.publish.send_replace(MapState {
            snapshot: self.store.snapshot(),
            status: self.status.clone(),
        });
    }
}


//------------ Session -------------------------------------------------------

/// A running synchronization session.
///
/// Dropping the session cancels all its tasks. Use [`Session::shutdown`]
/// to also wait for them to finish.
pub struct Session {
    state: watch::Receiver<MapState>,

    /// The tasks producing updates.
    producers: Vec<TaskHandle>,

    /// The engine task.
    engine: TaskHandle,
}

impl Session {
    /// Starts a session.
    ///
    /// This must be called from within a Tokio runtime.
    pub fn start(config: &Config) -> Self {
        let (engine, state) = Engine::new(config.viewport);
        let (queue, updates) = queue();
        let engine = TaskHandle::spawn(CancelToken::new(), engine.run(updates));

        let client = ApiClient::new(&config.api);
        let (routes, stops) = SnapshotLoader::new(
            client.clone(), config.viewport
        ).spawn(&queue);
        let stream = VehicleStream::new(client, config.stream).spawn(
            queue.with_token(CancelToken::new())
        );

        Session {
            state,
            producers: vec![routes, stops, stream],
            engine,
        }
    }

    /// Returns a receiver for the published state.
    pub fn state(&self) -> watch::Receiver<MapState> {
        self.state.clone()
    }

    /// Stops the session.
    ///
    /// Once this returns, the store won’t change anymore.
    pub async fn shutdown(self) {
        // Cancel all producers first so nothing they queued gets applied.
        for task in &self.producers {
            task.token().cancel();
        }
        for task in self.producers {
            task.shutdown().await;
        }
        self.engine.shutdown().await;
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use std::time::Duration;
    use hyper::{Body, Request, Response};
    use hyper::service::{make_service_fn, service_fn};
    use crate::entity::Route;
    use crate::sse;
    use super::*;

    const ROUTES: &str = r#"{"data":[{"id":"R1","attributes":{"color":"ff0000"}}]}"#;

    const STOPS: &str = r#"{"data":[{"id":"S1","attributes":{
        "latitude":42.3555,"longitude":-71.0605,"name":"Downtown"}}]}"#;

    fn vehicle_json(lat: f64) -> String {
        format!(
            concat!(
                r#"{{"id":"V1","attributes":{{"latitude":{},"longitude":-71.05}},"#,
                r#""relationships":{{"route":{{"data":{{"id":"R1"}}}}}}}}"#,
            ),
            lat
        )
    }

    fn message(event: &str, data: &str) -> Payload {
        Payload::Channel(ChannelEvent::Message(sse::Event {
            event: event.into(), data: data.into(), id: None
        }))
    }

    #[test]
    fn reset_update_remove() {
        let (mut engine, state) = Engine::new(Viewport::default());
        let token = CancelToken::new();
        let apply = |engine: &mut Engine, payload| {
            engine.apply(Update::new(token.clone(), payload))
        };

        apply(&mut engine, Payload::Routes(Ok(vec![
            Route { id: "R1".into(), color: "ff0000".into() }
        ])));
        apply(&mut engine, Payload::Channel(ChannelEvent::Opened));
        apply(&mut engine, message("reset", &format!("[{}]", vehicle_json(42.35))));
        let after_reset = state.borrow().snapshot.vehicles["V1"].pos;

        apply(&mut engine, message("update", &vehicle_json(42.36)));
        let after_update = state.borrow().snapshot.clone();
        assert_eq!(after_update.vehicles.len(), 1);
        let vehicle = &after_update.vehicles["V1"];
        assert!(vehicle.pos.y < after_reset.y);
        assert_eq!(after_update.route_of(vehicle).unwrap().color, "ff0000");

        apply(&mut engine, message("remove", r#"{"id":"V1"}"#));
        let state = state.borrow();
        assert!(state.snapshot.vehicles.is_empty());
        assert_eq!(state.snapshot.routes.len(), 1);
        assert_eq!(state.status.notifications.applied, 3);
        assert_eq!(state.status.channel, Some(ChannelState::Open));
    }

    #[test]
    fn cancelled_updates_are_discarded() {
        let (mut engine, state) = Engine::new(Viewport::default());
        let token = CancelToken::new();
        token.cancel();
        engine.apply(Update::new(token, Payload::Routes(Ok(vec![
            Route { id: "R1".into(), color: "ff0000".into() }
        ]))));
        assert!(engine.store().routes().is_empty());
        assert_eq!(state.borrow().status.routes, LoadState::Pending);
    }

    #[test]
    fn failed_fetch_keeps_contents() {
        let (mut engine, state) = Engine::new(Viewport::default());
        let token = CancelToken::new();
        engine.apply(Update::new(token.clone(), Payload::Routes(Ok(vec![
            Route { id: "R1".into(), color: "ff0000".into() }
        ]))));
        engine.apply(Update::new(token, Payload::Routes(Err(
            FetchError::Status(hyper::StatusCode::BAD_GATEWAY)
        ))));
        assert_eq!(engine.store().routes().len(), 1);
        assert!(matches!(state.borrow().status.routes, LoadState::Failed(_)));
    }

    async fn backend() -> SocketAddr {
        let make_svc = make_service_fn(|_conn| async {
            Ok::<_, Infallible>(service_fn(|req: Request<Body>| async move {
                let body = match req.uri().path() {
                    "/routes" => Body::from(ROUTES),
                    "/stops" => Body::from(STOPS),
                    "/vehicles" => Body::from(format!(
                        "retry: 50\n\nevent: reset\ndata: [{}]\n\n\
                         : moving north\nevent: update\ndata: {}\n\n",
                        vehicle_json(42.35), vehicle_json(42.36)
                    )),
                    _ => {
                        return Ok::<_, Infallible>(
                            Response::builder().status(404)
                                .body(Body::empty()).unwrap()
                        )
                    }
                };
                Ok(Response::new(body))
            }))
        });
        let server = hyper::Server::bind(
            &SocketAddr::from(([127, 0, 0, 1], 0))
        ).serve(make_svc);
        let addr = server.local_addr();
        tokio::spawn(server);
        addr
    }

    #[tokio::test]
    async fn session_end_to_end() {
        let addr = backend().await;
        let mut config = Config::default();
        config.api = format!("http://{}", addr).parse().unwrap();
        let session = Session::start(&config);
        let mut state = session.state();

        let expected = Viewport::default().project(-71.05, 42.36);
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                {
                    let state = state.borrow();
                    // Each event must arrive as a single data line.
                    assert_eq!(state.status.notifications.dropped, 0);
                    let done = state.snapshot.routes.len() == 1
                        && state.snapshot.stops.len() == 1
                        && state.snapshot.vehicles.get("V1").map(|v| {
                            v.pos == expected
                        }).unwrap_or(false);
                    if done {
                        break
                    }
                }
                state.changed().await.unwrap();
            }
        }).await.unwrap();
        assert!(state.borrow().status.notifications.applied >= 2);

        session.shutdown().await;
        let version = state.borrow().snapshot.version;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(state.borrow().snapshot.version, version);
    }
}
