//! Loading the reference snapshots.
//!
//! Routes and stops are fetched exactly once when a session starts. The two
//! fetches run independently of each other, each in its own task with its
//! own cancellation token.

use tracing::warn;
use crate::cancel::{CancelToken, TaskHandle};
use crate::client::{ApiClient, FetchError};
use crate::engine::{Payload, UpdateSender};
use crate::entity::{Route, Stop};
use crate::projection::Viewport;
use crate::record::{Document, RouteRecord, StopRecord};


//------------ Configurable Constants ----------------------------------------

/// The path of the routes snapshot relative to the API base.
pub const ROUTES_PATH: &str = "/routes";

/// The path of the stops snapshot relative to the API base.
pub const STOPS_PATH: &str = "/stops";


//------------ SnapshotLoader ------------------------------------------------

#[derive(Clone, Debug)]
pub struct SnapshotLoader {
    client: ApiClient,
    viewport: Viewport,
}

impl SnapshotLoader {
    pub fn new(client: ApiClient, viewport: Viewport) -> Self {
        SnapshotLoader { client, viewport }
    }

    /// Fetches the routes.
    pub async fn load_routes(&self) -> Result<Vec<Route>, FetchError> {
        let doc: Document<RouteRecord> =
            self.client.fetch_json(ROUTES_PATH).await?;
        Ok(doc.data.into_iter().map(Into::into).collect())
    }

    /// Fetches the stops and projects them.
    ///
    /// Stops that can’t be projected are skipped.
    pub async fn load_stops(&self) -> Result<Vec<Stop>, FetchError> {
        let doc: Document<StopRecord> =
            self.client.fetch_json(STOPS_PATH).await?;
        Ok(project_stops(doc.data, self.viewport))
    }

    /// Spawns both fetches.
    ///
    /// Returns the handles for the routes and stops fetches.
    pub fn spawn(self, queue: &UpdateSender) -> (TaskHandle, TaskHandle) {
        let routes_queue = queue.with_token(CancelToken::new());
        let stops_queue = queue.with_token(CancelToken::new());
        let stops_loader = self.clone();
        (
            TaskHandle::spawn(routes_queue.token().clone(), async move {
                let routes = self.load_routes().await;
                routes_queue.send(Payload::Routes(routes)).await;
            }),
            TaskHandle::spawn(stops_queue.token().clone(), async move {
                let stops = stops_loader.load_stops().await;
                stops_queue.send(Payload::Stops(stops)).await;
            }),
        )
    }
}

fn project_stops(records: Vec<StopRecord>, viewport: Viewport) -> Vec<Stop> {
    records.into_iter().filter_map(|record| {
        match record.into_stop(viewport) {
            Ok(stop) => Some(stop),
            Err(err) => {
                warn!("skipping stop {}", err);
                None
            }
        }
    }).collect()
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bad_stops_are_skipped() {
        let doc: Document<StopRecord> = serde_json::from_str(r#"{"data": [
            {"id": "a", "attributes":
                {"latitude": 42.35, "longitude": -71.05, "name": "A"}},
            {"id": "b", "attributes":
                {"latitude": -90, "longitude": -71.05, "name": "B"}}
        ]}"#).unwrap();
        let stops = project_stops(doc.data, Viewport::default());
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].id, "a");
    }
}
