//! Applying vehicle notifications to the store.
//!
//! The vehicle event stream carries four kinds of notifications: `reset`
//! replaces all vehicles, `add` and `update` insert or overwrite a single
//! vehicle, and `remove` deletes one. The [`Reconciler`] follows the state
//! of the channel they arrive on and only lets them through to the store
//! while the channel is open.

use std::fmt;
use serde::Serialize;
use tracing::{debug, info, warn};
use crate::projection::Viewport;
use crate::record::{RecordError, RemoveRecord, VehicleRecord};
use crate::sse;
use crate::store::Store;


//------------ Notification --------------------------------------------------

/// A change to the vehicle collection.
#[derive(Clone, Debug)]
pub enum Notification {
    Reset(Vec<VehicleRecord>),
    Add(VehicleRecord),
    Update(VehicleRecord),
    Remove(RemoveRecord),
}

impl Notification {
    /// Parses a notification from an event’s type and data.
    ///
    /// Returns `Ok(None)` if the event type isn’t a notification.
    pub fn parse(
        event: &str, data: &str
    ) -> Result<Option<Self>, NotificationError> {
        let res = match event {
            "reset" => Notification::Reset(serde_json::from_str(data)?),
            "add" => Notification::Add(serde_json::from_str(data)?),
            "update" => Notification::Update(serde_json::from_str(data)?),
            "remove" => Notification::Remove(serde_json::from_str(data)?),
            _ => return Ok(None)
        };
        Ok(Some(res))
    }

    /// Returns the name of the notification kind.
    pub fn kind(&self) -> &'static str {
        match *self {
            Notification::Reset(_) => "reset",
            Notification::Add(_) => "add",
            Notification::Update(_) => "update",
            Notification::Remove(_) => "remove",
        }
    }
}


//------------ apply_notification --------------------------------------------

/// Applies a notification to the store.
///
/// Vehicle positions are projected through `viewport`. If any of the
/// vehicles can’t be projected, the store is left untouched.
pub fn apply_notification(
    store: &mut Store, viewport: Viewport, notification: Notification
) -> Result<(), NotificationError> {
    match notification {
        Notification::Reset(records) => {
            let vehicles = records.into_iter().map(|record| {
                record.into_vehicle(viewport)
            }).collect::<Result<Vec<_>, _>>()?;
            store.replace_vehicles(vehicles);
        }
        Notification::Add(record) | Notification::Update(record) => {
            store.upsert_vehicle(record.into_vehicle(viewport)?);
        }
        Notification::Remove(record) => {
            store.remove_vehicle(&record.id);
        }
    }
    Ok(())
}


//------------ ChannelState --------------------------------------------------

/// The state of the channel notifications arrive on.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Closed => "closed",
        })
    }
}


//------------ ChannelEvent --------------------------------------------------

/// Something that happened on the channel.
#[derive(Clone, Debug)]
pub enum ChannelEvent {
    Connecting,
    Opened,
    Message(sse::Event),
    Closed(Option<String>),
}


//------------ Reconciler ----------------------------------------------------

/// Applies the events of a channel to a store.
#[derive(Clone, Debug)]
pub struct Reconciler {
    viewport: Viewport,
    state: ChannelState,
    stats: ReconcilerStats,
}

/// Counters kept by the reconciler.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ReconcilerStats {
    /// The number of notifications applied to the store.
    pub applied: u64,

    /// The number of notifications dropped because they were malformed.
    pub dropped: u64,

    /// The number of events ignored because of their type or because the
    /// channel wasn’t open.
    pub ignored: u64,
}

impl Reconciler {
    pub fn new(viewport: Viewport) -> Self {
        Reconciler {
            viewport,
            state: ChannelState::Closed,
            stats: Default::default(),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn stats(&self) -> ReconcilerStats {
        self.stats
    }

    /// Processes a channel event.
    ///
    /// Returns whether the store has been changed.
    pub fn handle(&mut self, store: &mut Store, event: ChannelEvent) -> bool {
        match event {
            ChannelEvent::Connecting => {
                self.state = ChannelState::Connecting;
                false
            }
            ChannelEvent::Opened => {
                info!("vehicle stream open");
                self.state = ChannelState::Open;
                false
            }
            ChannelEvent::Closed(reason) => {
                match reason {
                    Some(reason) => warn!("vehicle stream closed: {}", reason),
                    None => info!("vehicle stream closed"),
                }
                self.state = ChannelState::Closed;
                false
            }
            ChannelEvent::Message(event) => self.handle_message(store, event),
        }
    }

    fn handle_message(&mut self, store: &mut Store, event: sse::Event) -> bool {
        if self.state != ChannelState::Open {
            debug!("ignoring '{}' event on {} channel", event.event, self.state);
            self.stats.ignored += 1;
            return false
        }
        let notification = match Notification::parse(&event.event, &event.data) {
            Ok(Some(notification)) => notification,
            Ok(None) => {
                debug!("ignoring unknown event type '{}'", event.event);
                self.stats.ignored += 1;
                return false
            }
            Err(err) => {
                warn!("dropping malformed '{}' event: {}", event.event, err);
                self.stats.dropped += 1;
                return false
            }
        };
        let kind = notification.kind();
        match apply_notification(store, self.viewport, notification) {
            Ok(()) => {
                self.stats.applied += 1;
                true
            }
            Err(err) => {
                warn!("dropping '{}' notification: {}", kind, err);
                self.stats.dropped += 1;
                false
            }
        }
    }
}


//------------ NotificationError ---------------------------------------------

/// A notification was malformed.
#[derive(Debug)]
pub enum NotificationError {
    Json(serde_json::Error),
    Record(RecordError),
}

impl From<serde_json::Error> for NotificationError {
    fn from(err: serde_json::Error) -> Self {
        NotificationError::Json(err)
    }
}

impl From<RecordError> for NotificationError {
    fn from(err: RecordError) -> Self {
        NotificationError::Record(err)
    }
}

impl fmt::Display for NotificationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            NotificationError::Json(ref err) => err.fmt(f),
            NotificationError::Record(ref err) => err.fmt(f),
        }
    }
}

impl std::error::Error for NotificationError { }


//============ Tests =========================================================
