//! The viewer.
//!
//! The viewer serves the current map as an image together with a small
//! page that keeps reloading it. Rendered frames are cached by store
//! version so that polling an unchanged map is cheap.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use hyper::{Body, Method, Request, Response, StatusCode};
use hyper::body::Bytes;
use hyper::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderValue};
use hyper::service::{make_service_fn, service_fn};
use kurbo::Point;
use lru::LruCache;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use crate::engine::MapState;
use crate::render::{Format, HOVER_DISTANCE, Presenter, RenderError, StopIndex};
use crate::store::Snapshot;


//------------ Configurable Constants ----------------------------------------

/// How many rendered frames to keep.
const FRAME_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(32) {
    Some(size) => size,
    None => panic!("zero cache size"),
};


//------------ Server --------------------------------------------------------

#[derive(Clone)]
pub struct Server {
    state: watch::Receiver<MapState>,
    presenter: Presenter,
    cache: Arc<Mutex<LruCache<FrameKey, Bytes>>>,

    /// The stop index for hovering and the store version it was built for.
    stops: Arc<Mutex<Option<(u64, Arc<StopIndex>)>>>,
}

impl Server {
    pub fn new(state: watch::Receiver<MapState>, presenter: Presenter) -> Self {
        Server {
            state,
            presenter,
            cache: Arc::new(Mutex::new(LruCache::new(FRAME_CACHE_SIZE))),
            stops: Default::default(),
        }
    }

    /// Serves requests on `addr` until the returned future is dropped.
    pub async fn run(self, addr: SocketAddr) -> Result<(), hyper::Error> {
        let make_svc = make_service_fn(move |_conn| {
            let this = self.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |r| {
                    let this = this.clone();
                    async move { this.process(r).await }
                }))
            }
        });

        let server = hyper::Server::try_bind(&addr)?.serve(make_svc);
        info!("viewer listening on http://{}/", server.local_addr());
        let res = server.await;
        if let Err(ref err) = res {
            error!("server error: {}", err);
        }
        res
    }
}

impl Server {
    async fn process(
        &self, request: Request<Body>
    ) -> Result<Response<Body>, Infallible> {
        debug!("{} {}", request.method(), request.uri());
        if request.method() != Method::GET {
            return Ok(text_response(
                StatusCode::METHOD_NOT_ALLOWED, "method not allowed"
            ))
        }

        let path = request.uri().path();
        if path == "/" {
            return Ok(response(
                StatusCode::OK, "text/html;charset=utf-8",
                Body::from(include_bytes!("../html/index.html").as_ref())
            ))
        }
        if path == "/state.json" {
            return Ok(self.state_json())
        }

        let format = match path.strip_prefix("/map.").map(Format::from_str) {
            Some(Ok(format)) => format,
            _ => return Ok(not_found())
        };
        let query = match serde_urlencoded::from_str::<FrameQuery>(
            request.uri().query().unwrap_or("")
        ) {
            Ok(query) => query,
            Err(err) => {
                return Ok(text_response(
                    StatusCode::BAD_REQUEST, &format!("bad query: {}", err)
                ))
            }
        };
        Ok(self.frame(format, query))
    }

    fn state_json(&self) -> Response<Body> {
        let state = self.state.borrow().clone();
        match serde_json::to_vec(&state) {
            Ok(body) => {
                let mut res = response(
                    StatusCode::OK, "application/json", Body::from(body)
                );
                res.headers_mut().insert(
                    CACHE_CONTROL, HeaderValue::from_static("no-cache")
                );
                res
            }
            Err(err) => {
                warn!("failed to serialize map state: {}", err);
                text_response(
                    StatusCode::INTERNAL_SERVER_ERROR, "internal error"
                )
            }
        }
    }

    fn frame(&self, format: Format, query: FrameQuery) -> Response<Body> {
        let snapshot = self.state.borrow().snapshot.clone();
        let hover = query.pointer().and_then(|pos| {
            self.stop_index(&snapshot).find(
                pos, HOVER_DISTANCE
            ).map(String::from)
        });
        let key = FrameKey { version: snapshot.version, format, hover };

        if let Some(data) = self.cached(&key) {
            return frame_response(format, data)
        }

        let scene = self.presenter.scene(&snapshot, key.hover.as_deref());
        match format.render(&scene) {
            Ok(data) => {
                let data = Bytes::from(data);
                if let Ok(mut cache) = self.cache.lock() {
                    cache.put(key, data.clone());
                }
                frame_response(format, data)
            }
            Err(RenderError::Unsupported(_)) => not_found(),
            Err(err) => {
                warn!("failed to render {} frame: {}", format, err);
                text_response(
                    StatusCode::INTERNAL_SERVER_ERROR, "internal error"
                )
            }
        }
    }

    fn cached(&self, key: &FrameKey) -> Option<Bytes> {
        self.cache.lock().ok()?.get(key).cloned()
    }

    /// Returns the stop index for the snapshot, building it if necessary.
    fn stop_index(&self, snapshot: &Snapshot) -> Arc<StopIndex> {
        let mut stops = match self.stops.lock() {
            Ok(stops) => stops,
            Err(_) => return Arc::new(self.presenter.stop_index(snapshot)),
        };
        match *stops {
            Some((version, ref index)) if version == snapshot.version => {
                index.clone()
            }
            _ => {
                let index = Arc::new(self.presenter.stop_index(snapshot));
                *stops = Some((snapshot.version, index.clone()));
                index
            }
        }
    }
}


//------------ FrameQuery ----------------------------------------------------

/// The query of a map request.
///
/// If both coordinates are given, they are the pointer position in canvas
/// coordinates.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
struct FrameQuery {
    x: Option<f64>,
    y: Option<f64>,
}

impl FrameQuery {
    fn pointer(self) -> Option<Point> {
        Some(Point::new(self.x?, self.y?))
    }
}


//------------ FrameKey ------------------------------------------------------

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct FrameKey {
    version: u64,
    format: Format,
    hover: Option<String>,
}


//------------ Helpers -------------------------------------------------------

fn response(
    status: StatusCode, content_type: &'static str, body: Body
) -> Response<Body> {
    let mut res = Response::new(body);
    *res.status_mut() = status;
    res.headers_mut().insert(
        CONTENT_TYPE, HeaderValue::from_static(content_type)
    );
    res
}

fn text_response(status: StatusCode, text: &str) -> Response<Body> {
    response(
        status, "text/plain;charset=utf-8", Body::from(String::from(text))
    )
}

fn not_found() -> Response<Body> {
    text_response(StatusCode::NOT_FOUND, "not found")
}

fn frame_response(format: Format, data: Bytes) -> Response<Body> {
    let mut res = response(StatusCode::OK, format.content_type(), data.into());
    res.headers_mut().insert(
        CACHE_CONTROL, HeaderValue::from_static("no-cache")
    );
    res
}


//============ Tests =========================================================
