//! Mock of an upstream tile server. Tests anticipate requests, then respond to them
//! whenever they see fit, which makes request ordering and retries observable.

use http_body_util::Full;
use hyper::{Request, Response, server::conn::http1, service::Service};
use hyper_util::rt::TokioIo;
use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::{Arc, Mutex},
};
use tokio::net::TcpListener;

pub use hyper::StatusCode;
pub use hyper::body::Bytes;

/// A solid-color PNG tile, the kind of payload a tile server would return.
pub fn solid_tile(size: u32, rgba: [u8; 4]) -> Bytes {
    let image = image::RgbaImage::from_pixel(size, size, image::Rgba(rgba));
    let mut cursor = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, image::ImageFormat::Png)
        .expect("encoding a png into memory cannot fail");
    Bytes::from(cursor.into_inner())
}

#[derive(Default)]
struct State {
    /// Anticipations made by the test, keyed by path, oldest first. Each one covers a
    /// single request.
    anticipations: HashMap<String, VecDeque<Anticipation>>,

    /// How many requests arrived per path.
    hits: HashMap<String, usize>,

    unexpected: Vec<String>,
}

struct Anticipation {
    request_tx: tokio::sync::oneshot::Sender<Request<()>>,
    response_rx: tokio::sync::oneshot::Receiver<Response<Full<Bytes>>>,
}

pub struct Server {
    port: u16,
    state: Arc<Mutex<State>>,
}

impl Server {
    /// Create a new [`Server`], and bind it to a random port.
    pub async fn bind() -> Server {
        let state = Arc::new(Mutex::new(State::default()));

        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let state_clone = state.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);

                let state = state_clone.clone();
                tokio::task::spawn(async move {
                    let _ = http1::Builder::new()
                        .serve_connection(io, MockRequest { state })
                        .await;
                });
            }
        });

        Server { port, state }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Announce that a request to `path` will come. Anticipations for one path are
    /// consumed in order, one per request; queue several to cover retries.
    pub async fn anticipate(&self, path: impl Into<String>) -> Anticipated {
        let path = path.into();
        log::info!("Anticipating '{path}'.");

        let (request_tx, request_rx) = tokio::sync::oneshot::channel();
        let (response_tx, response_rx) = tokio::sync::oneshot::channel();

        self.state
            .lock()
            .unwrap()
            .anticipations
            .entry(path)
            .or_default()
            .push_back(Anticipation {
                request_tx,
                response_rx,
            });

        Anticipated {
            request_rx,
            response_tx,
        }
    }

    /// How many requests to `path` arrived so far, anticipated or not.
    pub fn hits(&self, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .hits
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if !self.state.lock().unwrap().unexpected.is_empty() {
            panic!("there were unexpected requests");
        }
    }
}

pub struct Anticipated {
    request_rx: tokio::sync::oneshot::Receiver<Request<()>>,
    response_tx: tokio::sync::oneshot::Sender<Response<Full<Bytes>>>,
}

impl Anticipated {
    /// Wait for the anticipated request to actually arrive.
    pub async fn expect(&mut self) -> Request<()> {
        (&mut self.request_rx).await.expect("server is gone")
    }

    /// Respond with 200 and the given payload.
    pub fn respond(self, payload: impl Into<Bytes>) {
        log::info!("Responding.");
        let _ = self.response_tx.send(Response::new(Full::new(payload.into())));
    }

    /// Respond with a bare status code and no payload.
    pub fn respond_with_status(self, status: StatusCode) {
        log::info!("Responding with {status}.");
        let response = Response::builder()
            .status(status)
            .body(Full::new(Bytes::new()))
            .expect("a bare status response cannot be malformed");
        let _ = self.response_tx.send(response);
    }
}

struct MockRequest {
    state: Arc<Mutex<State>>,
}

impl Service<Request<hyper::body::Incoming>> for MockRequest {
    type Response = Response<Full<Bytes>>;
    type Error = hyper::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, request: Request<hyper::body::Incoming>) -> Self::Future {
        log::info!("Incoming request '{}'.", request.uri());
        let state = self.state.clone();
        Box::pin(async move {
            let path = request.uri().path().to_string();

            let anticipation = {
                let mut state = state.lock().unwrap();
                *state.hits.entry(path.clone()).or_default() += 1;
                state
                    .anticipations
                    .get_mut(&path)
                    .and_then(VecDeque::pop_front)
            };

            if let Some(anticipation) = anticipation {
                let (parts, _) = request.into_parts();
                let _ = anticipation.request_tx.send(Request::from_parts(parts, ()));

                match anticipation.response_rx.await {
                    Ok(response) => Ok(response),
                    // The test dropped the anticipation without responding.
                    Err(_) => Ok(Response::builder()
                        .status(StatusCode::GONE)
                        .body(Full::new(Bytes::from_static(b"never responded")))
                        .expect("a bare status response cannot be malformed")),
                }
            } else {
                log::warn!("Unexpected '{}'.", request.uri());
                state.lock().unwrap().unexpected.push(path);
                Ok(Response::builder()
                    .status(StatusCode::IM_A_TEAPOT)
                    .body(Full::new(Bytes::from_static(b"unexpected")))
                    .expect("a bare status response cannot be malformed"))
            }
        })
    }
}
