//! Shared helpers for integration tests: a local roster backend over hyper

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// What the server saw for one request
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
}

pub struct RosterServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl RosterServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

/// Canned replies keyed by the code in the form body (`POST /`)
///
/// Fixed routes:
/// - `/redirect` answers 302 to `/accepted`
/// - `/accepted` answers a priority success to any method
/// - `/slow` waits two seconds before answering
/// - `/server-error` answers 500 with a success body
pub async fn start_roster_server(replies: &[(&str, &str)]) -> RosterServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let replies: Arc<HashMap<String, String>> =
        Arc::new(replies.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect());
    let requests = Arc::new(Mutex::new(Vec::new()));

    let recorded = requests.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let replies = replies.clone();
            let recorded = recorded.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| handle(req, replies.clone(), recorded.clone()));
                let _ = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await;
            });
        }
    });

    RosterServer { addr, requests }
}

fn reply(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
}

async fn handle(
    req: Request<hyper::body::Incoming>,
    replies: Arc<HashMap<String, String>>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let header_value = |name: header::HeaderName| {
        req.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
    };
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let content_type = header_value(header::CONTENT_TYPE);
    let authorization = header_value(header::AUTHORIZATION);

    let body = req.into_body().collect().await.map(|b| b.to_bytes()).unwrap_or_default();
    let body = String::from_utf8_lossy(&body).into_owned();

    recorded.lock().push(RecordedRequest {
        method,
        path: path.clone(),
        body: body.clone(),
        content_type,
        authorization,
    });

    let response = match path.as_str() {
        "/redirect" => {
            let mut response = reply(StatusCode::FOUND, String::new());
            response
                .headers_mut()
                .insert(header::LOCATION, header::HeaderValue::from_static("/accepted"));
            response
        }
        "/accepted" => reply(StatusCode::OK, r#"{"status":"success","priority":"yes"}"#.into()),
        "/slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            reply(StatusCode::OK, r#"{"status":"success"}"#.into())
        }
        "/server-error" => {
            reply(StatusCode::INTERNAL_SERVER_ERROR, r#"{"status":"success"}"#.into())
        }
        _ => {
            let code = body.split_once('=').map(|(_, v)| v).unwrap_or("");
            let json = replies.get(code).cloned().unwrap_or_else(|| r#"{"status":"error"}"#.into());
            reply(StatusCode::OK, json)
        }
    };
    Ok(response)
}
