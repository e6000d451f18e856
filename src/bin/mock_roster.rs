//! Mock roster backend
//!
//! Stands in for the verification web app during local testing.
//!
//! Protocol:
//! - `POST /` with a form body; the code is in the `qrCode` field (configurable)
//! - Unknown code: `{"status":"error"}`
//! - Code already used: `{"status":"error","message":"already checked in"}`
//! - Otherwise the code is marked used and the reply is
//!   `{"status":"success","priority":"yes"|"no"}`
//! - `GET /health` answers `ok`
//!
//! Roster file: one `code[,priority]` per line, `#` starts a comment.
//! A priority column of `yes`, `y`, `true` or `1` marks a priority guest.
//!
//! Usage:
//!   cargo run --bin mock-roster -- --port 8080 --roster roster.csv

use anyhow::Context;
use bytes::Bytes;
use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "mock-roster")]
#[command(about = "Mock roster backend for local check-in desk testing")]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Roster file (code[,priority] per line)
    #[arg(short, long)]
    roster: Option<String>,

    /// Form field carrying the code
    #[arg(long, default_value = "qrCode")]
    field: String,

    /// Artificial response delay (ms)
    #[arg(long, default_value = "300")]
    delay_ms: u64,

    /// Accept the same code more than once
    #[arg(long)]
    reusable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Guest {
    priority: bool,
    checked_in: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Unknown,
    AlreadyCheckedIn,
    Admitted { priority: bool },
}

impl Reply {
    fn to_json(self) -> &'static str {
        match self {
            Reply::Unknown => r#"{"status":"error"}"#,
            Reply::AlreadyCheckedIn => r#"{"status":"error","message":"already checked in"}"#,
            Reply::Admitted { priority: true } => r#"{"status":"success","priority":"yes"}"#,
            Reply::Admitted { priority: false } => r#"{"status":"success","priority":"no"}"#,
        }
    }
}

struct Roster {
    guests: Mutex<FxHashMap<String, Guest>>,
    reusable: bool,
}

impl Roster {
    fn parse(content: &str, reusable: bool) -> Self {
        let mut guests = FxHashMap::default();

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut columns = line.splitn(2, ',');
            let code = columns.next().unwrap_or("").trim();
            if code.is_empty() {
                continue;
            }
            let priority = columns.next().is_some_and(|p| {
                matches!(p.trim().to_ascii_lowercase().as_str(), "yes" | "y" | "true" | "1")
            });
            guests.insert(code.to_string(), Guest { priority, checked_in: false });
        }

        Self { guests: Mutex::new(guests), reusable }
    }

    fn sample(reusable: bool) -> Self {
        Self::parse("ABC123,yes\nDEF456\nGHI789,no\n", reusable)
    }

    fn len(&self) -> usize {
        self.guests.lock().len()
    }

    fn check_in(&self, code: &str) -> Reply {
        let mut guests = self.guests.lock();
        let Some(guest) = guests.get_mut(code) else {
            return Reply::Unknown;
        };
        if guest.checked_in && !self.reusable {
            return Reply::AlreadyCheckedIn;
        }
        guest.checked_in = true;
        Reply::Admitted { priority: guest.priority }
    }
}

/// Find a field in an `application/x-www-form-urlencoded` body
fn form_field(body: &[u8], field: &str) -> Option<String> {
    form_urlencoded::parse(body).find(|(key, _)| key == field).map(|(_, value)| value.into_owned())
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: &'static str,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
    response
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    roster: Arc<Roster>,
    field: Arc<String>,
    delay: Duration,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/health") => Ok(respond(StatusCode::OK, "text/plain", "ok")),
        (&Method::POST, _) => {
            let body = match req.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    eprintln!("[MOCK] Body read error: {}", e);
                    return Ok(respond(StatusCode::BAD_REQUEST, "text/plain", "bad request"));
                }
            };
            let code = form_field(&body, &field).map(|c| c.trim().to_string()).unwrap_or_default();

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let reply = roster.check_in(&code);
            println!("[MOCK] {:<20} -> {:?}", code, reply);
            Ok(respond(StatusCode::OK, "application/json", reply.to_json()))
        }
        _ => Ok(respond(StatusCode::NOT_FOUND, "text/plain", "Not Found")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let roster = match &args.roster {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read roster file {}", path))?;
            Roster::parse(&content, args.reusable)
        }
        None => Roster::sample(args.reusable),
    };
    let roster = Arc::new(roster);
    let field = Arc::new(args.field.clone());
    let delay = Duration::from_millis(args.delay_ms);

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║               Mock Roster Backend                        ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("║ Port:            {:>5}                                   ║", args.port);
    println!("║ Guests:          {:>5}                                   ║", roster.len());
    println!("║ Code field:      {:<38} ║", args.field);
    println!("║ Delay:           {:>5} ms                                ║", args.delay_ms);
    println!("║ Reusable codes:  {:<38} ║", args.reusable);
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener =
        TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {}", addr))?;
    println!("[MOCK] Listening on {}", addr);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let roster = roster.clone();
                        let field = field.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                handle_request(req, roster.clone(), field.clone(), delay)
                            });
                            if let Err(e) =
                                http1::Builder::new().serve_connection(io, service).await
                            {
                                eprintln!("[MOCK] HTTP error: {}", e);
                            }
                        });
                    }
                    Err(e) => eprintln!("[MOCK] Accept error: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("[MOCK] Shutting down");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roster() {
        let roster = Roster::parse(
            "# guest list\nABC123, yes\nDEF456\n\nGHI789,no # walk-in\nJKL000,TRUE\n,yes\n",
            false,
        );
        assert_eq!(roster.len(), 4);
        assert_eq!(roster.check_in("ABC123"), Reply::Admitted { priority: true });
        assert_eq!(roster.check_in("DEF456"), Reply::Admitted { priority: false });
        assert_eq!(roster.check_in("GHI789"), Reply::Admitted { priority: false });
        assert_eq!(roster.check_in("JKL000"), Reply::Admitted { priority: true });
    }

    #[test]
    fn test_unknown_and_repeat_codes() {
        let roster = Roster::sample(false);
        assert_eq!(roster.check_in("ZZZ999"), Reply::Unknown);
        assert_eq!(roster.check_in(""), Reply::Unknown);
        assert_eq!(roster.check_in("ABC123"), Reply::Admitted { priority: true });
        assert_eq!(roster.check_in("ABC123"), Reply::AlreadyCheckedIn);
    }

    #[test]
    fn test_reusable_roster() {
        let roster = Roster::sample(true);
        assert_eq!(roster.check_in("DEF456"), Reply::Admitted { priority: false });
        assert_eq!(roster.check_in("DEF456"), Reply::Admitted { priority: false });
    }

    #[test]
    fn test_reply_json() {
        let value: serde_json::Value =
            serde_json::from_str(Reply::AlreadyCheckedIn.to_json()).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "already checked in");

        let value: serde_json::Value =
            serde_json::from_str(Reply::Admitted { priority: true }.to_json()).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["priority"], "yes");
    }

    #[test]
    fn test_form_field() {
        assert_eq!(form_field(b"qrCode=ABC123", "qrCode"), Some("ABC123".to_string()));
        assert_eq!(form_field(b"a=1&qrCode=A%2FB+C", "qrCode"), Some("A/B C".to_string()));
        assert_eq!(form_field(b"other=1", "qrCode"), None);
        assert_eq!(form_field(b"qrCode", "qrCode"), Some(String::new()));
    }

    #[test]
    fn test_form_field_bad_escape_kept_literal() {
        assert_eq!(form_field(b"qrCode=100%", "qrCode"), Some("100%".to_string()));
        assert_eq!(form_field(b"qrCode=%zz", "qrCode"), Some("%zz".to_string()));
        assert_eq!(form_field(b"qr%43ode=%41%42", "qrCode"), Some("AB".to_string()));
    }
}
