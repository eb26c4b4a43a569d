//! Minimal HTTP/1.1 server with a few fixed routes for end-to-end tests.
//!
//! - `/hello`   200 `text/plain` "hello"
//! - `/moved`   302 to `/hello` (Location percent-encoded: `/hello%3Fx`)
//! - `/missing` 404 `text/html`
//! - `/secret`  401 with `WWW-Authenticate: Basic realm="fetchq test"`
//! - `/a`, `/b` 200 `text/plain` with the path as body
//!
//! Every response closes the connection. Request paths are recorded in
//! arrival order.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub struct TestServer {
    pub base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path.trim_start_matches('/'))
    }

    /// Paths requested so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Starts the server on an ephemeral port. It runs until the process exits.
pub fn start() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let log = Arc::clone(&log);
            thread::spawn(move || handle(stream, &log));
        }
    });
    TestServer {
        base: format!("http://127.0.0.1:{}/", port),
        requests,
    }
}

fn handle(mut stream: TcpStream, log: &Mutex<Vec<String>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = String::from_utf8_lossy(&buf[..n]);
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    log.lock().unwrap().push(path.clone());

    let (status, extra, content_type, body): (&str, String, &str, String) = match path.as_str() {
        "/hello" => ("200 OK", String::new(), "text/plain", "hello".to_string()),
        "/moved" => (
            "302 Found",
            "Location: /hello%3Fx\r\n".to_string(),
            "text/html",
            "moved".to_string(),
        ),
        "/missing" => ("404 Not Found", String::new(), "text/html", "not found".to_string()),
        "/secret" => (
            "401 Unauthorized",
            "WWW-Authenticate: Basic realm=\"fetchq test\"\r\n".to_string(),
            "text/html",
            "denied".to_string(),
        ),
        p @ ("/a" | "/b") => ("200 OK", String::new(), "text/plain", p.to_string()),
        _ => ("404 Not Found", String::new(), "text/html", String::new()),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        extra,
        body
    );
    let _ = stream.write_all(response.as_bytes());
}
