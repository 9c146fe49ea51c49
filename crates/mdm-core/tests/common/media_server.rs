//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves one static body to every GET. Options simulate the failure modes
//! the transfer engine has to handle: error statuses, no Content-Length,
//! connections dropped mid-body and slow links.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct MediaServerOptions {
    /// Status line sent with every response.
    pub status: u16,
    /// If false, omit Content-Length and end the body by closing the connection.
    pub send_length: bool,
    /// Close the connection after this many body bytes, still advertising the full length.
    pub drop_after: Option<usize>,
    /// Body is written in pieces of this size.
    pub chunk: usize,
    /// Pause after each piece.
    pub chunk_delay: Duration,
}

impl Default for MediaServerOptions {
    fn default() -> Self {
        Self {
            status: 200,
            send_length: true,
            drop_after: None,
            chunk: 16 * 1024,
            chunk_delay: Duration::ZERO,
        }
    }
}

/// Handle to a running server. The server lives until the process exits.
pub struct MediaServer {
    base_url: String,
    authorization: Arc<Mutex<Option<String>>>,
}

impl MediaServer {
    /// URL of a video under this server, e.g. `http://127.0.0.1:1234/clip.mp4`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Authorization header of the most recent request, if any.
    pub fn last_authorization(&self) -> Option<String> {
        self.authorization.lock().unwrap().clone()
    }
}

pub fn start(body: Vec<u8>) -> MediaServer {
    start_with_options(body, MediaServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: MediaServerOptions) -> MediaServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let authorization = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&authorization);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let seen = Arc::clone(&seen);
            thread::spawn(move || handle(stream, &body, opts, &seen));
        }
    });
    MediaServer {
        base_url: format!("http://127.0.0.1:{}/", port),
        authorization,
    }
}

fn handle(
    mut stream: TcpStream,
    body: &[u8],
    opts: MediaServerOptions,
    seen: &Mutex<Option<String>>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    *seen.lock().unwrap() = header_value(request, "authorization");

    let length = if opts.send_length {
        format!("Content-Length: {}\r\n", body.len())
    } else {
        String::new()
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: video/mp4\r\n{}Connection: close\r\n\r\n",
        opts.status,
        reason(opts.status),
        length
    );
    if stream.write_all(response.as_bytes()).is_err() {
        return;
    }

    let limit = opts.drop_after.unwrap_or(body.len()).min(body.len());
    for piece in body[..limit].chunks(opts.chunk.max(1)) {
        if stream.write_all(piece).is_err() {
            return;
        }
        let _ = stream.flush();
        if !opts.chunk_delay.is_zero() {
            thread::sleep(opts.chunk_delay);
        }
    }
}

fn header_value(request: &str, name: &str) -> Option<String> {
    request
        .lines()
        .skip(1)
        .take_while(|l| !l.trim().is_empty())
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(name))
        .map(|(_, v)| v.trim().to_string())
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}
