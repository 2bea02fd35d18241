use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;

#[derive(Debug)]
pub struct CapturedRequest {
    pub method: String,
    /// Request target as sent, including any query string.
    pub target: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl CapturedRequest {
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or_default()
    }

    /// Raw (undecoded) value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        let (_, query) = self.target.split_once('?')?;
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then_some(value)
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// One canned reply, served in order.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status_line: String,
    pub body: String,
}

impl MockResponse {
    pub fn new(status_line: &str, body: &str) -> Self {
        Self {
            status_line: status_line.to_string(),
            body: body.to_string(),
        }
    }

    pub fn ok(body: &str) -> Self {
        Self::new("200 OK", body)
    }
}

/// Spawn a mock chat API that answers `responses.len()` requests, one connection each, in
/// order. Returns the base URL and a receiver yielding each captured request.
pub fn spawn_scripted_server(
    responses: Vec<MockResponse>,
) -> (String, mpsc::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
    let addr = listener.local_addr().expect("read mock server addr");
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for response in responses {
            let (mut stream, _) = listener.accept().expect("accept mock request");
            let req = read_http_request(&mut stream);
            if tx.send(req).is_err() {
                return;
            }
            let reply = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                response.status_line,
                response.body.len(),
                response.body
            );
            stream
                .write_all(reply.as_bytes())
                .expect("write mock response");
        }
    });

    (format!("http://{addr}"), rx)
}

pub fn spawn_one_shot_server(
    status_line: &str,
    response_body: &str,
) -> (String, mpsc::Receiver<CapturedRequest>) {
    spawn_scripted_server(vec![MockResponse::new(status_line, response_body)])
}

fn read_http_request(stream: &mut TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut header_end = None;
    let mut content_length = 0usize;

    loop {
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).expect("read request bytes");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if header_end.is_none() {
            header_end = buf
                .windows(4)
                .position(|w| w == b"\r\n\r\n")
                .map(|idx| idx + 4);
            if let Some(end) = header_end {
                content_length = parse_headers(&String::from_utf8_lossy(&buf[..end]))
                    .get("content-length")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
            }
        }
        if matches!(header_end, Some(end) if buf.len() >= end + content_length) {
            break;
        }
    }

    let end = header_end.expect("request headers must be present");
    let head = String::from_utf8_lossy(&buf[..end]).to_string();
    let request_line = head.lines().next().expect("request line");
    let mut parts = request_line.split_whitespace();
    let method = parts.next().expect("method").to_string();
    let target = parts.next().expect("target").to_string();
    let body = String::from_utf8(buf[end..end + content_length].to_vec()).expect("utf8 body");

    CapturedRequest {
        method,
        target,
        headers: parse_headers(&head),
        body,
    }
}

fn parse_headers(head: &str) -> HashMap<String, String> {
    head.lines()
        .skip(1)
        .take_while(|line| !line.trim().is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect()
}
