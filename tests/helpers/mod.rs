//! Loopback HTTP server for integration tests.
//!
//! Answers queued responses in order and records every request it sees,
//! body included, so tests can check exactly what went over the wire.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// One request as received by the server.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    /// Path and query string
    pub target: String,
    /// Header names are lowercased
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers.iter().find(|(k, _)| *k == name).map(|(_, v)| v.as_str())
    }

    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or(&self.target)
    }

    pub fn query(&self) -> &str {
        self.target.splitn(2, '?').nth(1).unwrap_or("")
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Canned response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }
}

pub struct MockServer {
    port: u16,
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback listener");
        let port = listener.local_addr().expect("local addr").port();
        let responses = Arc::new(Mutex::new(VecDeque::new()));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let responses = Arc::clone(&responses);
            let requests = Arc::clone(&requests);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let responses = Arc::clone(&responses);
                    let requests = Arc::clone(&requests);
                    tokio::spawn(async move {
                        let _ = serve_connection(stream, responses, requests).await;
                    });
                }
            })
        };

        Self { port, responses, requests, handle }
    }

    /// A server that answers every request as soon as its headers arrive,
    /// then keeps the connection open without reading the body.
    pub async fn start_answering_early(response: MockResponse) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback listener");
        let port = listener.local_addr().expect("local addr").port();
        let responses = Arc::new(Mutex::new(VecDeque::new()));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let requests = Arc::clone(&requests);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let requests = Arc::clone(&requests);
                    let response = response.clone();
                    tokio::spawn(async move {
                        let _ = answer_before_body(stream, response, requests).await;
                    });
                }
            })
        };

        Self { port, responses, requests, handle }
    }

    /// Queue the response for the next unanswered request.
    pub fn respond(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Client that never routes loopback traffic through a proxy.
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().expect("build test client")
}

async fn serve_connection(
    stream: TcpStream,
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
) -> Result<()> {
    let mut reader = BufReader::new(stream);

    loop {
        let request = match read_request(&mut reader).await? {
            Some(request) => request,
            None => return Ok(()),
        };
        requests.lock().unwrap().push(request);

        let response = responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| MockResponse::new(500, "no response queued"));

        write_response(reader.get_mut(), &response).await?;
    }
}

async fn answer_before_body(
    stream: TcpStream,
    response: MockResponse,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
) -> Result<()> {
    let mut reader = BufReader::new(stream);
    let (method, target, headers) = match read_head(&mut reader).await? {
        Some(head) => head,
        None => return Ok(()),
    };
    requests.lock().unwrap().push(CapturedRequest { method, target, headers, body: Vec::new() });

    write_response(reader.get_mut(), &response).await?;
    // Hold the socket; the unread body stays in the client's send buffer
    tokio::time::sleep(std::time::Duration::from_secs(600)).await;
    Ok(())
}

async fn write_response(stream: &mut TcpStream, response: &MockResponse) -> Result<()> {
    let head = format!(
        "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
        response.status,
        response.body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(response.body.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

type RequestHead = (String, String, Vec<(String, String)>);

async fn read_head(reader: &mut BufReader<TcpStream>) -> Result<Option<RequestHead>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let mut parts = line.trim_end().splitn(3, ' ');
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().ok_or_else(|| anyhow!("malformed request line"))?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }
    Ok(Some((method, target, headers)))
}

async fn read_request(reader: &mut BufReader<TcpStream>) -> Result<Option<CapturedRequest>> {
    let (method, target, headers) = match read_head(reader).await? {
        Some(head) => head,
        None => return Ok(None),
    };

    let header = |name: &str| headers.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone());
    let body = if let Some(len) = header("content-length") {
        let len: usize = len.parse()?;
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        body
    } else if header("transfer-encoding").map_or(false, |v| v.eq_ignore_ascii_case("chunked")) {
        read_chunked(reader).await?
    } else {
        Vec::new()
    };

    Ok(Some(CapturedRequest { method, target, headers, body }))
}

async fn read_chunked(reader: &mut BufReader<TcpStream>) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let mut size_line = String::new();
        reader.read_line(&mut size_line).await?;
        let size = usize::from_str_radix(size_line.trim().split(';').next().unwrap_or("0"), 16)?;
        if size == 0 {
            let mut end = String::new();
            reader.read_line(&mut end).await?;
            return Ok(body);
        }
        let start = body.len();
        body.resize(start + size, 0);
        reader.read_exact(&mut body[start..]).await?;
        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf).await?;
    }
}

/// Pull the value of a text field out of a multipart body.
pub fn form_field(body: &[u8], boundary: &str, name: &str) -> Option<Vec<u8>> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let disposition = format!("name=\"{}\"", name).into_bytes();

    for part in split(body, &delimiter) {
        let header_end = find(part, b"\r\n\r\n")?;
        let (head, rest) = part.split_at(header_end);
        if find(head, &disposition).is_none() {
            continue;
        }
        let content = &rest[4..];
        // Each part ends with the CRLF that precedes the next delimiter
        return Some(content.strip_suffix(b"\r\n").unwrap_or(content).to_vec());
    }
    None
}

/// Boundary parameter of a multipart Content-Type header.
pub fn boundary_of(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|p| p.strip_prefix("boundary="))
        .map(|b| b.trim_matches('"').to_string())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn split<'a>(mut body: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    while let Some(pos) = find(body, delimiter) {
        if pos > 0 {
            parts.push(&body[..pos]);
        }
        body = &body[pos + delimiter.len()..];
    }
    parts
}
