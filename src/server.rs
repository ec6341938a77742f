//! Embedded HTTP facade over the tree engine.
//!
//! Thin plumbing: a `std::net` listener, a minimal request parser, and a
//! handful of routes mapping onto engine calls. One tree instance is
//! shared behind a mutex; every handler, reads included, holds the lock
//! for the whole engine call so no request observes a half-rotated tree.
//!
//! Routes:
//! - `POST /insert?value=N` - insert, respond with the snapshot
//! - `POST /delete?value=N` - delete, respond with outcome + snapshot
//! - `GET  /search?value=N` - existence check
//! - `POST /clear` - delete every key, preorder
//! - `GET  /tree.json` - current snapshot
//! - `POST /benchmark?count=N` - bulk-insert random keys, report timings
//! - `GET  /stats` - key count and height
//! - `GET  /` - embedded viewer assets
//!
//! `value`/`count` come from the query string, or from a bare integer
//! request body as a fallback.

use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::net::SocketAddr;
use std::net::TcpListener;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use log::info;
use log::warn;
use rand::Rng;
use rustc_hash::FxHashMap;
use serde_json::json;

use crate::error::ServeError;
use crate::snapshot;
use crate::tree::RbTree;

const INDEX_HTML: &str = include_str!("../assets/index.html");
const VISUALIZER_JS: &str = include_str!("../assets/visualizer.js");

/// Largest request body the parser will buffer.
const MAX_BODY: usize = 64 * 1024;

/// Per-connection socket timeout.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest key count `/benchmark` will generate in one request.
const MAX_BENCHMARK: i64 = 100_000;

/// The listener plus the single shared tree instance.
pub struct Server {
    listener: TcpListener,
    tree: Arc<Mutex<RbTree>>,
}

impl Server {
    /// Bind on localhost. Port 0 picks an ephemeral port.
    pub fn bind(port: u16) -> Result<Server, ServeError> {
        let listener = TcpListener::bind(("127.0.0.1", port))?;
        return Ok(Server {
            listener,
            tree: Arc::new(Mutex::new(RbTree::new())),
        });
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServeError> {
        return Ok(self.listener.local_addr()?);
    }

    /// Handle to the shared tree, for callers embedding the server.
    pub fn tree(&self) -> Arc<Mutex<RbTree>> {
        return Arc::clone(&self.tree);
    }

    /// Accept loop, one thread per connection. Blocks forever.
    pub fn run(self) -> Result<(), ServeError> {
        info!("listening on http://{}", self.local_addr()?);
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let tree = Arc::clone(&self.tree);
                    thread::spawn(move || {
                        if let Err(err) = handle_connection(stream, &tree) {
                            warn!("connection failed: {}", err);
                        }
                    });
                }
                Err(err) => warn!("accept failed: {}", err),
            }
        }
        return Ok(());
    }
}

/// One parsed request. Only the pieces the routes need.
struct Request {
    method: String,
    path: String,
    query: String,
    body: String,
}

impl Request {
    /// Integer parameter: first `name=N` match in the query string, or a
    /// bare integer body as a fallback.
    fn int_param(&self, name: &str) -> Option<i64> {
        for part in self.query.split('&') {
            let mut kv = part.splitn(2, '=');
            if kv.next() == Some(name) {
                if let Some(value) = kv.next().and_then(|raw| raw.trim().parse().ok()) {
                    return Some(value);
                }
            }
        }
        let body = self.body.trim();
        if body.is_empty() {
            return None;
        }
        return body.parse().ok();
    }
}

struct Response {
    status: u16,
    content_type: &'static str,
    body: String,
}

impl Response {
    fn json(body: String) -> Response {
        return Response {
            status: 200,
            content_type: "application/json",
            body,
        };
    }

    fn text(status: u16, body: &str) -> Response {
        return Response {
            status,
            content_type: "text/plain",
            body: body.to_string(),
        };
    }
}

fn handle_connection(mut stream: TcpStream, tree: &Mutex<RbTree>) -> Result<(), ServeError> {
    stream.set_read_timeout(Some(SOCKET_TIMEOUT))?;
    stream.set_write_timeout(Some(SOCKET_TIMEOUT))?;

    let request = read_request(&mut stream)?;
    info!("{} {}", request.method, request.path);

    let response = route(&request, tree);
    write_response(&mut stream, &response)?;
    return Ok(());
}

fn read_request(stream: &mut TcpStream) -> Result<Request, ServeError> {
    let mut reader = BufReader::new(stream);

    let mut line = String::new();
    reader.read_line(&mut line)?;
    let mut parts = line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| ServeError::Parse("empty request line".to_string()))?
        .to_string();
    let target = parts
        .next()
        .ok_or_else(|| ServeError::Parse("request line without a target".to_string()))?;

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (target.to_string(), String::new()),
    };

    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            break;
        }
        let header = header.trim();
        if header.is_empty() {
            break;
        }
        if let Some(rest) = header.to_ascii_lowercase().strip_prefix("content-length:") {
            content_length = rest.trim().parse().unwrap_or(0);
        }
    }

    if content_length > MAX_BODY {
        return Err(ServeError::Parse("request body too large".to_string()));
    }
    let mut raw = vec![0u8; content_length];
    reader.read_exact(&mut raw)?;
    let body = String::from_utf8_lossy(&raw).into_owned();

    return Ok(Request {
        method,
        path,
        query,
        body,
    });
}

fn write_response(stream: &mut TcpStream, response: &Response) -> Result<(), ServeError> {
    let reason = match response.status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Error",
    };
    write!(
        stream,
        "HTTP/1.1 {} {}\r\nContent-Type: {}; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        reason,
        response.content_type,
        response.body.len(),
    )?;
    stream.write_all(response.body.as_bytes())?;
    stream.flush()?;
    return Ok(());
}

/// Mutators restore invariants before releasing the guard, so a tree
/// recovered from a poisoned lock is still structurally consistent.
fn lock(tree: &Mutex<RbTree>) -> MutexGuard<'_, RbTree> {
    return tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
}

fn route(request: &Request, tree: &Mutex<RbTree>) -> Response {
    let method = request.method.as_str();
    match request.path.as_str() {
        "/insert" if method == "POST" => return handle_insert(request, tree),
        "/delete" if method == "POST" => return handle_delete(request, tree),
        "/search" if method == "GET" => return handle_search(request, tree),
        "/clear" if method == "POST" => return handle_clear(tree),
        "/benchmark" if method == "POST" => return handle_benchmark(request, tree),
        "/tree.json" if method == "GET" => {
            return Response::json(snapshot::to_json(&lock(tree)));
        }
        "/stats" if method == "GET" => {
            let tree = lock(tree);
            return Response::json(
                json!({ "len": tree.len(), "height": tree.height() }).to_string(),
            );
        }
        "/insert" | "/delete" | "/search" | "/clear" | "/benchmark" | "/tree.json"
        | "/stats" => {
            return Response::text(405, "Method Not Allowed");
        }
        path if method == "GET" => return serve_asset(path),
        _ => return Response::text(405, "Method Not Allowed"),
    }
}

fn handle_insert(request: &Request, tree: &Mutex<RbTree>) -> Response {
    let Some(value) = request.int_param("value") else {
        return Response::text(400, "Missing or invalid 'value' parameter");
    };
    let mut tree = lock(tree);
    tree.insert(value);
    return Response::json(snapshot::to_json(&tree));
}

fn handle_delete(request: &Request, tree: &Mutex<RbTree>) -> Response {
    let Some(value) = request.int_param("value") else {
        return Response::text(400, "Missing or invalid 'value' parameter");
    };
    let mut tree = lock(tree);
    let deleted = tree.delete(value);
    let body = json!({ "deleted": deleted, "tree": tree.snapshot() });
    return Response::json(body.to_string());
}

fn handle_search(request: &Request, tree: &Mutex<RbTree>) -> Response {
    let Some(value) = request.int_param("value") else {
        return Response::text(400, "Missing or invalid 'value' parameter");
    };
    let found = lock(tree).contains(value);
    return Response::json(json!({ "found": found }).to_string());
}

/// Bulk clear: dump the keys preorder and delete each one through the
/// engine, so the deletion path does the emptying.
fn handle_clear(tree: &Mutex<RbTree>) -> Response {
    let mut tree = lock(tree);
    for key in tree.keys() {
        tree.delete(key);
    }
    return Response::json(snapshot::to_json(&tree));
}

fn handle_benchmark(request: &Request, tree: &Mutex<RbTree>) -> Response {
    let count = request.int_param("count").unwrap_or(1000);
    if count < 1 || count > MAX_BENCHMARK {
        return Response::text(400, "Missing or invalid 'count' parameter");
    }

    let mut rng = rand::thread_rng();
    let mut tree = lock(tree);
    let start = Instant::now();
    for _ in 0..count {
        tree.insert(rng.gen_range(0..count * 10));
    }
    let elapsed = start.elapsed();

    info!("benchmark inserted {} keys in {:?}", count, elapsed);
    return Response::json(
        json!({
            "inserted": count,
            "elapsed_us": elapsed.as_micros() as u64,
            "len": tree.len(),
            "height": tree.height(),
        })
        .to_string(),
    );
}

fn serve_asset(path: &str) -> Response {
    match assets().get(path) {
        Some(&(content_type, body)) => {
            return Response {
                status: 200,
                content_type,
                body: body.to_string(),
            };
        }
        None => return Response::text(404, "Not Found"),
    }
}

/// Viewer assets are compiled in; there is nothing to read off disk.
fn assets() -> &'static FxHashMap<&'static str, (&'static str, &'static str)> {
    static ASSETS: OnceLock<FxHashMap<&'static str, (&'static str, &'static str)>> =
        OnceLock::new();
    return ASSETS.get_or_init(|| {
        let mut map = FxHashMap::default();
        map.insert("/", ("text/html", INDEX_HTML));
        map.insert("/index.html", ("text/html", INDEX_HTML));
        map.insert("/visualizer.js", ("application/javascript", VISUALIZER_JS));
        return map;
    });
}
