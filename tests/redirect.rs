//! Redirects over a real socket: followed, bounded, and never logged with secrets.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;

use ip_fetcher::{Error, HttpClient, HttpConfig};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

static LOGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(Vec::new()));
static LOGGER_INIT: Once = Once::new();

struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        LOGS.lock().push(format!("{} {}", record.target(), record.args()));
    }

    fn flush(&self) {}
}

fn capture_logs() {
    LOGGER_INIT.call_once(|| {
        log::set_boxed_logger(Box::new(CaptureLogger)).unwrap();
        log::set_max_level(log::LevelFilter::Trace);
    });
}

/// Serve `route(path)` for every connection; returns the base URL and a hit counter.
fn serve(route: fn(&str) -> (u16, Option<&'static str>, &'static str)) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            counter.fetch_add(1, Ordering::SeqCst);
            respond(stream, route);
        }
    });
    (base, hits)
}

fn respond(mut stream: TcpStream, route: fn(&str) -> (u16, Option<&'static str>, &'static str)) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request_line = String::new();
    reader.read_line(&mut request_line).unwrap();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
            break;
        }
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();
    let (status, location, body) = route(&path);
    let reason = if status == 200 { "OK" } else { "Found" };
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        reason,
        body.len()
    );
    if let Some(location) = location {
        head.push_str(&format!("Location: {}\r\n", location));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).unwrap();
    stream.write_all(body.as_bytes()).unwrap();
    stream.flush().unwrap();
}

fn config() -> HttpConfig {
    HttpConfig::default().with_retry_wait(Duration::ZERO, Duration::ZERO)
}

#[test]
fn test_redirect_is_followed_without_logging_key() {
    capture_logs();
    let (base, hits) = serve(|path| {
        if path.starts_with("/dl") {
            (302, Some("/final"), "")
        } else {
            (200, None, "10.0.0.0/8\n")
        }
    });

    let client = HttpClient::new(config()).unwrap();
    let url = format!("{}/dl?license_key=SEKRETKEY", base);
    let response = client.get(&url, &["SEKRETKEY"]).unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"10.0.0.0/8\n");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    let logs = LOGS.lock();
    assert!(!logs.is_empty());
    assert!(logs.iter().all(|line| !line.contains("SEKRETKEY")), "{:?}", *logs);
}

#[test]
fn test_redirect_loop_fails_without_retry() {
    let (base, hits) = serve(|path| {
        if path.starts_with("/a") {
            (302, Some("/b"), "")
        } else {
            (302, Some("/a"), "")
        }
    });

    let client = HttpClient::new(config()).unwrap();
    let err = client.get(&format!("{}/a", base), &[]).unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
    assert!(err.to_string().contains("redirect loop"));
    // /a, /b, then the revisit of /a is refused before it is sent
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn test_redirect_chain_is_bounded() {
    let (base, hits) = serve(|path| {
        let hop: usize = path.trim_start_matches("/hop").parse().unwrap_or(0);
        let next: &'static str = Box::leak(format!("/hop{}", hop + 1).into_boxed_str());
        (302, Some(next), "")
    });

    let client = HttpClient::new(config()).unwrap();
    let err = client.get(&format!("{}/hop0", base), &[]).unwrap_err();

    assert!(err.to_string().contains("stopped after 10 redirects"));
    // the original request plus ten followed hops, no retries
    assert_eq!(hits.load(Ordering::SeqCst), 11);
}
