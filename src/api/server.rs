use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use crate::api::dto::{ApiResponse, StatusResponseDto};
use crate::domain::ids::SliceName;
use crate::domain::lifecycle::SliceLifecycleManager;
use crate::error::{Error, Result};

/// Minimal blocking HTTP/1.1 front end over the three routes of spec.md
/// §4.8, close enough to `original_source`'s
/// `http.server.BaseHTTPRequestHandler` server that its Python CLI could
/// talk to this one unmodified. One thread per connection; all routing
/// delegates straight into `SliceLifecycleManager`, which does its own
/// locking (spec.md §5) — this layer holds no state of its own.
pub fn serve(addr: &str, manager: Arc<SliceLifecycleManager>) -> Result<()> {
    let listener = TcpListener::bind(addr)?;
    log::info!("control API listening on {}", addr);

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let manager = manager.clone();
                std::thread::spawn(move || {
                    if let Err(e) = handle_connection(stream, &manager) {
                        log::warn!("error handling connection: {}", e);
                    }
                });
            }
            Err(e) => log::warn!("failed to accept connection: {}", e),
        }
    }
    Ok(())
}

struct Request {
    method: String,
    path: String,
}

fn handle_connection(mut stream: TcpStream, manager: &SliceLifecycleManager) -> Result<()> {
    let request = read_request(&stream)?;

    let (code, body) = route(&request, manager);
    write_response(&mut stream, code, &body)?;
    Ok(())
}

fn read_request(stream: &TcpStream) -> Result<Request> {
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut content_length: usize = 0;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line == "\r\n" || line == "\n" {
            break;
        }
        if let Some(value) = line.strip_prefix("Content-Length:").or_else(|| line.strip_prefix("content-length:")) {
            content_length = value.trim().parse().unwrap_or(0);
        }
    }
    if content_length > 0 {
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body)?;
    }

    Ok(Request { method, path })
}

fn write_response(stream: &mut TcpStream, code: u16, body: &str) -> Result<()> {
    let reason = match code {
        200 => "OK",
        400 => "Bad Request",
        409 => "Conflict",
        _ => "Internal Server Error",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        code,
        reason,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes())?;
    Ok(())
}

fn route(request: &Request, manager: &SliceLifecycleManager) -> (u16, String) {
    let segments: Vec<&str> = request.path.trim_start_matches('/').split('/').collect();

    match (request.method.as_str(), segments.as_slice()) {
        ("POST", ["slice", name, "activate"]) => respond(manager.activate(&SliceName::from(*name)), "activated"),
        ("POST", ["slice", name, "deactivate"]) => respond(manager.deactivate(&SliceName::from(*name)), "deactivated"),
        ("GET", ["slices", "status"]) => {
            let dto: StatusResponseDto = manager.status().into();
            (200, serde_json::to_string(&dto).unwrap_or_else(|_| "{}".to_string()))
        }
        _ => (400, serde_json::to_string(&ApiResponse::error(format!("malformed path '{}'", request.path))).unwrap()),
    }
}

fn respond(result: Result<()>, verb: &str) -> (u16, String) {
    match result {
        Ok(()) => {
            let body = serde_json::to_string(&ApiResponse::ok(format!("slice {}", verb))).unwrap();
            (200, body)
        }
        Err(e) => {
            log::warn!("{} failed: {}", verb, e);
            let code = match &e {
                Error::SliceNotFound(_) | Error::HostNotFound(_) | Error::NoPath { .. } | Error::AdmissionRefused { .. } | Error::AlreadyActive(_) | Error::NotActive(_) => 409,
                _ => 500,
            };
            let body = serde_json::to_string(&ApiResponse::error(e.to_string())).unwrap();
            (code, body)
        }
    }
}
