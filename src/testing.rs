//! Helpers shared by the unit tests.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;

/// Answers a single HTTP request on a local port with `status` and `body`. Returns the base URL.
pub(crate) fn serve_once(status: &'static str, body: impl Into<String>) -> String {
    let body = body.into();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();
        while reader.read_line(&mut line).is_ok_and(|n| n > 0) && line != "\r\n" {
            line.clear();
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n{}\r\n\r\n{}",
            status,
            body.len(),
            "Connection: close",
            body
        );
        let _ = stream.write_all(response.as_bytes());
    });

    format!("http://{}", addr)
}
