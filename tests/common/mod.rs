//! Shared fixtures for the integration tests: demo programs built
//! against the runtime model and a loopback stub oracle that captures
//! request bodies.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pythia::config::Config;
use pythia::oracle::OracleClient;
use pythia::runtime::{ClassInfo, MethodInfo};
use pythia::session::AnalysisSession;

pub const ZOO_SOURCE: &str = "\
package zoo;

public class Zoo {
    public void feed(IAnimal a) {
        a.makeSound();
    }
}
";

pub const LIST_SOURCE: &str = "\
package demo;

public class LinkedList {
    Node head;

    public void insert(int value) {
        Node fresh = new Node(value);
        fresh.next = head;
        head = fresh;
    }
}
";

pub const NODE_SOURCE: &str = "\
package demo;

public class Node {
    Node next;
    int value;
}
";

/// Session over the IAnimal / Dog / Cat program.
pub fn animal_session() -> AnalysisSession {
    let mut session = AnalysisSession::new(Config::default());
    session.registry.define(
        ClassInfo::interface("IAnimal")
            .with_method(MethodInfo::declared_abstract("makeSound", "()V")),
    );
    session.registry.define(
        ClassInfo::class("Dog")
            .implementing("IAnimal")
            .with_method(MethodInfo::concrete("makeSound", "()V")),
    );
    session.registry.define(
        ClassInfo::class("Cat")
            .implementing("IAnimal")
            .with_method(MethodInfo::concrete("makeSound", "()V")),
    );
    session.registry.define(
        ClassInfo::class("zoo.Zoo")
            .with_method(MethodInfo::concrete("feed", "(LIAnimal;)V").with_lines(4, 6))
            .with_source("Zoo.java", ZOO_SOURCE),
    );
    session
}

/// Session over the linked-list program.
pub fn list_session() -> AnalysisSession {
    let mut session = AnalysisSession::new(Config::default());
    session.registry.define(
        ClassInfo::class("Node")
            .with_field("next", "Node")
            .with_field("value", "int")
            .with_source("Node.java", NODE_SOURCE),
    );
    session.registry.define(
        ClassInfo::class("demo.LinkedList")
            .with_field("head", "Node")
            .with_method(MethodInfo::concrete("insert", "(I)V").with_lines(6, 10))
            .with_source("LinkedList.java", LIST_SOURCE),
    );
    session
}

/// A client pointed at a port nothing listens on.
pub fn unreachable_client() -> OracleClient {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    OracleClient::new(
        format!("http://127.0.0.1:{}/solve", port),
        Duration::from_millis(300),
    )
}

/// Loopback stub oracle: serves the canned replies in order and captures
/// every request body it saw.
pub struct StubOracle {
    pub url: String,
    requests: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl StubOracle {
    pub fn start(replies: Vec<&'static str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&requests);

        thread::spawn(move || {
            for reply in replies {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                if let Some(body) = read_request_body(&mut stream) {
                    if let Ok(json) = serde_json::from_str(&body) {
                        captured.lock().unwrap().push(json);
                    }
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    reply.len(),
                    reply
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        StubOracle {
            url: format!("http://{}/solve", addr),
            requests,
        }
    }

    pub fn client(&self) -> OracleClient {
        OracleClient::new(self.url.clone(), Duration::from_secs(5))
    }

    /// Request bodies captured so far.
    pub fn requests(&self) -> Vec<serde_json::Value> {
        self.requests.lock().unwrap().clone()
    }
}

fn read_request_body(stream: &mut TcpStream) -> Option<String> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some(value) = trimmed
            .to_ascii_lowercase()
            .strip_prefix("content-length:")
            .map(str::trim)
            .and_then(|v| v.parse::<usize>().ok())
        {
            content_length = value;
        }
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).ok()?;
    String::from_utf8(body).ok()
}
