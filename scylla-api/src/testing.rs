//! In-memory transport serving the discovery fixtures, for unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};

const API_DOC: &str = include_str!("../tests/fixtures/api-doc.json");
const SYSTEM: &str = include_str!("../tests/fixtures/system.json");
const COMPACTION_MANAGER: &str = include_str!("../tests/fixtures/compaction_manager.json");
const ERROR_INJECTION: &str = include_str!("../tests/fixtures/error_injection.json");

pub struct FixtureTransport {
    documents: HashMap<String, Value>,
    failing: HashSet<String>,
    undecodable: HashSet<String>,
    fetched: RefCell<Vec<String>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl FixtureTransport {
    pub fn new() -> Self {
        let mut documents = HashMap::new();
        for (path, text) in [
            ("/api-doc", API_DOC),
            ("/api-doc/system/", SYSTEM),
            ("/api-doc/compaction_manager/", COMPACTION_MANAGER),
            ("/api-doc/error_injection/", ERROR_INJECTION),
        ] {
            documents.insert(path.to_string(), serde_json::from_str(text).unwrap());
        }
        Self {
            documents,
            failing: HashSet::new(),
            undecodable: HashSet::new(),
            fetched: RefCell::new(Vec::new()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    pub fn undecodable(mut self, path: &str) -> Self {
        self.undecodable.insert(path.to_string());
        self
    }

    pub fn with_document(mut self, path: &str, doc: Value) -> Self {
        self.documents.insert(path.to_string(), doc);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }
}

impl Transport for FixtureTransport {
    fn fetch_json(&self, _host: &str, _port: u16, path: &str) -> Result<Value, TransportError> {
        self.fetched.borrow_mut().push(path.to_string());
        if self.failing.contains(path) {
            return Err(TransportError::Request("connection refused".to_string()));
        }
        if self.undecodable.contains(path) {
            return Err(TransportError::Decode("expected value at line 1".to_string()));
        }
        self.documents
            .get(path)
            .cloned()
            .ok_or_else(|| TransportError::Status {
                status: 404,
                body: String::new(),
            })
    }

    fn request(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(request.clone());
        Ok(HttpResponse {
            status: 200,
            body: format!("\"{} {}\"", request.verb, request.path),
        })
    }
}
