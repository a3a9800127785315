use std::cell::RefCell;

use super::table::CommentTable;
use super::{Gateway, GatewayResponse, Request};
use crate::error::{MarginaliaError, Result};

/// In-memory gateway for testing.
///
/// Holds the server-side table, records every request path it receives and can
/// simulate transport failures. Uses `RefCell` since the gateway is only ever
/// driven from one event loop.
pub struct MemGateway {
    table: RefCell<CommentTable>,
    requests: RefCell<Vec<String>>,
    simulate_load_error: RefCell<bool>,
    simulate_save_error: RefCell<bool>,
}

impl Default for MemGateway {
    fn default() -> Self {
        Self {
            table: RefCell::new(CommentTable::default()),
            requests: RefCell::new(Vec::new()),
            simulate_load_error: RefCell::new(false),
            simulate_save_error: RefCell::new(false),
        }
    }
}

impl MemGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table from a raw `getAllComments/` response body.
    pub fn with_response(raw: &str) -> Result<Self> {
        let table: CommentTable = serde_json::from_str(raw)?;
        let gateway = Self::default();
        *gateway.table.borrow_mut() = table;
        Ok(gateway)
    }

    pub fn set_simulate_load_error(&self, simulate: bool) {
        *self.simulate_load_error.borrow_mut() = simulate;
    }

    pub fn set_simulate_save_error(&self, simulate: bool) {
        *self.simulate_save_error.borrow_mut() = simulate;
    }

    /// Request paths received so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    /// Raw server-side threads stored for a target.
    pub fn stored_threads(&self, target: &str) -> Vec<serde_json::Value> {
        self.table
            .borrow()
            .comments
            .get(target)
            .cloned()
            .unwrap_or_default()
    }
}

impl Gateway for MemGateway {
    fn query(&self, request: &str) -> Result<GatewayResponse> {
        self.requests.borrow_mut().push(request.to_string());

        let parsed = Request::parse(request)?;
        let failing = match parsed {
            Request::GetAllComments => *self.simulate_load_error.borrow(),
            Request::SaveComments { .. } => *self.simulate_save_error.borrow(),
        };
        if failing {
            return Err(MarginaliaError::Transport("Simulated gateway error".to_string()));
        }

        let (response, _) = self.table.borrow_mut().serve(&parsed)?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_requests_and_serves_saved_threads() {
        let gateway = MemGateway::new();
        let save = Request::SaveComments {
            target: "a.py".into(),
            comments: r#"{"comments":[{"id":"anno/0","body":[]}]}"#.into(),
        };
        gateway.query(&save.to_path()).unwrap();

        let response = gateway.query("getAllComments/").unwrap();
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["comments"]["a.py"][0]["id"], "anno/0");
        assert_eq!(gateway.requests().len(), 2);
        assert_eq!(gateway.stored_threads("a.py").len(), 1);
    }

    #[test]
    fn seeded_response_is_served_back() {
        let gateway =
            MemGateway::with_response(r#"{"comments": {"a.py": [{"id": "anno/4", "body": "[]"}]}}"#)
                .unwrap();
        let value: serde_json::Value = gateway.query("getAllComments/").unwrap().json().unwrap();
        assert_eq!(value["comments"]["a.py"][0]["body"], "[]");

        assert!(MemGateway::with_response("nope").is_err());
    }

    #[test]
    fn simulated_errors_are_transport_failures() {
        let gateway = MemGateway::new();
        gateway.set_simulate_load_error(true);
        assert!(matches!(
            gateway.query("getAllComments/"),
            Err(MarginaliaError::Transport(_))
        ));

        gateway.set_simulate_load_error(false);
        assert!(gateway.query("getAllComments/").is_ok());
    }
}
