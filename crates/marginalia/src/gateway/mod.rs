//! # Persistence Gateway
//!
//! The store never touches durable storage itself. It talks to a [`Gateway`], a
//! single request/response method modeled on an HTTP endpoint. Two logical
//! operations are layered over it by convention:
//!
//! | Request path | Meaning | Response |
//! |--------------|---------|----------|
//! | `getAllComments/` | load every target | `{"comments": {"<target>": [thread, ...]}}` |
//! | `saveComments/?comments=<json>&target=<target>` | replace one target's threads | ignored |
//!
//! In the load response each thread's `body` and `indicator` are JSON documents
//! encoded as strings, so they need a second parse. On save the threads are sent
//! as plain JSON objects inside `{"comments": [...]}`. Query parameters are
//! percent-encoded.
//!
//! ## Implementations
//!
//! - [`fs::FsGateway`]: serves the table from a `comments.json` file.
//! - [`mem::MemGateway`]: in-memory table for tests, with failure simulation.

use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;

use crate::error::{MarginaliaError, Result};

pub mod fs;
pub mod mem;
mod table;

const GET_ALL_COMMENTS: &str = "getAllComments/";
const SAVE_COMMENTS: &str = "saveComments/";

/// Abstract request endpoint for the comment table.
///
/// Takes `&self`; implementations needing mutation use interior mutability,
/// which is fine since all access happens on one event loop.
pub trait Gateway {
    fn query(&self, request: &str) -> Result<GatewayResponse>;
}

impl<G: Gateway + ?Sized> Gateway for &G {
    fn query(&self, request: &str) -> Result<GatewayResponse> {
        (**self).query(request)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayResponse {
    pub body: String,
}

impl GatewayResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(MarginaliaError::Serialization)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetAllComments,
    SaveComments {
        target: String,
        /// `{"comments": [thread, ...]}` as a JSON string.
        comments: String,
    },
}

impl Request {
    pub fn to_path(&self) -> String {
        match self {
            Request::GetAllComments => GET_ALL_COMMENTS.to_string(),
            Request::SaveComments { target, comments } => format!(
                "{}?comments={}&target={}",
                SAVE_COMMENTS,
                utf8_percent_encode(comments, NON_ALPHANUMERIC),
                utf8_percent_encode(target, NON_ALPHANUMERIC)
            ),
        }
    }

    pub fn parse(path: &str) -> Result<Request> {
        if path == GET_ALL_COMMENTS || path == GET_ALL_COMMENTS.trim_end_matches('/') {
            return Ok(Request::GetAllComments);
        }

        let query = path
            .strip_prefix(SAVE_COMMENTS)
            .and_then(|rest| rest.strip_prefix('?'))
            .ok_or_else(|| MarginaliaError::InvalidRequest(format!("Unknown request: {}", path)))?;

        let mut comments = None;
        let mut target = None;
        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let decoded = percent_decode_str(value)
                .decode_utf8()
                .map_err(|e| MarginaliaError::InvalidRequest(e.to_string()))?
                .into_owned();
            match key {
                "comments" => comments = Some(decoded),
                "target" => target = Some(decoded),
                _ => {}
            }
        }

        match (target, comments) {
            (Some(target), Some(comments)) => Ok(Request::SaveComments { target, comments }),
            _ => Err(MarginaliaError::InvalidRequest(
                "saveComments needs both comments and target".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_all_comments_path() {
        assert_eq!(Request::GetAllComments.to_path(), "getAllComments/");
        assert_eq!(
            Request::parse("getAllComments/").unwrap(),
            Request::GetAllComments
        );
    }

    #[test]
    fn save_request_survives_reserved_characters() {
        let request = Request::SaveComments {
            target: "notes/a b&c.py".to_string(),
            comments: r#"{"comments":[{"value":"x=1 & y=2?"}]}"#.to_string(),
        };
        let path = request.to_path();
        assert!(path.starts_with("saveComments/?comments="));
        assert!(!path.contains(' '));

        assert_eq!(Request::parse(&path).unwrap(), request);
    }

    #[test]
    fn save_request_without_target_is_invalid() {
        let result = Request::parse("saveComments/?comments=%7B%7D");
        assert!(matches!(result, Err(MarginaliaError::InvalidRequest(_))));
    }

    #[test]
    fn unknown_request_is_invalid() {
        assert!(Request::parse("dropAll/").is_err());
    }

    #[test]
    fn response_json_decodes_body() {
        let response = GatewayResponse::new(r#"{"comments": {}}"#);
        let value: serde_json::Value = response.json().unwrap();
        assert!(value["comments"].is_object());

        let bad = GatewayResponse::new("not json");
        assert!(bad.json::<serde_json::Value>().is_err());
    }
}
