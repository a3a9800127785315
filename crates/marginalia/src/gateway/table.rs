use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{GatewayResponse, Request};
use crate::error::{MarginaliaError, Result};

/// Server-side shape of the comment table, as returned by `getAllComments/`.
///
/// Threads are kept as raw JSON with `body` and `indicator` encoded as strings;
/// the gateway does not interpret them beyond that.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct CommentTable {
    #[serde(default)]
    pub comments: BTreeMap<String, Vec<Value>>,
}

/// `{"comments": [thread, ...]}` as sent by `saveComments/`.
#[derive(Deserialize)]
struct SavePayload {
    comments: Vec<Value>,
}

impl CommentTable {
    pub fn to_response(&self) -> Result<GatewayResponse> {
        let body = serde_json::to_string(self).map_err(MarginaliaError::Serialization)?;
        Ok(GatewayResponse::new(body))
    }

    /// Applies a request. Returns the response and whether the table changed.
    pub fn serve(&mut self, request: &Request) -> Result<(GatewayResponse, bool)> {
        match request {
            Request::GetAllComments => Ok((self.to_response()?, false)),
            Request::SaveComments { target, comments } => {
                self.replace_target(target, comments)?;
                Ok((GatewayResponse::default(), true))
            }
        }
    }

    fn replace_target(&mut self, target: &str, payload: &str) -> Result<()> {
        let payload: SavePayload =
            serde_json::from_str(payload).map_err(MarginaliaError::Serialization)?;
        let threads = payload
            .comments
            .into_iter()
            .map(encode_nested)
            .collect::<Result<Vec<_>>>()?;
        self.comments.insert(target.to_string(), threads);
        Ok(())
    }
}

// The table stores `body` and `indicator` as JSON strings.
fn encode_nested(mut thread: Value) -> Result<Value> {
    if let Value::Object(fields) = &mut thread {
        for key in ["body", "indicator"] {
            match fields.get(key) {
                Some(Value::Null) => {
                    fields.remove(key);
                }
                Some(Value::String(_)) | None => {}
                Some(other) => {
                    let encoded =
                        serde_json::to_string(other).map_err(MarginaliaError::Serialization)?;
                    fields.insert(key.to_string(), Value::String(encoded));
                }
            }
        }
    }
    Ok(thread)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn save_encodes_body_and_indicator_as_strings() {
        let mut table = CommentTable::default();
        let payload = json!({"comments": [{
            "id": "anno/0",
            "total": 1,
            "resolved": false,
            "indicator": {"kind": "notebook-cell", "index": "1", "type": "input"},
            "body": [{"value": "hi"}]
        }]})
        .to_string();

        let (_, changed) = table
            .serve(&Request::SaveComments {
                target: "a.py".into(),
                comments: payload,
            })
            .unwrap();
        assert!(changed);

        let stored = &table.comments["a.py"][0];
        assert!(stored["body"].is_string());
        assert!(stored["indicator"].is_string());
        let body: Value = serde_json::from_str(stored["body"].as_str().unwrap()).unwrap();
        assert_eq!(body[0]["value"], "hi");
    }

    #[test]
    fn null_indicator_is_dropped() {
        let thread = encode_nested(json!({"indicator": null, "body": []})).unwrap();
        assert!(thread.get("indicator").is_none());
        assert_eq!(thread["body"], "[]");
    }

    #[test]
    fn save_replaces_only_its_target() {
        let mut table = CommentTable::default();
        table.comments.insert("keep.py".into(), vec![json!({"id": "anno/9"})]);
        table
            .serve(&Request::SaveComments {
                target: "a.py".into(),
                comments: r#"{"comments": []}"#.into(),
            })
            .unwrap();
        assert_eq!(table.comments["keep.py"].len(), 1);
        assert!(table.comments["a.py"].is_empty());
    }
}
