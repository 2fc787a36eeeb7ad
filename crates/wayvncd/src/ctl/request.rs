//! Request envelope decoding.
//!
//! A request is a JSON object with a `method` string, optional `params`, and
//! an optional correlation `id` that is echoed in the response.

use serde_json::Value;

use super::errors::RequestError;

/// A decoded request envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Requested method name.
    pub method: String,
    /// Method parameters, if supplied.
    pub params: Option<Value>,
    /// Correlation id echoed in the response.
    pub id: Option<Value>,
}

/// A request that could not be decoded, with whatever id could be recovered.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRequest {
    /// Correlation id, when the envelope carried one.
    pub id: Option<Value>,
    /// Why the envelope was rejected.
    pub error: RequestError,
}

impl Request {
    /// Decodes a request envelope from a framed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`RejectedRequest`] when the value is not an object or has no
    /// string `method`.
    pub fn from_value(value: Value) -> Result<Self, RejectedRequest> {
        let Value::Object(mut object) = value else {
            return Err(RejectedRequest {
                id: None,
                error: RequestError::invalid("request must be a JSON object"),
            });
        };
        let id = object.remove("id");
        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            _ => {
                return Err(RejectedRequest {
                    id,
                    error: RequestError::invalid("request is missing a \"method\" string"),
                });
            }
        };
        let params = object.remove("params").filter(|params| !params.is_null());
        Ok(Self { method, params, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_full_envelope() {
        let request = Request::from_value(json!({
            "method": "set-output",
            "params": {"cycle": "next"},
            "id": 2
        }))
        .expect("decode request");
        assert_eq!(request.method, "set-output");
        assert_eq!(request.params, Some(json!({"cycle": "next"})));
        assert_eq!(request.id, Some(json!(2)));
    }

    #[test]
    fn id_and_params_are_optional() {
        let request = Request::from_value(json!({"method": "version"})).expect("decode request");
        assert_eq!(request.params, None);
        assert_eq!(request.id, None);
    }

    #[test]
    fn null_params_count_as_absent() {
        let request =
            Request::from_value(json!({"method": "help", "params": null})).expect("decode request");
        assert_eq!(request.params, None);
    }

    #[test]
    fn rejects_non_object() {
        let rejected = Request::from_value(json!(["version"])).expect_err("array request");
        assert_eq!(rejected.id, None);
    }

    #[test]
    fn missing_method_keeps_id() {
        let rejected =
            Request::from_value(json!({"id": "abc", "method": 7})).expect_err("bad method");
        assert_eq!(rejected.id, Some(json!("abc")));
        assert!(rejected.error.message().contains("method"));
    }
}
