//! Named request payloads sent to inference endpoints.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// A named, opaque JSON request body.
///
/// The body is sent to the endpoint as-is. It is normally an object of
/// generation inputs and parameters, but any JSON value is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Identifying name, used as a key in metrics and reports.
    pub name: String,
    /// Request body posted to the endpoint.
    pub body: serde_json::Value,
}

impl Payload {
    /// Create a payload from a name and a JSON body.
    pub fn new(name: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// Build a text-generation payload with `input_length` repeated input
    /// tokens and a fixed generation length.
    ///
    /// ```
    /// use endpoint_bench::loadtest::payload::Payload;
    ///
    /// let payload = Payload::text_generation(3, 64, 0.9);
    /// assert_eq!(payload.body["inputs"], "A A A ");
    /// assert_eq!(payload.body["parameters"]["max_new_tokens"], 64);
    /// ```
    pub fn text_generation(input_length: u64, max_new_tokens: u64, temperature: f64) -> Self {
        let inputs = "A ".repeat(input_length as usize);
        Self {
            name: format!("in{input_length}-out{max_new_tokens}"),
            body: json!({
                "inputs": inputs,
                "parameters": {
                    "max_new_tokens": max_new_tokens,
                    "temperature": temperature,
                },
            }),
        }
    }

    /// Size of the serialized body in bytes.
    pub fn body_len(&self) -> usize {
        self.body.to_string().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_generation_shape() {
        let payload = Payload::text_generation(100, 500, 900.0);
        assert_eq!(payload.name, "in100-out500");
        assert_eq!(payload.body["inputs"].as_str().unwrap().len(), 200);
        assert_eq!(payload.body["parameters"]["max_new_tokens"], 500);
        assert_eq!(payload.body["parameters"]["temperature"], 900.0);
    }

    #[test]
    fn test_text_generation_zero_input() {
        let payload = Payload::text_generation(0, 10, 0.5);
        assert_eq!(payload.body["inputs"], "");
    }

    #[test]
    fn test_body_len_matches_serialized() {
        let payload = Payload::new("tiny", json!({"inputs": "hi"}));
        assert_eq!(payload.body_len(), r#"{"inputs":"hi"}"#.len());
    }
}
