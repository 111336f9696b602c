use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    request_handler::{Request, RequestHandler},
    Error,
};

/// Fetches the segments a user qualifies for.
#[async_trait]
pub trait OdpSegmentApiManager: Send + Sync {
    /// Returns the subset of `segments_to_check` the user qualifies for, or `None` if the request
    /// failed.
    async fn fetch_segments(
        &self,
        api_key: &str,
        api_host: &str,
        user_key: &str,
        user_value: &str,
        segments_to_check: &[String],
    ) -> Option<Vec<String>>;
}

/// Queries the ODP GraphQL API at `POST {api_host}/v3/graphql`.
pub struct GraphqlSegmentApiManager {
    request_handler: Arc<dyn RequestHandler>,
}

const QUALIFIED: &str = "qualified";
const INVALID_IDENTIFIER_EXCEPTION: &str = "INVALID_IDENTIFIER_EXCEPTION";

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<GraphqlData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlData {
    customer: Option<Customer>,
}

#[derive(Debug, Deserialize)]
struct Customer {
    audiences: Audiences,
}

#[derive(Debug, Deserialize)]
struct Audiences {
    edges: Vec<Edge>,
}

#[derive(Debug, Deserialize)]
struct Edge {
    node: Node,
}

#[derive(Debug, Deserialize)]
struct Node {
    name: String,
    state: String,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    extensions: Option<ErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct ErrorExtensions {
    code: Option<String>,
    classification: Option<String>,
}

impl GraphqlSegmentApiManager {
    pub fn new(request_handler: Arc<dyn RequestHandler>) -> GraphqlSegmentApiManager {
        GraphqlSegmentApiManager { request_handler }
    }

    fn query(user_key: &str, user_value: &str, segments_to_check: &[String]) -> String {
        // Both are JSON-encoded so quotes in values can't break out of the query.
        let user_value = serde_json::Value::from(user_value);
        let subset = serde_json::Value::from(segments_to_check);
        format!(
            "query {{customer({user_key} : {user_value}) {{audiences(subset: {subset}) {{edges {{node {{name state}}}}}}}}}}"
        )
    }

    fn parse_response(body: &str) -> Option<Vec<String>> {
        let response: GraphqlResponse = match serde_json::from_str(body) {
            Ok(response) => response,
            Err(err) => {
                log::error!(target: "optimizely", err:% = err; "audience segments fetch failed (decode error)");
                return None;
            }
        };

        if let Some(error) = response.errors.first() {
            let extensions = error.extensions.as_ref();
            let code = extensions.and_then(|e| e.code.as_deref());
            if code == Some(INVALID_IDENTIFIER_EXCEPTION) {
                log::warn!(target: "optimizely", message = error.message.as_str(); "audience segments fetch failed (invalid identifier)");
            } else {
                let classification = extensions
                    .and_then(|e| e.classification.as_deref())
                    .unwrap_or("decode error");
                log::error!(target: "optimizely", message = error.message.as_str(); "audience segments fetch failed ({classification})");
            }
            return None;
        }

        let Some(customer) = response.data.and_then(|data| data.customer) else {
            log::error!(target: "optimizely", "audience segments fetch failed (decode error)");
            return None;
        };

        Some(
            customer
                .audiences
                .edges
                .into_iter()
                .filter(|edge| edge.node.state == QUALIFIED)
                .map(|edge| edge.node.name)
                .collect(),
        )
    }
}

#[async_trait]
impl OdpSegmentApiManager for GraphqlSegmentApiManager {
    async fn fetch_segments(
        &self,
        api_key: &str,
        api_host: &str,
        user_key: &str,
        user_value: &str,
        segments_to_check: &[String],
    ) -> Option<Vec<String>> {
        if segments_to_check.is_empty() {
            return Some(Vec::new());
        }

        let body = serde_json::json!({
            "query": Self::query(user_key, user_value, segments_to_check),
        });
        let request = Request::post(format!("{api_host}/v3/graphql"), body.to_string())
            .with_header("content-type", "application/json")
            .with_header("x-api-key", api_key);

        let response = match self.request_handler.make_request(request).await {
            Ok(response) => response,
            Err(err) => {
                log::error!(target: "optimizely", err:? = err; "audience segments fetch failed (network error)");
                return None;
            }
        };
        if !response.is_success() {
            // GraphQL errors may still be described in the body.
            let err = Error::from_status(response.status_code);
            log::debug!(target: "optimizely", err:% = err; "segments request returned an error status");
        }

        Self::parse_response(&response.body)
    }
}
