//! Remote SPARQL-protocol endpoint executor.
//!
//! Speaks the SPARQL 1.1 protocol over HTTP: the query is POSTed as
//! `application/sparql-query` and results come back as
//! `application/sparql-results+json`. Works against GraphDB, WikiData, and
//! any other conformant endpoint. Error bodies from the endpoint (e.g.
//! GraphDB's `MALFORMED QUERY: ...`) are preserved verbatim, since they are
//! the diagnostics the repair loop feeds back to the model.

use base64::Engine as _;
use serde_json::Value;
use tracing::debug;

use crate::error::ExecError;

use super::{GraphValue, QueryExecutor, ResultSet};

/// Connection settings for a remote endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Full query URL, e.g. `http://localhost:7200/repositories/imkg`.
    pub url: String,
    /// Optional basic-auth username.
    pub username: Option<String>,
    /// Optional basic-auth password.
    pub password: Option<String>,
    /// Per-query timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:7200/repositories/imkg".into(),
            username: None,
            password: None,
            timeout_secs: 30,
        }
    }
}

/// A remote SPARQL 1.1 protocol endpoint.
pub struct SparqlEndpoint {
    config: EndpointConfig,
}

impl SparqlEndpoint {
    pub fn new(config: EndpointConfig) -> Self {
        Self { config }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn auth_header(&self) -> Option<String> {
        let username = self.config.username.as_deref()?;
        let password = self.config.password.as_deref().unwrap_or("");
        Some(basic_auth(username, password))
    }

    /// Run a trivial query to verify the endpoint is reachable.
    pub fn probe(&self) -> Result<(), ExecError> {
        self.execute("SELECT * WHERE { ?s ?p ?o } LIMIT 1").map(|_| ())
    }
}

fn basic_auth(username: &str, password: &str) -> String {
    let token =
        base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    format!("Basic {token}")
}

impl QueryExecutor for SparqlEndpoint {
    fn execute(&self, sparql: &str) -> Result<ResultSet, ExecError> {
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .build();

        let mut request = agent
            .post(&self.config.url)
            .set("Content-Type", "application/sparql-query")
            .set("Accept", "application/sparql-results+json");
        if let Some(auth) = self.auth_header() {
            request = request.set("Authorization", &auth);
        }

        debug!(url = %self.config.url, "executing query against endpoint");
        let resp = match request.send_string(sparql) {
            Ok(resp) => resp,
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                let body = body.trim();
                // Auth and routing failures are misconfiguration, not bad queries.
                if matches!(code, 401 | 403 | 404) {
                    return Err(ExecError::Connection {
                        message: format!("endpoint returned status {code}: {body}"),
                    });
                }
                return Err(ExecError::Query {
                    message: if body.is_empty() {
                        format!("endpoint returned status {code}")
                    } else {
                        body.to_string()
                    },
                });
            }
            Err(ureq::Error::Transport(t)) => {
                let message = t.to_string();
                if message.to_ascii_lowercase().contains("timed out") {
                    return Err(ExecError::Timeout {
                        seconds: self.config.timeout_secs,
                    });
                }
                return Err(ExecError::Connection { message });
            }
        };

        let body = resp.into_string().map_err(|e| ExecError::Decode {
            message: e.to_string(),
        })?;
        let json: Value = serde_json::from_str(&body).map_err(|e| ExecError::Decode {
            message: e.to_string(),
        })?;
        parse_results(&json)
    }
}

/// Decode a SPARQL JSON results document into the normalized row shape.
fn parse_results(json: &Value) -> Result<ResultSet, ExecError> {
    if let Some(b) = json.get("boolean").and_then(Value::as_bool) {
        return Ok(ResultSet::from_bool(b));
    }

    let vars: Vec<&str> = json["head"]["vars"]
        .as_array()
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let bindings = json["results"]["bindings"]
        .as_array()
        .ok_or_else(|| ExecError::Decode {
            message: "missing results.bindings".into(),
        })?;

    let mut rows = Vec::new();
    for binding in bindings {
        let mut row = Vec::new();
        for var in &vars {
            // Unbound variables are simply absent from the binding object.
            if let Some(cell) = binding.get(*var) {
                row.push(value_from_binding(cell)?);
            }
        }
        rows.push(row);
    }
    Ok(ResultSet::new(rows))
}

fn value_from_binding(cell: &Value) -> Result<GraphValue, ExecError> {
    let ty = cell["type"].as_str().ok_or_else(|| ExecError::Decode {
        message: "binding missing type".into(),
    })?;
    let value = cell["value"].as_str().unwrap_or("").to_string();
    match ty {
        "uri" => Ok(GraphValue::Resource(value)),
        "literal" | "typed-literal" => Ok(GraphValue::Literal(value)),
        "bnode" => Ok(GraphValue::Blank(value)),
        other => Err(ExecError::Decode {
            message: format!("unknown binding type: {other}"),
        }),
    }
}

impl std::fmt::Debug for SparqlEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparqlEndpoint")
            .field("url", &self.config.url)
            .finish()
    }
}
