//! [`Transport`] over the GDMC HTTP interface
//! (https://github.com/Niels-NTG/gdmc_http_interface/blob/master/docs/Endpoints.md).

use std::io::Read;

use gdmc_engine::{Block, BlockBox, BlockPos, Rect};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{AttemptError, ItemStatus, Transport, WriteOptions, with_retries};
use crate::config::{DEFAULT_HOST, RequestPolicy};
use crate::error::InterfaceError;

// ── Wire format ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct BlockJson {
    x: i64,
    y: i64,
    z: i64,
    id: String,
    #[serde(default)]
    state: IndexMap<String, String>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Deserialize)]
struct BiomeJson {
    x: i64,
    y: i64,
    z: i64,
    id: String,
}

#[derive(Serialize)]
struct PlacementJson<'a> {
    x: i64,
    y: i64,
    z: i64,
    id: &'a str,
    #[serde(skip_serializing_if = "no_states")]
    state: &'a IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a str>,
}

fn no_states(states: &&IndexMap<String, String>) -> bool {
    states.is_empty()
}

/// Placement results carry a `status` on success and a `message` on failure.
#[derive(Deserialize)]
struct PlacementResultJson {
    #[serde(default)]
    status: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct CommandResultJson {
    status: serde_json::Value,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildAreaJson {
    x_from: i64,
    y_from: i64,
    z_from: i64,
    x_to: i64,
    y_to: i64,
    z_to: i64,
}

/// The server reports success flags either as booleans or as 0/1.
fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Null => false,
        _ => true,
    }
}

// ── Transport ───────────────────────────────────────────────────

pub struct HttpTransport {
    host: String,
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn request(
        &self,
        method: &str,
        path: &str,
        query: &[(&str, String)],
        policy: &RequestPolicy,
    ) -> ureq::Request {
        let mut request = self.agent.request(method, &format!("{}{}", self.host, path));
        for (key, value) in query {
            request = request.query(key, value);
        }
        if let Some(timeout) = policy.timeout {
            request = request.timeout(timeout);
        }
        request
    }

    /// Send with retries. Transport failures are retried; a 500 is fatal straight away and any
    /// other error status becomes [`InterfaceError::Status`].
    fn execute(
        &self,
        path: &str,
        policy: &RequestPolicy,
        mut send: impl FnMut() -> Result<ureq::Response, ureq::Error>,
    ) -> Result<ureq::Response, InterfaceError> {
        let endpoint = format!("{}{}", self.host, path);
        with_retries(&endpoint, policy, || match send() {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(500, _)) => Err(AttemptError::Fatal(
                InterfaceError::RemoteInternal {
                    endpoint: endpoint.clone(),
                },
            )),
            Err(ureq::Error::Status(status, _)) => Err(AttemptError::Fatal(InterfaceError::Status {
                endpoint: endpoint.clone(),
                status,
            })),
            Err(ureq::Error::Transport(err)) => Err(AttemptError::Transient(err.to_string())),
        })
    }

    fn json<T: DeserializeOwned>(
        &self,
        path: &str,
        response: ureq::Response,
    ) -> Result<T, InterfaceError> {
        response.into_json().map_err(|err| InterfaceError::Malformed {
            endpoint: format!("{}{}", self.host, path),
            reason: err.to_string(),
        })
    }

    fn text(&self, path: &str, response: ureq::Response) -> Result<String, InterfaceError> {
        let mut body = String::new();
        response
            .into_reader()
            .read_to_string(&mut body)
            .map_err(|err| InterfaceError::Malformed {
                endpoint: format!("{}{}", self.host, path),
                reason: err.to_string(),
            })?;
        Ok(body)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_HOST)
    }
}

fn box_query(area: BlockBox, dimension: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("x", area.offset.x.to_string()),
        ("y", area.offset.y.to_string()),
        ("z", area.offset.z.to_string()),
        ("dx", area.size.x.to_string()),
        ("dy", area.size.y.to_string()),
        ("dz", area.size.z.to_string()),
    ];
    if let Some(dimension) = dimension {
        query.push(("dimension", dimension.to_string()));
    }
    query
}

impl Transport for HttpTransport {
    fn endpoint(&self) -> String {
        self.host.clone()
    }

    fn fetch_chunks(
        &self,
        chunks: Rect,
        dimension: Option<&str>,
        policy: &RequestPolicy,
    ) -> Result<Vec<u8>, InterfaceError> {
        let mut query = vec![
            ("x", chunks.x.to_string()),
            ("z", chunks.z.to_string()),
            ("dx", chunks.size_x.to_string()),
            ("dz", chunks.size_z.to_string()),
        ];
        if let Some(dimension) = dimension {
            query.push(("dimension", dimension.to_string()));
        }
        let request = self
            .request("GET", "/chunks", &query, policy)
            .set("Accept", "application/octet-stream");
        let response = self.execute("/chunks", policy, || request.clone().call())?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|err| InterfaceError::Malformed {
                endpoint: format!("{}/chunks", self.host),
                reason: err.to_string(),
            })?;
        Ok(bytes)
    }

    fn read_blocks(
        &self,
        area: BlockBox,
        dimension: Option<&str>,
        policy: &RequestPolicy,
    ) -> Result<Vec<(BlockPos, Block)>, InterfaceError> {
        let mut query = box_query(area, dimension);
        query.push(("includeState", "true".into()));
        query.push(("includeData", "true".into()));
        let request = self.request("GET", "/blocks", &query, policy);
        let response = self.execute("/blocks", policy, || request.clone().call())?;
        let blocks: Vec<BlockJson> = self.json("/blocks", response)?;

        Ok(blocks
            .into_iter()
            .map(|b| {
                let block = Block {
                    id: b.id,
                    states: b.state,
                    data: b.data.filter(|d| d != "{}"),
                };
                (BlockPos::new(b.x, b.y, b.z), block)
            })
            .collect())
    }

    fn read_biomes(
        &self,
        area: BlockBox,
        dimension: Option<&str>,
        policy: &RequestPolicy,
    ) -> Result<Vec<(BlockPos, String)>, InterfaceError> {
        let request = self.request("GET", "/biomes", &box_query(area, dimension), policy);
        let response = self.execute("/biomes", policy, || request.clone().call())?;
        let biomes: Vec<BiomeJson> = self.json("/biomes", response)?;
        Ok(biomes
            .into_iter()
            .map(|b| (BlockPos::new(b.x, b.y, b.z), b.id))
            .collect())
    }

    fn write_blocks(
        &self,
        blocks: &[(BlockPos, Block)],
        options: &WriteOptions,
        policy: &RequestPolicy,
    ) -> Result<Vec<ItemStatus>, InterfaceError> {
        let body: Vec<PlacementJson<'_>> = blocks
            .iter()
            .map(|(pos, block)| PlacementJson {
                x: pos.x,
                y: pos.y,
                z: pos.z,
                id: &block.id,
                state: &block.states,
                data: block.data.as_deref(),
            })
            .collect();

        let mut query = vec![
            ("doBlockUpdates", options.do_block_updates.to_string()),
            ("spawnDrops", options.spawn_drops.to_string()),
        ];
        if let Some(dimension) = &options.dimension {
            query.push(("dimension", dimension.clone()));
        }
        let request = self.request("PUT", "/blocks", &query, policy);
        let response = self.execute("/blocks", policy, || request.clone().send_json(&body))?;
        let results: Vec<PlacementResultJson> = self.json("/blocks", response)?;

        Ok(results
            .into_iter()
            .map(|r| match r.message {
                Some(message) => ItemStatus::failed(message),
                None => ItemStatus {
                    success: true,
                    detail: r.status.map(|s| s.to_string()),
                },
            })
            .collect())
    }

    fn run_commands(
        &self,
        commands: &str,
        dimension: Option<&str>,
        policy: &RequestPolicy,
    ) -> Result<Vec<ItemStatus>, InterfaceError> {
        let query: Vec<(&str, String)> = dimension
            .map(|d| ("dimension", d.to_string()))
            .into_iter()
            .collect();
        let request = self.request("POST", "/command", &query, policy);
        let response = self.execute("/command", policy, || {
            request.clone().send_string(commands)
        })?;
        let results: Vec<CommandResultJson> = self.json("/command", response)?;
        Ok(results
            .into_iter()
            .map(|r| ItemStatus {
                success: truthy(&r.status),
                detail: r.message,
            })
            .collect())
    }

    fn build_area(&self, policy: &RequestPolicy) -> Result<BlockBox, InterfaceError> {
        let request = self.request("GET", "/buildarea", &[], policy);
        let response = match self.execute("/buildarea", policy, || request.clone().call()) {
            Ok(response) => response,
            Err(InterfaceError::Status { .. }) => return Err(InterfaceError::BuildAreaNotSet),
            Err(err) => return Err(err),
        };
        let value: serde_json::Value = self.json("/buildarea", response)?;
        if value == serde_json::json!(-1) {
            return Err(InterfaceError::BuildAreaNotSet);
        }
        let area: BuildAreaJson =
            serde_json::from_value(value).map_err(|err| InterfaceError::Malformed {
                endpoint: format!("{}/buildarea", self.host),
                reason: err.to_string(),
            })?;
        Ok(BlockBox::between(
            BlockPos::new(area.x_from, area.y_from, area.z_from),
            BlockPos::new(area.x_to, area.y_to, area.z_to),
        ))
    }

    fn version(&self, policy: &RequestPolicy) -> Result<String, InterfaceError> {
        let request = self.request("GET", "/version", &[], policy);
        let response = self.execute("/version", policy, || request.clone().call())?;
        Ok(self.text("/version", response)?.trim().to_string())
    }
}
