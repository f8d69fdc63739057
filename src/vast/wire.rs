//! JSON shapes exchanged with the Vast.ai REST API.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value, json};

use crate::marketplace::{
    ConnectionInfo, Instance, InstanceId, InstanceStatus, Offer, OfferId, ProvisionRequest,
    SearchCriteria,
};

use super::VastError;

const UNKNOWN_GPU: &str = "Unknown GPU";
const JUPYTER_CONTAINER_PORT: &str = "8080/tcp";
const DEFAULT_JUPYTER_PORT: u16 = 8080;

/// Builds the `q` query document for `GET /bundles/`.
///
/// Price ascending is always part of the ordering so the first offer is the
/// cheapest among equally ranked ones.
pub(super) fn search_query(criteria: &SearchCriteria) -> Value {
    let mut order = vec![json!([
        criteria.sort_order.field(),
        criteria.sort_order.direction()
    ])];
    if !criteria.sort_order.is_price_based() {
        order.push(json!(["dph_total", "asc"]));
    }

    let mut query = Map::new();
    query.insert("num_gpus".to_owned(), json!({ "eq": criteria.gpu_count }));
    query.insert(
        "min_bid".to_owned(),
        json!({ "gte": criteria.min_bid_price }),
    );
    query.insert(
        "reliability2".to_owned(),
        json!({ "gte": criteria.min_reliability }),
    );
    query.insert(
        "direct_port_count".to_owned(),
        json!({ "gte": criteria.min_direct_ports }),
    );
    if !criteria.external_allowed {
        query.insert("external".to_owned(), json!({ "eq": false }));
    }
    query.insert("rentable".to_owned(), json!({ "eq": true }));
    query.insert("order".to_owned(), Value::Array(order));
    query.insert("type".to_owned(), json!("on-demand"));
    Value::Object(query)
}

#[derive(Debug, Deserialize)]
pub(super) struct OffersResponse {
    #[serde(default)]
    pub(super) offers: Vec<WireOffer>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireOffer {
    id: u64,
    #[serde(default)]
    dph_total: Option<f64>,
    #[serde(default)]
    gpu_name: Option<String>,
    #[serde(default)]
    num_gpus: Option<u32>,
}

impl WireOffer {
    /// Converts to an [`Offer`]; offers without a price cannot be compared
    /// and are dropped.
    pub(super) fn into_offer(self) -> Option<Offer> {
        Some(Offer {
            id: OfferId::new(self.id),
            price_per_hour: self.dph_total?,
            gpu_name: self.gpu_name.unwrap_or_else(|| UNKNOWN_GPU.to_owned()),
            gpu_count: self.num_gpus.unwrap_or(1),
        })
    }
}

/// Body of `PUT /asks/{id}/`.
#[derive(Debug, Serialize)]
pub(super) struct CreateInstanceBody<'a> {
    client_id: &'static str,
    image: &'a str,
    env: EnvMap<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<f64>,
    disk: u32,
    label: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    onstart: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_login: Option<&'a str>,
    runtype: &'static str,
    use_jupyter_lab: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_hash_id: Option<&'a str>,
}

impl<'a> CreateInstanceBody<'a> {
    pub(super) fn new(request: &'a ProvisionRequest, label: &'a str) -> Self {
        let config = &request.config;
        Self {
            client_id: "me",
            image: &config.image,
            env: EnvMap(&config.env_vars),
            price: config.bid_price,
            disk: config.disk_gb,
            label,
            onstart: config.startup_command.as_deref(),
            image_login: config.login.as_deref(),
            runtype: if config.enable_jupyter {
                "jupyter"
            } else {
                "ssh"
            },
            use_jupyter_lab: config.enable_jupyter,
            template_hash_id: config.template_ref.as_deref(),
        }
    }
}

/// Serialises environment pairs as a JSON object in declaration order.
#[derive(Debug)]
struct EnvMap<'a>(&'a [(String, String)]);

impl Serialize for EnvMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateInstanceResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    new_contract: Option<u64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

impl CreateInstanceResponse {
    pub(super) fn into_instance_id(self) -> Result<InstanceId, VastError> {
        match (self.success, self.new_contract) {
            (Some(false), _) | (_, None) => Err(VastError::Rejected {
                reason: rejection_reason(self.msg, self.error),
            }),
            (_, Some(id)) => Ok(InstanceId::new(id)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct InstanceEnvelope {
    #[serde(default)]
    pub(super) instances: Option<WireInstance>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireInstance {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    actual_status: Option<String>,
    #[serde(default)]
    ssh_host: Option<String>,
    #[serde(default)]
    ssh_port: Option<u16>,
    #[serde(default)]
    jupyter_url: Option<String>,
    #[serde(default)]
    public_ipaddr: Option<String>,
    #[serde(default)]
    jupyter_token: Option<String>,
    #[serde(default)]
    ports: Option<Map<String, Value>>,
}

impl WireInstance {
    pub(super) fn into_instance(self, requested: InstanceId) -> Instance {
        Instance {
            id: self.id.map_or(requested, InstanceId::new),
            status: InstanceStatus::from_upstream(self.actual_status.as_deref()),
            connection: ConnectionInfo {
                ssh_host: non_blank(self.ssh_host.as_deref()).map(str::to_owned),
                ssh_port: self.ssh_port,
                web_url: self.web_url(),
            },
        }
    }

    /// Prefers the advertised `jupyter_url`; otherwise builds one from the
    /// public address, the mapped Jupyter port and the access token.
    fn web_url(&self) -> Option<String> {
        if let Some(url) = non_blank(self.jupyter_url.as_deref()) {
            return Some(url.to_owned());
        }
        let host = non_blank(self.public_ipaddr.as_deref())?;
        let token = non_blank(self.jupyter_token.as_deref())?;
        Some(format!("https://{host}:{}/?token={token}", self.jupyter_port()))
    }

    fn jupyter_port(&self) -> u16 {
        self.ports
            .as_ref()
            .and_then(|ports| ports.get(JUPYTER_CONTAINER_PORT))
            .and_then(Value::as_array)
            .and_then(|bindings| bindings.first())
            .and_then(|binding| binding.get("HostPort"))
            .and_then(|port| match port {
                Value::String(text) => text.trim().parse().ok(),
                Value::Number(number) => number.as_u64().and_then(|n| u16::try_from(n).ok()),
                _ => None,
            })
            .unwrap_or(DEFAULT_JUPYTER_PORT)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

/// Generic `{"success": ..}` acknowledgement.
#[derive(Debug, Default, Deserialize)]
pub(super) struct AckResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

impl AckResponse {
    pub(super) fn into_result(self) -> Result<(), VastError> {
        if self.success == Some(false) {
            return Err(VastError::Rejected {
                reason: rejection_reason(self.msg, self.error),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Extracts the human readable message from an error body, falling back to
/// the raw text.
pub(super) fn upstream_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| preferred_message(parsed.msg, parsed.error))
        .unwrap_or_else(|| body.trim().to_owned())
}

/// `msg` wins over `error` wherever the API sends both.
fn preferred_message(msg: Option<String>, error: Option<String>) -> Option<String> {
    msg.or(error)
}

fn rejection_reason(msg: Option<String>, error: Option<String>) -> String {
    preferred_message(msg, error).unwrap_or_else(|| String::from("Unknown error"))
}
