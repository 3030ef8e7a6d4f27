//! ROS master client over XML-RPC.
//!
//! Master API calls answer `[code, statusMessage, value]`; any code other
//! than 1 is a rejection. The runtime id comes from the node API (`getPid`
//! on the node's own URI), and service types from a TCPROS probe.

use crate::registry::xmlrpc::{self, Value};
use crate::registry::{ChannelTypes, Owners, Registry, RegistryError, SystemState, tcpros};

use std::time::Duration;
use tracing::trace;

pub const DEFAULT_MASTER_URI: &str = "http://localhost:11311/";
pub const DEFAULT_CALLER_ID: &str = "/rosgraph_probe";

pub struct MasterClient {
    master_uri: String,
    caller_id: String,
    timeout: Duration,
    agent: ureq::Agent,
}

impl MasterClient {
    pub fn new(master_uri: impl Into<String>, caller_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            master_uri: master_uri.into(),
            caller_id: caller_id.into(),
            timeout,
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    /// One XML-RPC round trip; transport failures are `Unreachable`.
    fn call(&self, endpoint: &str, method: &str, params: &[Value]) -> Result<Value, RegistryError> {
        let body = xmlrpc::encode_call(method, params);
        trace!(endpoint, method, "xml-rpc call");

        let unreachable = |reason: String| RegistryError::Unreachable {
            endpoint: endpoint.to_string(),
            reason,
        };
        let response = self
            .agent
            .post(endpoint)
            .set("Content-Type", "text/xml")
            .send_string(&body)
            .map_err(|e| unreachable(e.to_string()))?;
        let text = response
            .into_string()
            .map_err(|e| unreachable(e.to_string()))?;

        match xmlrpc::decode_response(&text) {
            Ok(v) => unpack_status(method, v),
            Err(xmlrpc::XmlRpcError::Fault { code, message }) => Err(RegistryError::Rejected {
                method: method.to_string(),
                code,
                message,
            }),
            Err(e) => Err(RegistryError::Malformed {
                method: method.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn master_call(&self, method: &str, args: &[&str]) -> Result<Value, RegistryError> {
        let mut params: Vec<Value> = vec![self.caller_id.as_str().into()];
        params.extend(args.iter().map(|a| Value::from(*a)));
        self.call(&self.master_uri, method, &params)
    }
}

impl Registry for MasterClient {
    fn snapshot(&self) -> Result<SystemState, RegistryError> {
        let v = self.master_call("getSystemState", &[])?;
        parse_system_state(&v)
    }

    fn channel_types(&self) -> Result<ChannelTypes, RegistryError> {
        let v = self.master_call("getTopicTypes", &[])?;
        parse_pairs("getTopicTypes", &v)
    }

    fn resolve_type(&self, service: &str) -> Result<String, RegistryError> {
        let v = self.master_call("lookupService", &[service])?;
        let uri = expect_str("lookupService", &v)?;
        tcpros::probe_service_type(&uri, &self.caller_id, service, self.timeout)
    }

    fn resolve_process(&self, name: &str) -> Result<String, RegistryError> {
        let v = self.master_call("lookupNode", &[name])?;
        expect_str("lookupNode", &v)
    }

    fn get_runtime_id(&self, uri: &str) -> Result<String, RegistryError> {
        // The node answers for itself; any failure here concerns that node only.
        let v = self
            .call(uri, "getPid", &[self.caller_id.as_str().into()])
            .map_err(|e| RegistryError::Probe {
                target: uri.to_string(),
                reason: e.to_string(),
            })?;
        match v {
            Value::Int(pid) => Ok(pid.to_string()),
            other => Err(RegistryError::Probe {
                target: uri.to_string(),
                reason: format!("getPid returned {:?}", other),
            }),
        }
    }
}

fn malformed(method: &str, reason: impl Into<String>) -> RegistryError {
    RegistryError::Malformed {
        method: method.to_string(),
        reason: reason.into(),
    }
}

/// Split `[code, statusMessage, value]`.
fn unpack_status(method: &str, v: Value) -> Result<Value, RegistryError> {
    let Value::Array(mut items) = v else {
        return Err(malformed(method, "response is not a [code, message, value] triple"));
    };
    if items.len() != 3 {
        return Err(malformed(
            method,
            format!("expected 3 response elements, got {}", items.len()),
        ));
    }
    let value = items.pop().unwrap_or(Value::Nil);
    let code = items[0]
        .as_i64()
        .ok_or_else(|| malformed(method, "status code is not an integer"))?;
    let message = items[1].as_str().unwrap_or_default().to_string();

    if code != 1 {
        return Err(RegistryError::Rejected {
            method: method.to_string(),
            code,
            message,
        });
    }
    Ok(value)
}

fn expect_str(method: &str, v: &Value) -> Result<String, RegistryError> {
    v.as_str()
        .map(str::to_string)
        .ok_or_else(|| malformed(method, format!("expected a string, got {:?}", v)))
}

fn parse_system_state(v: &Value) -> Result<SystemState, RegistryError> {
    const METHOD: &str = "getSystemState";
    let parts = v
        .as_array()
        .ok_or_else(|| malformed(METHOD, "state is not an array"))?;
    if parts.len() != 3 {
        return Err(malformed(
            METHOD,
            format!("expected [publishers, subscribers, services], got {} parts", parts.len()),
        ));
    }
    Ok(SystemState {
        published: parse_owners(METHOD, &parts[0])?,
        subscribed: parse_owners(METHOD, &parts[1])?,
        provided: parse_owners(METHOD, &parts[2])?,
    })
}

/// `[[name, [owner, ...]], ...]`
fn parse_owners(method: &str, v: &Value) -> Result<Owners, RegistryError> {
    let entries = v
        .as_array()
        .ok_or_else(|| malformed(method, "owner list is not an array"))?;
    let mut out = Owners::with_capacity(entries.len());
    for entry in entries {
        let pair = entry
            .as_array()
            .filter(|p| p.len() == 2)
            .ok_or_else(|| malformed(method, format!("bad owner entry {:?}", entry)))?;
        let name = expect_str(method, &pair[0])?;
        let owners = pair[1]
            .as_array()
            .ok_or_else(|| malformed(method, format!("owners of {} are not an array", name)))?
            .iter()
            .map(|o| expect_str(method, o))
            .collect::<Result<Vec<_>, _>>()?;
        out.push((name, owners));
    }
    Ok(out)
}

/// `[[name, type], ...]`
fn parse_pairs(method: &str, v: &Value) -> Result<ChannelTypes, RegistryError> {
    let entries = v
        .as_array()
        .ok_or_else(|| malformed(method, "type list is not an array"))?;
    entries
        .iter()
        .map(|entry| match entry.as_array() {
            Some([name, ty]) => Ok((expect_str(method, name)?, expect_str(method, ty)?)),
            _ => Err(malformed(method, format!("bad type entry {:?}", entry))),
        })
        .collect()
}
