//! TCPROS connection-header probe.
//!
//! The master does not know service types. A service provider answers a
//! connection header carrying `probe=1` with its own header, which includes
//! the `type` field, and then closes the connection.
//!
//! Wire format: a little-endian u32 total length, then fields, each a
//! little-endian u32 length followed by `key=value` bytes.

use crate::registry::RegistryError;

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

const MAX_HEADER_BYTES: usize = 1 << 20;

/// Encode a connection header, including the outer length prefix.
pub fn encode_header(fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (key, value) in fields {
        let field = format!("{}={}", key, value);
        body.extend_from_slice(&(field.len() as u32).to_le_bytes());
        body.extend_from_slice(field.as_bytes());
    }
    let mut out = Vec::with_capacity(body.len() + 4);
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

/// Decode a header body (without the outer length prefix).
pub fn decode_header(mut buf: &[u8]) -> Result<BTreeMap<String, String>, String> {
    let mut fields = BTreeMap::new();
    while !buf.is_empty() {
        if buf.len() < 4 {
            return Err(format!("truncated field length ({} bytes left)", buf.len()));
        }
        let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        buf = &buf[4..];
        if len > buf.len() {
            return Err(format!("field length {} exceeds remaining {}", len, buf.len()));
        }
        let field = std::str::from_utf8(&buf[..len]).map_err(|e| e.to_string())?;
        buf = &buf[len..];

        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| format!("field without '=': {:?}", field))?;
        fields.insert(key.to_string(), value.to_string());
    }
    Ok(fields)
}

/// Split `rosrpc://host:port[/]` into host and port.
pub fn parse_rosrpc_uri(uri: &str) -> Result<(String, u16), String> {
    let rest = uri
        .strip_prefix("rosrpc://")
        .ok_or_else(|| format!("not a rosrpc URI: {}", uri))?;
    let rest = rest.trim_end_matches('/');
    let (host, port) = rest
        .rsplit_once(':')
        .ok_or_else(|| format!("missing port in {}", uri))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| format!("bad port in {}", uri))?;
    if host.is_empty() {
        return Err(format!("missing host in {}", uri));
    }
    Ok((host.to_string(), port))
}

/// Ask the provider behind `uri` for the type of `service`.
pub fn probe_service_type(
    uri: &str,
    caller_id: &str,
    service: &str,
    timeout: Duration,
) -> Result<String, RegistryError> {
    let probe_err = |reason: String| RegistryError::Probe {
        target: uri.to_string(),
        reason,
    };

    let (host, port) = parse_rosrpc_uri(uri).map_err(probe_err)?;
    let addr = (host.as_str(), port)
        .to_socket_addrs()
        .map_err(|e| probe_err(e.to_string()))?
        .next()
        .ok_or_else(|| probe_err(format!("no address for {}", host)))?;

    let mut stream =
        TcpStream::connect_timeout(&addr, timeout).map_err(|e| probe_err(e.to_string()))?;
    stream
        .set_read_timeout(Some(timeout))
        .and_then(|_| stream.set_write_timeout(Some(timeout)))
        .map_err(|e| probe_err(e.to_string()))?;

    let request = encode_header(&[
        ("callerid", caller_id),
        ("service", service),
        ("md5sum", "*"),
        ("probe", "1"),
    ]);
    stream
        .write_all(&request)
        .map_err(|e| probe_err(e.to_string()))?;

    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .map_err(|e| probe_err(e.to_string()))?;
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_HEADER_BYTES {
        return Err(probe_err(format!("header of {} bytes is too large", len)));
    }
    let mut body = vec![0u8; len];
    stream
        .read_exact(&mut body)
        .map_err(|e| probe_err(e.to_string()))?;

    let fields = decode_header(&body).map_err(probe_err)?;
    debug!(service, uri, ?fields, "service probe answered");

    if let Some(error) = fields.get("error") {
        return Err(probe_err(error.clone()));
    }
    fields
        .get("type")
        .cloned()
        .ok_or_else(|| probe_err("response header has no type field".to_string()))
}
