//! Assembly and rendering of completed responses.

use super::types::*;
use crate::shared::{status_text, DetailedTiming};
use base64::Engine;
use hyper::{body::Bytes, HeaderMap, StatusCode, Version};
use serde_json::json;
use std::net::IpAddr;

/// Determines if response body is likely binary based on content-type.
pub fn is_binary_content(content_type: Option<&str>) -> bool {
    let ct = match content_type {
        Some(ct) => ct.to_lowercase(),
        None => return false,
    };

    let text_types = [
        "text/",
        "application/json",
        "application/xml",
        "application/javascript",
        "application/x-www-form-urlencoded",
        "+json",
        "+xml",
    ];

    !text_types.iter().any(|t| ct.contains(t))
}

pub fn version_to_string(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/1.1",
    }
}

/// Raw pieces of a finished exchange.
pub struct ResponseParts {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub url: String,
    pub server_ip: Option<IpAddr>,
    pub timing: DetailedTiming,
    pub tls: Option<TlsInfo>,
}

pub fn build_response(parts: ResponseParts) -> Response {
    let status = parts.status.as_u16();
    Response {
        status,
        status_text: status_text(status),
        version: parts.version,
        headers: parts.headers,
        body: parts.body,
        url: parts.url,
        server_ip: parts.server_ip,
        timing: parts.timing.to_timing_info(),
        tls: parts.tls,
    }
}

/// JSON success envelope; binary bodies are base64 encoded.
pub fn to_json(response: &Response) -> serde_json::Value {
    let is_binary = is_binary_content(response.header("content-type"));

    let headers: serde_json::Map<String, serde_json::Value> = response
        .headers
        .iter()
        .map(|(k, v)| {
            (
                k.to_string(),
                json!(String::from_utf8_lossy(v.as_bytes())),
            )
        })
        .collect();

    let mut data = json!({
        "status": response.status,
        "statusText": response.status_text,
        "protocol": version_to_string(response.version),
        "url": response.url,
        "headers": headers,
        "size": response.body.len(),
        "isBinary": is_binary,
        "timing": response.timing,
    });

    if is_binary {
        data["bodyBase64"] =
            json!(base64::engine::general_purpose::STANDARD.encode(&response.body));
    } else {
        data["body"] = json!(response.text());
    }
    if let Some(ip) = response.server_ip {
        data["serverIp"] = json!(ip.to_string());
    }
    if let Some(tls) = &response.tls {
        data["tls"] = json!(tls);
    }

    json!({
        "success": true,
        "data": data,
    })
}
