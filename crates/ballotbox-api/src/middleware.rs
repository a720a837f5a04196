use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use ballotbox_core::vote::FALLBACK_VOTER_IDENTITY;
use ballotbox_core::{AppState, VoterContext};

use crate::error::ApiError;

/// Headers that only appear when a request passed through some proxy.
const PROXY_HEADERS: &[&str] = &[
    "via",
    "forwarded",
    "x-proxy-id",
    "proxy-connection",
    "x-proxy-connection",
    "x-originating-ip",
    "client-ip",
];

fn header_opt(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| raw.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Count proxy-related headers. A single-hop `X-Forwarded-For` is what any
/// reverse proxy adds, so only a multi-hop chain counts.
pub fn count_proxy_headers(headers: &HeaderMap) -> usize {
    let mut count = PROXY_HEADERS
        .iter()
        .filter(|name| headers.contains_key(**name))
        .count();

    let hops = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(','))
        .filter(|hop| !hop.trim().is_empty())
        .count();
    if hops > 1 {
        count += 1;
    }
    count
}

/// Who is voting, as far as the request tells us.
pub struct Voter(pub VoterContext);

impl FromRequestParts<AppState> for Voter {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let forwarded = if state.config.trust_proxy {
            header_opt(&parts.headers, "x-forwarded-for")
        } else {
            None
        };
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        let identity = forwarded
            .or(peer)
            .unwrap_or_else(|| FALLBACK_VOTER_IDENTITY.to_string());

        Ok(Voter(VoterContext {
            identity: Some(identity),
            proxy_headers: count_proxy_headers(&parts.headers),
        }))
    }
}
