//! Client address extraction for click events
//!
//! - Falls back to the socket address unless proxy headers are trusted
//! - Walks `Forwarded` / `X-Forwarded-For` chains right to left, skipping
//!   hops that belong to configured trusted proxies
//! - Handles both IPv4 and IPv6

use axum::http::HeaderMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::config::{ClientIpConfig, TrustedProxyMode};

/// Resolve the client address according to the trust configuration.
pub fn extract_client_ip(headers: &HeaderMap, socket_ip: IpAddr, config: &ClientIpConfig) -> IpAddr {
    let ip = match config.trusted_proxy_mode {
        TrustedProxyMode::None => socket_ip,
        TrustedProxyMode::Standard => {
            if !is_trusted(socket_ip, config) {
                socket_ip
            } else {
                let chain = forwarded_chain(headers);
                pick_from_chain(&chain, config).unwrap_or(socket_ip)
            }
        }
    };

    if config.ip_anonymization {
        anonymize_ip(ip)
    } else {
        ip
    }
}

/// Placeholder location string recorded with each click.
pub fn coarse_location(ip: IpAddr) -> String {
    format!("Location from {ip}")
}

fn is_trusted(ip: IpAddr, config: &ClientIpConfig) -> bool {
    config.trusted_proxies.is_empty() || config.trusted_proxies.iter().any(|net| net.contains(&ip))
}

/// Collect forwarded hops, preferring RFC 7239 `Forwarded` over `X-Forwarded-For`.
fn forwarded_chain(headers: &HeaderMap) -> Vec<IpAddr> {
    let forwarded = parse_forwarded(headers);
    if !forwarded.is_empty() {
        return forwarded;
    }
    parse_x_forwarded_for(headers)
}

fn pick_from_chain(chain: &[IpAddr], config: &ClientIpConfig) -> Option<IpAddr> {
    if config.trusted_proxies.is_empty() {
        // Only the socket peer is vouched for; take the hop it reported
        return chain.last().copied();
    }

    chain
        .iter()
        .rev()
        .find(|ip| !is_trusted(**ip, config))
        .or_else(|| chain.first())
        .copied()
}

/// Forwarded: for=192.0.2.60;proto=http, for="[2001:db8::1]:4711"
fn parse_forwarded(headers: &HeaderMap) -> Vec<IpAddr> {
    headers
        .get_all("forwarded")
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|element| {
            element.split(';').find_map(|param| {
                let param = param.trim();
                let (key, value) = param.split_once('=')?;
                if !key.eq_ignore_ascii_case("for") {
                    return None;
                }
                parse_node(value.trim_matches('"'))
            })
        })
        .collect()
}

fn parse_node(node: &str) -> Option<IpAddr> {
    if let Some(rest) = node.strip_prefix('[') {
        return rest.split(']').next()?.parse().ok();
    }
    if let Ok(ip) = node.parse::<IpAddr>() {
        return Some(ip);
    }
    // IPv4 with port
    node.rsplit_once(':')
        .and_then(|(host, _)| host.parse::<Ipv4Addr>().ok())
        .map(IpAddr::V4)
}

fn parse_x_forwarded_for(headers: &HeaderMap) -> Vec<IpAddr> {
    headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|s| parse_node(s.trim()))
        .collect()
}

/// Anonymize an IP address by truncating to network prefix
///
/// - IPv4: Truncate to /24 (zero last octet)
/// - IPv6: Truncate to /48 (zero last 80 bits)
pub fn anonymize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(addr) => {
            let octets = addr.octets();
            IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], octets[2], 0))
        }
        IpAddr::V6(addr) => {
            let segments = addr.segments();
            IpAddr::V6(Ipv6Addr::new(
                segments[0],
                segments[1],
                segments[2],
                0,
                0,
                0,
                0,
                0,
            ))
        }
    }
}
