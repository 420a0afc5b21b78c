//! Extracting hosts and ports from the loosely formatted targets users enter.

use url::Url;

/// Split `target` into host and port.
///
/// Accepts `host:port`, `[v6]:port`, a bare host (with `default_port`), or a URL.
pub fn host_and_port(target: &str, default_port: Option<u16>) -> Result<(String, u16), String> {
    let target = target.trim();
    if target.is_empty() {
        return Err("target is empty".to_string());
    }

    if target.contains("://") {
        let url = Url::parse(target).map_err(|e| format!("invalid URL '{target}': {e}"))?;
        let host = url.host_str().ok_or_else(|| format!("URL '{target}' has no host"))?;
        let port = url
            .port_or_known_default()
            .or(default_port)
            .ok_or_else(|| format!("URL '{target}' has no port"))?;
        return Ok((trim_brackets(host).to_string(), port));
    }

    let authority = target.split('/').next().unwrap_or(target);

    if let Some(rest) = authority.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(|| format!("unterminated IPv6 literal in '{target}'"))?;
        let port = match tail.strip_prefix(':') {
            Some(port) => parse_port(port)?,
            None => default_port.ok_or_else(|| format!("target '{target}' has no port"))?,
        };
        return Ok((host.to_string(), port));
    }

    match authority.rsplit_once(':') {
        // More than one colon without brackets is a bare IPv6 address.
        Some((host, _)) if host.contains(':') => match default_port {
            Some(port) => Ok((authority.to_string(), port)),
            None => Err(format!("target '{target}' has no port")),
        },
        Some((host, port)) if !host.is_empty() => Ok((host.to_string(), parse_port(port)?)),
        Some(_) => Err(format!("target '{target}' has no host")),
        None => match default_port {
            Some(port) => Ok((authority.to_string(), port)),
            None => Err(format!("target '{target}' must be in the form host:port")),
        },
    }
}

/// Host part of a target, for probes that do not use a port
pub fn host_of(target: &str) -> Result<String, String> {
    host_and_port(target, Some(0)).map(|(host, _)| host)
}

fn parse_port(raw: &str) -> Result<u16, String> {
    match raw.parse::<u16>() {
        Ok(0) | Err(_) => Err(format!("invalid port '{raw}'")),
        Ok(port) => Ok(port),
    }
}

fn trim_brackets(host: &str) -> &str {
    host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host)
}
