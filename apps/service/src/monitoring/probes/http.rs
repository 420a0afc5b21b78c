use regex::{Regex, RegexBuilder};
use reqwest::Method;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{Probe, ProbeRequest, elapsed_ms};
use crate::monitoring::types::{CheckResult, ProbeData};

/// Body check configured on a service
#[derive(Debug, Clone)]
pub enum ContentMatcher {
    Regex(Regex),
    /// Lowercased needle compared against the lowercased body
    Substring(String),
}

impl ContentMatcher {
    /// `/pattern/flags` is a regular expression, anything else a case-insensitive substring
    pub fn parse(pattern: &str) -> Self {
        let Some((expression, flags)) = split_delimited(pattern) else {
            return Self::Substring(pattern.to_lowercase());
        };

        let mut builder = RegexBuilder::new(expression);
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                _ => &mut builder,
            };
        }

        match builder.build() {
            Ok(regex) => Self::Regex(regex),
            Err(error) => {
                warn!(pattern, %error, "Invalid content pattern, falling back to substring search");
                Self::Substring(expression.to_lowercase())
            }
        }
    }

    pub fn is_match(&self, body: &str) -> bool {
        match self {
            Self::Regex(regex) => regex.is_match(body),
            Self::Substring(needle) => body.to_lowercase().contains(needle.as_str()),
        }
    }
}

fn split_delimited(pattern: &str) -> Option<(&str, &str)> {
    let rest = pattern.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    let (expression, flags) = (&rest[..end], &rest[end + 1..]);
    if expression.is_empty() || !flags.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((expression, flags))
}

/// HTTP/HTTPS checker
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
    slow_threshold_ms: Option<u64>,
}

impl HttpProbe {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).user_agent(user_agent).build()?;
        Ok(Self { client, timeout, slow_threshold_ms: None })
    }

    /// Report 2xx responses slower than `threshold_ms` as degraded
    pub fn with_slow_threshold(mut self, threshold_ms: Option<u64>) -> Self {
        self.slow_threshold_ms = threshold_ms;
        self
    }

    fn transport_failure(&self, error: &reqwest::Error, latency: u64) -> CheckResult {
        if error.is_timeout() {
            CheckResult::timeout(latency, format!("Request timed out after {}s", self.timeout.as_secs_f32()))
        } else {
            CheckResult::offline(latency, format!("Request failed: {error}"))
        }
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, request: &ProbeRequest<'_>) -> CheckResult {
        let matcher = request.content_pattern.map(ContentMatcher::parse);
        let method = if matcher.is_some() { Method::GET } else { Method::HEAD };

        let mut http_request = self.client.request(method, request.target);
        for (name, value) in request.headers {
            http_request = http_request.header(name.as_str(), value.as_str());
        }

        let start = Instant::now();
        let response = match http_request.send().await {
            Ok(response) => response,
            Err(error) => {
                debug!(target_url = request.target, %error, "HTTP probe failed");
                return self.transport_failure(&error, elapsed_ms(start));
            }
        };
        let latency = elapsed_ms(start);
        let status = response.status();
        let data = ProbeData::Http { status_code: status.as_u16() };

        if status.is_server_error() {
            return CheckResult::offline(latency, format!("HTTP {status}")).with_data(data);
        }
        if !status.is_success() {
            return CheckResult::degraded(latency, format!("HTTP {status}")).with_data(data);
        }

        if let Some(matcher) = matcher {
            let body = match response.text().await {
                Ok(body) => body,
                Err(error) => return self.transport_failure(&error, elapsed_ms(start)).with_data(data),
            };

            if !matcher.is_match(&body) {
                return CheckResult::degraded(latency, format!("HTTP {status}, expected content not found"))
                    .with_content_match(false)
                    .with_data(data);
            }

            return self.classify_latency(latency, format!("HTTP {status}, content matched"))
                .with_content_match(true)
                .with_data(data);
        }

        self.classify_latency(latency, format!("HTTP {status}")).with_data(data)
    }
}

impl HttpProbe {
    fn classify_latency(&self, latency: u64, message: String) -> CheckResult {
        match self.slow_threshold_ms {
            Some(threshold) if latency > threshold => {
                CheckResult::degraded(latency, format!("{message}, slow response ({latency} ms > {threshold} ms)"))
            }
            _ => CheckResult::online(latency, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::ServiceStatus;
    use std::collections::BTreeMap;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn probe() -> HttpProbe {
        HttpProbe::new(Duration::from_secs(5), "upkeep-test").unwrap()
    }

    #[test]
    fn delimited_patterns_become_regexes() {
        let matcher = ContentMatcher::parse("/status:\\s*ok/i");
        assert!(matches!(matcher, ContentMatcher::Regex(_)));
        assert!(matcher.is_match("STATUS: OK"));
        assert!(!matcher.is_match("status: failing"));
    }

    #[test]
    fn plain_patterns_are_case_insensitive_substrings() {
        let matcher = ContentMatcher::parse("Welcome");
        assert!(matches!(matcher, ContentMatcher::Substring(_)));
        assert!(matcher.is_match("<h1>WELCOME home</h1>"));
        assert!(!matcher.is_match("goodbye"));
    }

    #[test]
    fn unsupported_flags_are_ignored_and_bad_regexes_fall_back() {
        assert!(ContentMatcher::parse("/ok/gu").is_match("ok"));

        let fallback = ContentMatcher::parse("/([unclosed/");
        assert!(matches!(fallback, ContentMatcher::Substring(_)));
        assert!(fallback.is_match("prefix ([UNCLOSED suffix"));

        // A lone slash pair without an expression is just text.
        assert!(matches!(ContentMatcher::parse("//"), ContentMatcher::Substring(_)));
    }

    #[tokio::test]
    async fn head_request_without_content_check() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/health"))
            .and(header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let headers = BTreeMap::from([("X-Api-Key".to_string(), "secret".to_string())]);
        let target = format!("{}/health", server.uri());
        let result = probe().probe(&ProbeRequest::new(&target, &headers)).await;

        assert_eq!(result.status, ServiceStatus::Online);
        assert_eq!(result.content_match, None);
        assert_eq!(result.data, Some(ProbeData::Http { status_code: 204 }));
    }

    #[tokio::test]
    async fn missing_content_is_degraded_not_offline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("maintenance page"))
            .mount(&server)
            .await;

        let headers = BTreeMap::new();
        let target = server.uri();
        let request = ProbeRequest::new(&target, &headers).with_content_pattern(Some("Dashboard"));
        let result = probe().probe(&request).await;

        assert_eq!(result.status, ServiceStatus::Degraded);
        assert_eq!(result.content_match, Some(false));
    }

    #[tokio::test]
    async fn matching_content_is_online() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"status\": \"ok\"}"))
            .mount(&server)
            .await;

        let headers = BTreeMap::new();
        let target = server.uri();
        let request = ProbeRequest::new(&target, &headers).with_content_pattern(Some("/\"status\":\\s*\"ok\"/"));
        let result = probe().probe(&request).await;

        assert_eq!(result.status, ServiceStatus::Online);
        assert_eq!(result.content_match, Some(true));
    }

    #[tokio::test]
    async fn status_codes_map_to_statuses() {
        let server = MockServer::start().await;
        Mock::given(path("/broken")).respond_with(ResponseTemplate::new(503)).mount(&server).await;
        Mock::given(path("/missing")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let headers = BTreeMap::new();
        let broken = format!("{}/broken", server.uri());
        let missing = format!("{}/missing", server.uri());

        let result = probe().probe(&ProbeRequest::new(&broken, &headers)).await;
        assert_eq!(result.status, ServiceStatus::Offline);

        let result = probe().probe(&ProbeRequest::new(&missing, &headers)).await;
        assert_eq!(result.status, ServiceStatus::Degraded);
        assert!(result.message.contains("404"));
    }

    #[tokio::test]
    async fn slow_responses_time_out() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let probe = HttpProbe::new(Duration::from_millis(200), "upkeep-test").unwrap();
        let headers = BTreeMap::new();
        let target = server.uri();
        let result = probe.probe(&ProbeRequest::new(&target, &headers)).await;

        assert_eq!(result.status, ServiceStatus::Timeout);
    }

    #[tokio::test]
    async fn slow_threshold_degrades_successful_responses() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(150)))
            .mount(&server)
            .await;

        let probe = probe().with_slow_threshold(Some(50));
        let headers = BTreeMap::new();
        let target = server.uri();
        let result = probe.probe(&ProbeRequest::new(&target, &headers)).await;

        assert_eq!(result.status, ServiceStatus::Degraded);
        assert!(result.message.contains("slow response"));
    }

    #[tokio::test]
    async fn refused_connection_is_offline() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let headers = BTreeMap::new();
        let target = format!("http://127.0.0.1:{port}/");
        let result = probe().probe(&ProbeRequest::new(&target, &headers)).await;

        assert_eq!(result.status, ServiceStatus::Offline);
        assert!(result.message.starts_with("Request failed"));
    }
}
