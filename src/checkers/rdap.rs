//! RDAP domain probe (spec §4.4 RDAP path).

use crate::checkers::CheckerError;
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// Outcome of one RDAP HTTP round trip, before it's folded into a
/// `CheckResult` by the domain ladder.
#[derive(Debug)]
pub enum RdapOutcome {
    /// 200 with a parseable domain object: the name is registered.
    Taken(RdapDomain),
    /// 404: the registry has no object for this name.
    Available,
    /// 429, with an optional `Retry-After`.
    RateLimited(Option<std::time::Duration>),
    /// Any other status or a body that didn't parse as RDAP JSON.
    Unexpected(u16),
}

#[derive(Debug, Default)]
pub struct RdapDomain {
    pub registrar: Option<String>,
    pub name_servers: Vec<String>,
    pub status: Vec<String>,
    pub creation_date: Option<String>,
    pub expiration_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RdapDomainResponse {
    #[serde(rename = "nameservers")]
    name_servers: Option<Vec<RdapNameserver>>,
    events: Option<Vec<RdapEvent>>,
    entities: Option<Vec<RdapEntity>>,
    status: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RdapNameserver {
    #[serde(rename = "ldhName")]
    ldh_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RdapEvent {
    #[serde(rename = "eventAction")]
    event_action: Option<String>,
    #[serde(rename = "eventDate")]
    event_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RdapEntity {
    roles: Option<Vec<String>>,
    #[serde(rename = "vcardArray")]
    vcard_array: Option<serde_json::Value>,
}

/// Queries one RDAP server for a domain object.
pub struct RdapProbe {
    client: reqwest::Client,
}

impl RdapProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn query(&self, server: &str, domain: &str) -> Result<RdapOutcome, CheckerError> {
        let base = Url::parse(server).map_err(|_| CheckerError::UnsupportedTld(server.to_string()))?;
        let url = base
            .join(&format!("domain/{}", domain))
            .map_err(|_| CheckerError::UnsupportedTld(server.to_string()))?;

        debug!(%url, "querying RDAP server");
        let response = self
            .client
            .get(url)
            .header("Accept", "application/rdap+json, application/json")
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(RdapOutcome::Available);
        }
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(crate::util::parse_retry_after);
            return Ok(RdapOutcome::RateLimited(retry_after));
        }
        if !status.is_success() {
            return Ok(RdapOutcome::Unexpected(status.as_u16()));
        }

        let body = response.text().await?;
        match serde_json::from_str::<RdapDomainResponse>(&body) {
            Ok(parsed) => Ok(RdapOutcome::Taken(to_domain(parsed))),
            Err(_) => Ok(RdapOutcome::Unexpected(status.as_u16())),
        }
    }
}

fn to_domain(parsed: RdapDomainResponse) -> RdapDomain {
    let mut domain = RdapDomain {
        name_servers: parsed
            .name_servers
            .unwrap_or_default()
            .into_iter()
            .filter_map(|ns| ns.ldh_name)
            .collect(),
        status: parsed.status.unwrap_or_default(),
        ..Default::default()
    };

    for event in parsed.events.unwrap_or_default() {
        match (event.event_action.as_deref(), event.event_date) {
            (Some("registration"), Some(date)) => domain.creation_date = Some(date),
            (Some("expiration"), Some(date)) => domain.expiration_date = Some(date),
            _ => {}
        }
    }

    for entity in parsed.entities.unwrap_or_default() {
        if entity.roles.as_deref().unwrap_or_default().iter().any(|r| r == "registrar") {
            if domain.registrar.is_none() {
                domain.registrar = extract_fn_from_vcard(entity.vcard_array.as_ref());
            }
        }
    }

    domain
}

/// vCard arrays are `["vcard", [[fieldName, params, type, value], ...]]`;
/// this pulls the `fn` (formatted name) field out if present.
fn extract_fn_from_vcard(vcard: Option<&serde_json::Value>) -> Option<String> {
    let entries = vcard?.as_array()?.get(1)?.as_array()?;
    for entry in entries {
        let fields = entry.as_array()?;
        if fields.first()?.as_str()? == "fn" {
            return fields.get(3)?.as_str().map(|s| s.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn not_found_maps_to_available() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/domain/.*$"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let probe = RdapProbe::new(reqwest::Client::new());
        let outcome = probe.query(&server.uri(), "example.test").await.unwrap();
        assert!(matches!(outcome, RdapOutcome::Available));
    }

    #[tokio::test]
    async fn success_with_registrar_maps_to_taken() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/domain/.*$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "nameservers": [{"ldhName": "ns1.example.test"}],
                "events": [{"eventAction": "registration", "eventDate": "2020-01-01T00:00:00Z"}],
                "entities": [{
                    "roles": ["registrar"],
                    "vcardArray": ["vcard", [["fn", {}, "text", "Example Registrar"]]]
                }],
                "status": ["active"]
            })))
            .mount(&server)
            .await;

        let probe = RdapProbe::new(reqwest::Client::new());
        match probe.query(&server.uri(), "example.test").await.unwrap() {
            RdapOutcome::Taken(domain) => {
                assert_eq!(domain.registrar.as_deref(), Some("Example Registrar"));
                assert_eq!(domain.name_servers, vec!["ns1.example.test".to_string()]);
            }
            other => panic!("expected Taken, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limited_status_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/domain/.*$"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "5"))
            .mount(&server)
            .await;

        let probe = RdapProbe::new(reqwest::Client::new());
        match probe.query(&server.uri(), "example.test").await.unwrap() {
            RdapOutcome::RateLimited(Some(d)) => assert_eq!(d, std::time::Duration::from_secs(5)),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }
}
