//! Certificate authority revocation endpoints and internet exchange points.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

use super::base::{DiagnosticTool, ToolContext, ToolOutput};
use super::probe::{probe_all, CheckReport, Target};
use crate::InstabilityResult;

/// OCSP and CRL endpoints, with the method each one answers.
pub const CA_ENDPOINTS: &[(&str, &str, &str)] = &[
    ("DigiCert OCSP", "http://ocsp.digicert.com", "HEAD"),
    ("DigiCert CRL", "http://crl3.digicert.com/sha2-ev-server-g1.crl", "HEAD"),
    ("Let's Encrypt OCSP", "http://e6.o.lencr.org", "GET"),
    ("GlobalSign OCSP", "http://ocsp2.globalsign.com/rootr1", "HEAD"),
    ("Sectigo OCSP", "http://ocsp.sectigo.com", "HEAD"),
    ("Entrust OCSP", "http://ocsp.entrust.net", "GET"),
    ("IdenTrust OCSP", "http://ocsp.identrust.com", "HEAD"),
];

pub const IXP_ENDPOINTS: &[(&str, &str)] = &[
    ("DE-CIX (Frankfurt)", "https://www.de-cix.net/"),
    ("LINX (London)", "https://www.linx.net/"),
    ("AMS-IX (Amsterdam)", "https://www.ams-ix.net/"),
    ("NYIIX (New York)", "https://www.nyiix.net/"),
    ("HKIX (Hong Kong)", "https://www.hkix.net/"),
    ("Equinix-IX (Global)", "https://status.equinix.com/"),
];

/// Some exchange sites turn away non-browser clients.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// ============================================================================
// check_tls_cas
// ============================================================================

/// 200 is reachable, a redirect is reachable with a note, anything else fails.
async fn check_ca_endpoint(client: Client, method: Method, url: String) -> Result<Option<String>, String> {
    let resp = client
        .request(method, &url)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = resp.status();
    if status == StatusCode::OK {
        Ok(None)
    } else if status.is_redirection() {
        Ok(Some(format!("redirected ({})", status.as_u16())))
    } else {
        Err(format!("status code {}", status.as_u16()))
    }
}

pub struct TlsCas;

#[async_trait]
impl DiagnosticTool for TlsCas {
    fn name(&self) -> &'static str {
        "check_tls_cas"
    }

    fn description(&self) -> &'static str {
        "Check that the OCSP and CRL servers of major certificate authorities respond"
    }

    async fn run(&self, _args: &Value, ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        let targets: Vec<Target> = CA_ENDPOINTS
            .iter()
            .map(|(label, url, _)| Target::new(*label, *url))
            .collect();

        let client = ctx.http.clone();
        let results = probe_all(&targets, ctx, move |t: Target| {
            let method = if ca_endpoint_wants_get(&t.label) {
                Method::GET
            } else {
                Method::HEAD
            };
            check_ca_endpoint(client.clone(), method, t.address)
        })
        .await;

        Ok(ToolOutput::report(&CheckReport::new("certificate authority endpoints", results)))
    }
}

fn ca_endpoint_wants_get(label: &str) -> bool {
    CA_ENDPOINTS
        .iter()
        .any(|(name, _, method)| *name == label && *method == "GET")
}

// ============================================================================
// check_ixps
// ============================================================================

async fn check_ixp(client: Client, url: String) -> Result<Option<String>, String> {
    let resp = client
        .get(&url)
        .header(USER_AGENT, BROWSER_USER_AGENT)
        .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
        .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
        .send()
        .await
        .map_err(|e| e.to_string())?;

    match resp.status() {
        StatusCode::OK => Ok(None),
        status => Err(format!("status code {}", status.as_u16())),
    }
}

pub struct Ixps;

#[async_trait]
impl DiagnosticTool for Ixps {
    fn name(&self) -> &'static str {
        "check_ixps"
    }

    fn description(&self) -> &'static str {
        "Check that the websites of major internet exchange points respond"
    }

    async fn run(&self, _args: &Value, ctx: &ToolContext) -> InstabilityResult<ToolOutput> {
        let targets: Vec<Target> = IXP_ENDPOINTS
            .iter()
            .map(|(label, url)| Target::new(*label, *url))
            .collect();

        let client = ctx.http.clone();
        let results = probe_all(&targets, ctx, move |t: Target| check_ixp(client.clone(), t.address)).await;

        Ok(ToolOutput::report(&CheckReport::new("internet exchange points", results)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_get_endpoints() {
        assert!(ca_endpoint_wants_get("Let's Encrypt OCSP"));
        assert!(ca_endpoint_wants_get("Entrust OCSP"));
        assert!(!ca_endpoint_wants_get("DigiCert OCSP"));
        assert!(!ca_endpoint_wants_get("unknown"));
    }

    #[tokio::test]
    async fn test_ca_endpoint_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/ocsp"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/crl"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let ok = check_ca_endpoint(Client::new(), Method::HEAD, format!("{}/ocsp", server.uri())).await;
        assert_eq!(ok, Ok(None));

        let err = check_ca_endpoint(Client::new(), Method::GET, format!("{}/crl", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err, "status code 404");
    }

    #[tokio::test]
    async fn test_ca_redirect_is_reachable() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(302))
            .mount(&server)
            .await;

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();
        let detail = check_ca_endpoint(client, Method::HEAD, server.uri()).await.unwrap();
        assert_eq!(detail.as_deref(), Some("redirected (302)"));
    }

    #[tokio::test]
    async fn test_ixp_sends_browser_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_regex("user-agent", "^Mozilla/5\\.0 "))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert_eq!(check_ixp(Client::new(), server.uri()).await, Ok(None));
    }

    #[tokio::test]
    async fn test_ixp_rejects_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = check_ixp(Client::new(), server.uri()).await.unwrap_err();
        assert_eq!(err, "status code 403");
    }
}
