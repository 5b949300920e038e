//! Azure Key Vault certificate discovery (`cloud-azure` feature).
//!
//! Talks to the Key Vault REST API with a bearer token from
//! `AZURE_ACCESS_TOKEN`. Vault entries carry full DER material, so these
//! findings get the same field depth as probed endpoints.

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;

use trustwatch_core::{CertFinding, Discoverer, DiscoveryOutcome, SourceKind};

const TOKEN_ENV: &str = "AZURE_ACCESS_TOKEN";
const API_VERSION: &str = "7.4";

/// Lists certificates in one Key Vault.
pub struct KeyVaultDiscoverer {
    vault_url: String,
    client: reqwest::Client,
}

impl KeyVaultDiscoverer {
    /// Construct for a vault base URL (`https://myvault.vault.azure.net`).
    #[must_use]
    pub fn new(vault_url: String) -> Self {
        Self {
            vault_url: vault_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CertificateListPage {
    #[serde(default)]
    value: Vec<CertificateItem>,
    #[serde(default, rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CertificateItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CertificateBundle {
    #[serde(default)]
    cer: Option<String>,
}

#[async_trait]
impl Discoverer for KeyVaultDiscoverer {
    fn name(&self) -> &str {
        "cloud.azure.keyvault"
    }

    async fn discover(&self) -> DiscoveryOutcome {
        let Ok(token) = std::env::var(TOKEN_ENV) else {
            return DiscoveryOutcome::fail(format!("{TOKEN_ENV} is not set"));
        };

        let mut findings = Vec::new();
        let mut url = format!("{}/certificates?api-version={API_VERSION}", self.vault_url);
        loop {
            let response = match self.client.get(&url).bearer_auth(&token).send().await {
                Ok(r) => r,
                Err(e) => return DiscoveryOutcome::partial(findings, format!("list: {e}")),
            };
            if !response.status().is_success() {
                return DiscoveryOutcome::partial(
                    findings,
                    format!("list: HTTP {}", response.status()),
                );
            }
            let page: CertificateListPage = match response.json().await {
                Ok(p) => p,
                Err(e) => return DiscoveryOutcome::partial(findings, format!("decode: {e}")),
            };

            for item in &page.value {
                findings.push(self.fetch_certificate(&token, &item.id).await);
            }
            match page.next_link {
                Some(next) => url = next,
                None => break,
            }
        }
        DiscoveryOutcome::ok(findings)
    }
}

impl KeyVaultDiscoverer {
    async fn fetch_certificate(&self, token: &str, id: &str) -> CertFinding {
        let name = id.rsplit('/').next().unwrap_or(id);
        let mut f = CertFinding::new(SourceKind::CloudAzureKeyVault, name);
        f.notes = format!("vault={}", self.vault_url);

        let url = format!("{id}?api-version={API_VERSION}");
        let bundle: Result<CertificateBundle, String> = async {
            let response = self
                .client
                .get(&url)
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            if !response.status().is_success() {
                return Err(format!("HTTP {}", response.status()));
            }
            response.json().await.map_err(|e| e.to_string())
        }
        .await;

        match bundle {
            Ok(CertificateBundle { cer: Some(cer) }) => {
                match base64::engine::general_purpose::STANDARD
                    .decode(cer.as_bytes())
                    .map_err(|e| e.to_string())
                    .and_then(|der| {
                        trustwatch_probe::cert::report_from_chain(vec![der])
                            .map_err(|e| e.to_string())
                    }) {
                    Ok(report) => report.apply_to(&mut f),
                    Err(e) => f.probe_err = format!("decode cer: {e}"),
                }
            }
            Ok(CertificateBundle { cer: None }) => {
                f.probe_err = "bundle has no cer field".to_string();
            }
            Err(e) => f.probe_err = format!("fetch {name}: {e}"),
        }
        f
    }
}
