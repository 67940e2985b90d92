use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::keys::SecretHex;

/// Parameters a covenant claimer needs to sweep a reverse swap without the wallet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CovenantClaim {
    pub address: String,
    pub preimage: SecretHex,
    pub tree: Value,
    pub blinding_key: String,
    pub claim_public_key: String,
    pub refund_public_key: String,
}

#[async_trait]
pub trait CovenantRegistrar: Send + Sync {
    async fn register(&self, claim: &CovenantClaim) -> Result<()>;
}

pub struct HttpCovenantRegistrar {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCovenantRegistrar {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CovenantRegistrar for HttpCovenantRegistrar {
    async fn register(&self, claim: &CovenantClaim) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/covenant", self.base_url))
            .json(claim)
            .send()
            .await
            .context("POST /covenant")?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::ensure!(status.is_success(), "covenant registration returned {status}: {body}");

        tracing::info!(address = %claim.address, response = %body, "registered covenant");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_body_uses_camel_case_hex_fields() {
        let claim = CovenantClaim {
            address: "lq1qqdest".to_string(),
            preimage: SecretHex::from_bytes(&[0xab; 32]),
            tree: serde_json::json!({"claimLeaf": {"version": 196}}),
            blinding_key: "blind".to_string(),
            claim_public_key: "02aa".to_string(),
            refund_public_key: "03bb".to_string(),
        };

        let body = serde_json::to_value(&claim).expect("encode");
        assert_eq!(body["preimage"], "ab".repeat(32));
        assert_eq!(body["blindingKey"], "blind");
        assert_eq!(body["refundPublicKey"], "03bb");
        assert!(!format!("{claim:?}").contains(&"ab".repeat(32)));
    }
}
