use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Shared-key credential for a storage account.
///
/// Holds the decoded account key and produces base64 HMAC-SHA256 signatures
/// over canonical strings. Used both for SAS tokens and for SharedKeyLite
/// request authorization.
#[derive(Clone)]
pub struct SharedKeySigner {
    account: String,
    key: Vec<u8>,
}

impl std::fmt::Debug for SharedKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeySigner")
            .field("account", &self.account)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl SharedKeySigner {
    pub fn new(account: &str, base64_key: &str) -> Result<Self> {
        if account.is_empty() {
            return Err(anyhow!("storage account name is empty"));
        }
        let key = BASE64_STANDARD
            .decode(base64_key.trim())
            .context("invalid storage account key (not valid base64)")?;
        if key.is_empty() {
            return Err(anyhow!("storage account key is empty"));
        }
        Ok(Self {
            account: account.to_string(),
            key,
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn sign(&self, string_to_sign: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| anyhow!("HMAC key error: {}", e))?;
        mac.update(string_to_sign.as_bytes());
        Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
    }

    pub fn verify(&self, string_to_sign: &str, signature: &str) -> bool {
        let Ok(expected) = BASE64_STANDARD.decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.key) else {
            return false;
        };
        mac.update(string_to_sign.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}

/// The subset of an Azure storage connection string this service uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub blob_endpoint: Option<String>,
    pub table_endpoint: Option<String>,
    pub endpoint_suffix: Option<String>,
    pub protocol: Option<String>,
}

impl ConnectionString {
    pub fn parse(value: &str) -> Result<Self> {
        let mut parsed = ConnectionString::default();
        for part in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, val) = part
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed connection string segment: {}", part))?;
            let val = Some(val.to_string());
            match key {
                "AccountName" => parsed.account_name = val,
                "AccountKey" => parsed.account_key = val,
                "BlobEndpoint" => parsed.blob_endpoint = val,
                "TableEndpoint" => parsed.table_endpoint = val,
                "EndpointSuffix" => parsed.endpoint_suffix = val,
                "DefaultEndpointsProtocol" => parsed.protocol = val,
                _ => {}
            }
        }
        Ok(parsed)
    }

    /// Endpoint for `service` ("blob" or "table") derived from the account
    /// name when no explicit endpoint was given.
    pub fn derived_endpoint(&self, service: &str) -> Option<String> {
        let account = self.account_name.as_ref()?;
        let protocol = self.protocol.as_deref().unwrap_or("https");
        let suffix = self.endpoint_suffix.as_deref().unwrap_or("core.windows.net");
        Some(format!("{protocol}://{account}.{service}.{suffix}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "a2V5LWZvci10ZXN0aW5nLW9ubHk=";

    #[test]
    fn test_sign_is_deterministic_and_verifiable() -> Result<()> {
        let signer = SharedKeySigner::new("account", KEY)?;
        let sig = signer.sign("r\n\n2026-10-18T12:00:00Z")?;
        assert_eq!(sig, signer.sign("r\n\n2026-10-18T12:00:00Z")?);
        assert!(signer.verify("r\n\n2026-10-18T12:00:00Z", &sig));
        assert!(!signer.verify("w\n\n2026-10-18T12:00:00Z", &sig));
        assert!(!signer.verify("r\n\n2026-10-18T12:00:00Z", "not base64!"));
        Ok(())
    }

    #[test]
    fn test_rejects_bad_key() {
        assert!(SharedKeySigner::new("account", "%%%").is_err());
        assert!(SharedKeySigner::new("", KEY).is_err());
        assert!(SharedKeySigner::new("account", "").is_err());
    }

    #[test]
    fn test_debug_redacts_key() -> Result<()> {
        let signer = SharedKeySigner::new("account", KEY)?;
        let out = format!("{signer:?}");
        assert!(out.contains("account"));
        assert!(!out.contains(KEY));
        Ok(())
    }

    #[test]
    fn test_parse_connection_string() -> Result<()> {
        let cs = ConnectionString::parse(
            "DefaultEndpointsProtocol=https;AccountName=gallery;AccountKey=abc==;EndpointSuffix=core.windows.net",
        )?;
        assert_eq!(cs.account_name.as_deref(), Some("gallery"));
        assert_eq!(cs.account_key.as_deref(), Some("abc=="));
        assert_eq!(
            cs.derived_endpoint("blob").as_deref(),
            Some("https://gallery.blob.core.windows.net")
        );
        assert_eq!(
            cs.derived_endpoint("table").as_deref(),
            Some("https://gallery.table.core.windows.net")
        );
        Ok(())
    }

    #[test]
    fn test_parse_connection_string_with_explicit_endpoint() -> Result<()> {
        let cs = ConnectionString::parse(
            "AccountName=devstoreaccount1;AccountKey=k==;BlobEndpoint=http://127.0.0.1:10000/devstoreaccount1;",
        )?;
        assert_eq!(
            cs.blob_endpoint.as_deref(),
            Some("http://127.0.0.1:10000/devstoreaccount1")
        );
        assert!(cs.table_endpoint.is_none());
        assert!(ConnectionString::parse("AccountName").is_err());
        Ok(())
    }
}
