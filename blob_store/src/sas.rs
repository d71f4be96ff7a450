use anyhow::Result;
use artwork_utils::{encode_query_value, SharedKeySigner};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Storage service version the SAS string-to-sign layout follows.
pub const SAS_VERSION: &str = "2022-11-02";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SasPermissions {
    Read,
}

impl SasPermissions {
    pub fn as_str(&self) -> &'static str {
        match self {
            SasPermissions::Read => "r",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SasProtocol {
    HttpsAndHttp,
}

impl SasProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            SasProtocol::HttpsAndHttp => "https,http",
        }
    }
}

/// A blob URL carrying a service SAS.
#[derive(Debug, Clone, Serialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_on: DateTime<Utc>,
}

/// Parameters of a blob-scoped (`sr=b`) service SAS.
#[derive(Debug, Clone)]
pub struct BlobSas<'a> {
    pub container: &'a str,
    pub blob_name: &'a str,
    pub permissions: SasPermissions,
    pub protocol: SasProtocol,
    pub expires_on: DateTime<Utc>,
}

impl BlobSas<'_> {
    fn expiry(&self) -> String {
        self.expires_on.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub(crate) fn string_to_sign(&self, account: &str) -> String {
        let canonicalized_resource =
            format!("/blob/{}/{}/{}", account, self.container, self.blob_name);
        let expiry = self.expiry();
        // permissions, start, expiry, resource, identifier, ip, protocol,
        // version, resource type, snapshot time, encryption scope and the
        // five response header overrides.
        let fields: [&str; 16] = [
            self.permissions.as_str(),
            "",
            &expiry,
            &canonicalized_resource,
            "",
            "",
            self.protocol.as_str(),
            SAS_VERSION,
            "b",
            "",
            "",
            "",
            "",
            "",
            "",
            "",
        ];
        fields.join("\n")
    }

    /// Signs the parameters and renders the query string, without the
    /// leading `?`.
    pub fn to_query(&self, signer: &SharedKeySigner) -> Result<String> {
        let signature = signer.sign(&self.string_to_sign(signer.account()))?;
        let pairs = [
            ("sv", SAS_VERSION.to_string()),
            ("spr", self.protocol.as_str().to_string()),
            ("se", self.expiry()),
            ("sr", "b".to_string()),
            ("sp", self.permissions.as_str().to_string()),
            ("sig", signature),
        ];
        Ok(pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, encode_query_value(v)))
            .collect::<Vec<_>>()
            .join("&"))
    }
}
