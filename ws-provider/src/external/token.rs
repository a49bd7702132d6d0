//! Bearer tokens for EKS clusters.
//!
//! EKS accepts a presigned STS `GetCallerIdentity` URL as a bearer token.
//! The URL is signed with SigV4 query parameters and must include the
//! `x-k8s-aws-id` header naming the cluster.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use ws_core::{Result, WsError};

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_PREFIX: &str = "k8s-aws-v1.";
const CLUSTER_HEADER: &str = "x-k8s-aws-id";
const SIGNED_HEADERS: &str = "host;x-k8s-aws-id";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const EXPIRES_SECONDS: u32 = 60;

/// Signing identity for one request.
#[derive(Debug, Clone)]
pub struct SigningKeys<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub session_token: Option<&'a str>,
}

/// Build the bearer token for `cluster` in `region`, signed at `now`.
pub fn eks_token(cluster: &str, region: &str, keys: &SigningKeys<'_>, now: DateTime<Utc>) -> Result<String> {
    let url = presigned_url(cluster, region, keys, now)?;
    Ok(format!("{TOKEN_PREFIX}{}", URL_SAFE_NO_PAD.encode(url)))
}

fn presigned_url(cluster: &str, region: &str, keys: &SigningKeys<'_>, now: DateTime<Utc>) -> Result<String> {
    let host = format!("sts.{region}.amazonaws.com");
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let scope = format!("{date}/{region}/sts/aws4_request");

    let mut params = vec![
        ("Action".to_string(), "GetCallerIdentity".to_string()),
        ("Version".to_string(), "2011-06-15".to_string()),
        ("X-Amz-Algorithm".to_string(), ALGORITHM.to_string()),
        (
            "X-Amz-Credential".to_string(),
            format!("{}/{scope}", keys.access_key_id),
        ),
        ("X-Amz-Date".to_string(), amz_date.clone()),
        ("X-Amz-Expires".to_string(), EXPIRES_SECONDS.to_string()),
        ("X-Amz-SignedHeaders".to_string(), SIGNED_HEADERS.to_string()),
    ];
    if let Some(token) = keys.session_token {
        params.push(("X-Amz-Security-Token".to_string(), token.to_string()));
    }
    params.sort();

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let canonical_request = format!(
        "GET\n/\n{query}\nhost:{host}\n{CLUSTER_HEADER}:{cluster}\n\n{SIGNED_HEADERS}\n{}",
        hex(&Sha256::digest(b""))
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex(&Sha256::digest(canonical_request.as_bytes()))
    );

    let k_date = hmac(format!("AWS4{}", keys.secret_access_key).as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, b"sts")?;
    let k_signing = hmac(&k_service, b"aws4_request")?;
    let signature = hex(&hmac(&k_signing, string_to_sign.as_bytes())?);

    Ok(format!("https://{host}/?{query}&X-Amz-Signature={signature}"))
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| WsError::Internal(format!("Invalid signing key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// SigV4 encoding: everything except unreserved characters is percent-encoded.
fn uri_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn keys() -> SigningKeys<'static> {
        SigningKeys {
            access_key_id: "AKIDEXAMPLE",
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            session_token: Some("token/with+chars="),
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
    }

    fn decode(token: &str) -> String {
        let encoded = token.strip_prefix(TOKEN_PREFIX).unwrap();
        String::from_utf8(URL_SAFE_NO_PAD.decode(encoded).unwrap()).unwrap()
    }

    #[test]
    fn test_token_wraps_presigned_url() {
        let token = eks_token("tenant-eks", "eu-west-1", &keys(), at()).unwrap();
        assert!(token.starts_with(TOKEN_PREFIX));
        assert!(!token.contains('='));

        let url = decode(&token);
        assert!(url.starts_with("https://sts.eu-west-1.amazonaws.com/?Action=GetCallerIdentity&Version=2011-06-15&"));
        assert!(url.contains("X-Amz-Credential=AKIDEXAMPLE%2F20240301%2Feu-west-1%2Fsts%2Faws4_request"));
        assert!(url.contains("X-Amz-Date=20240301T123000Z"));
        assert!(url.contains("X-Amz-Expires=60"));
        assert!(url.contains("X-Amz-Security-Token=token%2Fwith%2Bchars%3D"));
        assert!(url.contains("X-Amz-SignedHeaders=host%3Bx-k8s-aws-id"));

        let signature = url.rsplit("X-Amz-Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_binds_cluster_and_time() {
        let a = eks_token("tenant-eks", "eu-west-1", &keys(), at()).unwrap();
        let again = eks_token("tenant-eks", "eu-west-1", &keys(), at()).unwrap();
        let other_cluster = eks_token("other-eks", "eu-west-1", &keys(), at()).unwrap();
        let later = eks_token("tenant-eks", "eu-west-1", &keys(), at() + chrono::Duration::seconds(1)).unwrap();

        assert_eq!(a, again);
        assert_ne!(a, other_cluster);
        assert_ne!(a, later);
    }

    #[test]
    fn test_without_session_token() {
        let keys = SigningKeys {
            session_token: None,
            ..keys()
        };
        let url = decode(&eks_token("c", "us-east-1", &keys, at()).unwrap());
        assert!(!url.contains("X-Amz-Security-Token"));
    }

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("a-b_c.d~e"), "a-b_c.d~e");
        assert_eq!(uri_encode("a/b c"), "a%2Fb%20c");
    }
}
