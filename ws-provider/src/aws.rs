//! Short-lived sessions in pay model accounts.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_sts::error::DisplayErrorContext;
use tracing::{debug, instrument};
use ws_core::{Result, WsError};

/// Region used when a pay model does not name one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Session lifetime requested from STS, in seconds.
const SESSION_SECONDS: i32 = 900;

/// Credentials and SDK configuration for one assumed role.
#[derive(Debug, Clone)]
pub struct AssumedSession {
    pub config: SdkConfig,
    pub credentials: Credentials,
    pub region: String,
}

/// Assumes roles in pay model accounts using the process's own identity.
#[derive(Debug, Clone)]
pub struct AwsSessions {
    base: SdkConfig,
}

impl AwsSessions {
    /// Load the launcher's own credentials from the default provider chain.
    pub async fn from_env() -> Self {
        let base = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self { base }
    }

    pub fn role_arn(account_id: &str, role_name: &str) -> String {
        format!("arn:aws:iam::{account_id}:role/{role_name}")
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn assume(&self, account_id: &str, region: &str, role_name: &str) -> Result<AssumedSession> {
        if account_id.trim().is_empty() {
            return Err(WsError::Aws("Pay model has no account id".into()));
        }
        let region = if region.trim().is_empty() {
            DEFAULT_REGION
        } else {
            region
        };
        let arn = Self::role_arn(account_id, role_name);

        let sts = aws_sdk_sts::Client::new(&self.base);
        let out = sts
            .assume_role()
            .role_arn(&arn)
            .role_session_name("ws-launcher")
            .duration_seconds(SESSION_SECONDS)
            .send()
            .await
            .map_err(|e| WsError::Aws(format!("Failed to assume {arn}: {}", DisplayErrorContext(&e))))?;

        let creds = out
            .credentials()
            .ok_or_else(|| WsError::Aws(format!("STS returned no credentials for {arn}")))?;
        let credentials = Credentials::new(
            creds.access_key_id(),
            creds.secret_access_key(),
            Some(creds.session_token().to_string()),
            None,
            "ws-assumed-role",
        );
        debug!(role = %arn, "Assumed role");

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials.clone())
            .load()
            .await;

        Ok(AssumedSession {
            config,
            credentials,
            region: region.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_arn() {
        assert_eq!(
            AwsSessions::role_arn("123456789012", "workspace-launcher"),
            "arn:aws:iam::123456789012:role/workspace-launcher"
        );
    }
}
