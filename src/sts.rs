use crate::types::Credentials;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sts::Client as StsClient;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_runtime_api::http::Response;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_REGION: &str = "us-east-1";

/// Federation tokens are scoped down to the intersection of the user's
/// permissions and this policy.
const ALLOW_ALL_POLICY: &str =
    r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":"*","Resource":"*"}]}"#;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{operation} failed: {message}")]
    Sdk {
        operation: &'static str,
        message: String,
    },
    #[error("{operation} returned no credentials")]
    MissingCredentials { operation: &'static str },
    #[error("GetCallerIdentity returned no ARN")]
    MissingArn,
}

fn sdk_error<E>(operation: &'static str, err: SdkError<E, Response>) -> ServiceError
where
    E: std::error::Error + 'static,
{
    ServiceError::Sdk {
        operation,
        message: aws_sdk_sts::error::DisplayErrorContext(err).to_string(),
    }
}

/// Authentication material for one call to the identity service.
#[derive(Debug, Clone)]
pub struct Caller {
    pub credentials: Credentials,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokenInput {
    pub duration: Duration,
    pub mfa_serial: Option<String>,
    pub mfa_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleInput {
    pub role_arn: String,
    pub role_session_name: String,
    pub external_id: Option<String>,
    pub duration: Duration,
    pub mfa_serial: Option<String>,
    pub mfa_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederationTokenInput {
    pub name: String,
    pub duration: Duration,
}

/// The temporary-credential issuing service.
#[allow(async_fn_in_trait)]
pub trait IdentityService {
    async fn get_session_token(
        &self,
        caller: &Caller,
        input: &SessionTokenInput,
    ) -> Result<Credentials, ServiceError>;

    async fn assume_role(
        &self,
        caller: &Caller,
        input: &AssumeRoleInput,
    ) -> Result<Credentials, ServiceError>;

    async fn get_federation_token(
        &self,
        caller: &Caller,
        input: &FederationTokenInput,
    ) -> Result<Credentials, ServiceError>;

    /// Returns the ARN of the identity behind `caller`.
    async fn get_caller_identity(&self, caller: &Caller) -> Result<String, ServiceError>;
}

/// [`IdentityService`] backed by AWS STS. A client is built per call because
/// every hop of a chain authenticates with different credentials.
#[derive(Debug, Default)]
pub struct StsService;

impl StsService {
    fn client(caller: &Caller) -> StsClient {
        let region = caller
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let config = aws_sdk_sts::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(aws_sdk_sts::config::Credentials::from(
                caller.credentials.clone(),
            ))
            .build();
        StsClient::from_conf(config)
    }
}

fn duration_seconds(duration: Duration) -> i32 {
    i32::try_from(duration.as_secs()).unwrap_or(i32::MAX)
}

impl IdentityService for StsService {
    async fn get_session_token(
        &self,
        caller: &Caller,
        input: &SessionTokenInput,
    ) -> Result<Credentials, ServiceError> {
        const OPERATION: &str = "GetSessionToken";
        debug!(duration = ?input.duration, mfa = input.mfa_serial.is_some(), "calling {}", OPERATION);
        Self::client(caller)
            .get_session_token()
            .duration_seconds(duration_seconds(input.duration))
            .set_serial_number(input.mfa_serial.clone())
            .set_token_code(input.mfa_token.clone())
            .send()
            .await
            .map_err(|err| sdk_error(OPERATION, err))?
            .credentials
            .map(Credentials::from)
            .ok_or(ServiceError::MissingCredentials {
                operation: OPERATION,
            })
    }

    async fn assume_role(
        &self,
        caller: &Caller,
        input: &AssumeRoleInput,
    ) -> Result<Credentials, ServiceError> {
        const OPERATION: &str = "AssumeRole";
        debug!(role_arn = %input.role_arn, session_name = %input.role_session_name, "calling {}", OPERATION);
        Self::client(caller)
            .assume_role()
            .role_arn(&input.role_arn)
            .role_session_name(&input.role_session_name)
            .duration_seconds(duration_seconds(input.duration))
            .set_external_id(input.external_id.clone())
            .set_serial_number(input.mfa_serial.clone())
            .set_token_code(input.mfa_token.clone())
            .send()
            .await
            .map_err(|err| sdk_error(OPERATION, err))?
            .credentials
            .map(Credentials::from)
            .ok_or(ServiceError::MissingCredentials {
                operation: OPERATION,
            })
    }

    async fn get_federation_token(
        &self,
        caller: &Caller,
        input: &FederationTokenInput,
    ) -> Result<Credentials, ServiceError> {
        const OPERATION: &str = "GetFederationToken";
        debug!(name = %input.name, "calling {}", OPERATION);
        Self::client(caller)
            .get_federation_token()
            .name(&input.name)
            .duration_seconds(duration_seconds(input.duration))
            .policy(ALLOW_ALL_POLICY)
            .send()
            .await
            .map_err(|err| sdk_error(OPERATION, err))?
            .credentials
            .map(Credentials::from)
            .ok_or(ServiceError::MissingCredentials {
                operation: OPERATION,
            })
    }

    async fn get_caller_identity(&self, caller: &Caller) -> Result<String, ServiceError> {
        Self::client(caller)
            .get_caller_identity()
            .send()
            .await
            .map_err(|err| sdk_error("GetCallerIdentity", err))?
            .arn
            .ok_or(ServiceError::MissingArn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_seconds_saturates() {
        assert_eq!(duration_seconds(Duration::from_secs(900)), 900);
        assert_eq!(duration_seconds(Duration::from_secs(u64::MAX)), i32::MAX);
    }

    #[test]
    fn test_error_names_operation() {
        let err = ServiceError::MissingCredentials {
            operation: "AssumeRole",
        };
        assert_eq!(err.to_string(), "AssumeRole returned no credentials");
    }
}
