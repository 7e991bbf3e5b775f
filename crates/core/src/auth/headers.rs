//! Identity headers set by the upstream session layer.

use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};
use crate::ticket::Role;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Authenticator that trusts the identity headers of the request.
///
/// Only deploy behind a gateway that strips these headers from client
/// traffic and sets them after authenticating the session.
#[derive(Debug, Default)]
pub struct TrustedHeaderAuthenticator;

impl TrustedHeaderAuthenticator {
    pub fn new() -> Self {
        Self
    }

    /// Read the identity headers, reporting the given method name.
    pub(crate) fn identity_from_headers(
        request: &AuthRequest,
        method: &str,
    ) -> Result<Identity, AuthError> {
        let user_id = request
            .header(USER_ID_HEADER)
            .ok_or(AuthError::NotAuthenticated)?;
        let role = request
            .header(USER_ROLE_HEADER)
            .ok_or(AuthError::NotAuthenticated)?
            .parse::<Role>()
            .map_err(AuthError::InvalidCredentials)?;

        Ok(Identity {
            user_id: user_id.to_string(),
            role,
            name: request.header(USER_NAME_HEADER).map(str::to_string),
            email: request.header(USER_EMAIL_HEADER).map(str::to_string),
            method: method.to_string(),
        })
    }
}

#[async_trait]
impl Authenticator for TrustedHeaderAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        Self::identity_from_headers(request, self.method_name())
    }

    fn method_name(&self) -> &'static str {
        "trusted_headers"
    }
}
