//! Custom Axum extractors for request authentication.
//!
//! Provides:
//! - `SignedBody<T>` — verifies the `Gildex-Signature` header against a
//!   signed JSON body (Service API).
//! - `SignedUrl` — verifies the `Gildex-Signature` header against a signed
//!   request URL carried in the `Gildex-Signed-Url` header (Query API).
//! - `AdminAuth` — verifies the `Gildex-Admin-Authorization` header against
//!   the argon2-hashed admin secret (Admin API).
//!
//! All cryptographic operations are delegated to [`gildex_sdk::signature`].

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use gildex_sdk::signature::{
    self, ADMIN_AUTH_HEADER, SIGNATURE_HEADER, SIGNED_URL_HEADER, Signature, SignatureError,
    SignedObject,
};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// SignedBody — Service API authentication via signed JSON body
// ---------------------------------------------------------------------------

/// An Axum extractor that verifies the `Gildex-Signature` header and
/// deserializes + authenticates the JSON request body.
///
/// # Header format
///
/// ```text
/// Gildex-Signature: {unix_timestamp}.{base64_signature}
/// ```
///
/// The signature is computed as
/// `HMAC-SHA256("{timestamp}.{json_body}", service_secret)`.
pub struct SignedBody<T: Signature>(pub T);

/// Errors that can occur during signed-body verification.
#[derive(Debug, thiserror::Error)]
pub enum SignedBodyError {
    #[error("missing Gildex-Signature header")]
    MissingHeader,
    #[error("invalid Gildex-Signature header format")]
    InvalidHeader,
    #[error("invalid signature encoding")]
    InvalidBase64,
    #[error("failed to read request body")]
    BodyReadError,
    #[error("invalid JSON body: {0}")]
    JsonError(serde_json::Error),
    #[error("signature verification failed")]
    VerificationFailed,
}

impl From<SignatureError> for SignedBodyError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::InvalidFormat => Self::InvalidHeader,
            SignatureError::InvalidBase64 => Self::InvalidBase64,
            SignatureError::Json(e) => Self::JsonError(e),
            SignatureError::SignatureMismatch | SignatureError::Expired => Self::VerificationFailed,
        }
    }
}

impl IntoResponse for SignedBodyError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            SignedBodyError::MissingHeader => {
                (StatusCode::UNAUTHORIZED, "missing Gildex-Signature header")
            }
            SignedBodyError::InvalidHeader => (
                StatusCode::BAD_REQUEST,
                "invalid Gildex-Signature header format",
            ),
            SignedBodyError::InvalidBase64 => {
                (StatusCode::BAD_REQUEST, "invalid signature encoding")
            }
            SignedBodyError::BodyReadError => {
                (StatusCode::BAD_REQUEST, "failed to read request body")
            }
            SignedBodyError::JsonError(_) => (StatusCode::BAD_REQUEST, "invalid JSON body"),
            SignedBodyError::VerificationFailed => {
                (StatusCode::UNAUTHORIZED, "signature verification failed")
            }
        };
        (status, message).into_response()
    }
}

impl<T: Signature + Send> FromRequest<AppState> for SignedBody<T> {
    type Rejection = SignedBodyError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let header_value = req
            .headers()
            .get(SIGNATURE_HEADER)
            .ok_or(SignedBodyError::MissingHeader)?
            .to_str()
            .map_err(|_| SignedBodyError::InvalidHeader)?
            .to_owned();

        let body_bytes = axum::body::to_bytes(req.into_body(), 1024 * 1024)
            .await
            .map_err(|_| SignedBodyError::BodyReadError)?;

        let json =
            String::from_utf8(body_bytes.to_vec()).map_err(|_| SignedBodyError::BodyReadError)?;

        let signed = SignedObject::<T>::from_header_and_body(&header_value, json)?;

        let service = state.config.service.read().await;
        let verified_body = signed.verify(service.secret_bytes())?;
        drop(service);

        Ok(SignedBody(verified_body))
    }
}

// ---------------------------------------------------------------------------
// SignedUrl — Query API authentication via signed request URL
// ---------------------------------------------------------------------------

/// An Axum extractor that verifies the `Gildex-Signature` header against a
/// signed request URL from the `Gildex-Signed-Url` header.
///
/// # Header format
///
/// ```text
/// Gildex-Signature:  {unix_timestamp}.{base64_signature}
/// Gildex-Signed-Url: https://gildex.internal/api/v1/query/...
/// ```
///
/// The signature is computed as `HMAC-SHA256("{full_url}.{timestamp}",
/// service_secret)`. The signed URL must also address *this* request's
/// path, so a captured signature cannot be replayed against a different
/// endpoint.
///
/// Implements `FromRequestParts` so it can be combined with `Path<T>`,
/// `Query<T>`, etc.
pub struct SignedUrl;

/// Errors returned by the [`SignedUrl`] extractor.
#[derive(Debug)]
pub enum SignedUrlError {
    MissingSignature,
    MissingUrl,
    InvalidHeader,
    InvalidBase64,
    SignatureMismatch,
    TimestampTooOld,
    UrlMismatch,
}

impl From<SignatureError> for SignedUrlError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::InvalidFormat => Self::InvalidHeader,
            SignatureError::InvalidBase64 => Self::InvalidBase64,
            SignatureError::Json(_) => Self::InvalidHeader,
            SignatureError::SignatureMismatch => Self::SignatureMismatch,
            SignatureError::Expired => Self::TimestampTooOld,
        }
    }
}

impl IntoResponse for SignedUrlError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            SignedUrlError::MissingSignature => {
                (StatusCode::UNAUTHORIZED, "missing Gildex-Signature header")
            }
            SignedUrlError::MissingUrl => {
                (StatusCode::BAD_REQUEST, "missing Gildex-Signed-Url header")
            }
            SignedUrlError::InvalidHeader => (StatusCode::BAD_REQUEST, "invalid header format"),
            SignedUrlError::InvalidBase64 => {
                (StatusCode::BAD_REQUEST, "invalid signature encoding")
            }
            SignedUrlError::SignatureMismatch => {
                (StatusCode::UNAUTHORIZED, "signature verification failed")
            }
            SignedUrlError::TimestampTooOld => (StatusCode::UNAUTHORIZED, "signature expired"),
            SignedUrlError::UrlMismatch => {
                (StatusCode::UNAUTHORIZED, "signed URL does not match request")
            }
        };
        (status, message).into_response()
    }
}

impl FromRequestParts<AppState> for SignedUrl {
    type Rejection = SignedUrlError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let sig_value = parts
            .headers
            .get(SIGNATURE_HEADER)
            .ok_or(SignedUrlError::MissingSignature)?
            .to_str()
            .map_err(|_| SignedUrlError::InvalidHeader)?;

        let (timestamp, signature_bytes) = signature::parse_signature_header(sig_value)?;

        let signed_url = parts
            .headers
            .get(SIGNED_URL_HEADER)
            .ok_or(SignedUrlError::MissingUrl)?
            .to_str()
            .map_err(|_| SignedUrlError::InvalidHeader)?;

        let service = state.config.service.read().await;
        signature::verify_url(
            signed_url,
            timestamp,
            &signature_bytes,
            service.secret_bytes(),
        )?;
        drop(service);

        let request_target = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| parts.uri.path());
        if !signed_url.ends_with(request_target) {
            return Err(SignedUrlError::UrlMismatch);
        }

        Ok(SignedUrl)
    }
}

// ---------------------------------------------------------------------------
// AdminAuth — Admin API authentication via hashed secret
// ---------------------------------------------------------------------------

/// An Axum extractor that verifies the plaintext admin secret in the
/// `Gildex-Admin-Authorization` header against the stored argon2 hash.
pub struct AdminAuth;

/// Errors returned by the [`AdminAuth`] extractor.
#[derive(Debug)]
pub enum AdminAuthError {
    MissingHeader,
    InvalidHeader,
    Unauthorized,
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AdminAuthError::MissingHeader => (
                StatusCode::UNAUTHORIZED,
                "missing Gildex-Admin-Authorization header",
            ),
            AdminAuthError::InvalidHeader => (StatusCode::BAD_REQUEST, "invalid header format"),
            AdminAuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "invalid admin secret"),
        };
        (status, message).into_response()
    }
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AdminAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let secret = parts
            .headers
            .get(ADMIN_AUTH_HEADER)
            .ok_or(AdminAuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AdminAuthError::InvalidHeader)?;

        let admin = state.config.admin.read().await;
        if !admin.verify(secret) {
            return Err(AdminAuthError::Unauthorized);
        }
        drop(admin);

        Ok(AdminAuth)
    }
}
