use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    http::header,
    Error, HttpMessage,
};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

/// Paths served without a token
const PUBLIC_PATHS: &[&str] = &["/health", "/metrics"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account email; the actor identity for every authorization check
    pub sub: String,
    /// "admin", "rider" or "merchant"
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Pluggable bearer-credential verifier. The middleware trusts whatever
/// identity the verifier yields; handlers never see the raw token.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Claims, Error>;
}

/// HS256 JWT verifier backed by `jsonwebtoken`
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        JwtVerifier {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Claims, Error> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::warn!("JWT validation failed: {:?}", err);
                ErrorUnauthorized("Invalid or expired token")
            })
    }
}

pub struct JwtAuth {
    verifier: Arc<dyn TokenVerifier>,
}

impl JwtAuth {
    /// Guard with the default HS256 JWT verifier
    pub fn new(secret: String) -> Self {
        Self::with_verifier(Arc::new(JwtVerifier::new(&secret)))
    }

    /// Guard with a caller-supplied verifier
    pub fn with_verifier(verifier: Arc<dyn TokenVerifier>) -> Self {
        JwtAuth { verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddleware {
            service: Rc::new(service),
            verifier: self.verifier.clone(),
        }))
    }
}

pub struct JwtAuthMiddleware<S> {
    service: Rc<S>,
    verifier: Arc<dyn TokenVerifier>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if PUBLIC_PATHS.contains(&req.path()) {
            return Box::pin(self.service.call(req));
        }

        let verified = bearer_token(&req).and_then(|token| self.verifier.verify(token));

        match verified {
            Ok(claims) => {
                // Make the actor identity available to handlers
                req.extensions_mut().insert(claims);
                Box::pin(self.service.call(req))
            }
            Err(err) => Box::pin(ready(Err(err))),
        }
    }
}

/// Pull the bearer token out of the Authorization header
fn bearer_token(req: &ServiceRequest) -> Result<&str, Error> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ErrorUnauthorized("Missing Authorization header"))?;

    value
        .to_str()
        .ok()
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or_else(|| ErrorUnauthorized("Invalid auth header format"))
}
