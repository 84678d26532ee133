// Request boundary: correlation-id propagation and origin policy.
//
// Every response carries a correlation id (the caller's, or a fresh one) so
// audit entries and logs line up across retries. Browser origins are
// checked against the configured allow-list; preflights are answered here,
// and responses to allowed origins get the CORS headers attached.

use std::{rc::Rc, sync::Arc};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{
        header::{HeaderName, HeaderValue},
        Method,
    },
    Error, HttpResponse,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use pyre_common::{api::CORRELATION_ID_HEADER, utils::random_id};

pub struct RequestBoundary {
    allowed_origins: Arc<Vec<String>>,
}

impl RequestBoundary {
    pub fn new(allowed_origins: Arc<Vec<String>>) -> Self {
        Self { allowed_origins }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestBoundary
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = BoundaryMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BoundaryMiddleware {
            service: Rc::new(service),
            allowed_origins: Arc::clone(&self.allowed_origins),
        }))
    }
}

pub struct BoundaryMiddleware<S> {
    service: Rc<S>,
    allowed_origins: Arc<Vec<String>>,
}

fn cors_headers(origin: &str) -> [(HeaderName, HeaderValue); 3] {
    [
        (
            HeaderName::from_static("access-control-allow-origin"),
            HeaderValue::from_str(origin).unwrap_or(HeaderValue::from_static("null")),
        ),
        (
            HeaderName::from_static("access-control-allow-methods"),
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ),
        (
            HeaderName::from_static("access-control-allow-headers"),
            HeaderValue::from_static("content-type, x-correlation-id, x-admin-key"),
        ),
    ]
}

impl<S, B> Service<ServiceRequest> for BoundaryMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let allowed = Arc::clone(&self.allowed_origins);

        Box::pin(async move {
            let correlation_id = req
                .headers()
                .get(CORRELATION_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty() && value.len() <= 64)
                .map(str::to_string)
                .unwrap_or_else(random_id);
            let origin = req
                .headers()
                .get("origin")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            // An empty allow-list only happens in development, where any
            // origin may talk to the relay
            let origin_allowed = origin
                .as_deref()
                .map(|origin| allowed.is_empty() || allowed.iter().any(|a| a == origin))
                .unwrap_or(false);

            if req.method() == Method::OPTIONS {
                let mut response = if origin_allowed {
                    let mut builder = HttpResponse::NoContent();
                    for (name, value) in cors_headers(origin.as_deref().unwrap_or("")) {
                        builder.insert_header((name, value));
                    }
                    builder.finish()
                } else {
                    HttpResponse::Forbidden().finish()
                };
                response.headers_mut().insert(
                    HeaderName::from_static(CORRELATION_ID_HEADER),
                    HeaderValue::from_str(&correlation_id)
                        .unwrap_or(HeaderValue::from_static("invalid")),
                );
                return Ok(req.into_response(response).map_into_right_body());
            }

            let mut response = service.call(req).await?.map_into_left_body();
            response.headers_mut().insert(
                HeaderName::from_static(CORRELATION_ID_HEADER),
                HeaderValue::from_str(&correlation_id)
                    .unwrap_or(HeaderValue::from_static("invalid")),
            );
            if origin_allowed {
                for (name, value) in cors_headers(origin.as_deref().unwrap_or("")) {
                    response.headers_mut().insert(name, value);
                }
            }
            Ok(response)
        })
    }
}
