use crate::telemetry::RequestId;
use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

/// Header name for the request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Reads `x-request-id` (or mints one), exposes it to handlers and echoes it back.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let (request_id, header_value) = match request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| HeaderValue::from_str(v).ok().map(|hv| (RequestId::new(v), hv)))
    {
        Some(pair) => pair,
        None => {
            let minted = RequestId::default();
            // uuid strings are always valid header values
            let value = HeaderValue::from_str(minted.as_str())
                .unwrap_or_else(|_| HeaderValue::from_static("invalid"));
            (minted, value)
        }
    };

    request.headers_mut().insert(
        HeaderName::from_static(REQUEST_ID_HEADER),
        header_value.clone(),
    );
    request.extensions_mut().insert(request_id.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id.as_str(),
        method = %request.method(),
        uri = %request.uri(),
    );
    let mut response = crate::telemetry::scope_request_id(
        request_id,
        async move { next.run(request).await }.instrument(span),
    )
    .await;

    response
        .headers_mut()
        .insert(HeaderName::from_static(REQUEST_ID_HEADER), header_value);

    response
}
