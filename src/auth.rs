// Request identity extractors
// Authentication lives in the API gateway; by the time a request reaches
// this service the subject has been verified and forwarded as a header.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;

const COLLECTOR_HEADER: &str = "x-collector-id";
const STAFF_HEADER: &str = "x-staff-id";

/// Verified collector identity forwarded by the gateway
#[derive(Debug, Clone)]
pub struct CollectorAuth {
    pub collector_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for CollectorAuth
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match header_value(parts, COLLECTOR_HEADER) {
            Some(collector_id) => Ok(CollectorAuth { collector_id }),
            None => Err((
                StatusCode::UNAUTHORIZED,
                "Missing collector identity".to_string(),
            )),
        }
    }
}

/// Verified staff identity forwarded by the gateway
#[derive(Debug, Clone)]
pub struct StaffAuth {
    pub staff_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for StaffAuth
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match header_value(parts, STAFF_HEADER) {
            Some(staff_id) => Ok(StaffAuth { staff_id }),
            None => Err((
                StatusCode::UNAUTHORIZED,
                "Missing staff identity".to_string(),
            )),
        }
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
