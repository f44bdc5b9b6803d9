use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use std::env;
use std::sync::OnceLock;

const NOSNIFF: &str = "nosniff";
const DENY: &str = "DENY";
const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains";
const CSP_API_VALUE: &str = "default-src 'none'; frame-ancestors 'none'";
const REFERRER_POLICY_VALUE: &str = "strict-origin-when-cross-origin";

static INCLUDE_HSTS: OnceLock<bool> = OnceLock::new();

fn include_hsts() -> bool {
    *INCLUDE_HSTS.get_or_init(|| {
        let is_production = env::var("RUST_ENV")
            .map(|v| v.to_lowercase() == "production")
            .unwrap_or(false);

        if is_production {
            tracing::info!("Security: HSTS header enabled (production mode)");
        } else {
            tracing::info!("Security: HSTS header disabled (development mode)");
        }

        is_production
    })
}

/// Adds the standard API hardening headers to every response. HSTS is only
/// emitted in production, where the service is assumed to sit behind TLS.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("x-content-type-options", HeaderValue::from_static(NOSNIFF));
    headers.insert("x-frame-options", HeaderValue::from_static(DENY));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static(CSP_API_VALUE),
    );
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static(REFERRER_POLICY_VALUE),
    );

    if include_hsts() {
        headers.insert(
            "strict-transport-security",
            HeaderValue::from_static(HSTS_VALUE),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_values_are_valid() {
        for value in [NOSNIFF, DENY, HSTS_VALUE, CSP_API_VALUE, REFERRER_POLICY_VALUE] {
            assert!(HeaderValue::from_str(value).is_ok());
        }
    }

    #[test]
    fn test_hsts_disabled_outside_production() {
        std::env::remove_var("RUST_ENV");
        assert!(!include_hsts());
    }
}
