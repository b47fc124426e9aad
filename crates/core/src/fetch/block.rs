//! Response classification: CAPTCHA walls, edge-network blocks, proxy rejections.

use super::types::FetchResponse;

const CAPTCHA_KEYWORDS: &[&str] = &[
    "g-recaptcha",
    "h-captcha",
    "are you a robot",
    "人机验证",
    "验证码",
    "slide to verify",
];

/// Whether a response body looks like a CAPTCHA challenge.
pub fn is_captcha(body: &str) -> bool {
    if body.is_empty() {
        return false;
    }
    let lower = body.to_lowercase();
    CAPTCHA_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Whether an error response was served by an edge network that blocks
/// plain clients.
pub fn is_edge_block(response: &FetchResponse) -> bool {
    !response.is_success()
        && response
            .header("server")
            .map(|s| s.to_ascii_lowercase().contains("cloudflare"))
            .unwrap_or(false)
}

/// Statuses that indicate the proxy (not the target) rejected us.
pub fn is_proxy_rejection(status: u16) -> bool {
    matches!(status, 401 | 403 | 407)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, server: Option<&str>) -> FetchResponse {
        FetchResponse {
            engine: "test".to_string(),
            status,
            final_url: "https://example.com/".to_string(),
            headers: server
                .map(|s| vec![("Server".to_string(), s.to_string())])
                .unwrap_or_default(),
            body: String::new(),
        }
    }

    #[test]
    fn test_captcha_keywords() {
        assert!(is_captcha(r#"<div class="g-recaptcha"></div>"#));
        assert!(is_captcha("Are You A Robot?"));
        assert!(is_captcha("请完成人机验证"));
        assert!(is_captcha("Slide to verify"));
        assert!(!is_captcha("<html>plain page</html>"));
        assert!(!is_captcha(""));
    }

    #[test]
    fn test_edge_block() {
        assert!(is_edge_block(&response(403, Some("cloudflare"))));
        assert!(is_edge_block(&response(503, Some("CloudFlare-nginx"))));
        assert!(!is_edge_block(&response(200, Some("cloudflare"))));
        assert!(!is_edge_block(&response(403, Some("nginx"))));
        assert!(!is_edge_block(&response(403, None)));
    }

    #[test]
    fn test_proxy_rejection() {
        for status in [401, 403, 407] {
            assert!(is_proxy_rejection(status));
        }
        assert!(!is_proxy_rejection(404));
        assert!(!is_proxy_rejection(500));
    }
}
