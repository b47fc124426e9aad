//! Browser-consistent request headers.
//!
//! Client hints (`Sec-CH-UA*`) must agree with the user agent string, or the
//! request is trivially flagged. The platform and mobile flag are inferred from
//! the UA, and the Chrome major version is reused in the brand list.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex_lite::Regex;

static CHROME_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"chrome/(\d+)").expect("valid chrome version regex"));

const DEFAULT_CHROME_VERSION: &str = "120";

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9";

/// Platform inferred from a user agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Android,
    Ios,
}

impl Platform {
    /// Value used in `Sec-CH-UA-Platform` (without quotes).
    pub fn hint(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::MacOs => "macOS",
            Platform::Linux => "Linux",
            Platform::Android => "Android",
            Platform::Ios => "iOS",
        }
    }

    pub fn is_mobile(&self) -> bool {
        matches!(self, Platform::Android | Platform::Ios)
    }
}

/// Infer the platform from a user agent string.
pub fn detect_platform(user_agent: &str) -> Platform {
    let ua = user_agent.to_lowercase();
    if ua.contains("macintosh") || ua.contains("mac os x") {
        // iPhone UAs also say "like Mac OS X"
        if ua.contains("iphone") || ua.contains("ipad") {
            return Platform::Ios;
        }
        Platform::MacOs
    } else if ua.contains("android") {
        Platform::Android
    } else if ua.contains("linux") {
        Platform::Linux
    } else if ua.contains("iphone") || ua.contains("ipad") {
        Platform::Ios
    } else {
        Platform::Windows
    }
}

/// Extract the Chrome major version, defaulting to "120".
pub fn extract_chrome_version(user_agent: &str) -> String {
    let ua = user_agent.to_lowercase();
    CHROME_VERSION
        .captures(&ua)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_CHROME_VERSION.to_string())
}

/// Build the header set for a user agent.
///
/// `previous_url` switches `Sec-Fetch-Site` to `same-origin` and adds a
/// `Referer`. `extra` entries replace same-named defaults (case-insensitive)
/// or are appended.
pub fn consistent_headers<R: Rng + ?Sized>(
    rng: &mut R,
    user_agent: &str,
    accept_language: &str,
    previous_url: Option<&str>,
    extra: &[(String, String)],
) -> Vec<(String, String)> {
    let platform = detect_platform(user_agent);
    let version = extract_chrome_version(user_agent);

    let mut brands = [
        ("Not/A)Brand".to_string(), "99".to_string()),
        ("Google Chrome".to_string(), version.clone()),
        ("Chromium".to_string(), version),
    ];
    brands.shuffle(rng);
    let sec_ch_ua = brands
        .iter()
        .map(|(brand, v)| format!("\"{}\";v=\"{}\"", brand, v))
        .collect::<Vec<_>>()
        .join(", ");

    let mut headers: Vec<(String, String)> = vec![
        ("User-Agent".into(), user_agent.to_string()),
        ("Accept".into(), ACCEPT.to_string()),
        ("Accept-Language".into(), accept_language.to_string()),
        ("Accept-Encoding".into(), "gzip, deflate, br".into()),
        ("Connection".into(), "keep-alive".into()),
        ("Upgrade-Insecure-Requests".into(), "1".into()),
        ("Sec-CH-UA".into(), sec_ch_ua),
        (
            "Sec-CH-UA-Mobile".into(),
            if platform.is_mobile() { "?1" } else { "?0" }.into(),
        ),
        (
            "Sec-CH-UA-Platform".into(),
            format!("\"{}\"", platform.hint()),
        ),
        ("Sec-Fetch-Dest".into(), "document".into()),
        ("Sec-Fetch-Mode".into(), "navigate".into()),
        (
            "Sec-Fetch-Site".into(),
            if previous_url.is_some() {
                "same-origin"
            } else {
                "cross-site"
            }
            .into(),
        ),
        ("Sec-Fetch-User".into(), "?1".into()),
    ];

    if let Some(referer) = previous_url {
        headers.push(("Referer".into(), referer.to_string()));
    }

    for (name, value) in extra {
        match headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(existing) => existing.1 = value.clone(),
            None => headers.push((name.clone(), value.clone())),
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIN_CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";
    const ANDROID_CHROME: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.6167.101 Mobile Safari/537.36";
    const IPHONE_SAFARI: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1";
    const MAC_FIREFOX: &str =
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.2; rv:121.0) Gecko/20100101 Firefox/121.0";

    fn get<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_detect_platform() {
        assert_eq!(detect_platform(WIN_CHROME), Platform::Windows);
        assert_eq!(detect_platform(ANDROID_CHROME), Platform::Android);
        assert_eq!(detect_platform(IPHONE_SAFARI), Platform::Ios);
        assert_eq!(detect_platform(MAC_FIREFOX), Platform::MacOs);
        assert_eq!(
            detect_platform("Mozilla/5.0 (X11; Linux x86_64) Chrome/120.0"),
            Platform::Linux
        );
    }

    #[test]
    fn test_extract_chrome_version() {
        assert_eq!(extract_chrome_version(WIN_CHROME), "118");
        assert_eq!(extract_chrome_version(ANDROID_CHROME), "121");
        assert_eq!(extract_chrome_version(MAC_FIREFOX), "120");
    }

    #[test]
    fn test_client_hints_match_user_agent() {
        let mut rng = rand::thread_rng();
        let headers = consistent_headers(&mut rng, ANDROID_CHROME, "en", None, &[]);

        assert_eq!(get(&headers, "Sec-CH-UA-Mobile"), Some("?1"));
        assert_eq!(get(&headers, "Sec-CH-UA-Platform"), Some("\"Android\""));
        let brands = get(&headers, "Sec-CH-UA").unwrap();
        assert!(brands.contains("\"Google Chrome\";v=\"121\""));
        assert!(brands.contains("\"Chromium\";v=\"121\""));
        assert!(brands.contains("\"Not/A)Brand\";v=\"99\""));
    }

    #[test]
    fn test_referer_and_fetch_site() {
        let mut rng = rand::thread_rng();
        let without = consistent_headers(&mut rng, WIN_CHROME, "en", None, &[]);
        assert_eq!(get(&without, "Sec-Fetch-Site"), Some("cross-site"));
        assert_eq!(get(&without, "Referer"), None);

        let with = consistent_headers(
            &mut rng,
            WIN_CHROME,
            "en",
            Some("https://example.com/page"),
            &[],
        );
        assert_eq!(get(&with, "Sec-Fetch-Site"), Some("same-origin"));
        assert_eq!(get(&with, "Referer"), Some("https://example.com/page"));
    }

    #[test]
    fn test_extra_headers_override_case_insensitively() {
        let mut rng = rand::thread_rng();
        let extra = vec![
            ("accept".to_string(), "application/json".to_string()),
            ("X-Task-ID".to_string(), "Task-001".to_string()),
        ];
        let headers = consistent_headers(&mut rng, WIN_CHROME, "en", None, &extra);

        assert_eq!(get(&headers, "Accept"), Some("application/json"));
        assert_eq!(get(&headers, "X-Task-ID"), Some("Task-001"));
        let accept_count = headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("accept"))
            .count();
        assert_eq!(accept_count, 1);
    }
}
