//! Client details read off incoming requests.

use actix_web::HttpRequest;

/// Proxy headers that carry the originating client address, most trusted first
const CLIENT_IP_HEADERS: [&str; 3] = ["X-Forwarded-For", "X-Real-IP", "CF-Connecting-IP"];

/// Address of the socket peer, without the port.
pub fn peer_ip(req: &HttpRequest) -> String {
    req.connection_info()
        .peer_addr()
        .unwrap_or("unknown")
        .to_string()
}

/// First address of the first proxy header present.
///
/// These headers are client-controlled unless a proxy in front of the
/// service overwrites them.
pub fn forwarded_ip(req: &HttpRequest) -> Option<String> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        req.headers()
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
    })
}

/// Client IP for request logs: the forwarded address if any, else the peer.
pub fn extract_client_ip(req: &HttpRequest) -> String {
    forwarded_ip(req).unwrap_or_else(|| peer_ip(req))
}

pub fn extract_user_agent(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("User-Agent")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_first_forwarded_address_wins() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .insert_header(("X-Real-IP", "198.51.100.2"))
            .to_http_request();

        assert_eq!(forwarded_ip(&req).as_deref(), Some("203.0.113.7"));
        assert_eq!(extract_client_ip(&req), "203.0.113.7");
    }

    #[test]
    fn test_blank_header_falls_through() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", " "))
            .insert_header(("X-Real-IP", "198.51.100.2"))
            .to_http_request();

        assert_eq!(extract_client_ip(&req), "198.51.100.2");
    }

    #[test]
    fn test_peer_address_fallback() {
        let req = TestRequest::default()
            .peer_addr("192.0.2.10:4000".parse().unwrap())
            .to_http_request();

        assert!(forwarded_ip(&req).is_none());
        assert_eq!(extract_client_ip(&req), "192.0.2.10");
    }

    #[test]
    fn test_peer_ip_ignores_forwarded_headers() {
        let req = TestRequest::default()
            .peer_addr("192.0.2.10:4000".parse().unwrap())
            .insert_header(("X-Forwarded-For", "203.0.113.7"))
            .to_http_request();

        assert_eq!(peer_ip(&req), "192.0.2.10");
        assert_eq!(peer_ip(&TestRequest::default().to_http_request()), "unknown");
    }

    #[test]
    fn test_user_agent() {
        let req = TestRequest::default()
            .insert_header(("User-Agent", "forecast-client/1.0"))
            .to_http_request();

        assert_eq!(extract_user_agent(&req).as_deref(), Some("forecast-client/1.0"));
        assert!(extract_user_agent(&TestRequest::default().to_http_request()).is_none());
    }
}
