//! Google's installed-app OAuth flow.
//!
//! Consent uses the authorization code grant with PKCE (S256) and a loopback
//! redirect:
//!
//! 1. draw a verifier and a `state` value, derive the challenge
//! 2. listen on the first free port of the configured range
//! 3. send the browser to the consent page, printing the URL if it can't open
//! 4. accept `GET /callback?code=..&state=..` when `state` matches; other
//!    paths get a 404
//! 5. trade the code and verifier for tokens
//!
//! Nothing times out: the listener waits until the callback arrives or the
//! user interrupts the process.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::BoxFuture;

use super::config::OAuthCredentials;
use super::tokens::{TokenGrant, TokenInfo};

const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Random bytes behind the verifier; 32 bytes encode to 43 characters.
const VERIFIER_BYTES: usize = 32;
const STATE_BYTES: usize = 16;

const CALLBACK_PATH: &str = "/callback";

const PAGE_GRANTED: &str = "<html><body><h1>getcal is authorized</h1>\
    <p>This tab can be closed.</p></body></html>";
const PAGE_REFUSED: &str = "<html><body><h1>getcal was not authorized</h1>\
    <p>See the terminal for details.</p></body></html>";

/// Token endpoint operations the credential manager drives.
pub trait OAuthFlow {
    /// Asks the user for consent and returns the resulting credential.
    fn authorize<'a>(
        &'a self,
        credentials: &'a OAuthCredentials,
        scopes: &'a [String],
    ) -> BoxFuture<'a, ProviderResult<TokenInfo>>;

    /// Trades a refresh token for a new access token.
    fn refresh<'a>(
        &'a self,
        credentials: &'a OAuthCredentials,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, ProviderResult<TokenGrant>>;
}

/// [`OAuthFlow`] against Google's endpoints.
#[derive(Debug)]
pub struct OAuthClient {
    http: reqwest::Client,
    port_range: (u16, u16),
}

impl OAuthClient {
    pub fn new(user_agent: &str, port_range: (u16, u16)) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| ProviderError::internal("cannot build HTTP client").with_source(e))?;
        Ok(Self { http, port_range })
    }

    async fn run_consent(
        &self,
        credentials: &OAuthCredentials,
        scopes: &[String],
    ) -> ProviderResult<TokenInfo> {
        let pkce = PkceFlow::generate();
        let (listener, port) = bind_loopback_server(self.port_range)?;
        let redirect_uri = format!("http://127.0.0.1:{}{}", port, CALLBACK_PATH);
        let consent_url = pkce.authorization_url(&credentials.client_id, &redirect_uri, scopes)?;

        info!(port, "waiting for consent in the browser");
        debug!(url = %consent_url, "consent page");
        if let Err(e) = open::that(consent_url.as_str()) {
            warn!(error = %e, "could not launch a browser");
            eprintln!("Open this URL to authorize getcal:\n\n  {}\n", consent_url);
        }

        let callback = wait_for_callback(&listener, &pkce.state)?;

        debug!("authorization code received");
        let grant = self
            .post_token("code exchange", &[
                ("grant_type", "authorization_code"),
                ("code", callback.code.as_str()),
                ("code_verifier", pkce.verifier.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ])
            .await?;

        info!("authorization complete");
        Ok(TokenInfo::from_grant(grant, scopes).with_client(credentials))
    }

    async fn run_refresh(
        &self,
        credentials: &OAuthCredentials,
        refresh_token: &str,
    ) -> ProviderResult<TokenGrant> {
        let grant = self
            .post_token("refresh", &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ])
            .await?;
        info!("access token refreshed");
        Ok(grant)
    }

    async fn post_token(&self, what: &str, form: &[(&str, &str)]) -> ProviderResult<TokenGrant> {
        let response = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(form)
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("{}: {}", what, e)).with_source(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("{}: cannot read response: {}", what, e))
        })?;

        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "{} rejected ({}): {}",
                what,
                status,
                TokenErrorBody::describe(&body)
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("{}: unexpected token response: {}", what, e))
        })
    }
}

impl OAuthFlow for OAuthClient {
    fn authorize<'a>(
        &'a self,
        credentials: &'a OAuthCredentials,
        scopes: &'a [String],
    ) -> BoxFuture<'a, ProviderResult<TokenInfo>> {
        Box::pin(self.run_consent(credentials, scopes))
    }

    fn refresh<'a>(
        &'a self,
        credentials: &'a OAuthCredentials,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, ProviderResult<TokenGrant>> {
        Box::pin(self.run_refresh(credentials, refresh_token))
    }
}

/// `{"error": "invalid_grant", "error_description": "..."}`
#[derive(Deserialize)]
struct TokenErrorBody {
    error: String,
    error_description: Option<String>,
}

impl TokenErrorBody {
    fn describe(body: &str) -> String {
        match serde_json::from_str::<Self>(body) {
            Ok(Self {
                error,
                error_description: Some(description),
            }) => format!("{}: {}", error, description),
            Ok(Self { error, .. }) => error,
            Err(_) => body.trim().to_string(),
        }
    }
}

/// Returns the listener and the port it actually got.
fn bind_loopback_server((first, last): (u16, u16)) -> ProviderResult<(TcpListener, u16)> {
    for candidate in first..=last {
        let listener = match TcpListener::bind(("127.0.0.1", candidate)) {
            Ok(listener) => listener,
            Err(e) => {
                debug!(port = candidate, error = %e, "port busy");
                continue;
            }
        };
        let port = listener
            .local_addr()
            .map_err(|e| ProviderError::internal("loopback listener has no address").with_source(e))?
            .port();
        debug!(port, "callback listener bound");
        return Ok((listener, port));
    }
    Err(ProviderError::configuration(format!(
        "every loopback port in {}-{} is in use",
        first, last
    )))
}

fn wait_for_callback(listener: &TcpListener, expected_state: &str) -> ProviderResult<Callback> {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        if let Some(outcome) = handle_connection(stream, expected_state) {
            return outcome;
        }
    }
    Err(ProviderError::internal("callback listener stopped"))
}

/// `None` means the request was not the callback and the wait goes on.
fn handle_connection(
    mut stream: TcpStream,
    expected_state: &str,
) -> Option<ProviderResult<Callback>> {
    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;

    let mut header = String::new();
    while matches!(reader.read_line(&mut header), Ok(n) if n > 0) && !header.trim_end().is_empty() {
        header.clear();
    }

    let Some(target) = parse_request_target(&request_line).filter(|u| u.path() == CALLBACK_PATH)
    else {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        return None;
    };

    let outcome = Callback::from_url(&target, expected_state);
    let (status, page) = match outcome {
        Ok(_) => ("200 OK", PAGE_GRANTED),
        Err(_) => ("400 Bad Request", PAGE_REFUSED),
    };
    let _ = write!(
        stream,
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\n\
         Connection: close\r\n\r\n{}",
        status,
        page.len(),
        page
    );
    let _ = stream.flush();

    Some(outcome)
}

/// Turns `GET /path?query HTTP/1.1` into a loopback URL.
fn parse_request_target(request_line: &str) -> Option<Url> {
    let mut words = request_line.split_whitespace();
    match (words.next(), words.next()) {
        (Some("GET"), Some(target)) => Url::parse("http://127.0.0.1").ok()?.join(target).ok(),
        _ => None,
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Callback {
    code: String,
}

impl Callback {
    /// A callback is accepted only when it echoes this attempt's `state`.
    fn from_url(url: &Url, expected_state: &str) -> ProviderResult<Self> {
        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        if let Some(error) = param("error") {
            return Err(ProviderError::authorization(format!(
                "consent refused: {}",
                error
            )));
        }
        let code = param("code")
            .filter(|code| !code.is_empty())
            .ok_or_else(|| ProviderError::authorization("callback carried no authorization code"))?;
        if param("state").as_deref() != Some(expected_state) {
            return Err(ProviderError::authorization(
                "callback state does not match the consent request",
            ));
        }

        Ok(Self { code })
    }
}

/// One consent attempt's PKCE verifier, its S256 challenge and the `state`
/// value echoed by the callback.
#[derive(Debug)]
pub struct PkceFlow {
    pub verifier: String,
    pub challenge: String,
    pub state: String,
}

impl PkceFlow {
    pub fn generate() -> Self {
        let verifier = random_token(VERIFIER_BYTES);
        Self {
            challenge: s256_challenge(&verifier),
            verifier,
            state: random_token(STATE_BYTES),
        }
    }

    /// Consent page URL. `access_type=offline` with `prompt=consent` makes
    /// Google hand out a refresh token every time.
    pub fn authorization_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> ProviderResult<Url> {
        let scope = scopes.join(" ");
        Url::parse_with_params(AUTHORIZE_ENDPOINT, [
            ("response_type", "code"),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("scope", scope.as_str()),
            ("code_challenge", self.challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("state", self.state.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ])
        .map_err(|e| ProviderError::internal("bad consent URL").with_source(e))
    }
}

fn s256_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill(bytes.as_mut_slice());
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::super::config::GoogleConfig;
    use super::*;
    use crate::error::ProviderErrorKind;

    #[test]
    fn s256_matches_rfc7636_appendix_b() {
        assert_eq!(
            s256_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn each_attempt_draws_fresh_values() {
        let a = PkceFlow::generate();
        let b = PkceFlow::generate();
        assert_eq!(a.verifier.len(), 43);
        assert_eq!(a.challenge, s256_challenge(&a.verifier));
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn consent_url_parameters() {
        let pkce = PkceFlow::generate();
        let url = pkce
            .authorization_url(
                "42.apps.googleusercontent.com",
                "http://127.0.0.1:8085/callback",
                &[GoogleConfig::DEFAULT_SCOPE.to_string()],
            )
            .unwrap();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:8085/callback");
        assert_eq!(params["scope"], GoogleConfig::DEFAULT_SCOPE);
        assert_eq!(params["code_challenge"], pkce.challenge);
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["state"], pkce.state);
        assert_eq!(params["access_type"], "offline");
    }

    #[test]
    fn callback_parameters() {
        let url = parse_request_target("GET /callback?state=xyz&code=4%2F0Ab HTTP/1.1\r\n").unwrap();
        assert_eq!(
            Callback::from_url(&url, "xyz").unwrap(),
            Callback {
                code: "4/0Ab".into()
            }
        );

        let denied = parse_request_target("GET /callback?error=access_denied HTTP/1.1").unwrap();
        assert!(Callback::from_url(&denied, "xyz").unwrap_err().message().contains("access_denied"));

        let empty = parse_request_target("GET /callback?code=&state=xyz HTTP/1.1").unwrap();
        assert!(Callback::from_url(&empty, "xyz").is_err());
    }

    #[test]
    fn callback_state_must_match() {
        let forged = parse_request_target("GET /callback?code=abc&state=other HTTP/1.1").unwrap();
        let err = Callback::from_url(&forged, "xyz").unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::Authorization);
        assert!(err.message().contains("state"));

        let stateless = parse_request_target("GET /callback?code=abc HTTP/1.1").unwrap();
        assert!(Callback::from_url(&stateless, "xyz").is_err());
    }

    #[test]
    fn only_get_requests_are_parsed() {
        assert!(parse_request_target("POST /callback HTTP/1.1").is_none());
        assert!(parse_request_target("GET").is_none());
        assert!(parse_request_target("").is_none());
        assert_eq!(
            parse_request_target("GET /favicon.ico HTTP/1.1").unwrap().path(),
            "/favicon.ico"
        );
    }

    #[test]
    fn token_error_descriptions() {
        assert_eq!(
            TokenErrorBody::describe(
                r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#
            ),
            "invalid_grant: Token has been expired or revoked."
        );
        assert_eq!(TokenErrorBody::describe(r#"{"error": "invalid_client"}"#), "invalid_client");
        assert_eq!(TokenErrorBody::describe("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn busy_port_is_skipped() {
        let (held, port) = bind_loopback_server((0, 0)).unwrap();
        assert_eq!(held.local_addr().unwrap().port(), port);

        let err = bind_loopback_server((port, port)).unwrap_err();
        assert!(err.message().contains("in use"));
    }

    #[test]
    fn callback_over_loopback() {
        let (listener, _) = bind_loopback_server((0, 0)).unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = std::thread::spawn(move || {
            let send = |request: &[u8]| {
                let mut stream = TcpStream::connect(addr).unwrap();
                stream.write_all(request).unwrap();
                let mut reply = String::new();
                stream.read_to_string(&mut reply).unwrap();
                reply
            };
            let favicon = send(b"GET /favicon.ico HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n");
            let callback = send(b"GET /callback?code=abc&state=s1 HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n");
            (favicon, callback)
        });

        let callback = wait_for_callback(&listener, "s1").unwrap();
        assert_eq!(callback.code, "abc");

        let (favicon, reply) = browser.join().unwrap();
        assert!(favicon.starts_with("HTTP/1.1 404"));
        assert!(reply.starts_with("HTTP/1.1 200 OK"));
        assert!(reply.ends_with(PAGE_GRANTED));
    }

    #[test]
    fn mismatched_state_is_refused_in_the_browser() {
        let (listener, _) = bind_loopback_server((0, 0)).unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = std::thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream
                .write_all(b"GET /callback?code=abc&state=forged HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n")
                .unwrap();
            let mut reply = String::new();
            stream.read_to_string(&mut reply).unwrap();
            reply
        });

        let err = wait_for_callback(&listener, "s1").unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::Authorization);

        let reply = browser.join().unwrap();
        assert!(reply.starts_with("HTTP/1.1 400 Bad Request"));
        assert!(reply.ends_with(PAGE_REFUSED));
        assert!(!reply.contains(PAGE_GRANTED));
    }
}
