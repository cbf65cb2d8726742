use crate::binding::SessionBinder;
use crate::config::CsrfConfig;
use crate::cookie::{TokenCookie, request_cookie};
use crate::error::RejectReason;
use crate::origin::OriginValidator;
use crate::request::CsrfRequest;
use crate::token::{is_expired, now_millis, timestamp_of};
use http::{HeaderMap, Method, StatusCode, header};
use std::sync::Arc;
use tessera_session::SessionAccess;
use tracing::{debug, trace, warn};

/// Status returned for every rejected request.
pub const REJECTION_STATUS: StatusCode = StatusCode::FORBIDDEN;

/// How a method is treated by the middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodClass {
    /// Issues or refreshes a token
    Safe,
    /// Must present a valid token
    Mutating,
    /// Passed through without any token handling
    Unchecked,
}

impl MethodClass {
    pub fn of(method: &Method) -> Self {
        match *method {
            Method::GET => MethodClass::Safe,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE => MethodClass::Mutating,
            _ => MethodClass::Unchecked,
        }
    }
}

/// Result of running a request through [`CsrfMiddleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsrfOutcome {
    /// Continue processing the request.
    Continue {
        /// Current token, for rendering into pages or forms
        token: Option<String>,
        /// Cookie to send when a new token was issued
        cookie: Option<TokenCookie>,
    },
    /// Stop and answer with [`REJECTION_STATUS`]. The reason is for logs only.
    Reject(RejectReason),
}

impl CsrfOutcome {
    /// Check if the request may proceed
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue { .. })
    }

    /// Check if the request was rejected
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Reject(_))
    }

    /// Token exposed to downstream handlers
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Continue { token, .. } => token.as_deref(),
            Self::Reject(_) => None,
        }
    }

    /// Cookie to set on the response
    pub fn cookie(&self) -> Option<&TokenCookie> {
        match self {
            Self::Continue { cookie, .. } => cookie.as_ref(),
            Self::Reject(_) => None,
        }
    }

    /// Rejection reason, for diagnostics
    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Reject(reason) => Some(*reason),
            Self::Continue { .. } => None,
        }
    }

    /// Status to answer with, `None` when processing continues
    pub fn status(&self) -> Option<StatusCode> {
        self.is_rejected().then_some(REJECTION_STATUS)
    }

    /// Append the token cookie, if any, to response headers.
    pub fn apply_to(&self, headers: &mut HeaderMap) -> Result<(), http::header::InvalidHeaderValue> {
        match self.cookie() {
            Some(cookie) => cookie.append_to(headers),
            None => Ok(()),
        }
    }
}

/// CSRF protection middleware.
///
/// Cheap to clone; all state is immutable and shared.
#[derive(Clone, Debug)]
pub struct CsrfMiddleware {
    config: Arc<CsrfConfig>,
    origin: OriginValidator,
    binder: SessionBinder,
}

impl CsrfMiddleware {
    /// Create new CSRF middleware
    pub fn new(config: CsrfConfig) -> Self {
        let origin = OriginValidator::new(config.origin().cloned());
        let binder = SessionBinder::new(config.header_name());
        Self {
            config: Arc::new(config),
            origin,
            binder,
        }
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    pub fn binder(&self) -> &SessionBinder {
        &self.binder
    }

    /// Run the CSRF check for `request`.
    ///
    /// `session` is the request's session, if the application has one. It is
    /// read and updated in place; persisting it is up to the caller.
    pub fn handle(
        &self,
        request: &CsrfRequest,
        session: Option<&mut dyn SessionAccess>,
    ) -> CsrfOutcome {
        self.handle_at(request, session, now_millis())
    }

    /// [`handle`](Self::handle) with an explicit clock reading in milliseconds.
    pub fn handle_at(
        &self,
        request: &CsrfRequest,
        session: Option<&mut dyn SessionAccess>,
        now_ms: i64,
    ) -> CsrfOutcome {
        self.nag_https(request);

        let origin = request.header(header::ORIGIN);
        let referer = request.header(header::REFERER);
        if !self.origin.validate(origin, referer) {
            return self.reject(request, RejectReason::OriginMismatch);
        }

        match MethodClass::of(&request.method) {
            MethodClass::Safe => self.handle_safe(session, now_ms),
            MethodClass::Mutating => self.handle_mutating(request, session, now_ms),
            MethodClass::Unchecked => CsrfOutcome::Continue {
                token: None,
                cookie: None,
            },
        }
    }

    /// Token offered by the client: the header, or the body field of the same name.
    pub fn token_candidate(&self, request: &CsrfRequest) -> Option<String> {
        match request.headers.get(self.config.header()) {
            Some(value) => value.to_str().ok().map(str::to_string),
            None => request.body_field(self.config.header_name()),
        }
    }

    fn handle_safe(
        &self,
        session: Option<&mut (dyn SessionAccess + '_)>,
        now_ms: i64,
    ) -> CsrfOutcome {
        // Without a session there is nothing to persist, so every request gets a fresh token
        let Some(session) = session else {
            return self.issue(None, now_ms);
        };

        if let Some(existing) = self.binder.lookup(&*session) {
            match timestamp_of(&existing) {
                Some(issued_at) if !is_expired(issued_at, now_ms, self.config.timeout()) => {
                    // The user agent already holds this token; no cookie write
                    trace!("Reusing session-bound token");
                    return CsrfOutcome::Continue {
                        token: Some(existing),
                        cookie: None,
                    };
                }
                Some(_) => trace!("Session-bound token expired, reissuing"),
                None => trace!("Session-bound token has an unparsable timestamp, reissuing"),
            }
        }

        self.issue(Some(session), now_ms)
    }

    fn handle_mutating(
        &self,
        request: &CsrfRequest,
        mut session: Option<&mut (dyn SessionAccess + '_)>,
        now_ms: i64,
    ) -> CsrfOutcome {
        if let Err(reason) = self.validate_request(request, session.as_deref_mut(), now_ms) {
            return self.reject(request, reason);
        }

        // Rotate on every accepted mutation
        self.issue(session, now_ms)
    }

    fn validate_request(
        &self,
        request: &CsrfRequest,
        session: Option<&mut (dyn SessionAccess + '_)>,
        now_ms: i64,
    ) -> Result<(), RejectReason> {
        let candidate = non_blank(self.token_candidate(request));
        let cookie = non_blank(request_cookie(&request.headers, self.config.cookie_name()));
        let (Some(candidate), Some(cookie)) = (candidate, cookie) else {
            return Err(RejectReason::MissingToken);
        };

        if candidate != cookie {
            return Err(RejectReason::TokenMismatch);
        }

        if let Some(session) = session {
            match self.binder.lookup(&*session) {
                Some(bound) if bound == candidate => {
                    // Single use: gone before the signature is even checked
                    self.binder.consume(session);
                }
                Some(_) => return Err(RejectReason::SessionMismatch),
                None if self.binder.has_binding(&*session) => {
                    return Err(RejectReason::ForeignSession);
                }
                None => return Err(RejectReason::NoSessionToken),
            }
        }

        self.config
            .codec()
            .verify(&candidate, now_ms, self.config.timeout())?;
        Ok(())
    }

    fn issue(&self, session: Option<&mut (dyn SessionAccess + '_)>, now_ms: i64) -> CsrfOutcome {
        let token = self.config.codec().issue_at(now_ms);
        if let Some(session) = session {
            self.binder.bind(session, &token);
        }
        trace!("Issued new token");
        CsrfOutcome::Continue {
            cookie: Some(TokenCookie::new(&self.config, token.clone())),
            token: Some(token),
        }
    }

    fn reject(&self, request: &CsrfRequest, reason: RejectReason) -> CsrfOutcome {
        debug!(method = %request.method, reason = %reason, "CSRF check failed");
        CsrfOutcome::Reject(reason)
    }

    fn nag_https(&self, request: &CsrfRequest) {
        if !self.config.nag_https() {
            return;
        }
        if let Some(uri) = request.absolute_uri.as_deref() {
            if !uri.starts_with("https:") {
                warn!(
                    uri = %uri,
                    "Using session cookies without https could make you susceptible to session hijacking"
                );
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tessera_session::Session;

    const HEADER: &str = "X-XSRF-TOKEN";
    const COOKIE: &str = "csrfToken";

    fn middleware() -> CsrfMiddleware {
        CsrfMiddleware::new(CsrfConfig::builder("s3cret").build().unwrap())
    }

    fn session(id: &str) -> Session {
        Session::new(id, Duration::from_secs(3600))
    }

    fn post_with(token: &str) -> CsrfRequest {
        CsrfRequest::new(Method::POST)
            .with_header(HEADER, token)
            .with_cookie(COOKIE, token)
    }

    #[test]
    fn test_method_classes() {
        assert_eq!(MethodClass::of(&Method::GET), MethodClass::Safe);
        for m in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert_eq!(MethodClass::of(&m), MethodClass::Mutating);
        }
        for m in [Method::HEAD, Method::OPTIONS, Method::TRACE] {
            assert_eq!(MethodClass::of(&m), MethodClass::Unchecked);
        }
    }

    #[test]
    fn test_get_without_session_always_issues() {
        let csrf = middleware();
        let req = CsrfRequest::new(Method::GET);

        let first = csrf.handle(&req, None);
        let second = csrf.handle(&req, None);
        assert!(first.cookie().is_some());
        assert_ne!(first.token(), second.token());
    }

    #[test]
    fn test_get_with_session_binds_then_reuses() {
        let csrf = middleware();
        let mut session = session("A");
        let req = CsrfRequest::new(Method::GET);

        let first = csrf.handle_at(&req, Some(&mut session), 1_000);
        let token = first.token().unwrap().to_string();
        assert!(first.cookie().is_some());
        assert_eq!(
            SessionAccess::get(&session, HEADER),
            Some(format!("A/{token}"))
        );

        let second = csrf.handle_at(&req, Some(&mut session), 2_000);
        assert_eq!(second.token(), Some(token.as_str()));
        assert!(second.cookie().is_none());
    }

    #[test]
    fn test_get_reissues_expired_binding() {
        let csrf = middleware();
        let timeout = csrf.config().timeout().as_millis() as i64;
        let mut session = session("A");
        let req = CsrfRequest::new(Method::GET);

        let first = csrf.handle_at(&req, Some(&mut session), 0);
        let at_boundary = csrf.handle_at(&req, Some(&mut session), timeout);
        assert_eq!(at_boundary.token(), first.token());

        let past = csrf.handle_at(&req, Some(&mut session), timeout + 1);
        assert_ne!(past.token(), first.token());
        assert!(past.cookie().is_some());
        assert_eq!(
            csrf.binder().lookup(&session).as_deref(),
            past.token()
        );
    }

    #[test]
    fn test_get_reissues_unparsable_binding() {
        let csrf = middleware();
        let mut session = session("A");
        session.put(HEADER, "A/garbage".to_string());

        let outcome = csrf.handle(&CsrfRequest::new(Method::GET), Some(&mut session));
        let token = outcome.token().unwrap();
        assert_ne!(token, "garbage");
        assert_eq!(csrf.binder().lookup(&session).as_deref(), Some(token));
    }

    #[test]
    fn test_get_reissues_for_rotated_session() {
        let csrf = middleware();
        let mut session = session("A");
        let req = CsrfRequest::new(Method::GET);
        let first = csrf.handle(&req, Some(&mut session)).token().map(str::to_string);

        session.id = "B".to_string();
        let second = csrf.handle(&req, Some(&mut session));
        assert_ne!(second.token().map(str::to_string), first);
        assert!(second.cookie().is_some());
    }

    #[test]
    fn test_unchecked_methods_pass_through() {
        let csrf = middleware();
        let outcome = csrf.handle(&CsrfRequest::new(Method::HEAD), None);
        assert_eq!(
            outcome,
            CsrfOutcome::Continue {
                token: None,
                cookie: None
            }
        );
    }

    #[test]
    fn test_post_without_session() {
        let csrf = middleware();
        let token = csrf.config().codec().issue();

        let outcome = csrf.handle(&post_with(&token), None);
        assert!(outcome.is_continue());
        assert_ne!(outcome.token(), Some(token.as_str()));
        assert!(outcome.cookie().is_some());
    }

    #[test]
    fn test_post_missing_or_mismatched() {
        let csrf = middleware();
        let token = csrf.config().codec().issue();

        let no_header = CsrfRequest::new(Method::POST).with_cookie(COOKIE, &token);
        assert_eq!(
            csrf.handle(&no_header, None).reason(),
            Some(RejectReason::MissingToken)
        );

        let no_cookie = CsrfRequest::new(Method::POST).with_header(HEADER, &token);
        assert_eq!(
            csrf.handle(&no_cookie, None).reason(),
            Some(RejectReason::MissingToken)
        );

        let blank = CsrfRequest::new(Method::POST)
            .with_header(HEADER, " ")
            .with_cookie(COOKIE, &token);
        assert_eq!(
            csrf.handle(&blank, None).reason(),
            Some(RejectReason::MissingToken)
        );

        let other = csrf.config().codec().issue();
        let mismatch = CsrfRequest::new(Method::POST)
            .with_header(HEADER, &token)
            .with_cookie(COOKIE, &other);
        assert_eq!(
            csrf.handle(&mismatch, None).reason(),
            Some(RejectReason::TokenMismatch)
        );
    }

    #[test]
    fn test_post_form_field_fallback() {
        let csrf = middleware();
        let token = csrf.config().codec().issue();
        let body = serde_urlencoded::to_string([(HEADER, token.as_str())]).unwrap();

        let req = CsrfRequest::new(Method::POST)
            .with_cookie(COOKIE, &token)
            .with_body(body);
        assert!(csrf.handle(&req, None).is_continue());
    }

    #[test]
    fn test_post_session_single_use() {
        let csrf = middleware();
        let mut session = session("A");
        let token = csrf
            .handle(&CsrfRequest::new(Method::GET), Some(&mut session))
            .token()
            .unwrap()
            .to_string();

        let first = csrf.handle(&post_with(&token), Some(&mut session));
        assert!(first.is_continue());
        let rotated = first.token().unwrap().to_string();
        assert_ne!(rotated, token);
        assert_eq!(csrf.binder().lookup(&session), Some(rotated));

        let replay = csrf.handle(&post_with(&token), Some(&mut session));
        assert_eq!(replay.reason(), Some(RejectReason::SessionMismatch));
    }

    #[test]
    fn test_post_consumes_binding_even_when_expired() {
        let csrf = middleware();
        let timeout = csrf.config().timeout().as_millis() as i64;
        let mut session = session("A");
        let token = csrf
            .handle_at(&CsrfRequest::new(Method::GET), Some(&mut session), 0)
            .token()
            .unwrap()
            .to_string();

        let late = csrf.handle_at(&post_with(&token), Some(&mut session), timeout + 1);
        assert_eq!(
            late.reason(),
            Some(RejectReason::Token(crate::TokenRejection::Expired))
        );
        assert!(!csrf.binder().has_binding(&session));
    }

    #[test]
    fn test_post_session_without_binding() {
        let csrf = middleware();
        let mut session = session("A");
        let token = csrf.config().codec().issue();

        let outcome = csrf.handle(&post_with(&token), Some(&mut session));
        assert_eq!(outcome.reason(), Some(RejectReason::NoSessionToken));
    }

    #[test]
    fn test_post_after_session_rotation() {
        let csrf = middleware();
        let mut session = session("A");
        let token = csrf
            .handle(&CsrfRequest::new(Method::GET), Some(&mut session))
            .token()
            .unwrap()
            .to_string();

        session.id = "B".to_string();
        let outcome = csrf.handle(&post_with(&token), Some(&mut session));
        assert_eq!(outcome.reason(), Some(RejectReason::ForeignSession));
    }

    #[test]
    fn test_post_forged_token_rejected() {
        let csrf = middleware();
        let foreign = crate::TokenCodec::new(b"not the secret").unwrap().issue();
        let outcome = csrf.handle(&post_with(&foreign), None);
        assert_eq!(
            outcome.reason(),
            Some(RejectReason::Token(crate::TokenRejection::BadSignature))
        );
        assert_eq!(outcome.status(), Some(StatusCode::FORBIDDEN));
    }

    #[test]
    fn test_origin_gate_applies_to_every_method() {
        let csrf = CsrfMiddleware::new(
            CsrfConfig::builder("s3cret")
                .with_origin("https://good.example")
                .build()
                .unwrap(),
        );
        for method in [Method::GET, Method::POST, Method::HEAD, Method::OPTIONS] {
            let req = CsrfRequest::new(method).with_header("Origin", "https://evil.example");
            let outcome = csrf.handle(&req, None);
            assert_eq!(outcome.reason(), Some(RejectReason::OriginMismatch));
            assert_eq!(outcome.status(), Some(REJECTION_STATUS));
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn with_captured_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, logs.contents())
    }

    /// Comparable shape of an outcome; token values are random per issue.
    fn summary(outcome: &CsrfOutcome) -> (bool, bool, bool, Option<RejectReason>) {
        (
            outcome.is_continue(),
            outcome.token().is_some(),
            outcome.cookie().is_some(),
            outcome.reason(),
        )
    }

    #[test]
    fn test_nag_https_warns_without_changing_outcome() {
        let csrf = CsrfMiddleware::new(
            CsrfConfig::builder("s3cret")
                .with_nag_https(true)
                .build()
                .unwrap(),
        );
        let token = csrf.config().codec().issue();
        let requests = |uri: &str| {
            vec![
                CsrfRequest::new(Method::GET).with_absolute_uri(uri),
                post_with(&token).with_absolute_uri(uri),
                CsrfRequest::new(Method::POST)
                    .with_header(HEADER, "other")
                    .with_cookie(COOKIE, &token)
                    .with_absolute_uri(uri),
                CsrfRequest::new(Method::HEAD).with_absolute_uri(uri),
            ]
        };

        let (plain, plain_logs) = with_captured_warnings(|| {
            requests("http://app.example/form")
                .iter()
                .map(|req| summary(&csrf.handle(req, None)))
                .collect::<Vec<_>>()
        });
        let (secure, secure_logs) = with_captured_warnings(|| {
            requests("https://app.example/form")
                .iter()
                .map(|req| summary(&csrf.handle(req, None)))
                .collect::<Vec<_>>()
        });

        assert_eq!(plain, secure);
        assert!(plain[0].0 && plain[1].0);
        assert_eq!(plain[2].3, Some(RejectReason::TokenMismatch));
        assert!(plain_logs.contains("without https"));
        assert!(plain_logs.contains("http://app.example/form"));
        assert!(secure_logs.is_empty());
    }

    #[test]
    fn test_nag_https_off_is_silent() {
        let csrf = middleware();
        let req = CsrfRequest::new(Method::GET).with_absolute_uri("http://app.example/");
        let (outcome, logs) = with_captured_warnings(|| csrf.handle(&req, None));
        assert!(outcome.is_continue());
        assert!(logs.is_empty());
    }

    #[test]
    fn test_apply_to_sets_cookie() {
        let csrf = middleware();
        let outcome = csrf.handle(&CsrfRequest::new(Method::GET), None);
        let mut headers = HeaderMap::new();
        outcome.apply_to(&mut headers).unwrap();

        let set_cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.starts_with("csrfToken="));
        assert!(set_cookie.ends_with("SameSite=Strict"));
    }
}
