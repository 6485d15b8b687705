use chrono::{DateTime, Local};
use log::*;
use tide::http::headers::{REFERER, USER_AGENT};
use tide::{Middleware, Next, Request};

/**
 * Request logging in the Apache combined format, emitted through `log` on the
 * `pollbooth::access` target
 *
 * Example:
 * `127.0.0.1 - alice [10/Oct/2020:13:55:36 -0700] "GET /polls/1 HTTP/1.1" 200 2326 "" "curl/7.68.0"`
 */
#[derive(Debug, Copy, Clone, Default)]
pub struct ApacheCombinedLogger {
    _priv: (),
}

impl ApacheCombinedLogger {
    pub fn new() -> Self {
        Self::default()
    }
}

/**
 * Everything one line of the access log is made of
 */
#[derive(Debug)]
struct AccessRecord<'a> {
    peer: Option<&'a str>,
    user: Option<&'a str>,
    timestamp: DateTime<Local>,
    method: &'a str,
    path: &'a str,
    version: &'a str,
    status: u16,
    len: Option<usize>,
    referrer: Option<&'a str>,
    user_agent: Option<&'a str>,
}

impl AccessRecord<'_> {
    fn line(&self) -> String {
        format!(
            r#"{} - {} [{}] "{} {} {}" {} {} {:?} {:?}"#,
            self.peer.unwrap_or("-"),
            self.user.unwrap_or("-"),
            self.timestamp.format("%d/%b/%Y:%H:%M:%S %z"),
            self.method,
            self.path,
            self.version,
            self.status,
            self.len.map(|l| l.to_string()).unwrap_or_else(|| "-".to_string()),
            self.referrer.unwrap_or(""),
            self.user_agent.unwrap_or(""),
        )
    }
}

#[tide::utils::async_trait]
impl Middleware<crate::AppState> for ApacheCombinedLogger {
    async fn handle(&self, req: Request<crate::AppState>, next: Next<'_, crate::AppState>) -> tide::Result {
        let user_header = req.state().config.remote_user_header.clone();
        let user = req.header(user_header.as_str()).map(|v| v.last().as_str().to_owned());
        let referrer = req.header(REFERER).map(|v| v.last().as_str().to_owned());
        let user_agent = req.header(USER_AGENT).map(|v| v.last().as_str().to_owned());
        let peer = req.peer_addr().map(String::from);
        let path = req.url().path().to_owned();
        let method = req.method().to_string();
        let inner: &tide::http::Request = req.as_ref();
        let version = match inner.version() {
            Some(tide::http::Version::Http1_0) => "HTTP/1.0",
            Some(tide::http::Version::Http1_1) => "HTTP/1.1",
            Some(_) => "HTTP",
            None => "-",
        };
        let timestamp = Local::now();

        let response = next.run(req).await;

        let record = AccessRecord {
            peer: peer.as_deref(),
            user: user.as_deref(),
            timestamp,
            method: &method,
            path: &path,
            version,
            status: response.status() as u16,
            len: response.len(),
            referrer: referrer.as_deref(),
            user_agent: user_agent.as_deref(),
        };
        info!(target: "pollbooth::access", "{}", record.line());
        Ok(response)
    }
}
