use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::ClearBrowserCookiesParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use reqwest::cookie::Jar;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::LoginMethod;
use crate::{LOGIN_FORM_URL, LOGIN_PAGE_URL, LOGIN_SUCCESS_TITLE, SITE_ROOT_URL, USER_AGENT};

const USERNAME_SELECTOR: &str = "#loginUsername";
const PASSWORD_SELECTOR: &str = "#loginPassword";
const SUBMIT_SELECTOR: &str = "#loginButton";

/// Form token the login endpoint expects alongside the credentials.
const FORM_REF_CK: &str = "126479724b4db61d5fdd880523e38506";

/// Attempt ceiling for the form login's malformed-response retry.
const MAX_FORM_ATTEMPTS: u32 = 2;

/// Poll step while waiting for an element or the success title.
const WAIT_POLL_STEP: Duration = Duration::from_millis(250);

/// Account credentials, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    /// A login form element never appeared; retried up to the attempt ceiling.
    #[error("login element {selector} not found")]
    MissingElement { selector: &'static str },

    /// Credentials were submitted but the success page never showed. Not
    /// retried here; the next cycle may try again.
    #[error("no login confirmation within {timeout:?}")]
    ConfirmationTimeout { timeout: Duration },

    /// The form endpoint answered with something that is not JSON.
    #[error("malformed login response: {0}")]
    MalformedResponse(String),

    /// The attempt ceiling was reached. Fatal: the caller stops the watcher.
    #[error("login failed after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("login request failed")]
    Http(#[from] reqwest::Error),
}

impl LoginError {
    fn retryable(&self) -> bool {
        matches!(
            self,
            LoginError::MissingElement { .. } | LoginError::MalformedResponse(_)
        )
    }

    /// Whether the caller must stop the watcher for good.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LoginError::AttemptsExhausted { .. })
    }
}

fn browser_err(e: impl std::fmt::Display) -> LoginError {
    LoginError::Browser(e.to_string())
}

/// Acquires an authenticated session and installs its cookies into the jar
/// shared with the page fetcher.
pub struct SessionProvider {
    credentials: Credentials,
    method: LoginMethod,
    jar: Arc<Jar>,
    http: reqwest::Client,
    browser: Option<Browser>,
    attempts: u32,
    max_attempts: u32,
    login_timeout: Duration,
    form_retry_delay: Duration,
    login_page_url: String,
    login_form_url: String,
    site_origin: Url,
}

impl SessionProvider {
    pub fn new(
        credentials: Credentials,
        method: LoginMethod,
        jar: Arc<Jar>,
        login_timeout: Duration,
        max_attempts: u32,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .user_agent(USER_AGENT)
            .timeout(login_timeout)
            .build()?;
        Ok(Self {
            credentials,
            method,
            jar,
            http,
            browser: None,
            attempts: 0,
            max_attempts,
            login_timeout,
            form_retry_delay: Duration::from_secs(2),
            login_page_url: LOGIN_PAGE_URL.to_string(),
            login_form_url: LOGIN_FORM_URL.to_string(),
            site_origin: Url::parse(SITE_ROOT_URL)?,
        })
    }

    /// Failed attempts so far; resets to zero on a successful login.
    pub fn login_attempts(&self) -> u32 {
        self.attempts
    }

    /// Acquire a session. Retryable failures loop with an explicit attempt
    /// counter up to the ceiling; the rest surface after one attempt.
    pub async fn login(&mut self) -> Result<(), LoginError> {
        info!(username = %self.credentials.username, "logging in");
        loop {
            let result = match self.method {
                LoginMethod::Browser => self.browser_attempt().await,
                LoginMethod::Form => self.form_attempt().await,
            };
            match result {
                Ok(()) => {
                    self.attempts = 0;
                    info!("login complete");
                    return Ok(());
                }
                Err(err) if err.retryable() => {
                    self.attempts += 1;
                    let ceiling = match self.method {
                        LoginMethod::Browser => self.max_attempts,
                        LoginMethod::Form => MAX_FORM_ATTEMPTS,
                    };
                    warn!(attempt = self.attempts, ceiling, error = %err, "login attempt failed");
                    if self.attempts >= ceiling {
                        return Err(LoginError::AttemptsExhausted {
                            attempts: self.attempts,
                        });
                    }
                    if matches!(err, LoginError::MalformedResponse(_)) {
                        tokio::time::sleep(self.form_retry_delay).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    // ── Browser login ──────────────────────────────────────────────

    async fn browser_attempt(&mut self) -> Result<(), LoginError> {
        let page = self.fresh_login_page().await?;

        let username = wait_for_element(&page, USERNAME_SELECTOR, self.login_timeout).await?;
        type_into(&username, &self.credentials.username).await?;

        let password = page
            .find_element(PASSWORD_SELECTOR)
            .await
            .map_err(|_| LoginError::MissingElement {
                selector: PASSWORD_SELECTOR,
            })?;
        type_into(&password, &self.credentials.password).await?;

        page.find_element(SUBMIT_SELECTOR)
            .await
            .map_err(|_| LoginError::MissingElement {
                selector: SUBMIT_SELECTOR,
            })?
            .click()
            .await
            .map_err(browser_err)?;

        wait_for_title(&page, LOGIN_SUCCESS_TITLE, self.login_timeout).await?;

        self.install_cookies(&page).await?;
        let _ = page.close().await;
        Ok(())
    }

    /// A fresh page on the login URL with all browser cookies cleared, so
    /// every attempt starts from a logged-out state.
    async fn fresh_login_page(&mut self) -> Result<Page, LoginError> {
        if self.browser.is_none() {
            info!("launching headless browser");
            self.browser = Some(launch_browser().await?);
        }
        let Some(browser) = &self.browser else {
            return Err(LoginError::Browser("browser failed to launch".into()));
        };

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(browser_err)?;
        page.execute(ClearBrowserCookiesParams::default())
            .await
            .map_err(browser_err)?;
        page.goto(self.login_page_url.as_str())
            .await
            .map_err(browser_err)?;
        Ok(page)
    }

    /// Copy the browser session cookies into the shared jar used by the
    /// HTTP client.
    async fn install_cookies(&self, page: &Page) -> Result<(), LoginError> {
        let cookies = page.get_cookies().await.map_err(browser_err)?;
        let count = cookies.len();
        for c in cookies {
            let header = format!("{}={}; Domain={}; Path={}", c.name, c.value, c.domain, c.path);
            self.jar.add_cookie_str(&header, &self.site_origin);
        }
        debug!(count, "installed session cookies");
        Ok(())
    }

    // ── Form login ─────────────────────────────────────────────────

    /// POST the login form directly. The response cookies land in the shared
    /// jar through the client; the body is only checked for JSON shape.
    async fn form_attempt(&self) -> Result<(), LoginError> {
        let params = [
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.as_str()),
            ("return_format", "json"),
            ("_ref_ck", FORM_REF_CK),
        ];
        let response = self
            .http
            .post(&self.login_form_url)
            .header("X-Requested-With", "XMLHttpRequest")
            .form(&params)
            .send()
            .await?;
        let body = response.text().await?;
        serde_json::from_str::<serde_json::Value>(&body)
            .map_err(|e| LoginError::MalformedResponse(e.to_string()))?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_form_login_url(&mut self, url: String) {
        self.login_form_url = url;
    }

    #[cfg(test)]
    pub(crate) fn set_form_retry_delay(&mut self, delay: Duration) {
        self.form_retry_delay = delay;
    }
}

/// Find the browser binary: env override first, then PATH.
fn find_browser_binary() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("KADWATCH_BROWSER_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }
    for name in ["google-chrome", "chromium", "chromium-browser", "chrome"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }
    None
}

async fn launch_browser() -> Result<Browser, LoginError> {
    let binary = find_browser_binary().ok_or_else(|| {
        LoginError::Browser("no Chromium binary found; set KADWATCH_BROWSER_PATH".into())
    })?;
    let config = BrowserConfig::builder()
        .chrome_executable(binary)
        .arg("--headless=new")
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .window_size(1366, 768)
        .build()
        .map_err(LoginError::Browser)?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(browser_err)?;

    // Drain CDP events for the browser's lifetime.
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            let _ = event;
        }
    });

    Ok(browser)
}

async fn type_into(element: &Element, text: &str) -> Result<(), LoginError> {
    element.click().await.map_err(browser_err)?;
    element.type_str(text).await.map_err(browser_err)?;
    Ok(())
}

async fn wait_for_element(
    page: &Page,
    selector: &'static str,
    timeout: Duration,
) -> Result<Element, LoginError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(element) = page.find_element(selector).await {
            return Ok(element);
        }
        if Instant::now() >= deadline {
            return Err(LoginError::MissingElement { selector });
        }
        tokio::time::sleep(WAIT_POLL_STEP).await;
    }
}

async fn wait_for_title(page: &Page, expected: &str, timeout: Duration) -> Result<(), LoginError> {
    let deadline = Instant::now() + timeout;
    loop {
        match page.get_title().await {
            Ok(Some(title)) if title == expected => return Ok(()),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "title read failed while waiting"),
        }
        if Instant::now() >= deadline {
            return Err(LoginError::ConfirmationTimeout { timeout });
        }
        tokio::time::sleep(WAIT_POLL_STEP).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn form_provider(form_url: String) -> SessionProvider {
        let mut p = SessionProvider::new(
            Credentials {
                username: "user".into(),
                password: "hunter2".into(),
            },
            LoginMethod::Form,
            Arc::new(Jar::default()),
            Duration::from_secs(5),
            10,
        )
        .unwrap();
        p.set_form_login_url(form_url);
        p.set_form_retry_delay(Duration::from_millis(10));
        p
    }

    #[tokio::test]
    async fn form_login_succeeds_on_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login.phtml"))
            .and(header("X-Requested-With", "XMLHttpRequest"))
            .and(body_string_contains("username=user"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"success":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let mut provider = form_provider(format!("{}/login.phtml", server.uri()));
        provider.login().await.unwrap();
        assert_eq!(provider.login_attempts(), 0);
    }

    #[tokio::test]
    async fn malformed_bodies_exhaust_after_two_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login.phtml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>challenge</html>"))
            .expect(2)
            .mount(&server)
            .await;

        let mut provider = form_provider(format!("{}/login.phtml", server.uri()));
        let err = provider.login().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, LoginError::AttemptsExhausted { attempts: 2 }));
    }

    #[tokio::test]
    async fn counter_resets_after_a_recovered_attempt() {
        let server = MockServer::start().await;
        // First response is garbage, every later one is JSON.
        Mock::given(method("POST"))
            .and(path("/login.phtml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/login.phtml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let mut provider = form_provider(format!("{}/login.phtml", server.uri()));
        provider.login().await.unwrap();
        assert_eq!(provider.login_attempts(), 0);
    }
}
