pub mod chat;
pub mod config;
pub mod detector;
pub mod estimate;
pub mod extract;
pub mod fetcher;
pub mod notify;
pub mod session;
pub mod status;
pub mod watcher;

/// The watched page: the Kadoatery overview with one feed link per hungry kad.
pub const KADOATERY_URL: &str = "https://www.neopets.com/games/kadoatery/index.phtml";

/// Feed-link prefix; the trailing decimal is the kad id.
pub const FEED_LINK_PREFIX: &str =
    "https://www.neopets.com/games/kadoatery/feed_kadoatie.phtml?kad_id=";

/// Interactive login page driven by the headless browser.
pub const LOGIN_PAGE_URL: &str = "https://www.neopets.com/login/";

/// Form login endpoint (alternate login method, JSON response).
pub const LOGIN_FORM_URL: &str = "https://www.neopets.com/login.phtml";

/// Site root, used as the cookie origin when installing harvested cookies.
pub const SITE_ROOT_URL: &str = "https://www.neopets.com/";

/// Page title shown once a login has gone through.
pub const LOGIN_SUCCESS_TITLE: &str = "Welcome to Neopets!";

/// Chat platform REST API base URL.
pub const CHAT_API_BASE: &str = "https://discord.com/api/v10";

/// Browser-like user agent for page fetches; the site serves the plain
/// logged-out page to unknown agents.
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
