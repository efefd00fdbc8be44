//! Probe: fetch the Kadoatery page once and report the extracted kad ids.
//!
//! Useful for checking the feed-link pattern and session cookies without
//! starting the watcher. Pass raw cookies to probe an authenticated view:
//!
//!   KADWATCH_COOKIES="neologin=..." cargo run --bin probe_page

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use reqwest::cookie::Jar;
use url::Url;

use kadwatch::fetcher::PageFetcher;
use kadwatch::{KADOATERY_URL, SITE_ROOT_URL, extract};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let jar = Arc::new(Jar::default());
    if let Ok(cookies) = std::env::var("KADWATCH_COOKIES") {
        let origin = Url::parse(SITE_ROOT_URL)?;
        let mut count = 0;
        for cookie in cookies.split(';') {
            jar.add_cookie_str(cookie.trim(), &origin);
            count += 1;
        }
        println!("Installed {count} cookie(s)");
    }

    let fetcher = PageFetcher::new(jar, Duration::from_secs(36))?;

    println!("=== Probe: Kadoatery page ===");
    println!("GET {KADOATERY_URL}");
    let start = Instant::now();
    let html = fetcher.fetch(KADOATERY_URL).await?;
    println!("Latency: {:?}", start.elapsed());
    println!("Body: {} bytes", html.len());
    println!();

    let ids = extract::extract_ids(&html);
    if ids.is_empty() {
        println!("No feed links found: logged-out view (or the markup changed)");
    } else {
        println!("Feed links: {}", ids.len());
        for id in &ids {
            println!("  kad_id={id}");
        }
    }

    Ok(())
}
