use crate::config::Config;
use crate::helper::post_helpers::summary_for;
use crate::models::{Post, PostCategory};
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use tera::{Context, Tera};

pub const RSS_ITEM_LIMIT: u32 = 50;
const RSS_DESCRIPTION_CHARS: usize = 200;
const FEED_DESCRIPTION: &str = "A personal blog exploring mental health, current affairs, creative writing, and book reflections.";

/// Embedded templates for feeds and emails. Only `.html` is autoescaped;
/// XML templates escape explicitly with `escape_xml`.
pub fn build_templates() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![".html"]);
    tera.add_raw_templates(vec![
        ("feeds/rss.xml", include_str!("../../templates/feeds/rss.xml")),
        ("feeds/sitemap.xml", include_str!("../../templates/feeds/sitemap.xml")),
        ("email/new_post.html", include_str!("../../templates/email/new_post.html")),
        ("email/contact.html", include_str!("../../templates/email/contact.html")),
    ])?;
    Ok(tera)
}

#[derive(Serialize)]
struct RssItem {
    title: String,
    link: String,
    pub_date: String,
    category: &'static str,
    description: String,
    cover_url: Option<String>,
}

fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Media paths are stored relative to the site; feeds need absolute URLs.
pub fn absolute_url(config: &Config, url: &str) -> String {
    if url.starts_with('/') {
        format!("{}{}", config.site_base_url, url)
    } else {
        url.to_string()
    }
}

/// RSS 2.0 document for already-filtered published posts.
pub fn render_rss(
    tera: &Tera,
    config: &Config,
    site_name: &str,
    posts: &[Post],
    now: DateTime<Utc>,
) -> Result<String, tera::Error> {
    let items: Vec<RssItem> = posts
        .iter()
        .map(|post| RssItem {
            title: post.title.clone(),
            link: config.post_url(post.category.as_str(), &post.slug),
            pub_date: http_date(post.published_at.unwrap_or(post.uploaded_at)),
            category: post.category.label(),
            description: summary_for(post, RSS_DESCRIPTION_CHARS),
            cover_url: post.cover_url.as_deref().map(|u| absolute_url(config, u)),
        })
        .collect();

    let mut ctx = Context::new();
    ctx.insert("site_name", site_name);
    ctx.insert("description", FEED_DESCRIPTION);
    ctx.insert("base_url", &config.site_base_url);
    ctx.insert("build_date", &http_date(now));
    ctx.insert("year", &now.year());
    ctx.insert("items", &items);
    tera.render("feeds/rss.xml", &ctx)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: String,
    pub changefreq: &'static str,
    pub priority: &'static str,
}

/// Static pages first, then one entry per published post.
pub fn sitemap_entries(config: &Config, posts: &[Post], today: DateTime<Utc>) -> Vec<SitemapEntry> {
    let today = today.format("%Y-%m-%d").to_string();
    let page = |path: &str, priority: &'static str, changefreq: &'static str| SitemapEntry {
        loc: format!("{}{}", config.site_base_url, path),
        lastmod: today.clone(),
        changefreq,
        priority,
    };

    let mut entries = vec![page("", "1.0", "daily"), page("/categories", "0.9", "weekly")];
    for category in PostCategory::ALL {
        entries.push(page(&format!("/{}", category.as_str()), "0.8", "weekly"));
    }
    entries.push(page("/meet-niyati", "0.7", "monthly"));
    entries.push(page("/contact", "0.6", "monthly"));

    for post in posts {
        entries.push(SitemapEntry {
            loc: config.post_url(post.category.as_str(), &post.slug),
            lastmod: post.updated_at.format("%Y-%m-%d").to_string(),
            changefreq: "monthly",
            priority: "0.7",
        });
    }
    entries
}

pub fn render_sitemap(tera: &Tera, entries: &[SitemapEntry]) -> Result<String, tera::Error> {
    let mut ctx = Context::new();
    ctx.insert("entries", entries);
    tera.render("feeds/sitemap.xml", &ctx)
}
