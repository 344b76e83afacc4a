use chrono::{DateTime, Utc};
use url::Url;

use crate::db::Article;

pub const SITE_TITLE: &str = "AI编程资讯聚合";
pub const SITE_DESCRIPTION: &str = "AI编程工具与实践的中文资讯聚合，提供最新的AI编程新闻、工具、教程和实践案例";
pub const ITEM_CATEGORY: &str = "AI编程";

/// Front-end routes advertised by the sitemap.
pub const SITE_ROUTES: &[&str] = &["/", "/auth", "/feedback"];

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// A literal "]]>" inside CDATA would terminate the section early
fn cdata(s: &str) -> String {
    format!("<![CDATA[{}]]>", s.replace("]]>", "]]]]><![CDATA[>"))
}

fn rfc2822(published_at: Option<&str>, now: DateTime<Utc>) -> String {
    published_at
        .and_then(|p| DateTime::parse_from_rfc3339(p).ok())
        .map(|dt| dt.to_rfc2822())
        .unwrap_or_else(|| now.to_rfc2822())
}

fn creator(original_url: &str) -> Option<String> {
    Url::parse(original_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
}

/// Full RSS 2.0 channel for the most recent articles.
pub fn rss_channel(site_url: &str, articles: &[Article]) -> String {
    let now = Utc::now();
    let site = site_url.trim_end_matches('/');

    let mut items = String::new();
    for article in articles {
        let pub_date = rfc2822(article.published_at.as_deref(), now);
        let description = article.summary.as_deref().unwrap_or(&article.title);
        let creator_tag = match creator(&article.original_url) {
            Some(host) => format!("\n      <dc:creator>{}</dc:creator>", xml_escape(&host)),
            None => String::new(),
        };
        items.push_str(&format!(
            r#"    <item>
      <title>{title}</title>
      <link>{link}</link>
      <guid isPermaLink="false">{guid}</guid>
      <pubDate>{pub_date}</pubDate>
      <description>{description}</description>{creator_tag}
      <category>{category}</category>
    </item>
"#,
            title = cdata(&article.title),
            link = xml_escape(&article.original_url),
            guid = article.id,
            pub_date = pub_date,
            description = cdata(description),
            creator_tag = creator_tag,
            category = ITEM_CATEGORY,
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
     xmlns:atom="http://www.w3.org/2005/Atom"
     xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>{title}</title>
    <link>{site}/</link>
    <description>{description}</description>
    <language>zh-CN</language>
    <lastBuildDate>{build_date}</lastBuildDate>
    <atom:link href="{site}/rss.xml" rel="self" type="application/rss+xml"/>
{items}  </channel>
</rss>
"#,
        title = SITE_TITLE,
        site = site,
        description = SITE_DESCRIPTION,
        build_date = now.to_rfc2822(),
        items = items,
    )
}

/// Minimal valid channel served when the store is empty or unavailable.
pub fn rss_fallback(site_url: &str) -> String {
    let site = site_url.trim_end_matches('/');
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>{title}</title>
    <link>{site}/</link>
    <description>{description}</description>
    <language>zh-CN</language>
    <lastBuildDate>{build_date}</lastBuildDate>
    <atom:link href="{site}/rss.xml" rel="self" type="application/rss+xml"/>
  </channel>
</rss>
"#,
        title = SITE_TITLE,
        site = site,
        description = SITE_DESCRIPTION,
        build_date = Utc::now().to_rfc2822(),
    )
}

/// Sitemap 0.9 for the static front-end routes. Never fails.
pub fn sitemap(site_url: &str) -> String {
    let site = site_url.trim_end_matches('/');
    let now = Utc::now().to_rfc3339();

    let urls: String = SITE_ROUTES
        .iter()
        .map(|route| {
            format!(
                r#"  <url>
    <loc>{site}{route}</loc>
    <lastmod>{now}</lastmod>
    <changefreq>daily</changefreq>
    <priority>0.7</priority>
  </url>
"#,
                site = site,
                route = route,
                now = now,
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
{urls}</urlset>
"#,
        urls = urls,
    )
}
