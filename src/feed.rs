use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use thiserror::Error;

/// A loaded feed, RSS or Atom, normalized to one shape. `feed_url` is
/// the config URL the channel was fetched from and is the key used to
/// match channels back to config entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channel {
    pub title: String,
    pub description: String,
    pub link: String,
    pub feed_url: String,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    pub title: String,
    pub link: String,
    pub pub_date: String,
    /// Feed-supplied summary, flattened to plain text.
    pub description: String,
}

/// Extracted article content, ready for markdown rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub content: String,
    pub author: String,
    pub url: String,
}

/// Fetch errors split transient I/O from document parse failures; the
/// UI reports both but only the former invites a retry.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("fetching feed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    Status(u16),
    #[error("parsing feed: {0}")]
    Parse(#[from] quick_xml::de::DeError),
}

impl FeedError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FeedError::Http(_) | FeedError::Status(_))
    }
}

pub struct Reader {
    http: HttpClient,
    user_agent: String,
}

impl Reader {
    pub fn new(user_agent: impl Into<String>) -> Result<Self, FeedError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            user_agent: user_agent.into(),
        })
    }

    pub fn read(&self, url: &str) -> Result<Channel, FeedError> {
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response.text()?;
        let mut channel = parse(&body)?;
        channel.feed_url = url.to_string();
        Ok(channel)
    }
}

/// Parses a feed document, sniffing the root element for Atom.
pub fn parse(body: &str) -> Result<Channel, FeedError> {
    if body.contains("<feed") {
        parse_atom(body)
    } else {
        parse_rss(body)
    }
}

fn parse_rss(body: &str) -> Result<Channel, FeedError> {
    let document: RssDocument = quick_xml::de::from_str(body)?;
    let channel = document.channel;
    Ok(Channel {
        title: channel.title,
        description: channel.description,
        link: channel.link,
        feed_url: String::new(),
        items: channel
            .items
            .into_iter()
            .map(|item| Item {
                title: item.title,
                link: item.link,
                pub_date: item.pub_date,
                description: strip_html(&item.description),
            })
            .collect(),
    })
}

fn parse_atom(body: &str) -> Result<Channel, FeedError> {
    let feed: AtomFeed = quick_xml::de::from_str(body)?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let mut link = alternate_link(&entry.links);
            if link.is_empty() {
                // Entries without any link still need a stable address
                // for read-state tracking.
                link = entry.id;
            }
            let pub_date = if entry.published.is_empty() {
                entry.updated
            } else {
                entry.published
            };
            Item {
                title: entry.title,
                link,
                pub_date,
                description: strip_html(&entry.summary),
            }
        })
        .collect();

    Ok(Channel {
        title: feed.title,
        description: feed.subtitle,
        link: alternate_link(&feed.links),
        feed_url: String::new(),
        items,
    })
}

/// Prefers `rel="alternate"` (or an unmarked link), falling back to the
/// first link present.
fn alternate_link(links: &[AtomLink]) -> String {
    links
        .iter()
        .find(|link| link.rel == "alternate" || link.rel.is_empty())
        .or_else(|| links.first())
        .map(|link| link.href.clone())
        .unwrap_or_default()
}

/// Flattens feed-supplied HTML (item descriptions, summaries) to plain
/// text: tags removed, entities decoded, whitespace collapsed.
pub fn strip_html(html: &str) -> String {
    static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

    let without_tags = TAG_RE.replace_all(html, "");
    let decoded = html_escape::decode_html_entities(without_tags.as_ref());
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    link: String,
    #[serde(default, rename = "item")]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default, rename = "pubDate")]
    pub_date: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(default)]
    title: String,
    #[serde(default)]
    subtitle: String,
    #[serde(default, rename = "link")]
    links: Vec<AtomLink>,
    #[serde(default, rename = "entry")]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(default, rename = "@href")]
    href: String,
    #[serde(default, rename = "@rel")]
    rel: String,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    title: String,
    #[serde(default, rename = "link")]
    links: Vec<AtomLink>,
    #[serde(default)]
    id: String,
    #[serde(default)]
    updated: String,
    #[serde(default)]
    published: String,
    #[serde(default)]
    summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Example Blog</title>
    <description>Posts about things</description>
    <link>https://example.test</link>
    <item>
      <title>First &amp; foremost</title>
      <link>https://example.test/first</link>
      <pubDate>Mon, 06 Sep 2021 12:00:00 GMT</pubDate>
      <description>&lt;p&gt;An intro with &lt;b&gt;markup&lt;/b&gt;&lt;/p&gt;</description>
    </item>
    <item>
      <title>Second</title>
      <link>https://example.test/second</link>
      <pubDate>Tue, 07 Sep 2021 12:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Blog</title>
  <subtitle>Entries</subtitle>
  <link rel="self" href="https://atom.test/feed.xml"/>
  <link rel="alternate" href="https://atom.test"/>
  <entry>
    <title>Entry one</title>
    <link rel="alternate" href="https://atom.test/one"/>
    <id>urn:one</id>
    <published>2021-09-06T12:00:00Z</published>
    <updated>2021-09-07T12:00:00Z</updated>
  </entry>
  <entry>
    <title>Entry two</title>
    <id>urn:two</id>
    <updated>2021-09-08T12:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn parses_rss_channel() {
        let channel = parse(RSS_SAMPLE).unwrap();
        assert_eq!(channel.title, "Example Blog");
        assert_eq!(channel.items.len(), 2);
        assert_eq!(channel.items[0].title, "First & foremost");
        assert_eq!(channel.items[0].link, "https://example.test/first");
        assert_eq!(channel.items[0].description, "An intro with markup");
    }

    #[test]
    fn parses_atom_feed_with_alternate_links() {
        let channel = parse(ATOM_SAMPLE).unwrap();
        assert_eq!(channel.title, "Atom Blog");
        assert_eq!(channel.link, "https://atom.test");
        assert_eq!(channel.items[0].link, "https://atom.test/one");
        assert_eq!(channel.items[0].pub_date, "2021-09-06T12:00:00Z");
    }

    #[test]
    fn atom_entry_without_link_falls_back_to_id() {
        let channel = parse(ATOM_SAMPLE).unwrap();
        assert_eq!(channel.items[1].link, "urn:two");
        assert_eq!(channel.items[1].pub_date, "2021-09-08T12:00:00Z");
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let err = parse("<rss><channel><title>oops").unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn strip_html_removes_tags_and_decodes_entities() {
        let plain = strip_html("<p>Hello <b>world</b> &amp; friends</p>\n  <p>again</p>");
        assert_eq!(plain, "Hello world & friends again");
    }
}
