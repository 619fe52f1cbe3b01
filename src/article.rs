use std::fmt::Write as _;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::feed::Article;

/// Containers tried in order when locating the readable part of a page.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    ".post-content",
    ".article-content",
    ".entry-content",
    "#content",
    ".content",
];

/// Page chrome and non-content subtrees skipped during the walk.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "noscript", "form", "iframe", "svg",
];

pub struct Fetcher {
    http: HttpClient,
    user_agent: String,
}

impl Fetcher {
    pub fn new(user_agent: impl Into<String>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building article http client")?;
        Ok(Self {
            http,
            user_agent: user_agent.into(),
        })
    }

    /// Fetches the page at `url` and extracts its readable content as
    /// markdown.
    pub fn extract(&self, url: &str) -> Result<Article> {
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .with_context(|| format!("fetching article {url}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("unexpected status code {status} for {url}"));
        }

        let body = response.text().context("reading article body")?;
        markdown_from_html(&body, url)
    }
}

/// Readability pass over an HTML document: finds the main content
/// container and re-emits it as markdown, resolving relative links
/// against `page_url`.
pub fn markdown_from_html(html: &str, page_url: &str) -> Result<Article> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).with_context(|| format!("invalid article url {page_url}"))?;

    let container = content_container(&document)
        .ok_or_else(|| anyhow!("no readable content found at {page_url}"))?;

    let mut blocks = Vec::new();
    walk_blocks(container, &base, &mut blocks);
    if blocks.is_empty() {
        return Err(anyhow!("no readable content found at {page_url}"));
    }

    Ok(Article {
        title: page_title(&document),
        content: blocks.join("\n\n"),
        author: page_author(&document),
        url: page_url.to_string(),
    })
}

fn content_container(document: &Html) -> Option<ElementRef<'_>> {
    for selector_str in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                return Some(element);
            }
        }
    }
    Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
}

fn page_title(document: &Html) -> String {
    if let Ok(selector) = Selector::parse("meta[property='og:title']") {
        if let Some(title) = document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("content"))
        {
            let title = title.trim();
            if !title.is_empty() {
                return title.to_string();
            }
        }
    }
    Selector::parse("title")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default()
}

fn page_author(document: &Html) -> String {
    Selector::parse("meta[name='author']")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .and_then(|el| el.value().attr("content"))
        .map(|author| author.trim().to_string())
        .unwrap_or_default()
}

/// Emits markdown blocks for the block-level children of `element`,
/// recursing through wrapper tags like `div` and `section`.
fn walk_blocks(element: ElementRef<'_>, base: &Url, out: &mut Vec<String>) {
    for child in element.children() {
        let Some(el) = ElementRef::wrap(child) else {
            if let Some(text) = child.value().as_text() {
                let text = collapse_whitespace(text);
                if !text.is_empty() {
                    out.push(text);
                }
            }
            continue;
        };

        let name = el.value().name();
        if SKIP_TAGS.contains(&name) {
            continue;
        }

        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name.as_bytes()[1] - b'0';
                let text = inline_text(el, base);
                if !text.is_empty() {
                    out.push(format!("{} {}", "#".repeat(level as usize), text));
                }
            }
            "p" => {
                let text = inline_text(el, base);
                if !text.is_empty() {
                    out.push(text);
                }
            }
            "ul" => {
                let items = list_items(el, base);
                if !items.is_empty() {
                    out.push(
                        items
                            .iter()
                            .map(|item| format!("- {item}"))
                            .collect::<Vec<_>>()
                            .join("\n"),
                    );
                }
            }
            "ol" => {
                let items = list_items(el, base);
                if !items.is_empty() {
                    out.push(
                        items
                            .iter()
                            .enumerate()
                            .map(|(i, item)| format!("{}. {item}", i + 1))
                            .collect::<Vec<_>>()
                            .join("\n"),
                    );
                }
            }
            "blockquote" => {
                let mut inner = Vec::new();
                walk_blocks(el, base, &mut inner);
                if !inner.is_empty() {
                    out.push(
                        inner
                            .join("\n")
                            .lines()
                            .map(|line| format!("> {line}"))
                            .collect::<Vec<_>>()
                            .join("\n"),
                    );
                }
            }
            "pre" => {
                let code = el.text().collect::<String>();
                let code = code.trim_end();
                if !code.trim().is_empty() {
                    out.push(format!("```\n{code}\n```"));
                }
            }
            "hr" => out.push("---".to_string()),
            _ => walk_blocks(el, base, out),
        }
    }
}

fn list_items(list: ElementRef<'_>, base: &Url) -> Vec<String> {
    list.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "li")
        .map(|el| inline_text(el, base))
        .filter(|item| !item.is_empty())
        .collect()
}

/// Flattens the inline content of an element to a single markdown
/// line: links become `[text](url)`, emphasis keeps its markers, and
/// whitespace collapses.
fn inline_text(element: ElementRef<'_>, base: &Url) -> String {
    let mut out = String::new();
    inline_into(element, base, &mut out);
    collapse_whitespace(&out)
}

fn inline_into(element: ElementRef<'_>, base: &Url, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }
        let Some(el) = ElementRef::wrap(child) else {
            continue;
        };

        let name = el.value().name();
        if SKIP_TAGS.contains(&name) {
            continue;
        }

        match name {
            "a" => {
                let label = inline_text(el, base);
                let resolved = el
                    .value()
                    .attr("href")
                    .and_then(|href| resolve_href(base, href));
                match resolved {
                    Some(url) => {
                        let label = if label.is_empty() {
                            url.clone()
                        } else {
                            label
                        };
                        let _ = write!(out, "[{label}]({url})");
                    }
                    None => out.push_str(&label),
                }
            }
            "strong" | "b" => {
                let inner = inline_text(el, base);
                if !inner.is_empty() {
                    let _ = write!(out, "**{inner}**");
                }
            }
            "em" | "i" => {
                let inner = inline_text(el, base);
                if !inner.is_empty() {
                    let _ = write!(out, "*{inner}*");
                }
            }
            "code" => {
                let inner = el.text().collect::<String>();
                let inner = inner.trim();
                if !inner.is_empty() {
                    let _ = write!(out, "`{inner}`");
                }
            }
            "br" => out.push(' '),
            _ => inline_into(el, base, out),
        }
    }
}

/// Resolves an href against the page URL, keeping only http(s) targets
/// and dropping same-page fragments.
fn resolve_href(base: &Url, href: &str) -> Option<String> {
    if href.starts_with('#') {
        return None;
    }
    let resolved = base.join(href).ok()?;
    if !resolved.scheme().starts_with("http") {
        return None;
    }
    Some(resolved.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html>
<head>
  <title>  A Long Read — Example  </title>
  <meta name="author" content="Jo Writer">
</head>
<body>
  <nav><a href="/home">Home</a></nav>
  <article>
    <h1>A Long Read</h1>
    <p>Intro with a <a href="/follow-up">relative link</a> and a
       <a href="https://other.test/abs">remote one</a>.</p>
    <script>alert("nope")</script>
    <h2>Details</h2>
    <ul>
      <li>first point</li>
      <li>second <strong>bold</strong> point</li>
    </ul>
    <blockquote><p>Someone said this.</p></blockquote>
    <pre>let x = 1;</pre>
  </article>
  <footer>copyright</footer>
</body>
</html>"#;

    #[test]
    fn extracts_article_container_and_metadata() {
        let article = markdown_from_html(PAGE, "https://example.test/posts/1").unwrap();
        assert_eq!(article.title, "A Long Read — Example");
        assert_eq!(article.author, "Jo Writer");
        assert_eq!(article.url, "https://example.test/posts/1");
        assert!(article.content.starts_with("# A Long Read"));
        assert!(!article.content.contains("alert"));
        assert!(!article.content.contains("copyright"));
        assert!(!article.content.contains("Home"));
    }

    #[test]
    fn resolves_relative_links_against_page_url() {
        let article = markdown_from_html(PAGE, "https://example.test/posts/1").unwrap();
        assert!(article
            .content
            .contains("[relative link](https://example.test/follow-up)"));
        assert!(article
            .content
            .contains("[remote one](https://other.test/abs)"));
    }

    #[test]
    fn renders_lists_quotes_and_code_blocks() {
        let article = markdown_from_html(PAGE, "https://example.test/posts/1").unwrap();
        assert!(article.content.contains("- first point"));
        assert!(article.content.contains("- second **bold** point"));
        assert!(article.content.contains("> Someone said this."));
        assert!(article.content.contains("```\nlet x = 1;\n```"));
    }

    #[test]
    fn prefers_og_title_when_present() {
        let html = r#"<html><head>
            <meta property="og:title" content="Social Title">
            <title>Tab Title</title>
        </head><body><article><p>hi</p></article></body></html>"#;
        let article = markdown_from_html(html, "https://example.test/").unwrap();
        assert_eq!(article.title, "Social Title");
    }

    #[test]
    fn body_fallback_when_no_container_matches() {
        let html = "<html><body><p>just a paragraph</p></body></html>";
        let article = markdown_from_html(html, "https://example.test/").unwrap();
        assert_eq!(article.content, "just a paragraph");
    }

    #[test]
    fn empty_page_is_an_error() {
        let html = "<html><body><nav>only chrome</nav></body></html>";
        assert!(markdown_from_html(html, "https://example.test/").is_err());
    }
}
