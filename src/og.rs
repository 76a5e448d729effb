//! Open Graph and Twitter Card tags for shared article links.
//!
//! Crawlers do not run the SPA, so the article page is served with its meta
//! tags already filled in. Page delivery never depends on the API: every
//! failure serves the page as it is on disk.

use std::sync::LazyLock;

use askama::Template;
use axum::{extract::RawQuery, response::Html};
use eyre::WrapErr;
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
	config::{OgConfig, RessourcesRef},
	error::RouteResult,
};

const DESCRIPTION_MAX_CHARS: usize = 160;

const ID_PARAM: &str = "id";

static MARKUP: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"<[^>]*>").expect("markup pattern is valid"));

// tags that separate words when rendered
static BLOCK_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)</?(?:address|article|blockquote|br|dd|div|dl|dt|figcaption|figure|footer|h[1-6]|header|hr|li|ol|p|pre|section|table|td|th|tr|ul)\b[^>]*>")
		.expect("block markup pattern is valid")
});

#[derive(Template)]
#[template(path = "og_meta.html")]
struct OgMeta<'a> {
	title: &'a str,
	description: &'a str,
	image: &'a str,
	url: &'a str,
	site_name: &'a str,
}

/// The subset of an article the tags are built from
#[derive(Debug, Default, Deserialize)]
struct SharedArticle {
	title: Option<String>,
	title_local: Option<String>,
	content: Option<String>,
	content_local: Option<String>,
	image_url: Option<String>,
}

fn first_filled<'a>(candidates: [Option<&'a str>; 2], default: &'a str) -> &'a str {
	candidates
		.into_iter()
		.flatten()
		.find(|value| !value.trim().is_empty())
		.unwrap_or(default)
}

/// Drops tags and collapses whitespace, inline tags leave no gap behind
fn strip_html(text: &str) -> String {
	let text = BLOCK_MARKUP.replace_all(text, " ");
	MARKUP
		.replace_all(&text, "")
		.split_whitespace()
		.collect::<Vec<_>>()
		.join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
	text.chars().take(max).collect()
}

/// Inserts `tags` before the first closing head tag, if there is one
fn inject_meta(page: &str, tags: &str) -> Option<String> {
	let head_end = page.find("</head>")?;

	let mut html = String::with_capacity(page.len() + tags.len());
	html.push_str(&page[..head_end]);
	html.push_str(tags);
	html.push_str(&page[head_end..]);
	Some(html)
}

fn render_tags(article: &SharedArticle, og: &OgConfig, id: Uuid) -> askama::Result<String> {
	let title = strip_html(first_filled(
		[article.title.as_deref(), article.title_local.as_deref()],
		&og.default_title,
	));
	let description = truncate_chars(
		&strip_html(first_filled(
			[article.content.as_deref(), article.content_local.as_deref()],
			&og.default_description,
		)),
		DESCRIPTION_MAX_CHARS,
	);
	let image = first_filled([article.image_url.as_deref(), None], &og.default_image);
	let url = format!(
		"{}{}?id={id}",
		og.site_url.trim_end_matches('/'),
		og.page_path
	);

	OgMeta {
		title: &title,
		description: &description,
		image,
		url: &url,
		site_name: &og.site_name,
	}
	.render()
}

/// First non-blank `id` parameter, other parameters are left to the SPA
fn article_id(raw_query: Option<&str>) -> Option<String> {
	url::form_urlencoded::parse(raw_query?.as_bytes())
		.find(|(name, _)| name == ID_PARAM)
		.map(|(_, value)| value.trim().to_owned())
		.filter(|id| !id.is_empty())
}

pub async fn og_page_handler(
	ressources: RessourcesRef,
	RawQuery(raw_query): RawQuery,
) -> RouteResult<Html<String>> {
	let page = tokio::fs::read_to_string(&ressources.index_file)
		.await
		.wrap_err_with(|| format!("could not read {}", ressources.index_file.display()))?;

	let Some(id) = article_id(raw_query.as_deref()) else {
		return Ok(Html(page));
	};
	let Ok(id) = id.parse::<Uuid>() else {
		tracing::debug!(%id, "malformed article id on shared page");
		return Ok(Html(page));
	};

	let article = match ressources
		.api_client
		.get::<SharedArticle>(&format!("articles/{id}"))
		.await
	{
		Ok(article) => article,
		Err(err) => {
			tracing::warn!(%id, err = %err, "could not fetch article for link preview");
			return Ok(Html(page));
		}
	};

	let tags = match render_tags(&article, &ressources.og, id) {
		Ok(tags) => tags,
		Err(err) => {
			tracing::warn!(%id, err = %err, "could not render link preview tags");
			return Ok(Html(page));
		}
	};

	match inject_meta(&page, &tags) {
		Some(html) => Ok(Html(html)),
		None => Ok(Html(page)),
	}
}

#[cfg(test)]
mod tests {
	use axum::{Json, Router, extract::Path, http::StatusCode, routing::get};
	use serde_json::json;
	use tempfile::TempDir;

	use super::*;
	use crate::testing;

	const PAGE: &str = "<html><head><title>Edens News</title></head><body><div id=\"root\"></div></body></html>";
	const ARTICLE_ID: &str = "5f0c7e3a-1b2d-4c5e-8f9a-0b1c2d3e4f5a";

	fn og() -> OgConfig {
		testing::config().og
	}

	#[test]
	fn markup_is_stripped_and_whitespace_collapsed() {
		assert_eq!(
			strip_html("<p>Parliament <b>approves</b>\n\n the   budget</p>"),
			"Parliament approves the budget"
		);
		assert_eq!(strip_html("<p>Roads are <em>closed</em>.</p>"), "Roads are closed.");
		assert_eq!(strip_html("<P>First</P><p>Second<br/>line</p>"), "First Second line");
		assert_eq!(strip_html("a<span>b</span>c"), "abc");
	}

	#[test]
	fn only_the_first_id_counts() {
		assert_eq!(article_id(Some("id=a&id=b")).as_deref(), Some("a"));
		assert_eq!(article_id(Some("utm_source=x&id=%20abc%20")).as_deref(), Some("abc"));
		assert_eq!(article_id(Some("id=")), None);
		assert_eq!(article_id(Some("ids=1")), None);
		assert_eq!(article_id(None), None);
	}

	#[test]
	fn descriptions_are_cut_at_160_chars() {
		let article = SharedArticle {
			title: Some("Long read".into()),
			content: Some("ئ".repeat(400)),
			..SharedArticle::default()
		};
		let id = Uuid::nil();
		let tags = render_tags(&article, &og(), id).unwrap();

		let expected = format!("content=\"{}\"", "ئ".repeat(DESCRIPTION_MAX_CHARS));
		assert!(tags.contains(&expected));
		assert!(!tags.contains(&"ئ".repeat(DESCRIPTION_MAX_CHARS + 1)));
	}

	#[test]
	fn localized_title_is_used_when_alone() {
		let article = SharedArticle {
			title_local: Some("هەواڵی نوێ".into()),
			..SharedArticle::default()
		};
		let tags = render_tags(&article, &og(), Uuid::nil()).unwrap();
		assert!(tags.contains(r#"<meta property="og:title" content="هەواڵی نوێ" />"#));
	}

	#[test]
	fn primary_title_wins_over_the_localized_one() {
		let article = SharedArticle {
			title: Some("Breaking news".into()),
			title_local: Some("هەواڵی نوێ".into()),
			..SharedArticle::default()
		};
		let tags = render_tags(&article, &og(), Uuid::nil()).unwrap();
		assert!(tags.contains(r#"<meta property="og:title" content="Breaking news" />"#));
		assert!(tags.contains(r#"<meta name="twitter:title" content="Breaking news" />"#));
	}

	#[test]
	fn defaults_fill_missing_fields() {
		let tags = render_tags(&SharedArticle::default(), &og(), Uuid::nil()).unwrap();

		assert!(tags.contains(r#"<meta property="og:title" content="Edens News" />"#));
		assert!(tags.contains(r#"content="News from the Edens newsroom""#));
		assert!(tags.contains(r#"content="https://edensnews.com/og-default.png""#));
		assert!(tags.contains(
			r#"content="https://edensnews.com/article?id=00000000-0000-0000-0000-000000000000""#
		));
	}

	#[test]
	fn attribute_values_are_escaped() {
		let article = SharedArticle {
			title: Some(r#"Tom & Jerry say "hi""#.into()),
			..SharedArticle::default()
		};
		let tags = render_tags(&article, &og(), Uuid::nil()).unwrap();

		assert!(tags.contains("Tom &#38; Jerry say &#34;hi&#34;"));
		assert!(!tags.contains(r#""hi""#));
	}

	#[test]
	fn tags_land_before_the_closing_head() {
		let html = inject_meta(PAGE, "<meta />").unwrap();
		assert!(html.contains("<title>Edens News</title><meta /></head>"));
		assert_eq!(inject_meta("<html><body></body></html>", "<meta />"), None);
	}

	struct Fixture {
		_static_dir: TempDir,
		ressources: RessourcesRef,
	}

	async fn fixture(api: Router) -> Fixture {
		let static_dir = tempfile::tempdir().unwrap();
		std::fs::write(static_dir.path().join("index.html"), PAGE).unwrap();

		let base = testing::spawn_server(api).await;
		let mut config = testing::config();
		config.server.static_dir = static_dir.path().to_path_buf();
		config.og.api_base_url = format!("{base}/api").parse().unwrap();

		Fixture {
			ressources: testing::ressources(&config, None),
			_static_dir: static_dir,
		}
	}

	fn article_api() -> Router {
		Router::new().route(
			"/api/articles/{id}",
			get(async |Path(id): Path<String>| {
				if id == ARTICLE_ID {
					Ok(Json(json!({
						"id": id,
						"title": "Floods in the north",
						"content": "<p>Roads are <em>closed</em>.</p>",
						"image_url": "https://cdn.edensnews.com/floods.jpg",
					})))
				} else {
					Err((StatusCode::NOT_FOUND, Json(json!({ "error": "article not found" }))))
				}
			}),
		)
	}

	async fn serve_query(fixture: &Fixture, raw_query: Option<&str>) -> String {
		let query = RawQuery(raw_query.map(str::to_owned));
		let Html(html) = og_page_handler(fixture.ressources.clone(), query)
			.await
			.unwrap();
		html
	}

	async fn serve(fixture: &Fixture, id: Option<&str>) -> String {
		let raw_query = id.map(|id| format!("id={id}"));
		serve_query(fixture, raw_query.as_deref()).await
	}

	#[tokio::test]
	async fn pages_without_id_are_untouched() {
		let fixture = fixture(article_api()).await;
		assert_eq!(serve(&fixture, None).await, PAGE);
		assert_eq!(serve(&fixture, Some("  ")).await, PAGE);
	}

	#[tokio::test]
	async fn failed_fetches_serve_the_page_unmodified() {
		let fixture = fixture(article_api()).await;
		assert_eq!(
			serve(&fixture, Some("00000000-0000-0000-0000-000000000000")).await,
			PAGE
		);
		assert_eq!(serve(&fixture, Some("not-an-id")).await, PAGE);
	}

	#[tokio::test]
	async fn repeated_or_odd_parameters_still_serve_the_page() {
		let fixture = fixture(article_api()).await;
		assert_eq!(serve_query(&fixture, Some("id=a&id=b")).await, PAGE);
		assert_eq!(serve_query(&fixture, Some("id&&=%zz")).await, PAGE);

		let query = format!("id={ARTICLE_ID}&id=other&ref=share");
		let html = serve_query(&fixture, Some(query.as_str())).await;
		assert!(html.contains(r#"content="Floods in the north""#));
	}

	#[tokio::test]
	async fn fetched_articles_are_described_in_the_head() {
		let fixture = fixture(article_api()).await;
		let html = serve(&fixture, Some(ARTICLE_ID)).await;

		let head_end = html.find("</head>").unwrap();
		let title = html
			.find(r#"<meta property="og:title" content="Floods in the north" />"#)
			.unwrap();
		assert!(title < head_end);
		assert!(html.contains(r#"<meta property="og:description" content="Roads are closed." />"#));
		assert!(html.contains(r#"content="https://cdn.edensnews.com/floods.jpg""#));
		assert!(html.ends_with("<body><div id=\"root\"></div></body></html>"));
	}

	#[tokio::test]
	async fn unknown_api_routes_serve_the_page_unmodified() {
		let fixture = fixture(Router::new()).await;
		assert_eq!(serve(&fixture, Some(ARTICLE_ID)).await, PAGE);
	}
}
