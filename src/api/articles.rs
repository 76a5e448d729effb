use axum::{
	Json, Router,
	extract::{Path, Query},
	http::StatusCode,
	routing::get,
};
use diesel::Connection;
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::{
	api::{caller_role, cached, engagement, non_blank, require_role},
	auth::ApiSession,
	cache::cache_key,
	config::RessourcesRef,
	database::{
		ArticleFilter,
		models::{
			Article, ArticleChangeset, ArticleId, ArticleStatus, Category, CategoryId, NewArticle,
			Role,
		},
	},
	error::{AuthError, RouteError, RouteResult},
};

pub const CACHE_PREFIX: &str = "articles";

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

pub fn router() -> Router<RessourcesRef> {
	Router::new()
		.route("/", get(articles_get_handler).post(articles_post_handler))
		.route(
			"/{id}",
			get(article_get_handler)
				.put(article_put_handler)
				.delete(article_delete_handler),
		)
		.route(
			"/{id}/categories",
			get(article_categories_get_handler).put(article_categories_put_handler),
		)
		.merge(engagement::article_router())
}

#[derive(Debug, Deserialize)]
struct ArticlesQuery {
	status: Option<ArticleStatus>,
	category: Option<CategoryId>,
	limit: Option<i64>,
	offset: Option<i64>,
}

impl ArticlesQuery {
	fn into_filter(self) -> ArticleFilter {
		ArticleFilter {
			status: self.status,
			category: self.category,
			limit: self
				.limit
				.unwrap_or(DEFAULT_PAGE_SIZE)
				.clamp(1, MAX_PAGE_SIZE),
			offset: self.offset.unwrap_or(0).max(0),
		}
	}
}

fn filter_cache_key(filter: &ArticleFilter) -> String {
	cache_key(
		CACHE_PREFIX,
		[
			("status", filter.status.map(|status| status.as_str().to_owned())),
			("category", filter.category.map(|id| id.0.to_string())),
			("limit", Some(filter.limit.to_string())),
			("offset", Some(filter.offset.to_string())),
		],
	)
}

/// Below reporters, listings only hold published articles
fn visible_filter(mut filter: ArticleFilter, role: Role) -> Option<ArticleFilter> {
	if role >= Role::Reporter {
		return Some(filter);
	}

	match filter.status {
		Some(ArticleStatus::Draft) => None,
		_ => {
			filter.status = Some(ArticleStatus::Published);
			Some(filter)
		}
	}
}

// List articles, newest first
async fn articles_get_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Query(query): Query<ArticlesQuery>,
) -> RouteResult<Json<Value>> {
	let role = caller_role(&ressources, &auth).await?;
	let Some(filter) = visible_filter(query.into_filter(), role) else {
		auth.identity()?;
		return Err(AuthError::Forbidden.into());
	};
	let key = filter_cache_key(&filter);

	cached(&ressources, key, || async {
		ressources
			.with_conn(move |conn| Ok(Article::list(&filter, conn)?))
			.await
	})
	.await
}

#[derive(Debug, Deserialize)]
struct ArticlePostRequest {
	title: Option<String>,
	title_local: Option<String>,
	content: Option<String>,
	content_local: Option<String>,
	image_url: Option<String>,
	status: Option<ArticleStatus>,
	reporter: Option<String>,
	#[serde(default)]
	rss_imported: bool,
	rss_source_id: Option<String>,
	#[serde(default)]
	category_ids: Vec<CategoryId>,
}

// Create an article, optionally linked to categories
async fn articles_post_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Json(request): Json<ArticlePostRequest>,
) -> RouteResult<(StatusCode, Json<Article>)> {
	require_role(&ressources, &auth, Role::Reporter).await?;

	if non_blank(request.title.as_deref()).is_none()
		&& non_blank(request.title_local.as_deref()).is_none()
	{
		return Err(RouteError::validation("an article needs a title in at least one language"));
	}

	let article = ressources
		.with_conn(move |conn| {
			let new = NewArticle {
				title: non_blank(request.title.as_deref()),
				title_local: non_blank(request.title_local.as_deref()),
				content: request.content.as_deref(),
				content_local: request.content_local.as_deref(),
				image_url: non_blank(request.image_url.as_deref()),
				status: request.status.unwrap_or(ArticleStatus::Draft).as_str(),
				reporter: non_blank(request.reporter.as_deref()),
				rss_imported: request.rss_imported,
				rss_source_id: non_blank(request.rss_source_id.as_deref()),
			};

			let article = conn.transaction::<_, diesel::result::Error, _>(|conn| {
				let article = Article::create(&new, conn)?;
				if !request.category_ids.is_empty() {
					Article::set_categories(article.id, &request.category_ids, conn)?;
				}
				Ok(article)
			})?;

			Ok(article)
		})
		.await?;

	ressources.cache.invalidate_prefix(CACHE_PREFIX);
	tracing::info!(article_id = %article.id, "article created");

	Ok((StatusCode::CREATED, Json(article)))
}

async fn article_get_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Path(id): Path<ArticleId>,
) -> RouteResult<Json<Article>> {
	let article = ressources
		.with_conn(move |conn| Ok(Article::find(id, conn)?))
		.await
		.map_err(not_found)?;

	// drafts do not exist outside the newsroom
	if article.status == ArticleStatus::Draft.as_str()
		&& caller_role(&ressources, &auth).await? < Role::Reporter
	{
		return Err(RouteError::NotFound("article not found"));
	}

	Ok(Json(article))
}

#[derive(Debug, Deserialize)]
struct ArticlePutRequest {
	title: Option<String>,
	title_local: Option<String>,
	content: Option<String>,
	content_local: Option<String>,
	image_url: Option<String>,
	status: Option<ArticleStatus>,
	reporter: Option<String>,
}

// Absent fields are left untouched
async fn article_put_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Path(id): Path<ArticleId>,
	Json(request): Json<ArticlePutRequest>,
) -> RouteResult<Json<Article>> {
	require_role(&ressources, &auth, Role::Reporter).await?;

	let article = ressources
		.with_conn(move |conn| {
			let changes = ArticleChangeset {
				title: request.title.as_deref(),
				title_local: request.title_local.as_deref(),
				content: request.content.as_deref(),
				content_local: request.content_local.as_deref(),
				image_url: request.image_url.as_deref(),
				status: request.status.map(ArticleStatus::as_str),
				reporter: request.reporter.as_deref(),
				updated_at: OffsetDateTime::now_utc(),
			};
			Ok(Article::update(id, &changes, conn)?)
		})
		.await
		.map_err(not_found)?;

	ressources.cache.invalidate_prefix(CACHE_PREFIX);
	tracing::info!(article_id = %id, "article updated");

	Ok(Json(article))
}

async fn article_delete_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Path(id): Path<ArticleId>,
) -> RouteResult<StatusCode> {
	require_role(&ressources, &auth, Role::Editor).await?;

	let deleted = ressources
		.with_conn(move |conn| Ok(Article::delete(id, conn)?))
		.await?;
	if !deleted {
		return Err(RouteError::NotFound("article not found"));
	}

	ressources.cache.invalidate_prefix(CACHE_PREFIX);
	tracing::info!(article_id = %id, "article deleted");

	Ok(StatusCode::NO_CONTENT)
}

async fn article_categories_get_handler(
	ressources: RessourcesRef,
	Path(id): Path<ArticleId>,
) -> RouteResult<Json<Vec<Category>>> {
	let categories = ressources
		.with_conn(move |conn| Ok(Article::categories(id, conn)?))
		.await?;

	Ok(Json(categories))
}

#[derive(Debug, Deserialize)]
struct ArticleCategoriesPutRequest {
	category_ids: Vec<CategoryId>,
}

// Replace the categories of an article
async fn article_categories_put_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Path(id): Path<ArticleId>,
	Json(request): Json<ArticleCategoriesPutRequest>,
) -> RouteResult<Json<Vec<Category>>> {
	require_role(&ressources, &auth, Role::Reporter).await?;

	let categories = ressources
		.with_conn(move |conn| Ok(Article::set_categories(id, &request.category_ids, conn)?))
		.await
		.map_err(not_found)?;

	ressources.cache.invalidate_prefix(CACHE_PREFIX);

	Ok(Json(categories))
}

/// Names the missing resource instead of the generic message
pub fn not_found(err: RouteError) -> RouteError {
	match err {
		RouteError::NotFound(_) => RouteError::NotFound("article not found"),
		err => err,
	}
}
