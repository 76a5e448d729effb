use axum::{
	Json, Router,
	extract::{Path, Query},
	http::StatusCode,
	routing::get,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
	api::{articles, cached, non_blank, require_role},
	auth::ApiSession,
	cache::cache_key,
	config::RessourcesRef,
	database::models::{Category, CategoryChangeset, CategoryId, NewCategory, Role},
	error::{RouteError, RouteResult},
};

pub const CACHE_PREFIX: &str = "categories";

pub fn router() -> Router<RessourcesRef> {
	Router::new()
		.route("/", get(categories_get_handler).post(categories_post_handler))
		.route(
			"/{id}",
			get(category_get_handler)
				.put(category_put_handler)
				.delete(category_delete_handler),
		)
}

#[derive(Debug, Deserialize)]
struct CategoriesQuery {
	#[serde(default)]
	all: bool,
}

// List categories in display order
async fn categories_get_handler(
	ressources: RessourcesRef,
	Query(CategoriesQuery { all }): Query<CategoriesQuery>,
) -> RouteResult<Json<Value>> {
	let key = cache_key(CACHE_PREFIX, [("all", all.then(|| "true".to_owned()))]);

	cached(&ressources, key, || async {
		ressources
			.with_conn(move |conn| Ok(Category::list(all, conn)?))
			.await
	})
	.await
}

#[derive(Debug, Deserialize)]
struct CategoryPostRequest {
	name: String,
	name_local: Option<String>,
	slug: Option<String>,
	slug_local: Option<String>,
	description: Option<String>,
	is_active: Option<bool>,
	sort_order: Option<i32>,
}

/// Explicit slugs win, otherwise one is derived from the name
fn resolve_slug(name: &str, slug: Option<&str>) -> Option<String> {
	let slug = match non_blank(slug) {
		Some(slug) => slug::slugify(slug),
		None => slug::slugify(name),
	};
	(!slug.is_empty()).then_some(slug)
}

async fn categories_post_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Json(request): Json<CategoryPostRequest>,
) -> RouteResult<(StatusCode, Json<Category>)> {
	require_role(&ressources, &auth, Role::Editor).await?;

	let Some(name) = non_blank(Some(request.name.as_str())).map(str::to_owned) else {
		return Err(RouteError::validation("a category needs a name"));
	};
	let Some(slug) = resolve_slug(&name, request.slug.as_deref()) else {
		return Err(RouteError::validation("could not derive a slug from the name"));
	};

	let category = ressources
		.with_conn(move |conn| {
			let new = NewCategory {
				name: &name,
				name_local: non_blank(request.name_local.as_deref()),
				slug: &slug,
				slug_local: non_blank(request.slug_local.as_deref()),
				description: request.description.as_deref(),
				is_active: request.is_active.unwrap_or(true),
				sort_order: request.sort_order.unwrap_or(0),
			};
			Category::create(&new, conn).map_err(conflict)
		})
		.await?;

	ressources.cache.invalidate_prefix(CACHE_PREFIX);
	tracing::info!(category_id = %category.id.0, slug = %category.slug, "category created");

	Ok((StatusCode::CREATED, Json(category)))
}

async fn category_get_handler(
	ressources: RessourcesRef,
	Path(id): Path<CategoryId>,
) -> RouteResult<Json<Category>> {
	let category = ressources
		.with_conn(move |conn| Category::find(id, conn).map_err(not_found))
		.await?;

	Ok(Json(category))
}

#[derive(Debug, Deserialize)]
struct CategoryPutRequest {
	name: Option<String>,
	name_local: Option<String>,
	slug: Option<String>,
	slug_local: Option<String>,
	description: Option<String>,
	is_active: Option<bool>,
	sort_order: Option<i32>,
}

impl CategoryPutRequest {
	/// A blank name is dropped rather than written, `None` when nothing is left
	fn normalized(self) -> Option<Self> {
		let request = Self {
			name: non_blank(self.name.as_deref()).map(str::to_owned),
			..self
		};
		let empty = request.name.is_none()
			&& request.name_local.is_none()
			&& request.slug.is_none()
			&& request.slug_local.is_none()
			&& request.description.is_none()
			&& request.is_active.is_none()
			&& request.sort_order.is_none();
		(!empty).then_some(request)
	}
}

async fn category_put_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Path(id): Path<CategoryId>,
	Json(request): Json<CategoryPutRequest>,
) -> RouteResult<Json<Category>> {
	require_role(&ressources, &auth, Role::Editor).await?;

	let Some(request) = request.normalized() else {
		return Err(RouteError::validation("nothing to update"));
	};

	let slug = request.slug.as_deref().map(slug::slugify);
	if slug.as_deref() == Some("") {
		return Err(RouteError::validation("slug cannot be empty"));
	}

	let category = ressources
		.with_conn(move |conn| {
			let changes = CategoryChangeset {
				name: request.name.as_deref(),
				name_local: request.name_local.as_deref(),
				slug: slug.as_deref(),
				slug_local: request.slug_local.as_deref(),
				description: request.description.as_deref(),
				is_active: request.is_active,
				sort_order: request.sort_order,
			};
			Category::update(id, &changes, conn)
				.map_err(conflict)
				.map_err(not_found)
		})
		.await?;

	// article listings embed nothing from categories, only ours go stale
	ressources.cache.invalidate_prefix(CACHE_PREFIX);

	Ok(Json(category))
}

async fn category_delete_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Path(id): Path<CategoryId>,
) -> RouteResult<StatusCode> {
	require_role(&ressources, &auth, Role::Editor).await?;

	let deleted = ressources
		.with_conn(move |conn| Ok(Category::delete(id, conn)?))
		.await?;
	if !deleted {
		return Err(RouteError::NotFound("category not found"));
	}

	// category filters of article listings may now resolve differently
	ressources.cache.invalidate_prefix(CACHE_PREFIX);
	ressources.cache.invalidate_prefix(articles::CACHE_PREFIX);

	Ok(StatusCode::NO_CONTENT)
}

fn conflict(err: diesel::result::Error) -> RouteError {
	match RouteError::from(err) {
		RouteError::Conflict(_) => RouteError::Conflict("a category with this slug already exists"),
		err => err,
	}
}

fn not_found(err: impl Into<RouteError>) -> RouteError {
	match err.into() {
		RouteError::NotFound(_) => RouteError::NotFound("category not found"),
		err => err,
	}
}
