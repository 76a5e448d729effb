use axum::{Json, Router, extract::Path, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};

use crate::{
	api::articles::not_found,
	auth::ApiSession,
	config::RessourcesRef,
	database::models::{Article, ArticleId, Bookmark, NewBookmark},
	error::{RouteError, RouteResult},
};

pub fn router() -> Router<RessourcesRef> {
	Router::new()
		.route("/", get(bookmarks_get_handler).post(bookmarks_post_handler))
		.route(
			"/{article_id}",
			get(bookmark_get_handler).delete(bookmark_delete_handler),
		)
}

// Bookmarks of the caller, most recent first
async fn bookmarks_get_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
) -> RouteResult<Json<Vec<Bookmark>>> {
	let user_id = auth.user_id()?;

	let bookmarks = ressources
		.with_conn(move |conn| Ok(Bookmark::list_for(user_id, conn)?))
		.await?;

	Ok(Json(bookmarks))
}

#[derive(Debug, Deserialize)]
struct BookmarksPostRequest {
	article_id: ArticleId,
}

async fn bookmarks_post_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Json(BookmarksPostRequest { article_id }): Json<BookmarksPostRequest>,
) -> RouteResult<(StatusCode, Json<Bookmark>)> {
	let user_id = auth.user_id()?;

	let bookmark = ressources
		.with_conn(move |conn| {
			Article::find(article_id, conn).map_err(|err| not_found(err.into()))?;
			NewBookmark {
				user_id,
				article_id,
			}
			.insert(conn)
			.map_err(|err| match RouteError::from(err) {
				RouteError::Conflict(_) => RouteError::Conflict("article is already bookmarked"),
				err => err,
			})
		})
		.await?;

	tracing::debug!(user_id = %user_id.0, %article_id, "bookmarked article");

	Ok((StatusCode::CREATED, Json(bookmark)))
}

#[derive(Debug, Serialize)]
struct BookmarkGetResponse {
	bookmarked: bool,
}

async fn bookmark_get_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Path(article_id): Path<ArticleId>,
) -> RouteResult<Json<BookmarkGetResponse>> {
	let user_id = auth.user_id()?;

	let bookmarked = ressources
		.with_conn(move |conn| Ok(Bookmark::exists(user_id, article_id, conn)?))
		.await?;

	Ok(Json(BookmarkGetResponse { bookmarked }))
}

async fn bookmark_delete_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Path(article_id): Path<ArticleId>,
) -> RouteResult<StatusCode> {
	let user_id = auth.user_id()?;

	let removed = ressources
		.with_conn(move |conn| Ok(Bookmark::remove(user_id, article_id, conn)?))
		.await?;
	if !removed {
		return Err(RouteError::NotFound("bookmark not found"));
	}

	Ok(StatusCode::NO_CONTENT)
}
