use std::net::SocketAddr;

use axum::{
	Json, Router,
	extract::{ConnectInfo, Path, Query, Request},
	http::{HeaderMap, StatusCode, header},
	routing::get,
};
use serde::{Deserialize, Serialize};

use crate::{
	api::{articles::not_found, require_role},
	auth::ApiSession,
	config::RessourcesRef,
	database::{
		ReactionCount, Toggled, ViewCount,
		models::{Article, ArticleId, NewArticleView, NewReaction, ReactionType, Role},
	},
	error::RouteResult,
};

const DEFAULT_TOP_LIMIT: i64 = 10;
const MAX_TOP_LIMIT: i64 = 100;

pub fn article_router() -> Router<RessourcesRef> {
	Router::new()
		.route(
			"/{id}/reactions",
			get(reactions_get_handler).post(reactions_post_handler),
		)
		.route("/{id}/views", get(views_get_handler).post(views_post_handler))
}

pub fn analytics_router() -> Router<RessourcesRef> {
	Router::new().route("/top", get(top_get_handler))
}

#[derive(Debug, Serialize)]
struct ReactionsGetResponse {
	counts: Vec<ReactionCount>,
	/// Only filled for authenticated callers
	mine: Vec<ReactionType>,
}

async fn reactions_get_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Path(id): Path<ArticleId>,
) -> RouteResult<Json<ReactionsGetResponse>> {
	let user_id = auth.user_id().ok();

	let response = ressources
		.with_conn(move |conn| {
			let counts = ReactionCount::for_article(id, conn)?;
			let mine = match user_id {
				Some(user_id) => ReactionCount::of_user(id, user_id, conn)?,
				None => Vec::new(),
			};
			Ok(ReactionsGetResponse { counts, mine })
		})
		.await?;

	Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct ReactionsPostRequest {
	reaction_type: ReactionType,
}

#[derive(Debug, Serialize)]
struct ReactionsPostResponse {
	reaction_type: ReactionType,
	state: Toggled,
}

// Toggle one reaction of the caller
async fn reactions_post_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Path(id): Path<ArticleId>,
	Json(request): Json<ReactionsPostRequest>,
) -> RouteResult<Json<ReactionsPostResponse>> {
	let user_id = auth.user_id()?;
	let reaction_type = request.reaction_type;

	let state = ressources
		.with_conn(move |conn| {
			Article::find(id, conn)?;
			let reaction = NewReaction {
				article_id: id,
				user_id,
				reaction_type: reaction_type.as_str(),
			};
			Ok(reaction.toggle(conn)?)
		})
		.await
		.map_err(not_found)?;

	tracing::debug!(article_id = %id, ?reaction_type, ?state, "toggled reaction");

	Ok(Json(ReactionsPostResponse {
		reaction_type,
		state,
	}))
}

async fn views_get_handler(
	ressources: RessourcesRef,
	Path(id): Path<ArticleId>,
) -> RouteResult<Json<ViewCount>> {
	let count = ressources
		.with_conn(move |conn| Ok(ViewCount::for_article(id, conn)?))
		.await?;

	Ok(Json(count))
}

/// First hop of `x-forwarded-for`, else the socket peer
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
	headers
		.get("x-forwarded-for")
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.split(',').next())
		.map(str::trim)
		.filter(|value| !value.is_empty())
		.map(str::to_owned)
		.or_else(|| peer.map(|addr| addr.ip().to_string()))
}

// Record one view, anonymous or not
async fn views_post_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Path(id): Path<ArticleId>,
	request: Request,
) -> RouteResult<StatusCode> {
	let peer = request
		.extensions()
		.get::<ConnectInfo<SocketAddr>>()
		.map(|ConnectInfo(addr)| *addr);
	let ip = client_ip(request.headers(), peer);
	let user_agent = request
		.headers()
		.get(header::USER_AGENT)
		.and_then(|value| value.to_str().ok())
		.map(str::to_owned);
	let user_id = auth.user_id().ok();

	ressources
		.with_conn(move |conn| {
			Article::find(id, conn)?;
			NewArticleView {
				article_id: id,
				user_id,
				ip: ip.as_deref(),
				user_agent: user_agent.as_deref(),
			}
			.record(conn)?;
			Ok(())
		})
		.await
		.map_err(not_found)?;

	Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct TopQuery {
	limit: Option<i64>,
}

// Most viewed articles
async fn top_get_handler(
	auth: ApiSession,
	ressources: RessourcesRef,
	Query(query): Query<TopQuery>,
) -> RouteResult<Json<Vec<ViewCount>>> {
	require_role(&ressources, &auth, Role::Editor).await?;

	let limit = query
		.limit
		.unwrap_or(DEFAULT_TOP_LIMIT)
		.clamp(1, MAX_TOP_LIMIT);
	let top = ressources
		.with_conn(move |conn| Ok(ViewCount::top(limit, conn)?))
		.await?;

	Ok(Json(top))
}
