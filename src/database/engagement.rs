use diesel::{dsl, prelude::*};
use serde::Serialize;

use crate::database::models::{
	ArticleId, Bookmark, NewArticleView, NewBookmark, NewReaction, ReactionType, UserId,
};

impl Bookmark {
	pub fn list_for(user_id: UserId, conn: &mut PgConnection) -> QueryResult<Vec<Self>> {
		use crate::database::schema::*;
		bookmark::table
			.filter(bookmark::user_id.eq(user_id))
			.select(Self::as_select())
			.order(bookmark::created_at.desc())
			.load(conn)
	}

	pub fn exists(
		user_id: UserId,
		article_id: ArticleId,
		conn: &mut PgConnection,
	) -> QueryResult<bool> {
		use crate::database::schema::*;
		dsl::select(dsl::exists(bookmark::table.find((user_id, article_id)))).get_result(conn)
	}

	pub fn remove(
		user_id: UserId,
		article_id: ArticleId,
		conn: &mut PgConnection,
	) -> QueryResult<bool> {
		use crate::database::schema::*;
		let deleted = dsl::delete(bookmark::table.find((user_id, article_id))).execute(conn)?;
		Ok(deleted > 0)
	}
}

impl NewBookmark {
	/// Fails with a unique violation when the pair already exists
	pub fn insert(&self, conn: &mut PgConnection) -> QueryResult<Bookmark> {
		use crate::database::schema::*;
		dsl::insert_into(bookmark::table)
			.values(self)
			.returning(Bookmark::as_returning())
			.get_result(conn)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggled {
	Added,
	Removed,
}

impl NewReaction {
	/// Removes the reaction if present, adds it otherwise
	pub fn toggle(&self, conn: &mut PgConnection) -> QueryResult<Toggled> {
		use crate::database::schema::*;

		conn.transaction(|conn| {
			let key = (self.article_id, self.user_id, self.reaction_type);
			let removed = dsl::delete(reaction::table.find(key)).execute(conn)?;
			if removed > 0 {
				return Ok(Toggled::Removed);
			}

			// a concurrent toggle may have inserted the same row meanwhile
			dsl::insert_into(reaction::table)
				.values(self)
				.on_conflict_do_nothing()
				.execute(conn)?;

			Ok(Toggled::Added)
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReactionCount {
	pub reaction_type: ReactionType,
	pub count: i64,
}

impl ReactionCount {
	/// One entry per reaction type, zero when nobody reacted that way
	pub fn for_article(article_id: ArticleId, conn: &mut PgConnection) -> QueryResult<Vec<Self>> {
		use crate::database::schema::*;
		let rows = reaction::table
			.filter(reaction::article_id.eq(article_id))
			.group_by(reaction::reaction_type)
			.select((reaction::reaction_type, dsl::count_star()))
			.load::<(String, i64)>(conn)?;

		Ok(Self::fill(&rows))
	}

	fn fill(rows: &[(String, i64)]) -> Vec<Self> {
		ReactionType::ALL
			.into_iter()
			.map(|reaction_type| {
				let count = rows
					.iter()
					.find(|(kind, _)| kind == reaction_type.as_str())
					.map_or(0, |(_, count)| *count);
				Self {
					reaction_type,
					count,
				}
			})
			.collect()
	}

	pub fn of_user(
		article_id: ArticleId,
		user_id: UserId,
		conn: &mut PgConnection,
	) -> QueryResult<Vec<ReactionType>> {
		use crate::database::schema::*;
		let kinds = reaction::table
			.filter(reaction::article_id.eq(article_id))
			.filter(reaction::user_id.eq(user_id))
			.select(reaction::reaction_type)
			.load::<String>(conn)?;

		// the column check constraint keeps unknown values out
		Ok(kinds.iter().filter_map(|kind| kind.parse().ok()).collect())
	}
}

impl NewArticleView<'_> {
	pub fn record(&self, conn: &mut PgConnection) -> QueryResult<()> {
		use crate::database::schema::*;
		dsl::insert_into(article_view::table)
			.values(self)
			.execute(conn)?;
		Ok(())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Queryable)]
pub struct ViewCount {
	pub article_id: ArticleId,
	pub views: i64,
}

impl ViewCount {
	pub fn for_article(article_id: ArticleId, conn: &mut PgConnection) -> QueryResult<Self> {
		use crate::database::schema::*;
		let views = article_view::table
			.filter(article_view::article_id.eq(article_id))
			.count()
			.get_result(conn)?;
		Ok(Self { article_id, views })
	}

	/// Most viewed articles first
	pub fn top(limit: i64, conn: &mut PgConnection) -> QueryResult<Vec<Self>> {
		use crate::database::schema::*;
		article_view::table
			.group_by(article_view::article_id)
			.select((article_view::article_id, dsl::count_star()))
			.order(dsl::count_star().desc())
			.limit(limit)
			.load(conn)
	}
}

#[cfg(test)]
mod tests {
	use std::env;

	use diesel::Connection;
	use uuid::Uuid;

	use super::*;
	use crate::database::models::{Article, NewArticle};

	#[test]
	fn counts_cover_every_reaction_type() {
		let rows = vec![("love".to_owned(), 3), ("sad".to_owned(), 1)];
		let counts = ReactionCount::fill(&rows);

		assert_eq!(counts.len(), ReactionType::ALL.len());
		assert_eq!(
			counts,
			vec![
				ReactionCount { reaction_type: ReactionType::Like, count: 0 },
				ReactionCount { reaction_type: ReactionType::Love, count: 3 },
				ReactionCount { reaction_type: ReactionType::Wow, count: 0 },
				ReactionCount { reaction_type: ReactionType::Sad, count: 1 },
				ReactionCount { reaction_type: ReactionType::Angry, count: 0 },
			]
		);
	}

	fn test_connection() -> Option<PgConnection> {
		let url = env::var("EDENS_TEST_DATABASE_URL").ok()?;
		let mut conn = PgConnection::establish(&url).ok()?;
		conn.begin_test_transaction().ok()?;
		Some(conn)
	}

	#[test]
	#[ignore = "requires a postgres database in EDENS_TEST_DATABASE_URL"]
	fn toggling_twice_restores_the_original_state() {
		let mut conn = test_connection().expect("test database is reachable");
		{
			use diesel_migrations::MigrationHarness;
			conn.run_pending_migrations(crate::database::MIGRATIONS)
				.expect("migrations apply");
		}

		let article = Article::create(
			&NewArticle {
				title: Some("Rains arrive early"),
				title_local: None,
				content: None,
				content_local: None,
				image_url: None,
				status: "published",
				reporter: None,
				rss_imported: false,
				rss_source_id: None,
			},
			&mut conn,
		)
		.expect("article is created");

		let user_id = UserId(Uuid::new_v4());
		let reaction = NewReaction {
			article_id: article.id,
			user_id,
			reaction_type: ReactionType::Wow.as_str(),
		};

		assert_eq!(reaction.toggle(&mut conn).unwrap(), Toggled::Added);
		assert_eq!(
			ReactionCount::of_user(article.id, user_id, &mut conn).unwrap(),
			vec![ReactionType::Wow]
		);

		assert_eq!(reaction.toggle(&mut conn).unwrap(), Toggled::Removed);
		assert!(
			ReactionCount::of_user(article.id, user_id, &mut conn)
				.unwrap()
				.is_empty()
		);
	}
}
