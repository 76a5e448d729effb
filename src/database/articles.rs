use diesel::{dsl, prelude::*};

use crate::database::models::{
	Article, ArticleCategory, ArticleChangeset, ArticleId, ArticleStatus, Category, CategoryId,
	NewArticle,
};

#[derive(Debug, Clone, Copy)]
pub struct ArticleFilter {
	pub status: Option<ArticleStatus>,
	pub category: Option<CategoryId>,
	pub limit: i64,
	pub offset: i64,
}

impl Article {
	/// Newest first
	pub fn list(filter: &ArticleFilter, conn: &mut PgConnection) -> QueryResult<Vec<Self>> {
		use crate::database::schema::*;

		let mut query = article::table
			.select(Self::as_select())
			.order(article::created_at.desc())
			.limit(filter.limit)
			.offset(filter.offset)
			.into_boxed();

		if let Some(status) = filter.status {
			query = query.filter(article::status.eq(status.as_str()));
		}

		if let Some(category_id) = filter.category {
			let in_category = article_category::table
				.select(article_category::article_id)
				.filter(article_category::category_id.eq(category_id));
			query = query.filter(article::id.eq_any(in_category));
		}

		query.load(conn)
	}

	pub fn find(id: ArticleId, conn: &mut PgConnection) -> QueryResult<Self> {
		use crate::database::schema::*;
		article::table
			.find(id)
			.select(Self::as_select())
			.get_result(conn)
	}

	pub fn create(new: &NewArticle<'_>, conn: &mut PgConnection) -> QueryResult<Self> {
		use crate::database::schema::*;
		dsl::insert_into(article::table)
			.values(new)
			.returning(Self::as_returning())
			.get_result(conn)
	}

	pub fn update(
		id: ArticleId,
		changes: &ArticleChangeset<'_>,
		conn: &mut PgConnection,
	) -> QueryResult<Self> {
		use crate::database::schema::*;
		dsl::update(article::table.find(id))
			.set(changes)
			.returning(Self::as_returning())
			.get_result(conn)
	}

	/// Returns whether a row was removed
	pub fn delete(id: ArticleId, conn: &mut PgConnection) -> QueryResult<bool> {
		use crate::database::schema::*;
		let deleted = dsl::delete(article::table.find(id)).execute(conn)?;
		Ok(deleted > 0)
	}

	pub fn categories(id: ArticleId, conn: &mut PgConnection) -> QueryResult<Vec<Category>> {
		use crate::database::schema::*;
		article_category::table
			.inner_join(category::table)
			.filter(article_category::article_id.eq(id))
			.select(Category::as_select())
			.order((category::sort_order, category::name))
			.load(conn)
	}

	/// Replaces every category link of the article
	pub fn set_categories(
		id: ArticleId,
		category_ids: &[CategoryId],
		conn: &mut PgConnection,
	) -> QueryResult<Vec<Category>> {
		use crate::database::schema::*;

		conn.transaction(|conn| {
			// surface a missing article as `NotFound` instead of a foreign key error
			article::table.find(id).select(article::id).get_result::<ArticleId>(conn)?;

			dsl::delete(article_category::table.filter(article_category::article_id.eq(id)))
				.execute(conn)?;

			let links = category_ids
				.iter()
				.map(|&category_id| ArticleCategory {
					article_id: id,
					category_id,
				})
				.collect::<Vec<_>>();

			if !links.is_empty() {
				dsl::insert_into(article_category::table)
					.values(&links)
					.on_conflict_do_nothing()
					.execute(conn)?;
			}

			Self::categories(id, conn)
		})
	}
}
