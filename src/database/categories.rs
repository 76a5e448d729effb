use diesel::{dsl, prelude::*};

use crate::database::models::{Category, CategoryChangeset, CategoryId, NewCategory};

impl Category {
	pub fn list(include_inactive: bool, conn: &mut PgConnection) -> QueryResult<Vec<Self>> {
		use crate::database::schema::*;

		let mut query = category::table
			.select(Self::as_select())
			.order((category::sort_order, category::name))
			.into_boxed();

		if !include_inactive {
			query = query.filter(category::is_active.eq(true));
		}

		query.load(conn)
	}

	pub fn find(id: CategoryId, conn: &mut PgConnection) -> QueryResult<Self> {
		use crate::database::schema::*;
		category::table
			.find(id)
			.select(Self::as_select())
			.get_result(conn)
	}

	pub fn create(new: &NewCategory<'_>, conn: &mut PgConnection) -> QueryResult<Self> {
		use crate::database::schema::*;
		dsl::insert_into(category::table)
			.values(new)
			.returning(Self::as_returning())
			.get_result(conn)
	}

	pub fn update(
		id: CategoryId,
		changes: &CategoryChangeset<'_>,
		conn: &mut PgConnection,
	) -> QueryResult<Self> {
		use crate::database::schema::*;
		dsl::update(category::table.find(id))
			.set(changes)
			.returning(Self::as_returning())
			.get_result(conn)
	}

	pub fn delete(id: CategoryId, conn: &mut PgConnection) -> QueryResult<bool> {
		use crate::database::schema::*;
		let deleted = dsl::delete(category::table.find(id)).execute(conn)?;
		Ok(deleted > 0)
	}
}
