use diesel::{dsl, prelude::*, upsert::excluded};
use serde::Serialize;
use time::OffsetDateTime;

use crate::database::models::{
	NewProfile, Profile, ProfileChangeset, SettingsKind, SettingsRecord, UserId,
};

/// Identity as asserted by the external auth provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
	pub user_id: UserId,
	pub email: Option<String>,
}

impl Identity {
	/// Expired tokens resolve to nothing
	pub fn from_token(token: &str, conn: &mut PgConnection) -> QueryResult<Option<Self>> {
		use crate::database::schema::*;
		let now = OffsetDateTime::now_utc();
		auth_token::table
			.filter(auth_token::token.eq(token))
			.filter(
				auth_token::expires_at
					.is_null()
					.or(auth_token::expires_at.gt(now)),
			)
			.select((auth_token::user_id, auth_token::email))
			.get_result::<(UserId, Option<String>)>(conn)
			.optional()
			.map(|row| row.map(|(user_id, email)| Self { user_id, email }))
	}
}

impl Profile {
	pub fn find(user_id: UserId, conn: &mut PgConnection) -> QueryResult<Option<Self>> {
		use crate::database::schema::*;
		profile::table
			.find(user_id)
			.select(Self::as_select())
			.get_result(conn)
			.optional()
	}

	/// Creates the profile on first write
	pub fn upsert(
		user_id: UserId,
		changes: &ProfileChangeset<'_>,
		conn: &mut PgConnection,
	) -> QueryResult<Self> {
		use crate::database::schema::*;
		let new = NewProfile {
			user_id,
			display_name: changes.display_name,
			language: changes.language,
			theme: changes.theme,
		};

		dsl::insert_into(profile::table)
			.values(&new)
			.on_conflict(profile::user_id)
			.do_update()
			.set(changes)
			.returning(Self::as_returning())
			.get_result(conn)
	}
}

impl SettingsRecord {
	pub fn get(kind: SettingsKind, conn: &mut PgConnection) -> QueryResult<Option<Self>> {
		use crate::database::schema::*;
		settings::table
			.find(kind.as_str())
			.select(Self::as_select())
			.get_result(conn)
			.optional()
	}

	/// Overwrites the single record of `kind`
	pub fn replace(
		kind: SettingsKind,
		data: serde_json::Value,
		conn: &mut PgConnection,
	) -> QueryResult<Self> {
		use crate::database::schema::*;
		let record = Self {
			kind: kind.as_str().to_owned(),
			data,
			updated_at: OffsetDateTime::now_utc(),
		};

		dsl::insert_into(settings::table)
			.values(&record)
			.on_conflict(settings::kind)
			.do_update()
			.set((
				settings::data.eq(excluded(settings::data)),
				settings::updated_at.eq(excluded(settings::updated_at)),
			))
			.returning(Self::as_returning())
			.get_result(conn)
	}
}
