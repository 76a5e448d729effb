use std::{fmt, str::FromStr};

use diesel::prelude::*;
use diesel_derive_newtype::DieselNewType;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::database::schema::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DieselNewType, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(pub Uuid);

impl fmt::Display for ArticleId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DieselNewType, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DieselNewType, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

/// Lifecycle of an article, stored as text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
	Draft,
	Published,
}

impl ArticleStatus {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Draft => "draft",
			Self::Published => "published",
		}
	}
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = article)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Article {
	pub id: ArticleId,

	pub title: Option<String>,
	pub title_local: Option<String>,
	pub content: Option<String>,
	pub content_local: Option<String>,
	pub image_url: Option<String>,

	pub status: String,
	pub reporter: Option<String>,

	pub rss_imported: bool,
	pub rss_source_id: Option<String>,

	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = article)]
pub struct NewArticle<'a> {
	pub title: Option<&'a str>,
	pub title_local: Option<&'a str>,
	pub content: Option<&'a str>,
	pub content_local: Option<&'a str>,
	pub image_url: Option<&'a str>,

	pub status: &'static str,
	pub reporter: Option<&'a str>,

	pub rss_imported: bool,
	pub rss_source_id: Option<&'a str>,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = article)]
pub struct ArticleChangeset<'a> {
	pub title: Option<&'a str>,
	pub title_local: Option<&'a str>,
	pub content: Option<&'a str>,
	pub content_local: Option<&'a str>,
	pub image_url: Option<&'a str>,
	pub status: Option<&'static str>,
	pub reporter: Option<&'a str>,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = category)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Category {
	pub id: CategoryId,

	pub name: String,
	pub name_local: Option<String>,
	pub slug: String,
	pub slug_local: Option<String>,
	pub description: Option<String>,

	pub is_active: bool,
	pub sort_order: i32,

	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = category)]
pub struct NewCategory<'a> {
	pub name: &'a str,
	pub name_local: Option<&'a str>,
	pub slug: &'a str,
	pub slug_local: Option<&'a str>,
	pub description: Option<&'a str>,
	pub is_active: bool,
	pub sort_order: i32,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = category)]
pub struct CategoryChangeset<'a> {
	pub name: Option<&'a str>,
	pub name_local: Option<&'a str>,
	pub slug: Option<&'a str>,
	pub slug_local: Option<&'a str>,
	pub description: Option<&'a str>,
	pub is_active: Option<bool>,
	pub sort_order: Option<i32>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = article_category)]
pub struct ArticleCategory {
	pub article_id: ArticleId,
	pub category_id: CategoryId,
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = bookmark)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Bookmark {
	pub user_id: UserId,
	pub article_id: ArticleId,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = bookmark)]
pub struct NewBookmark {
	pub user_id: UserId,
	pub article_id: ArticleId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
	Like,
	Love,
	Wow,
	Sad,
	Angry,
}

impl ReactionType {
	pub const ALL: [Self; 5] = [Self::Like, Self::Love, Self::Wow, Self::Sad, Self::Angry];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Like => "like",
			Self::Love => "love",
			Self::Wow => "wow",
			Self::Sad => "sad",
			Self::Angry => "angry",
		}
	}
}

impl FromStr for ReactionType {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|kind| kind.as_str() == s)
			.ok_or(())
	}
}

#[derive(Debug, Insertable)]
#[diesel(table_name = reaction)]
pub struct NewReaction {
	pub article_id: ArticleId,
	pub user_id: UserId,
	pub reaction_type: &'static str,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = article_view)]
pub struct NewArticleView<'a> {
	pub article_id: ArticleId,
	pub user_id: Option<UserId>,
	pub ip: Option<&'a str>,
	pub user_agent: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsKind {
	Site,
	Stream,
}

impl SettingsKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Site => "site",
			Self::Stream => "stream",
		}
	}
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = settings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SettingsRecord {
	pub kind: String,
	pub data: serde_json::Value,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}

/// Ordered from the least to the most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	#[default]
	Reader,
	Reporter,
	Editor,
	Admin,
}

impl FromStr for Role {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"reader" => Ok(Self::Reader),
			"reporter" => Ok(Self::Reporter),
			"editor" => Ok(Self::Editor),
			"admin" => Ok(Self::Admin),
			_ => Err(()),
		}
	}
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = profile)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Profile {
	pub user_id: UserId,
	pub display_name: Option<String>,
	pub role: String,
	pub language: String,
	pub theme: String,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}

impl Profile {
	/// Unknown role strings are treated as the least privileged one
	pub fn role(&self) -> Role {
		self.role.parse().unwrap_or_default()
	}
}

#[derive(Debug, Insertable)]
#[diesel(table_name = profile)]
pub struct NewProfile<'a> {
	pub user_id: UserId,
	pub display_name: Option<&'a str>,
	pub language: Option<&'a str>,
	pub theme: Option<&'a str>,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = profile)]
pub struct ProfileChangeset<'a> {
	pub display_name: Option<&'a str>,
	pub language: Option<&'a str>,
	pub theme: Option<&'a str>,
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case("like", Some(ReactionType::Like))]
	#[case("angry", Some(ReactionType::Angry))]
	#[case("Like", None)]
	#[case("meh", None)]
	fn reaction_type_parses_fixed_set(#[case] input: &str, #[case] expected: Option<ReactionType>) {
		assert_eq!(input.parse::<ReactionType>().ok(), expected);
	}

	#[test]
	fn roles_are_ordered_by_privilege() {
		assert!(Role::Reader < Role::Reporter);
		assert!(Role::Reporter < Role::Editor);
		assert!(Role::Editor < Role::Admin);
		assert_eq!("superuser".parse::<Role>(), Err(()));
	}

	#[test]
	fn status_serializes_lowercase() {
		let json = serde_json::to_string(&ArticleStatus::Published).unwrap();
		assert_eq!(json, "\"published\"");
		assert_eq!(ArticleStatus::Draft.as_str(), "draft");
	}
}
