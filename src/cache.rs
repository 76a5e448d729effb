//! Expiry-checked response cache shared by the API handlers.
//!
//! Entries live until they are read after their deadline or until a write
//! to the same endpoint invalidates them. The map is unbounded.

use std::{collections::HashMap, time::Duration};

use itertools::Itertools;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::time::Instant;

#[derive(Debug)]
struct CacheEntry {
	payload: Value,
	expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct ResponseCache {
	entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
	/// Stale entries are evicted on the read that observes them
	pub fn get(&self, key: &str) -> Option<Value> {
		let now = Instant::now();

		{
			let entries = self.entries.read();
			match entries.get(key) {
				None => return None,
				Some(entry) if now < entry.expires_at => return Some(entry.payload.clone()),
				Some(_) => {}
			}
		}

		let mut entries = self.entries.write();
		// a writer may have refreshed the entry between both locks
		if entries.get(key).is_some_and(|entry| now >= entry.expires_at) {
			entries.remove(key);
		}
		None
	}

	pub fn insert(&self, key: String, payload: Value, ttl: Duration) {
		let entry = CacheEntry {
			payload,
			expires_at: Instant::now() + ttl,
		};
		self.entries.write().insert(key, entry);
	}

	pub fn invalidate_prefix(&self, prefix: &str) {
		self.entries.write().retain(|key, _| !key.starts_with(prefix));
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}
}

/// Builds a key out of an endpoint and its parameters, insensitive to their order
pub fn cache_key<'a>(
	endpoint: &str,
	params: impl IntoIterator<Item = (&'a str, Option<String>)>,
) -> String {
	let query = params
		.into_iter()
		.filter_map(|(name, value)| value.map(|value| (name, value)))
		.sorted()
		.map(|(name, value)| format!("{name}={value}"))
		.join("&");

	if query.is_empty() {
		endpoint.to_owned()
	} else {
		format!("{endpoint}?{query}")
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[tokio::test(start_paused = true)]
	async fn entries_expire_after_their_ttl() {
		let cache = ResponseCache::default();
		let payload = json!([{ "id": 1, "name": "Politics" }]);
		cache.insert("categories".into(), payload.clone(), Duration::from_secs(5));

		tokio::time::advance(Duration::from_secs(4)).await;
		assert_eq!(cache.get("categories"), Some(payload));

		tokio::time::advance(Duration::from_secs(1)).await;
		assert_eq!(cache.get("categories"), None);
		assert_eq!(cache.len(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn writes_overwrite_previous_payloads() {
		let cache = ResponseCache::default();
		cache.insert("k".into(), json!(1), Duration::from_secs(1));
		cache.insert("k".into(), json!(2), Duration::from_secs(60));

		tokio::time::advance(Duration::from_secs(2)).await;
		assert_eq!(cache.get("k"), Some(json!(2)));
	}

	#[test]
	fn missing_keys_are_absent() {
		let cache = ResponseCache::default();
		assert_eq!(cache.get("articles"), None);
	}

	#[tokio::test]
	async fn invalidation_only_touches_the_prefix() {
		let cache = ResponseCache::default();
		let ttl = Duration::from_secs(60);
		cache.insert("articles?limit=20".into(), json!([]), ttl);
		cache.insert("articles".into(), json!([]), ttl);
		cache.insert("categories".into(), json!([]), ttl);

		cache.invalidate_prefix("articles");

		assert_eq!(cache.len(), 1);
		assert!(cache.get("categories").is_some());
	}

	#[test]
	fn keys_ignore_parameter_order_and_absent_values() {
		let a = cache_key(
			"articles",
			[("status", Some("published".into())), ("limit", Some("20".into()))],
		);
		let b = cache_key(
			"articles",
			[
				("limit", Some("20".into())),
				("category", None),
				("status", Some("published".into())),
			],
		);

		assert_eq!(a, b);
		assert_eq!(a, "articles?limit=20&status=published");
		assert_eq!(cache_key("categories", []), "categories");
	}
}
