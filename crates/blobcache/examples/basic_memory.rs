//! Typed insert/get/invalidate against the in-memory backend.

use blobcache::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
struct User {
    name: String,
    bio: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cache = TypedCache::new(Arc::new(InMemoryCache::new()), JsonSerializer::new());

    let user = User {
        name: "octocat".into(),
        bio: "probably a cat".into(),
    };
    cache.insert_object("u1", &user, None).await?;

    let fetched: User = cache.get_object("u1").await?;
    println!("fetched: {fetched:?}");
    assert_eq!(fetched, user);

    cache.invalidate_object::<User>("u1").await?;
    match cache.get_object::<User>("u1").await {
        Err(CacheError::NotFound(key)) => println!("{key} is gone, as expected"),
        other => panic!("expected NotFound, got {other:?}"),
    }

    Ok(())
}
