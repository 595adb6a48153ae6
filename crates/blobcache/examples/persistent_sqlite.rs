//! Round-tripping a typed object through the SQLite-backed store: insert,
//! shut the handle down, reopen the same file, and read it back.

use blobcache::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
struct User {
    name: String,
    bio: String,
    blog: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let dir = std::env::temp_dir().join("blobcache-example");
    std::fs::create_dir_all(&dir).expect("create example scratch dir");
    let path = dir.join("cache.db");

    {
        let backend = Arc::new(PersistentCache::open(&path).await?);
        let cache = TypedCache::new(backend.clone(), JsonSerializer::new());
        cache
            .insert_object(
                "u1",
                &User {
                    name: "octocat".into(),
                    bio: "cool".into(),
                    blog: "http://github.blog".into(),
                },
                None,
            )
            .await?;
        backend.shutdown().await?;
    }

    let backend = Arc::new(PersistentCache::open(&path).await?);
    let cache = TypedCache::new(backend.clone(), JsonSerializer::new());
    let user: User = cache.get_object("u1").await?;
    println!("reopened and read back: {user:?}");
    backend.shutdown().await?;

    Ok(())
}
