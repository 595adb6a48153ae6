//! `get_and_fetch_latest`: emit the cached value immediately, then refresh
//! it in the background and emit the fresh value once it lands.

use blobcache::prelude::*;
use futures::StreamExt;
use std::sync::Arc;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
struct Price(u32);

#[tokio::main]
async fn main() -> Result<()> {
    let cache = FetchCache::new(Arc::new(InMemoryCache::new()), JsonSerializer::new());
    cache.typed().insert_object("widget", &Price(100), None).await?;

    let mut stream = Box::pin(cache.get_and_fetch_latest::<Price, _, _>(
        "widget",
        || async { Ok(Price(120)) },
        None,
        None,
        false,
        None,
    ));

    while let Some(result) = stream.next().await {
        println!("saw {:?}", result?);
    }

    let latest: Price = cache.typed().get_object("widget").await?;
    assert_eq!(latest, Price(120));
    Ok(())
}
