//! Five concurrent callers ask for the same missing key; the fetch function
//! runs exactly once and every caller observes its result.

use blobcache::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
struct Quote(i64);

#[tokio::main]
async fn main() -> Result<()> {
    let cache = Arc::new(FetchCache::new(
        Arc::new(InMemoryCache::new()),
        JsonSerializer::new(),
    ));
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..5 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            let quote: Quote = cache
                .get_or_fetch_object(
                    "today",
                    move || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            Ok(Quote(42))
                        }
                    },
                    None,
                )
                .await?;
            println!("caller {i} got {quote:?}");
            Result::Ok(())
        }));
    }

    for handle in handles {
        handle.await.unwrap()?;
    }

    println!("fetch function ran {} time(s)", calls.load(Ordering::SeqCst));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}
