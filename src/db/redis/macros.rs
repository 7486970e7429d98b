/// Read-through caching over Redis.
///
/// Returns the cached value for `$key` when present. Otherwise awaits
/// `$block` and returns its result, handing it to the background writer
/// with `$ttl` seconds to live. A failed cache read is logged and treated as
/// a miss.
///
/// Writers bump `$generation` before evicting. A value whose load overlapped
/// such a bump may predate the write and is returned without being cached.
///
/// # Arguments
/// * `$cache`: a [`Cache`](crate::db::Cache) (anything with `get_from_cache` and
///   `set_in_background`).
/// * `$key`: the [`CacheKey`](crate::db::CacheKey) to read and write.
/// * `$ttl`: time-to-live in seconds.
/// * `$generation`: a `tokio::sync::Mutex<u64>` shared with the writers.
/// * `$block`: future computing the value on a miss; its error must convert into `AppError`.
///
/// # Example
/// ```rust,ignore
/// let pool: Vec<Match> = cached!(
///     self.cache,
///     CacheKey::UpcomingMatches(from),
///     self.ttl,
///     self.generation,
///     self.inner.upcoming_matches(from)
/// )?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $generation:expr, $block:expr) => {{
        let lookup = match $cache.get_from_cache(&$key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(key = %$key, error = %e, "Cache read failed, loading from source");
                None
            }
        };

        if let Some(cached) = lookup {
            tracing::debug!(key = %$key, "Cache hit");
            Ok(cached)
        } else {
            tracing::debug!(key = %$key, "Cache miss");
            let started = *$generation.lock().await;
            let value = $block.await?;

            let current = $generation.lock().await;
            if *current == started {
                $cache.set_in_background(&$key, &value, $ttl);
            } else {
                tracing::debug!(key = %$key, "Source changed during load, not caching");
            }
            drop(current);

            Ok(value)
        }
    }};
}
