use std::future::Future;

use futures::StreamExt;
use futures::stream::FuturesUnordered;

/// Polls all checks concurrently and resolves to `true` as soon as one of them
/// does. Resolves to `false` once every check has answered `false`.
///
/// Checks that can fail should map their failure to `false` themselves.
pub async fn any_of<I, F>(checks: I) -> bool
where
    I: IntoIterator<Item = F>,
    F: Future<Output = bool>,
{
    let mut pending: FuturesUnordered<F> = checks.into_iter().collect();

    while let Some(answer) = pending.next().await {
        if answer {
            return true;
        }
    }

    false
}
