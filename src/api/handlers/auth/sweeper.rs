//! Background removal of refresh records past `expires_at`.

use super::{principal::PrincipalKind, store::CredentialStore};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Spawn the sweeper loop. Each pass covers every principal kind.
pub fn spawn_refresh_token_sweeper(
    store: Arc<dyn CredentialStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            let purged = sweep_once(store.as_ref()).await;
            if purged > 0 {
                info!(purged, "expired refresh records removed");
            } else {
                debug!("no expired refresh records");
            }
        }
    })
}

/// One pass over all kinds. A failing kind is logged and skipped.
pub(crate) async fn sweep_once(store: &dyn CredentialStore) -> u64 {
    let mut total = 0;
    for kind in PrincipalKind::ALL {
        match store.purge_expired_refresh_tokens(kind).await {
            Ok(purged) => total += purged,
            Err(err) => error!(kind = %kind, "refresh record sweep failed: {err}"),
        }
    }
    total
}
