//! One-time e-mail dispatch for a batch.
//!
//! A batch moves from `Created` to `Notified` exactly once, and only after
//! the notification was handed to the transport. Every gate runs before
//! the send; the flag is flipped only after the send returns.

use lote_types::models::{DispatchState, Identity, Lote};
use tracing::{debug, error, info, warn};

use crate::error::ApiError;
use crate::notifier::Notification;
use crate::state::{AppState, blocking};

pub async fn dispatch(
    state: &AppState,
    caller: Option<&Identity>,
    lote_id: &str,
) -> Result<Lote, ApiError> {
    let caller = caller.ok_or(ApiError::Unauthenticated)?;

    let lote_id = lote_id.trim();
    if lote_id.is_empty() {
        return Err(ApiError::BadRequest("ID do lote ausente".to_string()));
    }

    let id = lote_id.to_string();
    let lote = blocking(state, move |db| db.get_lote(&id)).await?;

    if !lote.is_owned_by(caller.id) {
        warn!(
            "User {} attempted to dispatch lote {} owned by {}",
            caller.id, lote.id, lote.user_id
        );
        return Err(ApiError::Forbidden("Acesso negado ao lote".to_string()));
    }

    if lote.dispatch_state() == DispatchState::Notified {
        debug!("Lote {} already notified, skipping send", lote.id);
        return Err(ApiError::Conflict(
            "Email já enviado anteriormente".to_string(),
        ));
    }

    let (recipients, transport) = state.mail.validate().inspect_err(|e| {
        error!("Mail settings unusable, lote {} not dispatched: {}", lote.id, e);
    })?;

    let message = Notification::for_lote(&lote, recipients);

    // No retry: a failed send leaves the batch undispatched.
    state
        .notifier
        .send(&transport, &message)
        .await
        .inspect_err(|e| error!("Sending notification for lote {} failed: {}", lote.id, e))?;

    info!(
        "Notification for lote {} ({}) sent to {} recipient(s)",
        lote.id,
        lote.numero_lote,
        message.recipients.len()
    );

    let id = lote.id.to_string();
    let updated = blocking(state, move |db| db.mark_dispatched(&id)).await?;

    Ok(updated)
}
