//! Roll intake.

use super::error_response;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Form, Json,
};
use rollstats_core::{decode_fields, RelayItem};
use rollstats_types::{InsertOutcome, RollSubmission};
use std::sync::Arc;
use tracing::{info, warn};

/// Store a roll posted as form fields and hand it to the relay.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Path(campaign): Path<String>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<(StatusCode, Json<InsertOutcome>), (StatusCode, String)> {
    let decoded = decode_fields(fields).map_err(error_response)?;
    let outcome = state
        .store
        .insert_decoded(&campaign, &decoded)
        .map_err(error_response)?;

    match &outcome {
        InsertOutcome::Stored {
            roll_id, replaced, ..
        } => {
            info!(
                target: "rollstats::api",
                "Stored roll {} in campaign {}{}",
                roll_id,
                campaign,
                if *replaced { " (replaced)" } else { "" }
            );
            relay_roll(&state, &campaign, &decoded.submission);
            Ok((StatusCode::CREATED, Json(outcome)))
        }
        InsertOutcome::Rejected { .. } => Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(outcome))),
    }
}

/// Queue a stored roll for campaigns that post to chat. Relay trouble never
/// fails the submission.
fn relay_roll(state: &AppState, campaign: &str, roll: &RollSubmission) {
    let Some(relay) = &state.relay else {
        return;
    };
    let Some(target) = state.config.relay_target(campaign) else {
        return;
    };

    let character = roll.name().unwrap_or("unknown");
    if let Err(e) = relay.enqueue(RelayItem::new(target, character, roll.clone())) {
        warn!(target: "rollstats::relay", "Roll of {} not relayed: {}", character, e);
    }
}
