//! Character sheet upload and viewing.

use super::error_response;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    Form,
};
use rollstats_core::{sanitize, RollStatsError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub async fn push(
    State(state): State<Arc<AppState>>,
    Path((campaign, sheet)): Path<(String, String)>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<&'static str, (StatusCode, String)> {
    let field = &state.config.sheet_page_field;
    let page = form
        .get(field)
        .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("Missing form field '{}'", field)))?;

    state
        .sheets
        .write(&campaign, &sheet, page)
        .map_err(error_response)?;
    info!(
        target: "rollstats::api",
        "Sheet {} pushed to campaign {}",
        sanitize(&sheet),
        sanitize(&campaign)
    );
    Ok("OK")
}

/// HTML index of a campaign's sheets.
pub async fn view_campaign(
    State(state): State<Arc<AppState>>,
    Path(campaign): Path<String>,
) -> Result<Html<String>, (StatusCode, String)> {
    let campaign = sanitize(&campaign);
    let config = &state.config;

    let sheets = state
        .sheets
        .list(&campaign)
        .map_err(error_response)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!("{} {}", config.no_such_campaign_msg, campaign),
            )
        })?;
    if sheets.is_empty() {
        return Ok(Html(format!("{} {}", config.empty_campaign_msg, campaign)));
    }

    let items: String = sheets
        .iter()
        .map(|sheet| {
            format!(
                "<li><a href=\"/view/{campaign}/{sheet}\" target=\"_blank\">{sheet}</a></li>\n"
            )
        })
        .collect();
    Ok(Html(format!(
        "<html><body><h1>{campaign}</h1>\n<ul>{items}</ul></body></html>"
    )))
}

pub async fn view_sheet(
    State(state): State<Arc<AppState>>,
    Path((campaign, sheet)): Path<(String, String)>,
) -> Result<Html<String>, (StatusCode, String)> {
    let config = &state.config;
    match state.sheets.read(&campaign, &sheet) {
        Ok(content) => Ok(Html(content)),
        Err(RollStatsError::CampaignNotFound(campaign)) => Err((
            StatusCode::NOT_FOUND,
            format!("{} {}", config.no_such_campaign_msg, campaign),
        )),
        Err(RollStatsError::SheetNotFound { campaign, sheet }) => Err((
            StatusCode::NOT_FOUND,
            format!("{} {} {}", config.no_such_sheet_msg, sheet, campaign),
        )),
        Err(e) => Err(error_response(e)),
    }
}
