//! Character sheets pushed by players, one file per sheet under a directory
//! per campaign.

use crate::{Result, RollStatsError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Keep only `[A-Za-z0-9_-]`.
pub fn sanitize(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

#[derive(Debug, Clone)]
pub struct SheetStore {
    campaigns_dir: PathBuf,
}

impl SheetStore {
    pub fn new(campaigns_dir: impl Into<PathBuf>) -> Self {
        Self {
            campaigns_dir: campaigns_dir.into(),
        }
    }

    pub fn campaigns_dir(&self) -> &Path {
        &self.campaigns_dir
    }

    fn campaign_path(&self, campaign: &str) -> Result<PathBuf> {
        let id = sanitize(campaign);
        if id.is_empty() {
            return Err(RollStatsError::InvalidIdentifier(campaign.to_string()));
        }
        Ok(self.campaigns_dir.join(id))
    }

    /// Sheet ids of a campaign, sorted. `None` when the campaign does not exist.
    pub fn list(&self, campaign: &str) -> Result<Option<Vec<String>>> {
        let path = self.campaign_path(campaign)?;
        if !path.is_dir() {
            return Ok(None);
        }

        let mut sheets = Vec::new();
        for entry in std::fs::read_dir(&path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                sheets.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        sheets.sort();
        Ok(Some(sheets))
    }

    pub fn read(&self, campaign: &str, sheet: &str) -> Result<String> {
        let campaign_path = self.campaign_path(campaign)?;
        if !campaign_path.is_dir() {
            return Err(RollStatsError::CampaignNotFound(sanitize(campaign)));
        }

        let not_found = || RollStatsError::SheetNotFound {
            campaign: sanitize(campaign),
            sheet: sheet.to_string(),
        };
        // Ids that only resolve after cleaning never name a stored sheet.
        if sheet.is_empty() || sanitize(sheet) != sheet {
            return Err(not_found());
        }

        let path = campaign_path.join(sheet);
        if !path.is_file() {
            return Err(not_found());
        }
        debug!(target: "rollstats::sheets", "Reading sheet {}", path.display());
        Ok(std::fs::read_to_string(path)?)
    }

    /// Store a sheet, creating the campaign on first push.
    pub fn write(&self, campaign: &str, sheet: &str, content: &str) -> Result<()> {
        let campaign_path = self.campaign_path(campaign)?;
        let sheet_id = sanitize(sheet);
        if sheet_id.is_empty() {
            return Err(RollStatsError::InvalidIdentifier(sheet.to_string()));
        }

        if !campaign_path.is_dir() {
            std::fs::create_dir_all(&campaign_path)?;
            info!(target: "rollstats::sheets", "Created campaign {}", campaign_path.display());
        }
        std::fs::write(campaign_path.join(&sheet_id), content)?;
        debug!(
            target: "rollstats::sheets",
            "Stored sheet {} ({} bytes)",
            sheet_id,
            content.len()
        );
        Ok(())
    }
}
