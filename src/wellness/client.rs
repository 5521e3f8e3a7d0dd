use serde_json::Value;
use tracing::{debug, error};

use super::{detail_blocks, normalize, DailyAggregate, DateRange};
use crate::error::AuthError;
use crate::session::{ResourceRequest, SessionManager};

pub const STRESS_DETAILS_PATH: &str = "/wellness-api/rest/stressDetails";

/// Fetch stress details uploaded within `range` and reduce them to daily
/// body battery aggregates.
pub async fn fetch_body_battery(
    session: &SessionManager,
    range: &DateRange,
) -> Result<Vec<DailyAggregate>, AuthError> {
    let (upload_start, upload_end) = range.epoch_bounds();
    let request = ResourceRequest::get(STRESS_DETAILS_PATH)
        .query("uploadStartTimeInSeconds", upload_start)
        .query("uploadEndTimeInSeconds", upload_end);

    let resp = session
        .fetch_authenticated_resource(&request)
        .await
        .inspect_err(|e| error!("Error fetching body battery data: {e}"))?;

    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| AuthError::Transport(format!("Failed to read stress details: {e}")))?;

    if !status.is_success() {
        error!("Stress details request failed with {}", status.as_u16());
        return Err(AuthError::DataFetch {
            status: status.as_u16(),
            body,
        });
    }

    let payload: Value = serde_json::from_str(&body).map_err(|e| AuthError::DataFetch {
        status: status.as_u16(),
        body: format!("unparseable stress details: {e}"),
    })?;

    let blocks = detail_blocks(&payload);
    let days = normalize(blocks, range);
    debug!("Reduced {} detail blocks to {} days", blocks.len(), days.len());
    Ok(days)
}
