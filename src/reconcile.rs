use tracing::{info, warn};

use crate::catalog::{Catalog, NewIndicator};
use crate::error::Result;
use crate::model::{Indicator, SeriesMetadata, fred_series_url};
use crate::provider::SeriesProvider;

/// What reconciliation did to the catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Idempotently creates or updates the catalog entry for one indicator row.
///
/// New codes are created with best-effort provider metadata; existing entries
/// are rewritten only when the display name, english name, or category
/// assignment diverges from the definition. Either way the change is committed
/// before returning, so a later row's failure cannot undo it.
pub fn reconcile_indicator(
    catalog: &mut Catalog,
    provider: &dyn SeriesProvider,
    name: &str,
    english_name: &str,
    code: &str,
    category_id: i64,
) -> Result<(Indicator, ReconcileOutcome)> {
    let Some(existing) = catalog.indicator_by_code(code)? else {
        let metadata = fetch_metadata(provider, code).unwrap_or_else(|| SeriesMetadata {
            description: if english_name.is_empty() {
                name.to_string()
            } else {
                english_name.to_string()
            },
            ..SeriesMetadata::default()
        });

        let indicator = catalog.create_indicator(&NewIndicator {
            name: name.to_string(),
            code: code.to_string(),
            english_name: english_name.to_string(),
            description: metadata.description,
            frequency: metadata.frequency,
            units: metadata.units,
            seasonal_adjustment: metadata.seasonal_adjustment,
            last_updated: metadata.last_updated,
            category_id,
            fred_url: Some(fred_series_url(code)),
        })?;
        info!(indicator = name, code, "created indicator");
        return Ok((indicator, ReconcileOutcome::Created));
    };

    if existing.name == name
        && existing.english_name == english_name
        && existing.category_id == category_id
    {
        return Ok((existing, ReconcileOutcome::Unchanged));
    }

    catalog.update_indicator(existing.id, name, english_name, category_id)?;
    info!(indicator = name, code, "updated indicator");

    let updated = Indicator {
        name: name.to_string(),
        english_name: english_name.to_string(),
        category_id,
        ..existing
    };
    Ok((updated, ReconcileOutcome::Updated))
}

/// Best-effort metadata lookup: a provider failure degrades to `None` instead
/// of aborting the row.
fn fetch_metadata(provider: &dyn SeriesProvider, code: &str) -> Option<SeriesMetadata> {
    match provider.series_metadata(code) {
        Ok(metadata) => Some(metadata),
        Err(error) => {
            warn!(code, %error, "could not fetch series metadata");
            None
        }
    }
}
