use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use tracing::{error, info, instrument};

use crate::catalog::Catalog;
use crate::error::{Result, SyncError};
use crate::io::excel_read;
use crate::model::{Category, Indicator};
use crate::normalize::{self, RowIntent};
use crate::provider::SeriesProvider;
use crate::reconcile::{self, ReconcileOutcome};
use crate::resolve;

/// Run-wide settings for a synchronization pass.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Explicit lower bound for observation fetches; overrides the
    /// incremental window.
    pub start_date: Option<NaiveDate>,
    /// Explicit upper bound; `None` leaves the window open-ended.
    pub end_date: Option<NaiveDate>,
    /// Delete each indicator's stored points before fetching.
    pub full_refresh: bool,
    /// Lower bound used when an indicator has no stored observations.
    pub default_start_date: NaiveDate,
}

/// Per-run tally of row outcomes, returned by [`SyncPipeline::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub rows: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub observations: usize,
}

/// Effective [start, end] fetch window for one indicator.
///
/// An explicit start date always wins. Under a full refresh the stored data is
/// about to be discarded, so the window restarts at the default start date.
/// Otherwise the window resumes the day after the latest stored observation,
/// falling back to the default start date for an empty series.
pub fn fetch_window(
    latest: Option<NaiveDate>,
    options: &SyncOptions,
) -> (NaiveDate, Option<NaiveDate>) {
    let start = match options.start_date {
        Some(start) => start,
        None if options.full_refresh => options.default_start_date,
        None => latest
            .and_then(|date| date.succ_opt())
            .unwrap_or(options.default_start_date),
    };
    (start, options.end_date)
}

/// Drives one synchronization pass over the definition table.
///
/// Rows are processed strictly in source order: category markers observed at
/// row N affect resolution for the rows after it until superseded. The only
/// cross-row state is the per-board pending subcategory map and the previous
/// row's cleaned code.
pub struct SyncPipeline<P> {
    catalog: Catalog,
    provider: P,
    options: SyncOptions,
    pending_subcategories: HashMap<String, Category>,
}

impl<P: SeriesProvider> SyncPipeline<P> {
    pub fn new(catalog: Catalog, provider: P, options: SyncOptions) -> Self {
        Self {
            catalog,
            provider,
            options,
            pending_subcategories: HashMap::new(),
        }
    }

    /// Executes the metadata + data sync for every row of the workbook.
    ///
    /// A missing or unreadable workbook aborts the run. Every other failure is
    /// scoped to its row: the row is logged as failed and the loop moves on,
    /// so a partial run still leaves all successfully processed rows durably
    /// reconciled. Display ordering is normalised once after the last row.
    #[instrument(level = "info", skip_all, fields(input = %input.display()))]
    pub fn run(&mut self, input: &Path) -> Result<RunReport> {
        if !input.exists() {
            return Err(SyncError::MissingInput(input.to_path_buf()));
        }
        let rows = excel_read::read_rows(input)?;
        info!(row_count = rows.len(), "loaded definition table");

        let mut report = RunReport::default();
        let mut previous_code: Option<String> = None;

        for (index, row) in rows.iter().enumerate() {
            let row_number = index + 1;
            let intent = normalize::classify(row, previous_code.as_deref());
            previous_code = Some(normalize::clean_code(&row.code));
            report.rows += 1;

            match intent {
                RowIntent::CategoryMarker { board, name } => {
                    info!(row = row_number, board = %board, marker = %name, "category marker");
                    if let Err(error) = self.record_subcategory_marker(&board, &name) {
                        report.failed += 1;
                        error!(row = row_number, marker = %name, %error, "failed to record category marker");
                    }
                }
                RowIntent::Duplicate { name, code } => {
                    report.skipped += 1;
                    info!(row = row_number, indicator = %name, code = %code, "skipping duplicate row");
                }
                RowIntent::Indicator {
                    board,
                    name,
                    english_name,
                    code,
                } => {
                    info!(row = row_number, board = %board, indicator = %name, code = %code, "processing indicator");
                    match self.reconcile_row(&board, &name, &english_name, &code) {
                        Err(error) => {
                            report.failed += 1;
                            error!(row = row_number, indicator = %name, code = %code, %error, "failed to reconcile indicator");
                        }
                        Ok((indicator, outcome)) => {
                            match outcome {
                                ReconcileOutcome::Created => report.created += 1,
                                ReconcileOutcome::Updated => report.updated += 1,
                                ReconcileOutcome::Unchanged => report.unchanged += 1,
                            }
                            match self.sync_observations(&indicator) {
                                Ok(inserted) => {
                                    report.observations += inserted;
                                    info!(row = row_number, code = %code, inserted, "stored new data points");
                                }
                                Err(error) => {
                                    report.failed += 1;
                                    error!(row = row_number, code = %code, %error, "error fetching data");
                                }
                            }
                        }
                    }
                }
            }
        }

        self.catalog.apply_indicator_ordering()?;
        info!(
            rows = report.rows,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            "definition table processed"
        );
        Ok(report)
    }

    /// Consumes the pipeline, handing back the catalog for inspection.
    pub fn into_catalog(self) -> Catalog {
        self.catalog
    }

    /// Handles a category-marker row. Recognised sub-grouping markers ensure
    /// the board and subcategory exist and become the board's pending
    /// subcategory for the rows that follow; anything else is a plain
    /// category row with no further effect.
    fn record_subcategory_marker(&mut self, board: &str, name: &str) -> Result<()> {
        if !resolve::is_subgroup_marker(name) {
            return Ok(());
        }
        let board_category = self.catalog.get_or_create_category(board, 1, None)?;
        let subcategory = self
            .catalog
            .get_or_create_category(name, 2, Some(board_category.id))?;
        self.pending_subcategories
            .insert(board.to_string(), subcategory);
        Ok(())
    }

    fn reconcile_row(
        &mut self,
        board: &str,
        name: &str,
        english_name: &str,
        code: &str,
    ) -> Result<(Indicator, ReconcileOutcome)> {
        let board_category = self.catalog.get_or_create_category(board, 1, None)?;
        let category_id = resolve::resolve_category(
            board,
            name,
            board_category.id,
            &self.pending_subcategories,
        );
        reconcile::reconcile_indicator(
            &mut self.catalog,
            &self.provider,
            name,
            english_name,
            code,
            category_id,
        )
    }

    /// Fetches the indicator's incremental window and persists the new points.
    /// The provider call happens before the storage transaction opens, so a
    /// fetch failure leaves the stored series untouched even under a full
    /// refresh.
    fn sync_observations(&mut self, indicator: &Indicator) -> Result<usize> {
        let latest = self.catalog.latest_observation_date(indicator.id)?;
        let (start, end) = fetch_window(latest, &self.options);
        let points = self.provider.observations(&indicator.code, Some(start), end)?;
        self.catalog
            .store_observations(indicator.id, &points, self.options.full_refresh)
    }
}
