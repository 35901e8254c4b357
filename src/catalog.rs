use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::error::Result;
use crate::model::{Category, Indicator, Observation};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Field set required to create a new indicator entry.
#[derive(Debug, Clone)]
pub struct NewIndicator {
    pub name: String,
    pub code: String,
    pub english_name: String,
    pub description: String,
    pub frequency: String,
    pub units: String,
    pub seasonal_adjustment: String,
    pub last_updated: Option<NaiveDateTime>,
    pub category_id: i64,
    pub fred_url: Option<String>,
}

/// Persistent catalog of categories, indicators, and their observations.
///
/// One connection is reused across a whole pipeline run. Every mutating
/// operation commits independently; only observation storage spans a scoped
/// transaction so a failed row can be rolled back without touching earlier
/// rows.
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Opens (and if necessary initialises) the catalog at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens a throwaway in-memory catalog.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Looks up a category by its globally unique name.
    pub fn category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let category = self
            .conn
            .query_row(
                "SELECT id, name, level, parent_id, sort_order
                 FROM indicator_categories WHERE name = ?1",
                params![name],
                category_from_row,
            )
            .optional()?;
        Ok(category)
    }

    /// Looks up a category by name, creating it at the end of the display
    /// order when absent. If the stored (level, parent) pair disagrees with
    /// the requested one, the entry is corrected in place rather than
    /// duplicated. Repeated calls with identical arguments are no-ops.
    pub fn get_or_create_category(
        &mut self,
        name: &str,
        level: i64,
        parent_id: Option<i64>,
    ) -> Result<Category> {
        if let Some(mut existing) = self.category_by_name(name)? {
            if existing.level != level || existing.parent_id != parent_id {
                self.conn.execute(
                    "UPDATE indicator_categories SET level = ?1, parent_id = ?2 WHERE id = ?3",
                    params![level, parent_id, existing.id],
                )?;
                existing.level = level;
                existing.parent_id = parent_id;
                info!(category = name, level, "corrected category placement");
            }
            return Ok(existing);
        }

        let sort_order: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM indicator_categories",
            [],
            |row| row.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO indicator_categories (name, level, parent_id, sort_order)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, level, parent_id, sort_order],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(category = name, level, "created category");

        Ok(Category {
            id,
            name: name.to_string(),
            level,
            parent_id,
            sort_order,
        })
    }

    /// All categories ordered by display rank.
    pub fn categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, level, parent_id, sort_order
             FROM indicator_categories ORDER BY sort_order, id",
        )?;
        let categories = stmt
            .query_map([], category_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(categories)
    }

    /// Looks up an indicator by its provider code (the natural key).
    pub fn indicator_by_code(&self, code: &str) -> Result<Option<Indicator>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, code, english_name, description, frequency, units,
                    seasonal_adjustment, last_updated, category_id, fred_url, sort_order
             FROM economic_indicators WHERE code = ?1",
        )?;
        let indicator = stmt
            .query_row(params![code], indicator_from_row)
            .optional()?;
        Ok(indicator)
    }

    /// Inserts a new indicator entry and returns it with its assigned id.
    pub fn create_indicator(&mut self, new: &NewIndicator) -> Result<Indicator> {
        self.conn.execute(
            "INSERT INTO economic_indicators (
                name, code, english_name, description, frequency, units,
                seasonal_adjustment, last_updated, category_id, fred_url, sort_order
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)",
            params![
                new.name,
                new.code,
                new.english_name,
                new.description,
                new.frequency,
                new.units,
                new.seasonal_adjustment,
                new.last_updated
                    .map(|stamp| stamp.format(TIMESTAMP_FORMAT).to_string()),
                new.category_id,
                new.fred_url,
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        Ok(Indicator {
            id,
            name: new.name.clone(),
            code: new.code.clone(),
            english_name: new.english_name.clone(),
            description: new.description.clone(),
            frequency: new.frequency.clone(),
            units: new.units.clone(),
            seasonal_adjustment: new.seasonal_adjustment.clone(),
            last_updated: new.last_updated,
            category_id: new.category_id,
            fred_url: new.fred_url.clone(),
            sort_order: 0,
        })
    }

    /// Rewrites the definition-derived fields of an existing indicator.
    pub fn update_indicator(
        &mut self,
        id: i64,
        name: &str,
        english_name: &str,
        category_id: i64,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE economic_indicators
             SET name = ?1, english_name = ?2, category_id = ?3 WHERE id = ?4",
            params![name, english_name, category_id, id],
        )?;
        Ok(())
    }

    /// Date of the most recent stored observation for an indicator.
    pub fn latest_observation_date(&self, indicator_id: i64) -> Result<Option<NaiveDate>> {
        let latest: Option<String> = self.conn.query_row(
            "SELECT MAX(date) FROM economic_data_points WHERE indicator_id = ?1",
            params![indicator_id],
            |row| row.get(0),
        )?;
        match latest {
            Some(text) => Ok(Some(NaiveDate::parse_from_str(&text, DATE_FORMAT)?)),
            None => Ok(None),
        }
    }

    /// Stores fetched observations inside one scoped transaction and returns
    /// the number of newly inserted points. Dates already present are left
    /// untouched, which keeps re-runs idempotent; a full refresh clears the
    /// indicator's points first, inside the same transaction.
    pub fn store_observations(
        &mut self,
        indicator_id: i64,
        points: &[Observation],
        full_refresh: bool,
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;
        if full_refresh {
            tx.execute(
                "DELETE FROM economic_data_points WHERE indicator_id = ?1",
                params![indicator_id],
            )?;
        }

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO economic_data_points (indicator_id, date, value)
                 VALUES (?1, ?2, ?3)",
            )?;
            for point in points {
                inserted += stmt.execute(params![
                    indicator_id,
                    point.date.format(DATE_FORMAT).to_string(),
                    point.value,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// All stored observations for an indicator, oldest first.
    pub fn observations(&self, indicator_id: i64) -> Result<Vec<Observation>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, value FROM economic_data_points
             WHERE indicator_id = ?1 ORDER BY date",
        )?;
        let rows = stmt
            .query_map(params![indicator_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut observations = Vec::with_capacity(rows.len());
        for (date, value) in rows {
            observations.push(Observation {
                date: NaiveDate::parse_from_str(&date, DATE_FORMAT)?,
                value,
            });
        }
        Ok(observations)
    }

    /// Normalises the persisted display order of indicators to match their
    /// final category assignment: boards in display order, each immediately
    /// followed by its subcategories, with consecutive ranks handed out to the
    /// indicators grouped under each. Runs once, after the whole table has
    /// been consumed.
    pub fn apply_indicator_ordering(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        let mut ordered_categories: Vec<i64> = Vec::new();
        {
            let mut boards = tx.prepare(
                "SELECT id FROM indicator_categories WHERE level = 1 ORDER BY sort_order, id",
            )?;
            let mut children = tx.prepare(
                "SELECT id FROM indicator_categories WHERE parent_id = ?1 ORDER BY sort_order, id",
            )?;
            let board_ids = boards
                .query_map([], |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for board_id in board_ids {
                ordered_categories.push(board_id);
                let child_ids = children
                    .query_map(params![board_id], |row| row.get::<_, i64>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                ordered_categories.extend(child_ids);
            }
        }

        let mut rank = 0i64;
        {
            let mut members = tx.prepare(
                "SELECT id FROM economic_indicators WHERE category_id = ?1 ORDER BY sort_order, id",
            )?;
            let mut assign =
                tx.prepare("UPDATE economic_indicators SET sort_order = ?1 WHERE id = ?2")?;
            for category_id in ordered_categories {
                let indicator_ids = members
                    .query_map(params![category_id], |row| row.get::<_, i64>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                for indicator_id in indicator_ids {
                    rank += 1;
                    assign.execute(params![rank, indicator_id])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS indicator_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            level INTEGER NOT NULL,
            parent_id INTEGER REFERENCES indicator_categories(id),
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS economic_indicators (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            code TEXT UNIQUE NOT NULL,
            english_name TEXT NOT NULL,
            description TEXT NOT NULL,
            frequency TEXT NOT NULL,
            units TEXT NOT NULL,
            seasonal_adjustment TEXT NOT NULL,
            last_updated TEXT,
            category_id INTEGER NOT NULL REFERENCES indicator_categories(id),
            fred_url TEXT,
            sort_order INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS economic_data_points (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            indicator_id INTEGER NOT NULL REFERENCES economic_indicators(id),
            date TEXT NOT NULL,
            value REAL NOT NULL,
            UNIQUE(indicator_id, date)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_data_points_indicator
         ON economic_data_points(indicator_id, date)",
        [],
    )?;

    Ok(())
}

fn category_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        level: row.get(2)?,
        parent_id: row.get(3)?,
        sort_order: row.get(4)?,
    })
}

fn indicator_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Indicator> {
    let last_updated: Option<String> = row.get(8)?;
    Ok(Indicator {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        english_name: row.get(3)?,
        description: row.get(4)?,
        frequency: row.get(5)?,
        units: row.get(6)?,
        seasonal_adjustment: row.get(7)?,
        last_updated: last_updated
            .and_then(|stamp| NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT).ok()),
        category_id: row.get(9)?,
        fred_url: row.get(10)?,
        sort_order: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_category_is_idempotent() {
        let mut catalog = Catalog::open_in_memory().expect("catalog opened");
        let first = catalog
            .get_or_create_category("劳动力市场", 1, None)
            .expect("category created");
        let second = catalog
            .get_or_create_category("劳动力市场", 1, None)
            .expect("category fetched");

        assert_eq!(first, second);
        assert_eq!(catalog.categories().expect("categories listed").len(), 1);
    }

    #[test]
    fn drifted_category_placement_is_corrected_in_place() {
        let mut catalog = Catalog::open_in_memory().expect("catalog opened");
        let board = catalog
            .get_or_create_category("劳动力市场", 1, None)
            .expect("board created");
        // First derivation got the marker wrong: stored as a board.
        let stray = catalog
            .get_or_create_category("分部门新增就业", 1, None)
            .expect("stray created");

        let corrected = catalog
            .get_or_create_category("分部门新增就业", 2, Some(board.id))
            .expect("corrected");

        assert_eq!(corrected.id, stray.id);
        assert_eq!(corrected.level, 2);
        assert_eq!(corrected.parent_id, Some(board.id));
        assert_eq!(catalog.categories().expect("categories listed").len(), 2);
    }

    #[test]
    fn store_observations_ignores_existing_dates() {
        let mut catalog = Catalog::open_in_memory().expect("catalog opened");
        let board = catalog
            .get_or_create_category("劳动力市场", 1, None)
            .expect("board created");
        let indicator = catalog
            .create_indicator(&NewIndicator {
                name: "失业率".to_string(),
                code: "UNRATE".to_string(),
                english_name: "Unemployment Rate".to_string(),
                description: String::new(),
                frequency: String::new(),
                units: String::new(),
                seasonal_adjustment: String::new(),
                last_updated: None,
                category_id: board.id,
                fred_url: None,
            })
            .expect("indicator created");

        let day = |n| NaiveDate::from_ymd_opt(2024, 1, n).expect("valid date");
        let first = catalog
            .store_observations(
                indicator.id,
                &[
                    Observation { date: day(1), value: 3.7 },
                    Observation { date: day(2), value: 3.8 },
                ],
                false,
            )
            .expect("stored");
        let second = catalog
            .store_observations(
                indicator.id,
                &[
                    Observation { date: day(2), value: 3.8 },
                    Observation { date: day(3), value: 3.9 },
                ],
                false,
            )
            .expect("stored");

        assert_eq!(first, 2);
        assert_eq!(second, 1);
        assert_eq!(
            catalog
                .latest_observation_date(indicator.id)
                .expect("latest date"),
            Some(day(3))
        );
    }
}
