//! SoilSCAPE SQLite database source.
//!
//! Readings for a node are selected for the window, checked to come from
//! three EC-5 sensors, calibrated with the node's latest stored calibration
//! (Decagon mineral soil when none is stored), filtered and averaged.

use crate::calibration::{Calibration, CalibrationKind};
use crate::error::Result;
use crate::schema;
use crate::SensorSource;
use rusqlite::{params, Connection, OptionalExtension, Row};
use ssu_core::{SensorRecord, SiteOutcome, SiteSkip, SkipReason, TimeWindow, ValueRange};
use ssu_utils::dates::format_datetime;
use std::path::Path;

/// Sensor type every soil moisture sensor (1-3) must report.
const SOIL_SENSOR_TYPE: &str = "EC-5";

/// Plausible node averages in m³/m³: calibrated samples are restricted to
/// (0, 60) percent before scaling.
const RECORD_RANGE: ValueRange = ValueRange {
    lower: 0.0,
    upper: 0.6,
};

const READINGS_QUERY: &str = "SELECT m.s1Raw, m.s2Raw, m.s3Raw, m.s4Raw,
        m.s1Flag, m.s2Flag, m.s3Flag, m.s4Flag,
        l.s1Type, l.s2Type, l.s3Type,
        p.Latitude, p.Longitude
 FROM Measurements m
 JOIN LogicalLocation l ON m.LogicalID = l.LogicalID
 JOIN PhysicalLocation p ON m.PhysicalID = p.PhysicalID
 WHERE m.PhysicalID = ?1 AND m.badData = 0
   AND m.measTStime >= ?2 AND m.measTStime < ?3
 ORDER BY m.measTStime ASC";

const CALIBRATION_QUERY: &str = "SELECT s1CalType,
        s1Coeff0, s1Coeff1, s1Coeff2, s1Coeff3,
        s2Coeff0, s2Coeff1, s2Coeff2, s2Coeff3,
        s3Coeff0, s3Coeff1, s3Coeff2, s3Coeff3,
        s4Coeff0, s4Coeff1, s4Coeff2, s4Coeff3
 FROM Calibration WHERE PhysicalID = ?1
 ORDER BY Version DESC LIMIT 1";

pub struct DatabaseSource {
    conn: Connection,
    sensor_ids: Vec<String>,
    sensor_number: u8,
}

/// One row of the window query.
struct Reading {
    raw: [Option<f64>; 4],
    flag: [i64; 4],
    types: [Option<String>; 3],
    latitude: f64,
    longitude: f64,
}

impl Reading {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Reading {
            raw: [row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?],
            flag: [row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?],
            types: [row.get(8)?, row.get(9)?, row.get(10)?],
            latitude: row.get(11)?,
            longitude: row.get(12)?,
        })
    }
}

impl DatabaseSource {
    /// Open an existing SoilSCAPE database file.
    pub fn open(path: &Path, sensor_ids: Vec<String>, sensor_number: u8) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn, sensor_ids, sensor_number))
    }

    pub fn from_connection(conn: Connection, sensor_ids: Vec<String>, sensor_number: u8) -> Self {
        DatabaseSource {
            conn,
            sensor_ids,
            sensor_number,
        }
    }

    /// Empty in-memory database with the schema applied.
    pub fn in_memory(sensor_ids: Vec<String>, sensor_number: u8) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::create_schema())?;
        Ok(Self::from_connection(conn, sensor_ids, sensor_number))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Latest stored calibration for a node, if any.
    fn stored_calibration(
        &self,
        physical_id: i64,
    ) -> rusqlite::Result<Option<std::result::Result<Calibration, SkipReason>>> {
        let row = self
            .conn
            .prepare_cached(CALIBRATION_QUERY)?
            .query_row(params![physical_id], |row| {
                let kind: String = row.get(0)?;
                let mut coefficients = [[0.0; 4]; 4];
                for (sensor, coeffs) in coefficients.iter_mut().enumerate() {
                    for (k, c) in coeffs.iter_mut().enumerate() {
                        *c = row
                            .get::<_, Option<f64>>(1 + sensor * 4 + k)?
                            .unwrap_or(0.0);
                    }
                }
                Ok((kind, coefficients))
            })
            .optional()?;
        Ok(row.map(|(kind, coefficients)| {
            kind.parse::<CalibrationKind>()
                .map(|kind| Calibration { kind, coefficients })
                .map_err(|e| SkipReason::Unparseable(e.to_string()))
        }))
    }

    fn readings(&self, physical_id: i64, window: &TimeWindow) -> rusqlite::Result<Vec<Reading>> {
        let mut stmt = self.conn.prepare_cached(READINGS_QUERY)?;
        let rows = stmt
            .query_map(
                params![
                    physical_id,
                    format_datetime(&window.start),
                    format_datetime(&window.end)
                ],
                Reading::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn site(&self, site_id: &str, window: &TimeWindow) -> std::result::Result<SensorRecord, SkipReason> {
        let Ok(physical_id) = site_id.trim().parse::<i64>() else {
            return Err(SkipReason::Unparseable(site_id.to_string()));
        };
        if !(1..=3).contains(&self.sensor_number) {
            return Err(SkipReason::UnknownSensor(self.sensor_number));
        }

        let readings = self
            .readings(physical_id, window)
            .map_err(|e| query_failed(site_id, e))?;
        let Some(first) = readings.first() else {
            return Err(SkipReason::NoData);
        };
        if first
            .types
            .iter()
            .any(|t| t.as_deref() != Some(SOIL_SENSOR_TYPE))
        {
            let found = first
                .types
                .iter()
                .map(|t| t.as_deref().unwrap_or("none"))
                .collect::<Vec<_>>()
                .join("/");
            return Err(SkipReason::SensorTypeMismatch(found));
        }
        let (latitude, longitude) = (first.latitude, first.longitude);

        let calibration = match self
            .stored_calibration(physical_id)
            .map_err(|e| query_failed(site_id, e))?
        {
            Some(calibration) => calibration?,
            None => Calibration::default(),
        };

        let index = usize::from(self.sensor_number - 1);
        let samples: Vec<f64> = readings
            .iter()
            .filter(|r| r.flag[index] == 0)
            .filter_map(|r| r.raw[index])
            .filter_map(|raw| calibration.apply(self.sensor_number, raw))
            .filter(|v| ValueRange::CALIBRATED_PERCENT.admits_sample(*v))
            .collect();
        if samples.is_empty() {
            return Err(SkipReason::NoValidSamples);
        }
        let mean = samples.iter().sum::<f64>() / samples.len() as f64 / 100.0;
        SensorRecord::checked(site_id, latitude, longitude, mean, &RECORD_RANGE)
    }
}

/// A row of one node that rusqlite could not convert.
fn query_failed(site_id: &str, e: rusqlite::Error) -> SkipReason {
    log::warn!("Bad data for node {}: {}", site_id, e);
    SkipReason::Query(e.to_string())
}

impl SensorSource for DatabaseSource {
    fn describe(&self) -> String {
        format!(
            "SoilSCAPE database ({} nodes, sensor {})",
            self.sensor_ids.len(),
            self.sensor_number
        )
    }

    fn extract(&self, window: &TimeWindow) -> Result<Vec<SiteOutcome>> {
        // A schema the queries do not fit fails the whole window.
        self.conn.prepare_cached(READINGS_QUERY)?;
        self.conn.prepare_cached(CALIBRATION_QUERY)?;
        Ok(self
            .sensor_ids
            .iter()
            .map(|id| {
                self.site(id, window).map_err(|reason| SiteSkip {
                    site_id: id.clone(),
                    reason,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2015, 7, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow::new(ts(22, 0), ts(22, 6))
    }

    fn insert_node(conn: &Connection, id: i64, logical: i64, types: [&str; 3]) {
        conn.execute(
            "INSERT INTO PhysicalLocation (PhysicalID, Latitude, Longitude) VALUES (?1, 38.4, -120.9)",
            params![id],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO LogicalLocation (LogicalID, s1Type, s2Type, s3Type) VALUES (?1, ?2, ?3, ?4)",
            params![logical, types[0], types[1], types[2]],
        )
        .unwrap();
    }

    fn insert_reading(conn: &Connection, id: i64, logical: i64, time: &str, raw: f64, flag: i64) {
        conn.execute(
            "INSERT INTO Measurements (PhysicalID, LogicalID, measTStime, s1Raw, s2Raw, s3Raw, s1Flag)
             VALUES (?1, ?2, ?3, ?4, ?4, ?4, ?5)",
            params![id, logical, time, raw, flag],
        )
        .unwrap();
    }

    fn source(ids: &[&str]) -> DatabaseSource {
        let source = DatabaseSource::in_memory(ids.iter().map(|s| s.to_string()).collect(), 1).unwrap();
        let conn = source.connection();
        insert_node(conn, 101, 1, ["EC-5", "EC-5", "EC-5"]);
        // raw 500 and 550 calibrate to 23.878 and 30.276 percent
        insert_reading(conn, 101, 1, "2015-07-22 01:00:00", 500.0, 0);
        insert_reading(conn, 101, 1, "2015-07-22 02:00:00", 550.0, 0);
        // flagged and outside the window
        insert_reading(conn, 101, 1, "2015-07-22 03:00:00", 900.0, 1);
        insert_reading(conn, 101, 1, "2015-07-22 06:00:00", 900.0, 0);
        source
    }

    #[test]
    fn test_default_calibration_average() {
        let outcomes = source(&["101"]).extract(&window()).unwrap();
        let record = outcomes[0].as_ref().unwrap();
        let expected = ((-40.1 + 0.1279569 * 500.0) + (-40.1 + 0.1279569 * 550.0)) / 2.0 / 100.0;
        assert!((record.value - expected).abs() < 1e-9);
        assert!((record.latitude - 38.4).abs() < 1e-9);
        assert_eq!(record.site_id, "101");
    }

    #[test]
    fn test_latest_stored_calibration_wins() {
        let source = source(&["101"]);
        let conn = source.connection();
        conn.execute(
            "INSERT INTO Calibration (PhysicalID, Version, s1CalType, s1Coeff0, s1Coeff1)
             VALUES (101, 1, 'linear', 0.0, 0.01)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO Calibration (PhysicalID, Version, s1CalType, s1Coeff0, s1Coeff1)
             VALUES (101, 2, 'linear', 0.0, 0.02)",
            [],
        )
        .unwrap();
        let outcomes = source.extract(&window()).unwrap();
        let record = outcomes[0].as_ref().unwrap();
        // (10 + 11) / 2 percent
        assert!((record.value - 0.105).abs() < 1e-9);
    }

    #[test]
    fn test_site_skips() {
        let source = source(&["101", "202", "303", "abc"]);
        let conn = source.connection();
        insert_node(conn, 303, 3, ["EC-5", "EC-5", "GS3"]);
        insert_reading(conn, 303, 3, "2015-07-22 01:00:00", 500.0, 0);

        let outcomes = source.extract(&window()).unwrap();
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes[0].is_ok());
        assert_eq!(outcomes[1].as_ref().unwrap_err().reason, SkipReason::NoData);
        assert!(matches!(
            outcomes[2].as_ref().unwrap_err().reason,
            SkipReason::SensorTypeMismatch(_)
        ));
        assert!(matches!(
            outcomes[3].as_ref().unwrap_err().reason,
            SkipReason::Unparseable(_)
        ));
    }

    #[test]
    fn test_malformed_reading_skips_only_that_node() {
        let source = source(&["101", "202"]);
        let conn = source.connection();
        insert_node(conn, 202, 2, ["EC-5", "EC-5", "EC-5"]);
        conn.execute(
            "INSERT INTO Measurements (PhysicalID, LogicalID, measTStime, s1Raw, s2Raw, s3Raw)
             VALUES (202, 2, '2015-07-22 01:00:00', 'bad', 500.0, 500.0)",
            [],
        )
        .unwrap();

        let outcomes = source.extract(&window()).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].as_ref().unwrap().site_id, "101");
        let skip = outcomes[1].as_ref().unwrap_err();
        assert_eq!(skip.site_id, "202");
        assert!(matches!(skip.reason, SkipReason::Query(_)));
    }

    #[test]
    fn test_missing_tables_fail_the_window() {
        let source = DatabaseSource::from_connection(
            Connection::open_in_memory().unwrap(),
            vec!["101".into()],
            1,
        );
        assert!(source.extract(&window()).is_err());
    }

    #[test]
    fn test_all_samples_filtered() {
        let source = source(&["404"]);
        let conn = source.connection();
        insert_node(conn, 404, 4, ["EC-5", "EC-5", "EC-5"]);
        // calibrates below zero percent
        insert_reading(conn, 404, 4, "2015-07-22 01:00:00", 100.0, 0);
        let outcomes = source.extract(&window()).unwrap();
        assert_eq!(
            outcomes[0].as_ref().unwrap_err().reason,
            SkipReason::NoValidSamples
        );
    }

    #[test]
    fn test_unknown_calibration_type_skips_site() {
        let source = source(&["101"]);
        source
            .connection()
            .execute(
                "INSERT INTO Calibration (PhysicalID, Version, s1CalType) VALUES (101, 1, 'cubic')",
                [],
            )
            .unwrap();
        let outcomes = source.extract(&window()).unwrap();
        assert!(matches!(
            outcomes[0].as_ref().unwrap_err().reason,
            SkipReason::Unparseable(_)
        ));
    }
}
