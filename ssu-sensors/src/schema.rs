//! SQL schema of the SoilSCAPE sensor database.
//!
//! Only the tables and columns read during extraction are listed. A
//! production database carries more; they are ignored.

/// Returns the schema as a single batch string.
///
/// - `Measurements` - raw sensor readings per node and timestamp, with
///   per-sensor quality flags and a whole-record `badData` flag
/// - `Calibration` - versioned per-node calibration coefficients
/// - `PhysicalLocation` - node coordinates
/// - `LogicalLocation` - sensor types installed at a logical location
pub fn create_schema() -> &'static str {
    r#"
    CREATE TABLE IF NOT EXISTS Measurements (
        MeasurementID INTEGER PRIMARY KEY,
        PhysicalID INTEGER NOT NULL,
        LogicalID INTEGER NOT NULL,
        measTStime TEXT NOT NULL,
        badData INTEGER NOT NULL DEFAULT 0,
        s1Raw REAL,
        s2Raw REAL,
        s3Raw REAL,
        s4Raw REAL,
        s1Flag INTEGER NOT NULL DEFAULT 0,
        s2Flag INTEGER NOT NULL DEFAULT 0,
        s3Flag INTEGER NOT NULL DEFAULT 0,
        s4Flag INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_meas_physical ON Measurements(PhysicalID);
    CREATE INDEX IF NOT EXISTS idx_meas_time ON Measurements(measTStime);

    CREATE TABLE IF NOT EXISTS Calibration (
        PhysicalID INTEGER NOT NULL,
        Version INTEGER NOT NULL,
        s1CalType TEXT NOT NULL,
        s1Coeff0 REAL, s1Coeff1 REAL, s1Coeff2 REAL, s1Coeff3 REAL,
        s2Coeff0 REAL, s2Coeff1 REAL, s2Coeff2 REAL, s2Coeff3 REAL,
        s3Coeff0 REAL, s3Coeff1 REAL, s3Coeff2 REAL, s3Coeff3 REAL,
        s4Coeff0 REAL, s4Coeff1 REAL, s4Coeff2 REAL, s4Coeff3 REAL,
        PRIMARY KEY (PhysicalID, Version)
    );

    CREATE TABLE IF NOT EXISTS PhysicalLocation (
        PhysicalID INTEGER PRIMARY KEY,
        Latitude REAL NOT NULL,
        Longitude REAL NOT NULL
    );

    CREATE TABLE IF NOT EXISTS LogicalLocation (
        LogicalID INTEGER PRIMARY KEY,
        s1Type TEXT,
        s2Type TEXT,
        s3Type TEXT,
        s4Type TEXT
    );
    "#
}
