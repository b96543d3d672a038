//! NMEA-0183 sentence parsing.
//!
//! Supports the two sentences every receiver emits:
//! - **GGA** - Fix data: time, position, fix quality, satellites, altitude
//! - **RMC** - Recommended minimum: time, validity, position, date
//!
//! Any talker ID is accepted (`$GPGGA`, `$GNGGA`, ...). When a sentence
//! carries a `*HH` checksum it must match; sentences without one are taken
//! as they are.

use chrono::{NaiveDate, NaiveTime};
use tracing::trace;

/// GGA fix data.
#[derive(Debug, Clone, PartialEq)]
pub struct GgaFix {
    /// UTC time of the fix.
    pub time: Option<NaiveTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// 0 = no fix, 1 = GPS, 2 = DGPS, ...
    pub quality: u8,
    pub satellites: u8,
    /// Altitude above mean sea level in meters.
    pub altitude: Option<f64>,
}

impl GgaFix {
    /// Returns true if the receiver reports a fix with coordinates.
    pub fn has_fix(&self) -> bool {
        self.quality > 0 && self.latitude.is_some() && self.longitude.is_some()
    }
}

/// RMC recommended minimum data.
#[derive(Debug, Clone, PartialEq)]
pub struct RmcFix {
    pub time: Option<NaiveTime>,
    /// Status `A` (active). `V` means void.
    pub valid: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub date: Option<NaiveDate>,
}

/// A parsed sentence.
#[derive(Debug, Clone, PartialEq)]
pub enum NmeaSentence {
    Gga(GgaFix),
    Rmc(RmcFix),
}

/// Parse one sentence. Returns `None` for unsupported or malformed input.
pub fn parse_sentence(line: &str) -> Option<NmeaSentence> {
    let body = verify_checksum(line.trim())?;
    let fields: Vec<&str> = body.split(',').collect();

    // Lines arrive lossy-decoded, so slice only at char boundaries
    let id = fields.first()?;
    if id.len() < 5 {
        return None;
    }

    match id.get(id.len() - 3..)? {
        "GGA" => parse_gga(&fields).map(NmeaSentence::Gga),
        "RMC" => parse_rmc(&fields).map(NmeaSentence::Rmc),
        other => {
            trace!(sentence = other, "Ignoring unsupported NMEA sentence");
            None
        }
    }
}

/// Strip the leading `$` and trailing checksum, verifying it when present.
fn verify_checksum(line: &str) -> Option<&str> {
    let line = line.strip_prefix('$')?;

    let Some((body, checksum)) = line.split_once('*') else {
        return Some(line);
    };

    let expected = u8::from_str_radix(checksum.get(..2)?, 16).ok()?;
    let actual = body.bytes().fold(0u8, |acc, b| acc ^ b);
    if actual != expected {
        trace!(
            expected = format!("{:02X}", expected),
            actual = format!("{:02X}", actual),
            "NMEA checksum mismatch"
        );
        return None;
    }

    Some(body)
}

/// `$xxGGA,hhmmss.ss,llll.ll,a,yyyyy.yy,a,q,nn,h.h,alt,M,...`
fn parse_gga(fields: &[&str]) -> Option<GgaFix> {
    if fields.len() < 10 {
        trace!("GGA sentence too short: {} fields", fields.len());
        return None;
    }

    Some(GgaFix {
        time: parse_time(fields[1]),
        latitude: parse_coordinate(fields[2], fields[3]),
        longitude: parse_coordinate(fields[4], fields[5]),
        quality: fields[6].parse().unwrap_or(0),
        satellites: fields[7].parse().unwrap_or(0),
        altitude: fields[9].parse().ok(),
    })
}

/// `$xxRMC,hhmmss.ss,A,llll.ll,a,yyyyy.yy,a,x.x,x.x,ddmmyy,...`
fn parse_rmc(fields: &[&str]) -> Option<RmcFix> {
    if fields.len() < 10 {
        trace!("RMC sentence too short: {} fields", fields.len());
        return None;
    }

    Some(RmcFix {
        time: parse_time(fields[1]),
        valid: fields[2] == "A",
        latitude: parse_coordinate(fields[3], fields[4]),
        longitude: parse_coordinate(fields[5], fields[6]),
        date: NaiveDate::parse_from_str(fields[9], "%d%m%y").ok(),
    })
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    if value.len() < 6 {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H%M%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H%M%S"))
        .ok()
}

/// Convert `(d)ddmm.mmmm` plus hemisphere to signed decimal degrees.
fn parse_coordinate(value: &str, hemisphere: &str) -> Option<f64> {
    let dot = value.find('.').unwrap_or(value.len());
    if dot < 3 {
        return None;
    }

    let degrees: f64 = value.get(..dot - 2)?.parse().ok()?;
    let minutes: f64 = value.get(dot - 2..)?.parse().ok()?;
    let decimal = degrees + minutes / 60.0;

    match hemisphere {
        "N" | "E" => Some(decimal),
        "S" | "W" => Some(-decimal),
        _ => None,
    }
}
