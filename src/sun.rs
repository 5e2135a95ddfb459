//! Daily sun event times.
//!
//! [`SolarCalculator`] uses the NOAA general solar position equations, which
//! are accurate to a minute or two at mid latitudes. That is far finer than a
//! coop door needs.

use std::f64::consts::PI;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone, Utc};

/// Zenith angle of the sun's centre at sunrise and sunset, allowing for
/// refraction and the solar disc.
const SUNRISE_ZENITH: f64 = 90.833;
/// Civil twilight.
const CIVIL_ZENITH: f64 = 96.0;

/// Supplier of the four daily sun events for a given local date.
pub trait SunTimes: Send {
    fn dawn(&self, date: NaiveDate) -> DateTime<Local>;
    fn sunrise(&self, date: NaiveDate) -> DateTime<Local>;
    fn sunset(&self, date: NaiveDate) -> DateTime<Local>;
    fn dusk(&self, date: NaiveDate) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarCalculator {
    latitude: f64,
    /// Degrees, positive east.
    longitude: f64,
}

impl SolarCalculator {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        SolarCalculator {
            latitude,
            longitude,
        }
    }

    /// Morning and evening crossing of `zenith`, as UTC instants.
    ///
    /// Where the sun never reaches the zenith on that day both events collapse
    /// onto solar noon (or midnight) rather than failing.
    fn crossings(&self, date: NaiveDate, zenith: f64) -> (DateTime<Utc>, DateTime<Utc>) {
        let gamma = 2.0 * PI / 365.0 * f64::from(date.ordinal0());
        let eqtime = 229.18
            * (0.000075 + 0.001868 * gamma.cos()
                - 0.032077 * gamma.sin()
                - 0.014615 * (2.0 * gamma).cos()
                - 0.040849 * (2.0 * gamma).sin());
        let decl = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
            - 0.006758 * (2.0 * gamma).cos()
            + 0.000907 * (2.0 * gamma).sin()
            - 0.002697 * (3.0 * gamma).cos()
            + 0.00148 * (3.0 * gamma).sin();

        let lat = self.latitude.to_radians();
        let cos_ha = zenith.to_radians().cos() / (lat.cos() * decl.cos()) - lat.tan() * decl.tan();
        let ha = cos_ha.max(-1.0).min(1.0).acos().to_degrees();

        let rise_minutes = 720.0 - 4.0 * (self.longitude + ha) - eqtime;
        let set_minutes = 720.0 - 4.0 * (self.longitude - ha) - eqtime;

        let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default());
        let at = |minutes: f64| midnight + Duration::seconds((minutes * 60.0).round() as i64);
        (at(rise_minutes), at(set_minutes))
    }
}

impl SunTimes for SolarCalculator {
    fn dawn(&self, date: NaiveDate) -> DateTime<Local> {
        self.crossings(date, CIVIL_ZENITH).0.with_timezone(&Local)
    }

    fn sunrise(&self, date: NaiveDate) -> DateTime<Local> {
        self.crossings(date, SUNRISE_ZENITH).0.with_timezone(&Local)
    }

    fn sunset(&self, date: NaiveDate) -> DateTime<Local> {
        self.crossings(date, SUNRISE_ZENITH).1.with_timezone(&Local)
    }

    fn dusk(&self, date: NaiveDate) -> DateTime<Local> {
        self.crossings(date, CIVIL_ZENITH).1.with_timezone(&Local)
    }
}
