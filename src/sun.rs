/*
 *  sun.rs
 *
 *  inkboard - slow glass for fast data
 *  (c) 2023-26 inkboard contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */
//! Sunrise/sunset (NOAA method, zenith 90.833°) and the day/night predicate
//! used to pick day or night rendering for the current conditions and for
//! each hourly forecast entry.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use std::time::SystemTime;

/// Fixed ground position the whole dashboard is rendered for.
#[derive(Debug, Clone, Copy)]
pub struct Observer {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone)]
pub struct SunTimes {
    pub sunrise_utc: Option<DateTime<Utc>>,
    pub sunset_utc: Option<DateTime<Utc>>,
}

// "official" sunrise/sunset zenith, refraction accounted
const ZENITH_DEG: f64 = 90.833;

#[inline]
fn sin_d(x: f64) -> f64 {
    x.to_radians().sin()
}
#[inline]
fn cos_d(x: f64) -> f64 {
    x.to_radians().cos()
}

fn norm360(x: f64) -> f64 {
    let a = x % 360.0;
    if a < 0.0 { a + 360.0 } else { a }
}

/// Universal time (hours, 0..24) of sunrise or sunset on day-of-year `doy`,
/// or None when the sun never crosses the zenith that day (polar regions).
fn event_ut_hours(obs: &Observer, doy: f64, rise: bool) -> Option<f64> {
    let lng_hour = obs.longitude / 15.0;
    let t = if rise {
        doy + (6.0 - lng_hour) / 24.0
    } else {
        doy + (18.0 - lng_hour) / 24.0
    };

    // mean anomaly and true longitude of the sun
    let m = 0.9856 * t - 3.289;
    let l = norm360(m + 1.916 * sin_d(m) + 0.020 * sin_d(2.0 * m) + 282.634);

    // right ascension, quadrant-aligned with L, in hours
    let mut ra = norm360((0.91764 * l.to_radians().tan()).atan().to_degrees());
    ra += (l / 90.0).floor() * 90.0 - (ra / 90.0).floor() * 90.0;
    ra /= 15.0;

    // declination and local hour angle
    let sin_dec = 0.39782 * sin_d(l);
    let cos_dec = (1.0 - sin_dec * sin_dec).sqrt();
    let cos_h =
        (cos_d(ZENITH_DEG) - sin_dec * sin_d(obs.latitude)) / (cos_dec * cos_d(obs.latitude));
    if !(-1.0..=1.0).contains(&cos_h) {
        // Never rises (or never sets) at this latitude on this date.
        return None;
    }

    let h = if rise {
        (360.0 - cos_h.acos().to_degrees()) / 15.0
    } else {
        cos_h.acos().to_degrees() / 15.0
    };

    let local_mean = h + ra - 0.06571 * t - 6.622;
    let ut = local_mean - lng_hour;
    Some(((ut % 24.0) + 24.0) % 24.0)
}

fn ut_hours_to_utc(date: NaiveDate, ut_hours: f64) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    let seconds = (ut_hours * 3600.0).round() as i64;
    DateTime::<Utc>::from_naive_utc_and_offset(midnight + ChronoDuration::seconds(seconds), Utc)
}

/// Sunrise and sunset for a UTC civil date.
pub fn sun_times(obs: &Observer, date: NaiveDate) -> SunTimes {
    let doy = date.ordinal() as f64;
    SunTimes {
        sunrise_utc: event_ut_hours(obs, doy, true).map(|h| ut_hours_to_utc(date, h)),
        sunset_utc: event_ut_hours(obs, doy, false).map(|h| ut_hours_to_utc(date, h)),
    }
}

/// True when the sun is down at `at` for the observer.
///
/// Dark iff the most recent sunset is later than the most recent sunrise.
/// Scanning the surrounding UTC dates keeps this correct when an event lands
/// on the far side of a UTC midnight from the local evening, which it does
/// for the US west coast all summer. Polar indeterminacy defaults to day.
pub fn is_dark(obs: &Observer, at: SystemTime) -> bool {
    let when: DateTime<Utc> = at.into();
    let today = when.date_naive();

    let mut last_rise: Option<DateTime<Utc>> = None;
    let mut last_set: Option<DateTime<Utc>> = None;
    for date in [today.pred_opt(), Some(today), today.succ_opt()]
        .into_iter()
        .flatten()
    {
        let times = sun_times(obs, date);
        if let Some(rise) = times.sunrise_utc {
            if rise <= when && last_rise.is_none_or(|prev| rise > prev) {
                last_rise = Some(rise);
            }
        }
        if let Some(set) = times.sunset_utc {
            if set <= when && last_set.is_none_or(|prev| set > prev) {
                last_set = Some(set);
            }
        }
    }

    match (last_rise, last_set) {
        (Some(rise), Some(set)) => set > rise,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    const SEATTLE: Observer = Observer {
        latitude: 47.677696,
        longitude: -122.351851,
    };

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> SystemTime {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap().into()
    }

    #[test]
    fn summer_solstice_times_are_sane() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 21).unwrap();
        let times = sun_times(&SEATTLE, date);
        let rise = times.sunrise_utc.unwrap();
        let set = times.sunset_utc.unwrap();
        // Seattle: sunrise ~05:11 PDT (12:11 UTC), sunset ~21:10 PDT
        // (04:10 UTC, but reported within the same UTC civil date).
        assert_eq!(rise.date_naive(), date);
        assert!((11..=13).contains(&rise.hour()));
        assert!((3..=5).contains(&set.hour()));
    }

    #[test]
    fn seattle_noon_is_day() {
        // 2025-06-21 12:00 PDT == 19:00 UTC
        assert!(!is_dark(&SEATTLE, utc(2025, 6, 21, 19, 0)));
        // winter noon too: 2025-12-21 12:00 PST == 20:00 UTC
        assert!(!is_dark(&SEATTLE, utc(2025, 12, 21, 20, 0)));
    }

    #[test]
    fn seattle_midnight_is_dark() {
        // 2025-06-21 00:00 PDT == 07:00 UTC
        assert!(is_dark(&SEATTLE, utc(2025, 6, 21, 7, 0)));
        // 23:00 PDT on the 20th == 06:00 UTC on the 21st
        assert!(is_dark(&SEATTLE, utc(2025, 6, 21, 6, 0)));
    }

    #[test]
    fn summer_evening_across_utc_midnight_is_day() {
        // 17:30 PDT == 00:30 UTC next civil date; still broad daylight.
        assert!(!is_dark(&SEATTLE, utc(2025, 6, 22, 0, 30)));
    }

    #[test]
    fn polar_night_defaults_to_day() {
        let svalbard = Observer {
            latitude: 78.22,
            longitude: 15.65,
        };
        // Deep polar night: no rise or set events at all, predicate falls
        // back to "day" rather than guessing.
        let date = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        let times = sun_times(&svalbard, date);
        assert!(times.sunrise_utc.is_none());
        assert!(!is_dark(&svalbard, utc(2025, 1, 5, 12, 0)));
    }
}
