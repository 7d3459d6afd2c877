use campus_ride_core::config::Config;
use campus_ride_core::geo::Location;
use chrono::NaiveDate;

pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 18).unwrap()
}

pub fn config() -> Config {
    Config::default()
}

pub fn campus() -> Location {
    Location::new(49.8075, -97.1325)
}

pub fn far_home() -> Location {
    Location::new(49.83, -97.14)
}
