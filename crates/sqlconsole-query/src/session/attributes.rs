//! Well-known session attribute keys

/// Session time zone as last set by the user
pub const TIME_ZONE: &str = "time_zone";

pub const NLS_DATE_FORMAT: &str = "nls_date_format";

pub const NLS_TIMESTAMP_FORMAT: &str = "nls_timestamp_format";

pub const NLS_TIMESTAMP_TZ_FORMAT: &str = "nls_timestamp_tz_format";

/// Every date/time format parameter tracked per session
pub const NLS_FORMAT_KEYS: [&str; 3] = [
    NLS_DATE_FORMAT,
    NLS_TIMESTAMP_FORMAT,
    NLS_TIMESTAMP_TZ_FORMAT,
];
