use std::borrow::Cow;

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

use common::{Candle, Error, Result};

use crate::config::{SessionConfig, SessionPreset};

/// Restricts candle series to a time-of-day window in a fixed timezone.
///
/// Bounds are inclusive. A window whose start is after its end wraps past
/// midnight. A disabled filter is the identity.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFilter {
    enabled: bool,
    start: NaiveTime,
    end: NaiveTime,
    timezone: Tz,
}

impl SessionFilter {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            start: NaiveTime::MIN,
            end: hm(23, 59),
            timezone: chrono_tz::America::New_York,
        }
    }

    pub fn window(start: NaiveTime, end: NaiveTime, timezone: Tz) -> Self {
        Self { enabled: true, start, end, timezone }
    }

    /// 09:30–16:00 New York.
    pub fn new_york() -> Self {
        Self::window(hm(9, 30), hm(16, 0), chrono_tz::America::New_York)
    }

    /// 08:00–16:30 London.
    pub fn london() -> Self {
        Self::window(hm(8, 0), hm(16, 30), chrono_tz::Europe::London)
    }

    /// 09:00–18:00 Tokyo.
    pub fn asia() -> Self {
        Self::window(hm(9, 0), hm(18, 0), chrono_tz::Asia::Tokyo)
    }

    pub fn from_config(cfg: &SessionConfig) -> Result<Self> {
        if !cfg.enabled {
            return Ok(Self::disabled());
        }
        Ok(match cfg.preset {
            SessionPreset::NewYork => Self::new_york(),
            SessionPreset::London => Self::london(),
            SessionPreset::Asia => Self::asia(),
            SessionPreset::Custom => {
                let timezone: Tz = cfg
                    .timezone
                    .parse()
                    .map_err(|e| Error::Config(format!("session.timezone '{}': {e}", cfg.timezone)))?;
                Self::window(parse_time(&cfg.start)?, parse_time(&cfg.end)?, timezone)
            }
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether `ts`, seen in the session timezone, falls inside the window.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        if !self.enabled {
            return true;
        }
        let local = ts.with_timezone(&self.timezone).time();
        if self.start <= self.end {
            local >= self.start && local <= self.end
        } else {
            local >= self.start || local <= self.end
        }
    }

    pub fn apply<'a>(&self, candles: &'a [Candle]) -> Cow<'a, [Candle]> {
        if !self.enabled {
            debug!("Session filter disabled, using all candles");
            return Cow::Borrowed(candles);
        }
        let kept: Vec<Candle> = candles.iter().filter(|c| self.contains(c.timestamp)).copied().collect();
        info!(kept = kept.len(), total = candles.len(), tz = %self.timezone, "Session filter applied");
        Cow::Owned(kept)
    }
}

impl Default for SessionFilter {
    fn default() -> Self {
        Self::disabled()
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

fn parse_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M"))
        .map_err(|e| Error::Config(format!("session time '{raw}': {e}")))
}
