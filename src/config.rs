use std::time::Duration;

use url::form_urlencoded;

use crate::foundation::error::{ReelError, ReelResult};

pub const DEFAULT_DELAY_MS: u64 = 1000;

/// Startup parameters for a playback session: which frames, and how fast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchConfig {
    pub ids: Vec<String>,
    pub delay: Duration,
}

impl LaunchConfig {
    pub fn new(ids: Vec<String>, delay_ms: u64) -> ReelResult<Self> {
        let ids: Vec<String> = ids
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if ids.is_empty() {
            return Err(ReelError::config("no frame ids given (`id` is required)"));
        }
        if delay_ms == 0 {
            return Err(ReelError::config("delay must be a positive number of milliseconds"));
        }
        Ok(Self {
            ids,
            delay: Duration::from_millis(delay_ms),
        })
    }

    /// Parse `id=a,b,c&delay=500` (a leading `?` is allowed).
    ///
    /// Decoding is `application/x-www-form-urlencoded`: `+` is a space and malformed
    /// `%` escapes are kept verbatim. `id` is required; `delay` defaults to
    /// [`DEFAULT_DELAY_MS`].
    pub fn from_query(query: &str) -> ReelResult<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);

        let mut ids: Option<String> = None;
        let mut delay: Option<String> = None;
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                // First occurrence wins.
                "id" if ids.is_none() => ids = Some(value.into_owned()),
                "delay" if delay.is_none() => delay = Some(value.into_owned()),
                _ => {}
            }
        }

        let ids = ids.ok_or_else(|| ReelError::config("no `id` parameter in query"))?;
        let delay_ms = match delay {
            None => DEFAULT_DELAY_MS,
            Some(v) => parse_delay(&v)?,
        };

        Self::new(split_ids(&ids), delay_ms)
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay.as_millis() as u64
    }
}

pub fn split_ids(list: &str) -> Vec<String> {
    list.split(',').map(str::to_string).collect()
}

pub fn parse_delay(v: &str) -> ReelResult<u64> {
    v.trim().parse::<u64>().map_err(|_| {
        ReelError::config(format!("delay '{v}' is not a whole number of milliseconds"))
    })
}

#[cfg(test)]
#[path = "../tests/unit/config/config.rs"]
mod tests;
