//! Triggers that invite a visitor into the chat before they open it.

use std::time::Duration;

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};

use crate::config::DialogConfig;

pub const GREETING_IDLE: Duration = Duration::from_secs(15);
pub const GREETING_SCROLL_PERCENT: f64 = 50.0;

/// Decides when the floating greeting bubble appears: after the idle delay or
/// once the page is scrolled past half way, and never after the visitor has
/// interacted with the widget.
#[derive(Clone, Debug, Default)]
pub struct GreetingTrigger {
    shown: bool,
}

impl GreetingTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores the one-shot flag reported by the page.
    pub fn already_shown(shown: bool) -> Self {
        Self { shown }
    }

    pub fn is_shown(&self) -> bool {
        self.shown
    }

    pub fn on_idle(&mut self, elapsed: Duration, has_interacted: bool) -> bool {
        self.fire(!has_interacted && elapsed >= GREETING_IDLE)
    }

    pub fn on_scroll(
        &mut self,
        scroll_y: f64,
        scroll_height: f64,
        viewport_height: f64,
        has_interacted: bool,
    ) -> bool {
        let scrollable = scroll_height - viewport_height;
        if scrollable <= 0.0 {
            return false;
        }
        let percent = scroll_y / scrollable * 100.0;
        self.fire(!has_interacted && percent > GREETING_SCROLL_PERCENT)
    }

    /// Returns true only on the call that first shows the bubble.
    fn fire(&mut self, condition: bool) -> bool {
        if self.shown || !condition {
            return false;
        }
        self.shown = true;
        true
    }
}

/// One-shot detector for the pointer leaving through the top of the viewport.
#[derive(Clone, Debug, Default)]
pub struct ExitIntentDetector {
    fired: bool,
}

impl ExitIntentDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores the one-shot flag from a persisted session.
    pub fn already_fired(fired: bool) -> Self {
        Self { fired }
    }

    pub fn on_pointer_leave(&mut self, client_y: f64) -> bool {
        if self.fired || client_y > 0.0 {
            return false;
        }
        self.fired = true;
        true
    }
}

/// Weekday opening hours in a fixed UTC offset, driving the online indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusinessHours {
    start_hour: u32,
    end_hour: u32,
    offset: FixedOffset,
}

impl BusinessHours {
    pub fn new(start_hour: u32, end_hour: u32, utc_offset_hours: i32) -> Option<Self> {
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600)?;
        (start_hour < end_hour && end_hour <= 24).then_some(Self { start_hour, end_hour, offset })
    }

    pub fn from_config(config: &DialogConfig) -> Option<Self> {
        Self::new(config.business_hours_start, config.business_hours_end, config.utc_offset_hours)
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.offset);
        let weekday = !matches!(local.weekday(), Weekday::Sat | Weekday::Sun);
        weekday && (self.start_hour..self.end_hour).contains(&local.hour())
    }
}
