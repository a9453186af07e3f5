//! Session records and their time-window state.
//!
//! A record is ACTIVE inside its `[input_time, output_time]` window (both
//! bounds inclusive), WAITING before it, EXPIRED after it and FREE when either
//! bound is missing. State and remaining text are derived; they are only
//! changed by `refresh`, never set directly.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Derived status of a session window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    Waiting,
    Active,
    Expired,
    #[default]
    Free,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Active => "ACTIVE",
            Self::Expired => "EXPIRED",
            Self::Free => "FREE",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating a record against a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub state: State,
    pub remaining: String,
}

impl Evaluation {
    fn new(state: State, remaining: impl Into<String>) -> Self {
        Self {
            state,
            remaining: remaining.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Record {
    pub code: String,
    pub input_time: Option<NaiveDateTime>,
    pub output_time: Option<NaiveDateTime>,
    state: State,
    remaining: String,
}

impl Record {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    pub fn with_window(
        code: impl Into<String>,
        input_time: Option<NaiveDateTime>,
        output_time: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            code: code.into(),
            input_time,
            output_time,
            ..Self::default()
        }
    }

    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
    }

    pub fn set_input_time(&mut self, input_time: Option<NaiveDateTime>) {
        self.input_time = input_time;
    }

    pub fn set_output_time(&mut self, output_time: Option<NaiveDateTime>) {
        self.output_time = output_time;
    }

    /// State as of the last `refresh`
    pub fn state(&self) -> State {
        self.state
    }

    /// Remaining-time text as of the last `refresh`
    pub fn remaining(&self) -> &str {
        &self.remaining
    }

    /// Compute state and remaining text as of `now`.
    ///
    /// WAITING shows the configured window length (`output - input`), not the
    /// time left until the window opens.
    pub fn evaluate(&self, now: NaiveDateTime) -> Evaluation {
        let (Some(input), Some(output)) = (self.input_time, self.output_time) else {
            return Evaluation::new(State::Free, "");
        };

        if input <= now && now <= output {
            Evaluation::new(State::Active, format_hms(output - now))
        } else if input > now {
            Evaluation::new(State::Waiting, format_hm(output - input))
        } else {
            Evaluation::new(State::Expired, "0")
        }
    }

    /// Evaluate and store the result on the record.
    /// Returns the `(old, new)` pair when the state changed.
    pub fn refresh(&mut self, now: NaiveDateTime) -> Option<(State, State)> {
        let Evaluation { state, remaining } = self.evaluate(now);
        let old = self.state;
        self.state = state;
        self.remaining = remaining;
        (old != state).then_some((old, state))
    }
}

/// Format as `HH:MM:SS`; hours are total hours and do not wrap at 24
pub fn format_hms(delta: TimeDelta) -> String {
    let secs = delta.num_seconds().unsigned_abs();
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    format!("{:02}:{:02}:{:02}", h, m, s)
}

/// Format as `HH:MM`, clock style: whole days are dropped, so 25h30m reads
/// `01:30`
pub fn format_hm(delta: TimeDelta) -> String {
    let secs = delta.num_seconds().unsigned_abs();
    format!("{:02}:{:02}", (secs / 3600) % 24, (secs / 60) % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn window(input: NaiveDateTime, output: NaiveDateTime) -> Record {
        Record::with_window("fix", Some(input), Some(output))
    }

    fn eval(record: &Record, now: NaiveDateTime) -> (State, String) {
        let e = record.evaluate(now);
        (e.state, e.remaining)
    }

    #[test]
    fn test_expired_window() {
        let r = window(at(11, 0, 0), at(11, 10, 0));
        assert_eq!(eval(&r, at(12, 0, 0)), (State::Expired, "0".to_string()));
    }

    #[test]
    fn test_active_window_starting_now() {
        let r = window(at(12, 0, 0), at(12, 10, 0));
        assert_eq!(
            eval(&r, at(12, 0, 0)),
            (State::Active, "00:10:00".to_string())
        );
        assert_eq!(
            eval(&r, at(12, 9, 59)),
            (State::Active, "00:00:01".to_string())
        );
    }

    #[test]
    fn test_unset_window_is_free() {
        let r = Record::new("fix0003");
        assert_eq!(eval(&r, at(12, 0, 0)), (State::Free, String::new()));
    }

    #[test]
    fn test_half_configured_window_is_free() {
        let only_input = Record::with_window("a", Some(at(11, 0, 0)), None);
        let only_output = Record::with_window("b", None, Some(at(13, 0, 0)));
        for now in [at(10, 0, 0), at(12, 0, 0), at(14, 0, 0)] {
            assert_eq!(eval(&only_input, now), (State::Free, String::new()));
            assert_eq!(eval(&only_output, now), (State::Free, String::new()));
        }
    }

    #[test]
    fn test_waiting_shows_window_length() {
        let r = window(at(12, 5, 0), at(12, 15, 0));
        assert_eq!(
            eval(&r, at(12, 0, 0)),
            (State::Waiting, "00:10".to_string())
        );
        // Same text regardless of how far away the start is
        assert_eq!(eval(&r, at(3, 0, 0)).1, "00:10");
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let r = window(at(12, 0, 0), at(12, 10, 0));
        assert_eq!(r.evaluate(at(12, 0, 0)).state, State::Active);
        let end = r.evaluate(at(12, 10, 0));
        assert_eq!(end.state, State::Active);
        assert_eq!(end.remaining, "00:00:00");
        assert_eq!(r.evaluate(at(12, 10, 1)).state, State::Expired);
        assert_eq!(r.evaluate(at(11, 59, 59)).state, State::Waiting);
    }

    #[test]
    fn test_active_hours_do_not_wrap() {
        let input = at(12, 0, 0);
        let output = input + TimeDelta::hours(30) + TimeDelta::minutes(5);
        let r = window(input, output);
        assert_eq!(r.evaluate(input).remaining, "30:05:00");
    }

    #[test]
    fn test_waiting_hours_wrap_at_a_day() {
        let now = at(12, 0, 0);
        let input = now + TimeDelta::hours(1);
        let output = now + TimeDelta::hours(26) + TimeDelta::minutes(30);
        let r = window(input, output);
        assert_eq!(eval(&r, now), (State::Waiting, "01:30".to_string()));
    }

    #[test]
    fn test_subsecond_remaining_truncates() {
        let r = window(at(12, 0, 0), at(12, 10, 0));
        let now = at(12, 9, 59) + TimeDelta::milliseconds(500);
        assert_eq!(r.evaluate(now).remaining, "00:00:00");
    }

    #[test]
    fn test_inverted_window_applies_formula_literally() {
        // Output before input: never active, waiting shows the magnitude
        let r = window(at(12, 30, 0), at(12, 10, 0));
        assert_eq!(
            eval(&r, at(12, 0, 0)),
            (State::Waiting, "00:20".to_string())
        );
        assert_eq!(eval(&r, at(12, 20, 0)).0, State::Waiting);
        assert_eq!(eval(&r, at(12, 40, 0)), (State::Expired, "0".to_string()));

        let zero = window(at(12, 30, 0), at(12, 30, 0));
        assert_eq!(eval(&zero, at(12, 0, 0)).1, "00:00");
        assert_eq!(eval(&zero, at(12, 30, 0)).0, State::Active);
    }

    #[test]
    fn test_refresh_stores_result_and_reports_change() {
        let mut r = window(at(12, 0, 0), at(12, 10, 0));
        assert_eq!(r.state(), State::Free);
        assert_eq!(r.remaining(), "");

        assert_eq!(
            r.refresh(at(11, 0, 0)),
            Some((State::Free, State::Waiting))
        );
        assert_eq!(r.remaining(), "00:10");

        assert_eq!(
            r.refresh(at(12, 0, 0)),
            Some((State::Waiting, State::Active))
        );
        assert_eq!(r.refresh(at(12, 5, 0)), None);
        assert_eq!(r.remaining(), "00:05:00");

        r.set_output_time(None);
        assert_eq!(r.refresh(at(12, 5, 0)), Some((State::Active, State::Free)));
        assert_eq!(r.remaining(), "");
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_hms(TimeDelta::seconds(3661)), "01:01:01");
        assert_eq!(format_hm(TimeDelta::seconds(3661)), "01:01");
        assert_eq!(format_hm(TimeDelta::hours(24)), "00:00");
        assert_eq!(format_hm(TimeDelta::minutes(25 * 60 + 30)), "01:30");
        assert_eq!(format_hm(TimeDelta::minutes(-(25 * 60 + 30))), "01:30");
        assert_eq!(format_hms(TimeDelta::hours(100)), "100:00:00");
        assert_eq!(format_hms(TimeDelta::seconds(-61)), "00:01:01");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(State::Waiting.to_string(), "WAITING");
        assert_eq!(
            serde_json::to_string(&State::Expired).unwrap(),
            "\"EXPIRED\""
        );
    }
}
