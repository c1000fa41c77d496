use chrono::{DateTime, Utc};

/// Elapsed-time capture for one survey page.
///
/// The start instant is taken on the first load event only; later loads and
/// in-page interaction never reset it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmitTimer {
    started_at: Option<DateTime<Utc>>,
}

impl SubmitTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_loaded(&mut self, now: DateTime<Utc>) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    /// Milliseconds from load to `now`. Without a recorded start this
    /// degenerates to `now` as epoch milliseconds; wrong as a duration, but
    /// submission must not be blocked over it.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        match self.started_at {
            Some(started) => (now - started).num_milliseconds(),
            None => now.timestamp_millis(),
        }
    }

    /// Write the elapsed value into the hidden form field. Always returns
    /// true: staging never vetoes the submit.
    pub fn stage_into(&self, field: &mut String, now: DateTime<Utc>) -> bool {
        *field = self.elapsed_ms(now).to_string();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().expect("valid instant")
    }

    #[test]
    fn measures_from_first_load_only() {
        let mut timer = SubmitTimer::new();
        timer.mark_loaded(at(1_000));
        timer.mark_loaded(at(5_000));

        assert_eq!(timer.elapsed_ms(at(7_500)), 6_500);
    }

    #[test]
    fn missing_start_degenerates_to_epoch_millis() {
        let timer = SubmitTimer::new();
        assert_eq!(timer.elapsed_ms(at(123_456)), 123_456);
    }

    #[test]
    fn staging_fills_the_field_and_never_blocks() {
        let mut timer = SubmitTimer::new();
        timer.mark_loaded(at(1_000));

        let mut field = String::from("0");
        assert!(timer.stage_into(&mut field, at(3_250)));
        assert_eq!(field, "2250");
    }
}
