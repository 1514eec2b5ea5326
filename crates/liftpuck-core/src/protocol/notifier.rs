/// Edge detector for values pushed to the phone only when they change.
///
/// The last value is recorded by the caller once the notification was
/// actually delivered, so a value that could not be sent is retried.
#[derive(Debug, Clone)]
pub struct EdgeNotifier<T> {
    last: Option<T>,
    baseline: Option<T>,
}

impl<T: Copy + PartialEq> EdgeNotifier<T> {
    /// `baseline` is the value assumed before anything was reported; `None`
    /// makes the first observation always count as a change.
    pub const fn new(baseline: Option<T>) -> Self {
        Self { last: baseline, baseline }
    }

    pub fn is_change(&self, value: T) -> bool {
        self.last != Some(value)
    }

    pub fn record(&mut self, value: T) {
        self.last = Some(value);
    }

    /// Forget what was reported, e.g. for a newly connected peer.
    pub fn reset(&mut self) {
        self.last = self.baseline;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_suppresses_initial_value() {
        let mut n = EdgeNotifier::new(Some(false));
        assert!(!n.is_change(false));
        assert!(n.is_change(true));
        n.record(true);
        assert!(!n.is_change(true));
        n.reset();
        assert!(n.is_change(true));
    }

    #[test]
    fn no_baseline_reports_first_value() {
        let mut n = EdgeNotifier::<u8>::new(None);
        assert!(n.is_change(0));
        n.record(0);
        assert!(!n.is_change(0));
    }
}
