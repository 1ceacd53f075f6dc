//! Order-preserving label frequency table.

/// Frequency table that remembers the order in which labels first appeared.
///
/// The dominant label is the one with the strictly highest count; ties go
/// to the label inserted first, so the result is reproducible.
#[derive(Debug, Clone)]
pub struct LabelTally<L> {
    counts: Vec<(L, usize)>,
    total: usize,
}

impl<L> Default for LabelTally<L> {
    fn default() -> Self {
        Self {
            counts: Vec::new(),
            total: 0,
        }
    }
}

impl<L: PartialEq> LabelTally<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, label: L) {
        self.total += 1;
        match self.counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((label, 1)),
        }
    }

    pub fn count(&self, label: &L) -> usize {
        self.counts
            .iter()
            .find(|(l, _)| l == label)
            .map_or(0, |(_, count)| *count)
    }

    /// Number of labels recorded, including repeats.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// `(label, count)` pairs in first-seen order.
    pub fn entries(&self) -> &[(L, usize)] {
        &self.counts
    }

    /// Most frequent label and its count.
    pub fn dominant(&self) -> Option<(&L, usize)> {
        let mut best: Option<(&L, usize)> = None;
        for (label, count) in &self.counts {
            if best.map_or(true, |(_, c)| *count > c) {
                best = Some((label, *count));
            }
        }
        best
    }

    /// Share of the dominant label among `denominator` observations.
    pub fn confidence(&self, denominator: usize) -> f64 {
        match self.dominant() {
            Some((_, count)) if denominator > 0 => count as f64 / denominator as f64,
            _ => 0.0,
        }
    }
}

impl<L: PartialEq> FromIterator<L> for LabelTally<L> {
    fn from_iter<I: IntoIterator<Item = L>>(iter: I) -> Self {
        let mut tally = LabelTally::new();
        for label in iter {
            tally.record(label);
        }
        tally
    }
}
