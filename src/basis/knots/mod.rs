//! Implements the knot vector defining the [spline basis functions][crate::basis].
//!
//! A knot vector is stored as an ordered sequence of distinct knots, each carrying a
//! multiplicity. The expanded knot sequence repeats every value according to its
//! multiplicity and has `n + p + 2` entries for a basis of degree `p` with `n + 1`
//! control points.
//!
//! Different [knot vector generation methods][methods] are available.

use thiserror::Error;

use crate::types::KNOT_TOLERANCE;

pub mod methods;

/// A knot value with its multiplicity.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Knot {
    pub value: f64,
    pub multiplicity: usize,
}

impl Knot {
    pub fn new(value: f64, multiplicity: usize) -> Self {
        Knot { value, multiplicity }
    }
}

/// A knot together with the first and last index it occupies in the expanded knot sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedKnot {
    pub knot: Knot,
    pub first: usize,
    pub last: usize,
}

/// Two adjacent indexed knots bounding a non-empty parameter interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnotSpan {
    pub start: IndexedKnot,
    pub end: IndexedKnot,
}

impl KnotSpan {
    /// Index `i` of the span in the expanded sequence, i.e. `U[i] <= u < U[i+1]`.
    pub fn index(&self) -> usize {
        self.start.last
    }

    pub fn length(&self) -> f64 {
        self.end.knot.value - self.start.knot.value
    }

    pub fn contains(&self, u: f64) -> bool {
        self.start.knot.value <= u && u <= self.end.knot.value
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnotVector {
    knots: Vec<Knot>,
}

#[derive(Error, Debug, PartialEq)]
pub enum KnotError {
    #[error("A knot vector needs at least two distinct knots, got `{count}`.")]
    TooFewKnots { count: usize },

    #[error("Knot `u = {value}` has a multiplicity of zero.")]
    ZeroMultiplicity { value: f64 },

    #[error("Knot `u = {value}` is not finite.")]
    NotFinite { value: f64 },

    #[error("Knot `u = {value}` at position `{index}` does not exceed its predecessor `u = {previous}`.")]
    Unsorted { index: usize, previous: f64, value: f64 },

    #[error("At least `{required}` parameters are required for degree `p = {degree}`, got `{count}`.")]
    InsufficientParameters { count: usize, required: usize, degree: usize },

    #[error("The domain `[{lower_bound}, {upper_bound}]` is empty.")]
    EmptyDomain { lower_bound: f64, upper_bound: f64 },
}

impl KnotVector {
    pub fn new(knots: Vec<Knot>) -> Result<Self, KnotError> {
        if knots.len() < 2 {
            return Err(KnotError::TooFewKnots { count: knots.len() });
        }
        for (index, knot) in knots.iter().enumerate() {
            if !knot.value.is_finite() {
                return Err(KnotError::NotFinite { value: knot.value });
            }
            if knot.multiplicity == 0 {
                return Err(KnotError::ZeroMultiplicity { value: knot.value });
            }
            if index > 0 && knots[index - 1].value >= knot.value {
                return Err(KnotError::Unsorted { index, previous: knots[index - 1].value, value: knot.value });
            }
        }
        Ok(KnotVector { knots })
    }

    /// Builds the knot vector from an expanded, non-decreasing knot sequence.
    pub fn from_expanded(values: &[f64]) -> Result<Self, KnotError> {
        let mut knots: Vec<Knot> = Vec::new();
        for (index, &value) in values.iter().enumerate() {
            match knots.last_mut() {
                Some(last) if last.value == value => last.multiplicity += 1,
                Some(last) if last.value > value => {
                    return Err(KnotError::Unsorted { index, previous: last.value, value });
                }
                _ => knots.push(Knot::new(value, 1)),
            }
        }
        KnotVector::new(knots)
    }

    pub fn knots(&self) -> &[Knot] {
        &self.knots
    }

    /// Number of distinct knots.
    pub fn len(&self) -> usize {
        self.knots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }

    pub fn first(&self) -> &Knot {
        &self.knots[0]
    }

    pub fn last(&self) -> &Knot {
        &self.knots[self.knots.len() - 1]
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.first().value, self.last().value)
    }

    /// Interior knots, i.e. all knots without the two boundary knots.
    pub fn interior(&self) -> &[Knot] {
        &self.knots[1..self.knots.len() - 1]
    }

    /// Length of the expanded knot sequence.
    pub fn total_multiplicity(&self) -> usize {
        self.knots.iter().map(|k| k.multiplicity).sum()
    }

    pub fn expanded(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.total_multiplicity());
        for knot in &self.knots {
            values.extend(std::iter::repeat(knot.value).take(knot.multiplicity));
        }
        values
    }

    pub fn indexed(&self) -> Vec<IndexedKnot> {
        let mut first = 0;
        self.knots
            .iter()
            .map(|&knot| {
                let indexed = IndexedKnot { knot, first, last: first + knot.multiplicity - 1 };
                first += knot.multiplicity;
                indexed
            })
            .collect()
    }

    pub fn spans(&self) -> Vec<KnotSpan> {
        self.indexed().windows(2).map(|w| KnotSpan { start: w[0], end: w[1] }).collect()
    }

    /// Returns the position of the distinct knot with value `u`.
    pub fn find(&self, u: f64) -> Option<usize> {
        self.knots.iter().position(|k| (k.value - u).abs() <= KNOT_TOLERANCE)
    }

    pub fn multiplicity(&self, u: f64) -> usize {
        self.find(u).map_or(0, |i| self.knots[i].multiplicity)
    }

    /// Adds `times` occurrences of `u`, creating a new knot if necessary.
    pub(crate) fn add(&mut self, u: f64, times: usize) {
        if times == 0 {
            return;
        }
        match self.find(u) {
            Some(i) => self.knots[i].multiplicity += times,
            None => {
                let i = self.knots.partition_point(|k| k.value < u);
                self.knots.insert(i, Knot::new(u, times));
            }
        }
    }

    /// Removes `times` occurrences of `u`, dropping the knot when its multiplicity reaches zero.
    pub(crate) fn subtract(&mut self, u: f64, times: usize) {
        if let Some(i) = self.find(u) {
            let knot = &mut self.knots[i];
            knot.multiplicity = knot.multiplicity.saturating_sub(times);
            if knot.multiplicity == 0 {
                self.knots.remove(i);
            }
        }
    }

    /// Linearly maps all knot values onto `new_domain`, preserving relative spacing.
    pub fn rescale(&mut self, new_domain: (f64, f64)) -> Result<&mut Self, KnotError> {
        if new_domain.0.partial_cmp(&new_domain.1) != Some(std::cmp::Ordering::Less) {
            return Err(KnotError::EmptyDomain { lower_bound: new_domain.0, upper_bound: new_domain.1 });
        }
        let old_domain = self.domain();
        for knot in self.knots.iter_mut() {
            knot.value = rescaled_knot(knot.value, old_domain, new_domain);
        }
        // pin the boundaries exactly
        self.knots[0].value = new_domain.0;
        let last = self.knots.len() - 1;
        self.knots[last].value = new_domain.1;
        Ok(self)
    }

    /// Mirrors the knot vector within its domain.
    pub fn reverse(&mut self) -> &mut Self {
        let (a, b) = self.domain();
        self.knots.reverse();
        for knot in self.knots.iter_mut() {
            knot.value = a + b - knot.value;
        }
        self.knots[0].value = a;
        let last = self.knots.len() - 1;
        self.knots[last].value = b;
        self
    }

    /// Returns the common knot vector holding, for every knot value present in any of `vectors`,
    /// the maximum multiplicity found across them.
    pub fn common(vectors: &[&KnotVector]) -> Option<KnotVector> {
        let mut common: Option<KnotVector> = None;
        for vector in vectors {
            match common.as_mut() {
                None => common = Some((*vector).clone()),
                Some(c) => {
                    for knot in vector.knots() {
                        let present = c.multiplicity(knot.value);
                        if knot.multiplicity > present {
                            c.add(knot.value, knot.multiplicity - present);
                        }
                    }
                }
            }
        }
        common
    }

    /// Lists the knot values and multiplicities that must be inserted into `self` to reach `target`.
    pub fn missing(&self, target: &KnotVector) -> Vec<Knot> {
        target
            .knots()
            .iter()
            .filter_map(|knot| {
                let present = self.multiplicity(knot.value);
                (knot.multiplicity > present).then(|| Knot::new(knot.value, knot.multiplicity - present))
            })
            .collect()
    }

    /// Checks whether both vectors describe the same expanded sequence within [`KNOT_TOLERANCE`].
    pub fn matches(&self, other: &KnotVector) -> bool {
        self.len() == other.len()
            && self.knots.iter().zip(other.knots.iter()).all(|(a, b)| {
                a.multiplicity == b.multiplicity && (a.value - b.value).abs() <= KNOT_TOLERANCE
            })
    }
}

pub(crate) fn rescaled_knot(mut knot: f64, old_lim: (f64, f64), new_lim: (f64, f64)) -> f64 {
    knot -= old_lim.0;
    knot /= old_lim.1 - old_lim.0;
    knot *= new_lim.1 - new_lim.0;
    knot += new_lim.0;

    knot
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn example() -> KnotVector {
        KnotVector::from_expanded(&[0., 0., 0., 0.25, 0.5, 0.5, 0.75, 1., 1., 1.]).unwrap()
    }

    #[test]
    fn from_expanded_groups_values() {
        let knots = example();
        assert_eq!(
            knots.knots(),
            &[
                Knot::new(0., 3),
                Knot::new(0.25, 1),
                Knot::new(0.5, 2),
                Knot::new(0.75, 1),
                Knot::new(1., 3)
            ]
        );
        assert_eq!(knots.expanded(), vec![0., 0., 0., 0.25, 0.5, 0.5, 0.75, 1., 1., 1.]);
        assert_eq!(knots.total_multiplicity(), 10);
    }

    #[test]
    fn unsorted_is_rejected() {
        assert_eq!(
            KnotVector::from_expanded(&[0., 0., 0.5, 0.25, 1., 1.]),
            Err(KnotError::Unsorted { index: 3, previous: 0.5, value: 0.25 })
        );
        assert_eq!(
            KnotVector::new(vec![Knot::new(0., 2), Knot::new(0., 2)]),
            Err(KnotError::Unsorted { index: 1, previous: 0., value: 0. })
        );
    }

    #[test]
    fn zero_multiplicity_is_rejected() {
        assert_eq!(
            KnotVector::new(vec![Knot::new(0., 2), Knot::new(0.5, 0), Knot::new(1., 2)]),
            Err(KnotError::ZeroMultiplicity { value: 0.5 })
        );
    }

    #[rstest(u, expected, case(0.2, 0), case(0.25, 1), case(0.5, 2), case(0., 3), case(1., 3))]
    fn multiplicity(u: f64, expected: usize) {
        assert_eq!(example().multiplicity(u), expected);
    }

    #[test]
    fn indexed_and_spans() {
        let knots = example();
        let indexed = knots.indexed();
        assert_eq!((indexed[0].first, indexed[0].last), (0, 2));
        assert_eq!((indexed[2].first, indexed[2].last), (4, 5));
        assert_eq!((indexed[4].first, indexed[4].last), (7, 9));

        let spans = knots.spans();
        assert_eq!(spans.len(), 4);
        assert_eq!(spans.iter().map(KnotSpan::index).collect::<Vec<_>>(), vec![2, 3, 5, 6]);
        assert!(spans[1].contains(0.5));
        assert!(!spans[1].contains(0.6));
    }

    #[test]
    fn add_and_subtract() {
        let mut knots = example();
        knots.add(0.6, 1);
        knots.add(0.5, 1);
        assert_eq!(knots.multiplicity(0.6), 1);
        assert_eq!(knots.multiplicity(0.5), 3);
        knots.subtract(0.6, 1);
        assert_eq!(knots.find(0.6), None);
        assert_eq!(knots.len(), 5);
    }

    #[test]
    fn rescale() {
        let mut knots = KnotVector::from_expanded(&[1.0, 1.0, 1.5, 2.0, 2.0]).unwrap();
        knots.rescale((0.0, 1.0)).unwrap();
        assert_eq!(knots.expanded(), vec![0.0, 0.0, 0.5, 1.0, 1.0]);
        assert!(knots.rescale((1.0, 1.0)).is_err());
    }

    #[test]
    fn reverse() {
        let mut knots = KnotVector::from_expanded(&[0.0, 0.0, 0.6, 1.0, 1.0]).unwrap();
        knots.reverse();
        assert_eq!(knots.expanded(), vec![0.0, 0.0, 0.4, 1.0, 1.0]);
    }

    #[test]
    fn common_takes_maximum_multiplicity() {
        let a = KnotVector::from_expanded(&[0., 0., 0., 0.5, 1., 1., 1.]).unwrap();
        let b = KnotVector::from_expanded(&[0., 0., 0., 0.25, 0.5, 0.5, 1., 1., 1.]).unwrap();
        let common = KnotVector::common(&[&a, &b]).unwrap();
        assert_eq!(common.expanded(), vec![0., 0., 0., 0.25, 0.5, 0.5, 1., 1., 1.]);
        assert_eq!(a.missing(&common), vec![Knot::new(0.25, 1), Knot::new(0.5, 1)]);
        assert!(b.missing(&common).is_empty());
        assert!(common.matches(&b));
    }
}
