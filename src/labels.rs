//! Label space over a product of cyclic groups \(\mathbb{Z}_{m_1} \times \dots \times \mathbb{Z}_{m_k}\).

use itertools::Itertools;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while building a modulus list or checking a label against it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LabelError {
    /// The modulus list has no entries.
    #[error("modulus list is empty")]
    EmptyModuli,
    /// A modulus is zero, so its component has no admissible value.
    #[error("modulus at position {index} is zero")]
    ZeroModulus {
        /// Position of the zero modulus.
        index: usize,
    },
    /// The product of the moduli does not fit in a `u64`.
    #[error("label space of {moduli:?} has more than u64::MAX labels")]
    LabelSpaceOverflow {
        /// The offending modulus list.
        moduli: Vec<u32>,
    },
    /// A label has the wrong number of components.
    #[error("label has {got} components, expected {expected}")]
    WrongArity {
        /// Number of moduli.
        expected: usize,
        /// Number of components in the label.
        got: usize,
    },
    /// A label component is not reduced modulo its modulus.
    #[error("component {index} of label is {value}, expected a value below {modulus}")]
    ComponentOutOfRange {
        /// Component position.
        index: usize,
        /// Component value.
        value: u32,
        /// Modulus for that position.
        modulus: u32,
    },
}

// ============================================================================
// Label
// ============================================================================

/// A vertex label: one residue per modulus.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(Box<[u32]>);

impl Label {
    /// Creates a label from its components without range checks.
    ///
    /// Use [`Moduli::check_label`] to validate it against a modulus list.
    pub fn new(components: impl Into<Vec<u32>>) -> Self {
        Self(components.into().into_boxed_slice())
    }

    /// Returns the residues of this label.
    #[inline]
    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl From<Vec<u32>> for Label {
    fn from(components: Vec<u32>) -> Self {
        Self::new(components)
    }
}

impl<const K: usize> From<[u32; K]> for Label {
    fn from(components: [u32; K]) -> Self {
        Self::new(components.to_vec())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.iter().join(", "))
    }
}

// ============================================================================
// Moduli
// ============================================================================

/// An ordered, non-empty list of moduli.
///
/// The product of the moduli is guaranteed to fit in a `u64`, so every label
/// has a unique mixed-radix code (see [`Moduli::code`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Moduli {
    moduli: Box<[u32]>,
    space_size: u64,
}

impl Moduli {
    /// Validates and wraps a modulus list.
    ///
    /// # Errors
    /// Returns an error if the list is empty, contains a zero, or the label
    /// space would have more than `u64::MAX` elements.
    pub fn new(moduli: impl Into<Vec<u32>>) -> Result<Self, LabelError> {
        let moduli = moduli.into();
        if moduli.is_empty() {
            return Err(LabelError::EmptyModuli);
        }
        if let Some(index) = moduli.iter().position(|&m| m == 0) {
            return Err(LabelError::ZeroModulus { index });
        }
        let space_size = moduli
            .iter()
            .try_fold(1u64, |acc, &m| acc.checked_mul(u64::from(m)))
            .ok_or_else(|| LabelError::LabelSpaceOverflow {
                moduli: moduli.clone(),
            })?;
        Ok(Self {
            moduli: moduli.into_boxed_slice(),
            space_size,
        })
    }

    /// Returns the moduli in order.
    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.moduli
    }

    /// Number of components per label.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.moduli.len()
    }

    /// Number of labels in the label space, \(\prod m_i\).
    #[inline]
    pub fn space_size(&self) -> u64 {
        self.space_size
    }

    /// Checks that `label` has one component per modulus, each reduced.
    ///
    /// # Errors
    /// Returns [`LabelError::WrongArity`] or [`LabelError::ComponentOutOfRange`].
    pub fn check_label(&self, label: &Label) -> Result<(), LabelError> {
        let components = label.components();
        if components.len() != self.moduli.len() {
            return Err(LabelError::WrongArity {
                expected: self.moduli.len(),
                got: components.len(),
            });
        }
        for (index, (&value, &modulus)) in components.iter().zip(self.moduli.iter()).enumerate() {
            if value >= modulus {
                return Err(LabelError::ComponentOutOfRange {
                    index,
                    value,
                    modulus,
                });
            }
        }
        Ok(())
    }

    /// Edge label induced by two endpoint labels: the component-wise sum,
    /// each component reduced by its modulus.
    pub fn combine(&self, a: &Label, b: &Label) -> Label {
        let components = a
            .components()
            .iter()
            .zip(b.components())
            .zip(self.moduli.iter())
            .map(|((&x, &y), &m)| add_mod(x, y, m))
            .collect::<Vec<_>>();
        Label::new(components)
    }

    /// Mixed-radix code of a label, in `[0, space_size)`.
    ///
    /// Codes follow the lexicographic order of [`label_space`].
    pub fn code(&self, label: &Label) -> u64 {
        label
            .components()
            .iter()
            .zip(self.moduli.iter())
            .fold(0u64, |acc, (&x, &m)| acc * u64::from(m) + u64::from(x))
    }

    /// Code of `combine(a, b)` without materializing the label.
    ///
    /// This is the validator's hot path: O(k), no allocation.
    #[inline]
    pub fn combined_code(&self, a: &[u32], b: &[u32]) -> u64 {
        debug_assert_eq!(a.len(), self.moduli.len());
        debug_assert_eq!(b.len(), self.moduli.len());
        let mut acc = 0u64;
        for i in 0..self.moduli.len() {
            let m = self.moduli[i];
            acc = acc * u64::from(m) + u64::from(add_mod(a[i], b[i], m));
        }
        acc
    }
}

impl fmt::Display for Moduli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.moduli.iter().map(|m| format!("Z_{m}")).join(" x "))
    }
}

#[inline(always)]
fn add_mod(x: u32, y: u32, m: u32) -> u32 {
    ((u64::from(x) + u64::from(y)) % u64::from(m)) as u32
}

// ============================================================================
// Label space
// ============================================================================

/// Builds the full label space of `moduli` in lexicographic order.
///
/// The result has exactly [`Moduli::space_size`] distinct labels and is the
/// same for every call with the same moduli.
pub fn label_space(moduli: &Moduli) -> Vec<Label> {
    iter_label_space(moduli).collect()
}

/// Lazy form of [`label_space`], for taking a prefix of a large space.
pub fn iter_label_space(moduli: &Moduli) -> impl Iterator<Item = Label> + '_ {
    moduli
        .as_slice()
        .iter()
        .map(|&m| 0..m)
        .multi_cartesian_product()
        .map(Label::from)
}

// ============================================================================
// Tests
// ============================================================================
