//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity**: two instances with the same attribute
/// values are interchangeable. Unit items produced for a knapsack solve are
/// modelled this way.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Volume(u32);
///
/// impl ValueObject for Volume {}
///
/// assert_eq!(Volume(3), Volume(3));
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
