//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. `AgentName` is
/// the main one in this workspace: two names with the same text address the
/// same registry slot, regardless of where they were parsed.
///
/// The trait requires:
/// - **Clone**: values are cheap to copy around (routing tables, reports)
/// - **PartialEq**: compared by their attribute values
/// - **Debug**: readable in logs and test failures
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
