/// Outcome of offering a key to a component.
///
/// Views try their components in order and stop at the first one that
/// does not answer `NotHandled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Consumed with nothing to report
  Handled,
  /// Consumed, and the owner has to act on `T`
  Event(T),
  NotHandled,
}
