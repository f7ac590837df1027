/// What a component did with a key press.
///
/// `T` is the component's own event type, e.g. a submitted command name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Consumed with nothing to report
  Handled,
  /// Consumed, and the owner should act on the event
  Event(T),
  /// Not for this component; try the next handler
  NotHandled,
}
