use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A provider-native message that the agent stores but never inspects.
///
/// Some providers need the exact assistant message they produced (for
/// example one carrying its tool call list) to be sent back in the next
/// request. Providers wrap that message in an `OpaqueMessage`, the agent
/// keeps it in the conversation, and the provider unwraps it again when
/// serializing the history.
///
/// Two opaque messages are equal when their ids are equal.
#[derive(Clone)]
pub struct OpaqueMessage {
    id: Arc<str>,
    value: Arc<dyn Any + Send + Sync>,
}

impl OpaqueMessage {
    /// Creates a new `OpaqueMessage`.
    ///
    /// The `id` should be unique across the conversation.
    #[inline]
    pub fn new<ID: Into<String>, T: Send + Sync + 'static>(
        id: ID,
        value: T,
    ) -> Self {
        Self {
            id: Arc::from(id.into()),
            value: Arc::new(value),
        }
    }

    /// Returns the id of this message.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the wrapped value if it has type `T`.
    #[inline]
    pub fn to_raw<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }
}

impl Debug for OpaqueMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueMessage")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl PartialEq for OpaqueMessage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for OpaqueMessage {}

impl Hash for OpaqueMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
