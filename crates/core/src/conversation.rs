//! Conversation-related types.

use tulip_model::ModelMessage;

/// Where a conversation item comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TranscriptSource {
    /// The system prompt.
    System,
    /// A message written on behalf of the user, including the instructions
    /// the agent injects between stages.
    User,
    /// A model response.
    Assistant,
    /// The result of a tool call.
    Tool,
}

/// Represents a conversation.
///
/// Items are only ever appended, the order is the order in which messages
/// are sent to the model.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    pub(crate) items: Vec<Item>,
}

impl Conversation {
    /// Returns all items of this conversation.
    #[inline]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Returns the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing has been said yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn push(
        &mut self,
        msg: ModelMessage,
        transcript: String,
        source: TranscriptSource,
    ) -> &Item {
        self.items.push(Item {
            msg,
            transcript,
            source,
        });
        &self.items[self.items.len() - 1]
    }

    pub(crate) fn messages(&self) -> Vec<ModelMessage> {
        self.items.iter().map(|item| item.msg.clone()).collect()
    }
}

/// An item in the conversation.
#[derive(Clone, Debug)]
pub struct Item {
    pub(crate) msg: ModelMessage,
    pub(crate) transcript: String,
    pub(crate) source: TranscriptSource,
}

impl Item {
    /// Returns the transcript of this item.
    ///
    /// The transcript is a string representation of the message item,
    /// which can be exported later. But transcript alone is not enough
    /// to reconstruct the message item.
    #[inline]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Returns who produced this item.
    #[inline]
    pub fn source(&self) -> TranscriptSource {
        self.source
    }

    /// Returns the message sent to the model for this item.
    #[inline]
    pub fn message(&self) -> &ModelMessage {
        &self.msg
    }
}
