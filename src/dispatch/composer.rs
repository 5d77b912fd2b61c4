//! Caption and image derivation for one card.
//!
//! Pure functions; the engine calls these right before handing an item to
//! the messaging client.

use crate::campaigns::model::Card;

/// Filename stem used when a card has no name to derive one from.
const DEFAULT_IMAGE_NAME: &str = "product";

/// An image ready to hand to the messaging client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    /// Transport-ready payload, exactly as stored on the card.
    pub payload: String,
    /// Filename shown by the receiving client.
    pub filename: String,
}

/// Derive the delivery caption for a card.
///
/// A non-blank override message wins, trimmed. Otherwise the caption is
/// built from the card name and the `$`-prefixed price joined by a blank
/// line; absent fields are omitted entirely, never rendered as empty
/// lines. May return an empty string when the card has nothing to say.
pub fn compose_caption(card: &Card) -> String {
    let override_message = card.message.trim();
    if !override_message.is_empty() {
        return override_message.to_string();
    }

    let mut lines = Vec::new();
    if !card.name.is_empty() {
        lines.push(card.name.clone());
    }
    if !card.price.is_empty() {
        lines.push(format!("${}", card.price));
    }
    lines.join("\n\n")
}

/// Derive the image attachment for a card, if it carries one.
///
/// The payload passes through untouched (URL or data URL alike). The
/// filename is the card name with whitespace runs collapsed to
/// underscores and a fixed `.jpg` extension, falling back to a generic
/// stem for nameless cards.
pub fn normalize_image(card: &Card) -> Option<ImageAttachment> {
    if card.image.is_empty() {
        return None;
    }

    let stem = if card.name.trim().is_empty() {
        DEFAULT_IMAGE_NAME.to_string()
    } else {
        card.name.split_whitespace().collect::<Vec<_>>().join("_")
    };

    Some(ImageAttachment {
        payload: card.image.clone(),
        filename: format!("{stem}.jpg"),
    })
}
