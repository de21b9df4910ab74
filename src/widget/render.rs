//! Incremental drawing of a [`WidgetView`].
//!
//! Renderers keep a [`Renderer`] and apply the [`Patch`]es it returns for each
//! new view instead of redrawing the whole message list.

use super::{Message, WidgetView};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Patch {
    HideTyping,
    Append(Message),
    ShowTyping,
    /// Bring the newest entry into sight.
    ScrollToBottom,
}

#[derive(Debug, Default)]
pub struct Renderer {
    drawn: usize,
    typing_shown: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patch(&mut self, view: &WidgetView) -> Vec<Patch> {
        let fresh = view.messages.get(self.drawn..).unwrap_or_default();
        let mut patches = Vec::with_capacity(fresh.len() + 3);

        // The typing indicator always stays below the last message.
        if self.typing_shown && (!view.typing || !fresh.is_empty()) {
            patches.push(Patch::HideTyping);
            self.typing_shown = false;
        }
        patches.extend(fresh.iter().cloned().map(Patch::Append));
        self.drawn = view.messages.len();

        if view.typing && !self.typing_shown {
            patches.push(Patch::ShowTyping);
            self.typing_shown = true;
        }

        if patches
            .iter()
            .any(|p| matches!(p, Patch::Append(_) | Patch::ShowTyping))
        {
            patches.push(Patch::ScrollToBottom);
        }
        patches
    }
}
