//! Clipboard seam for the panel's "copy" action.
//! Uses arboard on desktop hosts; `MemoryClipboard` keeps the last write for headless runs.

use std::sync::{Mutex, PoisonError};

use arboard::Clipboard as SystemBoard;
use tracing::debug;

use crate::error::BridgeResult;

pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> BridgeResult<()>;
}

/// The operating system clipboard. A handle is opened per write.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn write_text(&self, text: &str) -> BridgeResult<()> {
        let mut clipboard = SystemBoard::new()?;
        clipboard.set_text(text)?;
        debug!(target: "coldiq::bridge", chars = text.chars().count(), "copied to system clipboard");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: &str) -> BridgeResult<()> {
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = Some(text.to_string());
        Ok(())
    }
}
