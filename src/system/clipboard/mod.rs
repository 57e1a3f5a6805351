//! System clipboard adapters.
//!
//! - macOS: `NSPasteboard` directly, so snapshots keep every item and type and the
//!   change token is the pasteboard's own `changeCount`.
//! - Windows: `arboard`, with the clipboard sequence number as the change token.
//! - Linux and others: `arboard`, with a generation counter bumped whenever the
//!   content fingerprint changes.
//!
//! Through `arboard` only plain text and one RGBA image survive a snapshot, and on Linux
//! a copy that writes the content already on the clipboard leaves the token unchanged,
//! so the capture reports no change.

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

use std::borrow::Cow;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};

use arboard::{Clipboard, ImageData};
use tracing::{debug, warn};

use crate::error::{Result, SelectionError};
use crate::ports::{ChangeToken, ClipboardClient, ClipboardItem, ClipboardSnapshot};

#[cfg(target_os = "macos")]
pub use macos::PasteboardClipboard;

pub const TEXT_TYPE: &str = "text/plain;charset=utf-8";
const IMAGE_TYPE_PREFIX: &str = "image/rgba";

/// The platform's clipboard adapter.
pub fn system_clipboard() -> Result<Arc<dyn ClipboardClient>> {
    #[cfg(target_os = "macos")]
    {
        Ok(Arc::new(PasteboardClipboard::new()))
    }

    #[cfg(not(target_os = "macos"))]
    {
        Ok(Arc::new(ArboardClipboard::new()?))
    }
}

fn image_type(width: usize, height: usize) -> String {
    format!("{IMAGE_TYPE_PREFIX};width={width};height={height}")
}

/// Inverse of [`image_type`].
fn parse_image_type(type_id: &str) -> Option<(usize, usize)> {
    let params = type_id.strip_prefix(IMAGE_TYPE_PREFIX)?;
    let mut width = None;
    let mut height = None;
    for param in params.split(';').filter(|p| !p.is_empty()) {
        match param.split_once('=')? {
            ("width", v) => width = v.parse().ok(),
            ("height", v) => height = v.parse().ok(),
            _ => {}
        }
    }
    Some((width?, height?))
}

#[derive(Debug, Default)]
struct Generation {
    fingerprint: u64,
    counter: u64,
}

impl Generation {
    /// Advances the counter when `fingerprint` differs from the last one seen.
    fn observe(&mut self, fingerprint: u64) -> ChangeToken {
        if fingerprint != self.fingerprint {
            self.fingerprint = fingerprint;
            self.counter += 1;
        }
        ChangeToken(self.counter)
    }

    /// Records a write made by this process.
    fn bump(&mut self, fingerprint: u64) {
        self.fingerprint = fingerprint;
        self.counter += 1;
    }
}

/// `arboard`-backed clipboard. Holds one `Clipboard` for the process lifetime so content
/// written on X11/Wayland stays served.
pub struct ArboardClipboard {
    clipboard: Mutex<Clipboard>,
    generation: Mutex<Generation>,
}

impl ArboardClipboard {
    pub fn new() -> Result<Self> {
        let mut clipboard = Clipboard::new()
            .map_err(|e| SelectionError::system("Failed to initialize clipboard", e))?;
        let fingerprint = fingerprint(&mut clipboard);
        Ok(Self {
            clipboard: Mutex::new(clipboard),
            generation: Mutex::new(Generation {
                fingerprint,
                counter: 0,
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Clipboard>> {
        self.clipboard.lock().map_err(|_| {
            SelectionError::system("Clipboard lock poisoned", "a previous holder panicked")
        })
    }

    fn generation(&self) -> MutexGuard<'_, Generation> {
        self.generation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn hash_of(value: impl Hash) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Hash of the current text, or of the image when there is no text.
fn fingerprint(clipboard: &mut Clipboard) -> u64 {
    if let Ok(text) = clipboard.get_text() {
        return hash_of(("text", text));
    }
    match clipboard.get_image() {
        Ok(image) => hash_of(("image", image.width, image.height, image.bytes.as_ref())),
        Err(_) => hash_of("empty"),
    }
}

impl ClipboardClient for ArboardClipboard {
    fn change_token(&self) -> Result<ChangeToken> {
        #[cfg(target_os = "windows")]
        if let Some(seq) = windows::sequence_number() {
            return Ok(ChangeToken(seq));
        }

        let fingerprint = fingerprint(&mut *self.lock()?);
        Ok(self.generation().observe(fingerprint))
    }

    fn read_text(&self) -> Result<Option<String>> {
        match self.lock()?.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(SelectionError::system("Failed to read clipboard text", e)),
        }
    }

    fn write_text(&self, text: &str) -> Result<()> {
        let mut clipboard = self.lock()?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| SelectionError::system("Failed to write clipboard text", e))?;
        self.generation()
            .bump(hash_of(("text", text.to_string())));
        debug!(len = text.len(), "Wrote text to clipboard");
        Ok(())
    }

    fn snapshot(&self) -> Result<ClipboardSnapshot> {
        let mut clipboard = self.lock()?;
        let mut item = ClipboardItem::new();
        if let Ok(text) = clipboard.get_text() {
            item.insert(TEXT_TYPE, text.into_bytes());
        }
        if let Ok(image) = clipboard.get_image() {
            item.insert(image_type(image.width, image.height), image.bytes.into_owned());
        }
        let items = if item.payloads.is_empty() {
            Vec::new()
        } else {
            vec![item]
        };
        Ok(ClipboardSnapshot { items })
    }

    fn restore(&self, snapshot: &ClipboardSnapshot) -> Result<()> {
        let mut clipboard = self.lock()?;
        let item = snapshot.items.first();

        let text = item.and_then(|item| item.get(TEXT_TYPE));
        let image = item.and_then(|item| {
            item.payloads
                .iter()
                .find_map(|(t, bytes)| parse_image_type(t).map(|dims| (dims, bytes)))
        });
        if snapshot.items.len() > 1 {
            warn!(items = snapshot.items.len(), "Only the first clipboard item can be restored");
        }

        let fingerprint = match (text, image) {
            (Some(text), _) => {
                let text = String::from_utf8_lossy(text).into_owned();
                let fingerprint = hash_of(("text", text.clone()));
                clipboard
                    .set_text(text)
                    .map_err(|e| SelectionError::system("Failed to restore clipboard text", e))?;
                fingerprint
            }
            (None, Some(((width, height), bytes))) => {
                clipboard
                    .set_image(ImageData {
                        width,
                        height,
                        bytes: Cow::Borrowed(bytes.as_slice()),
                    })
                    .map_err(|e| SelectionError::system("Failed to restore clipboard image", e))?;
                hash_of(("image", width, height, bytes.as_slice()))
            }
            (None, None) => {
                clipboard
                    .clear()
                    .map_err(|e| SelectionError::system("Failed to clear clipboard", e))?;
                debug!("Cleared clipboard (original was empty)");
                hash_of("empty")
            }
        };
        self.generation().bump(fingerprint);
        Ok(())
    }
}
