//! `NSPasteboard` adapter.
//!
//! Talks to the general pasteboard through the Objective-C runtime so a snapshot holds
//! every pasteboard item with every type it was offered in, and the change token is the
//! pasteboard's real `changeCount`.

use std::ffi::{c_char, c_void, CStr, CString};

use objc::rc::autoreleasepool;
use objc::runtime::{Object, BOOL, NO};
use objc::{class, msg_send, sel, sel_impl};
use tracing::debug;

use crate::error::{Result, SelectionError};
use crate::ports::{ChangeToken, ClipboardClient, ClipboardItem, ClipboardSnapshot};

type Id = *mut Object;

// NSPasteboard and NSWorkspace live in AppKit.
#[link(name = "AppKit", kind = "framework")]
extern "C" {}

/// `NSPasteboardTypeString`.
const STRING_TYPE: &str = "public.utf8-plain-text";

#[derive(Debug, Default, Clone, Copy)]
pub struct PasteboardClipboard;

impl PasteboardClipboard {
    pub fn new() -> Self {
        Self
    }
}

fn general_pasteboard() -> Result<Id> {
    let pasteboard: Id = unsafe { msg_send![class!(NSPasteboard), generalPasteboard] };
    if pasteboard.is_null() {
        return Err(SelectionError::system(
            "Failed to access pasteboard",
            "generalPasteboard returned nil",
        ));
    }
    Ok(pasteboard)
}

fn ns_string(s: &str) -> Result<Id> {
    let c_string = CString::new(s)
        .map_err(|e| SelectionError::system("Invalid pasteboard string", e))?;
    let string: Id =
        unsafe { msg_send![class!(NSString), stringWithUTF8String: c_string.as_ptr()] };
    Ok(string)
}

/// Copies an `NSString` into Rust. `nil` becomes `None`.
unsafe fn rust_string(string: Id) -> Option<String> {
    if string.is_null() {
        return None;
    }
    let utf8: *const c_char = msg_send![string, UTF8String];
    if utf8.is_null() {
        return None;
    }
    Some(CStr::from_ptr(utf8).to_string_lossy().into_owned())
}

unsafe fn data_bytes(data: Id) -> Vec<u8> {
    if data.is_null() {
        return Vec::new();
    }
    let length: usize = msg_send![data, length];
    let bytes: *const u8 = msg_send![data, bytes];
    if bytes.is_null() || length == 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(bytes, length).to_vec()
}

unsafe fn array_items(array: Id) -> Vec<Id> {
    if array.is_null() {
        return Vec::new();
    }
    let count: usize = msg_send![array, count];
    (0..count)
        .map(|i| {
            let item: Id = msg_send![array, objectAtIndex: i];
            item
        })
        .collect()
}

impl ClipboardClient for PasteboardClipboard {
    fn change_token(&self) -> Result<ChangeToken> {
        let pasteboard = general_pasteboard()?;
        let count: isize = unsafe { msg_send![pasteboard, changeCount] };
        Ok(ChangeToken(count.max(0) as u64))
    }

    fn read_text(&self) -> Result<Option<String>> {
        autoreleasepool(|| {
            let pasteboard = general_pasteboard()?;
            let string_type = ns_string(STRING_TYPE)?;
            let text = unsafe {
                let string: Id = msg_send![pasteboard, stringForType: string_type];
                rust_string(string)
            };
            Ok(text)
        })
    }

    fn write_text(&self, text: &str) -> Result<()> {
        autoreleasepool(|| {
            let pasteboard = general_pasteboard()?;
            let string = ns_string(text)?;
            let string_type = ns_string(STRING_TYPE)?;
            let written: bool = unsafe {
                let _: isize = msg_send![pasteboard, clearContents];
                let ok: BOOL = msg_send![pasteboard, setString: string forType: string_type];
                ok != NO
            };
            if !written {
                return Err(SelectionError::system(
                    "Failed to write pasteboard text",
                    "setString:forType: returned NO",
                ));
            }
            debug!(len = text.len(), "Wrote text to pasteboard");
            Ok(())
        })
    }

    fn snapshot(&self) -> Result<ClipboardSnapshot> {
        autoreleasepool(|| {
            let pasteboard = general_pasteboard()?;
            let mut items = Vec::new();
            unsafe {
                let pasteboard_items: Id = msg_send![pasteboard, pasteboardItems];
                for pasteboard_item in array_items(pasteboard_items) {
                    let types: Id = msg_send![pasteboard_item, types];
                    let mut item = ClipboardItem::new();
                    for type_id in array_items(types) {
                        let Some(name) = rust_string(type_id) else {
                            continue;
                        };
                        let data: Id = msg_send![pasteboard_item, dataForType: type_id];
                        if data.is_null() {
                            continue;
                        }
                        item.insert(name, data_bytes(data));
                    }
                    items.push(item);
                }
            }
            Ok(ClipboardSnapshot { items })
        })
    }

    fn restore(&self, snapshot: &ClipboardSnapshot) -> Result<()> {
        autoreleasepool(|| {
            let pasteboard = general_pasteboard()?;
            unsafe {
                let _: isize = msg_send![pasteboard, clearContents];
            }
            if snapshot.is_empty() {
                debug!("Cleared pasteboard (original was empty)");
                return Ok(());
            }

            let mut objects: Vec<Id> = Vec::with_capacity(snapshot.items.len());
            for item in &snapshot.items {
                let pasteboard_item: Id = unsafe {
                    let allocated: Id = msg_send![class!(NSPasteboardItem), alloc];
                    let initialized: Id = msg_send![allocated, init];
                    msg_send![initialized, autorelease]
                };
                for (type_id, bytes) in &item.payloads {
                    let type_string = ns_string(type_id)?;
                    unsafe {
                        let data: Id = msg_send![class!(NSData),
                            dataWithBytes: bytes.as_ptr() as *const c_void
                            length: bytes.len()];
                        let _: BOOL =
                            msg_send![pasteboard_item, setData: data forType: type_string];
                    }
                }
                objects.push(pasteboard_item);
            }

            let written: bool = unsafe {
                let array: Id = msg_send![class!(NSArray),
                    arrayWithObjects: objects.as_ptr()
                    count: objects.len()];
                let ok: BOOL = msg_send![pasteboard, writeObjects: array];
                ok != NO
            };
            if !written {
                return Err(SelectionError::system(
                    "Failed to restore pasteboard",
                    "writeObjects: returned NO",
                ));
            }
            Ok(())
        })
    }
}
