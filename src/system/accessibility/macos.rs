//! macOS accessibility through the AX API.

use std::ffi::{c_char, c_void, CStr};
use std::ptr;
use std::time::Duration;

use accessibility_sys::{
    kAXErrorAPIDisabled, kAXErrorAttributeUnsupported, kAXErrorCannotComplete, kAXErrorNoValue,
    kAXErrorParameterizedAttributeUnsupported, kAXErrorSuccess, kAXValueTypeCGRect, AXError,
    AXUIElementCopyAttributeValue, AXUIElementCopyParameterizedAttributeValue,
    AXUIElementCreateApplication, AXUIElementCreateSystemWide, AXUIElementPerformAction,
    AXUIElementRef, AXUIElementSetMessagingTimeout, AXValueGetValue, AXValueRef,
};
use core_foundation::array::{CFArray, CFArrayRef};
use core_foundation::base::{CFType, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::string::CFString;
use core_foundation_sys::array::CFArrayGetTypeID;
use core_foundation_sys::base::{CFGetTypeID, CFRelease, CFRetain, CFTypeRef};
use macos_accessibility_client::accessibility::{
    application_is_trusted, application_is_trusted_with_prompt,
};
use objc::runtime::Object;
use objc::{class, msg_send, sel, sel_impl};
use tracing::{debug, warn};

use crate::error::{Result, SelectionError};
use crate::ports::{AccessibilityClient, AppInfo, MenuItemInfo, SelectionBounds};

/// Upper bound for one AX round trip into a busy application.
const MESSAGING_TIMEOUT: Duration = Duration::from_secs(1);

/// Retained `AXUIElementRef`.
pub struct AxElement(AXUIElementRef);

// SAFETY: AX element references are immutable CF objects; the AX API may be called
// from any thread.
unsafe impl Send for AxElement {}
unsafe impl Sync for AxElement {}

impl AxElement {
    /// Takes ownership of a reference returned by a Create/Copy function.
    unsafe fn from_create(element: AXUIElementRef) -> Option<Self> {
        (!element.is_null()).then_some(Self(element))
    }

    /// Retains a reference borrowed from a container.
    unsafe fn from_get(element: AXUIElementRef) -> Option<Self> {
        if element.is_null() {
            return None;
        }
        CFRetain(element as CFTypeRef);
        Some(Self(element))
    }

    fn system_wide() -> Result<Self> {
        unsafe { Self::from_create(AXUIElementCreateSystemWide()) }.ok_or_else(|| {
            SelectionError::system("Failed to create system-wide AX element", "null element")
        })
    }
}

impl Clone for AxElement {
    fn clone(&self) -> Self {
        unsafe {
            CFRetain(self.0 as CFTypeRef);
        }
        Self(self.0)
    }
}

impl Drop for AxElement {
    fn drop(&mut self) {
        unsafe { CFRelease(self.0 as CFTypeRef) }
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct CGPoint {
    x: f64,
    y: f64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct CGSize {
    width: f64,
    height: f64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct CGRect {
    origin: CGPoint,
    size: CGSize,
}

fn check(code: AXError, name: &str, value: CFTypeRef) -> Result<Option<CFType>> {
    match code {
        kAXErrorSuccess if !value.is_null() => {
            Ok(Some(unsafe { CFType::wrap_under_create_rule(value) }))
        }
        kAXErrorSuccess
        | kAXErrorNoValue
        | kAXErrorAttributeUnsupported
        | kAXErrorParameterizedAttributeUnsupported => Ok(None),
        kAXErrorAPIDisabled => Err(SelectionError::PermissionDenied),
        kAXErrorCannotComplete => Err(SelectionError::timeout(
            format!("AX {name}"),
            MESSAGING_TIMEOUT,
        )),
        code => Err(SelectionError::system(
            format!("Failed to read {name}"),
            format!("AXError {code}"),
        )),
    }
}

fn attribute(element: &AxElement, name: &'static str) -> Result<Option<CFType>> {
    let attribute = CFString::from_static_string(name);
    let mut value: CFTypeRef = ptr::null();
    let code = unsafe {
        AXUIElementCopyAttributeValue(element.0, attribute.as_concrete_TypeRef(), &mut value)
    };
    check(code, name, value)
}

fn string_attribute(element: &AxElement, name: &'static str) -> Result<Option<String>> {
    Ok(attribute(element, name)?
        .and_then(|value| value.downcast::<CFString>())
        .map(|s| s.to_string()))
}

fn bool_attribute(element: &AxElement, name: &'static str) -> Result<Option<bool>> {
    Ok(attribute(element, name)?
        .and_then(|value| value.downcast::<CFBoolean>())
        .map(bool::from))
}

fn element_attribute(element: &AxElement, name: &'static str) -> Result<Option<AxElement>> {
    Ok(attribute(element, name)?
        .and_then(|value| unsafe { AxElement::from_get(value.as_CFTypeRef() as AXUIElementRef) }))
}

fn elements_attribute(element: &AxElement, name: &'static str) -> Result<Vec<AxElement>> {
    let Some(value) = attribute(element, name)? else {
        return Ok(Vec::new());
    };
    let raw = value.as_CFTypeRef();
    if unsafe { CFGetTypeID(raw) != CFArrayGetTypeID() } {
        return Ok(Vec::new());
    }
    let array: CFArray<*const c_void> = unsafe { CFArray::wrap_under_get_rule(raw as CFArrayRef) };
    Ok(array
        .get_all_values()
        .into_iter()
        .filter_map(|child| unsafe { AxElement::from_get(child as AXUIElementRef) })
        .collect())
}

unsafe fn ns_string_to_rust(string: *mut Object) -> Option<String> {
    if string.is_null() {
        return None;
    }
    let utf8: *const c_char = msg_send![string, UTF8String];
    if utf8.is_null() {
        return None;
    }
    Some(CStr::from_ptr(utf8).to_string_lossy().into_owned())
}

/// The AX API of the current user session.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacAccessibility;

impl MacAccessibility {
    fn frontmost_pid(&self) -> Option<i32> {
        unsafe {
            let workspace: *mut Object = msg_send![class!(NSWorkspace), sharedWorkspace];
            if workspace.is_null() {
                return None;
            }
            let app: *mut Object = msg_send![workspace, frontmostApplication];
            if app.is_null() {
                return None;
            }
            let pid: i32 = msg_send![app, processIdentifier];
            Some(pid)
        }
    }

    fn application(&self, pid: i32) -> Result<AxElement> {
        let app = unsafe { AxElement::from_create(AXUIElementCreateApplication(pid)) }
            .ok_or_else(|| {
                SelectionError::system("Failed to create AX application", "null element")
            })?;
        let code = unsafe {
            AXUIElementSetMessagingTimeout(app.0, MESSAGING_TIMEOUT.as_secs_f32())
        };
        if code != kAXErrorSuccess {
            debug!(code, "Failed to set AX messaging timeout");
        }
        Ok(app)
    }
}

impl AccessibilityClient for MacAccessibility {
    type Element = AxElement;

    fn is_trusted(&self, prompt: bool) -> bool {
        let trusted = if prompt {
            application_is_trusted_with_prompt()
        } else {
            application_is_trusted()
        };
        if !trusted {
            warn!(
                "Accessibility permissions not granted - enable in System Settings > Privacy & Security > Accessibility"
            );
        }
        trusted
    }

    fn focused_element(&self) -> Result<Option<AxElement>> {
        let system = AxElement::system_wide()?;
        element_attribute(&system, "AXFocusedUIElement")
    }

    fn selected_text(&self, element: &AxElement) -> Result<Option<String>> {
        string_attribute(element, "AXSelectedText")
    }

    fn selection_bounds(&self, element: &AxElement) -> Result<Option<SelectionBounds>> {
        let Some(range) = attribute(element, "AXSelectedTextRange")? else {
            return Ok(None);
        };
        let parameter = CFString::from_static_string("AXBoundsForRange");
        let mut value: CFTypeRef = ptr::null();
        let code = unsafe {
            AXUIElementCopyParameterizedAttributeValue(
                element.0,
                parameter.as_concrete_TypeRef(),
                range.as_CFTypeRef(),
                &mut value,
            )
        };
        let Some(bounds) = check(code, "AXBoundsForRange", value)? else {
            return Ok(None);
        };

        let mut rect = CGRect::default();
        let ok = unsafe {
            AXValueGetValue(
                bounds.as_CFTypeRef() as AXValueRef,
                kAXValueTypeCGRect,
                &mut rect as *mut CGRect as *mut c_void,
            )
        };
        if !ok {
            return Ok(None);
        }
        Ok(Some(SelectionBounds {
            x: rect.origin.x,
            y: rect.origin.y,
            width: rect.size.width,
            height: rect.size.height,
        }))
    }

    fn frontmost_app(&self) -> Result<Option<AppInfo>> {
        unsafe {
            let workspace: *mut Object = msg_send![class!(NSWorkspace), sharedWorkspace];
            if workspace.is_null() {
                return Ok(None);
            }
            let app: *mut Object = msg_send![workspace, frontmostApplication];
            if app.is_null() {
                return Ok(None);
            }
            let name: *mut Object = msg_send![app, localizedName];
            let bundle_id: *mut Object = msg_send![app, bundleIdentifier];
            let pid: i32 = msg_send![app, processIdentifier];
            Ok(Some(AppInfo {
                name: ns_string_to_rust(name).unwrap_or_default(),
                bundle_id: ns_string_to_rust(bundle_id),
                pid: Some(pid),
            }))
        }
    }

    fn menu_bar(&self) -> Result<Option<AxElement>> {
        let Some(pid) = self.frontmost_pid() else {
            return Ok(None);
        };
        let app = self.application(pid)?;
        element_attribute(&app, "AXMenuBar")
    }

    fn children(&self, element: &AxElement) -> Result<Vec<AxElement>> {
        elements_attribute(element, "AXChildren")
    }

    fn menu_item_info(&self, element: &AxElement) -> Result<MenuItemInfo> {
        Ok(MenuItemInfo {
            identifier: string_attribute(element, "AXIdentifier")?,
            title: string_attribute(element, "AXTitle")?,
            shortcut_char: string_attribute(element, "AXMenuItemCmdChar")?,
            enabled: bool_attribute(element, "AXEnabled")?.unwrap_or(false),
        })
    }

    fn press(&self, element: &AxElement) -> Result<()> {
        let action = CFString::from_static_string("AXPress");
        let code = unsafe { AXUIElementPerformAction(element.0, action.as_concrete_TypeRef()) };
        check(code, "AXPress", ptr::null())?;
        debug!("Pressed menu item");
        Ok(())
    }
}
