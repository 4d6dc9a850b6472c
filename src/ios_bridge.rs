// ShelfReader - Library E-Reader Core for Mobile
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! C FFI bridge for iOS - Exposes the Rust core to the Swift app
//!
//! # Architecture
//! Swift (ShelfCoreBridge) → C FFI → Rust
//!
//! # Design Patterns
//! 1. **JSON Communication**: All complex data is serialized to JSON for FFI crossing
//! 2. **Error Handling**: All errors are caught and returned as JSON error responses
//! 3. **Async Runtime**: Tokio runtime is used to execute async Rust functions
//! 4. **No Panics**: All panics are caught to prevent crashes across FFI boundary
//! 5. **Memory Safety**: All returned strings must be freed by caller using `rust_free_string()`
//!
//! # Response Format
//! All functions return JSON strings with this structure:
//! ```json
//! { "success": true, "data": { ... } }
//! ```
//! Or on error:
//! ```json
//! {
//!   "success": false,
//!   "error": "Account not found: 2391000123",
//!   "message": "This library account is no longer available on this device. Please sign in again.",
//!   "retryable": false,
//!   "sign_in_required": true
//! }
//! ```
//! `message` is safe to show to the user; `error` is for logs.
//!
//! # Age prompt round trip
//! 1. Swift registers a handler with `rust_register_age_prompt_handler()`
//! 2. `rust_verify_age_requirement()` may cause the handler to be called with
//!    a prompt id. Ids are unique for the life of the process, across gate
//!    re-initialization. The handler runs on a Rust worker thread; it must hop to
//!    the main queue before presenting anything.
//! 3. Once the user taps an answer, Swift calls `rust_complete_age_prompt()`
//!    with that id. Every queued verify callback then fires.
//!
//! # Memory Management
//! **CRITICAL**: All string pointers returned from Rust functions MUST be freed
//! by the caller using `rust_free_string()`. Failure to do so will cause memory leaks.

use crate::age_gate::{AgeGate, AgePrompt, CallbackPresenter, PromptResponder};
use crate::config::AgeGateConfig;
use crate::reader::ReaderFormat;
use crate::storage::{accounts, Database, NewAccount, SqliteAccountStore};
use crate::{Result, ShelfError};
use serde::Serialize;
use std::collections::HashMap;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::panic;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Called when the age prompt should be shown
pub type AgePromptHandler = extern "C" fn(context: *mut c_void, prompt_id: u64, minimum_age: u8);

/// Receives the answer of one `rust_verify_age_requirement()` call
pub type AgeVerifiedCallback = extern "C" fn(context: *mut c_void, permitted: bool);

/// Opaque pointer owned by the Swift side
#[derive(Clone, Copy)]
struct ForeignContext(*mut c_void);

// The Swift side guarantees the context outlives the callback and is safe to
// use from any thread.
unsafe impl Send for ForeignContext {}
unsafe impl Sync for ForeignContext {}

struct BridgeState {
    gate: AgeGate,
    db: Database,
}

// Lazy static tokio runtime for async operations
lazy_static::lazy_static! {
    static ref RUNTIME: tokio::runtime::Runtime =
        tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    static ref BRIDGE: Mutex<Option<BridgeState>> = Mutex::new(None);
    static ref PROMPT_HANDLER: Mutex<Option<(AgePromptHandler, ForeignContext)>> = Mutex::new(None);
    static ref RESPONDERS: Mutex<HashMap<u64, PromptResponder>> = Mutex::new(HashMap::new());
}

/// Prompt ids handed to Swift; the gate's own ids restart with each gate
static NEXT_PROMPT_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding one of these locks leaves plain data behind,
    // still safe to reuse.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Safely convert C string pointer to Rust String
///
/// # Safety
/// Caller must ensure ptr is a valid null-terminated C string
fn c_str_to_string(ptr: *const c_char) -> Result<String> {
    c_str_to_option(ptr)?.ok_or_else(|| ShelfError::invalid_input("Null pointer received"))
}

/// Like `c_str_to_string`, but null means `None`
fn c_str_to_option(ptr: *const c_char) -> Result<Option<String>> {
    if ptr.is_null() {
        return Ok(None);
    }
    unsafe {
        CStr::from_ptr(ptr)
            .to_str()
            .map(|s| Some(s.to_string()))
            .map_err(|e| ShelfError::InvalidInput(format!("Invalid UTF-8: {}", e)))
    }
}

/// Convert Rust string to C string pointer
///
/// # Safety
/// Caller MUST free the returned pointer using `rust_free_string()`
fn string_to_c_str(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(c_string) => c_string.into_raw(),
        Err(_) => {
            let error_json = error_response("String contains null bytes");
            CString::new(error_json).unwrap_or_default().into_raw()
        }
    }
}

/// Create success response JSON
fn success_response<T: Serialize>(data: T) -> String {
    serde_json::json!({
        "success": true,
        "data": data
    })
    .to_string()
}

/// Create error response JSON
fn error_response(error: &str) -> String {
    serde_json::json!({
        "success": false,
        "error": error,
        "message": error,
        "retryable": false,
        "sign_in_required": false
    })
    .to_string()
}

/// Error response JSON with the classification Swift acts on
fn shelf_error_response(error: &ShelfError) -> String {
    serde_json::json!({
        "success": false,
        "error": error.to_string(),
        "message": error.user_message(),
        "retryable": error.is_retryable(),
        "sign_in_required": error.is_account_error()
    })
    .to_string()
}

/// Wrap a function call with panic catching
fn catch_panic<F>(f: F) -> String
where
    F: FnOnce() -> Result<String> + panic::UnwindSafe,
{
    match panic::catch_unwind(f) {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => shelf_error_response(&e),
        Err(panic_err) => {
            let panic_msg = if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else {
                "Unknown panic occurred".to_string()
            };
            error_response(&format!("Rust panic: {}", panic_msg))
        }
    }
}

fn with_bridge<T, F>(f: F) -> Result<T>
where
    F: FnOnce(&BridgeState) -> Result<T>,
{
    let bridge = lock(&BRIDGE);
    let state = bridge.as_ref().ok_or_else(|| {
        ShelfError::GateNotInitialized("Call rust_init_age_gate() first.".to_string())
    })?;
    f(state)
}

/// Presenter body: park the responder, then hand the prompt to Swift
fn present_to_platform(prompt: AgePrompt, responder: PromptResponder) {
    let handler = *lock(&PROMPT_HANDLER);
    let Some((handler, context)) = handler else {
        responder.fail("no age prompt handler registered");
        return;
    };

    let prompt_id = NEXT_PROMPT_ID.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(prompt_id, gate_prompt_id = prompt.prompt_id, "handing age prompt to platform");
    lock(&RESPONDERS).insert(prompt_id, responder);
    // Lock released above: the handler may answer synchronously.
    handler(context.0, prompt_id, prompt.minimum_age);
}

// ============================================================================
// AGE GATE FUNCTIONS
// ============================================================================

/// Open the account database and start the process-wide age gate
///
/// Calling it again replaces the gate; callers queued on the old one are
/// still answered.
///
/// # Returns
/// ```json
/// { "success": true, "data": { "initialized": true, "minimum_age": 13 } }
/// ```
///
/// # Safety
/// Caller must free the returned string with `rust_free_string()`
#[no_mangle]
pub extern "C" fn rust_init_age_gate(db_path: *const c_char, minimum_age: u8) -> *mut c_char {
    let response = catch_panic(|| {
        let db_path = c_str_to_string(db_path)?;
        if minimum_age == 0 {
            return Err(ShelfError::invalid_input("minimum_age must be greater than zero"));
        }

        let db = RUNTIME.block_on(Database::new(&db_path))?;
        let store = Arc::new(SqliteAccountStore::new(db.clone()));
        let presenter = Arc::new(CallbackPresenter::new(present_to_platform));

        let gate = {
            let _guard = RUNTIME.enter();
            AgeGate::new(store, presenter, AgeGateConfig { minimum_age })
        };
        *lock(&BRIDGE) = Some(BridgeState { gate, db });

        tracing::info!(minimum_age, "age gate initialized");
        Ok(success_response(serde_json::json!({
            "initialized": true,
            "minimum_age": minimum_age,
        })))
    });

    string_to_c_str(response)
}

/// Register the function that shows the age prompt
///
/// Passing a null `handler` is not possible from Swift; to stop presenting,
/// register a handler that immediately completes with a failure.
#[no_mangle]
pub extern "C" fn rust_register_age_prompt_handler(
    handler: AgePromptHandler,
    context: *mut c_void,
) {
    *lock(&PROMPT_HANDLER) = Some((handler, ForeignContext(context)));
}

/// Ask whether the signed-in user may see age-restricted content
///
/// `callback` is called exactly once with the answer, possibly much later
/// and on a Rust worker thread. If the gate is not initialized it is called
/// immediately with `false` and an error is returned as well.
///
/// # Safety
/// Caller must free the returned string with `rust_free_string()`
#[no_mangle]
pub extern "C" fn rust_verify_age_requirement(
    callback: AgeVerifiedCallback,
    context: *mut c_void,
) -> *mut c_char {
    let context = ForeignContext(context);
    let response = catch_panic(move || {
        let gate = with_bridge(|state| Ok(state.gate.clone()));
        match gate {
            Ok(gate) => {
                gate.verify_age_requirement(move |permitted| {
                    let context = context;
                    callback(context.0, permitted)
                });
                Ok(success_response(serde_json::json!({ "accepted": true })))
            }
            Err(e) => {
                callback(context.0, false);
                Err(e)
            }
        }
    });

    string_to_c_str(response)
}

/// Deliver the platform's answer to a prompt
///
/// `outcome`: 1 = at or above the age threshold, 0 = below, anything else =
/// the prompt could not be shown (the user will be asked again later).
///
/// # Safety
/// Caller must free the returned string with `rust_free_string()`
#[no_mangle]
pub extern "C" fn rust_complete_age_prompt(prompt_id: u64, outcome: i32) -> *mut c_char {
    let response = catch_panic(|| {
        let responder = lock(&RESPONDERS)
            .remove(&prompt_id)
            .ok_or(ShelfError::UnknownPrompt(prompt_id))?;

        match outcome {
            1 => responder.answer(true),
            0 => responder.answer(false),
            _ => responder.fail(format!("platform reported outcome {}", outcome)),
        }

        Ok(success_response(serde_json::json!({ "prompt_id": prompt_id })))
    });

    string_to_c_str(response)
}

/// Current gate status
///
/// # Returns
/// ```json
/// { "success": true, "data": { "presenting": true, "pending": 2 } }
/// ```
///
/// # Safety
/// Caller must free the returned string with `rust_free_string()`
#[no_mangle]
pub extern "C" fn rust_age_gate_status() -> *mut c_char {
    let response = catch_panic(|| {
        let gate = with_bridge(|state| Ok(state.gate.clone()))?;
        let status = RUNTIME.block_on(gate.status())?;
        Ok(success_response(status))
    });

    string_to_c_str(response)
}

// ============================================================================
// ACCOUNT FUNCTIONS
// ============================================================================

/// Add or update a library account
///
/// # Arguments
/// * `account_json` - `{"account_id": "...", "display_name": "...", "requires_age_gate": true}`
///
/// # Safety
/// Caller must free the returned string with `rust_free_string()`
#[no_mangle]
pub extern "C" fn rust_save_account(account_json: *const c_char) -> *mut c_char {
    let response = catch_panic(|| {
        let account_json = c_str_to_string(account_json)?;
        let account: NewAccount = serde_json::from_str(&account_json)
            .map_err(|e| ShelfError::InvalidInput(format!("Invalid account JSON: {}", e)))?;

        let db = with_bridge(|state| Ok(state.db.clone()))?;
        let saved = RUNTIME.block_on(async {
            accounts::save_account(db.pool(), &account).await?;
            accounts::get_account(db.pool(), &account.account_id)
                .await?
                .ok_or_else(|| ShelfError::account_not_found(&account.account_id))
        })?;

        Ok(success_response(saved))
    });

    string_to_c_str(response)
}

/// Switch the signed-in account; null signs out
///
/// Switching keeps every account's age answer. Signing out clears the answer
/// of the account being left, so a user who declined can be asked again.
///
/// # Safety
/// Caller must free the returned string with `rust_free_string()`
#[no_mangle]
pub extern "C" fn rust_set_current_account(account_id: *const c_char) -> *mut c_char {
    let response = catch_panic(|| {
        let account_id = c_str_to_option(account_id)?;
        let db = with_bridge(|state| Ok(state.db.clone()))?;

        match account_id.as_deref() {
            Some(id) => RUNTIME.block_on(accounts::set_current_account(db.pool(), Some(id)))?,
            None => {
                let left = RUNTIME.block_on(accounts::sign_out(db.pool()))?;
                tracing::info!(account_id = %left, "signed out");
            }
        }

        Ok(success_response(serde_json::json!({ "current_account_id": account_id })))
    });

    string_to_c_str(response)
}

// ============================================================================
// READER FUNCTIONS
// ============================================================================

/// Pick the reading module for a media type
///
/// # Returns
/// ```json
/// { "success": true, "data": { "format": "epub", "drm_capable": true } }
/// ```
///
/// # Safety
/// Caller must free the returned string with `rust_free_string()`
#[no_mangle]
pub extern "C" fn rust_select_reader_format(media_type: *const c_char) -> *mut c_char {
    let response = catch_panic(|| {
        let media_type = c_str_to_string(media_type)?;
        let format = ReaderFormat::from_media_type(&media_type)
            .ok_or(ShelfError::UnsupportedFormat(media_type))?;

        Ok(success_response(serde_json::json!({
            "format": format,
            "media_type": format.media_type(),
            "drm_capable": format.is_drm_capable(),
        })))
    });

    string_to_c_str(response)
}

// ============================================================================
// MEMORY MANAGEMENT
// ============================================================================

/// Free a string returned by any other function in this module
///
/// # Safety
/// This function MUST be called exactly once for each string returned by
/// any other Rust function. Calling it multiple times on the same pointer
/// will cause a double-free error. Not calling it at all will cause a memory leak.
#[no_mangle]
pub extern "C" fn rust_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            // Take ownership and drop the CString
            let _ = CString::from_raw(ptr);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
