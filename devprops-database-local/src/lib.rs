//! File-backed property database.
//!
//! Persistence follows the append-only event log pattern: the file is a
//! sequence of pretty-printed JSON events, each carrying an RFC 6902 JSON
//! Patch against the state document
//!
//! ```json
//! { "_type": "devpropsState", "devices": { "<device path text>": { "<name>": "<base64>" } } }
//! ```
//!
//! Opening the database replays the log; every mutation appends one event
//! and advances the in-memory document. Device keys are the canonical
//! rendering of the parsed path, so respelled-but-equal paths share a slot.

pub mod state;

use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use devprops_core::device_path::DevicePath;
use devprops_core::ucs2::Ucs2String;
use devprops_database::{DatabaseError, Presence, PropertyDatabase, Removal};
use serde_json::Value;

use state::{StateEvent, StateEventMeta, StateEventStream, StateHandle};

pub struct FileDatabase {
    handle: StateHandle,
    /// The resolved state document; kept in step with the log.
    doc: Value,
    next_index: u64,
}

impl FileDatabase {
    /// Open a database state file, replaying its event log. With `create`,
    /// a missing file is initialized to an empty database; without it, a
    /// missing file is an error (no mutations will be attempted).
    pub fn open<P: AsRef<Path>>(path: P, create: bool) -> Result<FileDatabase> {
        let path = path.as_ref();
        let create_new = !path.exists();
        if create_new && !create {
            bail!(
                "property database state file {} does not exist",
                path.display()
            );
        }
        let handle = StateHandle::open(path, create_new)
            .with_context(|| format!("opening property database state file {}", path.display()))?;

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading property database state file {}", path.display()))?;
        let stream = StateEventStream::open_from_reader(contents.as_bytes())?;
        let mut doc = serde_json::json!({});
        let mut next_index = 0;
        for event in stream {
            let event = event?;
            state::apply_state_event(&mut doc, &event)
                .with_context(|| format!("replaying state event {}", event.index))?;
            next_index += 1;
        }
        if !doc.get("devices").is_some_and(Value::is_object) {
            bail!(
                "state file {} does not resolve to a device property document",
                path.display()
            );
        }

        Ok(FileDatabase {
            handle,
            doc,
            next_index,
        })
    }

    /// The resolved state document, for dumps and inspection.
    pub fn state(&self) -> &Value {
        &self.doc
    }

    fn lookup(&self, path: &DevicePath, name: &Ucs2String) -> Option<&str> {
        self.doc
            .get("devices")?
            .get(path.to_string())?
            .get(name.to_string())?
            .as_str()
    }

    fn device_is_known(&self, device_key: &str) -> bool {
        self.doc
            .get("devices")
            .and_then(|d| d.get(device_key))
            .is_some()
    }

    /// Append one event and advance the document. The patch is applied to a
    /// scratch copy first, so a rejected patch leaves both the file and the
    /// in-memory state untouched.
    fn record(
        &mut self,
        op: &str,
        device_key: &str,
        property: &str,
        patch: json_patch::Patch,
    ) -> Result<()> {
        let mut next = self.doc.clone();
        json_patch::patch(&mut next, patch.0.as_slice())
            .with_context(|| format!("applying {} patch for {}:{}", op, device_key, property))?;
        let event = StateEvent {
            index: self.next_index,
            meta: StateEventMeta {
                time: chrono::Utc::now().to_rfc3339(),
                other_fields: serde_json::json!({
                    "op": op,
                    "device": device_key,
                    "property": property,
                }),
            },
            patch,
        };
        self.handle.append(&[&event])?;
        self.doc = next;
        self.next_index += 1;
        Ok(())
    }
}

/// RFC 6901 token escaping; device path text always contains `/`.
fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

impl PropertyDatabase for FileDatabase {
    fn remove(&mut self, path: &DevicePath, name: &Ucs2String) -> Result<Removal, DatabaseError> {
        if self.lookup(path, name).is_none() {
            // benign: nothing to do, and nothing worth logging to the file
            return Ok(Removal::Missing);
        }
        let device_key = path.to_string();
        let name_text = name.to_string();
        let pointer = format!(
            "/devices/{}/{}",
            escape_token(&device_key),
            escape_token(&name_text)
        );
        let patch = json_patch::Patch(vec![json_patch::PatchOperation::Remove(
            json_patch::RemoveOperation {
                path: pointer
                    .parse()
                    .map_err(|e| DatabaseError(anyhow::anyhow!("state pointer: {}", e)))?,
            },
        )]);
        self.record("remove", &device_key, &name_text, patch)?;
        Ok(Removal::Removed)
    }

    fn get(
        &self,
        path: &DevicePath,
        name: &Ucs2String,
    ) -> Result<Option<Vec<u8>>, DatabaseError> {
        match self.lookup(path, name) {
            None => Ok(None),
            Some(encoded) => {
                let bytes = BASE64
                    .decode(encoded)
                    .map_err(|e| DatabaseError(anyhow::anyhow!("corrupt property value: {}", e)))?;
                Ok(Some(bytes))
            }
        }
    }

    fn set(
        &mut self,
        path: &DevicePath,
        name: &Ucs2String,
        value: &[u8],
    ) -> Result<(), DatabaseError> {
        let device_key = path.to_string();
        let name_text = name.to_string();
        let device_pointer = format!("/devices/{}", escape_token(&device_key));
        let property_pointer = format!("{}/{}", device_pointer, escape_token(&name_text));

        let mut ops = Vec::new();
        if !self.device_is_known(&device_key) {
            ops.push(json_patch::PatchOperation::Add(json_patch::AddOperation {
                path: device_pointer
                    .parse()
                    .map_err(|e| DatabaseError(anyhow::anyhow!("state pointer: {}", e)))?,
                value: serde_json::json!({}),
            }));
        }
        ops.push(json_patch::PatchOperation::Add(json_patch::AddOperation {
            path: property_pointer
                .parse()
                .map_err(|e| DatabaseError(anyhow::anyhow!("state pointer: {}", e)))?,
            value: Value::String(BASE64.encode(value)),
        }));

        self.record("set", &device_key, &name_text, json_patch::Patch(ops))?;
        Ok(())
    }

    fn probe(&self, path: &DevicePath, name: &Ucs2String) -> Result<Presence, DatabaseError> {
        // cheaper than get: presence needs no base64 decode
        Ok(match self.lookup(path, name) {
            None => Presence::Absent,
            Some("") => Presence::Empty,
            Some(_) => Presence::NonEmpty,
        })
    }
}
