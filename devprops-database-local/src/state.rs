use anyhow::{bail, Result};
use serde_json::{de::IoRead, Deserializer, StreamDeserializer};
use std::{
    fs::{File, OpenOptions},
    io::{self, Seek as _, Write},
    path::Path,
    sync::Arc,
};

/// One persisted database mutation: a JSON Patch against the state document,
/// plus bookkeeping. Events are appended, never rewritten; the current
/// database contents are whatever the patches resolve to.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct StateEvent {
    pub index: u64,
    pub meta: StateEventMeta,
    pub patch: json_patch::Patch,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct StateEventMeta {
    pub time: String,
    /// Operation detail: which property on which device, and why.
    #[serde(flatten)]
    pub other_fields: serde_json::Value,
}

pub struct StateEventStream<'a, R: io::Read> {
    iter: StreamDeserializer<'a, IoRead<R>, StateEvent>,
    /// Save the validated first event for processing by our caller
    /// (basically prepend it to the iterator)
    first_event: Option<StateEvent>,
}
impl<'a, R: io::Read> StateEventStream<'a, R> {
    pub fn open_from_reader(reader: R) -> Result<StateEventStream<'a, R>> {
        let deserializer = Deserializer::from_reader(reader);
        let mut iter = deserializer.into_iter();
        let first_event = match iter.next() {
            Some(Ok(ev @ StateEvent { index, .. })) => {
                if index != 0 {
                    bail!("Expected initial state event with index 0, got {}", index);
                }
                ev
            }
            Some(Err(e)) => bail!(
                "State file invalid: error parsing initial state event: {}",
                e
            ),
            None => bail!("State file invalid: no initial state event"),
        };
        Ok(StateEventStream {
            iter,
            first_event: Some(first_event),
        })
    }
}

impl<'a, R: io::Read> Iterator for StateEventStream<'a, R> {
    type Item = Result<StateEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.first_event.is_some() {
            self.first_event.take().map(Ok)
        } else {
            self.iter.next().map(|r| r.map_err(Into::into))
        }
    }
}

pub struct StateHandle {
    file: Arc<File>,
    locking: fd_lock::RwLock<Arc<File>>,
    expected_size: Option<u64>,
}
impl StateHandle {
    pub fn open<P: AsRef<Path>>(name: P, create_new: bool) -> Result<StateHandle> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create_new(create_new)
            .open(name)?;
        let file = Arc::new(file);
        let locking = fd_lock::RwLock::new(file.clone());
        let mut handle = StateHandle {
            file,
            locking,
            expected_size: None,
        };
        if create_new {
            handle.append(&[&Self::init_event()])?;
        }
        Ok(handle)
    }

    fn init_event() -> StateEvent {
        let now = chrono::Utc::now();
        StateEvent {
            index: 0,
            meta: StateEventMeta {
                time: now.to_rfc3339(),
                other_fields: serde_json::json!({}),
            },
            patch: json_patch::Patch(vec![json_patch::PatchOperation::Add(
                json_patch::AddOperation {
                    path: "".parse().expect("empty path"),
                    value: serde_json::json!({
                        "_type": "devpropsState",
                        "devices": {},
                    }),
                },
            )]),
        }
    }

    pub fn append(&mut self, events: &[&StateEvent]) -> Result<()> {
        let lock_guard = self.locking.write()?;
        let pos = self.file.seek(io::SeekFrom::End(0))?;
        match self.expected_size {
            None => self.expected_size = Some(pos),
            Some(expected_size) => {
                if pos != expected_size {
                    eprintln!(
                        "Detected concurrent writing. Foreign bytes: [{}..{})",
                        expected_size, pos
                    );
                    eprintln!("CRITICAL: a concurrently mutated property database may require manual intervention; the replayed state no longer matches what this process believes it wrote");
                }
            }
        }
        let mut writer = io::BufWriter::new(self.file.clone());

        for event in events {
            // We prettify to make it more human readable. Potentially slightly
            // harder to parse by other tools, but worth the tradeoff.
            serde_json::to_writer_pretty(&mut writer, event)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        self.expected_size = Some(self.file.stream_position()?);

        drop(lock_guard);
        Ok(())
    }
}

pub fn apply_state_event(state: &mut serde_json::Value, event: &StateEvent) -> Result<()> {
    json_patch::patch(state, event.patch.0.as_slice()).map_err(Into::into)
}
