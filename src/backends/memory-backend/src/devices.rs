use encore_core::{BackendError, BackendResult, CoreEvent, EventBus, Mixer, Output, Outputs};
use std::sync::{Arc, Mutex};

/// Software volume. Starts at `initial`, or reports no mixer when `None`.
pub struct SoftMixer {
    volume: Mutex<Option<u8>>,
    events: Arc<EventBus>,
}

impl SoftMixer {
    pub fn new(initial: Option<u8>, events: Arc<EventBus>) -> Self {
        Self {
            volume: Mutex::new(initial.map(|v| v.min(100))),
            events,
        }
    }
}

impl Mixer for SoftMixer {
    fn volume(&self) -> Option<u8> {
        *self.volume.lock().expect("mixer poisoned")
    }

    fn set_volume(&self, volume: u8) -> BackendResult<()> {
        let volume = volume.min(100);
        {
            let mut current = self.volume.lock().expect("mixer poisoned");
            match *current {
                None => {
                    return Err(BackendError::NotSupported {
                        operation: "set volume".into(),
                    })
                }
                Some(old) if old == volume => return Ok(()),
                Some(_) => *current = Some(volume),
            }
        }
        self.events.emit(CoreEvent::VolumeChanged { volume });
        Ok(())
    }
}

/// Fixed set of named outputs that can be toggled.
pub struct OutputBank {
    outputs: Mutex<Vec<Output>>,
    events: Arc<EventBus>,
}

impl OutputBank {
    pub fn new(names: &[String], events: Arc<EventBus>) -> Self {
        let outputs = names
            .iter()
            .enumerate()
            .map(|(id, name)| Output {
                id: id as u32,
                name: name.clone(),
                enabled: true,
            })
            .collect();
        Self {
            outputs: Mutex::new(outputs),
            events,
        }
    }
}

impl Outputs for OutputBank {
    fn list(&self) -> Vec<Output> {
        self.outputs.lock().expect("outputs poisoned").clone()
    }

    fn set_enabled(&self, id: u32, enabled: bool) -> BackendResult<()> {
        {
            let mut outputs = self.outputs.lock().expect("outputs poisoned");
            let output = outputs
                .iter_mut()
                .find(|o| o.id == id)
                .ok_or_else(|| BackendError::not_found(format!("output {id}")))?;
            if output.enabled == enabled {
                return Ok(());
            }
            output.enabled = enabled;
        }
        self.events.emit(CoreEvent::OutputChanged { id });
        Ok(())
    }
}
