use crossbeam::queue::SegQueue;
use std::sync::Arc;

use crate::audio::machine::EffectsEvent;
use crate::audio::oscillators::Waveform;
use crate::notes::NoteName;

#[derive(Debug, Clone, PartialEq)]
pub enum AudioCommand {
    NoteOn(NoteName),
    NoteOff(NoteName),
    StopAllNotes,
    SetVolume(f32),
    SetPitchShift(i32),
    SetWaveform(Waveform),
    Effects(EffectsEvent),
}

/// Lock-free command queue for UI -> audio communication
/// Uses a multiple-producer, single-consumer queue from crossbeam
pub struct AudioCommandQueue {
    queue: Arc<SegQueue<AudioCommand>>,
}

impl AudioCommandQueue {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(SegQueue::new()),
        }
    }

    /// Get a handle for sending commands (for UI thread)
    pub fn sender(&self) -> AudioCommandSender {
        AudioCommandSender {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Get a handle for receiving commands (for audio thread)
    pub fn receiver(&self) -> AudioCommandReceiver {
        AudioCommandReceiver {
            queue: Arc::clone(&self.queue),
        }
    }
}

#[derive(Clone)]
pub struct AudioCommandSender {
    queue: Arc<SegQueue<AudioCommand>>,
}

impl AudioCommandSender {
    /// Send a command to the audio thread (non-blocking)
    pub fn send(&self, command: AudioCommand) {
        self.queue.push(command);
    }
}

pub struct AudioCommandReceiver {
    queue: Arc<SegQueue<AudioCommand>>,
}

impl AudioCommandReceiver {
    /// Apply pending commands, at most `MAX_COMMANDS_PER_BLOCK` per call.
    /// Call at the start of each audio block.
    pub fn process_commands<F>(&self, mut apply_command: F)
    where
        F: FnMut(AudioCommand),
    {
        for _ in 0..MAX_COMMANDS_PER_BLOCK {
            match self.queue.pop() {
                Some(command) => apply_command(command),
                None => break,
            }
        }
    }

    pub fn has_commands(&self) -> bool {
        !self.queue.is_empty()
    }
}

pub const MAX_COMMANDS_PER_BLOCK: usize = 64;

impl Default for AudioCommandQueue {
    fn default() -> Self {
        Self::new()
    }
}
