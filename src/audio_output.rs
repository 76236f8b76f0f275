use anyhow::{anyhow, Context, Result};
use cpal::{traits::*, Sample};
use crossbeam::channel::{bounded, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{error, info};

use crate::audio::synth::Synth;
use crate::commands::AudioCommandReceiver;

pub struct AudioOutput {
    _stream: cpal::Stream,
}

impl AudioOutput {
    pub fn new(synth: Arc<Mutex<Synth>>, commands: AudioCommandReceiver) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No output device available")?;

        let config = device
            .default_output_config()
            .context("Failed to read default output config")?;

        let sample_rate = config.sample_rate().0 as f32;
        if let Ok(mut synth) = synth.lock() {
            if synth.sample_rate() != sample_rate {
                synth.set_sample_rate(sample_rate);
            }
        }
        info!(
            "Opening output at {} Hz, {} channels",
            sample_rate,
            config.channels()
        );

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => Self::run::<f32>(&device, &config.into(), synth, commands)?,
            cpal::SampleFormat::I16 => Self::run::<i16>(&device, &config.into(), synth, commands)?,
            cpal::SampleFormat::U16 => Self::run::<u16>(&device, &config.into(), synth, commands)?,
            format => return Err(anyhow!("Unsupported sample format {:?}", format)),
        };

        stream.play().context("Failed to start output stream")?;

        Ok(AudioOutput { _stream: stream })
    }

    fn run<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        synth: Arc<Mutex<Synth>>,
        commands: AudioCommandReceiver,
    ) -> Result<cpal::Stream>
    where
        T: Sample + cpal::SizedSample + cpal::FromSample<f32>,
    {
        let channels = config.channels as usize;

        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut synth = match synth.try_lock() {
                    Ok(synth) => synth,
                    Err(_) => {
                        data.fill(T::from_sample(0.0));
                        return;
                    }
                };

                commands.process_commands(|command| synth.apply_command(command));

                for frame in data.chunks_mut(channels) {
                    let (left, right) = synth.next_sample();

                    // NaN protection and a hard ceiling after the limiter
                    let left = if left.is_finite() { left.clamp(-0.95, 0.95) } else { 0.0 };
                    let right = if right.is_finite() { right.clamp(-0.95, 0.95) } else { 0.0 };

                    if channels >= 2 {
                        frame[0] = T::from_sample(left);
                        frame[1] = T::from_sample(right);
                    } else {
                        frame[0] = T::from_sample((left + right) * 0.5);
                    }

                    for sample in frame.iter_mut().skip(2) {
                        *sample = T::from_sample(0.0);
                    }
                }
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )?;

        Ok(stream)
    }
}

/// Owns the output stream on its own thread, since a cpal stream cannot
/// move between threads on every platform.
pub struct AudioThread {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl AudioThread {
    pub fn spawn(synth: Arc<Mutex<Synth>>, commands: AudioCommandReceiver) -> Result<Self> {
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = std::thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || match AudioOutput::new(synth, commands) {
                Ok(output) => {
                    let _ = ready_tx.send(Ok(()));
                    let _ = stop_rx.recv();
                    drop(output);
                    info!("Audio output closed");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .context("Failed to spawn audio thread")?;

        ready_rx
            .recv()
            .context("Audio thread exited before opening the stream")??;

        Ok(Self {
            stop: stop_tx,
            handle: Some(handle),
        })
    }
}

impl Drop for AudioThread {
    fn drop(&mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
