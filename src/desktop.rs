use std::sync::{Arc, Mutex};
use std::time::Duration;

use once_cell::sync::Lazy;
use tauri::{AppHandle, Emitter};
use tracing::{error, info, warn};

use crate::audio::effects::EffectType;
use crate::audio::machine::{EffectsEvent, EffectsSnapshot};
use crate::audio::oscillators::Waveform;
use crate::audio::synth::Synth;
use crate::audio::DEFAULT_SAMPLE_RATE;
use crate::audio_output::AudioThread;
use crate::commands::{AudioCommand, AudioCommandQueue};
use crate::config::SynthConfig;
use crate::events::{ClientEvent, ServerEventQueue};
use crate::keyboard::{Keyboard, KeyboardLayout};
use crate::notes::NoteName;

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(16);

// Global event queue for audio -> UI communication
static SERVER_EVENTS: Lazy<ServerEventQueue> = Lazy::new(ServerEventQueue::new);

// Global command queue for UI -> audio communication
static COMMAND_QUEUE: Lazy<AudioCommandQueue> = Lazy::new(AudioCommandQueue::new);

static SYNTH: Lazy<Arc<Mutex<Synth>>> = Lazy::new(|| {
    let config = SynthConfig::from_env();
    Arc::new(Mutex::new(Synth::new(
        &config,
        DEFAULT_SAMPLE_RATE,
        SERVER_EVENTS.sender(),
    )))
});

static KEYBOARD: Lazy<Mutex<Keyboard>> = Lazy::new(|| Mutex::new(Keyboard::new()));

static AUDIO_THREAD: Lazy<Mutex<Option<AudioThread>>> = Lazy::new(|| Mutex::new(None));

fn audio_running() -> bool {
    AUDIO_THREAD.lock().map(|t| t.is_some()).unwrap_or(false)
}

/// Queue the command for the audio callback, or apply it directly when
/// no stream is pulling from the queue.
fn dispatch(command: AudioCommand) -> Result<(), String> {
    if audio_running() {
        COMMAND_QUEUE.sender().send(command);
        return Ok(());
    }
    let mut synth = SYNTH.lock().map_err(|_| "Synth lock poisoned".to_string())?;
    synth.apply_command(command);
    Ok(())
}

fn parse_note(note: &str) -> Result<NoteName, String> {
    note.parse()
}

#[tauri::command]
fn start_audio() -> Result<String, String> {
    let mut thread = AUDIO_THREAD
        .lock()
        .map_err(|_| "Audio lock poisoned".to_string())?;

    // Stop existing audio first
    if thread.take().is_some() {
        info!("Restarting audio output");
    }

    match AudioThread::spawn(SYNTH.clone(), COMMAND_QUEUE.receiver()) {
        Ok(output) => {
            *thread = Some(output);
            Ok("Audio started successfully".to_string())
        }
        Err(e) => {
            error!("Failed to start audio: {:#}", e);
            Err(format!("Failed to start audio: {:#}", e))
        }
    }
}

#[tauri::command]
fn stop_audio() -> Result<String, String> {
    let mut thread = AUDIO_THREAD
        .lock()
        .map_err(|_| "Audio lock poisoned".to_string())?;
    if thread.take().is_some() {
        Ok("Audio stopped".to_string())
    } else {
        Ok("Audio was not running".to_string())
    }
}

#[tauri::command]
fn init_effects() -> Result<(), String> {
    dispatch(AudioCommand::Effects(EffectsEvent::InitEffects))
}

#[tauri::command]
fn dispose_effects() -> Result<(), String> {
    dispatch(AudioCommand::Effects(EffectsEvent::DisposeEffects))
}

#[tauri::command]
fn note_on(note: String) -> Result<(), String> {
    dispatch(AudioCommand::NoteOn(parse_note(&note)?))
}

#[tauri::command]
fn note_off(note: String) -> Result<(), String> {
    dispatch(AudioCommand::NoteOff(parse_note(&note)?))
}

#[tauri::command]
fn stop_all_notes() -> Result<(), String> {
    if let Ok(mut keyboard) = KEYBOARD.lock() {
        keyboard.release_all();
    }
    dispatch(AudioCommand::StopAllNotes)
}

#[tauri::command]
fn set_volume(volume: f32) -> Result<(), String> {
    dispatch(AudioCommand::SetVolume(volume))
}

/// Held keys are released since their notes were shifted by the old amount
#[tauri::command]
fn set_pitch_shift(semitones: i32) -> Result<(), String> {
    if let Ok(mut keyboard) = KEYBOARD.lock() {
        keyboard.release_all();
    }
    dispatch(AudioCommand::SetPitchShift(semitones))
}

#[tauri::command]
fn set_waveform(waveform: String) -> Result<(), String> {
    dispatch(AudioCommand::SetWaveform(Waveform::from_name(&waveform)?))
}

#[tauri::command]
fn update_effect(node: String, event: String, parameter: f32) -> Result<(), String> {
    let command = ClientEvent::new(&node, &event, parameter).to_command()?;
    dispatch(command)
}

#[tauri::command]
fn toggle_effect(effect: String, enabled: bool) -> Result<(), String> {
    let effect = EffectType::from_name(&effect)?;
    dispatch(AudioCommand::Effects(EffectsEvent::ToggleEffect { effect, enabled }))
}

#[tauri::command]
fn send_client_event(event: ClientEvent) -> Result<(), String> {
    dispatch(event.to_command()?)
}

#[tauri::command]
fn get_effects_state() -> Result<EffectsSnapshot, String> {
    if let Ok(synth) = SYNTH.try_lock() {
        Ok(synth.snapshot())
    } else {
        Err("Could not access synth".to_string())
    }
}

#[tauri::command]
fn get_active_notes() -> Result<Vec<NoteName>, String> {
    if let Ok(synth) = SYNTH.try_lock() {
        Ok(synth.active_notes())
    } else {
        Err("Could not access synth".to_string())
    }
}

#[tauri::command]
fn get_keyboard_layout() -> KeyboardLayout {
    KeyboardLayout::new()
}

/// Pointer down on a key
#[tauri::command]
fn press_key(note: String) -> Result<(), String> {
    let note = parse_note(&note)?;
    let pressed = KEYBOARD
        .lock()
        .map_err(|_| "Keyboard lock poisoned".to_string())?
        .press(note)?;
    if pressed {
        dispatch(AudioCommand::NoteOn(note))?;
    }
    Ok(())
}

/// Pointer up or pointer leave
#[tauri::command]
fn release_key(note: String) -> Result<(), String> {
    let note = parse_note(&note)?;
    let released = KEYBOARD
        .lock()
        .map_err(|_| "Keyboard lock poisoned".to_string())?
        .release(note);
    if released {
        dispatch(AudioCommand::NoteOff(note))?;
    }
    Ok(())
}

fn forward_server_events(app: AppHandle) {
    let receiver = SERVER_EVENTS.receiver();
    loop {
        receiver.process_events(|event| {
            if let Err(e) = app.emit(event.name(), &event) {
                warn!("Failed to emit {}: {}", event.name(), e);
            }
        });
        std::thread::sleep(EVENT_POLL_INTERVAL);
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let result = tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let handle = app.handle().clone();
            std::thread::Builder::new()
                .name("server-events".to_string())
                .spawn(move || forward_server_events(handle))?;
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            start_audio,
            stop_audio,
            init_effects,
            dispose_effects,
            note_on,
            note_off,
            stop_all_notes,
            set_volume,
            set_pitch_shift,
            set_waveform,
            update_effect,
            toggle_effect,
            send_client_event,
            get_effects_state,
            get_active_notes,
            get_keyboard_layout,
            press_key,
            release_key
        ])
        .run(tauri::generate_context!());

    if let Err(e) = result {
        error!("Error while running tauri application: {}", e);
    }
}
