//! Microphone input through cpal
//!
//! The stream lives on a dedicated thread because cpal streams are not `Send`
//! on every host. Frames are down-mixed to mono and converted to i16 before
//! they reach the session.

use super::audio::{AudioFormat, AudioSessionError};
use super::traits::{AudioDeviceInfo, AudioInput, FrameCallback, Subscription};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

/// List the audio input devices of the default host
pub fn input_devices() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = match host.input_devices() {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!("Failed to enumerate input devices: {}", e);
            return Vec::new();
        }
    };

    devices
        .filter_map(|d| d.name().ok())
        .map(|name| AudioDeviceInfo {
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
        })
        .collect()
}

/// Microphone input on the default cpal host
#[derive(Debug, Clone, Default)]
pub struct CpalInput {
    /// Device to use; `None` selects the host default
    device_name: Option<String>,
}

impl CpalInput {
    pub fn default_device() -> Self {
        Self { device_name: None }
    }

    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
        }
    }
}

impl AudioInput for CpalInput {
    fn name(&self) -> String {
        self.device_name
            .clone()
            .unwrap_or_else(|| "default input".to_string())
    }

    fn open(
        &self,
        format: &AudioFormat,
        on_frames: FrameCallback,
    ) -> Result<Subscription, AudioSessionError> {
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AudioSessionError>>();

        let device_name = self.device_name.clone();
        let format = *format;
        let is_running = running.clone();

        let handle = std::thread::Builder::new()
            .name("audio-input".into())
            .spawn(move || {
                let stream = match build_stream(device_name.as_deref(), &format, on_frames) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioSessionError::Configuration(format!(
                        "Failed to start input stream: {}",
                        e
                    ))));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while is_running.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(20));
                }

                // Dropping the stream stops the device callback
                drop(stream);
                tracing::debug!("Audio input stream closed");
            })
            .map_err(|e| AudioSessionError::Configuration(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(AudioSessionError::Configuration(
                    "Audio input thread exited before starting".to_string(),
                ));
            }
        }

        Ok(Subscription::new(move || {
            running.store(false, Ordering::SeqCst);
            if handle.join().is_err() {
                tracing::error!("Audio input thread panicked");
            }
        }))
    }
}

fn find_device(name: Option<&str>) -> Result<Device, AudioSessionError> {
    let host = cpal::default_host();

    match name {
        None => host.default_input_device().ok_or_else(|| {
            AudioSessionError::NoInputRoute("No default input device".to_string())
        }),
        Some(wanted) => host
            .input_devices()
            .map_err(|e| AudioSessionError::NoInputRoute(e.to_string()))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| AudioSessionError::NoInputRoute(format!("Device not found: {}", wanted))),
    }
}

fn build_stream(
    device_name: Option<&str>,
    format: &AudioFormat,
    on_frames: FrameCallback,
) -> Result<Stream, AudioSessionError> {
    let device = find_device(device_name)?;

    let supported = device
        .supported_input_configs()
        .map_err(|e| AudioSessionError::NoInputRoute(e.to_string()))?
        .filter(|range| {
            range.min_sample_rate().0 <= format.sample_rate
                && range.max_sample_rate().0 >= format.sample_rate
        })
        .min_by_key(|range| range.channels())
        .ok_or_else(|| {
            AudioSessionError::Configuration(format!(
                "Input does not support {}Hz",
                format.sample_rate
            ))
        })?
        .with_sample_rate(cpal::SampleRate(format.sample_rate));

    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.config();

    tracing::info!(
        "Opening input {:?}: {}Hz, {}ch, {:?}",
        device.name(),
        config.sample_rate.0,
        config.channels,
        sample_format
    );

    match sample_format {
        SampleFormat::I16 => build_typed::<i16>(&device, &config, on_frames),
        SampleFormat::U16 => build_typed::<u16>(&device, &config, on_frames),
        SampleFormat::F32 => build_typed::<f32>(&device, &config, on_frames),
        other => Err(AudioSessionError::Configuration(format!(
            "Unsupported sample format: {:?}",
            other
        ))),
    }
}

fn build_typed<T>(
    device: &Device,
    config: &StreamConfig,
    mut on_frames: FrameCallback,
) -> Result<Stream, AudioSessionError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let mut mono: Vec<i16> = Vec::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                mono.clear();
                for frame in data.chunks(channels) {
                    let sum: f32 = frame.iter().map(|&s| s.to_sample::<f32>()).sum();
                    mono.push(to_i16(sum / frame.len() as f32));
                }
                on_frames(&mono[..]);
            },
            |err| tracing::error!("Audio input stream error: {}", err),
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                AudioSessionError::NoInputRoute(e.to_string())
            }
            other => AudioSessionError::Configuration(other.to_string()),
        })
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
