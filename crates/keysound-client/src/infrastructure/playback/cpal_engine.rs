//! Audio output through `cpal`.
//!
//! Every session opens its own output stream on the default device, so
//! overlapping sessions are mixed by the host's sound server rather than by
//! this crate. Lump audio is 8-bit unsigned mono at 11025 Hz; the stream
//! callback converts it to the device's sample type, linearly resamples to
//! the device rate and copies the mono signal into every device channel.
//!
//! Completion is reported only after the device has asked for
//! [`TAIL_PERIODS`] periods of pure silence, so the stream outlives the
//! period holding the last audible frame.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info};

use super::engine::{AudioEngine, AudioError, PcmFormat, PlaybackSession};

/// An [`AudioEngine`] backed by the host's default output device.
#[derive(Debug, Default)]
pub struct CpalAudioEngine {
    _private: (),
}

impl CpalAudioEngine {
    /// Probes the default output device.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError`] when the host has no usable output device.
    pub fn new() -> Result<Self, AudioError> {
        let device = default_device()?;
        let config = device
            .default_output_config()
            .map_err(|e| AudioError::Device(e.to_string()))?;
        let name = device
            .description()
            .map(|d: cpal::DeviceDescription| d.name().to_string())
            .unwrap_or_else(|_| "default".into());
        info!(
            "audio output: {name}, {} Hz, {} channel(s), {:?}",
            config.sample_rate(),
            config.channels(),
            config.sample_format()
        );
        Ok(Self { _private: () })
    }
}

impl AudioEngine for CpalAudioEngine {
    fn acquire(&self) -> Result<Box<dyn PlaybackSession>, AudioError> {
        let device = default_device()?;
        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::Device(e.to_string()))?;
        Ok(Box::new(CpalSession {
            device,
            supported,
            stream: None,
            done: None,
        }))
    }
}

fn default_device() -> Result<cpal::Device, AudioError> {
    cpal::default_host()
        .default_output_device()
        .ok_or(AudioError::NoOutputDevice)
}

type Completion = Result<(), AudioError>;

struct CpalSession {
    device: cpal::Device,
    supported: cpal::SupportedStreamConfig,
    stream: Option<cpal::Stream>,
    done: Option<Receiver<Completion>>,
}

impl CpalSession {
    fn build<T>(
        &self,
        source: Resampler,
        done_tx: Sender<Completion>,
    ) -> Result<cpal::Stream, AudioError>
    where
        T: SizedSample + FromSample<f32>,
    {
        let config: cpal::StreamConfig = self.supported.config();
        let channels = usize::from(config.channels.max(1));
        let err_tx = done_tx.clone();
        let mut playhead = Playhead::new(source);

        self.device
            .build_output_stream::<T, _, _>(
                &config,
                move |out: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if playhead.fill(out, channels) {
                        let _ = done_tx.try_send(Ok(()));
                    }
                },
                move |err| {
                    let _ = err_tx.try_send(Err(AudioError::Stream(err.to_string())));
                },
                None,
            )
            .map_err(|e| AudioError::Device(e.to_string()))
    }
}

impl PlaybackSession for CpalSession {
    fn submit(&mut self, pcm: Arc<[u8]>, format: PcmFormat) -> Result<(), AudioError> {
        if self.stream.is_some() {
            return Err(AudioError::AlreadySubmitted);
        }

        let source = Resampler::new(pcm, format, self.supported.sample_rate());
        // Room for one completion and one error; later reports are dropped.
        let (done_tx, done_rx) = bounded(2);

        let stream = match self.supported.sample_format() {
            SampleFormat::F32 => self.build::<f32>(source, done_tx)?,
            SampleFormat::I16 => self.build::<i16>(source, done_tx)?,
            SampleFormat::U16 => self.build::<u16>(source, done_tx)?,
            other => return Err(AudioError::UnsupportedFormat(format!("{other:?}"))),
        };
        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        self.stream = Some(stream);
        self.done = Some(done_rx);
        Ok(())
    }

    fn wait(&mut self) -> Result<(), AudioError> {
        let done = self.done.as_ref().ok_or(AudioError::NothingSubmitted)?;
        let result = done.recv().map_err(|_| AudioError::Interrupted)?;
        debug!("cpal session finished");
        result
    }
}

// ── Sample conversion ─────────────────────────────────────────────────────────

/// Converts one unsigned 8-bit sample to `[-1.0, 1.0)`.
fn u8_to_f32(sample: u8) -> f32 {
    (f32::from(sample) - 128.0) / 128.0
}

/// Linear-interpolating reader over a mono unsigned 8-bit PCM buffer.
struct Resampler {
    pcm: Arc<[u8]>,
    /// Source samples advanced per output frame.
    step: f64,
    position: f64,
}

impl Resampler {
    fn new(pcm: Arc<[u8]>, format: PcmFormat, output_rate: u32) -> Self {
        let step = if output_rate == 0 {
            1.0
        } else {
            f64::from(format.sample_rate) / f64::from(output_rate)
        };
        Self {
            pcm,
            step,
            position: 0.0,
        }
    }

    /// Returns the next output sample, or `None` once the buffer is spent.
    fn next_sample(&mut self) -> Option<f32> {
        let index = self.position as usize;
        let current = *self.pcm.get(index)?;
        let next = self.pcm.get(index + 1).copied().unwrap_or(current);
        let frac = (self.position - index as f64) as f32;
        self.position += self.step;

        let a = u8_to_f32(current);
        let b = u8_to_f32(next);
        Some(a + (b - a) * frac)
    }
}

/// Fills `out` with interleaved frames from `source`, padding with silence.
///
/// Returns the number of frames that carried source audio.
fn write_frames<T>(out: &mut [T], channels: usize, source: &mut Resampler) -> usize
where
    T: Sample + FromSample<f32>,
{
    let mut audible = 0;
    for frame in out.chunks_mut(channels) {
        let value = match source.next_sample() {
            Some(v) => {
                audible += 1;
                T::from_sample(v)
            }
            _ => T::EQUILIBRIUM,
        };
        frame.fill(value);
    }
    audible
}

// ── Completion ────────────────────────────────────────────────────────────────

/// All-silent periods the device must request before a session is done.
///
/// The first one proves the last audible period was handed over; the second
/// gives the device a full period to play it out.
const TAIL_PERIODS: u32 = 2;

/// Drives a [`Resampler`] through device periods and tracks end of playback.
struct Playhead {
    source: Resampler,
    silent_periods: u32,
    finished: bool,
}

impl Playhead {
    fn new(source: Resampler) -> Self {
        Self {
            source,
            silent_periods: 0,
            finished: false,
        }
    }

    /// Fills one device period.
    ///
    /// Returns `true` exactly once, on the [`TAIL_PERIODS`]th period in a row
    /// that held no source audio. A period with audible frames never does.
    fn fill<T>(&mut self, out: &mut [T], channels: usize) -> bool
    where
        T: Sample + FromSample<f32>,
    {
        if out.is_empty() {
            return false;
        }
        if write_frames(out, channels, &mut self.source) > 0 {
            self.silent_periods = 0;
            return false;
        }
        if self.finished {
            return false;
        }
        self.silent_periods += 1;
        self.finished = self.silent_periods >= TAIL_PERIODS;
        self.finished
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
