//! Geraete-Backend via cpal
//!
//! Capture: der cpal-Callback schreibt i16-Samples in einen lock-free
//! Ring-Buffer, der Capture-Loop liest daraus ganze Frames.
//! Playback: kurzlebiger Ausgabe-Stream pro Puffer, der Callback meldet
//! ueber einen Kanal, wenn alle Samples ausgegeben sind.

use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig, SupportedStreamConfigRange};
use crossbeam_channel::{bounded, unbounded, Receiver, TryRecvError};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use tracing::{debug, error, warn};

use crate::device::{AudioBackend, CaptureStream};
use crate::error::{AudioError, AudioResult};
use crate::format::AudioFormat;

/// Anzahl Frames, die der Ring-Buffer zwischen Callback und Loop puffert
const PUFFER_FRAMES: usize = 8;

/// Zusaetzliche Wartezeit auf das Ende des Playbacks
const PLAYBACK_NACHLAUF: Duration = Duration::from_millis(500);

/// Standard-Host von cpal
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Sucht eine Geraete-Konfiguration mit exakt dieser Rate und Kanalzahl
fn passende_konfiguration(
    konfigurationen: impl Iterator<Item = SupportedStreamConfigRange>,
    sample_rate: u32,
    channels: u16,
) -> Option<SampleFormat> {
    let passend: Vec<SupportedStreamConfigRange> = konfigurationen
        .filter(|c| {
            c.channels() == channels
                && c.min_sample_rate().0 <= sample_rate
                && c.max_sample_rate().0 >= sample_rate
        })
        .collect();
    // i16 bevorzugen, sonst f32 mit Umrechnung
    [SampleFormat::I16, SampleFormat::F32]
        .into_iter()
        .find(|f| passend.iter().any(|c| c.sample_format() == *f))
}

fn stream_config(channels: u16, sample_rate: u32) -> StreamConfig {
    StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    }
}

fn f32_zu_i16(s: f32) -> i16 {
    (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn i16_zu_f32(s: i16) -> f32 {
    s as f32 / i16::MAX as f32
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

/// Offener Capture-Stream; wird er gedroppt, stoppt die Aufnahme
pub struct CpalCapture {
    _stream: Stream,
    consumer: HeapCons<i16>,
    fehler_rx: Receiver<String>,
}

impl CaptureStream for CpalCapture {
    fn read_frame(&mut self, buf: &mut [i16]) -> AudioResult<usize> {
        match self.fehler_rx.try_recv() {
            Ok(fehler) => return Err(AudioError::Lesefehler(fehler)),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                return Err(AudioError::StreamFehler("Capture-Stream getrennt".into()))
            }
        }
        if self.consumer.occupied_len() < buf.len() {
            return Ok(0);
        }
        Ok(self.consumer.pop_slice(buf))
    }
}

fn capture_oeffnen(device: &Device, format: &AudioFormat) -> AudioResult<CpalCapture> {
    let channels = u16::from(format.channels);
    let sample_format = device
        .supported_input_configs()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))
        .map(|k| passende_konfiguration(k, format.sample_rate, channels))?
        .ok_or_else(|| AudioError::NichtUnterstuetztesFormat(format.to_string()))?;

    let rb = HeapRb::<i16>::new(format.frame_len() * PUFFER_FRAMES);
    let (mut producer, consumer) = rb.split();
    let (fehler_tx, fehler_rx) = unbounded::<String>();
    let err_fn = move |err: cpal::StreamError| {
        error!("Capture-Fehler: {}", err);
        let _ = fehler_tx.send(err.to_string());
    };
    let config = stream_config(channels, format.sample_rate);

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _| {
                let written = producer.push_slice(data);
                if written < data.len() {
                    warn!("Capture Ring-Buffer voll, {} Samples verworfen", data.len() - written);
                }
            },
            err_fn,
            None,
        ),
        _ => device.build_input_stream(
            &config,
            move |data: &[f32], _| {
                let samples: Vec<i16> = data.iter().copied().map(f32_zu_i16).collect();
                let written = producer.push_slice(&samples);
                if written < samples.len() {
                    warn!("Capture Ring-Buffer voll, {} Samples verworfen", samples.len() - written);
                }
            },
            err_fn,
            None,
        ),
    }
    .map_err(|e| match e {
        cpal::BuildStreamError::StreamConfigNotSupported => {
            AudioError::NichtUnterstuetztesFormat(format.to_string())
        }
        e => AudioError::StreamFehler(e.to_string()),
    })?;

    stream
        .play()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    debug!(format = %format, ?sample_format, "Capture-Stream geoeffnet");
    Ok(CpalCapture {
        _stream: stream,
        consumer,
        fehler_rx,
    })
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

fn abspielen(device: &Device, samples: &[i16], channels: u8, sample_rate: u32) -> AudioResult<()> {
    let kanaele = u16::from(channels);
    let sample_format = device
        .supported_output_configs()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))
        .map(|k| passende_konfiguration(k, sample_rate, kanaele))?
        .ok_or_else(|| {
            AudioError::NichtUnterstuetztesFormat(format!("{sample_rate} Hz, {channels} Kanaele"))
        })?;

    let (fertig_tx, fertig_rx) = bounded::<()>(1);
    let err_fn = |err: cpal::StreamError| error!("Playback-Fehler: {}", err);
    let config = stream_config(kanaele, sample_rate);
    let daten = samples.to_vec();
    let mut pos = 0usize;

    let stream = match sample_format {
        SampleFormat::I16 => device.build_output_stream(
            &config,
            move |out: &mut [i16], _| {
                let n = out.len().min(daten.len() - pos);
                out[..n].copy_from_slice(&daten[pos..pos + n]);
                out[n..].fill(0);
                pos += n;
                if pos >= daten.len() {
                    let _ = fertig_tx.try_send(());
                }
            },
            err_fn,
            None,
        ),
        _ => device.build_output_stream(
            &config,
            move |out: &mut [f32], _| {
                let n = out.len().min(daten.len() - pos);
                for (o, s) in out.iter_mut().zip(&daten[pos..pos + n]) {
                    *o = i16_zu_f32(*s);
                }
                out[n..].fill(0.0);
                pos += n;
                if pos >= daten.len() {
                    let _ = fertig_tx.try_send(());
                }
            },
            err_fn,
            None,
        ),
    }
    .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    let frames = samples.len() / channels as usize;
    let dauer = Duration::from_millis(frames as u64 * 1000 / sample_rate as u64);
    if fertig_rx.recv_timeout(dauer + PLAYBACK_NACHLAUF).is_err() {
        warn!(?dauer, "Playback nicht rechtzeitig beendet, Stream wird geschlossen");
    }
    drop(stream);
    Ok(())
}

impl AudioBackend for CpalBackend {
    fn open_capture(&self, format: &AudioFormat) -> AudioResult<Box<dyn CaptureStream>> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::KeinStandardEingabegeraet)?;
        if let Ok(name) = device.name() {
            debug!(geraet = %name, "Oeffne Eingabegeraet");
        }
        Ok(Box::new(capture_oeffnen(&device, format)?))
    }

    fn play(&self, samples: &[i16], channels: u8, sample_rate: u32) -> AudioResult<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::KeinStandardAusgabegeraet)?;
        abspielen(&device, samples, channels, sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_umrechnung() {
        assert_eq!(f32_zu_i16(0.0), 0);
        assert_eq!(f32_zu_i16(1.0), i16::MAX);
        assert_eq!(f32_zu_i16(2.0), i16::MAX);
        assert_eq!(f32_zu_i16(-2.0), i16::MIN);
        assert!((i16_zu_f32(i16::MAX) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn capture_stream_oeffnen() {
        let backend = CpalBackend::new();
        let result = backend.open_capture(&AudioFormat::default());
        assert!(result.is_ok() || result.err().is_some_and(|e| e.ist_geraetefehler()));
    }

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn playback_kurzer_ton() {
        let backend = CpalBackend::new();
        let ton: Vec<i16> = (0..4800).map(|i| ((i % 20) as i16 - 10) * 1000).collect();
        backend.play(&ton, 1, 48000).unwrap();
    }
}
