use std::fs::File;
use std::io;
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Result, TonicaError};

pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decodes a whole file to mono `f32`, averaging channels.
pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let mut source = Source::open(path)?;
    let mut mix = Downmix::default();

    while let Some(decoded) = source.next_buffer()? {
        mix.push(decoded);
    }

    let samples = mix.into_samples();
    let audio = AudioData {
        samples,
        sample_rate: source.sample_rate,
    };
    log::info!(
        "Decoded {}: {} samples, {}Hz, {:.1}s",
        path.display(),
        audio.samples.len(),
        audio.sample_rate,
        audio.duration()
    );
    Ok(audio)
}

/// The first audio track of a container plus its decoder.
struct Source {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
}

impl Source {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => TonicaError::InputNotFound {
                path: path.to_path_buf(),
            },
            _ => e.into(),
        })?;
        let decode_err = |e: SymphoniaError| TonicaError::Decode(format!("{}: {}", path.display(), e));

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let format = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(decode_err)?
            .format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| TonicaError::Decode(format!("{}: no audio track", path.display())))?;
        let sample_rate = track
            .codec_params
            .sample_rate
            .filter(|&sr| sr > 0)
            .ok_or_else(|| TonicaError::Decode(format!("{}: unknown sample rate", path.display())))?;
        let track_id = track.id;
        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(decode_err)?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
        })
    }

    /// Next decoded buffer of our track, `None` at end of stream. Corrupt
    /// packets are skipped.
    fn next_buffer(&mut self) -> Result<Option<AudioBufferRef<'_>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(None)
                }
                Err(e) => return Err(e.into()),
            };
            if packet.track_id() != self.track_id {
                continue;
            }
            match self.decoder.decode(&packet) {
                Ok(_) => break,
                Err(SymphoniaError::DecodeError(msg)) => {
                    log::debug!("Skipping corrupt packet: {}", msg);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Some(self.decoder.last_decoded()))
    }
}

/// Accumulates decoded buffers as one mono signal.
#[derive(Default)]
struct Downmix {
    planar: Option<AudioBuffer<f32>>,
    mono: Vec<f32>,
}

impl Downmix {
    fn push(&mut self, decoded: AudioBufferRef<'_>) {
        if decoded.frames() == 0 {
            return;
        }
        let spec = *decoded.spec();
        let reusable = self
            .planar
            .as_ref()
            .is_some_and(|buf| buf.capacity() >= decoded.capacity() && *buf.spec() == spec);
        if !reusable {
            self.planar = Some(AudioBuffer::new(decoded.capacity() as u64, spec));
        }
        let Some(buf) = self.planar.as_mut() else {
            return;
        };
        decoded.convert(buf);

        let channels = buf.spec().channels.count().max(1);
        let start = self.mono.len();
        self.mono.extend_from_slice(buf.chan(0));
        for ch in 1..channels {
            for (m, s) in self.mono[start..].iter_mut().zip(buf.chan(ch)) {
                *m += s;
            }
        }
        if channels > 1 {
            let scale = 1.0 / channels as f32;
            self.mono[start..].iter_mut().for_each(|m| *m *= scale);
        }
    }

    fn into_samples(self) -> Vec<f32> {
        self.mono
    }
}
