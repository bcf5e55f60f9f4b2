use std::f32::consts::PI;
use std::path::Path;
use std::sync::Arc;

use tonica::audio::decode::decode_audio;
use tonica::compare::{Interpolation, LiveComparator, Lookup, Scoring};
use tonica::config::Config;
use tonica::pitch::{DetectorConfig, PitchDetector};
use tonica::reference::{BuilderConfig, ReferenceStore, ReferenceTrackBuilder};
use tonica::session::{Role, Session, Transport, WireEvent};
use tonica::ErrorKind;

const SAMPLE_RATE: u32 = 44100;

struct Discard;

impl Transport for Discard {
    fn send(&mut self, _event: WireEvent) {}
}

/// Consecutive segments of (frequency, seconds); frequency 0 is silence.
fn melody(segments: &[(f32, f32)]) -> Vec<f32> {
    let mut samples = Vec::new();
    for &(freq, secs) in segments {
        let n = (secs * SAMPLE_RATE as f32) as usize;
        samples.extend((0..n).map(|i| {
            if freq == 0.0 {
                0.0
            } else {
                0.5 * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin()
            }
        }));
    }
    samples
}

fn write_wav(path: &Path, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn decoded_tone_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a3.wav");
    write_wav(&path, &melody(&[(220.0, 0.5)]));

    let audio = decode_audio(&path).unwrap();
    assert_eq!(audio.sample_rate, SAMPLE_RATE);

    let mut detector = PitchDetector::new(DetectorConfig::live()).unwrap();
    let estimate = detector.detect(&audio.samples[..2048], audio.sample_rate);
    let hz = estimate.hz.unwrap();
    assert!((hz - 220.0).abs() / 220.0 < 0.01, "got {hz}");
}

#[test]
fn build_persist_and_compare() {
    let dir = tempfile::tempdir().unwrap();
    let uploads = dir.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();
    write_wav(
        &uploads.join("song.wav"),
        &melody(&[(0.0, 0.5), (220.0, 1.0), (330.0, 1.0)]),
    );

    let store = ReferenceStore::new(&uploads, dir.path().join("references"));
    let builder = ReferenceTrackBuilder::new(BuilderConfig::default()).unwrap();

    let path = store.build("song.wav", &builder).unwrap();
    assert_eq!(path, dir.path().join("references").join("song_ref.json"));
    let first = std::fs::read(&path).unwrap();

    // Rebuilding rewrites byte-identical output.
    store.build("song.wav", &builder).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), first);

    let track = store.load("song.wav").unwrap();
    assert_eq!(track.to_json().unwrap().as_bytes(), &first[..]);
    // 2.5 s of audio in 2048-sample hops.
    assert_eq!(track.len(), (2.5 * SAMPLE_RATE as f64) as usize / 2048);
    assert!(track.points().windows(2).all(|w| w[0].t <= w[1].t));
    assert_eq!(track.points()[0].hz, 0.0);

    let mut comparator =
        LiveComparator::new(Interpolation::Step, Scoring::continuous(50.0)).unwrap();
    comparator.load(Arc::new(track), 2.0);

    assert_eq!(comparator.expected_at(1.0), Lookup::NotSynchronized);

    // 2.0 s offset: transport 3.0 reads reference 1.0, inside the 220 Hz part.
    let r = comparator.compare(3.0, Some(222.0));
    let expected = r.expected_hz.unwrap();
    assert!((expected - 220.0).abs() < 3.0, "expected {expected}");
    assert!(r.precision.unwrap() > 0.8);

    // Reference 2.3 s is deep in the 330 Hz part; the smoother has caught up.
    let expected = comparator.expected_at(4.3).hz().unwrap();
    assert!((expected - 330.0).abs() < 4.0, "expected {expected}");
}

#[test]
fn session_scores_performance_against_reference() {
    let dir = tempfile::tempdir().unwrap();
    let uploads = dir.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();
    write_wav(&uploads.join("duet.wav"), &melody(&[(262.0, 2.0)]));

    let config = Config::from_toml_str(
        r#"
        [comparator]
        interpolation = "linear"
        "#,
    )
    .unwrap();
    let store = ReferenceStore::new(&uploads, dir.path().join("references"));
    let builder = ReferenceTrackBuilder::new(config.reference.builder()).unwrap();
    store.build("duet.wav", &builder).unwrap();
    let track = Arc::new(store.load("duet.wav").unwrap());

    let mut session = Session::new("singer", Role::Follower, &config, Discard).unwrap();
    session.load_song("duet.wav", Some(track));
    session.start_input(SAMPLE_RATE).unwrap();

    // A singer slightly sharp of the reference.
    let performance = melody(&[(266.0, 1.0)]);
    let mut last = None;
    for (i, block) in performance.chunks_exact(1024).enumerate() {
        session.push_samples(block);
        let t = ((i + 1) * 1024) as f64 / SAMPLE_RATE as f64;
        last = Some(session.compare(t));
    }

    let result = last.unwrap();
    let delta = result.delta_hz.unwrap();
    assert!(delta > 1.0 && delta < 8.0, "delta {delta}");
    assert!(result.precision.unwrap() > 0.8);
}

#[test]
fn missing_and_corrupt_songs_report_distinct_kinds() {
    let dir = tempfile::tempdir().unwrap();
    let uploads = dir.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();
    std::fs::write(uploads.join("bad.ogg"), vec![0u8; 4096]).unwrap();

    let store = ReferenceStore::new(&uploads, dir.path().join("references"));
    let builder = ReferenceTrackBuilder::new(BuilderConfig::default()).unwrap();

    assert_eq!(
        store.build("gone.mp3", &builder).unwrap_err().kind(),
        ErrorKind::InputNotFound
    );
    assert_eq!(
        store.build("bad.ogg", &builder).unwrap_err().kind(),
        ErrorKind::DecodeError
    );
    assert!(!dir.path().join("references").join("bad_ref.json").exists());
}
