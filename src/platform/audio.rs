use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::Path;

use log::{debug, info};
use rodio::{Decoder, Sink, Source};

use crate::error::PlatformError;
use crate::platform::{AudioPlayer, PlaybackOptions, SoundHandle};

struct LoadedSound {
    uri: String,
    sink: Sink,
}

/// Plays recordings from the local filesystem, one `rodio` sink per sound.
/// The output device is opened on first use and kept for the player's
/// lifetime. Without the `playback` feature recordings are still decoded but
/// every `play` reports that no output is available.
#[derive(Default)]
pub struct FileAudioPlayer {
    #[cfg(feature = "playback")]
    output: Option<rodio::OutputStream>,
    next_handle: u64,
    loaded: HashMap<SoundHandle, LoadedSound>,
}

impl FileAudioPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    #[cfg(feature = "playback")]
    fn connect_sink(&mut self) -> Result<Sink, PlatformError> {
        if self.output.is_none() {
            let mut stream = rodio::OutputStreamBuilder::open_default_stream()
                .map_err(|err| PlatformError::AudioOutput(err.to_string()))?;
            stream.log_on_drop(false);
            self.output = Some(stream);
        }
        match &self.output {
            Some(stream) => Ok(Sink::connect_new(stream.mixer())),
            None => Err(PlatformError::AudioOutput(
                "no output stream".to_string(),
            )),
        }
    }

    #[cfg(not(feature = "playback"))]
    fn connect_sink(&mut self) -> Result<Sink, PlatformError> {
        Err(PlatformError::AudioOutput(
            "built without the `playback` feature".to_string(),
        ))
    }
}

fn local_path(uri: &str) -> &Path {
    Path::new(uri.strip_prefix("file://").unwrap_or(uri))
}

/// Opens and probes a recording so a bad file fails before any output is
/// touched.
pub fn open_recording(uri: &str) -> Result<Decoder<BufReader<File>>, PlatformError> {
    let path = local_path(uri);
    let file = File::open(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => PlatformError::AudioNotFound(uri.to_string()),
        _ => PlatformError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    Decoder::try_from(file).map_err(|err| PlatformError::UnsupportedAudio {
        uri: uri.to_string(),
        reason: err.to_string(),
    })
}

impl AudioPlayer for FileAudioPlayer {
    fn play(&mut self, uri: &str, options: PlaybackOptions) -> Result<SoundHandle, PlatformError> {
        let source = open_recording(uri)?;
        let sink = self.connect_sink()?;
        sink.set_volume(options.volume.clamp(0.0, 1.0));
        if options.looping {
            sink.append(source.repeat_infinite());
        } else {
            sink.append(source);
        }
        sink.play();

        self.next_handle += 1;
        let handle = SoundHandle(self.next_handle);
        self.loaded.insert(
            handle,
            LoadedSound {
                uri: uri.to_string(),
                sink,
            },
        );
        info!(
            "playing {uri} (loop: {}, volume: {:.0}%)",
            options.looping,
            options.volume * 100.0
        );
        Ok(handle)
    }

    fn stop(&mut self, sound: SoundHandle) -> Result<(), PlatformError> {
        let loaded = self
            .loaded
            .get(&sound)
            .ok_or(PlatformError::UnknownSound(sound.0))?;
        loaded.sink.stop();
        info!("stopped {}", loaded.uri);
        Ok(())
    }

    fn unload(&mut self, sound: SoundHandle) -> Result<(), PlatformError> {
        let loaded = self
            .loaded
            .remove(&sound)
            .ok_or(PlatformError::UnknownSound(sound.0))?;
        loaded.sink.stop();
        debug!("released {}", loaded.uri);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    const OPTIONS: PlaybackOptions = PlaybackOptions {
        looping: true,
        volume: 0.8,
    };

    // 16-bit mono PCM, 8 kHz, a tenth of a second of silence.
    fn wav_bytes() -> Vec<u8> {
        let samples = 800u32;
        let data_len = samples * 2;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&8000u32.to_le_bytes());
        bytes.extend_from_slice(&16000u32.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(bytes.len() + data_len as usize, 0);
        bytes
    }

    #[test]
    fn decodes_recording_through_file_uri() {
        let dir = tempdir().expect("tempdir");
        let recording = dir.path().join("wake.wav");
        fs::write(&recording, wav_bytes()).expect("write");

        let uri = format!("file://{}", recording.display());
        let decoder = open_recording(&uri).expect("decodable");
        assert_eq!(decoder.channels(), 1);
        assert_eq!(decoder.sample_rate(), 8000);
    }

    #[test]
    fn missing_recording_is_an_error() {
        let mut player = FileAudioPlayer::new();
        let err = player
            .play("/definitely/not/here.m4a", OPTIONS)
            .expect_err("missing file");
        assert!(matches!(err, PlatformError::AudioNotFound(_)));
        assert_eq!(player.loaded_count(), 0);
    }

    #[test]
    fn non_audio_file_is_rejected_before_playback() {
        let dir = tempdir().expect("tempdir");
        let recording = dir.path().join("wake.m4a");
        fs::write(&recording, b"not really audio").expect("write");

        let mut player = FileAudioPlayer::new();
        let err = player
            .play(&recording.to_string_lossy(), OPTIONS)
            .expect_err("not audio");
        assert!(matches!(err, PlatformError::UnsupportedAudio { .. }));
        assert_eq!(player.loaded_count(), 0);
    }

    #[test]
    fn unknown_handle_is_rejected() {
        let mut player = FileAudioPlayer::new();
        assert!(player.stop(SoundHandle(42)).is_err());
        assert!(player.unload(SoundHandle(42)).is_err());
    }
}
