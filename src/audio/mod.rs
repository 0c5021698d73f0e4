//! Audio codec, PCM helpers and the silence editor.

pub mod mp3;
pub mod pcm;
pub mod silence;
pub mod wav;

use crate::error::Result;
use crate::tts::backend::AudioMime;
use pcm::PcmAudio;

/// Decode a take into mono PCM at its native sample rate.
pub fn decode(bytes: &[u8], mime: AudioMime) -> Result<PcmAudio> {
    match mime {
        AudioMime::Wav => wav::decode_wav(bytes),
        AudioMime::Mpeg => mp3::decode_mp3(bytes),
    }
}

/// Decode a take and bring it to `target_rate`.
pub fn prepare(bytes: &[u8], mime: AudioMime, target_rate: u32) -> Result<PcmAudio> {
    Ok(decode(bytes, mime)?.resampled(target_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_resamples_wav_take() {
        let source = PcmAudio::new(vec![1000; 24000], 24000);
        let bytes = wav::encode_wav(&source).unwrap();
        let audio = prepare(&bytes, AudioMime::Wav, 16000).unwrap();
        assert_eq!(audio.sample_rate, 16000);
        assert_eq!(audio.samples.len(), 16000);
    }

    #[test]
    fn decode_dispatches_on_mime() {
        assert!(decode(b"not audio", AudioMime::Wav).is_err());
        assert!(decode(b"not audio", AudioMime::Mpeg).is_err());
    }
}
