//! Software volume and mute for interleaved 16-bit little-endian PCM.
//!
//! The MAX98357A has no gain register reachable from the host, so volume is
//! applied to the samples of each transfer just before it is handed to I2S.
//!
//! | `volume` | Effect                       |
//! |----------|------------------------------|
//! | muted    | every byte zeroed            |
//! | 0%       | silence                      |
//! | 50%      | each sample halved           |
//! | 100%     | bytes pass through unchanged |

use platform::audio_types::VolumePercent;

/// Apply mute or volume to `frame` in place.
///
/// A trailing odd byte (half a sample) is left untouched; the frame length
/// never changes.
pub fn apply(frame: &mut [u8], volume: VolumePercent, muted: bool) {
    if muted {
        frame.fill(0);
        return;
    }
    if volume == VolumePercent::MAX {
        return;
    }
    for pair in frame.chunks_exact_mut(2) {
        if let Ok(bytes) = <[u8; 2]>::try_from(&*pair) {
            let sample = volume.scale(i16::from_le_bytes(bytes));
            pair.copy_from_slice(&sample.to_le_bytes());
        }
    }
}
