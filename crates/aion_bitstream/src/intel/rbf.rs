//! Intel/Altera RBF (Raw Binary File) format writer.
//!
//! RBF files contain only raw configuration frame data with no header or
//! metadata. They are the simplest bitstream format, used for passive
//! configuration and compressed bitstream loading.

use crate::config_bits::ConfigImage;

/// Writes an RBF file from the given configuration image.
///
/// The RBF format is simply the concatenation of all frame data words
/// in big-endian order, with frames sorted by ascending address. There
/// is no header, footer, or CRC — the data is used as-is for passive
/// serial or active serial configuration.
pub fn write_rbf(config: &ConfigImage) -> Vec<u8> {
    let frames = config.finalize();
    let total_words = frames.len() * config.frame_word_count as usize;
    let mut data = Vec::with_capacity(total_words * 4);

    for frame in &frames {
        for &word in &frame.data {
            data.extend_from_slice(&word.to_be_bytes());
        }
    }

    data
}
