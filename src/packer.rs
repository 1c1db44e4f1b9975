//! Grayscale to N-bit pixel packing
//!
//! E-ink controllers only show a handful of gray levels, so an 8-bit sample
//! buffer is squeezed down to 1, 2, 4 or 8 bits per pixel before it crosses
//! the wire. The packer binarizes: every non-zero sample is "on" and fills
//! its whole bit field, zero samples leave the field clear.
//!
//! Output is produced one 16-bit word at a time. The first half of the
//! samples that make up a word lands in the first output byte, the second
//! half in the second byte. Some transports want those two bytes swapped,
//! which is what `word_flip` is for.

use crate::error::ProtocolError;

/// Pixel depth supported by the packer and the panel drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bpp {
    One = 1,
    Two = 2,
    Four = 4,
    Eight = 8,
}

impl Bpp {
    /// Bits per pixel as a number
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Input samples consumed per 16-bit output word
    pub const fn step(self) -> usize {
        16 / self as usize
    }

    /// Input samples consumed per output byte
    pub const fn halfstep(self) -> usize {
        self.step() / 2
    }
}

impl TryFrom<u8> for Bpp {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Bpp::One),
            2 => Ok(Bpp::Two),
            4 => Ok(Bpp::Four),
            8 => Ok(Bpp::Eight),
            other => Err(ProtocolError::UnsupportedDepth(other)),
        }
    }
}

impl std::fmt::Display for Bpp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}bpp", self.bits())
    }
}

/// Pack `samples` (one byte per pixel) into `bpp` bits per pixel.
///
/// `samples.len()` must be a multiple of [`Bpp::step`]; the result is
/// `samples.len() / bpp.halfstep()` bytes long.
pub fn pack(bpp: Bpp, samples: &[u8], word_flip: bool) -> Result<Vec<u8>, ProtocolError> {
    let step = bpp.step();
    let halfstep = bpp.halfstep();

    if samples.len() % step != 0 {
        return Err(ProtocolError::PackLength {
            len: samples.len(),
            step,
        });
    }

    let mut packed = vec![0u8; samples.len() / halfstep];

    for (word, out) in samples.chunks_exact(step).zip(packed.chunks_exact_mut(2)) {
        let (first, second) = word.split_at(halfstep);
        let first = pack_byte(bpp, first);
        let second = pack_byte(bpp, second);
        if word_flip {
            out[0] = second;
            out[1] = first;
        } else {
            out[0] = first;
            out[1] = second;
        }
    }

    Ok(packed)
}

/// Pack one byte worth of samples. Sample `k` owns bit field `k`, counted
/// from the least significant end.
fn pack_byte(bpp: Bpp, samples: &[u8]) -> u8 {
    let bits = bpp.bits() as usize;
    let field: u16 = (1 << bits) - 1;

    samples
        .iter()
        .enumerate()
        .filter(|&(_, &sample)| sample != 0)
        .fold(0u8, |byte, (k, _)| byte | (field << (k * bits)) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Bpp; 4] = [Bpp::One, Bpp::Two, Bpp::Four, Bpp::Eight];

    #[test]
    fn one_bpp_reference_vector() {
        let input = [0, 0, 0, 0, 0, 0, 0, 0, 20, 30, 50, 80, 100, 100, 100, 100];
        assert_eq!(pack(Bpp::One, &input, false).unwrap(), vec![0, 255]);
        assert_eq!(pack(Bpp::One, &input, true).unwrap(), vec![255, 0]);
    }

    #[test]
    fn two_bpp_reference_vector() {
        let input = [0, 0, 0, 0, 20, 30, 50, 80, 0, 0, 0, 0, 100, 100, 100, 100];
        assert_eq!(pack(Bpp::Two, &input, false).unwrap(), vec![0, 255, 0, 255]);
        assert_eq!(pack(Bpp::Two, &input, true).unwrap(), vec![255, 0, 255, 0]);
    }

    #[test]
    fn four_bpp_reference_vector() {
        let input = [0, 0, 20, 30, 0, 0, 50, 80, 0, 0, 100, 100, 0, 0, 100, 100];
        assert_eq!(
            pack(Bpp::Four, &input, false).unwrap(),
            vec![0, 255, 0, 255, 0, 255, 0, 255]
        );
        assert_eq!(
            pack(Bpp::Four, &input, true).unwrap(),
            vec![255, 0, 255, 0, 255, 0, 255, 0]
        );
    }

    #[test]
    fn eight_bpp_binarizes() {
        let input = [0, 20, 0, 30, 0, 50, 0, 80, 0, 100, 0, 100, 0, 100, 0, 100];
        let expected: Vec<u8> = (0..16).map(|i| if i % 2 == 0 { 0 } else { 255 }).collect();
        assert_eq!(pack(Bpp::Eight, &input, false).unwrap(), expected);
        let flipped: Vec<u8> = expected.iter().map(|b| !b).collect();
        assert_eq!(pack(Bpp::Eight, &input, true).unwrap(), flipped);
    }

    #[test]
    fn bit_order_is_lsb_first() {
        let mut input = [0u8; 16];
        input[0] = 1;
        input[9] = 1;
        assert_eq!(pack(Bpp::One, &input, false).unwrap(), vec![0b0000_0001, 0b0000_0010]);

        let input = [0, 7, 0, 0, 0, 0, 9, 0];
        assert_eq!(pack(Bpp::Two, &input, false).unwrap(), vec![12, 48]);

        let input = [0, 1, 1, 0];
        assert_eq!(pack(Bpp::Four, &input, false).unwrap(), vec![240, 15]);
    }

    #[test]
    fn output_length_tracks_depth() {
        let samples = vec![1u8; 160];
        for bpp in ALL {
            let packed = pack(bpp, &samples, false).unwrap();
            assert_eq!(packed.len(), samples.len() / (8 / bpp.bits() as usize));
        }
    }

    #[test]
    fn white_and_black_fill_every_byte() {
        let white = vec![255u8; 10_000];
        let black = vec![0u8; 10_000];
        for bpp in ALL {
            assert!(pack(bpp, &white, false).unwrap().iter().all(|&b| b == 0xFF));
            assert!(pack(bpp, &black, true).unwrap().iter().all(|&b| b == 0x00));
        }
    }

    #[test]
    fn ragged_input_is_rejected() {
        assert_eq!(
            pack(Bpp::One, &[0u8; 15], false),
            Err(ProtocolError::PackLength { len: 15, step: 16 })
        );
        assert_eq!(
            pack(Bpp::Eight, &[0u8; 3], false),
            Err(ProtocolError::PackLength { len: 3, step: 2 })
        );
        assert!(pack(Bpp::Four, &[], false).unwrap().is_empty());
    }

    #[test]
    fn depth_from_number() {
        assert_eq!(Bpp::try_from(4), Ok(Bpp::Four));
        assert_eq!(Bpp::try_from(3), Err(ProtocolError::UnsupportedDepth(3)));
        assert_eq!(Bpp::Eight.to_string(), "8bpp");
    }
}
