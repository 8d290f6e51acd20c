use super::codec::HexColor;
use rand::Rng;

/// Pure primaries and secondaries that models already overuse.
pub const OVERUSED_HUES: [HexColor; 6] = [
    HexColor::from_rgb(0x00, 0x00, 0xff),
    HexColor::from_rgb(0xff, 0x00, 0x00),
    HexColor::from_rgb(0x00, 0xff, 0x00),
    HexColor::from_rgb(0xff, 0xff, 0x00),
    HexColor::from_rgb(0xff, 0x00, 0xff),
    HexColor::from_rgb(0x00, 0xff, 0xff),
];

const MIN_CHANNEL: u8 = 55;
const MAX_ATTEMPTS: usize = 10;

/// Draw one bright color, re-drawing while it lands on an overused hue.
/// Gives up after a bounded number of attempts and keeps the last draw.
pub fn vivid_color<R: Rng + ?Sized>(rng: &mut R) -> HexColor {
    let mut color = draw(rng);
    for _ in 1..MAX_ATTEMPTS {
        if !OVERUSED_HUES.contains(&color) {
            break;
        }
        color = draw(rng);
    }
    color
}

/// `count` vivid colors, suggested to the model as a starting palette.
pub fn vivid_palette<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<HexColor> {
    (0..count).map(|_| vivid_color(rng)).collect()
}

fn draw<R: Rng + ?Sized>(rng: &mut R) -> HexColor {
    HexColor::from_rgb(
        rng.random_range(MIN_CHANNEL..=u8::MAX),
        rng.random_range(MIN_CHANNEL..=u8::MAX),
        rng.random_range(MIN_CHANNEL..=u8::MAX),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn channels_stay_bright() {
        let mut rng = StdRng::seed_from_u64(7);
        for color in vivid_palette(&mut rng, 200) {
            let (r, g, b) = color.rgb();
            assert!(r >= MIN_CHANNEL && g >= MIN_CHANNEL && b >= MIN_CHANNEL);
            assert!(!color.is_black());
        }
    }

    #[test]
    fn palette_has_requested_size() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(vivid_palette(&mut rng, 8).len(), 8);
        assert!(vivid_palette(&mut rng, 0).is_empty());
    }

    #[test]
    fn same_seed_same_palette() {
        let a = vivid_palette(&mut StdRng::seed_from_u64(42), 5);
        let b = vivid_palette(&mut StdRng::seed_from_u64(42), 5);
        assert_eq!(a, b);
    }

    #[test]
    fn overused_hues_are_unreachable_below_min_channel() {
        // Every blocklisted hue has a zero channel, so bright draws never hit it.
        for hue in OVERUSED_HUES {
            let (r, g, b) = hue.rgb();
            assert!(r.min(g).min(b) < MIN_CHANNEL);
        }
    }
}
