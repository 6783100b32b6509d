//! Property tests for the built-in stages.

use proptest::prelude::*;
use sluice_core::{BufferData, Combination, LocalCoupling, Properties, SignalType, StatelessStage};
use sluice_stages::{Framer, Gain, Sum};

fn framer(size: usize, hop: usize) -> Framer {
    let mut framer = Framer::default();
    framer
        .init_from_properties(&Properties::new().with("size", size).with("hop", hop))
        .unwrap();
    framer
}

/// Small integers keep every sum exact in `f32`.
fn samples(len: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec((-1000i32..1000).prop_map(|v| v as f32), len)
}

proptest! {
    #[test]
    fn frames_are_hop_spaced_slices_of_the_input(
        (size, hop, count, input) in (1usize..16, 1usize..16, 1usize..8).prop_flat_map(|(size, hop, count)| {
            let len = size + (count - 1) * hop;
            (Just(size), Just(hop), Just(count), samples(len))
        })
    ) {
        let framer = framer(size, hop);
        let out = LocalCoupling::run(&framer, &[BufferData::from_words(input.clone(), 1)], &[size], count);
        for (k, frame) in out[0].words().chunks(size).enumerate() {
            prop_assert_eq!(frame, &input[k * hop..k * hop + size]);
        }
    }

    #[test]
    fn fused_window_and_sum_adds_up_each_frame(
        (size, hop, count, input) in (1usize..12, 1usize..12, 1usize..6).prop_flat_map(|(size, hop, count)| {
            let len = size + (count - 1) * hop;
            (Just(size), Just(hop), Just(count), samples(len))
        })
    ) {
        let mut fused = Combination::new(Box::new(Framer::default()), Box::new(Sum::new()));
        fused
            .init_from_properties(&Properties::new().with("size", size).with("hop", hop))
            .unwrap();
        fused.specify_types(&[SignalType::Wave { rate: 1000.0 }]).unwrap();

        let out = LocalCoupling::run(&fused, &[BufferData::from_words(input.clone(), 1)], &[1], count);
        let expected: Vec<f32> = (0..count).map(|k| input[k * hop..k * hop + size].iter().sum()).collect();
        prop_assert_eq!(out[0].words(), expected.as_slice());
    }

    #[test]
    fn unity_gain_leaves_words_untouched(input in samples(32)) {
        let out = LocalCoupling::run(&Gain::new(0.0), &[BufferData::from_words(input.clone(), 1)], &[1], input.len());
        prop_assert_eq!(out[0].words(), input.as_slice());
    }
}
