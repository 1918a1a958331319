mod common;

use captcha_ocr::preprocessing::steps::{grayscale, morphology::BACKGROUND};
use captcha_ocr::{
    CaptchaError, ClassifierWeights, Dataset, ImageCleaner, Predictor, Segmenter, ShufflePolicy,
    TrainConfig, Trainer, CROP_SIZE,
};
use candle_core::Device;
use image::{DynamicImage, GrayImage, Luma};

#[test]
fn test_cleaner_strips_noise_lines_between_digits() {
    let bitmap = ImageCleaner::default()
        .clean(&common::render_noisy("4821"))
        .unwrap();
    let mask = bitmap.as_image();

    assert_eq!(bitmap.height(), 40);
    for cell in 0..3 {
        let gap_start = cell * common::CELL_WIDTH + 27;
        for x in gap_start..gap_start + 6 {
            for y in 0..40 {
                assert_eq!(
                    mask.get_pixel(x, y).0[0],
                    BACKGROUND,
                    "noise left at ({}, {})",
                    x,
                    y
                );
            }
        }
    }
}

#[test]
fn test_noise_free_glyphs_survive_cleaning_unchanged() {
    let image = common::render("0369");
    let cleaned = ImageCleaner::default().clean(&image).unwrap();

    let binarized = grayscale::apply(&image).unwrap();
    for y in 0..40 {
        for x in 0..common::WIDTH {
            let expected = if binarized.get_pixel(x, y).0[0] < 150 { 0 } else { 255 };
            assert_eq!(cleaned.as_image().get_pixel(x, y).0[0], expected);
        }
    }
}

#[test]
fn test_segmenter_yields_four_canonical_crops_for_odd_width() {
    let image = DynamicImage::ImageRgb8(image::imageops::crop_imm(
        &common::render("1234").to_rgb8(),
        0,
        0,
        common::WIDTH - 3,
        common::HEIGHT,
    )
    .to_image());

    let bitmap = ImageCleaner::default().clean(&image).unwrap();
    let crops = Segmenter::default().segment(&bitmap).unwrap();

    assert_eq!(crops.len(), 4);
    for crop in crops {
        assert_eq!(crop.as_slice().len(), (CROP_SIZE * CROP_SIZE) as usize);
    }
}

#[test]
fn test_training_on_single_label_corpus_reaches_full_accuracy() {
    let image = common::render("0000");
    let names: Vec<String> = (0..32).map(|i| format!("0000_{:02}.png", i)).collect();
    let dataset = Dataset::from_images(
        names.iter().map(|n| (n.as_str(), &image)),
        &ImageCleaner::default(),
    )
    .unwrap();
    assert_eq!(dataset.len(), 128);

    let outcome = Trainer::new(TrainConfig::default(), ShufflePolicy::Seeded(7))
        .train(&dataset)
        .unwrap();

    assert_eq!(outcome.history.len(), 15);
    assert!(
        outcome.final_accuracy() >= 0.99,
        "final accuracy {}",
        outcome.final_accuracy()
    );
}

#[test]
fn test_trained_model_reads_9559() {
    let dir = tempfile::tempdir().unwrap();
    for combo in 0..16u32 {
        let digits: String = (0..4)
            .map(|bit| if combo >> (3 - bit) & 1 == 1 { '9' } else { '5' })
            .collect();
        for copy in 0..6 {
            common::write_png(
                dir.path(),
                &format!("{}_{}.png", digits, copy),
                &common::render(&digits),
            );
        }
    }

    let dataset = Dataset::from_dir(dir.path(), &ImageCleaner::default()).unwrap();
    assert_eq!(dataset.len(), 16 * 6 * 4);

    let outcome = Trainer::new(TrainConfig::default(), ShufflePolicy::Seeded(2024))
        .train(&dataset)
        .unwrap();

    let weights_path = dir.path().join("digit_cnn.safetensors");
    outcome.weights.save(&weights_path).unwrap();
    let predictor = Predictor::from_file(&weights_path).unwrap();

    let result = predictor.predict(&common::render("9559")).unwrap();
    assert_eq!(result.text, "9559");
    assert_eq!(result.digits(), vec![9, 5, 5, 9]);
}

#[test]
fn test_malformed_name_fails_during_dataset_construction() {
    let dir = tempfile::tempdir().unwrap();
    common::write_png(dir.path(), "0000.png", &common::render("0000"));
    // undecodable on purpose: the label check must trip before decoding
    std::fs::write(dir.path().join("123.png"), b"not an image").unwrap();

    let result = Dataset::from_dir(dir.path(), &ImageCleaner::default());

    match result {
        Err(CaptchaError::MalformedLabel { identifier }) => {
            assert!(identifier.ends_with("123.png"))
        }
        other => panic!("expected MalformedLabel, got {:?}", other.map(|d| d.len())),
    }
}

#[test]
fn test_empty_directory_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("README.txt"), b"no images here").unwrap();

    let result = Dataset::from_dir(dir.path(), &ImageCleaner::default());

    assert!(matches!(result, Err(CaptchaError::EmptyDataset(_))));
}

#[test]
fn test_blank_image_is_a_shape_mismatch() {
    let predictor = Predictor::new(&common::untrained_weights(3)).unwrap();
    let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(
        common::WIDTH,
        common::HEIGHT,
        Luma([255]),
    ));

    let result = predictor.predict(&blank);

    assert!(matches!(result, Err(CaptchaError::ShapeMismatch(_))));
}

#[test]
fn test_reloaded_weights_predict_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("weights.safetensors");
    let weights = common::untrained_weights(11);
    weights.save(&path).unwrap();

    let original = Predictor::new(&weights).unwrap();
    let reloaded = Predictor::new(&ClassifierWeights::load(&path, &Device::Cpu).unwrap()).unwrap();
    let image = common::render_noisy("7410");

    let a = original.predict(&image).unwrap();
    let b = reloaded.predict(&image).unwrap();

    assert_eq!(a.text, b.text);
    let bits = |r: &captcha_ocr::PredictionResult| -> Vec<u32> {
        r.scores.iter().flatten().map(|v| v.to_bits()).collect()
    };
    assert_eq!(bits(&a), bits(&b));
}

#[test]
fn test_predictor_is_shareable_across_threads() {
    let predictor = std::sync::Arc::new(Predictor::new(&common::untrained_weights(5)).unwrap());
    let image = common::render("2468");
    let expected = predictor.predict(&image).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let predictor = predictor.clone();
            let image = image.clone();
            std::thread::spawn(move || predictor.predict(&image).unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}
