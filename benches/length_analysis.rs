use criterion::{black_box, criterion_group, criterion_main, Criterion};
use opencv::core::{Mat, Rect, Scalar, CV_8UC3};
use opencv::imgproc::{rectangle, FILLED, LINE_8};
use scan_lengths::{
    measure::{LengthMeasurer, ShapeCleaner},
    AnalysisConfig, Analyzer, ClusterCount, MeasureMethod, ReferenceRegion, ZhangSuenThinning,
};
use std::sync::Arc;

fn scene() -> Mat {
    let mut image = Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(255.0)).unwrap();
    let stripes = [
        (Rect::new(150, 440, 201, 8), Scalar::all(0.0)),
        (Rect::new(60, 60, 401, 12), Scalar::new(0.0, 0.0, 255.0, 0.0)),
        (Rect::new(60, 160, 12, 201), Scalar::new(0.0, 200.0, 0.0, 0.0)),
        (Rect::new(200, 200, 301, 10), Scalar::new(220.0, 40.0, 0.0, 0.0)),
    ];
    for (rect, color) in stripes {
        rectangle(&mut image, rect, color, FILLED, LINE_8, 0).unwrap();
    }
    image
}

fn benchmark_length_analysis(c: &mut Criterion) {
    let image = scene();
    let reference = ReferenceRegion::new(120, 420, 380, 465);

    for measure in [MeasureMethod::Box, MeasureMethod::Skeleton] {
        let analyzer = Analyzer::new(AnalysisConfig {
            k: ClusterCount::Fixed(3),
            measure,
            ..AnalysisConfig::default()
        });
        c.bench_function(&format!("analyze_image_{}", measure), |b| {
            b.iter(|| analyzer.analyze_image(black_box(&image), reference, 5.0).unwrap())
        });
    }

    let auto = Analyzer::new(AnalysisConfig::default());
    c.bench_function("analyze_image_auto_k", |b| {
        b.iter(|| auto.analyze_image(black_box(&image), reference, 5.0).unwrap())
    });
}

fn benchmark_measurement(c: &mut Criterion) {
    let mut mask =
        Mat::new_rows_cols_with_default(480, 640, opencv::core::CV_8UC1, Scalar::all(0.0)).unwrap();
    let stripe = Rect::new(60, 60, 401, 12);
    rectangle(&mut mask, stripe, Scalar::all(255.0), FILLED, LINE_8, 0).unwrap();

    let cleaner = ShapeCleaner::new().unwrap();
    c.bench_function("clean_mask", |b| b.iter(|| cleaner.clean(black_box(&mask)).unwrap()));

    let skeleton = LengthMeasurer::new(MeasureMethod::Skeleton, Some(Arc::new(ZhangSuenThinning)));
    c.bench_function("measure_skeleton", |b| {
        b.iter(|| skeleton.measure(black_box(&mask)).unwrap())
    });
}

criterion_group!(benches, benchmark_length_analysis, benchmark_measurement);
criterion_main!(benches);
