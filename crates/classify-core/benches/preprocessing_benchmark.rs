// Preprocessing benchmark - plane conversion and resize into an input tensor
//
// Run with: cargo bench --bench preprocessing_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::imageops::FilterType;
use npu_classify_core::resize::plane_to_rgb;
use npu_classify_core::{FrameResizer, HostTensor, ImagePlane, ImageResizer, ImageSize, PixelFormat};

fn test_plane(width: u32, height: u32, format: PixelFormat) -> ImagePlane {
    let mut plane = ImagePlane::empty(width, height, format);
    plane.data = (0..plane.required_len()).map(|i| (i % 251) as u8).collect();
    plane
}

/// Benchmark plane conversion at common decoder resolutions
fn bench_plane_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("plane_to_rgb");

    let resolutions = vec![(640, 360, "360p"), (1280, 720, "720p"), (1920, 1080, "1080p")];

    for (width, height, name) in resolutions {
        for format in [PixelFormat::Rgb24, PixelFormat::Nv12] {
            let plane = test_plane(width, height, format);
            group.bench_with_input(
                BenchmarkId::new(format!("{format:?}"), name),
                &plane,
                |b, plane| {
                    b.iter(|| {
                        let image = plane_to_rgb(black_box(plane));
                        black_box(image)
                    });
                },
            );
        }
    }

    group.finish();
}

/// Benchmark resize into a 224x224 input tensor with different filters
fn bench_resize_into_tensor(c: &mut Criterion) {
    let mut group = c.benchmark_group("resize_into_tensor");

    let plane = test_plane(1280, 720, PixelFormat::Rgb24);
    let filters = [
        ("nearest", FilterType::Nearest),
        ("triangle", FilterType::Triangle),
        ("catmull_rom", FilterType::CatmullRom),
    ];

    for (name, filter) in filters {
        let mut resizer = ImageResizer::new(filter);
        let image = resizer.allocate(&plane).unwrap();
        let mut tensor = HostTensor::zeros("input", &[224, 224, 3]);
        let size = ImageSize {
            width: 224,
            height: 224,
        };

        group.bench_function(name, |b| {
            b.iter(|| {
                resizer
                    .resize(black_box(&image), &mut tensor, size)
                    .unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_plane_conversion, bench_resize_into_tensor);
criterion_main!(benches);
