//! Round trip through a real PNG on disk.

use std::path::PathBuf;

use bento_assets::{AssetError, TextureData};

fn temp_png(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("bento_assets_{}_{}.png", name, std::process::id()))
}

#[test]
fn test_load_png_as_rgba8() {
    let path = temp_png("rgb");

    // RGB source: the loader must expand it to RGBA with opaque alpha.
    let mut img = image::RgbImage::new(3, 2);
    img.put_pixel(0, 0, image::Rgb([255, 0, 0]));
    img.put_pixel(2, 1, image::Rgb([0, 0, 255]));
    img.save(&path).unwrap();

    let tex = TextureData::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!((tex.width, tex.height), (3, 2));
    assert_eq!(tex.byte_len(), 3 * 2 * 4);
    assert_eq!(&tex.pixels[0..4], &[255, 0, 0, 255]);
    let last = tex.byte_len() - 4;
    assert_eq!(&tex.pixels[last..], &[0, 0, 255, 255]);
}

#[test]
fn test_corrupt_file_is_image_error() {
    let path = temp_png("corrupt");
    std::fs::write(&path, b"not a png").unwrap();

    let result = TextureData::load(&path);
    std::fs::remove_file(&path).ok();

    assert!(matches!(result, Err(AssetError::Image(_))));
}
